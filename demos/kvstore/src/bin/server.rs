//! Key/value store served over courier RPC.
//!
//! Exposes `store.save` (record in, generated key out) and `store.load`
//! (key in, record out) behind basic auth, with signature headers on every
//! dispatched response. Ctrl-C shuts down gracefully.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use courier_server::{HandlerGroup, Params, Response, Server, decode_params};
use kvstore_demo::Record;

type Store = Arc<Mutex<HashMap<String, Record>>>;

fn store_group(store: &Store) -> HandlerGroup {
    let mut group = HandlerGroup::new();

    let save_store = Arc::clone(store);
    group.add("save", move |id: u64, params: Params| {
        let store = Arc::clone(&save_store);
        async move {
            match decode_params::<Record>(params.as_deref()) {
                Ok(record) => {
                    let key = Uuid::new_v4().to_string();
                    info!(key = %key, value = %record.value, "saving record");
                    store.lock().insert(key.clone(), record);
                    Response::ok(id, &key)
                }
                Err(err) => Response::err(id, format!("can't decode record: {err}")),
            }
        }
    });

    let load_store = Arc::clone(store);
    group.add("load", move |id: u64, params: Params| {
        let store = Arc::clone(&load_store);
        async move {
            match decode_params::<String>(params.as_deref()) {
                Ok(key) => match store.lock().get(&key) {
                    Some(record) => Response::ok(id, record),
                    None => Response::err(id, "not found"),
                },
                Err(err) => Response::err(id, format!("can't decode key: {err}")),
            }
        }
    });

    group
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store: Store = Arc::new(Mutex::new(HashMap::new()));

    let server = Server::builder()
        .auth("user", "passwd")
        .signature("kvstore-demo", "courier", env!("CARGO_PKG_VERSION"))
        .rate_limit(50.0)
        .throttle(100)
        .build();
    server.group("store", store_group(&store));

    let server = Arc::new(server);
    let shutdown_handle = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            if let Err(err) = shutdown_handle.shutdown().await {
                warn!(error = %err, "shutdown failed");
            }
        }
    });

    println!("kvstore server on http://127.0.0.1:8080/rpc (user/passwd)");
    println!("try: cargo run --bin client");
    server.run(8080).await?;
    Ok(())
}
