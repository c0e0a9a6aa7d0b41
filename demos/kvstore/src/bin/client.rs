//! Calling side of the kvstore demo: save a record, load it back, then ask
//! for one that does not exist.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use courier_client::Client;
use kvstore_demo::Record;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let client = Client::builder("http://127.0.0.1:8080/rpc")
        .auth("user", "passwd")
        .build()?;

    let record = Record {
        ts: Utc::now(),
        value: "all systems green".to_string(),
    };
    let saved = client.call("store.save", &record).await?;
    let key: String = saved.decode()?;
    info!(key = %key, "record saved");

    let loaded = client.call("store.load", &key).await?;
    let record_back: Record = loaded.decode()?;
    info!(value = %record_back.value, ts = %record_back.ts, "record loaded");

    match client.call("store.load", "no-such-key").await {
        Err(err) => info!(error = %err, "missing key reported, as expected"),
        Ok(_) => anyhow::bail!("expected an error for a missing key"),
    }

    Ok(())
}
