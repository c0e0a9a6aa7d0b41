use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courier_server::{Server, ServerError};
use tokio::task::JoinHandle;

/// Run `server` on an ephemeral port and wait for it to bind.
///
/// Returns the shared server handle, the base URL a client should call, and
/// the join handle for the serving task.
pub async fn start(server: Server) -> (Arc<Server>, String, JoinHandle<Result<(), ServerError>>) {
    let server = Arc::new(server);
    let task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run(0).await })
    };
    let addr = wait_for_bind(&server).await;
    let url = format!("http://127.0.0.1:{}{}", addr.port(), server.config().path);
    (server, url, task)
}

async fn wait_for_bind(server: &Server) -> SocketAddr {
    for _ in 0..200 {
        if let Some(addr) = server.local_addr() {
            return addr;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("server did not bind within a second");
}
