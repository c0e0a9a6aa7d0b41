mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use courier_client::{Client, ClientError};
use courier_server::{HttpHandler, Params, Response, Server, Timeouts};

async fn ping(id: u64, _params: Params) -> Response {
    Response::ok(id, &"pong")
}

async fn stall(id: u64, _params: Params) -> Response {
    tokio::time::sleep(Duration::from_millis(800)).await;
    Response::ok(id, &"late")
}

#[tokio::test]
async fn test_basic_auth_required() {
    let server = Server::builder().auth("user", "passwd").build();
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    let anonymous = Client::new(&url).unwrap();
    let err = anonymous.call("test", ()).await.unwrap_err();
    assert_eq!(err.to_string(), "bad status 401 Unauthorized for test");

    let wrong = Client::builder(&url).auth("user", "nope").build().unwrap();
    let err = wrong.call("test", ()).await.unwrap_err();
    assert_eq!(err.to_string(), "bad status 401 Unauthorized for test");

    let authorized = Client::builder(&url).auth("user", "passwd").build().unwrap();
    authorized.call("test", ()).await.unwrap();

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rejected_credentials_consume_no_tokens() {
    let server = Server::builder()
        .auth("user", "passwd")
        .rate_limit(3.0)
        .build();
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    // hammer with bad credentials; rejected before the limiter
    let wrong = Client::builder(&url).auth("user", "nope").build().unwrap();
    for _ in 0..10 {
        let err = wrong.call("test", ()).await.unwrap_err();
        assert_eq!(err.to_string(), "bad status 401 Unauthorized for test");
    }

    // the full burst is still available to good credentials
    let authorized = Client::builder(&url).auth("user", "passwd").build().unwrap();
    for _ in 0..3 {
        authorized.call("test", ()).await.unwrap();
    }
    let err = authorized.call("test", ()).await.unwrap_err();
    assert_eq!(err.to_string(), "bad status 429 Too Many Requests for test");

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rate_limit_is_keyed_per_client_ip() {
    let server = Server::builder().rate_limit(2.0).build();
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    let http = reqwest::Client::new();
    let body = r#"{"method":"test","id":1}"#;

    for _ in 0..2 {
        let rsp = http
            .post(&url)
            .header("X-Real-IP", "9.9.9.9")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(rsp.status(), reqwest::StatusCode::OK);
    }
    let rsp = http
        .post(&url)
        .header("X-Real-IP", "9.9.9.9")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);

    // a different client identity has its own bucket
    let rsp = http
        .post(&url)
        .header("X-Real-IP", "8.8.8.8")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::OK);

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rate_limit_refills_over_time() {
    let server = Server::builder().rate_limit(2.0).build();
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;
    let client = Client::new(&url).unwrap();

    client.call("test", ()).await.unwrap();
    client.call("test", ()).await.unwrap();
    let err = client.call("test", ()).await.unwrap_err();
    assert_eq!(err.to_string(), "bad status 429 Too Many Requests for test");

    // 2 tokens/sec: ~600ms buys one request back
    tokio::time::sleep(Duration::from_millis(700)).await;
    client.call("test", ()).await.unwrap();

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_throttle_rejects_at_capacity() {
    let gate = Arc::new(Semaphore::new(0));
    let server = Server::builder().throttle(1).build();

    let handler_gate = Arc::clone(&gate);
    server.add("slow", move |id: u64, _params: Params| {
        let gate = Arc::clone(&handler_gate);
        async move {
            let _permit = gate.acquire().await.unwrap();
            Response::ok(id, &"done")
        }
    });
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    let slow_client = Client::new(&url).unwrap();
    let in_flight = tokio::spawn(async move { slow_client.call("slow", ()).await });

    // wait until the first request holds the only permit
    tokio::time::sleep(Duration::from_millis(150)).await;

    let client = Client::new(&url).unwrap();
    let err = client.call("test", ()).await.unwrap_err();
    assert_eq!(err.to_string(), "bad status 503 Service Unavailable for test");

    // release the handler; the held request finishes normally
    gate.add_permits(1);
    let rsp = in_flight.await.unwrap().unwrap();
    assert_eq!(rsp.decode::<String>().unwrap(), "done");

    // and its permit is back
    client.call("test", ()).await.unwrap();

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_client_timeout_surfaces_as_timeout_error() {
    let server = Server::builder().build();
    server.add("stall", stall);
    let (server, url, task) = common::start(server).await;

    let client = Client::builder(&url)
        .timeout(Duration::from_millis(150))
        .build()
        .unwrap();
    let err = client.call("stall", ()).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }));
    assert_eq!(err.to_string(), "call stall timed out");

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_write_deadline_drops_the_connection() {
    let server = Server::builder()
        .timeouts(Timeouts {
            write: Duration::from_millis(200),
            ..Default::default()
        })
        .build();
    server.add("stall", stall);
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    // the client allows 30s, so the failure comes from the server dropping
    // the connection, not from the client giving up
    let client = Client::new(&url).unwrap();
    let err = client.call("stall", ()).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));

    // the rest of the server is unaffected
    client.call("test", ()).await.unwrap();

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_signature_headers_on_dispatched_responses() {
    let server = Server::builder()
        .signature("test-app", "tester", "0.1.0")
        .build();
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    let http = reqwest::Client::new();
    let rsp = http
        .post(&url)
        .body(r#"{"method":"test","id":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::OK);
    assert_eq!(rsp.headers().get("App-Name").unwrap(), "test-app");
    assert_eq!(rsp.headers().get("App-Version").unwrap(), "0.1.0");
    assert_eq!(rsp.headers().get("Author").unwrap(), "tester");

    // unknown methods cross the dispatch boundary too
    let rsp = http
        .post(&url)
        .body(r#"{"method":"nope","id":2}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::NOT_IMPLEMENTED);
    assert_eq!(rsp.headers().get("App-Name").unwrap(), "test-app");

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_policy_rejections_carry_no_signature() {
    let server = Server::builder()
        .auth("user", "passwd")
        .signature("test-app", "tester", "0.1.0")
        .build();
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    let rsp = reqwest::Client::new()
        .post(&url)
        .body(r#"{"method":"test","id":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert!(rsp.headers().get("App-Name").is_none());

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_user_middleware_wraps_everything() {
    let server = Server::builder()
        .auth("user", "passwd")
        .middleware(|next: HttpHandler| -> HttpHandler {
            Arc::new(move |req| {
                let next = Arc::clone(&next);
                Box::pin(async move {
                    let mut rsp = next(req).await;
                    rsp.headers_mut()
                        .insert("x-seen", "middleware".parse().unwrap());
                    rsp
                })
            })
        })
        .build();
    server.add("test", ping);
    let (server, url, task) = common::start(server).await;

    let http = reqwest::Client::new();

    // outermost: stamps even auth rejections
    let rsp = http
        .post(&url)
        .body(r#"{"method":"test","id":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(rsp.headers().get("x-seen").unwrap(), "middleware");

    let rsp = http
        .post(&url)
        .basic_auth("user", Some("passwd"))
        .body(r#"{"method":"test","id":2}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::OK);
    assert_eq!(rsp.headers().get("x-seen").unwrap(), "middleware");

    server.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}
