//! Full-stack, literal byte-in/byte-out scenarios: a real listening socket,
//! a real `TcpStream` client, and the genuine parser → route table →
//! connection FSM → response-write path. Parser-only boundary cases live as
//! unit tests in `http::request`; these exercise what only the whole stack
//! can prove.

use lanehost::{limits::ConnLimits, Agent, Lane, Request, Response, RouteKind, RouteTable, Server, StatusCode};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

fn table() -> RouteTable<()> {
    RouteTable::build(vec![
        Lane::new(RouteKind::WebPage, "").agent(Agent::get("/", |_, _: &Request, resp: &mut Response| async move {
            resp.status(StatusCode::Ok)
                .header("content-type", "text/html; charset=utf-8")
                .body("hi")
        })),
        Lane::new(RouteKind::DataApi, "/api/user").agent(Agent::post("/add")),
    ])
    .unwrap()
}

async fn spawn_server() -> std::net::SocketAddr {
    spawn_server_with(ConnLimits::default()).await
}

async fn spawn_server_with(conn_limits: ConnLimits) -> std::net::SocketAddr {
    let listener = Server::bind("127.0.0.1:0".parse().unwrap(), 128, Duration::from_secs(60)).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Server::builder()
        .listener(listener)
        .handler(table())
        .connection_limits(conn_limits)
        .build();
    tokio::spawn(server.launch());

    addr
}

async fn roundtrip(addr: std::net::SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match tokio::time::timeout(Duration::from_millis(500), stream.read(&mut chunk)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(_)) => break,
        }
    }
    buf
}

#[tokio::test]
async fn scenario_1_registered_get_returns_body() {
    let addr = spawn_server().await;
    let response = roundtrip(addr, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;

    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"), "{response:?}");
    assert!(response.ends_with(b"\r\n\r\nhi"), "{response:?}");
}

#[tokio::test]
async fn scenario_2_no_match_is_404_then_close() {
    let addr = spawn_server().await;
    let response = roundtrip(addr, b"GET /missing HTTP/1.1\r\nHost: x\r\n\r\n").await;

    assert!(response.starts_with(b"HTTP/1.1 404 Not Found\r\n"), "{response:?}");
}

#[tokio::test]
async fn scenario_3_registered_post_is_503() {
    let addr = spawn_server().await;
    let response = roundtrip(
        addr,
        b"POST /api/user/add HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n",
    )
    .await;

    assert!(response.starts_with(b"HTTP/1.1 503 Service Unavailable\r\n"), "{response:?}");
}

#[tokio::test]
async fn scenario_5_unsupported_method_is_500() {
    let addr = spawn_server().await;
    let response = roundtrip(addr, b"PUT / HTTP/1.1\r\n\r\n").await;

    assert!(response.starts_with(b"HTTP/1.1 500"), "{response:?}");
}

#[tokio::test]
async fn scenario_6_too_many_headers_is_413() {
    let addr = spawn_server().await;

    let mut request = String::from("GET / HTTP/1.1\r\n");
    for i in 0..25 {
        request.push_str(&format!("X-Header-{i}: v\r\n"));
    }
    request.push_str("\r\n");

    let response = roundtrip(addr, request.as_bytes()).await;
    assert!(response.starts_with(b"HTTP/1.1 413 Payload Too Large\r\n"), "{response:?}");
}

#[tokio::test]
async fn default_behavior_terminates_after_one_response() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let mut chunk = [0u8; 1024];
    let _ = stream.read(&mut chunk).await.unwrap();

    // default keepalive_reuse=false: the server shuts its write half down
    // after one response, so a second read observes EOF (0 bytes).
    let n = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut chunk))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn idle_connection_expires_after_configured_keepalive() {
    let conn_limits = ConnLimits {
        connection_lifetime: Duration::from_millis(150),
        socket_read_timeout: Duration::from_secs(5),
        keepalive_reuse: true,
        ..ConnLimits::default()
    };
    let addr = spawn_server_with(conn_limits).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let mut chunk = [0u8; 1024];
    let n = stream.read(&mut chunk).await.unwrap();
    assert!(n > 0, "expected a response to the first request");

    // Send nothing further. The connection's lifetime (150ms) is well
    // below its read timeout (5s), so it must close via the Expiring
    // path, not a read timeout.
    let n = tokio::time::timeout(Duration::from_millis(700), stream.read(&mut chunk))
        .await
        .expect("connection should close well before its 5s read timeout")
        .unwrap();
    assert_eq!(n, 0, "expired connection should shut down with no further bytes");
}
