//! End-to-end Job Centre tests over real loopback TCP sockets.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use protohackers::dispatcher::DispatcherConfig;
use protohackers::job_centre;

async fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn connect(port: u16) -> (tokio::net::tcp::OwnedWriteHalf, BufReader<tokio::net::tcp::OwnedReadHalf>) {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let (r, w) = stream.into_split();
    (w, BufReader::new(r))
}

async fn request(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    line: &str,
) -> serde_json::Value {
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    serde_json::from_str(&response).unwrap()
}

#[tokio::test]
async fn put_then_get_returns_the_job() {
    let port = free_port().await;
    job_centre::run(DispatcherConfig { port, threads: 8, ..Default::default() }).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (mut w, mut r) = connect(port).await;
    let put_resp = request(&mut w, &mut r, r#"{"request":"put","queue":"q1","job":{"x":1},"pri":5}"#).await;
    assert_eq!(put_resp["status"], "ok");
    let id = put_resp["id"].as_u64().unwrap();

    let get_resp = request(&mut w, &mut r, r#"{"request":"get","queues":["q1"]}"#).await;
    assert_eq!(get_resp["status"], "ok");
    assert_eq!(get_resp["id"], id);
    assert_eq!(get_resp["job"]["x"], 1);
}

#[tokio::test]
async fn disconnect_requeues_a_held_job_for_another_client() {
    let port = free_port().await;
    job_centre::run(DispatcherConfig { port, threads: 8, ..Default::default() }).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (mut w1, mut r1) = connect(port).await;
    let put_resp = request(&mut w1, &mut r1, r#"{"request":"put","queue":"q1","job":{},"pri":1}"#).await;
    let id = put_resp["id"].as_u64().unwrap();

    let get_resp = request(&mut w1, &mut r1, r#"{"request":"get","queues":["q1"]}"#).await;
    assert_eq!(get_resp["id"], id);

    drop(w1);
    drop(r1);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (mut w2, mut r2) = connect(port).await;
    let get_resp2 = request(&mut w2, &mut r2, r#"{"request":"get","queues":["q1"]}"#).await;
    assert_eq!(get_resp2["status"], "ok");
    assert_eq!(get_resp2["id"], id);
}

#[tokio::test]
async fn malformed_request_gets_error_status() {
    let port = free_port().await;
    job_centre::run(DispatcherConfig { port, threads: 8, ..Default::default() }).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (mut w, mut r) = connect(port).await;
    let resp = request(&mut w, &mut r, r#"{"request":"frobnicate"}"#).await;
    assert_eq!(resp["status"], "error");
}
