//! End-to-end LRCP tests over a real loopback UDP socket: connect a
//! session, send a line, and expect the reversed line back.

use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

use protohackers::dispatcher::DispatcherConfig;
use protohackers::lrcp;

async fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn connect_send_line_get_reversed_line_back() {
    let port = free_port().await;
    lrcp::run(DispatcherConfig { port, ..Default::default() }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(("127.0.0.1", port)).await.unwrap();

    client.send(b"/connect/7/").await.unwrap();
    let mut buf = [0u8; 1024];
    let n = timeout(Duration::from_secs(2), client.recv(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"/ack/7/0/");

    client.send(b"/data/7/0/hello\n/").await.unwrap();
    let n = timeout(Duration::from_secs(2), client.recv(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"/ack/7/6/");

    let n = timeout(Duration::from_secs(2), client.recv(&mut buf)).await.unwrap().unwrap();
    let packet = &buf[..n];
    assert!(packet.starts_with(b"/data/7/0/"));
    assert!(packet.ends_with(b"/"));
    let payload = &packet[b"/data/7/0/".len()..packet.len() - 1];
    assert_eq!(payload, b"olleh\n");
}

#[tokio::test]
async fn unknown_session_non_connect_packet_gets_closed() {
    let port = free_port().await;
    lrcp::run(DispatcherConfig { port, ..Default::default() }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(("127.0.0.1", port)).await.unwrap();

    client.send(b"/ack/42/0/").await.unwrap();
    let mut buf = [0u8; 1024];
    let n = timeout(Duration::from_secs(2), client.recv(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"/close/42/");
}
