//! End-to-end Speed Daemon tests over real loopback TCP sockets: a camera
//! pair reports a plate speeding, and a dispatcher for that road receives
//! the ticket.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use protohackers::dispatcher::DispatcherConfig;
use protohackers::speed_daemon;

async fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn iam_camera(road: u16, mile: u16, limit: u16) -> Vec<u8> {
    let mut buf = vec![0x80];
    buf.extend_from_slice(&road.to_be_bytes());
    buf.extend_from_slice(&mile.to_be_bytes());
    buf.extend_from_slice(&limit.to_be_bytes());
    buf
}

fn iam_dispatcher(roads: &[u16]) -> Vec<u8> {
    let mut buf = vec![0x81, roads.len() as u8];
    for r in roads {
        buf.extend_from_slice(&r.to_be_bytes());
    }
    buf
}

fn plate(plate: &str, timestamp: u32) -> Vec<u8> {
    let mut buf = vec![0x20, plate.len() as u8];
    buf.extend_from_slice(plate.as_bytes());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf
}

#[tokio::test]
async fn speeding_car_is_ticketed_to_the_roads_dispatcher() {
    let port = free_port().await;
    speed_daemon::run(DispatcherConfig { port, threads: 8, ..Default::default() }).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let addr = ("127.0.0.1", port);

    let mut cam1 = TcpStream::connect(addr).await.unwrap();
    cam1.write_all(&iam_camera(368, 0, 60)).await.unwrap();
    cam1.write_all(&plate("RE05BKG", 0)).await.unwrap();

    let mut cam2 = TcpStream::connect(addr).await.unwrap();
    cam2.write_all(&iam_camera(368, 1, 60)).await.unwrap();
    cam2.write_all(&plate("RE05BKG", 45)).await.unwrap();

    let mut dispatcher = TcpStream::connect(addr).await.unwrap();
    dispatcher.write_all(&iam_dispatcher(&[368])).await.unwrap();

    let mut header = [0u8; 2];
    tokio::time::timeout(std::time::Duration::from_secs(2), dispatcher.read_exact(&mut header))
        .await
        .expect("timed out waiting for ticket")
        .unwrap();
    assert_eq!(header[0], 0x21, "expected a Ticket message");
    let plate_len = header[1] as usize;
    let mut rest = vec![0u8; plate_len];
    dispatcher.read_exact(&mut rest).await.unwrap();
    assert_eq!(&rest, b"RE05BKG");
}

#[tokio::test]
async fn reidentifying_a_connection_is_an_error() {
    let port = free_port().await;
    speed_daemon::run(DispatcherConfig { port, threads: 8, ..Default::default() }).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut conn = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    conn.write_all(&iam_camera(1, 0, 60)).await.unwrap();
    conn.write_all(&iam_camera(1, 0, 60)).await.unwrap();

    let mut header = [0u8; 2];
    tokio::time::timeout(std::time::Duration::from_secs(2), conn.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(header[0], 0x10, "expected an Error message");
}
