//! Demo binary exercising multiplexed mode: greets each connection and
//! echoes lines back until the client sends `quit`.
//!
//! None of the three challenge services need readiness-multiplexed I/O
//! (all three are naturally long-lived, blocking-friendly connections), so
//! this binary exists purely to give [`dispatcher::run_multiplexed`] a real
//! caller outside its own unit tests.

use protohackers::dispatcher::{self, read_available, write_all_blocking, Connection, DispatcherConfig};

#[derive(Default)]
struct EchoState {
    greeted: bool,
}

#[tokio::main]
async fn main() -> protohackers::Result<()> {
    tracing_subscriber::fmt::init();
    let config = DispatcherConfig { port: 8089, ..Default::default() };

    dispatcher::run_multiplexed::<EchoState>(config, |mut conn: Connection<'_, EchoState>| {
        if !conn.data().greeted {
            conn.data().greeted = true;
            let _ = write_all_blocking(conn.stream(), b"welcome, type a line and it will be echoed back\n");
            return;
        }

        let mut buf = [0u8; 256];
        match read_available(conn.stream(), &mut buf) {
            Ok(0) => conn.close(),
            Ok(n) if buf[..n].starts_with(b"quit") => conn.close(),
            Ok(n) => {
                let _ = write_all_blocking(conn.stream(), &buf[..n]);
            }
            Err(_) => conn.close(),
        }
    })
    .await?;

    std::future::pending::<()>().await;
    #[allow(unreachable_code)]
    Ok(())
}
