//! Entry point for the Speed Daemon service.

use protohackers::dispatcher::DispatcherConfig;
use protohackers::speed_daemon;

#[tokio::main]
async fn main() -> protohackers::Result<()> {
    tracing_subscriber::fmt::init();
    let config = DispatcherConfig { threads: 64, ..Default::default() };
    speed_daemon::run(config).await?;
    // `run` spawns its worker tasks and returns immediately; block forever
    // to keep the process (and those tasks) alive.
    std::future::pending::<()>().await;
    Ok(())
}
