//! Entry point for the Line Reversal (LRCP) service.

use protohackers::dispatcher::DispatcherConfig;
use protohackers::lrcp;

#[tokio::main]
async fn main() -> protohackers::Result<()> {
    tracing_subscriber::fmt::init();
    let config = DispatcherConfig::default();
    lrcp::run(config).await?;
    // The datagram dispatcher spawns its receive loop and returns; keep the
    // process alive to let it run.
    std::future::pending::<()>().await;
    Ok(())
}
