//! Entry point for the Job Centre service.

use protohackers::dispatcher::DispatcherConfig;
use protohackers::job_centre;

#[tokio::main]
async fn main() -> protohackers::Result<()> {
    tracing_subscriber::fmt::init();
    let config = DispatcherConfig { threads: 64, ..Default::default() };
    job_centre::run(config).await?;
    std::future::pending::<()>().await;
    Ok(())
}
