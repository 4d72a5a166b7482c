use tracing::Level;
use tracing_subscriber::EnvFilter;

/// init_logging installs the console subscriber. RUST_LOG refines the given default level.
pub fn init_logging(level: Level) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}
