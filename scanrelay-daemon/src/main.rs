use anyhow::Result;
use clap::Parser;

use scanrelay_core::config::ScanrelayConfig;
use scanrelay_daemon::cli::DaemonCli;
use scanrelay_daemon::logging;
use scanrelay_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = ScanrelayConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "scanrelay-daemon starting"
    );

    let orchestrator = Orchestrator::builder(config).build()?;
    orchestrator.run().await?;

    tracing::info!("scanrelay-daemon shut down");
    Ok(())
}
