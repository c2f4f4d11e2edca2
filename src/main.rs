use anyhow::Context;
use chainfold::{cli, config::Config, logging, runner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::cli_args()?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("failed to load config from {}", args.config_path.display()))?;

    let logging_guard = logging::init_tracing(&config.logging)?;
    tracing::info!(
        target: "chainfold",
        run_id = %logging_guard.run_id(),
        command = ?args.command,
        "starting"
    );

    runner::execute(&config, args.command).await
}
