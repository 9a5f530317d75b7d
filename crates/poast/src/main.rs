use clap::Parser;
use tracing_subscriber::EnvFilter;

use poast::cli::Cli;
use poast::config::{LogFormat, PoastConfig};

fn init_tracing(config: &PoastConfig) {
    let level = &config.log_level;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("poast={level},poast_sync={level}").into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = PoastConfig::from_env()?;
    cli.apply(&mut config);
    init_tracing(&config);

    let mut stdout = std::io::stdout();
    poast::commands::run(cli.command, &config, &mut stdout).await?;
    Ok(())
}
