use clap::Parser;
use tracing_subscriber::EnvFilter;

use pokemood::cli::Args;
use pokemood::config::AppConfig;
use pokemood::web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    web::serve(&args, config).await?;

    Ok(())
}
