use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tombola::config::Config;
use tombola::{server, Args};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = Config::load(&args)?;

    server::run(config).await
}
