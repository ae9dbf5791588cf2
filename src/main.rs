use architect_tenant::cli::{self, Cli};
use architect_tenant::Settings;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("architect_tenant=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    cli::run(cli, settings).await?;
    Ok(())
}
