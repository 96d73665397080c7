use std::sync::Arc;

use clap::Parser;
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

use fieldgate::authz::loader::load_policies;
use fieldgate::graphql::build_schema;
use fieldgate::settings::Settings;
use fieldgate::web;

#[derive(Parser, Debug)]
#[command(
    name = "fieldgate",
    version,
    about = "Field-level authorization gate for GraphQL"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // load policy
    let store = Arc::new(load_policies(&settings.authz.policies_dir)?);

    web::serve(settings, store, build_schema()).await?;
    Ok(())
}
