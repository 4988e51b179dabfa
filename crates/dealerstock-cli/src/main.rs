mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dealerstock-cli")]
#[command(about = "Dealer inventory aggregation from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate the dealer configuration and list its sources by priority.
    Sources,
    /// Run one aggregation pass and print the result as JSON.
    Vehicles {
        /// Run only this source, without cross-source de-duplication.
        #[arg(long)]
        source: Option<String>,
    },
    /// Fetch one extended vehicle record and print it as JSON.
    Detail { vid: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = dealerstock_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Sources) => commands::run_sources(&config),
        Some(Commands::Vehicles { source }) => {
            commands::run_vehicles(&config, source.as_deref()).await
        }
        Some(Commands::Detail { vid }) => commands::run_detail(&config, &vid).await,
        None => {
            println!("dealerstock-cli: use --help to list commands");
            Ok(())
        }
    }
}
