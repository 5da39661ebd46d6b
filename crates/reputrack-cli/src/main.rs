mod analyze;

use clap::{Parser, Subcommand};
use reputrack_core::{AppConfig, Platform};
use tracing_subscriber::EnvFilter;

use crate::analyze::AnalyzeCommands;

#[derive(Debug, Parser)]
#[command(name = "reputrack-cli")]
#[command(about = "RepuTrack command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Extract the rating and reviews of one product page and print them as JSON
    Extract {
        /// Product page URL
        #[arg(long)]
        url: String,

        /// Platform the page belongs to (amazon, flipkart, myntra, meesho, snapdeal)
        #[arg(long)]
        platform: Platform,

        /// Show the browser window instead of running headless
        #[arg(long)]
        headed: bool,
    },
    /// Run the analysis pipeline over tracked links
    Analyze {
        #[command(subcommand)]
        command: AnalyzeCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check the database connection
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("reputrack-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = reputrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => run_db(&config, command).await,
        Commands::Extract {
            url,
            platform,
            headed,
        } => run_extract(&config, &url, platform, headed).await,
        Commands::Analyze { command } => {
            let pool = connect(&config).await?;
            analyze::run_analyze(&config, pool, command).await
        }
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = reputrack_db::PoolConfig::from_app_config(config);
    Ok(reputrack_db::connect_pool(&config.database_url, pool_config).await?)
}

async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    match command {
        DbCommands::Ping => {
            reputrack_db::health_check(&pool).await?;
            println!("database connection ok");
        }
        DbCommands::Migrate => {
            let applied = reputrack_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

/// Extract one page without touching the database.
async fn run_extract(
    config: &AppConfig,
    url: &str,
    platform: Platform,
    headed: bool,
) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.browser_headless = !headed;
    let extractor = reputrack_pipeline::build_extractor(&config)?;

    let result = extractor.extract(url, platform).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(error) = &result.error {
        anyhow::bail!("extraction failed: {error}");
    }
    Ok(())
}
