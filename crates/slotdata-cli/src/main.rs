mod pg;
mod scrape;
mod stores;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "slotdata-cli")]
#[command(about = "Slot machine daily data scraper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape stores for one business date
    Scrape {
        /// Business date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Store ids to scrape; defaults to every active store
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        stores: Vec<String>,
        /// Scrape one store at a time
        #[arg(long)]
        sync: bool,
    },
    /// Re-run the stores that failed in an earlier session
    RetryFailed {
        /// Use the latest session for this date; defaults to today
        #[arg(long, conflicts_with = "session")]
        date: Option<NaiveDate>,
        /// Session id to retry
        #[arg(long)]
        session: Option<i64>,
        /// Scrape one store at a time
        #[arg(long)]
        sync: bool,
    },
    /// Capture and extract one store without writing anything
    DebugStore {
        store_id: String,
        /// Business date used for record ids
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Insert the site profile's seed stores
    SetupStores,
    /// List store ids linked from a prefecture's category page
    DiscoverStores {
        /// Prefecture slug as used in the category URL (e.g. tokyo)
        prefecture: String,
        /// Register the discovered stores
        #[arg(long)]
        save: bool,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("slotdata-cli: no command given; see --help");
        return Ok(());
    };

    let config = slotdata_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let profile = slotdata_core::load_site_profile_or_default(&config.site_profile_path)?;

    match command {
        Commands::Scrape { date, stores, sync } => {
            let pool = connect(&config, true).await?;
            let date = date.unwrap_or_else(today);
            scrape::run_scrape(&pool, &config, &profile, date, stores, sync).await
        }
        Commands::RetryFailed {
            date,
            session,
            sync,
        } => {
            let pool = connect(&config, true).await?;
            let target = match session {
                Some(id) => scrape::RetryTarget::Session(id),
                None => scrape::RetryTarget::LatestFor(date.unwrap_or_else(today)),
            };
            scrape::run_retry_failed(&pool, &config, &profile, target, sync).await
        }
        Commands::DebugStore { store_id, date } => {
            let date = date.unwrap_or_else(today);
            scrape::run_debug_store(&config, &profile, &store_id, date).await
        }
        Commands::SetupStores => {
            let pool = connect(&config, true).await?;
            stores::run_setup_stores(&pool, &profile).await
        }
        Commands::DiscoverStores { prefecture, save } => {
            let pool = if save {
                Some(connect(&config, true).await?)
            } else {
                None
            };
            stores::run_discover_stores(pool.as_ref(), &config, &profile, &prefecture).await
        }
        Commands::Db { command } => {
            let pool = connect(&config, false).await?;
            match command {
                DbCommands::Ping => {
                    slotdata_db::ping(&pool).await?;
                    println!("database ok");
                }
                DbCommands::Migrate => {
                    let applied = slotdata_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
            Ok(())
        }
    }
}

async fn connect(
    config: &slotdata_core::AppConfig,
    migrate: bool,
) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = slotdata_db::PoolConfig::from_app_config(config);
    let pool = slotdata_db::connect_pool(&config.database_url, pool_config).await?;
    if migrate {
        slotdata_db::run_migrations(&pool).await?;
    }
    Ok(pool)
}

/// Business dates follow the machine's local calendar.
fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
