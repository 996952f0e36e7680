mod aggregate;
mod capacity;
mod config;
mod extract;
mod logging;
mod models;
mod notify;
mod pipeline;
mod scrapers;
mod statistics;
mod storage;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::{CrawlConfig, NetworkProfile, SiteConfig, WaitPolicy};
use pipeline::Pipeline;
use std::path::PathBuf;
use std::time::Duration;
use storage::DataLayout;
use tracing::info;

#[derive(Parser)]
#[command(name = "occupancy-scout", about = "Daily hotel availability survey for Ostrovok")]
struct Cli {
    /// Root directory for tables/ and logs/
    #[arg(long, global = true, env = "OCCUPANCY_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Collection date (YYYY-MM-DD); defaults to today
    #[arg(long, global = true, env = "OCCUPANCY_DATE")]
    date: Option<NaiveDate>,

    /// Network class; `slow` doubles every wait
    #[arg(
        long,
        global = true,
        env = "OCCUPANCY_PROFILE",
        value_enum,
        default_value_t = NetworkProfile::Fast
    )]
    profile: NetworkProfile,

    /// Search pages to visit at most
    #[arg(long, global = true, env = "OCCUPANCY_MAX_PAGES", default_value_t = 3)]
    max_pages: u32,

    /// Guests per search
    #[arg(long, global = true, default_value_t = 1)]
    guests: u32,

    /// Rely on the record count alone to find the last page
    #[arg(long, global = true)]
    no_next_link_check: bool,

    /// Show the browser window
    #[arg(long, global = true)]
    headful: bool,

    /// Also write logs to <data-dir>/logs/<date>.log
    #[arg(long, global = true, env = "OCCUPANCY_LOG_FILE")]
    log_file: bool,

    /// Post the run summary here instead of only logging it
    #[arg(long, global = true, env = "OCCUPANCY_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Pause between hotel detail requests, in milliseconds
    #[arg(long, global = true, default_value_t = 300)]
    request_pause_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the hotel listing and save the hotels table
    Hotels,
    /// Request rates for every saved hotel and save the rooms table
    Rooms,
    /// Build the statistics table from the saved hotels and rooms tables
    Stats,
    /// All stages in order, then send the run summary
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let layout = DataLayout::new(&cli.data_dir);
    let log_dir = cli.log_file.then(|| layout.logs_dir());
    let _guard = logging::init(log_dir.as_deref(), &date.format("%Y-%m-%d").to_string())?;

    info!("🏨 Occupancy Scout - Ostrovok hotel survey");
    info!(date = %date, profile = ?cli.profile, "Starting");

    let pipeline = Pipeline {
        site: SiteConfig::default(),
        crawl: CrawlConfig {
            wait: WaitPolicy::for_profile(cli.profile),
            max_pages: cli.max_pages,
            guests: cli.guests,
            check_next_link: !cli.no_next_link_check,
            headless: !cli.headful,
        },
        layout,
        date,
        request_pause: Duration::from_millis(cli.request_pause_ms),
    };

    match cli.command {
        Commands::Hotels => {
            pipeline.hotels().await?;
        }
        Commands::Rooms => {
            pipeline.rooms().await?;
        }
        Commands::Stats => {
            pipeline.statistics()?;
        }
        Commands::Run => {
            let (summary, failure) = pipeline::run_stages(&pipeline).await;
            let notifier = notify::notifier_for(cli.webhook_url.as_deref());
            notify::deliver(notifier.as_ref(), &summary).await;
            if let Some(err) = failure {
                return Err(err);
            }
        }
    }

    Ok(())
}
