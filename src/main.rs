mod config;
mod fetcher;
mod models;
mod notifier;
mod pipeline;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;
use fetcher::AdzunaFetcher;
use notifier::EmailNotifier;
use pipeline::Tracker;
use store::open_store;

#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(about = "Track new job postings and email a digest of what changed")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: fetch, record new listings, send the digest
    Run {
        /// Check and record new listings without sending email
        #[arg(long)]
        dry_run: bool,
    },

    /// Send a test email and exit
    TestEmail,

    /// Show tracker statistics
    Stats,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            eprintln!("\nCreate a .env file or export the missing variables.");
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Run { dry_run: false }) {
        Commands::Run { dry_run } => run_pipeline(&config, dry_run),

        Commands::TestEmail => {
            println!("Sending test email...");
            let notifier = EmailNotifier::new(&config.email);
            let ok = notifier.send_test();
            std::process::exit(if ok { 0 } else { 1 })
        }

        Commands::Stats => show_stats(&config),
    }
}

fn run_pipeline(config: &Config, dry_run: bool) -> Result<()> {
    let store = open_store(&config.storage)?;
    let fetcher = AdzunaFetcher::new(&config.api)?;
    let notifier = EmailNotifier::new(&config.email);

    println!("Searching for: {}", config.search.keywords);
    println!("Locations: {}", config.search.locations.join(", "));
    println!();

    let tracker = Tracker::new(&fetcher, store.as_ref(), &notifier, &config.search);
    let summary = tracker.run(dry_run)?;

    if summary.fetched == 0 {
        println!("No listings returned for this search.");
    } else if dry_run && summary.new > 0 {
        println!(
            "Dry run: {} new listing(s) recorded, no email sent.",
            summary.new
        );
    }
    if summary.notified == Some(false) {
        println!("Digest email failed; new listings stay unnotified.");
    }

    println!("\nRun complete");
    println!("  Candidates fetched: {}", summary.fetched);
    println!("  New listings:       {}", summary.new);
    println!("  Total tracked:      {}", summary.total);
    Ok(())
}

fn show_stats(config: &Config) -> Result<()> {
    let store = open_store(&config.storage)?;
    let total = store.count()?;

    println!("Total jobs tracked: {total}");
    if total > 0 {
        println!("\nRecent listings:");
        for listing in store.all()?.into_iter().take(5) {
            println!("  - {} at {}", listing.title, listing.company);
            if let Some(first_seen) = &listing.first_seen {
                println!("    Added: {first_seen}");
            }
        }
    }
    Ok(())
}
