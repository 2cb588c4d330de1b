mod api;
mod config;
mod model;
mod parser;
mod pipeline;
mod scraper;
mod session;
mod storage;
mod utils;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use config::{load_config, AppConfig};
use pipeline::{run_scrape, ScrapeRequest};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "product-harvester")]
#[command(about = "Product scraper with a read-only catalog API")]
#[command(version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Catalog file (overrides config)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scraper and merge results into the catalog
    Scrape {
        /// Maximum number of products to scrape
        #[arg(long, default_value = "10")]
        max_products: usize,

        /// Maximum concurrent scraping tasks (defaults to the config value)
        #[arg(long)]
        concurrent: Option<usize>,

        /// Site strategy to use
        #[arg(long = "type", default_value = "mercadolibre", value_parser = parser::STRATEGY_NAMES)]
        strategy: String,

        /// Scrape these product URLs instead of the strategy's list (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,

        /// First catalog id for --url targets
        #[arg(long, default_value = "1")]
        start_id: u64,
    },
    /// Serve the catalog over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
    /// Scrape, then serve if scraping succeeded
    Run {
        #[arg(long, default_value = "10")]
        max_products: usize,
    },
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down...");
}

async fn scrape(config: &AppConfig, request: ScrapeRequest) -> bool {
    info!("Starting product scraper");
    match run_scrape(config, &request, shutdown_signal()).await {
        Ok(summary) => {
            info!(
                "Scrape finished: {} scraped, {} failed, {} in catalog{}",
                summary.scraped,
                summary.failed,
                summary.catalog_total,
                if summary.cancelled { " (cancelled)" } else { "" }
            );
            !summary.cancelled
        }
        Err(e) => {
            error!("Scrape failed: {}", e);
            false
        }
    }
}

async fn serve(config: &AppConfig, host: Option<String>, port: Option<u16>) -> bool {
    let host = host.unwrap_or_else(|| config.api.host.clone());
    let port = port.unwrap_or(config.api.port);
    info!("Starting API server");
    match api::serve(&host, port, config.catalog_path.clone(), shutdown_signal()).await {
        Ok(()) => true,
        Err(e) => {
            error!("API server error: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {}", panic_info);
    }));

    let mut config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }

    let ok = match cli.command {
        Command::Scrape { max_products, concurrent, strategy, urls, start_id } => {
            let request = ScrapeRequest {
                urls,
                start_id,
                ..ScrapeRequest::listed(
                    &strategy,
                    max_products,
                    concurrent.unwrap_or(config.scraper.max_concurrent),
                )
            };
            scrape(&config, request).await
        }
        Command::Serve { host, port } => serve(&config, host, port).await,
        Command::Run { max_products } => {
            let request =
                ScrapeRequest::listed("mercadolibre", max_products, config.scraper.max_concurrent);
            if scrape(&config, request).await {
                serve(&config, None, None).await
            } else {
                error!("Scraping failed, aborting server start");
                false
            }
        }
    };

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
