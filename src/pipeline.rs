// Scrape command: orchestrate, then merge into the persisted catalog.
use crate::config::AppConfig;
use crate::model::{PersistenceError, RunReport, RunState, ScrapeError};
use crate::parser::{strategy_for, UnknownStrategy};
use crate::scraper::{EngineSettings, FetchStrategy, Orchestrator};
use crate::session::{HttpBackend, SessionBackend};
use crate::storage::{load_catalog, merge, save_catalog, Catalog};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategy),
    #[error(transparent)]
    Backend(#[from] ScrapeError),
    #[error("no products were scraped ({failed} of {total} targets failed)")]
    NothingScraped { total: usize, failed: usize },
    #[error("failed to save products: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub strategy: String,
    pub max_products: usize,
    pub max_concurrent: usize,
    /// Explicit URLs to scrape instead of the strategy's own list.
    pub urls: Vec<String>,
    /// First id handed out when `urls` is non-empty.
    pub start_id: u64,
}

impl ScrapeRequest {
    pub fn listed(strategy: &str, max_products: usize, max_concurrent: usize) -> Self {
        Self {
            strategy: strategy.to_string(),
            max_products,
            max_concurrent,
            urls: Vec::new(),
            start_id: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeSummary {
    pub scraped: usize,
    pub failed: usize,
    pub catalog_total: usize,
    pub cancelled: bool,
}

/// Runs the configured HTTP backend against the named strategy.
pub async fn run_scrape<F>(
    config: &AppConfig,
    request: &ScrapeRequest,
    shutdown: F,
) -> Result<ScrapeSummary, PipelineError>
where
    F: Future<Output = ()>,
{
    let strategy = strategy_for(&request.strategy, request.max_products, &config.sites)?;
    info!("Using strategy: {}", strategy.name());
    let backend: Arc<dyn SessionBackend> = Arc::new(HttpBackend::new(config.scraper.clone()));
    scrape_into_catalog(backend, strategy, config, request, shutdown).await
}

fn log_state_changes(mut states: watch::Receiver<RunState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            match state {
                RunState::Running => info!("Session backend ready, scraping..."),
                RunState::Draining => info!("All targets admitted, waiting for in-flight tasks"),
                RunState::Closed => break,
                _ => {}
            }
        }
    })
}

pub async fn scrape_into_catalog<F>(
    backend: Arc<dyn SessionBackend>,
    strategy: Arc<dyn FetchStrategy>,
    config: &AppConfig,
    request: &ScrapeRequest,
    shutdown: F,
) -> Result<ScrapeSummary, PipelineError>
where
    F: Future<Output = ()>,
{
    let settings = EngineSettings {
        max_concurrent: request.max_concurrent,
        task_timeout: config.scraper.task_timeout(),
    };
    let orchestrator = Orchestrator::new(backend, settings);
    let state_log = log_state_changes(orchestrator.subscribe());
    let result = if request.urls.is_empty() {
        orchestrator.run_all(strategy, shutdown).await
    } else {
        info!("Scraping {} explicit URL(s) from id {}", request.urls.len(), request.start_id);
        orchestrator
            .run_batch(strategy, request.urls.clone(), request.start_id, shutdown)
            .await
    };
    drop(orchestrator);
    let _ = state_log.await;
    let report: RunReport = result?;

    for failure in &report.failures {
        warn!("[ID:{}] dropped: {}", failure.id, failure.cause);
    }
    if report.products.is_empty() {
        warn!("No products were scraped");
        return Err(PipelineError::NothingScraped {
            total: report.total,
            failed: report.failed(),
        });
    }

    let path: &Path = &config.catalog_path;
    let existing: Catalog = load_catalog(path);
    if existing.is_empty() {
        info!("Starting a new catalog at {}", path.display());
    } else if !existing.unparsed().is_empty() {
        warn!(
            "{} stored record(s) in {} are not valid products and are kept as-is",
            existing.unparsed().len(),
            path.display()
        );
    }
    let merged = merge(&existing, &report.products);
    if let Err(e) = save_catalog(&merged, path) {
        error!("Failed to save products: {}", e);
        return Err(e.into());
    }

    info!(
        "Successfully scraped and saved {} products in {:.1}s",
        report.succeeded(),
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
    info!("Total products in database: {}", merged.len());
    Ok(ScrapeSummary {
        scraped: report.succeeded(),
        failed: report.failed(),
        catalog_total: merged.len(),
        cancelled: report.cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::load_raw;
    use crate::testing::{sample_product, MockBackend, ScriptedStrategy};
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::tempdir;

    fn config_at(path: &Path) -> AppConfig {
        AppConfig { catalog_path: path.to_path_buf(), ..AppConfig::default() }
    }

    #[tokio::test]
    async fn scrape_merges_into_existing_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        let existing = Catalog::from_products(vec![sample_product(1, "Stale"), sample_product(42, "Kept")]);
        save_catalog(&existing, &path).unwrap();

        let backend = Arc::new(MockBackend::new());
        let strategy = Arc::new(ScriptedStrategy::new(3).failing(&[2]));
        let summary = scrape_into_catalog(
            backend.clone(),
            strategy,
            &config_at(&path),
            &ScrapeRequest::listed("scripted", 3, 2),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(summary.scraped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.catalog_total, 3);
        let saved = load_catalog(&path);
        assert_eq!(saved.get(1).map(|p| p.name.as_str()), Some("Product 1"));
        assert_eq!(saved.get(42).map(|p| p.name.as_str()), Some("Kept"));
        assert!(saved.get(2).is_none());
        assert_eq!(backend.closes(), 1);
    }

    #[tokio::test]
    async fn nothing_scraped_leaves_catalog_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");

        let result = scrape_into_catalog(
            Arc::new(MockBackend::new()),
            Arc::new(ScriptedStrategy::new(2).failing(&[1, 2])),
            &config_at(&path),
            &ScrapeRequest::listed("scripted", 3, 2),
            std::future::pending(),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::NothingScraped { total: 2, failed: 2 })));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn backend_failure_surfaces() {
        let dir = tempdir().unwrap();
        let result = scrape_into_catalog(
            Arc::new(MockBackend::failing()),
            Arc::new(ScriptedStrategy::new(2)),
            &config_at(&dir.path().join("products.json")),
            &ScrapeRequest::listed("scripted", 2, 2),
            std::future::pending(),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Backend(ScrapeError::BackendUnavailable(_)))));
    }

    #[tokio::test]
    async fn unknown_strategy_is_rejected() {
        let request = ScrapeRequest::listed("ebay", 1, 1);
        let result = run_scrape(&AppConfig::default(), &request, std::future::pending()).await;
        assert!(matches!(result, Err(PipelineError::UnknownStrategy(_))));
    }

    #[tokio::test]
    async fn invalid_stored_record_does_not_wipe_the_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        let mut stored: Vec<Value> = (1..=10)
            .map(|id| serde_json::to_value(sample_product(id, &format!("Old {}", id))).unwrap())
            .collect();
        stored.push(json!({
            "id": 11, "name": "", "image_url": "", "description": "", "price": "$1"
        }));
        fs::write(&path, serde_json::to_string(&stored).unwrap()).unwrap();

        let summary = scrape_into_catalog(
            Arc::new(MockBackend::new()),
            Arc::new(ScriptedStrategy::new(1)),
            &config_at(&path),
            &ScrapeRequest::listed("scripted", 1, 1),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(summary.catalog_total, 11);
        assert_eq!(load_raw(&path).len(), 11);
        let saved = load_catalog(&path);
        assert_eq!(saved.get(1).map(|p| p.name.as_str()), Some("Product 1"));
        assert_eq!(saved.get(10).map(|p| p.name.as_str()), Some("Old 10"));
        assert_eq!(saved.unparsed().len(), 1);
    }

    #[tokio::test]
    async fn explicit_urls_are_scraped_from_start_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        let request = ScrapeRequest {
            urls: vec!["https://shop.test/item/a".into(), "https://shop.test/item/b".into()],
            start_id: 50,
            ..ScrapeRequest::listed("scripted", 10, 2)
        };

        let summary = scrape_into_catalog(
            Arc::new(MockBackend::new()),
            Arc::new(ScriptedStrategy::new(5)),
            &config_at(&path),
            &request,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(summary.scraped, 2);
        let saved = load_catalog(&path);
        assert!(saved.get(50).is_some());
        assert!(saved.get(51).is_some());
        assert!(saved.get(1).is_none());
    }
}
