// Bounded-concurrency driver: one backend per run, one task per target.
use crate::model::{
    ExtractionError, RunReport, RunState, ScrapeError, Target, TaskFailure, TaskOutcome,
};
use crate::scraper::executor::{self, DEFAULT_TASK_TIMEOUT};
use crate::scraper::FetchStrategy;
use crate::session::SessionBackend;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_CONCURRENT: usize = 10;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_concurrent: usize,
    pub task_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

pub struct Orchestrator {
    backend: Arc<dyn SessionBackend>,
    settings: EngineSettings,
    state: watch::Sender<RunState>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn SessionBackend>, mut settings: EngineSettings) -> Self {
        if settings.max_concurrent == 0 {
            warn!("max_concurrent was 0, using 1");
            settings.max_concurrent = 1;
        }
        info!(
            "Orchestrator initialized: max_concurrent={}, timeout={:?}",
            settings.max_concurrent, settings.task_timeout
        );
        let (state, _) = watch::channel(RunState::Idle);
        Self { backend, settings, state }
    }

    #[cfg(test)]
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn transition(&self, next: RunState) {
        let previous = self.state.send_replace(next);
        debug!("Run state: {:?} -> {:?}", previous, next);
    }

    /// Scrapes every target the strategy lists, ids starting at 1.
    /// Once `shutdown` resolves, in-flight work is aborted and the rest is reported cancelled.
    pub async fn run_all<F>(
        &self,
        strategy: Arc<dyn FetchStrategy>,
        shutdown: F,
    ) -> Result<RunReport, ScrapeError>
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        tokio::pin!(shutdown);
        let urls = tokio::select! {
            urls = strategy.list_targets() => urls,
            _ = &mut shutdown => {
                warn!("Shutdown requested while listing targets");
                return Ok(self.cancelled_before_start(Vec::new(), started_at));
            }
        };
        self.run_batch(strategy, urls, 1, shutdown).await
    }

    /// Scrapes an explicit URL list, ids starting at `start_id`.
    pub async fn run_batch<F>(
        &self,
        strategy: Arc<dyn FetchStrategy>,
        urls: Vec<String>,
        start_id: u64,
        shutdown: F,
    ) -> Result<RunReport, ScrapeError>
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let requested = urls.len();
        let targets = Target::from_urls(urls, start_id);
        if targets.len() < requested {
            warn!(
                "Only {} of {} URLs fit in the id space from {}; the rest are skipped",
                targets.len(),
                requested,
                start_id
            );
        }
        let total = targets.len();
        info!("Starting scrape of {} products with '{}'", total, strategy.name());
        tokio::pin!(shutdown);

        self.transition(RunState::BackendOpening);
        let opened = tokio::select! {
            opened = self.backend.open() => opened,
            _ = &mut shutdown => {
                warn!("Shutdown requested while the session backend was opening");
                self.backend.close().await;
                return Ok(self.cancelled_before_start(targets, started_at));
            }
        };
        if let Err(e) = opened {
            error!("Session backend failed to open: {}", e);
            self.transition(RunState::Closed);
            return Err(e);
        }

        self.transition(RunState::Running);
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent));
        let mut pending: BTreeMap<u64, String> =
            targets.iter().map(|t| (t.id, t.url.clone())).collect();
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        // Admission happens here, in list order: a task is only spawned once it holds a permit.
        for target in targets {
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = &mut shutdown => {
                    cancelled = true;
                    break;
                }
            };
            let backend = self.backend.clone();
            let strategy = strategy.clone();
            let task_timeout = self.settings.task_timeout;
            tasks.spawn(async move {
                let _permit = permit;
                executor::execute(backend.as_ref(), strategy.as_ref(), &target, task_timeout).await
            });
        }

        if cancelled {
            warn!("Shutdown requested, aborting {} in-flight task(s)", tasks.len());
            tasks.abort_all();
        } else {
            self.transition(RunState::Draining);
        }

        let mut products = Vec::new();
        let mut failures = Vec::new();

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => {
                        pending.remove(&outcome.id());
                        match outcome {
                            TaskOutcome::Completed(product) => products.push(product),
                            TaskOutcome::Failed(failure) => failures.push(failure),
                        }
                    }
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => error!("Scrape task crashed outside extraction: {}", e),
                    None => break,
                },
                _ = &mut shutdown, if !cancelled => {
                    warn!("Shutdown requested, aborting {} in-flight task(s)", tasks.len());
                    cancelled = true;
                    tasks.abort_all();
                }
            }
        }

        // Whatever never reported back was aborted or crashed.
        for (id, url) in pending {
            let cause = if cancelled {
                ExtractionError::Cancelled.to_string()
            } else {
                "task terminated without an outcome".to_string()
            };
            failures.push(TaskFailure { id, url, cause });
        }

        self.backend.close().await;
        self.transition(RunState::Closed);

        let report = RunReport {
            total,
            products,
            failures,
            started_at,
            finished_at: Utc::now(),
            cancelled,
        };
        info!(
            "Scraping completed in {} ms: {}/{} successful, {} failed",
            report.elapsed().num_milliseconds(),
            report.succeeded(),
            report.total,
            report.failed()
        );
        Ok(report)
    }

    /// Report for a run stopped before any task was admitted.
    fn cancelled_before_start(&self, targets: Vec<Target>, started_at: DateTime<Utc>) -> RunReport {
        self.transition(RunState::Closed);
        let failures: Vec<TaskFailure> = targets
            .into_iter()
            .map(|t| TaskFailure { id: t.id, url: t.url, cause: ExtractionError::Cancelled.to_string() })
            .collect();
        RunReport {
            total: failures.len(),
            products: Vec::new(),
            failures,
            started_at,
            finished_at: Utc::now(),
            cancelled: true,
        }
    }
}
