// One fetch+extract for one target, with failure contained to a tagged outcome.
use crate::model::{ExtractionError, Target, TaskFailure, TaskOutcome};
use crate::scraper::FetchStrategy;
use crate::session::{SessionBackend, SubSessionGuard};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `strategy.extract` for `target` inside its own sub-session.
/// Never returns an error: every failure mode becomes `TaskOutcome::Failed`.
pub async fn execute(
    backend: &dyn SessionBackend,
    strategy: &dyn FetchStrategy,
    target: &Target,
    task_timeout: Duration,
) -> TaskOutcome {
    let guard = match backend.new_sub_session().await {
        Ok(session) => SubSessionGuard::new(session),
        Err(e) => return failed(target, e),
    };

    info!("[ID:{}] Scraping {}", target.id, target.url);
    let result = match guard.session() {
        Some(session) => {
            let extraction = AssertUnwindSafe(strategy.extract(session, target)).catch_unwind();
            match timeout(task_timeout, extraction).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(ExtractionError::Panicked(panic_message(payload))),
                Err(_) => Err(ExtractionError::Timeout(task_timeout)),
            }
        }
        None => Err(ExtractionError::SessionClosed(0)),
    };
    guard.release();

    match result {
        Ok(product) if product.id != target.id => failed(
            target,
            ExtractionError::Parse(format!("strategy returned id {} for target {}", product.id, target.id)),
        ),
        Ok(product) => match product.validate() {
            Ok(()) => {
                info!("[ID:{}] Successfully scraped: {}", target.id, product.name);
                TaskOutcome::Completed(product)
            }
            Err(e) => failed(target, ExtractionError::Parse(e.to_string())),
        },
        Err(e) => failed(target, e),
    }
}

fn failed(target: &Target, error: ExtractionError) -> TaskOutcome {
    warn!("[ID:{}] Failed to scrape {}: {}", target.id, target.url, error);
    TaskOutcome::Failed(TaskFailure {
        id: target.id,
        url: target.url.clone(),
        cause: error.to_string(),
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, ScriptedStrategy};

    fn target(id: u64) -> Target {
        Target { id, url: format!("https://shop.test/item/{}", id) }
    }

    async fn opened_backend() -> MockBackend {
        let backend = MockBackend::new();
        backend.open().await.unwrap();
        backend
    }

    #[tokio::test]
    async fn success_returns_product_and_releases_session() {
        let backend = opened_backend().await;
        let strategy = ScriptedStrategy::new(3);

        let outcome = execute(&backend, &strategy, &target(2), DEFAULT_TASK_TIMEOUT).await;
        match outcome {
            TaskOutcome::Completed(p) => assert_eq!(p.id, 2),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.live_sub_sessions(), 0);
        assert_eq!(backend.sub_sessions_created(), 1);
    }

    #[tokio::test]
    async fn extraction_error_is_tagged_with_target_id() {
        let backend = opened_backend().await;
        let strategy = ScriptedStrategy::new(3).failing(&[3]);

        let outcome = execute(&backend, &strategy, &target(3), DEFAULT_TASK_TIMEOUT).await;
        match outcome {
            TaskOutcome::Failed(f) => {
                assert_eq!(f.id, 3);
                assert!(f.cause.contains("scripted failure"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.live_sub_sessions(), 0);
    }

    #[tokio::test]
    async fn timeout_becomes_failure() {
        let backend = opened_backend().await;
        let strategy = ScriptedStrategy::new(1).hanging(&[1]);

        let outcome = execute(&backend, &strategy, &target(1), Duration::from_millis(50)).await;
        match outcome {
            TaskOutcome::Failed(f) => assert!(f.cause.contains("timed out")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.live_sub_sessions(), 0);
    }

    #[tokio::test]
    async fn panic_becomes_failure() {
        let backend = opened_backend().await;
        let strategy = ScriptedStrategy::new(1).panicking(&[1]);

        let outcome = execute(&backend, &strategy, &target(1), DEFAULT_TASK_TIMEOUT).await;
        match outcome {
            TaskOutcome::Failed(f) => assert!(f.cause.contains("scripted panic")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.live_sub_sessions(), 0);
    }

    #[tokio::test]
    async fn closed_backend_fails_without_sub_session() {
        let backend = MockBackend::new();
        let strategy = ScriptedStrategy::new(1);

        let outcome = execute(&backend, &strategy, &target(1), DEFAULT_TASK_TIMEOUT).await;
        assert!(matches!(outcome, TaskOutcome::Failed(_)));
        assert_eq!(strategy.extractions(), 0);
    }
}
