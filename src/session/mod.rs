// Session backend: one shared automation resource per run, isolated sub-sessions per task.

pub mod http;

pub use http::HttpBackend;

use crate::model::{ExtractionError, PageSnapshot, ScrapeError};
use async_trait::async_trait;

/// Owns the expensive shared resource for the duration of a run.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn open(&self) -> Result<(), ScrapeError>;

    /// Mints an isolated context. Contexts never share cookies or storage.
    async fn new_sub_session(&self) -> Result<Box<dyn SubSession>, ExtractionError>;

    /// Releases the shared resource and force-closes any sub-session still open.
    async fn close(&self);
}

/// An isolated browsing context scoped to one task.
#[async_trait]
pub trait SubSession: Send + Sync {
    fn id(&self) -> u64;

    async fn goto(&self, url: &str) -> Result<PageSnapshot, ExtractionError>;

    /// Idempotent. Called from `Drop`, so it must not block.
    fn close(&self);
}

/// Scoped ownership of a sub-session: closed on `release` or on drop,
/// whichever comes first (including task abort and unwinding).
pub struct SubSessionGuard {
    inner: Option<Box<dyn SubSession>>,
}

impl SubSessionGuard {
    pub fn new(session: Box<dyn SubSession>) -> Self {
        Self { inner: Some(session) }
    }

    pub fn session(&self) -> Option<&dyn SubSession> {
        self.inner.as_deref()
    }

    pub fn release(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if let Some(session) = self.inner.take() {
            tracing::debug!("Closing sub-session {}", session.id());
            session.close();
        }
    }
}

impl Drop for SubSessionGuard {
    fn drop(&mut self) {
        self.close_inner();
    }
}
