// Core structs: Product, Target, task outcomes and error types
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A value that sources publish either as a number or as formatted text
/// (e.g. `299.99` or `"$299.99"`). Both forms are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl fmt::Display for NumberOrText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberOrText::Number(n) => write!(f, "{}", n),
            NumberOrText::Text(t) => f.write_str(t),
        }
    }
}

impl From<f64> for NumberOrText {
    fn from(value: f64) -> Self {
        NumberOrText::Number(value)
    }
}

impl From<&str> for NumberOrText {
    fn from(value: &str) -> Self {
        NumberOrText::Text(value.to_string())
    }
}

impl From<String> for NumberOrText {
    fn from(value: String) -> Self {
        NumberOrText::Text(value)
    }
}

/// One catalog entry. `id` is the merge key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub image_url: String,
    pub description: String,
    pub price: NumberOrText,
    #[serde(default)]
    pub rating: Option<NumberOrText>,
    #[serde(default)]
    pub specifications: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl Product {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName(self.id));
        }
        Ok(())
    }
}

/// A single fetch job: an address plus the catalog id it will be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: u64,
    pub url: String,
}

impl Target {
    /// Assigns ids `start_id, start_id + 1, ...` in list order.
    /// URLs past `u64::MAX` get no id and are left out.
    pub fn from_urls(urls: Vec<String>, start_id: u64) -> Vec<Target> {
        urls.into_iter()
            .zip(start_id..=u64::MAX)
            .map(|(url, id)| Target { id, url })
            .collect()
    }
}

/// A page as returned by a sub-session navigation.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub status: u16,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskFailure {
    pub id: u64,
    pub url: String,
    pub cause: String,
}

#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed(Product),
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn id(&self) -> u64 {
        match self {
            TaskOutcome::Completed(p) => p.id,
            TaskOutcome::Failed(f) => f.id,
        }
    }
}

/// Aggregate result of one orchestration run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub total: usize,
    pub products: Vec<Product>,
    pub failures: Vec<TaskFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.products.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Lifecycle of a single orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    BackendOpening,
    Running,
    Draining,
    Closed,
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("session backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not extract product: {0}")]
    Parse(String),
    #[error("sub-session {0} is closed")]
    SessionClosed(u64),
    #[error("extraction panicked: {0}")]
    Panicked(String),
    #[error("run cancelled before the task finished")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("product {0} has an empty name")]
    EmptyName(u64),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed catalog: {0}")]
    Malformed(String),
}
