// Scraping engine: strategy seam, per-target executor, bounded orchestrator.

pub mod executor;
pub mod orchestrator;
pub mod traits;

pub use orchestrator::{EngineSettings, Orchestrator};
pub use traits::FetchStrategy;
