use crate::model::{ExtractionError, Product, Target};
use crate::session::SubSession;

/// Site-specific capability: which pages to visit, and how to turn one into a product.
#[async_trait::async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// The full work list, in the order ids are assigned.
    async fn list_targets(&self) -> Vec<String>;

    async fn extract(
        &self,
        session: &dyn SubSession,
        target: &Target,
    ) -> Result<Product, ExtractionError>;
}
