// Site strategies: each one knows its target list and how to read its product pages.

pub mod mercadolibre;
pub mod olx;
pub mod page;

pub use mercadolibre::MercadoLibreStrategy;
pub use olx::OlxStrategy;

use crate::config::SitesConfig;
use crate::scraper::FetchStrategy;
use std::sync::Arc;
use thiserror::Error;

pub const STRATEGY_NAMES: [&str; 2] = ["mercadolibre", "olx"];

#[derive(Debug, Error)]
#[error("unknown strategy '{0}' (expected one of: mercadolibre, olx)")]
pub struct UnknownStrategy(pub String);

pub fn strategy_for(
    name: &str,
    max_products: usize,
    sites: &SitesConfig,
) -> Result<Arc<dyn FetchStrategy>, UnknownStrategy> {
    match name.to_lowercase().as_str() {
        "mercadolibre" => Ok(Arc::new(MercadoLibreStrategy::new(&sites.mercadolibre, max_products))),
        "olx" => Ok(Arc::new(OlxStrategy::new(&sites.olx, max_products))),
        other => Err(UnknownStrategy(other.to_string())),
    }
}
