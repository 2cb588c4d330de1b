//! Read API handlers. The catalog file is re-read on every request.

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use super::types::{ApiError, ProductQuery, ProductResponse, MAX_LIMIT};
use crate::model::Product;
use crate::storage::load_raw;

#[derive(Clone)]
pub struct AppState {
    pub catalog_path: Arc<PathBuf>,
}

const EMPTY_CATALOG: &str = "No products found. Run the scraper first to populate data.";

fn parse_ids(raw: &str) -> Result<Vec<u64>, ApiError> {
    raw.split(',')
        .map(|part| part.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| {
            ApiError::BadRequest(
                "Invalid ID format. Use comma-separated integers (e.g., '1,2,3')".to_string(),
            )
        })
}

fn record_id(record: &Value) -> Option<u64> {
    record.get("id").and_then(Value::as_u64)
}

fn to_product(record: Value) -> Result<Product, ApiError> {
    let product: Product = serde_json::from_value(record).map_err(|e| {
        error!("Error validating product data: {}", e);
        ApiError::Internal("Invalid product data format in storage".to_string())
    })?;
    product.validate().map_err(|e| {
        error!("Error validating product data: {}", e);
        ApiError::Internal("Invalid product data format in storage".to_string())
    })?;
    Ok(product)
}

/// Filter by ids first, then paginate the filtered set.
pub fn query_products(records: Vec<Value>, query: &ProductQuery) -> Result<ProductResponse, ApiError> {
    if records.is_empty() {
        return Err(ApiError::NotFound(EMPTY_CATALOG.to_string()));
    }

    let mut records = records;
    if let Some(raw_ids) = query.ids.as_deref().filter(|s| !s.trim().is_empty()) {
        let wanted = parse_ids(raw_ids)?;
        records.retain(|r| record_id(r).is_some_and(|id| wanted.contains(&id)));
        if records.is_empty() {
            return Err(ApiError::NotFound(format!("No products found with IDs: {}", raw_ids)));
        }
        info!("Filtered products by IDs: {:?}", wanted);
    }

    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::BadRequest("offset must be >= 0".to_string()));
    }
    if let Some(limit) = query.limit {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::BadRequest(format!("limit must be between 1 and {}", MAX_LIMIT)));
        }
    }

    let total = records.len();
    let start = (offset as usize).min(total);
    let end = match query.limit {
        Some(limit) => start.saturating_add(limit as usize).min(total),
        None => total,
    };

    let products = records
        .drain(start..end)
        .map(to_product)
        .collect::<Result<Vec<_>, _>>()?;

    info!("Returning {} products (total: {})", products.len(), total);
    Ok(ProductResponse { total, products })
}

pub fn find_product(records: Vec<Value>, product_id: u64) -> Result<Product, ApiError> {
    if records.is_empty() {
        return Err(ApiError::NotFound(EMPTY_CATALOG.to_string()));
    }
    let record = records
        .into_iter()
        .find(|r| record_id(r) == Some(product_id))
        .ok_or_else(|| ApiError::NotFound(format!("Product with ID {} not found", product_id)))?;
    let product = to_product(record)?;
    info!("Retrieved product ID {}: {}", product_id, product.name);
    Ok(product)
}

fn error_response(err: ApiError, path: &str) -> Response {
    (err.status(), Json(err.to_body(path))).into_response()
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Product Scraper API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /products": "Get all products or filter by IDs",
            "GET /products/{product_id}": "Get a specific product by ID",
            "GET /health": "Health check endpoint"
        }
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "product-scraper-api" }))
}

pub async fn list_products(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return error_response(ApiError::BadRequest(rejection.body_text()), uri.path());
        }
    };
    let records = load_raw(&state.catalog_path);
    match query_products(records, &query) {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(e, uri.path()),
    }
}

pub async fn get_product(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    product_id: Result<Path<u64>, PathRejection>,
) -> Response {
    let Path(product_id) = match product_id {
        Ok(id) => id,
        Err(rejection) => {
            return error_response(ApiError::BadRequest(rejection.body_text()), uri.path());
        }
    };
    let records = load_raw(&state.catalog_path);
    match find_product(records, product_id) {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => error_response(e, uri.path()),
    }
}
