//! Read API request/response types.

use crate::model::Product;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_LIMIT: i64 = 1000;

/// Query string of `GET /products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    /// Comma-separated product ids, e.g. `1,2,3`
    pub ids: Option<String>,
    /// Page size, 1..=1000
    pub limit: Option<i64>,
    /// Items to skip, defaults to 0
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    /// Size of the filtered set before pagination
    pub total: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Bad Request",
            ApiError::NotFound(_) => "Not Found",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }

    pub fn to_body(&self, path: &str) -> ErrorResponse {
        ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            path: path.to_string(),
        }
    }
}
