use crate::ApiResponse;
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

const MAX_LIMIT: u64 = 100;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// Page clamped to >= 1
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    /// Limit clamped to 1..=100
    pub fn limit(&self) -> u64 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}
