//! Marketplace API Library
//!
//! Customers buy from dealers, dealers restock from providers. This crate
//! carries the HTTP surface, the service layer and the persistence model
//! behind both flows.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{AuthConfig, AuthService};
use crate::db::{DbPool, IdRetryConfig};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: config::AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let id_retry = IdRetryConfig {
            max_attempts: config.id_retry_max_attempts,
        };
        let services = handlers::AppServices::new(db.clone(), id_retry);
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit)
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn success_envelope_carries_only_data_and_meta() {
        let body = serde_json::to_value(ApiResponse::success(json!({"id": 7}))).unwrap();
        let mut keys: Vec<&str> = body
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, ["data", "meta", "success"]);
        assert_eq!(body["data"]["id"], 7);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = PaginatedResponse::new(vec![1, 2], 41, 3, 20);
        assert_eq!(page.total_pages, 3);
        let empty = PaginatedResponse::<i32>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let auth = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me));

    let customers = Router::new()
        .route(
            "/customers/:id",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        .route(
            "/customers/:id/orders",
            get(handlers::customers::customer_orders),
        );

    let dealers = Router::new()
        .route("/dealers", get(handlers::dealers::list_dealers))
        .route(
            "/dealers/:id",
            get(handlers::dealers::get_dealer).put(handlers::dealers::update_dealer),
        )
        .route(
            "/dealers/:id/inventory",
            get(handlers::dealers::dealer_inventory),
        )
        .route("/dealers/:id/orders", get(handlers::dealers::dealer_orders))
        .route(
            "/dealers/:id/purchase-orders",
            get(handlers::dealers::dealer_purchase_orders),
        );

    let providers = Router::new()
        .route("/providers", get(handlers::providers::list_providers))
        .route(
            "/providers/:id",
            get(handlers::providers::get_provider).put(handlers::providers::update_provider),
        )
        .route(
            "/providers/:id/substances",
            get(handlers::providers::provider_substances),
        )
        .route(
            "/providers/:id/purchase-orders",
            get(handlers::providers::provider_purchase_orders),
        )
        .route(
            "/providers/:id/transports",
            get(handlers::providers::list_transports).post(handlers::providers::create_transport),
        )
        .route(
            "/providers/:id/transports/:transport_id",
            put(handlers::providers::update_transport)
                .delete(handlers::providers::delete_transport),
        );

    let catalog = Router::new()
        .route(
            "/substances",
            get(handlers::substances::list_substances)
                .post(handlers::substances::create_substance),
        )
        .route(
            "/substances/:id",
            get(handlers::substances::get_substance)
                .put(handlers::substances::update_substance)
                .delete(handlers::substances::delete_substance),
        )
        .route(
            "/inventories",
            get(handlers::inventories::list_inventories)
                .post(handlers::inventories::create_inventory),
        )
        .route(
            "/inventories/:id",
            get(handlers::inventories::get_inventory)
                .put(handlers::inventories::update_inventory)
                .delete(handlers::inventories::delete_inventory),
        )
        .route("/listings", get(handlers::inventories::list_listings));

    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::place_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route("/orders/:id/pay", post(handlers::orders::pay_order))
        .route(
            "/orders/:id/shipment",
            get(handlers::orders::get_shipment).post(handlers::orders::create_shipment),
        )
        .route(
            "/shipments/:id/status",
            put(handlers::shipments::update_shipment_status),
        );

    let procurement = Router::new()
        .route(
            "/purchase-orders",
            get(handlers::purchase_orders::list_purchase_orders)
                .post(handlers::purchase_orders::create_purchase_order),
        )
        .route(
            "/purchase-orders/:id",
            get(handlers::purchase_orders::get_purchase_order),
        )
        .route(
            "/purchase-orders/:id/status",
            put(handlers::purchase_orders::update_purchase_order_status),
        )
        .route(
            "/purchase-orders/:id/pay",
            post(handlers::purchase_orders::pay_purchase_order),
        )
        .route(
            "/transactions",
            get(handlers::transactions::list_transactions),
        )
        .route(
            "/transactions/:id",
            get(handlers::transactions::get_transaction),
        );

    Router::new()
        .merge(auth)
        .merge(customers)
        .merge(dealers)
        .merge(providers)
        .merge(catalog)
        .merge(orders)
        .merge(procurement)
}

/// Full application router: health, status and the v1 API behind the
/// request id, tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_development() {
        ::tracing::info!("Using permissive CORS because no origins are configured");
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "marketplace-api",
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(err) => {
            ::tracing::warn!(error = %err, "Database ping failed");
            "unhealthy"
        }
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
