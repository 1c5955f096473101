#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use marketplace_api::{
    auth::UserType,
    build_router,
    config::AppConfig,
    db,
    entities::{customer, dealer, inventory, provider, provider_transport, substance},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "k3v9-QpZr7t!mW2xLs8dYh4NcB6uJe1f";

/// Placeholder hash for seeded accounts; they never log in
const SEEDED_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2VlZGVk$c2VlZGVk";

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps the in-memory database alive and shared
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = build_router(state.clone());

        Self { router, state }
    }

    /// Mints a session token; stands in for an authenticated user of `user_type`.
    pub fn token_for(&self, user_type: UserType, id: i32) -> String {
        self.state
            .auth
            .issue_token(id, user_type)
            .expect("issue test token")
            .access_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and returns the status with the parsed JSON body (null when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: &str,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, Some(token)).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn seed_customer(&self, username: &str) -> customer::Model {
        customer::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@buyers.test")),
            password_hash: Set(SEEDED_PASSWORD_HASH.to_string()),
            full_name: Set(format!("Customer {username}")),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed customer")
    }

    pub async fn seed_dealer(&self, username: &str) -> dealer::Model {
        dealer::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@dealers.test")),
            password_hash: Set(SEEDED_PASSWORD_HASH.to_string()),
            business_name: Set(format!("{username} Trading")),
            rating: Set(Decimal::ZERO),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed dealer")
    }

    pub async fn seed_provider(&self, username: &str) -> provider::Model {
        provider::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@providers.test")),
            password_hash: Set(SEEDED_PASSWORD_HASH.to_string()),
            company_name: Set(format!("{username} Labs")),
            rating: Set(Decimal::ZERO),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed provider")
    }

    pub async fn seed_substance(
        &self,
        provider_id: i32,
        name: &str,
        price_per_unit: Decimal,
        stock_quantity: i32,
    ) -> substance::Model {
        substance::ActiveModel {
            provider_id: Set(provider_id),
            name: Set(name.to_string()),
            category: Set("reagent".to_string()),
            unit: Set("kg".to_string()),
            price_per_unit: Set(price_per_unit),
            stock_quantity: Set(stock_quantity),
            is_available: Set(true),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed substance")
    }

    pub async fn seed_transport(&self, provider_id: i32, cost: Decimal) -> provider_transport::Model {
        provider_transport::ActiveModel {
            provider_id: Set(provider_id),
            method: Set(provider_transport::TransportMethod::Ground),
            cost: Set(cost),
            estimated_days: Set(3),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed transport")
    }

    pub async fn seed_inventory(
        &self,
        dealer_id: i32,
        substance_id: i32,
        quantity: i32,
        unit_price: Decimal,
    ) -> inventory::Model {
        inventory::ActiveModel {
            dealer_id: Set(dealer_id),
            substance_id: Set(substance_id),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            reorder_level: Set(0),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed inventory")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal that the API serialized as a string
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("parsable decimal")
}
