//! Dealer restocking from providers.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use marketplace_api::{
    auth::UserType,
    entities::{inventory, substance},
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};

struct Procurement {
    app: TestApp,
    dealer_id: i32,
    provider_id: i32,
    substance_id: i32,
    transport_id: i32,
    dealer_token: String,
    provider_token: String,
}

async fn procurement() -> Procurement {
    let app = TestApp::new().await;
    let provider = app.seed_provider("acme").await;
    let dealer = app.seed_dealer("northside").await;
    let substance = app.seed_substance(provider.id, "Glycerol", dec!(2.25), 50).await;
    let transport = app.seed_transport(provider.id, dec!(10)).await;
    let dealer_token = app.token_for(UserType::Dealer, dealer.id);
    let provider_token = app.token_for(UserType::Provider, provider.id);
    Procurement {
        app,
        dealer_id: dealer.id,
        provider_id: provider.id,
        substance_id: substance.id,
        transport_id: transport.id,
        dealer_token,
        provider_token,
    }
}

impl Procurement {
    async fn create(&self, quantity: i32) -> (StatusCode, Value) {
        self.app
            .send(
                Method::POST,
                "/api/v1/purchase-orders",
                Some(json!({
                    "provider_id": self.provider_id,
                    "substance_id": self.substance_id,
                    "quantity": quantity,
                    "transport_id": self.transport_id,
                })),
                &self.dealer_token,
            )
            .await
    }

    async fn set_status(&self, id: i64, status: &str, token: &str) -> (StatusCode, Value) {
        self.app
            .send(
                Method::PUT,
                &format!("/api/v1/purchase-orders/{id}/status"),
                Some(json!({ "status": status })),
                token,
            )
            .await
    }

    async fn provider_stock(&self) -> i32 {
        substance::Entity::find_by_id(self.substance_id)
            .one(&*self.app.state.db)
            .await
            .expect("query substance")
            .expect("substance row")
            .stock_quantity
    }

    async fn dealer_stock(&self) -> Option<inventory::Model> {
        inventory::Entity::find()
            .filter(inventory::Column::DealerId.eq(self.dealer_id))
            .filter(inventory::Column::SubstanceId.eq(self.substance_id))
            .one(&*self.app.state.db)
            .await
            .expect("query inventory")
    }
}

#[tokio::test]
async fn full_procurement_flow_moves_stock_and_money() {
    let p = procurement().await;

    let (status, body) = p.create(4).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(decimal(&body["data"]["unit_price"]), dec!(2.25));
    assert_eq!(decimal(&body["data"]["transport_cost"]), dec!(10));
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(19));
    let id = body["data"]["id"].as_i64().expect("purchase order id");

    let (status, _) = p.set_status(id, "approved", &p.provider_token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = p.set_status(id, "shipped", &p.provider_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "shipped");
    assert_eq!(p.provider_stock().await, 46);
    assert!(p.dealer_stock().await.is_none());

    let (status, _) = p.set_status(id, "received", &p.dealer_token).await;
    assert_eq!(status, StatusCode::OK);
    let row = p.dealer_stock().await.expect("inventory opened on receipt");
    assert_eq!(row.quantity, 4);
    assert_eq!(row.unit_price, dec!(2.25));

    let (status, body) = p
        .app
        .send(
            Method::POST,
            &format!("/api/v1/purchase-orders/{id}/pay"),
            None,
            &p.dealer_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["purchase_order"]["payment_status"], "paid");
    assert_eq!(body["data"]["transaction"]["kind"], "purchase_payment");
    let transaction_id = body["data"]["transaction"]["id"].as_i64().expect("transaction id");

    let (status, body) = p
        .app
        .send(Method::GET, "/api/v1/transactions", None, &p.provider_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let outsider = p.app.seed_provider("globex").await;
    let outsider_token = p.app.token_for(UserType::Provider, outsider.id);
    let (status, _) = p
        .app
        .send(
            Method::GET,
            &format!("/api/v1/transactions/{transaction_id}"),
            None,
            &outsider_token,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = p
        .app
        .send(Method::GET, "/api/v1/transactions", None, &outsider_token)
        .await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn receiving_tops_up_an_existing_inventory_row() {
    let p = procurement().await;
    p.app
        .seed_inventory(p.dealer_id, p.substance_id, 3, dec!(5))
        .await;

    let (_, body) = p.create(2).await;
    let id = body["data"]["id"].as_i64().expect("purchase order id");
    for (status, token) in [
        ("approved", &p.provider_token),
        ("shipped", &p.provider_token),
        ("received", &p.dealer_token),
    ] {
        let (code, _) = p.set_status(id, status, token).await;
        assert_eq!(code, StatusCode::OK, "moving to {status}");
    }

    let row = p.dealer_stock().await.expect("inventory row");
    assert_eq!(row.quantity, 5);
    assert_eq!(row.unit_price, dec!(5));
}

#[tokio::test]
async fn each_side_makes_only_its_own_moves() {
    let p = procurement().await;
    let (_, body) = p.create(1).await;
    let id = body["data"]["id"].as_i64().expect("purchase order id");

    let (status, _) = p.set_status(id, "approved", &p.dealer_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = p.set_status(id, "received", &p.dealer_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "pending cannot be received");

    let (status, _) = p.set_status(id, "rejected", &p.provider_token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = p.set_status(id, "approved", &p.provider_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "rejected is terminal");

    let (status, _) = p
        .app
        .send(
            Method::POST,
            &format!("/api/v1/purchase-orders/{id}/pay"),
            None,
            &p.dealer_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn requests_beyond_provider_stock_are_refused() {
    let p = procurement().await;
    let (status, _) = p.create(51).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = p
        .app
        .send(Method::GET, "/api/v1/purchase-orders", None, &p.provider_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn only_dealers_raise_purchase_orders() {
    let p = procurement().await;
    let (status, _) = p
        .app
        .send(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "provider_id": p.provider_id,
                "substance_id": p.substance_id,
                "quantity": 1,
            })),
            &p.provider_token,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = p.create(1).await;
    let id = body["data"]["id"].as_i64().expect("purchase order id");
    let (status, body) = p
        .app
        .send(
            Method::GET,
            &format!("/api/v1/providers/{}/purchase-orders", p.provider_id),
            None,
            &p.provider_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["id"], id);

    let (status, _) = p
        .app
        .send(
            Method::GET,
            &format!("/api/v1/dealers/{}/purchase-orders", p.dealer_id),
            None,
            &p.provider_token,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
