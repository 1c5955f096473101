//! Substances, transport options, inventories and listings.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use marketplace_api::auth::UserType;
use rstest::rstest;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn substance_body(name: &str, price: &str) -> Value {
    json!({
        "name": name,
        "category": "solvent",
        "unit": "l",
        "price_per_unit": price,
        "stock_quantity": 40,
    })
}

#[tokio::test]
async fn providers_create_substances_they_own() {
    let app = TestApp::new().await;
    let provider = app.seed_provider("acme").await;
    let token = app.token_for(UserType::Provider, provider.id);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/substances",
            Some(substance_body("Acetone", "3.5")),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["provider_id"], provider.id);
    assert_eq!(body["data"]["is_available"], true);
    assert_eq!(decimal(&body["data"]["price_per_unit"]), dec!(3.5));
    let id = body["data"]["id"].as_i64().expect("substance id");

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/providers/{}/substances", provider.id),
            None,
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["id"], id);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/substances/{id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/substances/{id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest]
#[case::negative_price(substance_body("Acetone", "-1"))]
#[case::sub_cent_price(substance_body("Acetone", "1.005"))]
#[case::price_beyond_money_column(substance_body("Acetone", "10000000000"))]
#[case::empty_name(substance_body("", "1"))]
#[case::negative_stock(json!({
    "name": "Acetone", "category": "solvent", "unit": "l",
    "price_per_unit": "1", "stock_quantity": -3,
}))]
#[tokio::test]
async fn invalid_substances_are_rejected(#[case] body: Value) {
    let app = TestApp::new().await;
    let provider = app.seed_provider("acme").await;
    let token = app.token_for(UserType::Provider, provider.id);

    let (status, _) = app
        .send(Method::POST, "/api/v1/substances", Some(body), &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn substance_catalog_filters() {
    let app = TestApp::new().await;
    let acme = app.seed_provider("acme").await;
    let globex = app.seed_provider("globex").await;
    app.seed_substance(acme.id, "Ethanol", dec!(4), 10).await;
    app.seed_substance(acme.id, "Methanol", dec!(3), 10).await;
    app.seed_substance(globex.id, "Toluene", dec!(6), 10).await;
    let token = app.token_for(UserType::Provider, globex.id);

    let (status, body) = app
        .send(Method::GET, "/api/v1/substances", None, &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/substances?provider_id={}&limit=1", acme.id),
            None,
            &token,
        )
        .await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["total_pages"], 2);
}

#[tokio::test]
async fn transports_are_managed_by_their_provider() {
    let app = TestApp::new().await;
    let provider = app.seed_provider("acme").await;
    let rival = app.seed_provider("globex").await;
    let token = app.token_for(UserType::Provider, provider.id);
    let uri = format!("/api/v1/providers/{}/transports", provider.id);
    let transport = json!({"method": "air", "cost": "15", "estimated_days": 2});

    let rival_token = app.token_for(UserType::Provider, rival.id);
    let (status, _) = app
        .send(Method::POST, &uri, Some(transport.clone()), &rival_token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::POST, &uri, Some(transport), &token).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["method"], "air");
    assert_eq!(body["data"]["is_active"], true);
    let transport_id = body["data"]["id"].as_i64().expect("transport id");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("{uri}/{transport_id}"),
            Some(json!({"is_active": false, "cost": "12.5"})),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);
    assert_eq!(decimal(&body["data"]["cost"]), dec!(12.5));

    // Anyone signed in can browse the options
    let dealer = app.seed_dealer("northside").await;
    let dealer_token = app.token_for(UserType::Dealer, dealer.id);
    let (status, body) = app.send(Method::GET, &uri, None, &dealer_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    // Another provider's transport looks missing under this provider
    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/providers/{}/transports/{transport_id}", rival.id),
            None,
            &rival_token,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::DELETE, &format!("{uri}/{transport_id}"), None, &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn dealers_stock_each_substance_once() {
    let app = TestApp::new().await;
    let provider = app.seed_provider("acme").await;
    let substance = app.seed_substance(provider.id, "Ethanol", dec!(4), 10).await;
    let dealer = app.seed_dealer("northside").await;
    let token = app.token_for(UserType::Dealer, dealer.id);
    let row = json!({"substance_id": substance.id, "quantity": 6, "unit_price": "7.5"});

    let (status, body) = app
        .send(Method::POST, "/api/v1/inventories", Some(row.clone()), &token)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["dealer_id"], dealer.id);
    let id = body["data"]["id"].as_i64().expect("inventory id");

    let (status, _) = app
        .send(Method::POST, "/api/v1/inventories", Some(row), &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/inventories",
            Some(json!({"substance_id": 999, "quantity": 1, "unit_price": "1"})),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/inventories/{id}"),
            Some(json!({"quantity": 9})),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], 9);

    let (status, body) = app
        .send(Method::GET, "/api/v1/inventories", None, &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn inventory_prices_must_fit_the_money_column() {
    let app = TestApp::new().await;
    let provider = app.seed_provider("acme").await;
    let substance = app.seed_substance(provider.id, "Ethanol", dec!(4), 10).await;
    let dealer = app.seed_dealer("northside").await;
    let token = app.token_for(UserType::Dealer, dealer.id);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/inventories",
            Some(json!({
                "substance_id": substance.id,
                "quantity": 10,
                "unit_price": "10000000000000000000000000000",
            })),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("unit_price"));

    let (status, body) = app
        .send(Method::GET, "/api/v1/inventories", None, &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn listings_show_in_stock_rows_cheapest_first() {
    let app = TestApp::new().await;
    let provider = app.seed_provider("acme").await;
    let substance = app.seed_substance(provider.id, "Ethanol", dec!(4), 10).await;
    let north = app.seed_dealer("northside").await;
    let south = app.seed_dealer("southside").await;
    let east = app.seed_dealer("eastgate").await;
    app.seed_inventory(north.id, substance.id, 5, dec!(9)).await;
    app.seed_inventory(south.id, substance.id, 2, dec!(6.5)).await;
    app.seed_inventory(east.id, substance.id, 0, dec!(1)).await;

    let customer = app.seed_customer("alice").await;
    let token = app.token_for(UserType::Customer, customer.id);
    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/listings?substance_id={}", substance.id),
            None,
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    let first = &body["data"]["items"][0];
    assert_eq!(first["dealer_id"], south.id);
    assert_eq!(first["substance_name"], "Ethanol");
    assert_eq!(first["available_quantity"], 2);
    assert_eq!(decimal(&first["unit_price"]), dec!(6.5));
}

#[tokio::test]
async fn dealer_rating_stays_within_bounds() {
    let app = TestApp::new().await;
    let dealer = app.seed_dealer("northside").await;
    let token = app.token_for(UserType::Dealer, dealer.id);
    let uri = format!("/api/v1/dealers/{}", dealer.id);

    let (status, _) = app
        .send(Method::PUT, &uri, Some(json!({"rating": "5.5"})), &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(json!({"rating": "4.5", "phone": "+44 20 7946 0000"})),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["rating"]), dec!(4.5));
    assert_eq!(body["data"]["phone"], "+44 20 7946 0000");
}
