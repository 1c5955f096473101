use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use super::common::{created_response, PaginationParams};
use crate::{
    auth::SessionUser,
    entities::{order, shipment},
    errors::ServiceError,
    services::orders::{
        CreateShipmentRequest, OrderDetail, PaymentReceipt, PlaceOrderRequest,
        UpdateOrderStatusRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let orders = state
        .services
        .orders
        .list_orders(&session, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn place_order(
    State(state): State<AppState>,
    session: SessionUser,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ServiceError> {
    let customer_id = session.require_customer()?;
    let detail = state
        .services
        .orders
        .place_order(customer_id, request)
        .await?;
    Ok(created_response(detail))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.get_order(&session, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .orders
        .update_status(&session, id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn pay_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<PaymentReceipt> {
    let customer_id = session.require_customer()?;
    let receipt = state.services.orders.pay_order(customer_id, id).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<shipment::Model>>), ServiceError> {
    let dealer_id = session.require_dealer()?;
    let shipment = state
        .services
        .orders
        .create_shipment(dealer_id, id, request)
        .await?;
    Ok(created_response(shipment))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<shipment::Model> {
    let shipment = state.services.orders.get_shipment(&session, id).await?;
    Ok(Json(ApiResponse::success(shipment)))
}
