use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use super::common::{created_response, PaginationParams};
use crate::{
    auth::SessionUser,
    entities::purchase_order,
    errors::ServiceError,
    services::purchase_orders::{
        CreatePurchaseOrderRequest, PurchasePaymentReceipt, UpdatePurchaseOrderStatusRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<purchase_order::Model>> {
    let pos = state
        .services
        .purchase_orders
        .list_purchase_orders(&session, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(pos)))
}

pub async fn create_purchase_order(
    State(state): State<AppState>,
    session: SessionUser,
    Json(request): Json<CreatePurchaseOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<purchase_order::Model>>), ServiceError> {
    let dealer_id = session.require_dealer()?;
    let po = state
        .services
        .purchase_orders
        .create_purchase_order(dealer_id, request)
        .await?;
    Ok(created_response(po))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<purchase_order::Model> {
    let po = state
        .services
        .purchase_orders
        .get_purchase_order(&session, id)
        .await?;
    Ok(Json(ApiResponse::success(po)))
}

pub async fn update_purchase_order_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdatePurchaseOrderStatusRequest>,
) -> ApiResult<purchase_order::Model> {
    let po = state
        .services
        .purchase_orders
        .update_status(&session, id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(po)))
}

pub async fn pay_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<PurchasePaymentReceipt> {
    let dealer_id = session.require_dealer()?;
    let receipt = state
        .services
        .purchase_orders
        .pay_purchase_order(dealer_id, id)
        .await?;
    Ok(Json(ApiResponse::success(receipt)))
}
