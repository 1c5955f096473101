use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use super::common::PaginationParams;
use crate::{
    auth::{SessionUser, UserType},
    entities::{dealer, inventory, order, purchase_order},
    services::dealers::UpdateDealerRequest,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub async fn list_dealers(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    _session: SessionUser,
) -> ApiResult<PaginatedResponse<dealer::Model>> {
    let dealers = state
        .services
        .dealers
        .list_dealers(params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(dealers)))
}

pub async fn get_dealer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: SessionUser,
) -> ApiResult<dealer::Model> {
    let dealer = state.services.dealers.get_dealer(id).await?;
    Ok(Json(ApiResponse::success(dealer)))
}

pub async fn update_dealer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdateDealerRequest>,
) -> ApiResult<dealer::Model> {
    session.ensure_owner(UserType::Dealer, id)?;
    let dealer = state.services.dealers.update_dealer(id, request).await?;
    Ok(Json(ApiResponse::success(dealer)))
}

pub async fn dealer_inventory(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<inventory::Model>> {
    session.ensure_owner(UserType::Dealer, id)?;
    let rows = state
        .services
        .inventories
        .list_for_dealer(id, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn dealer_orders(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<order::Model>> {
    session.ensure_owner(UserType::Dealer, id)?;
    let orders = state
        .services
        .orders
        .list_for_dealer(id, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn dealer_purchase_orders(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<purchase_order::Model>> {
    session.ensure_owner(UserType::Dealer, id)?;
    let pos = state
        .services
        .purchase_orders
        .list_for_dealer(id, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(pos)))
}
