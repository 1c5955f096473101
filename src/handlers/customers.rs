use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use super::common::PaginationParams;
use crate::{
    auth::{SessionUser, UserType},
    entities::{customer, order},
    errors::ServiceError,
    services::customers::UpdateCustomerRequest,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<customer::Model> {
    session.ensure_owner(UserType::Customer, id)?;
    let customer = state.services.customers.get_customer(id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdateCustomerRequest>,
) -> ApiResult<customer::Model> {
    session.ensure_owner(UserType::Customer, id)?;
    let customer = state.services.customers.update_customer(id, request).await?;
    Ok(Json(ApiResponse::success(customer)))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> Result<StatusCode, ServiceError> {
    session.ensure_owner(UserType::Customer, id)?;
    state.services.customers.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn customer_orders(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<order::Model>> {
    session.ensure_owner(UserType::Customer, id)?;
    let orders = state
        .services
        .orders
        .list_for_customer(id, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}
