use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use super::common::{created_response, PaginationParams};
use crate::{
    auth::{SessionUser, UserType},
    entities::inventory,
    errors::ServiceError,
    services::inventories::{
        CreateInventoryRequest, Listing, ListingFilter, UpdateInventoryRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub async fn list_inventories(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<inventory::Model>> {
    let dealer_id = session.require_dealer()?;
    let rows = state
        .services
        .inventories
        .list_for_dealer(dealer_id, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// Loads a row the session's dealer owns
async fn owned_inventory(
    state: &AppState,
    session: &SessionUser,
    id: i32,
) -> Result<inventory::Model, ServiceError> {
    session.require_dealer()?;
    let row = state.services.inventories.get_inventory(id).await?;
    session.ensure_owner(UserType::Dealer, row.dealer_id)?;
    Ok(row)
}

pub async fn get_inventory(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<inventory::Model> {
    let row = owned_inventory(&state, &session, id).await?;
    Ok(Json(ApiResponse::success(row)))
}

pub async fn create_inventory(
    State(state): State<AppState>,
    session: SessionUser,
    Json(request): Json<CreateInventoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<inventory::Model>>), ServiceError> {
    let dealer_id = session.require_dealer()?;
    let row = state
        .services
        .inventories
        .create_inventory(dealer_id, request)
        .await?;
    Ok(created_response(row))
}

pub async fn update_inventory(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdateInventoryRequest>,
) -> ApiResult<inventory::Model> {
    owned_inventory(&state, &session, id).await?;
    let row = state
        .services
        .inventories
        .update_inventory(id, request)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

pub async fn delete_inventory(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> Result<StatusCode, ServiceError> {
    owned_inventory(&state, &session, id).await?;
    state.services.inventories.delete_inventory(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_listings(
    State(state): State<AppState>,
    Query(filter): Query<ListingFilter>,
    Query(params): Query<PaginationParams>,
    _session: SessionUser,
) -> ApiResult<PaginatedResponse<Listing>> {
    let listings = state
        .services
        .inventories
        .list_listings(filter, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(listings)))
}
