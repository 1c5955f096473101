use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use super::common::{created_response, PaginationParams};
use crate::{
    auth::{SessionUser, UserType},
    entities::{provider, provider_transport, purchase_order, substance},
    errors::ServiceError,
    services::{
        providers::UpdateProviderRequest,
        substances::SubstanceFilter,
        transports::{CreateTransportRequest, UpdateTransportRequest},
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub async fn list_providers(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    _session: SessionUser,
) -> ApiResult<PaginatedResponse<provider::Model>> {
    let providers = state
        .services
        .providers
        .list_providers(params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(providers)))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: SessionUser,
) -> ApiResult<provider::Model> {
    let provider = state.services.providers.get_provider(id).await?;
    Ok(Json(ApiResponse::success(provider)))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdateProviderRequest>,
) -> ApiResult<provider::Model> {
    session.ensure_owner(UserType::Provider, id)?;
    let provider = state.services.providers.update_provider(id, request).await?;
    Ok(Json(ApiResponse::success(provider)))
}

pub async fn provider_substances(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<PaginationParams>,
    _session: SessionUser,
) -> ApiResult<PaginatedResponse<substance::Model>> {
    let filter = SubstanceFilter {
        provider_id: Some(id),
        ..Default::default()
    };
    let substances = state
        .services
        .substances
        .list_substances(filter, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(substances)))
}

pub async fn provider_purchase_orders(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<purchase_order::Model>> {
    session.ensure_owner(UserType::Provider, id)?;
    let pos = state
        .services
        .purchase_orders
        .list_for_provider(id, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(pos)))
}

pub async fn list_transports(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: SessionUser,
) -> ApiResult<Vec<provider_transport::Model>> {
    let transports = state.services.transports.list_transports(id).await?;
    Ok(Json(ApiResponse::success(transports)))
}

pub async fn create_transport(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<CreateTransportRequest>,
) -> Result<(StatusCode, Json<ApiResponse<provider_transport::Model>>), ServiceError> {
    session.ensure_owner(UserType::Provider, id)?;
    let transport = state.services.transports.create_transport(id, request).await?;
    Ok(created_response(transport))
}

pub async fn update_transport(
    State(state): State<AppState>,
    Path((id, transport_id)): Path<(i32, i32)>,
    session: SessionUser,
    Json(request): Json<UpdateTransportRequest>,
) -> ApiResult<provider_transport::Model> {
    session.ensure_owner(UserType::Provider, id)?;
    let transport = state
        .services
        .transports
        .update_transport(id, transport_id, request)
        .await?;
    Ok(Json(ApiResponse::success(transport)))
}

pub async fn delete_transport(
    State(state): State<AppState>,
    Path((id, transport_id)): Path<(i32, i32)>,
    session: SessionUser,
) -> Result<StatusCode, ServiceError> {
    session.ensure_owner(UserType::Provider, id)?;
    state
        .services
        .transports
        .delete_transport(id, transport_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
