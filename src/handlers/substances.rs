use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use super::common::{created_response, PaginationParams};
use crate::{
    auth::{SessionUser, UserType},
    entities::substance,
    errors::ServiceError,
    services::substances::{CreateSubstanceRequest, SubstanceFilter, UpdateSubstanceRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub async fn list_substances(
    State(state): State<AppState>,
    Query(filter): Query<SubstanceFilter>,
    Query(params): Query<PaginationParams>,
    _session: SessionUser,
) -> ApiResult<PaginatedResponse<substance::Model>> {
    let substances = state
        .services
        .substances
        .list_substances(filter, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(substances)))
}

pub async fn get_substance(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: SessionUser,
) -> ApiResult<substance::Model> {
    let substance = state.services.substances.get_substance(id).await?;
    Ok(Json(ApiResponse::success(substance)))
}

pub async fn create_substance(
    State(state): State<AppState>,
    session: SessionUser,
    Json(request): Json<CreateSubstanceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<substance::Model>>), ServiceError> {
    let provider_id = session.require_provider()?;
    let substance = state
        .services
        .substances
        .create_substance(provider_id, request)
        .await?;
    Ok(created_response(substance))
}

pub async fn update_substance(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdateSubstanceRequest>,
) -> ApiResult<substance::Model> {
    let existing = state.services.substances.get_substance(id).await?;
    session.ensure_owner(UserType::Provider, existing.provider_id)?;
    let substance = state
        .services
        .substances
        .update_substance(id, request)
        .await?;
    Ok(Json(ApiResponse::success(substance)))
}

pub async fn delete_substance(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> Result<StatusCode, ServiceError> {
    let existing = state.services.substances.get_substance(id).await?;
    session.ensure_owner(UserType::Provider, existing.provider_id)?;
    state.services.substances.delete_substance(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
