use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use super::common::PaginationParams;
use crate::{
    auth::SessionUser, entities::transaction, ApiResponse, ApiResult, AppState,
    PaginatedResponse,
};

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    session: SessionUser,
) -> ApiResult<PaginatedResponse<transaction::Model>> {
    let page = state
        .services
        .transactions
        .list_transactions(&session, params.page(), params.limit())
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
) -> ApiResult<transaction::Model> {
    let found = state
        .services
        .transactions
        .get_transaction(&session, id)
        .await?;
    Ok(Json(ApiResponse::success(found)))
}
