use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use super::common::created_response;
use crate::{
    auth::{SessionUser, TokenResponse},
    errors::ServiceError,
    services::accounts::{Account, LoginRequest, RegisterRequest},
    ApiResponse, ApiResult, AppState,
};

/// Account profile plus a fresh bearer token
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub account: Account,
    pub token: TokenResponse,
}

fn session_for(state: &AppState, account: Account) -> Result<SessionResponse, ServiceError> {
    let token = state.auth.issue_token(account.id(), account.user_type())?;
    Ok(SessionResponse { account, token })
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionResponse>>), ServiceError> {
    let account = state.services.accounts.register(request).await?;
    Ok(created_response(session_for(&state, account)?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<SessionResponse> {
    let account = state.services.accounts.login(request).await?;
    Ok(Json(ApiResponse::success(session_for(&state, account)?)))
}

pub async fn me(State(state): State<AppState>, session: SessionUser) -> ApiResult<Account> {
    let account = state.services.accounts.get_account(&session).await?;
    Ok(Json(ApiResponse::success(account)))
}
