use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::{
    auth::SessionUser, entities::shipment, services::orders::UpdateShipmentStatusRequest,
    ApiResponse, ApiResult, AppState,
};

pub async fn update_shipment_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    session: SessionUser,
    Json(request): Json<UpdateShipmentStatusRequest>,
) -> ApiResult<shipment::Model> {
    let dealer_id = session.require_dealer()?;
    let shipment = state
        .services
        .orders
        .update_shipment_status(dealer_id, id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(shipment)))
}
