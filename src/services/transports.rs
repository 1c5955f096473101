use crate::{
    db::{insert_with_id_retry, DbPool, IdRetryConfig},
    entities::provider_transport::{self, Entity as TransportEntity, TransportMethod},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityName, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::money::check_price;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransportRequest {
    pub method: TransportMethod,
    pub cost: Decimal,
    #[validate(range(min = 0, max = 365))]
    pub estimated_days: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTransportRequest {
    pub method: Option<TransportMethod>,
    pub cost: Option<Decimal>,
    #[validate(range(min = 0, max = 365))]
    pub estimated_days: Option<i32>,
    pub is_active: Option<bool>,
}

/// Delivery options providers attach to purchase orders
#[derive(Clone)]
pub struct TransportService {
    db_pool: Arc<DbPool>,
    id_retry: IdRetryConfig,
}

impl TransportService {
    pub fn new(db_pool: Arc<DbPool>, id_retry: IdRetryConfig) -> Self {
        Self { db_pool, id_retry }
    }

    #[instrument(skip(self))]
    pub async fn list_transports(
        &self,
        provider_id: i32,
    ) -> Result<Vec<provider_transport::Model>, ServiceError> {
        let transports = TransportEntity::find()
            .filter(provider_transport::Column::ProviderId.eq(provider_id))
            .order_by_asc(provider_transport::Column::Id)
            .all(&*self.db_pool)
            .await?;
        Ok(transports)
    }

    /// A transport of `provider_id`; other providers' transports are reported missing
    #[instrument(skip(self))]
    pub async fn get_transport(
        &self,
        provider_id: i32,
        transport_id: i32,
    ) -> Result<provider_transport::Model, ServiceError> {
        TransportEntity::find_by_id(transport_id)
            .filter(provider_transport::Column::ProviderId.eq(provider_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Transport {} not found for provider {}",
                    transport_id, provider_id
                ))
            })
    }

    #[instrument(skip(self, request))]
    pub async fn create_transport(
        &self,
        provider_id: i32,
        request: CreateTransportRequest,
    ) -> Result<provider_transport::Model, ServiceError> {
        request.validate()?;
        check_price("cost", request.cost)?;

        let db = &*self.db_pool;
        let model = provider_transport::ActiveModel {
            provider_id: Set(provider_id),
            method: Set(request.method),
            cost: Set(request.cost),
            estimated_days: Set(request.estimated_days),
            is_active: Set(request.is_active),
            ..Default::default()
        };

        let created = insert_with_id_retry(
            db,
            TransportEntity.table_name(),
            self.id_retry,
            || model.clone().insert(db),
        )
        .await?;

        info!(transport_id = created.id, provider_id, method = %created.method, "Transport created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_transport(
        &self,
        provider_id: i32,
        transport_id: i32,
        request: UpdateTransportRequest,
    ) -> Result<provider_transport::Model, ServiceError> {
        request.validate()?;
        if let Some(cost) = request.cost {
            check_price("cost", cost)?;
        }
        let existing = self.get_transport(provider_id, transport_id).await?;

        let mut active: provider_transport::ActiveModel = existing.into();
        if let Some(method) = request.method {
            active.method = Set(method);
        }
        if let Some(cost) = request.cost {
            active.cost = Set(cost);
        }
        if let Some(days) = request.estimated_days {
            active.estimated_days = Set(days);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        let updated = active.update(&*self.db_pool).await?;
        info!(transport_id, provider_id, "Transport updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_transport(
        &self,
        provider_id: i32,
        transport_id: i32,
    ) -> Result<(), ServiceError> {
        let result = TransportEntity::delete_many()
            .filter(provider_transport::Column::Id.eq(transport_id))
            .filter(provider_transport::Column::ProviderId.eq(provider_id))
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Transport {} not found for provider {}",
                transport_id, provider_id
            )));
        }
        info!(transport_id, provider_id, "Transport deleted");
        Ok(())
    }
}
