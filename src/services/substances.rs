use crate::{
    db::{insert_with_id_retry, DbPool, IdRetryConfig},
    entities::substance::{self, Entity as SubstanceEntity},
    errors::ServiceError,
    PaginatedResponse,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityName, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::{fetch_page, money::check_price};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubstanceRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    pub price_per_unit: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock_quantity: i32,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSubstanceRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub price_per_unit: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock_quantity: Option<i32>,
    pub is_available: Option<bool>,
}

/// Query filters for the substance catalog
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SubstanceFilter {
    pub provider_id: Option<i32>,
    pub category: Option<String>,
    pub available: Option<bool>,
}

#[derive(Clone)]
pub struct SubstanceService {
    db_pool: Arc<DbPool>,
    id_retry: IdRetryConfig,
}

impl SubstanceService {
    pub fn new(db_pool: Arc<DbPool>, id_retry: IdRetryConfig) -> Self {
        Self { db_pool, id_retry }
    }

    #[instrument(skip(self))]
    pub async fn list_substances(
        &self,
        filter: SubstanceFilter,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<substance::Model>, ServiceError> {
        let mut select = SubstanceEntity::find();
        if let Some(provider_id) = filter.provider_id {
            select = select.filter(substance::Column::ProviderId.eq(provider_id));
        }
        if let Some(category) = filter.category {
            select = select.filter(substance::Column::Category.eq(category));
        }
        if let Some(available) = filter.available {
            select = select.filter(substance::Column::IsAvailable.eq(available));
        }

        fetch_page(
            &self.db_pool,
            select.order_by_asc(substance::Column::Id),
            page,
            limit,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_substance(&self, id: i32) -> Result<substance::Model, ServiceError> {
        SubstanceEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Substance {} not found", id)))
    }

    /// Adds a substance to `provider_id`'s catalog
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_substance(
        &self,
        provider_id: i32,
        request: CreateSubstanceRequest,
    ) -> Result<substance::Model, ServiceError> {
        request.validate()?;
        check_price("price_per_unit", request.price_per_unit)?;

        let db = &*self.db_pool;
        let model = substance::ActiveModel {
            provider_id: Set(provider_id),
            name: Set(request.name),
            description: Set(request.description),
            category: Set(request.category),
            unit: Set(request.unit),
            price_per_unit: Set(request.price_per_unit),
            stock_quantity: Set(request.stock_quantity),
            is_available: Set(request.is_available),
            ..Default::default()
        };

        let created = insert_with_id_retry(
            db,
            SubstanceEntity.table_name(),
            self.id_retry,
            || model.clone().insert(db),
        )
        .await?;

        info!(substance_id = created.id, provider_id, "Substance created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_substance(
        &self,
        id: i32,
        request: UpdateSubstanceRequest,
    ) -> Result<substance::Model, ServiceError> {
        request.validate()?;
        if let Some(price) = request.price_per_unit {
            check_price("price_per_unit", price)?;
        }
        let existing = self.get_substance(id).await?;

        let mut active: substance::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(price) = request.price_per_unit {
            active.price_per_unit = Set(price);
        }
        if let Some(stock) = request.stock_quantity {
            active.stock_quantity = Set(stock);
        }
        if let Some(available) = request.is_available {
            active.is_available = Set(available);
        }

        let updated = active.update(&*self.db_pool).await?;
        info!(substance_id = id, "Substance updated");
        Ok(updated)
    }

    /// Fails with a 400 while inventories or purchase orders still reference it
    #[instrument(skip(self))]
    pub async fn delete_substance(&self, id: i32) -> Result<(), ServiceError> {
        let result = SubstanceEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Substance {} not found", id)));
        }
        info!(substance_id = id, "Substance deleted");
        Ok(())
    }
}
