use crate::{
    db::{insert_with_id_retry, DbPool, IdRetryConfig},
    entities::{
        inventory::{self, Entity as InventoryEntity},
        substance::{self, Entity as SubstanceEntity},
    },
    errors::ServiceError,
    PaginatedResponse,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityName, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::{fetch_page, money::check_price};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryRequest {
    pub substance_id: i32,
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub reorder_level: i32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateInventoryRequest {
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListingFilter {
    pub substance_id: Option<i32>,
    pub dealer_id: Option<i32>,
}

/// Customer-facing view of an in-stock inventory row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub inventory_id: i32,
    pub dealer_id: i32,
    pub substance_id: i32,
    pub substance_name: String,
    pub category: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub available_quantity: i32,
}

#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    id_retry: IdRetryConfig,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, id_retry: IdRetryConfig) -> Self {
        Self { db_pool, id_retry }
    }

    #[instrument(skip(self))]
    pub async fn list_for_dealer(
        &self,
        dealer_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<inventory::Model>, ServiceError> {
        let select = InventoryEntity::find()
            .filter(inventory::Column::DealerId.eq(dealer_id))
            .order_by_asc(inventory::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    #[instrument(skip(self))]
    pub async fn get_inventory(&self, id: i32) -> Result<inventory::Model, ServiceError> {
        InventoryEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory {} not found", id)))
    }

    /// Stocks a substance for `dealer_id`. One row per (dealer, substance).
    #[instrument(skip(self, request), fields(substance_id = request.substance_id))]
    pub async fn create_inventory(
        &self,
        dealer_id: i32,
        request: CreateInventoryRequest,
    ) -> Result<inventory::Model, ServiceError> {
        request.validate()?;
        check_price("unit_price", request.unit_price)?;

        let db = &*self.db_pool;
        if SubstanceEntity::find_by_id(request.substance_id)
            .one(db)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Substance {} not found",
                request.substance_id
            )));
        }

        let duplicate = InventoryEntity::find()
            .filter(inventory::Column::DealerId.eq(dealer_id))
            .filter(inventory::Column::SubstanceId.eq(request.substance_id))
            .one(db)
            .await?;
        if let Some(existing) = duplicate {
            warn!(inventory_id = existing.id, "Duplicate inventory row rejected");
            return Err(ServiceError::BadRequest(format!(
                "Dealer {} already stocks substance {} (inventory {})",
                dealer_id, request.substance_id, existing.id
            )));
        }

        let model = inventory::ActiveModel {
            dealer_id: Set(dealer_id),
            substance_id: Set(request.substance_id),
            quantity: Set(request.quantity),
            unit_price: Set(request.unit_price),
            reorder_level: Set(request.reorder_level),
            ..Default::default()
        };

        let created = insert_with_id_retry(
            db,
            InventoryEntity.table_name(),
            self.id_retry,
            || model.clone().insert(db),
        )
        .await?;

        info!(inventory_id = created.id, dealer_id, "Inventory created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_inventory(
        &self,
        id: i32,
        request: UpdateInventoryRequest,
    ) -> Result<inventory::Model, ServiceError> {
        request.validate()?;
        if let Some(price) = request.unit_price {
            check_price("unit_price", price)?;
        }
        let existing = self.get_inventory(id).await?;

        let mut active: inventory::ActiveModel = existing.into();
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(price) = request.unit_price {
            active.unit_price = Set(price);
        }
        if let Some(level) = request.reorder_level {
            active.reorder_level = Set(level);
        }

        let updated = active.update(&*self.db_pool).await?;
        if updated.quantity <= updated.reorder_level {
            warn!(
                inventory_id = id,
                quantity = updated.quantity,
                reorder_level = updated.reorder_level,
                "Inventory at or below reorder level"
            );
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_inventory(&self, id: i32) -> Result<(), ServiceError> {
        let result = InventoryEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Inventory {} not found", id)));
        }
        info!(inventory_id = id, "Inventory deleted");
        Ok(())
    }

    /// In-stock offers across dealers
    #[instrument(skip(self))]
    pub async fn list_listings(
        &self,
        filter: ListingFilter,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<Listing>, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let limit = limit.max(1);

        let mut select = InventoryEntity::find().filter(inventory::Column::Quantity.gt(0));
        if let Some(substance_id) = filter.substance_id {
            select = select.filter(inventory::Column::SubstanceId.eq(substance_id));
        }
        if let Some(dealer_id) = filter.dealer_id {
            select = select.filter(inventory::Column::DealerId.eq(dealer_id));
        }

        let paginator = select
            .order_by_asc(inventory::Column::UnitPrice)
            .order_by_asc(inventory::Column::Id)
            .paginate(db, limit);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page - 1).await?;

        let substance_ids: Vec<i32> = rows.iter().map(|row| row.substance_id).collect();
        let substances: HashMap<i32, substance::Model> = SubstanceEntity::find()
            .filter(substance::Column::Id.is_in(substance_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let items = rows
            .into_iter()
            .filter_map(|row| {
                let substance = substances.get(&row.substance_id)?;
                Some(Listing {
                    inventory_id: row.id,
                    dealer_id: row.dealer_id,
                    substance_id: row.substance_id,
                    substance_name: substance.name.clone(),
                    category: substance.category.clone(),
                    unit: substance.unit.clone(),
                    unit_price: row.unit_price,
                    available_quantity: row.quantity,
                })
            })
            .collect();

        Ok(PaginatedResponse::new(items, total, page, limit))
    }
}
