use crate::{
    db::DbPool,
    entities::provider::{self, Entity as ProviderEntity},
    errors::ServiceError,
    PaginatedResponse,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::{dealers::check_rating, fetch_page};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProviderRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub company_name: Option<String>,
    pub license_number: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<Decimal>,
}

#[derive(Clone)]
pub struct ProviderService {
    db_pool: Arc<DbPool>,
}

impl ProviderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_providers(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<provider::Model>, ServiceError> {
        let select = ProviderEntity::find().order_by_asc(provider::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    #[instrument(skip(self))]
    pub async fn get_provider(&self, id: i32) -> Result<provider::Model, ServiceError> {
        ProviderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Provider {} not found", id)))
    }

    #[instrument(skip(self, request))]
    pub async fn update_provider(
        &self,
        id: i32,
        request: UpdateProviderRequest,
    ) -> Result<provider::Model, ServiceError> {
        request.validate()?;
        if let Some(rating) = request.rating {
            check_rating(rating)?;
        }
        let existing = self.get_provider(id).await?;

        let mut active: provider::ActiveModel = existing.into();
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(company_name) = request.company_name {
            active.company_name = Set(company_name);
        }
        if let Some(license_number) = request.license_number {
            active.license_number = Set(Some(license_number));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(rating) = request.rating {
            active.rating = Set(rating);
        }

        let updated = active.update(&*self.db_pool).await?;
        info!(provider_id = id, "Provider updated");
        Ok(updated)
    }
}
