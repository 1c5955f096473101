use crate::{
    db::DbPool,
    entities::dealer::{self, Entity as DealerEntity},
    errors::ServiceError,
    PaginatedResponse,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::fetch_page;

const MAX_RATING: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDealerRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub business_name: Option<String>,
    pub license_number: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<Decimal>,
}

/// Ratings are kept within 0 to 5 inclusive
pub(crate) fn check_rating(rating: Decimal) -> Result<(), ServiceError> {
    if rating < Decimal::ZERO || rating > MAX_RATING {
        return Err(ServiceError::ValidationError(format!(
            "rating must be between 0 and 5, got {}",
            rating
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DealerService {
    db_pool: Arc<DbPool>,
}

impl DealerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_dealers(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<dealer::Model>, ServiceError> {
        let select = DealerEntity::find().order_by_asc(dealer::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    #[instrument(skip(self))]
    pub async fn get_dealer(&self, id: i32) -> Result<dealer::Model, ServiceError> {
        DealerEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Dealer {} not found", id)))
    }

    #[instrument(skip(self, request))]
    pub async fn update_dealer(
        &self,
        id: i32,
        request: UpdateDealerRequest,
    ) -> Result<dealer::Model, ServiceError> {
        request.validate()?;
        if let Some(rating) = request.rating {
            check_rating(rating)?;
        }
        let existing = self.get_dealer(id).await?;

        let mut active: dealer::ActiveModel = existing.into();
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(business_name) = request.business_name {
            active.business_name = Set(business_name);
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
        info!(dealer_id = id, "Dealer updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0), true)]
    #[case(dec!(4.5), true)]
    #[case(dec!(5), true)]
    #[case(dec!(5.01), false)]
    #[case(dec!(-0.5), false)]
    fn rating_bounds(#[case] rating: Decimal, #[case] ok: bool) {
        assert_eq!(check_rating(rating).is_ok(), ok);
    }
}
