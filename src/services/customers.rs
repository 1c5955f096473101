use crate::{
    auth::hash_password,
    db::DbPool,
    entities::customer::{self, Entity as CustomerEntity},
    errors::ServiceError,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: i32) -> Result<customer::Model, ServiceError> {
        CustomerEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    #[instrument(skip(self, request))]
    pub async fn update_customer(
        &self,
        id: i32,
        request: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_customer(id).await?;

        let mut active: customer::ActiveModel = existing.into();
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(password) = request.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(full_name) = request.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }

        let updated = active.update(&*self.db_pool).await?;
        info!(customer_id = id, "Customer updated");
        Ok(updated)
    }

    /// Fails with a 400 while orders still reference the customer
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: i32) -> Result<(), ServiceError> {
        let result = CustomerEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Customer {} not found", id)));
        }
        info!(customer_id = id, "Customer deleted");
        Ok(())
    }
}
