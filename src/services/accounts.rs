use crate::{
    auth::{hash_password, verify_password, AuthError, SessionUser, UserType},
    db::{insert_with_id_retry, DbPool, IdRetryConfig},
    entities::{customer, dealer, provider},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityName, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(rename = "type")]
    pub user_type: UserType,
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    /// Required for customers
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    /// Required for dealers
    #[validate(length(min = 1, max = 200))]
    pub business_name: Option<String>,
    /// Required for providers
    #[validate(length(min = 1, max = 200))]
    pub company_name: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub user_type: UserType,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// An account of any role, serialized with a `type` tag
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Account {
    Customer(customer::Model),
    Dealer(dealer::Model),
    Provider(provider::Model),
}

impl Account {
    pub fn id(&self) -> i32 {
        match self {
            Account::Customer(m) => m.id,
            Account::Dealer(m) => m.id,
            Account::Provider(m) => m.id,
        }
    }

    pub fn user_type(&self) -> UserType {
        match self {
            Account::Customer(_) => UserType::Customer,
            Account::Dealer(_) => UserType::Dealer,
            Account::Provider(_) => UserType::Provider,
        }
    }

    fn password_hash(&self) -> &str {
        match self {
            Account::Customer(m) => &m.password_hash,
            Account::Dealer(m) => &m.password_hash,
            Account::Provider(m) => &m.password_hash,
        }
    }
}

fn required(value: Option<String>, field: &str, user_type: UserType) -> Result<String, ServiceError> {
    value.ok_or_else(|| {
        ServiceError::ValidationError(format!("{} is required for {} accounts", field, user_type))
    })
}

/// Registration, login and session lookups for all three roles
#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
    id_retry: IdRetryConfig,
}

impl AccountService {
    pub fn new(db_pool: Arc<DbPool>, id_retry: IdRetryConfig) -> Self {
        Self { db_pool, id_retry }
    }

    /// Creates an account. Duplicate usernames or emails surface as 400s.
    #[instrument(skip(self, request), fields(user_type = %request.user_type, username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<Account, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;
        let user_type = request.user_type;

        let account = match user_type {
            UserType::Customer => {
                let full_name = required(request.full_name, "full_name", user_type)?;
                let model = customer::ActiveModel {
                    username: Set(request.username),
                    email: Set(request.email),
                    password_hash: Set(hash_password(&request.password)?),
                    full_name: Set(full_name),
                    phone: Set(request.phone),
                    address: Set(request.address),
                    ..Default::default()
                };
                let created = insert_with_id_retry(
                    db,
                    customer::Entity.table_name(),
                    self.id_retry,
                    || model.clone().insert(db),
                )
                .await?;
                Account::Customer(created)
            }
            UserType::Dealer => {
                let business_name = required(request.business_name, "business_name", user_type)?;
                let model = dealer::ActiveModel {
                    username: Set(request.username),
                    email: Set(request.email),
                    password_hash: Set(hash_password(&request.password)?),
                    business_name: Set(business_name),
                    license_number: Set(request.license_number),
                    address: Set(request.address),
                    phone: Set(request.phone),
                    rating: Set(Decimal::ZERO),
                    ..Default::default()
                };
                let created = insert_with_id_retry(
                    db,
                    dealer::Entity.table_name(),
                    self.id_retry,
                    || model.clone().insert(db),
                )
                .await?;
                Account::Dealer(created)
            }
            UserType::Provider => {
                let company_name = required(request.company_name, "company_name", user_type)?;
                let model = provider::ActiveModel {
                    username: Set(request.username),
                    email: Set(request.email),
                    password_hash: Set(hash_password(&request.password)?),
                    company_name: Set(company_name),
                    license_number: Set(request.license_number),
                    address: Set(request.address),
                    phone: Set(request.phone),
                    rating: Set(Decimal::ZERO),
                    ..Default::default()
                };
                let created = insert_with_id_retry(
                    db,
                    provider::Entity.table_name(),
                    self.id_retry,
                    || model.clone().insert(db),
                )
                .await?;
                Account::Provider(created)
            }
        };

        info!(account_id = account.id(), "Account registered");
        Ok(account)
    }

    /// Checks credentials. Unknown usernames and wrong passwords look the same to the caller.
    #[instrument(skip(self, request), fields(user_type = %request.user_type, username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<Account, ServiceError> {
        request.validate()?;

        let Some(account) = self
            .find_by_username(request.user_type, &request.username)
            .await?
        else {
            warn!("Login for unknown username");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verify_password(&request.password, account.password_hash())? {
            warn!(account_id = account.id(), "Login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        info!(account_id = account.id(), "Login succeeded");
        Ok(account)
    }

    /// The account behind a session
    #[instrument(skip(self))]
    pub async fn get_account(&self, session: &SessionUser) -> Result<Account, ServiceError> {
        let db = &*self.db_pool;
        let account = match session.user_type {
            UserType::Customer => customer::Entity::find_by_id(session.id)
                .one(db)
                .await?
                .map(Account::Customer),
            UserType::Dealer => dealer::Entity::find_by_id(session.id)
                .one(db)
                .await?
                .map(Account::Dealer),
            UserType::Provider => provider::Entity::find_by_id(session.id)
                .one(db)
                .await?
                .map(Account::Provider),
        };

        account.ok_or_else(|| {
            ServiceError::NotFound(format!("{} {} not found", session.user_type, session.id))
        })
    }

    async fn find_by_username(
        &self,
        user_type: UserType,
        username: &str,
    ) -> Result<Option<Account>, ServiceError> {
        let db = &*self.db_pool;
        let account = match user_type {
            UserType::Customer => customer::Entity::find()
                .filter(customer::Column::Username.eq(username))
                .one(db)
                .await?
                .map(Account::Customer),
            UserType::Dealer => dealer::Entity::find()
                .filter(dealer::Column::Username.eq(username))
                .one(db)
                .await?
                .map(Account::Dealer),
            UserType::Provider => provider::Entity::find()
                .filter(provider::Column::Username.eq(username))
                .one(db)
                .await?
                .map(Account::Provider),
        };
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn account_serializes_with_type_tag_and_without_hash() {
        let account = Account::Dealer(dealer::Model {
            id: 7,
            username: "northside".into(),
            email: "ops@northside.test".into(),
            password_hash: "$argon2id$secret".into(),
            business_name: "Northside Supply".into(),
            license_number: None,
            address: None,
            phone: None,
            rating: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });

        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["type"], "dealer");
        assert_eq!(json["id"], 7);
        assert!(json.get("password_hash").is_none());
        assert_eq!(account.user_type(), UserType::Dealer);
    }

    #[test]
    fn role_specific_name_is_required() {
        let err = required(None, "company_name", UserType::Provider).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: company_name is required for provider accounts"
        );
    }
}
