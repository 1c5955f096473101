// Account management
pub mod accounts;
pub mod customers;
pub mod dealers;
pub mod providers;

// Catalog and stock
pub mod inventories;
pub mod substances;
pub mod transports;

// Trading
pub mod money;
pub mod orders;
pub mod purchase_orders;
pub mod transactions;

use crate::{db::DbPool, errors::ServiceError, PaginatedResponse};
use sea_orm::{EntityTrait, PaginatorTrait, Select};
use uuid::Uuid;

/// Fetches one page of `select`. `page` is 1-based.
pub(crate) async fn fetch_page<E>(
    db: &DbPool,
    select: Select<E>,
    page: u64,
    limit: u64,
) -> Result<PaginatedResponse<E::Model>, ServiceError>
where
    E: EntityTrait,
    E::Model: Sync + 'static,
{
    let page = page.max(1);
    let limit = limit.max(1);
    let paginator = select.paginate(db, limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;
    Ok(PaginatedResponse::new(items, total, page, limit))
}

/// Unique reference recorded on every money movement
pub(crate) fn transaction_reference() -> String {
    format!("TXN-{}", Uuid::new_v4().simple()).to_uppercase()
}

/// Migrated in-memory database and account rows for service tests
#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        db::{self, DbPool},
        entities::{customer, dealer, provider, substance},
    };
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};

    const PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2VlZGVk$c2VlZGVk";

    pub async fn migrated_db() -> DbPool {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let pool = Database::connect(opt).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    pub async fn customer(db: &DbPool) -> customer::Model {
        customer::ActiveModel {
            username: Set("buyer".to_string()),
            email: Set("buyer@buyers.test".to_string()),
            password_hash: Set(PASSWORD_HASH.to_string()),
            full_name: Set("Buyer".to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn dealer(db: &DbPool) -> dealer::Model {
        dealer::ActiveModel {
            username: Set("seller".to_string()),
            email: Set("seller@dealers.test".to_string()),
            password_hash: Set(PASSWORD_HASH.to_string()),
            business_name: Set("Seller Trading".to_string()),
            rating: Set(Decimal::ZERO),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    /// A provider with one substance in stock
    pub async fn provider_with_substance(
        db: &DbPool,
        stock_quantity: i32,
    ) -> (provider::Model, substance::Model) {
        let provider = provider::ActiveModel {
            username: Set("supplier".to_string()),
            email: Set("supplier@providers.test".to_string()),
            password_hash: Set(PASSWORD_HASH.to_string()),
            company_name: Set("Supplier Labs".to_string()),
            rating: Set(Decimal::ZERO),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        let substance = substance::ActiveModel {
            provider_id: Set(provider.id),
            name: Set("Sodium chloride".to_string()),
            category: Set("reagent".to_string()),
            unit: Set("kg".to_string()),
            price_per_unit: Set(Decimal::new(225, 2)),
            stock_quantity: Set(stock_quantity),
            is_available: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        (provider, substance)
    }
}
