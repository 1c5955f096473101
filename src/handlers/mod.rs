pub mod auth;
pub mod common;
pub mod customers;
pub mod dealers;
pub mod inventories;
pub mod orders;
pub mod providers;
pub mod purchase_orders;
pub mod shipments;
pub mod substances;
pub mod transactions;

use crate::db::{DbPool, IdRetryConfig};
use crate::services::{
    accounts::AccountService, customers::CustomerService, dealers::DealerService,
    inventories::InventoryService, orders::OrderService, providers::ProviderService,
    purchase_orders::PurchaseOrderService, substances::SubstanceService,
    transactions::TransactionService, transports::TransportService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub customers: Arc<CustomerService>,
    pub dealers: Arc<DealerService>,
    pub providers: Arc<ProviderService>,
    pub substances: Arc<SubstanceService>,
    pub transports: Arc<TransportService>,
    pub inventories: Arc<InventoryService>,
    pub orders: Arc<OrderService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub transactions: Arc<TransactionService>,
}

impl AppServices {
    /// Services creating rows in seeded tables share the same id retry ceiling
    pub fn new(db_pool: Arc<DbPool>, id_retry: IdRetryConfig) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(db_pool.clone(), id_retry)),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            dealers: Arc::new(DealerService::new(db_pool.clone())),
            providers: Arc::new(ProviderService::new(db_pool.clone())),
            substances: Arc::new(SubstanceService::new(db_pool.clone(), id_retry)),
            transports: Arc::new(TransportService::new(db_pool.clone(), id_retry)),
            inventories: Arc::new(InventoryService::new(db_pool.clone(), id_retry)),
            orders: Arc::new(OrderService::new(db_pool.clone())),
            purchase_orders: Arc::new(PurchaseOrderService::new(db_pool.clone())),
            transactions: Arc::new(TransactionService::new(db_pool)),
        }
    }
}
