use crate::{
    auth::{SessionUser, UserType},
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity},
        purchase_order::{self, Entity as PurchaseOrderEntity},
        transaction::{self, Entity as TransactionEntity, TransactionKind},
    },
    errors::ServiceError,
    PaginatedResponse,
};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{fetch_page, transaction_reference};

pub const STATUS_COMPLETED: &str = "completed";

/// Records a completed money movement against an order or a purchase order
pub(crate) async fn record_transaction<C>(
    conn: &C,
    kind: TransactionKind,
    order_id: Option<i32>,
    purchase_order_id: Option<i32>,
    amount: Decimal,
) -> Result<transaction::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if order_id.is_some() == purchase_order_id.is_some() {
        return Err(ServiceError::InternalError(
            "a transaction references exactly one of an order or a purchase order".to_string(),
        ));
    }

    let recorded = transaction::ActiveModel {
        kind: Set(kind),
        order_id: Set(order_id),
        purchase_order_id: Set(purchase_order_id),
        amount: Set(amount),
        status: Set(STATUS_COMPLETED.to_string()),
        reference: Set(transaction_reference()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    debug!(transaction_id = recorded.id, kind = %kind, amount = %amount, "Transaction recorded");
    Ok(recorded)
}

/// Transactions a session may see: those on its orders or purchase orders
fn visible_to(session: &SessionUser) -> Condition {
    let orders_of = |column: order::Column| {
        transaction::Column::OrderId.in_subquery(
            Query::select()
                .column(order::Column::Id)
                .from(OrderEntity)
                .and_where(column.eq(session.id))
                .to_owned(),
        )
    };
    let purchase_orders_of = |column: purchase_order::Column| {
        transaction::Column::PurchaseOrderId.in_subquery(
            Query::select()
                .column(purchase_order::Column::Id)
                .from(PurchaseOrderEntity)
                .and_where(column.eq(session.id))
                .to_owned(),
        )
    };

    match session.user_type {
        UserType::Customer => Condition::all().add(orders_of(order::Column::CustomerId)),
        UserType::Dealer => Condition::any()
            .add(orders_of(order::Column::DealerId))
            .add(purchase_orders_of(purchase_order::Column::DealerId)),
        UserType::Provider => {
            Condition::all().add(purchase_orders_of(purchase_order::Column::ProviderId))
        }
    }
}

#[derive(Clone)]
pub struct TransactionService {
    db_pool: Arc<DbPool>,
}

impl TransactionService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        session: &SessionUser,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<transaction::Model>, ServiceError> {
        let select = TransactionEntity::find()
            .filter(visible_to(session))
            .order_by_desc(transaction::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        session: &SessionUser,
        id: i32,
    ) -> Result<transaction::Model, ServiceError> {
        let db = &*self.db_pool;
        let found = TransactionEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", id)))?;

        let is_party = if let Some(order_id) = found.order_id {
            OrderEntity::find_by_id(order_id)
                .one(db)
                .await?
                .map(|o| {
                    session.is(UserType::Customer, o.customer_id)
                        || session.is(UserType::Dealer, o.dealer_id)
                })
                .unwrap_or(false)
        } else if let Some(po_id) = found.purchase_order_id {
            PurchaseOrderEntity::find_by_id(po_id)
                .one(db)
                .await?
                .map(|po| {
                    session.is(UserType::Dealer, po.dealer_id)
                        || session.is(UserType::Provider, po.provider_id)
                })
                .unwrap_or(false)
        } else {
            false
        };

        if !is_party {
            return Err(ServiceError::Forbidden(format!(
                "Transaction {} belongs to another account",
                id
            )));
        }
        Ok(found)
    }
}
