use crate::{
    auth::{SessionUser, UserType},
    db::DbPool,
    entities::{
        inventory::{self, Entity as InventoryEntity},
        provider::Entity as ProviderEntity,
        provider_transport::Entity as TransportEntity,
        purchase_order::{self, Entity as PurchaseOrderEntity, PaymentStatus, PurchaseOrderStatus},
        substance::{self, Entity as SubstanceEntity},
        transaction::{self, TransactionKind},
    },
    errors::ServiceError,
    PaginatedResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::{
    fetch_page,
    money::{add_amounts, line_amount},
    transactions::record_transaction,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderRequest {
    pub provider_id: i32,
    pub substance_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub transport_id: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePurchaseOrderStatusRequest {
    pub status: PurchaseOrderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchasePaymentReceipt {
    pub purchase_order: purchase_order::Model,
    pub transaction: transaction::Model,
}

fn purchase_order_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Purchase order {} not found", id))
}

fn ensure_purchase_order_party(
    session: &SessionUser,
    po: &purchase_order::Model,
) -> Result<(), ServiceError> {
    if session.is(UserType::Dealer, po.dealer_id) || session.is(UserType::Provider, po.provider_id)
    {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Purchase order {} belongs to another account",
            po.id
        )))
    }
}

/// Providers decide and ship, dealers cancel and receive
fn may_move_purchase_order(user_type: UserType, to: PurchaseOrderStatus) -> bool {
    use PurchaseOrderStatus::*;
    match user_type {
        UserType::Provider => matches!(to, Approved | Rejected | Shipped),
        UserType::Dealer => matches!(to, Cancelled | Received),
        UserType::Customer => false,
    }
}

/// quantity * unit price, plus the flat transport cost
pub(crate) fn purchase_total(
    quantity: i32,
    unit_price: Decimal,
    transport_cost: Decimal,
) -> Result<Decimal, ServiceError> {
    add_amounts(line_amount(unit_price, quantity)?, transport_cost)
}

async fn take_substance_stock<C>(
    conn: &C,
    substance_id: i32,
    quantity: i32,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let result = SubstanceEntity::update_many()
        .col_expr(
            substance::Column::StockQuantity,
            Expr::col(substance::Column::StockQuantity).sub(quantity),
        )
        .filter(substance::Column::Id.eq(substance_id))
        .filter(substance::Column::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "Substance {} has fewer than {} units in stock",
            substance_id, quantity
        )));
    }
    Ok(())
}

/// Adds received goods to the dealer's inventory, opening a row at the
/// purchase price when the dealer did not stock the substance yet
async fn receive_into_inventory<C>(conn: &C, po: &purchase_order::Model) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let existing = InventoryEntity::find()
        .filter(inventory::Column::DealerId.eq(po.dealer_id))
        .filter(inventory::Column::SubstanceId.eq(po.substance_id))
        .one(conn)
        .await?;

    match existing {
        Some(row) => {
            InventoryEntity::update_many()
                .col_expr(
                    inventory::Column::Quantity,
                    Expr::col(inventory::Column::Quantity).add(po.quantity),
                )
                .filter(inventory::Column::Id.eq(row.id))
                .exec(conn)
                .await?;
        }
        None => {
            inventory::ActiveModel {
                dealer_id: Set(po.dealer_id),
                substance_id: Set(po.substance_id),
                quantity: Set(po.quantity),
                unit_price: Set(po.unit_price),
                reorder_level: Set(0),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

/// Moves a purchase order to the given status pair only if the row still
/// holds the pair that was read
async fn claim_purchase_order<C>(
    conn: &C,
    seen: &purchase_order::Model,
    status: PurchaseOrderStatus,
    payment_status: PaymentStatus,
) -> Result<purchase_order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let result = PurchaseOrderEntity::update_many()
        .set(purchase_order::ActiveModel {
            status: Set(status),
            payment_status: Set(payment_status),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(purchase_order::Column::Id.eq(seen.id))
        .filter(purchase_order::Column::Status.eq(seen.status))
        .filter(purchase_order::Column::PaymentStatus.eq(seen.payment_status))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(purchase_order_id = seen.id, "Purchase order changed concurrently");
        return Err(ServiceError::InvalidTransition(format!(
            "purchase order {} changed while it was being updated",
            seen.id
        )));
    }

    PurchaseOrderEntity::find_by_id(seen.id)
        .one(conn)
        .await?
        .ok_or_else(|| purchase_order_not_found(seen.id))
}

/// Dealer-to-provider procurement
#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DbPool>,
}

impl PurchaseOrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(provider_id = request.provider_id, substance_id = request.substance_id))]
    pub async fn create_purchase_order(
        &self,
        dealer_id: i32,
        request: CreatePurchaseOrderRequest,
    ) -> Result<purchase_order::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;

        if ProviderEntity::find_by_id(request.provider_id)
            .one(db)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Provider {} not found",
                request.provider_id
            )));
        }

        let substance = SubstanceEntity::find_by_id(request.substance_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Substance {} not found", request.substance_id))
            })?;
        if substance.provider_id != request.provider_id {
            return Err(ServiceError::BadRequest(format!(
                "Substance {} is not offered by provider {}",
                substance.id, request.provider_id
            )));
        }
        if !substance.is_available {
            return Err(ServiceError::BadRequest(format!(
                "Substance {} is not available",
                substance.id
            )));
        }
        if substance.stock_quantity < request.quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Substance {} has {} units in stock, {} requested",
                substance.id, substance.stock_quantity, request.quantity
            )));
        }

        let transport_cost = match request.transport_id {
            Some(transport_id) => {
                let transport = TransportEntity::find_by_id(transport_id)
                    .one(db)
                    .await?
                    .filter(|t| t.provider_id == request.provider_id && t.is_active)
                    .ok_or_else(|| {
                        ServiceError::BadRequest(format!(
                            "Transport {} is not an active option of provider {}",
                            transport_id, request.provider_id
                        ))
                    })?;
                transport.cost
            }
            None => Decimal::ZERO,
        };

        let total = purchase_total(request.quantity, substance.price_per_unit, transport_cost)?;
        let created = purchase_order::ActiveModel {
            dealer_id: Set(dealer_id),
            provider_id: Set(request.provider_id),
            substance_id: Set(request.substance_id),
            transport_id: Set(request.transport_id),
            quantity: Set(request.quantity),
            unit_price: Set(substance.price_per_unit),
            transport_cost: Set(transport_cost),
            total_amount: Set(total),
            status: Set(PurchaseOrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            notes: Set(request.notes),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(purchase_order_id = created.id, dealer_id, total = %created.total_amount, "Purchase order created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list_for_dealer(
        &self,
        dealer_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<purchase_order::Model>, ServiceError> {
        let select = PurchaseOrderEntity::find()
            .filter(purchase_order::Column::DealerId.eq(dealer_id))
            .order_by_desc(purchase_order::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    #[instrument(skip(self))]
    pub async fn list_for_provider(
        &self,
        provider_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<purchase_order::Model>, ServiceError> {
        let select = PurchaseOrderEntity::find()
            .filter(purchase_order::Column::ProviderId.eq(provider_id))
            .order_by_desc(purchase_order::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    pub async fn list_purchase_orders(
        &self,
        session: &SessionUser,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<purchase_order::Model>, ServiceError> {
        match session.user_type {
            UserType::Dealer => self.list_for_dealer(session.id, page, limit).await,
            UserType::Provider => self.list_for_provider(session.id, page, limit).await,
            UserType::Customer => Err(ServiceError::Forbidden(
                "Customers do not take part in purchase orders".to_string(),
            )),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_purchase_order(
        &self,
        session: &SessionUser,
        id: i32,
    ) -> Result<purchase_order::Model, ServiceError> {
        let po = PurchaseOrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| purchase_order_not_found(id))?;
        ensure_purchase_order_party(session, &po)?;
        Ok(po)
    }

    /// Shipping takes the provider's stock; receiving adds to the dealer's inventory
    #[instrument(skip(self), fields(next = %next))]
    pub async fn update_status(
        &self,
        session: &SessionUser,
        id: i32,
        next: PurchaseOrderStatus,
    ) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let po = PurchaseOrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| purchase_order_not_found(id))?;
        ensure_purchase_order_party(session, &po)?;

        if !po.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition(format!(
                "purchase order {} cannot move from {} to {}",
                id, po.status, next
            )));
        }
        if !may_move_purchase_order(session.user_type, next) {
            return Err(ServiceError::Forbidden(format!(
                "{} accounts may not move a purchase order to {}",
                session.user_type, next
            )));
        }

        let from = po.status;
        let updated = claim_purchase_order(&txn, &po, next, po.payment_status).await?;

        match next {
            PurchaseOrderStatus::Shipped => {
                take_substance_stock(&txn, po.substance_id, po.quantity).await?
            }
            PurchaseOrderStatus::Received => receive_into_inventory(&txn, &po).await?,
            _ => {}
        }

        txn.commit().await?;

        info!(purchase_order_id = id, from = %from, to = %next, "Purchase order status updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn pay_purchase_order(
        &self,
        dealer_id: i32,
        id: i32,
    ) -> Result<PurchasePaymentReceipt, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let po = PurchaseOrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| purchase_order_not_found(id))?;
        if po.dealer_id != dealer_id {
            return Err(ServiceError::Forbidden(format!(
                "Purchase order {} belongs to another dealer",
                id
            )));
        }
        if matches!(
            po.status,
            PurchaseOrderStatus::Rejected | PurchaseOrderStatus::Cancelled
        ) {
            return Err(ServiceError::BadRequest(format!(
                "Purchase order {} is {}",
                id, po.status
            )));
        }
        if po.payment_status != PaymentStatus::Pending {
            return Err(ServiceError::BadRequest(format!(
                "Purchase order {} payment is already {}",
                id, po.payment_status
            )));
        }

        let purchase_order =
            claim_purchase_order(&txn, &po, po.status, PaymentStatus::Paid).await?;
        let transaction = record_transaction(
            &txn,
            TransactionKind::PurchasePayment,
            None,
            Some(id),
            po.total_amount,
        )
        .await?;

        txn.commit().await?;

        info!(purchase_order_id = id, amount = %purchase_order.total_amount, "Purchase order paid");
        Ok(PurchasePaymentReceipt {
            purchase_order,
            transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn total_includes_transport_cost() {
        assert_eq!(purchase_total(4, dec!(12.5), dec!(7.25)).ok(), Some(dec!(57.25)));
        assert_eq!(purchase_total(1, dec!(3), Decimal::ZERO).ok(), Some(dec!(3)));
        assert!(matches!(
            purchase_total(i32::MAX, dec!(9999999999.99), dec!(1)),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[rstest]
    #[case(UserType::Provider, PurchaseOrderStatus::Approved, true)]
    #[case(UserType::Provider, PurchaseOrderStatus::Shipped, true)]
    #[case(UserType::Provider, PurchaseOrderStatus::Received, false)]
    #[case(UserType::Dealer, PurchaseOrderStatus::Received, true)]
    #[case(UserType::Dealer, PurchaseOrderStatus::Cancelled, true)]
    #[case(UserType::Dealer, PurchaseOrderStatus::Approved, false)]
    #[case(UserType::Customer, PurchaseOrderStatus::Cancelled, false)]
    fn who_may_move_a_purchase_order(
        #[case] role: UserType,
        #[case] to: PurchaseOrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(may_move_purchase_order(role, to), allowed);
    }

    #[tokio::test]
    async fn second_receive_from_the_same_read_is_refused() {
        let db = test_support::migrated_db().await;
        let dealer = test_support::dealer(&db).await;
        let (provider, substance) = test_support::provider_with_substance(&db, 50).await;
        let seen = purchase_order::ActiveModel {
            dealer_id: Set(dealer.id),
            provider_id: Set(provider.id),
            substance_id: Set(substance.id),
            transport_id: Set(None),
            quantity: Set(4),
            unit_price: Set(dec!(2.25)),
            transport_cost: Set(Decimal::ZERO),
            total_amount: Set(dec!(9)),
            status: Set(PurchaseOrderStatus::Shipped),
            payment_status: Set(PaymentStatus::Pending),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let received = claim_purchase_order(
            &db,
            &seen,
            PurchaseOrderStatus::Received,
            PaymentStatus::Pending,
        )
        .await
        .unwrap();
        assert_eq!(received.status, PurchaseOrderStatus::Received);

        assert_matches!(
            claim_purchase_order(&db, &seen, PurchaseOrderStatus::Received, PaymentStatus::Pending)
                .await,
            Err(ServiceError::InvalidTransition(_))
        );

        // A payment taken from the same stale read is refused as well
        assert_matches!(
            claim_purchase_order(&db, &seen, seen.status, PaymentStatus::Paid).await,
            Err(ServiceError::InvalidTransition(_))
        );
        let stored = PurchaseOrderEntity::find_by_id(seen.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }
}
