use crate::{
    auth::{SessionUser, UserType},
    db::DbPool,
    entities::{
        dealer::Entity as DealerEntity,
        inventory::{self, Entity as InventoryEntity},
        order::{self, Entity as OrderEntity, OrderStatus, PaymentStatus},
        order_item::{self, Entity as OrderItemEntity},
        shipment::{self, Entity as ShipmentEntity, ShipmentStatus},
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

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub inventory_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub dealer_id: i32,
    #[validate(length(min = 1, max = 500))]
    pub shipping_address: String,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub carrier: String,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateShipmentStatusRequest {
    pub status: ShipmentStatus,
}

/// An order with its priced lines
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub order: order::Model,
    pub transaction: transaction::Model,
}

fn order_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Order {} not found", id))
}

/// Only the order's customer and dealer may see or touch it
fn ensure_order_party(session: &SessionUser, order: &order::Model) -> Result<(), ServiceError> {
    if session.is(UserType::Customer, order.customer_id)
        || session.is(UserType::Dealer, order.dealer_id)
    {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Order {} belongs to another account",
            order.id
        )))
    }
}

/// Who may request which move. The transition itself is checked separately.
fn may_move_order(user_type: UserType, from: OrderStatus, to: OrderStatus) -> bool {
    match (user_type, to) {
        (UserType::Customer, OrderStatus::Cancelled) => true,
        (UserType::Dealer, OrderStatus::Cancelled) => from == OrderStatus::Pending,
        (UserType::Dealer, _) => true,
        _ => false,
    }
}

/// Decrements stock only if enough is left, so concurrent orders cannot oversell
async fn take_stock<C>(conn: &C, inventory_id: i32, quantity: i32) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let result = InventoryEntity::update_many()
        .col_expr(
            inventory::Column::Quantity,
            Expr::col(inventory::Column::Quantity).sub(quantity),
        )
        .filter(inventory::Column::Id.eq(inventory_id))
        .filter(inventory::Column::Quantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "Inventory {} has fewer than {} units available",
            inventory_id, quantity
        )));
    }
    Ok(())
}

async fn return_stock<C>(conn: &C, inventory_id: i32, quantity: i32) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    InventoryEntity::update_many()
        .col_expr(
            inventory::Column::Quantity,
            Expr::col(inventory::Column::Quantity).add(quantity),
        )
        .filter(inventory::Column::Id.eq(inventory_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Writes the new status pair only if the row still holds the pair that was
/// read. A concurrent writer that got there first makes this fail.
async fn claim_order<C>(
    conn: &C,
    seen: &order::Model,
    status: OrderStatus,
    payment_status: PaymentStatus,
) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let result = OrderEntity::update_many()
        .set(order::ActiveModel {
            status: Set(status),
            payment_status: Set(payment_status),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(order::Column::Id.eq(seen.id))
        .filter(order::Column::Status.eq(seen.status))
        .filter(order::Column::PaymentStatus.eq(seen.payment_status))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(order_id = seen.id, "Order changed concurrently");
        return Err(ServiceError::InvalidTransition(format!(
            "order {} changed while it was being updated",
            seen.id
        )));
    }

    OrderEntity::find_by_id(seen.id)
        .one(conn)
        .await?
        .ok_or_else(|| order_not_found(seen.id))
}

#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Places an order for `customer_id`. Stock is taken and lines are
    /// priced from the dealer's inventory in one transaction.
    #[instrument(skip(self, request), fields(dealer_id = request.dealer_id, items = request.items.len()))]
    pub async fn place_order(
        &self,
        customer_id: i32,
        request: PlaceOrderRequest,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        let db = &*self.db_pool;
        if DealerEntity::find_by_id(request.dealer_id)
            .one(db)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Dealer {} not found",
                request.dealer_id
            )));
        }

        let txn = db.begin().await?;

        let mut lines = Vec::with_capacity(request.items.len());
        let mut total = Decimal::ZERO;
        for item in &request.items {
            let row = InventoryEntity::find_by_id(item.inventory_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Inventory {} not found", item.inventory_id))
                })?;
            if row.dealer_id != request.dealer_id {
                return Err(ServiceError::BadRequest(format!(
                    "Inventory {} is not sold by dealer {}",
                    row.id, request.dealer_id
                )));
            }

            let subtotal = line_amount(row.unit_price, item.quantity)?;
            total = add_amounts(total, subtotal)?;
            take_stock(&txn, row.id, item.quantity).await?;

            lines.push((row, item.quantity, subtotal));
        }

        let order = order::ActiveModel {
            customer_id: Set(customer_id),
            dealer_id: Set(request.dealer_id),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            total_amount: Set(total),
            shipping_address: Set(request.shipping_address),
            notes: Set(request.notes),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (row, quantity, subtotal) in lines {
            let item = order_item::ActiveModel {
                order_id: Set(order.id),
                inventory_id: Set(row.id),
                substance_id: Set(row.substance_id),
                quantity: Set(quantity),
                unit_price: Set(row.unit_price),
                subtotal: Set(subtotal),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;

        info!(order_id = order.id, customer_id, total = %order.total_amount, "Order placed");
        Ok(OrderDetail { order, items })
    }

    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<order::Model>, ServiceError> {
        let select = OrderEntity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    #[instrument(skip(self))]
    pub async fn list_for_dealer(
        &self,
        dealer_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<order::Model>, ServiceError> {
        let select = OrderEntity::find()
            .filter(order::Column::DealerId.eq(dealer_id))
            .order_by_desc(order::Column::Id);
        fetch_page(&self.db_pool, select, page, limit).await
    }

    /// Orders visible to the session: placed by a customer or addressed to a dealer
    pub async fn list_orders(
        &self,
        session: &SessionUser,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<order::Model>, ServiceError> {
        match session.user_type {
            UserType::Customer => self.list_for_customer(session.id, page, limit).await,
            UserType::Dealer => self.list_for_dealer(session.id, page, limit).await,
            UserType::Provider => Err(ServiceError::Forbidden(
                "Providers do not take part in customer orders".to_string(),
            )),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        session: &SessionUser,
        order_id: i32,
    ) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        ensure_order_party(session, &order)?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(db)
            .await?;

        Ok(OrderDetail { order, items })
    }

    /// Moves an order along its lifecycle. Cancelling puts the stock back
    /// and refunds a paid order.
    #[instrument(skip(self), fields(next = %next))]
    pub async fn update_status(
        &self,
        session: &SessionUser,
        order_id: i32,
        next: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        ensure_order_party(session, &order)?;

        if !order.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} cannot move from {} to {}",
                order_id, order.status, next
            )));
        }
        if !may_move_order(session.user_type, order.status, next) {
            return Err(ServiceError::Forbidden(format!(
                "{} accounts may not move an order from {} to {}",
                session.user_type, order.status, next
            )));
        }

        let refund = next == OrderStatus::Cancelled && order.payment_status == PaymentStatus::Paid;
        let payment_status = if refund {
            PaymentStatus::Refunded
        } else {
            order.payment_status
        };
        let updated = claim_order(&txn, &order, next, payment_status).await?;

        match next {
            OrderStatus::Cancelled => {
                let items = OrderItemEntity::find()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .all(&txn)
                    .await?;
                for item in &items {
                    return_stock(&txn, item.inventory_id, item.quantity).await?;
                }

                if refund {
                    record_transaction(
                        &txn,
                        TransactionKind::OrderRefund,
                        Some(order_id),
                        None,
                        order.total_amount,
                    )
                    .await?;
                    info!(order_id, amount = %order.total_amount, "Order refunded");
                }
            }
            OrderStatus::Delivered => {
                // Close out a shipment still in transit
                if let Some(shipment) = ShipmentEntity::find()
                    .filter(shipment::Column::OrderId.eq(order_id))
                    .one(&txn)
                    .await?
                {
                    if shipment.status.can_transition_to(ShipmentStatus::Delivered) {
                        let mut shipment: shipment::ActiveModel = shipment.into();
                        shipment.status = Set(ShipmentStatus::Delivered);
                        shipment.delivered_at = Set(Some(Utc::now()));
                        shipment.update(&txn).await?;
                    }
                }
            }
            _ => {}
        }

        txn.commit().await?;

        info!(order_id, from = %order.status, to = %next, "Order status updated");
        Ok(updated)
    }

    /// Settles an order for its customer
    #[instrument(skip(self))]
    pub async fn pay_order(
        &self,
        customer_id: i32,
        order_id: i32,
    ) -> Result<PaymentReceipt, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        if order.customer_id != customer_id {
            return Err(ServiceError::Forbidden(format!(
                "Order {} belongs to another customer",
                order_id
            )));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::BadRequest(format!(
                "Order {} is cancelled",
                order_id
            )));
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(ServiceError::BadRequest(format!(
                "Order {} payment is already {}",
                order_id, order.payment_status
            )));
        }

        let order = claim_order(&txn, &order, order.status, PaymentStatus::Paid).await?;
        let transaction = record_transaction(
            &txn,
            TransactionKind::OrderPayment,
            Some(order_id),
            None,
            order.total_amount,
        )
        .await?;

        txn.commit().await?;

        info!(order_id, amount = %order.total_amount, "Order paid");
        Ok(PaymentReceipt { order, transaction })
    }

    /// Ships a processing order. An order has at most one shipment; one
    /// already marked shipped by status update can still get its shipment.
    #[instrument(skip(self, request))]
    pub async fn create_shipment(
        &self,
        dealer_id: i32,
        order_id: i32,
        request: CreateShipmentRequest,
    ) -> Result<shipment::Model, ServiceError> {
        request.validate()?;
        let txn = self.db_pool.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        if order.dealer_id != dealer_id {
            return Err(ServiceError::Forbidden(format!(
                "Order {} is addressed to another dealer",
                order_id
            )));
        }

        if order.status != OrderStatus::Shipped
            && !order.status.can_transition_to(OrderStatus::Shipped)
        {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} cannot ship while {}",
                order_id, order.status
            )));
        }
        claim_order(&txn, &order, OrderStatus::Shipped, order.payment_status).await?;

        if let Some(existing) = ShipmentEntity::find()
            .filter(shipment::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
        {
            warn!(order_id, shipment_id = existing.id, "Second shipment rejected");
            return Err(ServiceError::BadRequest(format!(
                "Order {} already has shipment {}",
                order_id, existing.id
            )));
        }

        let shipment = shipment::ActiveModel {
            order_id: Set(order_id),
            carrier: Set(request.carrier),
            tracking_number: Set(request.tracking_number),
            status: Set(ShipmentStatus::InTransit),
            shipped_at: Set(Some(Utc::now())),
            delivered_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(order_id, shipment_id = shipment.id, "Shipment created");
        Ok(shipment)
    }

    #[instrument(skip(self))]
    pub async fn get_shipment(
        &self,
        session: &SessionUser,
        order_id: i32,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        ensure_order_party(session, &order)?;

        ShipmentEntity::find()
            .filter(shipment::Column::OrderId.eq(order_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} has no shipment", order_id)))
    }

    /// Advances a shipment; delivering it also delivers the order
    #[instrument(skip(self), fields(next = %next))]
    pub async fn update_shipment_status(
        &self,
        dealer_id: i32,
        shipment_id: i32,
        next: ShipmentStatus,
    ) -> Result<shipment::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let shipment = ShipmentEntity::find_by_id(shipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))?;
        let order = OrderEntity::find_by_id(shipment.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(shipment.order_id))?;
        if order.dealer_id != dealer_id {
            return Err(ServiceError::Forbidden(format!(
                "Shipment {} belongs to another dealer",
                shipment_id
            )));
        }

        if !shipment.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition(format!(
                "shipment {} cannot move from {} to {}",
                shipment_id, shipment.status, next
            )));
        }

        let from = shipment.status;
        let now = Utc::now();
        let result = ShipmentEntity::update_many()
            .set(shipment::ActiveModel {
                status: Set(next),
                delivered_at: if next == ShipmentStatus::Delivered {
                    Set(Some(now))
                } else {
                    Default::default()
                },
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(shipment::Column::Id.eq(shipment_id))
            .filter(shipment::Column::Status.eq(from))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidTransition(format!(
                "shipment {} changed while it was being updated",
                shipment_id
            )));
        }
        let updated = ShipmentEntity::find_by_id(shipment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))?;

        if next == ShipmentStatus::Delivered && order.status.can_transition_to(OrderStatus::Delivered) {
            claim_order(&txn, &order, OrderStatus::Delivered, order.payment_status).await?;
        }

        txn.commit().await?;

        info!(shipment_id, from = %from, to = %next, "Shipment status updated");
        Ok(updated)
    }
}
