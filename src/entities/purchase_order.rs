use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

pub use super::order::PaymentStatus;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Shipped)
                | (Approved, Cancelled)
                | (Shipped, Received)
        )
    }
}

/// A dealer's order to a provider for one substance
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub dealer_id: i32,
    pub provider_id: i32,
    pub substance_id: i32,
    pub transport_id: Option<i32>,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub transport_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_amount: Decimal,
    pub status: PurchaseOrderStatus,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dealer::Entity",
        from = "Column::DealerId",
        to = "super::dealer::Column::Id"
    )]
    Dealer,
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id"
    )]
    Provider,
    #[sea_orm(
        belongs_to = "super::substance::Entity",
        from = "Column::SubstanceId",
        to = "super::substance::Column::Id"
    )]
    Substance,
    #[sea_orm(
        belongs_to = "super::provider_transport::Entity",
        from = "Column::TransportId",
        to = "super::provider_transport::Column::Id",
        on_delete = "SetNull"
    )]
    Transport,
}

impl Related<super::dealer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dealer.def()
    }
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl Related<super::substance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Substance.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert && matches!(active_model.created_at, ActiveValue::NotSet) {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PurchaseOrderStatus::Pending, PurchaseOrderStatus::Approved, true)]
    #[case(PurchaseOrderStatus::Pending, PurchaseOrderStatus::Rejected, true)]
    #[case(PurchaseOrderStatus::Pending, PurchaseOrderStatus::Cancelled, true)]
    #[case(PurchaseOrderStatus::Approved, PurchaseOrderStatus::Shipped, true)]
    #[case(PurchaseOrderStatus::Approved, PurchaseOrderStatus::Cancelled, true)]
    #[case(PurchaseOrderStatus::Shipped, PurchaseOrderStatus::Received, true)]
    #[case(PurchaseOrderStatus::Pending, PurchaseOrderStatus::Shipped, false)]
    #[case(PurchaseOrderStatus::Shipped, PurchaseOrderStatus::Cancelled, false)]
    #[case(PurchaseOrderStatus::Rejected, PurchaseOrderStatus::Approved, false)]
    #[case(PurchaseOrderStatus::Received, PurchaseOrderStatus::Shipped, false)]
    fn purchase_order_transitions(
        #[case] from: PurchaseOrderStatus,
        #[case] to: PurchaseOrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }
}
