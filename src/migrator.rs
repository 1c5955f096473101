use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_marketplace_tables::Migration)]
    }
}

mod m20240101_000001_create_marketplace_tables {
    use super::*;
    use crate::entities::{
        customer, dealer, inventory, order, order_item, provider, provider_transport,
        purchase_order, shipment, substance, transaction,
    };
    use sea_orm::EntityTrait;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_marketplace_tables"
        }
    }

    async fn create_from_entity<E>(manager: &SchemaManager<'_>, entity: E) -> Result<(), DbErr>
    where
        E: EntityTrait,
    {
        let schema = Schema::new(manager.get_database_backend());
        manager
            .create_table(
                schema
                    .create_table_from_entity(entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Referenced tables first
            create_from_entity(manager, customer::Entity).await?;
            create_from_entity(manager, dealer::Entity).await?;
            create_from_entity(manager, provider::Entity).await?;
            create_from_entity(manager, substance::Entity).await?;
            create_from_entity(manager, provider_transport::Entity).await?;
            create_from_entity(manager, inventory::Entity).await?;
            create_from_entity(manager, order::Entity).await?;
            create_from_entity(manager, order_item::Entity).await?;
            create_from_entity(manager, shipment::Entity).await?;
            create_from_entity(manager, purchase_order::Entity).await?;
            create_from_entity(manager, transaction::Entity).await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_inventories_dealer_substance")
                        .table(inventory::Entity)
                        .col(inventory::Column::DealerId)
                        .col(inventory::Column::SubstanceId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_substances_provider")
                        .table(substance::Entity)
                        .col(substance::Column::ProviderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(transaction::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(purchase_order::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(shipment::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(order_item::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(order::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(inventory::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(
                    Table::drop()
                        .table(provider_transport::Entity)
                        .if_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(substance::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(provider::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(dealer::Entity).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(customer::Entity).if_exists().to_owned())
                .await
        }
    }
}
