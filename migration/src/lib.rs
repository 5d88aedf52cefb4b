pub use sea_orm_migration::prelude::*;

mod m20240901_000001_create_users_and_catalog;
mod m20240901_000002_create_inventory_and_masters;
mod m20240901_000003_create_documents_and_ledger;
mod m20240902_000001_create_storefront;
mod m20240902_000002_create_collaboration;
mod m20240903_000001_create_partner_diamonds;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240901_000001_create_users_and_catalog::Migration),
            Box::new(m20240901_000002_create_inventory_and_masters::Migration),
            Box::new(m20240901_000003_create_documents_and_ledger::Migration),
            Box::new(m20240902_000001_create_storefront::Migration),
            Box::new(m20240902_000002_create_collaboration::Migration),
            Box::new(m20240903_000001_create_partner_diamonds::Migration),
        ]
    }
}
