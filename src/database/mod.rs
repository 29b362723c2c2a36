pub mod migrator;
pub mod task_results;
pub mod tasks;

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

/// Connects to the configured store and brings its schema up to date.
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;
    migrator::Migrator::up(&db, None).await?;
    Ok(db)
}
