use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};

use crate::models::{
    activity, category, faculty, job_posting, portfolio, sheet, sheet_entry, student, user,
};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Create every table from the entity definitions if it does not exist yet.
/// Production databases are migrated out of band; this is for SQLite
/// development setups and tests.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, student::Entity).await?;
    create_table(db, &schema, faculty::Entity).await?;
    create_table(db, &schema, category::Entity).await?;
    create_table(db, &schema, activity::Entity).await?;
    create_table(db, &schema, portfolio::Entity).await?;
    create_table(db, &schema, sheet::Entity).await?;
    create_table(db, &schema, sheet_entry::Entity).await?;
    create_table(db, &schema, job_posting::Entity).await?;

    log::info!("Database schema ensured");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
