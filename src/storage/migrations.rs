//! Versioned schema upgrades.
//!
//! The applied version lives in `schema_meta`. Each step runs inside its own
//! transaction together with the version bump, so a crash mid-upgrade leaves
//! the previous version intact.

use anyhow::{bail, Result};
use log::info;
use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, Schema, Statement,
    TransactionTrait,
};

use crate::entities::{
    board, board_card, board_column, checklist, checklist_item, container, document, label,
    mutation,
};

/// Schema version produced by a fresh database.
pub const LATEST_VERSION: i64 = 2;

/// Tables that gained the `ownership` column in v2.
const OWNERSHIP_TABLES: &[&str] = &["documents", "boards"];

/// Brings the schema up to [`LATEST_VERSION`] and returns the resulting version.
pub async fn run(conn: &DatabaseConnection) -> Result<i64> {
    conn.execute(Statement::from_string(
        DbBackend::Sqlite,
        "CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL)",
    ))
    .await?;

    let mut version = current_version(conn).await?;
    if version > LATEST_VERSION {
        bail!("Local database has schema v{version}, newer than supported v{LATEST_VERSION}");
    }

    while version < LATEST_VERSION {
        let next = version + 1;
        let txn = conn.begin().await?;
        match next {
            1 => create_tables(&txn).await?,
            2 => add_ownership(&txn).await?,
            _ => bail!("No migration defined for schema v{next}"),
        }
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "INSERT INTO schema_meta (version) VALUES (?)",
            [next.into()],
        ))
        .await?;
        txn.commit().await?;

        info!("Applied schema migration v{next}");
        version = next;
    }

    Ok(version)
}

/// Highest applied version, 0 for a fresh database.
pub async fn current_version<C>(conn: &C) -> Result<i64>
where
    C: ConnectionTrait,
{
    let row = conn
        .query_one(Statement::from_string(
            DbBackend::Sqlite,
            "SELECT MAX(version) AS version FROM schema_meta",
        ))
        .await?;

    Ok(match row {
        Some(row) => row.try_get::<Option<i64>>("", "version")?.unwrap_or(0),
        None => 0,
    })
}

async fn create_table<C, E>(conn: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let statement = schema.create_table_from_entity(entity).if_not_exists().to_owned();
    conn.execute(conn.get_database_backend().build(&statement)).await?;
    Ok(())
}

/// v1: one table per kind plus the mutation queue.
async fn create_tables<C>(conn: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let schema = Schema::new(DbBackend::Sqlite);

    create_table(conn, &schema, container::Entity).await?;
    create_table(conn, &schema, label::Entity).await?;
    create_table(conn, &schema, document::Entity).await?;
    create_table(conn, &schema, checklist::Entity).await?;
    create_table(conn, &schema, checklist_item::Entity).await?;
    create_table(conn, &schema, board::Entity).await?;
    create_table(conn, &schema, board_column::Entity).await?;
    create_table(conn, &schema, board_card::Entity).await?;
    create_table(conn, &schema, mutation::Entity).await?;

    let replay_order = Index::create()
        .if_not_exists()
        .name("idx_mutation_queue_user_created")
        .table(mutation::Entity)
        .col(mutation::Column::UserId)
        .col(mutation::Column::CreatedAt)
        .to_owned();
    conn.execute(conn.get_database_backend().build(&replay_order)).await?;

    Ok(())
}

/// v2: ownership tag on shareable kinds. Existing rows become `owned`.
async fn add_ownership<C>(conn: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    for table in OWNERSHIP_TABLES {
        if !has_column(conn, table, "ownership").await? {
            conn.execute(Statement::from_string(
                DbBackend::Sqlite,
                format!("ALTER TABLE {table} ADD COLUMN ownership TEXT NOT NULL DEFAULT 'owned'"),
            ))
            .await?;
        }
        conn.execute(Statement::from_string(
            DbBackend::Sqlite,
            format!("UPDATE {table} SET ownership = 'owned' WHERE ownership IS NULL OR ownership = ''"),
        ))
        .await?;
    }
    Ok(())
}

/// Whether `table` already has `column`.
pub async fn has_column<C>(conn: &C, table: &str, column: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let rows = conn
        .query_all(Statement::from_string(
            DbBackend::Sqlite,
            format!("PRAGMA table_info({table})"),
        ))
        .await?;

    for row in rows {
        if row.try_get::<String>("", "name")? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Removes every row from the replica tables and the queue.
pub async fn truncate_all(conn: &DatabaseConnection) -> Result<()> {
    let txn = conn.begin().await?;
    mutation::Entity::delete_many().exec(&txn).await?;
    board_card::Entity::delete_many().exec(&txn).await?;
    board_column::Entity::delete_many().exec(&txn).await?;
    board::Entity::delete_many().exec(&txn).await?;
    checklist_item::Entity::delete_many().exec(&txn).await?;
    checklist::Entity::delete_many().exec(&txn).await?;
    document::Entity::delete_many().exec(&txn).await?;
    label::Entity::delete_many().exec(&txn).await?;
    container::Entity::delete_many().exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}
