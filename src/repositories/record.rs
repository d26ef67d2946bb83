//! Generic repository over every replica table.

use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, IdenStatic, Iterable, QueryFilter};

use crate::entities::SyncRecord;

/// Repository for replica records of any [`SyncRecord`] kind.
pub struct RecordRepository;

impl RecordRepository {
    /// Get a single record by id.
    pub async fn get_by_id<R, C>(conn: &C, id: &str) -> Result<Option<R>>
    where
        R: SyncRecord,
        C: ConnectionTrait,
    {
        Ok(R::Entity::find().filter(R::id_column().eq(id)).one(conn).await?)
    }

    /// Get every record of the kind.
    pub async fn get_all<R, C>(conn: &C) -> Result<Vec<R>>
    where
        R: SyncRecord,
        C: ConnectionTrait,
    {
        Ok(R::Entity::find().all(conn).await?)
    }

    /// Insert the record, or overwrite every column of the existing row with the same id.
    pub async fn upsert<R, C>(conn: &C, record: R) -> Result<()>
    where
        R: SyncRecord,
        C: ConnectionTrait,
    {
        let id_column = R::id_column();
        let update_columns: Vec<_> = <R::Entity as EntityTrait>::Column::iter()
            .filter(|column| IdenStatic::as_str(column) != IdenStatic::as_str(&id_column))
            .collect();

        R::Entity::insert(record.into_active())
            .on_conflict(
                OnConflict::column(id_column)
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Delete a record by id. Returns whether a row was removed.
    pub async fn delete<R, C>(conn: &C, id: &str) -> Result<bool>
    where
        R: SyncRecord,
        C: ConnectionTrait,
    {
        let result = R::Entity::delete_many()
            .filter(R::id_column().eq(id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete every record whose id is in `ids`.
    pub async fn delete_many<R, C>(conn: &C, ids: &[String]) -> Result<u64>
    where
        R: SyncRecord,
        C: ConnectionTrait,
    {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = R::Entity::delete_many()
            .filter(R::id_column().is_in(ids.iter().cloned()))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}
