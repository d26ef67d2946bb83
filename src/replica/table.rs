use std::marker::PhantomData;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, EntityTrait};
use serde_json::Value;

use crate::entities::{Ownership, SyncRecord, SyncStatus};
use crate::repositories::RecordRepository;

/// Synchronization fields of a record, independent of its kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub sync_status: SyncStatus,
    pub ownership: Ownership,
    pub updated_at: Option<i64>,
}

impl RecordHeader {
    fn of<R: SyncRecord>(record: &R) -> Self {
        Self {
            id: record.id().to_owned(),
            user_id: record.user_id().to_owned(),
            parent_id: record.parent_id().map(str::to_owned),
            sync_status: record.sync_status(),
            ownership: record.ownership(),
            updated_at: record.updated_at(),
        }
    }
}

/// Kind-erased access to one replica table, used by the sync engines.
///
/// Records cross this boundary as camelCase JSON, the same shape the server
/// speaks. All calls run inside the caller's transaction.
#[async_trait]
pub trait ReplicaTable: Send + Sync {
    /// Checks that a server payload decodes into a record of this kind.
    fn validate(&self, value: &Value) -> Result<()>;

    async fn header(&self, txn: &DatabaseTransaction, id: &str) -> Result<Option<RecordHeader>>;

    async fn headers(&self, txn: &DatabaseTransaction) -> Result<Vec<RecordHeader>>;

    async fn get_value(&self, txn: &DatabaseTransaction, id: &str) -> Result<Option<Value>>;

    /// Writes a record given as JSON, replacing any row with the same id.
    async fn put_value(&self, txn: &DatabaseTransaction, value: Value) -> Result<()>;

    /// Returns `false` when the record no longer exists.
    async fn set_sync_status(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        status: SyncStatus,
    ) -> Result<bool>;

    async fn delete(&self, txn: &DatabaseTransaction, id: &str) -> Result<bool>;

    async fn delete_many(&self, txn: &DatabaseTransaction, ids: &[String]) -> Result<u64>;

    /// Deletes every record nested under `parent_id`. Returns the removed ids.
    async fn delete_children_of(
        &self,
        txn: &DatabaseTransaction,
        parent_id: &str,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .headers(txn)
            .await?
            .into_iter()
            .filter(|header| header.parent_id.as_deref() == Some(parent_id))
            .map(|header| header.id)
            .collect();
        self.delete_many(txn, &ids).await?;
        Ok(ids)
    }
}

/// Replica table for records of type `R`.
pub struct Table<R>(PhantomData<fn() -> R>);

impl<R> Table<R> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<R: SyncRecord> Table<R> {
    fn decode(value: Value) -> Result<R> {
        serde_json::from_value(value).with_context(|| format!("Malformed {} record", R::KIND))
    }
}

#[async_trait]
impl<R> ReplicaTable for Table<R>
where
    R: SyncRecord + sea_orm::FromQueryResult,
    <R::Entity as EntityTrait>::ActiveModel: Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<()> {
        let record = Self::decode(value.clone())?;
        if record.id().is_empty() {
            anyhow::bail!("{} record without an id", R::KIND);
        }
        Ok(())
    }

    async fn header(&self, txn: &DatabaseTransaction, id: &str) -> Result<Option<RecordHeader>> {
        Ok(RecordRepository::get_by_id::<R, _>(txn, id)
            .await?
            .map(|record| RecordHeader::of(&record)))
    }

    async fn headers(&self, txn: &DatabaseTransaction) -> Result<Vec<RecordHeader>> {
        Ok(RecordRepository::get_all::<R, _>(txn)
            .await?
            .iter()
            .map(RecordHeader::of)
            .collect())
    }

    async fn get_value(&self, txn: &DatabaseTransaction, id: &str) -> Result<Option<Value>> {
        match RecordRepository::get_by_id::<R, _>(txn, id).await? {
            Some(record) => Ok(Some(serde_json::to_value(record)?)),
            None => Ok(None),
        }
    }

    async fn put_value(&self, txn: &DatabaseTransaction, value: Value) -> Result<()> {
        let record = Self::decode(value)?;
        RecordRepository::upsert(txn, record).await
    }

    async fn set_sync_status(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
        status: SyncStatus,
    ) -> Result<bool> {
        let Some(mut record) = RecordRepository::get_by_id::<R, _>(txn, id).await? else {
            return Ok(false);
        };
        if record.sync_status() != status {
            record.set_sync_status(status);
            RecordRepository::upsert(txn, record).await?;
        }
        Ok(true)
    }

    async fn delete(&self, txn: &DatabaseTransaction, id: &str) -> Result<bool> {
        RecordRepository::delete::<R, _>(txn, id).await
    }

    async fn delete_many(&self, txn: &DatabaseTransaction, ids: &[String]) -> Result<u64> {
        RecordRepository::delete_many::<R, _>(txn, ids).await
    }
}
