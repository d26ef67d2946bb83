//! Local replica: the on-device copy of every synchronized record.
//!
//! Reads are served from here without touching the network. Every write that
//! goes through [`LocalReplica`] publishes a [`ReplicaChange`] so views can
//! refresh. The sync engines write through the kind-erased [`ReplicaTable`]
//! inside their own transactions and publish once the transaction commits.

mod table;

pub use table::{RecordHeader, ReplicaTable, Table};

use anyhow::Result;
use log::debug;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::sync::broadcast;

use crate::entities::SyncRecord;
use crate::kinds::EntityKind;
use crate::repositories::RecordRepository;

/// Capacity of the change channel. Slow subscribers see `Lagged` and should reload.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Records of one kind that were written or removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaChange {
    pub kind: EntityKind,
    pub ids: Vec<String>,
}

#[derive(Clone)]
pub struct LocalReplica {
    conn: DatabaseConnection,
    changes: broadcast::Sender<ReplicaChange>,
}

impl LocalReplica {
    pub fn new(conn: DatabaseConnection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { conn, changes }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ReplicaChange> {
        self.changes.subscribe()
    }

    /// Announce changed records. Having no subscribers is fine.
    pub(crate) fn publish(&self, kind: EntityKind, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        debug!("Replica change: {} x{}", kind, ids.len());
        let _ = self.changes.send(ReplicaChange { kind, ids });
    }

    pub async fn get<R: SyncRecord>(&self, id: &str) -> Result<Option<R>> {
        RecordRepository::get_by_id::<R, _>(&self.conn, id).await
    }

    pub async fn all<R: SyncRecord>(&self) -> Result<Vec<R>> {
        RecordRepository::get_all::<R, _>(&self.conn).await
    }

    /// Records of kind `R` matching `predicate`.
    pub async fn query<R, F>(&self, predicate: F) -> Result<Vec<R>>
    where
        R: SyncRecord,
        F: Fn(&R) -> bool,
    {
        Ok(self
            .all::<R>()
            .await?
            .into_iter()
            .filter(|record| predicate(record))
            .collect())
    }

    pub async fn put<R: SyncRecord>(&self, record: R) -> Result<()> {
        let id = record.id().to_owned();
        RecordRepository::upsert(&self.conn, record).await?;
        self.publish(R::KIND, vec![id]);
        Ok(())
    }

    /// Writes all records in one transaction.
    pub async fn bulk_put<R: SyncRecord>(&self, records: Vec<R>) -> Result<()> {
        let ids: Vec<String> = records.iter().map(|r| r.id().to_owned()).collect();
        let txn = self.conn.begin().await?;
        for record in records {
            RecordRepository::upsert(&txn, record).await?;
        }
        txn.commit().await?;
        self.publish(R::KIND, ids);
        Ok(())
    }

    pub async fn delete<R: SyncRecord>(&self, id: &str) -> Result<bool> {
        let removed = RecordRepository::delete::<R, _>(&self.conn, id).await?;
        if removed {
            self.publish(R::KIND, vec![id.to_owned()]);
        }
        Ok(removed)
    }

    pub async fn bulk_delete<R: SyncRecord>(&self, ids: &[String]) -> Result<u64> {
        let removed = RecordRepository::delete_many::<R, _>(&self.conn, ids).await?;
        if removed > 0 {
            self.publish(R::KIND, ids.to_vec());
        }
        Ok(removed)
    }

    /// Sync header of any record, looked up by kind.
    pub async fn header(&self, kind: EntityKind, id: &str) -> Result<Option<RecordHeader>> {
        let txn = self.conn.begin().await?;
        let header = kind.table().header(&txn, id).await?;
        txn.commit().await?;
        Ok(header)
    }
}
