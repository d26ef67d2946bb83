//! Optimistic local write path.
//!
//! Every write lands in the replica and appends its mutation in the same
//! transaction, so the queue never disagrees with the replica about what is
//! pending. The queue count is refreshed after commit, which wakes the
//! scheduler's push task.

use anyhow::{bail, Context, Result};
use log::debug;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde_json::{Map, Value};

use super::SyncService;
use crate::entities::mutation::MutationType;
use crate::entities::{Ownership, SyncRecord, SyncStatus};
use crate::kinds::EntityKind;
use crate::repositories::{MutationRepository, NewMutation, RecordRepository};
use crate::utils::now_millis;

/// Keys a patch may not touch: identity, bookkeeping and timestamps.
const PROTECTED_FIELDS: &[&str] = &["id", "userId", "syncStatus", "ownership", "createdAt", "updatedAt"];

impl SyncService {
    /// Inserts a new record and queues its CREATE.
    ///
    /// The record is stamped with the current user, `created` status and,
    /// for kinds that track it, a fresh `updatedAt`.
    ///
    /// # Errors
    /// Returns an error if nobody is signed in, a record with the same id
    /// exists, or a nested record's parent is missing or shared.
    pub async fn create<R: SyncRecord>(&self, mut record: R) -> Result<R> {
        let user_id = self.require_user()?;
        let now = now_millis();

        record.set_user_id(user_id.clone());
        record.set_sync_status(SyncStatus::Created);
        record.set_ownership(Ownership::Owned);
        record.touch(now);

        let txn = self.replica.connection().begin().await?;
        ensure_parent_writable(&txn, R::KIND, record.parent_id()).await?;
        if RecordRepository::get_by_id::<R, _>(&txn, record.id()).await?.is_some() {
            bail!("{} {} already exists", R::KIND, record.id());
        }

        let data = serde_json::to_value(&record)?;
        RecordRepository::upsert(&txn, record.clone()).await?;
        MutationRepository::enqueue(
            &txn,
            NewMutation {
                op: MutationType::Create,
                kind: R::KIND,
                entity_id: record.id().to_owned(),
                user_id,
                data: Some(data),
            },
            now,
        )
        .await?;
        txn.commit().await?;

        debug!("Created {} {}", R::KIND, record.id());
        self.after_local_write(R::KIND, vec![record.id().to_owned()]).await?;
        Ok(record)
    }

    /// Applies a partial JSON patch and queues an UPDATE carrying it.
    ///
    /// A record still waiting for its CREATE stays `created`; anything else
    /// becomes `updated`. Nested kinds get their parent id added to the
    /// queued payload so the push can build the endpoint.
    ///
    /// # Errors
    /// Returns an error if the record is missing, shared, or the patch does
    /// not produce a valid record.
    pub async fn update<R: SyncRecord>(&self, id: &str, patch: Value) -> Result<R> {
        let Value::Object(patch) = patch else {
            bail!("Update patch for {} {id} must be a JSON object", R::KIND);
        };
        let patch: Map<String, Value> = patch
            .into_iter()
            .filter(|(key, _)| !PROTECTED_FIELDS.contains(&key.as_str()))
            .collect();

        let user_id = self.require_user()?;
        let now = now_millis();

        let txn = self.replica.connection().begin().await?;
        let record = load_writable::<R>(&txn, id).await?;

        let mut merged = match serde_json::to_value(&record)? {
            Value::Object(map) => map,
            _ => bail!("{} {id} does not serialize to an object", R::KIND),
        };
        merged.extend(patch.clone());
        let mut updated: R = serde_json::from_value(Value::Object(merged))
            .with_context(|| format!("Invalid update for {} {id}", R::KIND))?;
        ensure_parent_writable(&txn, R::KIND, updated.parent_id()).await?;

        updated.touch(now);
        if updated.sync_status() != SyncStatus::Created {
            updated.set_sync_status(SyncStatus::Updated);
        }

        let mut data = patch;
        if let Some(updated_at) = updated.updated_at() {
            data.insert("updatedAt".to_string(), Value::from(updated_at));
        }
        insert_parent_field(&mut data, R::KIND, updated.parent_id());

        RecordRepository::upsert(&txn, updated.clone()).await?;
        MutationRepository::enqueue(
            &txn,
            NewMutation {
                op: MutationType::Update,
                kind: R::KIND,
                entity_id: id.to_owned(),
                user_id,
                data: Some(Value::Object(data)),
            },
            now,
        )
        .await?;
        txn.commit().await?;

        debug!("Updated {} {id}", R::KIND);
        self.after_local_write(R::KIND, vec![id.to_owned()]).await?;
        Ok(updated)
    }

    /// Removes a record and queues its DELETE.
    ///
    /// Nested children (board columns and cards, checklist items) are removed
    /// from the replica here as well; the server cascades on its side, so no
    /// mutations are queued for them. Returns `false` if the record did not
    /// exist.
    pub async fn delete<R: SyncRecord>(&self, id: &str) -> Result<bool> {
        self.remove_record::<R, _>(id, MutationType::Delete, |_| Ok(())).await
    }

    /// Shared by DELETE and PURGE_TRASHED: drop the record and its children,
    /// then queue `op`. `check` may veto the removal.
    pub(super) async fn remove_record<R, F>(&self, id: &str, op: MutationType, check: F) -> Result<bool>
    where
        R: SyncRecord,
        F: FnOnce(&R) -> Result<()>,
    {
        let user_id = self.require_user()?;
        let now = now_millis();

        let txn = self.replica.connection().begin().await?;
        let Some(record) = RecordRepository::get_by_id::<R, _>(&txn, id).await? else {
            txn.commit().await?;
            return Ok(false);
        };
        ensure_owned(&record)?;
        ensure_parent_writable(&txn, R::KIND, record.parent_id()).await?;
        check(&record)?;

        RecordRepository::delete::<R, _>(&txn, id).await?;
        let mut cascaded = Vec::new();
        for child in R::KIND.descriptor().children {
            let removed = child.kind.table().delete_children_of(&txn, id).await?;
            if !removed.is_empty() {
                cascaded.push((child.kind, removed));
            }
        }

        let mut data = Map::new();
        insert_parent_field(&mut data, R::KIND, record.parent_id());
        MutationRepository::enqueue(
            &txn,
            NewMutation {
                op,
                kind: R::KIND,
                entity_id: id.to_owned(),
                user_id,
                data: (!data.is_empty()).then_some(Value::Object(data)),
            },
            now,
        )
        .await?;
        txn.commit().await?;

        debug!("Removed {} {id} ({op:?})", R::KIND);
        for (kind, ids) in cascaded {
            self.replica.publish(kind, ids);
        }
        self.after_local_write(R::KIND, vec![id.to_owned()]).await?;
        Ok(true)
    }

    /// Queues `op` for an existing record after `apply` edits it in place.
    /// Used for operations that are neither a plain patch nor a removal.
    pub(super) async fn mutate_record<R, F>(&self, id: &str, op: MutationType, apply: F) -> Result<R>
    where
        R: SyncRecord,
        F: FnOnce(&mut R) -> Result<()>,
    {
        let user_id = self.require_user()?;
        let now = now_millis();

        let txn = self.replica.connection().begin().await?;
        let mut record = load_writable::<R>(&txn, id).await?;
        apply(&mut record)?;
        record.touch(now);
        if record.sync_status() != SyncStatus::Created {
            record.set_sync_status(SyncStatus::Updated);
        }

        let mut data = Map::new();
        insert_parent_field(&mut data, R::KIND, record.parent_id());
        RecordRepository::upsert(&txn, record.clone()).await?;
        MutationRepository::enqueue(
            &txn,
            NewMutation {
                op,
                kind: R::KIND,
                entity_id: id.to_owned(),
                user_id,
                data: Some(Value::Object(data)),
            },
            now,
        )
        .await?;
        txn.commit().await?;

        self.after_local_write(R::KIND, vec![id.to_owned()]).await?;
        Ok(record)
    }

    async fn after_local_write(&self, kind: EntityKind, ids: Vec<String>) -> Result<()> {
        self.replica.publish(kind, ids);
        self.queue.refresh().await?;
        Ok(())
    }
}

async fn load_writable<R: SyncRecord>(txn: &DatabaseTransaction, id: &str) -> Result<R> {
    let record = RecordRepository::get_by_id::<R, _>(txn, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("{} {id} not found", R::KIND))?;
    ensure_owned(&record)?;
    Ok(record)
}

fn ensure_owned<R: SyncRecord>(record: &R) -> Result<()> {
    if record.ownership() == Ownership::Shared {
        bail!(
            "{} {} is shared with this account and cannot be changed locally",
            R::KIND,
            record.id()
        );
    }
    Ok(())
}

/// Nested records need an existing parent that this account owns.
async fn ensure_parent_writable(
    txn: &DatabaseTransaction,
    kind: EntityKind,
    parent_id: Option<&str>,
) -> Result<()> {
    let Some(route) = kind.descriptor().parent.as_ref() else {
        return Ok(());
    };
    let parent_id = parent_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow::anyhow!("{kind} requires a {}", route.field))?;
    let parent = route
        .kind
        .table()
        .header(txn, parent_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("{} {parent_id} not found", route.kind))?;
    if parent.ownership == Ownership::Shared {
        bail!("{} {parent_id} is shared with this account and cannot be changed locally", route.kind);
    }
    Ok(())
}

fn insert_parent_field(data: &mut Map<String, Value>, kind: EntityKind, parent_id: Option<&str>) {
    if let (Some(route), Some(parent_id)) = (kind.descriptor().parent.as_ref(), parent_id) {
        data.insert(route.field.to_string(), Value::String(parent_id.to_owned()));
    }
}
