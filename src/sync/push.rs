//! Push engine: replays the mutation queue against the remote store.

use std::collections::HashSet;

use anyhow::Result;
use log::{debug, error, info, warn};
use sea_orm::TransactionTrait;
use serde_json::Value;

use super::{SyncOutcome, SyncService};
use crate::entities::mutation::{self, MutationType};
use crate::entities::{Ownership, SyncStatus};
use crate::kinds::EntityKind;
use crate::remote::ApiRequest;
use crate::repositories::MutationRepository;

/// Tally of one push run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Items the server accepted (including duplicate CREATEs answered with 409).
    pub applied: usize,
    /// Items removed without success: resource gone, shared target, or unroutable.
    pub dropped: usize,
    /// Items left in the queue for the next run.
    pub retained: usize,
    /// Records whose status converged to `synced` during the run.
    pub converged: usize,
}

/// What happened to a single queue item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemResult {
    Applied { converged: bool },
    Dropped,
    Retained,
}

/// How to settle a record once its item left the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Convergence {
    /// Server confirmed the write: flip to `synced` unless edited since.
    RaceChecked,
    /// Server no longer has the record: flip unconditionally so the next
    /// pull's tombstone sweep can drop it.
    Unconditional,
}

impl SyncService {
    /// Replays the current user's queued mutations in order.
    ///
    /// Items of one record replay strictly in order: once one is retained,
    /// the record's later items stay queued too, while other records go on.
    ///
    /// Only one push runs at a time; a call that finds one in flight returns
    /// [`SyncOutcome::AlreadyRunning`] immediately.
    pub async fn push(&self) -> SyncOutcome<PushReport> {
        let Some(_guard) = self.push_gate.try_begin() else {
            debug!("Push already in progress, skipping");
            return SyncOutcome::AlreadyRunning;
        };
        let Some(user_id) = self.session.user_id() else {
            debug!("No session, skipping push");
            return SyncOutcome::NoSession;
        };

        match self.push_for_user(&user_id).await {
            Ok(report) => SyncOutcome::Completed(report),
            Err(e) => {
                error!("❌ Push aborted: {e:#}");
                SyncOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    async fn push_for_user(&self, user_id: &str) -> Result<PushReport> {
        let items = self.queue.items_for_user(user_id).await?;
        let mut report = PushReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        info!("🔄 Pushing {} queued mutations...", items.len());
        // Records with a retained item; their later items wait for the next run.
        let mut blocked: HashSet<(EntityKind, String)> = HashSet::new();
        for item in &items {
            let key = (item.entity_kind, item.entity_id.clone());
            if blocked.contains(&key) {
                debug!(
                    "Holding {:?} {} {} behind an earlier retained item",
                    item.op, item.entity_kind, item.entity_id
                );
                report.retained += 1;
                continue;
            }

            match self.push_item(item).await {
                Ok(ItemResult::Applied { converged }) => {
                    report.applied += 1;
                    if converged {
                        report.converged += 1;
                    }
                }
                Ok(ItemResult::Dropped) => report.dropped += 1,
                Ok(ItemResult::Retained) => {
                    report.retained += 1;
                    blocked.insert(key);
                }
                Err(e) => {
                    error!(
                        "Failed to settle {:?} {} {}: {e:#}",
                        item.op, item.entity_kind, item.entity_id
                    );
                    report.retained += 1;
                    blocked.insert(key);
                }
            }
        }
        self.queue.refresh().await?;

        info!(
            "✅ Push finished: {} applied, {} dropped, {} retained",
            report.applied, report.dropped, report.retained
        );
        Ok(report)
    }

    async fn push_item(&self, item: &mutation::Model) -> Result<ItemResult> {
        let kind = item.entity_kind;
        let descriptor = kind.descriptor();
        let local = self.replica.header(kind, &item.entity_id).await?;

        if descriptor.ownership_guarded && local.as_ref().is_some_and(|h| h.ownership == Ownership::Shared) {
            warn!("Dropping {:?} for shared {kind} {}", item.op, item.entity_id);
            self.settle(item, None).await?;
            return Ok(ItemResult::Dropped);
        }

        let request = match self.request_for(item, local.as_ref().and_then(|h| h.parent_id.as_deref())) {
            Ok(request) => request,
            Err(e) => {
                error!("Dropping unroutable {:?} for {kind} {}: {e:#}", item.op, item.entity_id);
                self.settle(item, None).await?;
                return Ok(ItemResult::Dropped);
            }
        };

        match self.remote.send(request).await {
            Ok(_) => {
                let converged = self.settle(item, Some(Convergence::RaceChecked)).await?;
                Ok(ItemResult::Applied { converged })
            }
            Err(e) if e.is_conflict() && item.op == MutationType::Create => {
                debug!("{kind} {} already exists remotely, treating CREATE as applied", item.entity_id);
                let converged = self.settle(item, Some(Convergence::RaceChecked)).await?;
                Ok(ItemResult::Applied { converged })
            }
            Err(e) if e.is_gone() => {
                info!("{kind} {} is gone remotely, dropping {:?}", item.entity_id, item.op);
                self.settle(item, Some(Convergence::Unconditional)).await?;
                Ok(ItemResult::Dropped)
            }
            Err(e) => {
                warn!("{:?} {kind} {} failed, will retry: {e}", item.op, item.entity_id);
                Ok(ItemResult::Retained)
            }
        }
    }

    /// Builds the REST call for an item. Nested kinds read their parent id
    /// from the payload and fall back to the local record.
    fn request_for(&self, item: &mutation::Model, local_parent: Option<&str>) -> Result<ApiRequest> {
        let descriptor = item.entity_kind.descriptor();
        let mut data = item.data.clone();

        if let (Some(route), Some(parent_id)) = (descriptor.parent.as_ref(), local_parent) {
            if descriptor.parent_id_in(data.as_ref()).is_none() {
                let mut map = match data {
                    Some(Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                map.insert(route.field.to_string(), Value::String(parent_id.to_owned()));
                data = Some(Value::Object(map));
            }
        }

        descriptor.request_for(item.op, &item.entity_id, data.as_ref())
    }

    /// Removes the item and, for converging operations, flips the record to
    /// `synced` once nothing else is pending for it. Returns whether it flipped.
    ///
    /// Runs in one transaction so a local write cannot slip in between the
    /// pending-count check and the status change.
    async fn settle(&self, item: &mutation::Model, convergence: Option<Convergence>) -> Result<bool> {
        let kind = item.entity_kind;
        let txn = self.replica.connection().begin().await?;
        MutationRepository::remove(&txn, item.id).await?;

        let Some(convergence) = convergence.filter(|_| item.op.converges()) else {
            txn.commit().await?;
            return Ok(false);
        };
        if MutationRepository::count_for_entity(&txn, kind, &item.entity_id).await? > 0 {
            txn.commit().await?;
            return Ok(false);
        }

        let table = kind.table();
        let Some(header) = table.header(&txn, &item.entity_id).await? else {
            txn.commit().await?;
            return Ok(false);
        };
        if header.sync_status == SyncStatus::Synced {
            txn.commit().await?;
            return Ok(false);
        }

        // Edited after this snapshot was queued: stay dirty so the newer
        // content is not mistaken for what the server has.
        let edited_since = kind.descriptor().has_timestamp
            && header.updated_at.is_some_and(|updated_at| updated_at > item.created_at);
        if convergence == Convergence::RaceChecked && edited_since {
            debug!("{kind} {} changed after its queued snapshot, keeping it dirty", item.entity_id);
            txn.commit().await?;
            return Ok(false);
        }

        table.set_sync_status(&txn, &item.entity_id, SyncStatus::Synced).await?;
        txn.commit().await?;
        self.replica.publish(kind, vec![item.entity_id.clone()]);
        Ok(true)
    }
}
