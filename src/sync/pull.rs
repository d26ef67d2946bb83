//! Pull engine: merges authoritative server collections into the replica.
//!
//! Each kind goes through the same merge:
//! 1. records the replica still considers dirty are left alone,
//! 2. records with a queued removal are never re-inserted,
//! 3. everything else from the server is upserted,
//! 4. synced, owned local records the server no longer lists are swept.
//!
//! Shared records come from the accepted-shares endpoint and are
//! server-wins. Nested kinds are merged per parent from the parent's detail
//! response, with the same four steps scoped to that parent.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use futures::future::join_all;
use log::{debug, error, info, warn};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde_json::Value;

use super::{SyncOutcome, SyncService};
use crate::entities::{Ownership, SyncStatus};
use crate::kinds::{EntityKind, KindDescriptor};
use crate::remote::ApiRequest;
use crate::replica::{RecordHeader, ReplicaTable};
use crate::repositories::MutationRepository;

/// Counters for one kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub upserted: usize,
    /// Server records skipped because local state owns them (dirty or pending removal).
    pub kept_local: usize,
    pub swept: usize,
    pub malformed: usize,
}

impl MergeStats {
    fn absorb(&mut self, other: &MergeStats) {
        self.upserted += other.upserted;
        self.kept_local += other.kept_local;
        self.swept += other.swept;
        self.malformed += other.malformed;
    }
}

/// Tally of one pull run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullReport {
    pub kinds: HashMap<EntityKind, MergeStats>,
    /// Kinds whose fetch or merge failed; the rest still merged.
    pub failed: Vec<EntityKind>,
}

impl PullReport {
    pub fn stats(&self, kind: EntityKind) -> MergeStats {
        self.kinds.get(&kind).cloned().unwrap_or_default()
    }

    fn record(&mut self, kind: EntityKind, stats: &MergeStats) {
        self.kinds.entry(kind).or_default().absorb(stats);
    }

    fn fail(&mut self, kind: EntityKind) {
        if !self.failed.contains(&kind) {
            self.failed.push(kind);
        }
    }
}

/// Which slice of a table a merge is authoritative for.
#[derive(Clone, Copy, Debug)]
enum Scope<'a> {
    /// The current user's owned records of a top-level kind.
    Owned { user_id: &'a str },
    /// Records shared with the current user. Server-wins.
    Shared,
    /// Children of one parent record.
    Children { parent_id: &'a str },
}

impl Scope<'_> {
    fn covers(&self, header: &RecordHeader) -> bool {
        match self {
            Scope::Owned { user_id } => header.ownership == Ownership::Owned && header.user_id == *user_id,
            Scope::Shared => header.ownership == Ownership::Shared,
            Scope::Children { parent_id } => header.parent_id.as_deref() == Some(*parent_id),
        }
    }
}

impl SyncService {
    /// Fetches every kind from the server and merges it into the replica.
    ///
    /// A failure in one kind is logged and recorded in the report; the
    /// remaining kinds still merge.
    pub async fn pull(&self) -> SyncOutcome<PullReport> {
        let Some(user_id) = self.session.user_id() else {
            debug!("No session, skipping pull");
            return SyncOutcome::NoSession;
        };

        info!("🔄 Pulling server state...");
        let mut report = PullReport::default();

        for kind in EntityKind::TOP_LEVEL {
            match self.pull_owned(kind, &user_id).await {
                Ok(stats) => report.record(kind, &stats),
                Err(e) => {
                    error!("❌ Pull of {kind} failed: {e:#}");
                    report.fail(kind);
                }
            }

            if let Some(path) = kind.descriptor().accepted_path() {
                match self.pull_shared(kind, &user_id, &path).await {
                    Ok(stats) => report.record(kind, &stats),
                    Err(e) => {
                        error!("❌ Pull of shared {kind} failed: {e:#}");
                        report.fail(kind);
                    }
                }
            }
        }

        for kind in EntityKind::TOP_LEVEL {
            if kind.descriptor().children.is_empty() {
                continue;
            }
            if let Err(e) = self.pull_children(kind, &user_id, &mut report).await {
                error!("❌ Pull of {kind} children failed: {e:#}");
                report.fail(kind);
            }
        }

        info!("✅ Pull finished ({} kinds failed)", report.failed.len());
        SyncOutcome::Completed(report)
    }

    async fn pull_owned(&self, kind: EntityKind, user_id: &str) -> Result<MergeStats> {
        let descriptor = kind.descriptor();
        let fetched = self.remote.fetch_list(&descriptor.collection_path(None)?).await?;
        debug!("Fetched {} {kind} records", fetched.len());

        let (incoming, malformed) = prepare(descriptor, fetched, user_id, Ownership::Owned, None);
        let mut stats = self.merge(kind, incoming, Scope::Owned { user_id }).await?;
        stats.malformed = malformed;
        Ok(stats)
    }

    async fn pull_shared(&self, kind: EntityKind, user_id: &str, path: &str) -> Result<MergeStats> {
        let fetched = self.remote.fetch_list(path).await?;
        debug!("Fetched {} shared {kind} records", fetched.len());

        let (incoming, malformed) = prepare(kind.descriptor(), fetched, user_id, Ownership::Shared, None);
        let mut stats = self.merge(kind, incoming, Scope::Shared).await?;
        stats.malformed = malformed;
        Ok(stats)
    }

    /// Second pass for hierarchical kinds: one detail fetch per parent,
    /// issued concurrently, then a scoped merge per child collection.
    async fn pull_children(&self, parent_kind: EntityKind, user_id: &str, report: &mut PullReport) -> Result<()> {
        let descriptor = parent_kind.descriptor();

        let txn = self.replica.connection().begin().await?;
        let headers = parent_kind.table().headers(&txn).await?;
        let pending = MutationRepository::pending_removal_ids(&txn, parent_kind).await?;
        txn.commit().await?;

        // Parents the server does not know yet, or is about to forget, have
        // no detail worth fetching.
        let parents: Vec<String> = headers
            .into_iter()
            .filter(|h| h.sync_status != SyncStatus::Created && !pending.contains(&h.id))
            .map(|h| h.id)
            .collect();
        if parents.is_empty() {
            return Ok(());
        }

        let fetches = parents.iter().map(|parent_id| {
            let request = ApiRequest::get(descriptor.detail_path(parent_id));
            async move { (parent_id, self.remote.send(request).await) }
        });
        let details = join_all(fetches).await;

        for (parent_id, result) in details {
            let detail = match result {
                Ok(detail) => detail,
                Err(e) if e.is_gone() => {
                    debug!("{parent_kind} {parent_id} is gone remotely; the next sweep drops it");
                    continue;
                }
                Err(e) => {
                    warn!("Detail fetch for {parent_kind} {parent_id} failed: {e}");
                    for child in descriptor.children {
                        report.fail(child.kind);
                    }
                    continue;
                }
            };

            for child in descriptor.children {
                // A missing array says nothing about the children; leave them be.
                let Some(Value::Array(items)) = detail.get(child.field) else {
                    debug!("{parent_kind} {parent_id} detail has no `{}` array", child.field);
                    continue;
                };

                let (incoming, malformed) = prepare(
                    child.kind.descriptor(),
                    items.clone(),
                    user_id,
                    Ownership::Owned,
                    Some(parent_id),
                );
                match self.merge(child.kind, incoming, Scope::Children { parent_id }).await {
                    Ok(mut stats) => {
                        stats.malformed = malformed;
                        report.record(child.kind, &stats);
                    }
                    Err(e) => {
                        error!("❌ Merge of {} under {parent_kind} {parent_id} failed: {e:#}", child.kind);
                        report.fail(child.kind);
                    }
                }
            }
        }
        Ok(())
    }

    /// Four-step merge of validated server records into one kind's table,
    /// in a single transaction.
    async fn merge(&self, kind: EntityKind, incoming: Vec<(String, Value)>, scope: Scope<'_>) -> Result<MergeStats> {
        let descriptor = kind.descriptor();
        let table = kind.table();
        let mut stats = MergeStats::default();

        let txn = self.replica.connection().begin().await?;
        let local: Vec<RecordHeader> = table
            .headers(&txn)
            .await?
            .into_iter()
            .filter(|h| scope.covers(h))
            .collect();
        let dirty: HashSet<&str> = local
            .iter()
            .filter(|h| h.sync_status != SyncStatus::Synced)
            .map(|h| h.id.as_str())
            .collect();
        let pending = MutationRepository::pending_removal_ids(&txn, kind).await?;
        let server_wins = matches!(scope, Scope::Shared);

        let mut seen = HashSet::new();
        let mut changed = Vec::new();
        for (id, mut value) in incoming {
            seen.insert(id.clone());
            if !server_wins && (dirty.contains(id.as_str()) || pending.contains(&id)) {
                stats.kept_local += 1;
                continue;
            }
            if !server_wins && is_shared_locally(table, &txn, &id).await? {
                // Owned listing of a record this replica holds as a share.
                stats.kept_local += 1;
                continue;
            }
            preserve_fields(table, &txn, descriptor.preserved_fields, &id, &mut value).await?;
            table.put_value(&txn, value).await?;
            stats.upserted += 1;
            changed.push(id);
        }

        // Sweep. Shared records missing from the accepted list lost their
        // share; nothing local can contradict that.
        let doomed: Vec<String> = local
            .iter()
            .filter(|h| !seen.contains(&h.id))
            .filter(|h| server_wins || (h.sync_status == SyncStatus::Synced && !pending.contains(&h.id)))
            .map(|h| h.id.clone())
            .collect();
        table.delete_many(&txn, &doomed).await?;
        stats.swept = doomed.len();

        let mut cascaded = Vec::new();
        for child in descriptor.children {
            let mut removed = Vec::new();
            for parent_id in &doomed {
                removed.extend(child.kind.table().delete_children_of(&txn, parent_id).await?);
            }
            if !removed.is_empty() {
                cascaded.push((child.kind, removed));
            }
        }
        txn.commit().await?;

        changed.extend(doomed);
        self.replica.publish(kind, changed);
        for (child_kind, ids) in cascaded {
            self.replica.publish(child_kind, ids);
        }

        debug!(
            "Merged {kind}: {} upserted, {} kept local, {} swept",
            stats.upserted, stats.kept_local, stats.swept
        );
        Ok(stats)
    }
}

/// Normalizes server payloads into replica records and drops the ones that
/// do not decode. Runs before any transaction opens.
///
/// Returns the surviving `(id, record)` pairs and the number of malformed ones.
fn prepare(
    descriptor: &KindDescriptor,
    fetched: Vec<Value>,
    user_id: &str,
    ownership: Ownership,
    parent_id: Option<&str>,
) -> (Vec<(String, Value)>, usize) {
    let table = descriptor.kind.table();
    let mut records = Vec::with_capacity(fetched.len());
    let mut malformed = 0;

    for value in fetched {
        let Value::Object(mut map) = value else {
            warn!("Skipping non-object {} payload", descriptor.kind);
            malformed += 1;
            continue;
        };

        map.insert("syncStatus".to_string(), Value::from("synced"));
        if descriptor.ownership_guarded {
            let tag = match ownership {
                Ownership::Owned => "owned",
                Ownership::Shared => "shared",
            };
            map.insert("ownership".to_string(), Value::from(tag));
        }
        if !map.get("userId").is_some_and(Value::is_string) {
            map.insert("userId".to_string(), Value::from(user_id));
        }
        if let (Some(route), Some(parent_id)) = (descriptor.parent.as_ref(), parent_id) {
            map.entry(route.field.to_string())
                .or_insert_with(|| Value::from(parent_id));
        }
        // Omitted and null mean the same thing: keep whatever is local.
        for field in descriptor.preserved_fields {
            if map.get(*field).is_some_and(Value::is_null) {
                map.remove(*field);
            }
        }

        let value = Value::Object(map);
        match table.validate(&value) {
            Ok(()) => {
                if let Some(id) = value.get("id").and_then(Value::as_str) {
                    records.push((id.to_owned(), value));
                }
            }
            Err(e) => {
                warn!("Skipping malformed {} record: {e:#}", descriptor.kind);
                malformed += 1;
            }
        }
    }

    (records, malformed)
}

async fn is_shared_locally(table: &dyn ReplicaTable, txn: &DatabaseTransaction, id: &str) -> Result<bool> {
    Ok(table
        .header(txn, id)
        .await?
        .is_some_and(|h| h.ownership == Ownership::Shared))
}

/// Fills fields the list endpoint omitted from the local copy:
/// server value, else local value, else the record's default.
async fn preserve_fields(
    table: &dyn ReplicaTable,
    txn: &DatabaseTransaction,
    fields: &[&str],
    id: &str,
    value: &mut Value,
) -> Result<()> {
    let Some(map) = value.as_object_mut() else {
        return Ok(());
    };
    let missing: Vec<&str> = fields.iter().copied().filter(|f| !map.contains_key(*f)).collect();
    if missing.is_empty() {
        return Ok(());
    }

    let Some(existing) = table.get_value(txn, id).await? else {
        return Ok(());
    };
    for field in missing {
        if let Some(local) = existing.get(field).filter(|v| !v.is_null()) {
            map.insert(field.to_string(), local.clone());
        }
    }
    Ok(())
}
