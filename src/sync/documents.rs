//! Document operations: create, edit, trash/purge and full-content refresh.

use anyhow::{bail, Result};
use log::debug;
use sea_orm::TransactionTrait;
use serde_json::{json, Value};
use uuid::Uuid;

use super::SyncService;
use crate::entities::document;
use crate::entities::mutation::MutationType;
use crate::entities::{Ownership, SyncStatus};
use crate::kinds::EntityKind;
use crate::remote::ApiRequest;
use crate::utils::now_millis;

impl SyncService {
    /// Creates a document with a fresh client id.
    pub async fn create_document(
        &self,
        title: &str,
        content: &str,
        container_id: Option<&str>,
    ) -> Result<document::Model> {
        let now = now_millis();
        self.create(document::Model {
            id: Uuid::new_v4().to_string(),
            user_id: String::new(),
            container_id: container_id.map(str::to_owned),
            title: title.to_owned(),
            content: content.to_owned(),
            is_pinned: false,
            is_trashed: false,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Created,
            ownership: Ownership::Owned,
        })
        .await
    }

    pub async fn update_document_content(&self, id: &str, content: &str) -> Result<document::Model> {
        self.update::<document::Model>(id, json!({ "content": content })).await
    }

    pub async fn rename_document(&self, id: &str, title: &str) -> Result<document::Model> {
        self.update::<document::Model>(id, json!({ "title": title })).await
    }

    /// Soft delete: the document stays in the replica flagged as trashed.
    pub async fn trash_document(&self, id: &str) -> Result<document::Model> {
        self.mutate_record::<document::Model, _>(id, MutationType::Trash, |doc| {
            if doc.is_trashed {
                bail!("document {} is already in the trash", doc.id);
            }
            doc.is_trashed = true;
            Ok(())
        })
        .await
    }

    /// Hard delete of a trashed document.
    ///
    /// # Errors
    /// Returns an error if the document is not in the trash.
    pub async fn purge_document(&self, id: &str) -> Result<bool> {
        self.remove_record::<document::Model, _>(id, MutationType::PurgeTrashed, |doc| {
            if !doc.is_trashed {
                bail!("document {} must be trashed before it can be purged", doc.id);
            }
            Ok(())
        })
        .await
    }

    /// The current user's documents outside the trash, pinned first, most
    /// recently edited next.
    pub async fn documents(&self) -> Result<Vec<document::Model>> {
        let user_id = self.require_user()?;
        let mut docs = self
            .replica
            .query::<document::Model, _>(|doc| !doc.is_trashed && (doc.user_id == user_id || doc.ownership == Ownership::Shared))
            .await?;
        docs.sort_by(|a, b| b.is_pinned.cmp(&a.is_pinned).then(b.updated_at.cmp(&a.updated_at)));
        Ok(docs)
    }

    pub async fn trashed_documents(&self) -> Result<Vec<document::Model>> {
        let user_id = self.require_user()?;
        self.replica
            .query::<document::Model, _>(|doc| doc.is_trashed && doc.user_id == user_id)
            .await
    }

    /// Fetches one document's full detail, content included, and stores it
    /// unless local edits are still pending. Returns whether it was stored.
    pub async fn refresh_document(&self, id: &str) -> Result<bool> {
        let descriptor = EntityKind::Document.descriptor();
        let detail = self.remote.send(ApiRequest::get(descriptor.detail_path(id))).await?;
        let Value::Object(mut map) = detail else {
            bail!("document {id} detail is not an object");
        };

        let table = EntityKind::Document.table();
        let txn = self.replica.connection().begin().await?;
        let Some(local) = table.header(&txn, id).await? else {
            txn.commit().await?;
            return Ok(false);
        };
        if local.sync_status != SyncStatus::Synced {
            debug!("document {id} has pending edits, keeping local content");
            txn.commit().await?;
            return Ok(false);
        }

        let ownership = match local.ownership {
            Ownership::Owned => "owned",
            Ownership::Shared => "shared",
        };
        map.insert("syncStatus".to_string(), Value::from("synced"));
        map.insert("ownership".to_string(), Value::from(ownership));
        map.entry("userId").or_insert_with(|| Value::from(local.user_id.clone()));
        let value = Value::Object(map);
        table.validate(&value)?;
        table.put_value(&txn, value).await?;
        txn.commit().await?;

        self.replica.publish(EntityKind::Document, vec![id.to_owned()]);
        Ok(true)
    }
}
