//! Checklists and their items.

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use super::SyncService;
use crate::entities::{checklist, checklist_item, SyncStatus};
use crate::utils::now_millis;

impl SyncService {
    pub async fn create_checklist(&self, title: &str) -> Result<checklist::Model> {
        let position = self.replica.all::<checklist::Model>().await?.len();
        let now = now_millis();
        self.create(checklist::Model {
            id: Uuid::new_v4().to_string(),
            user_id: String::new(),
            title: title.to_owned(),
            position: i32::try_from(position)?,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Created,
        })
        .await
    }

    pub async fn add_checklist_item(&self, checklist_id: &str, text: &str) -> Result<checklist_item::Model> {
        let position = self.checklist_items(checklist_id).await?.len();
        self.create(checklist_item::Model {
            id: Uuid::new_v4().to_string(),
            user_id: String::new(),
            checklist_id: checklist_id.to_owned(),
            text: text.to_owned(),
            is_done: false,
            position: i32::try_from(position)?,
            created_at: now_millis(),
            sync_status: SyncStatus::Created,
        })
        .await
    }

    /// Flips an item between done and open.
    pub async fn toggle_checklist_item(&self, item_id: &str) -> Result<checklist_item::Model> {
        let item = self
            .replica
            .get::<checklist_item::Model>(item_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("checklist-item {item_id} not found"))?;
        self.update::<checklist_item::Model>(item_id, json!({ "isDone": !item.is_done }))
            .await
    }

    /// Items of a checklist, ordered by position.
    pub async fn checklist_items(&self, checklist_id: &str) -> Result<Vec<checklist_item::Model>> {
        let mut items = self
            .replica
            .query::<checklist_item::Model, _>(|item| item.checklist_id == checklist_id)
            .await?;
        items.sort_by_key(|item| item.position);
        Ok(items)
    }
}
