use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::SyncStatus;
use crate::kinds::EntityKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "board_columns")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub board_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default, deserialize_with = "crate::utils::datetime::deserialize_millis")]
    pub created_at: i64,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

sync_record!(kind: EntityKind::BoardColumn, parent: board_id);
