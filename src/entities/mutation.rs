//! Mutation queue entries: durable record of not-yet-confirmed local writes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::kinds::EntityKind;

/// Operation recorded in the mutation queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationType {
    #[sea_orm(string_value = "CREATE")]
    Create,
    #[sea_orm(string_value = "UPDATE")]
    Update,
    #[sea_orm(string_value = "DELETE")]
    Delete,
    /// Soft delete: the record stays, flagged as trashed.
    #[sea_orm(string_value = "TRASH")]
    Trash,
    /// Hard removal of a record that was trashed earlier.
    #[sea_orm(string_value = "PURGE_TRASHED")]
    PurgeTrashed,
}

impl MutationType {
    /// Whether a successful replay leaves the record in place, so its
    /// sync status must converge to `synced`.
    pub fn converges(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Trash)
    }

    /// Whether the operation removes the record for good.
    pub fn removes(self) -> bool {
        matches!(self, Self::Delete | Self::PurgeTrashed)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mutation_queue")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub op: MutationType,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub user_id: String,
    #[sea_orm(nullable)]
    pub data: Option<Json>,
    /// Enqueue time, epoch milliseconds. Replay order.
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
