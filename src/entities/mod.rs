//! SeaORM entity models for the local replica.
//!
//! Every synchronized kind gets its own table. Records carry a client-generated
//! `id`, the owning `user_id`, a [`SyncStatus`] and, for kinds that can be
//! shared with other users, an [`Ownership`] tag. The [`SyncRecord`] trait
//! exposes those fields uniformly so the push and pull engines can treat all
//! kinds the same way.

use sea_orm::entity::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::kinds::EntityKind;

/// Convergence marker of a local record with the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Matches the server as of the last successful round-trip.
    #[default]
    #[sea_orm(string_value = "synced")]
    Synced,
    /// Exists locally only; a CREATE is pending.
    #[sea_orm(string_value = "created")]
    Created,
    /// Diverges from the last known server state; UPDATEs are pending.
    #[sea_orm(string_value = "updated")]
    Updated,
}

/// Who owns a record that may be shared between accounts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    #[default]
    #[sea_orm(string_value = "owned")]
    Owned,
    /// Accepted share owned by another account; synchronized over the
    /// realtime channel, never through the REST write path.
    #[sea_orm(string_value = "shared")]
    Shared,
}

/// Uniform access to the synchronization fields of a replica record.
pub trait SyncRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    type Entity: EntityTrait<Model = Self>;

    const KIND: EntityKind;

    fn id_column() -> <Self::Entity as EntityTrait>::Column;
    fn into_active(self) -> <Self::Entity as EntityTrait>::ActiveModel;

    fn id(&self) -> &str;
    fn user_id(&self) -> &str;
    fn set_user_id(&mut self, user_id: String);
    fn sync_status(&self) -> SyncStatus;
    fn set_sync_status(&mut self, status: SyncStatus);

    fn ownership(&self) -> Ownership {
        Ownership::Owned
    }

    fn set_ownership(&mut self, _ownership: Ownership) {}

    /// Last local modification, epoch milliseconds. `None` for kinds without one.
    fn updated_at(&self) -> Option<i64> {
        None
    }

    fn touch(&mut self, _now: i64) {}

    /// Id of the enclosing record for nested kinds.
    fn parent_id(&self) -> Option<&str> {
        None
    }
}

/// Implements [`SyncRecord`] for the `Model` of the entity module it is invoked in.
macro_rules! sync_record {
    (
        kind: $kind:expr
        $(, updated_at: $updated:ident)?
        $(, ownership: $ownership:ident)?
        $(, parent: $parent:ident)?
    ) => {
        impl $crate::entities::SyncRecord for Model {
            type Entity = Entity;

            const KIND: $crate::kinds::EntityKind = $kind;

            fn id_column() -> Column {
                Column::Id
            }

            fn into_active(self) -> ActiveModel {
                self.into()
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn user_id(&self) -> &str {
                &self.user_id
            }

            fn set_user_id(&mut self, user_id: String) {
                self.user_id = user_id;
            }

            fn sync_status(&self) -> $crate::entities::SyncStatus {
                self.sync_status
            }

            fn set_sync_status(&mut self, status: $crate::entities::SyncStatus) {
                self.sync_status = status;
            }

            $(
                fn updated_at(&self) -> Option<i64> {
                    Some(self.$updated)
                }

                fn touch(&mut self, now: i64) {
                    self.$updated = now;
                }
            )?

            $(
                fn ownership(&self) -> $crate::entities::Ownership {
                    self.$ownership
                }

                fn set_ownership(&mut self, ownership: $crate::entities::Ownership) {
                    self.$ownership = ownership;
                }
            )?

            $(
                fn parent_id(&self) -> Option<&str> {
                    Some(&self.$parent)
                }
            )?
        }
    };
}

pub mod board;
pub mod board_card;
pub mod board_column;
pub mod checklist;
pub mod checklist_item;
pub mod container;
pub mod document;
pub mod label;
pub mod mutation;

pub use board::Entity as Board;
pub use board_card::Entity as BoardCard;
pub use board_column::Entity as BoardColumn;
pub use checklist::Entity as Checklist;
pub use checklist_item::Entity as ChecklistItem;
pub use container::Entity as Container;
pub use document::Entity as Document;
pub use label::Entity as Label;
pub use mutation::Entity as Mutation;
