//! Registry of synchronized entity kinds.
//!
//! Each [`EntityKind`] maps to a static [`KindDescriptor`] that tells the push
//! and pull engines where the kind lives on the server, whether it can be
//! shared, whether its local model carries an `updatedAt`, and how it nests
//! under a parent. Adding a kind means adding one descriptor and one table
//! entry here; the engines stay untouched.

use anyhow::Result;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::mutation::MutationType;
use crate::entities::{
    board, board_card, board_column, checklist, checklist_item, container, document, label,
};
use crate::remote::ApiRequest;
use crate::replica::{ReplicaTable, Table};

/// Every kind the engine knows how to replicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    #[sea_orm(string_value = "document")]
    Document,
    #[sea_orm(string_value = "container")]
    Container,
    #[sea_orm(string_value = "label")]
    Label,
    #[sea_orm(string_value = "checklist")]
    Checklist,
    #[sea_orm(string_value = "checklist-item")]
    ChecklistItem,
    #[sea_orm(string_value = "board")]
    Board,
    #[sea_orm(string_value = "board-column")]
    BoardColumn,
    #[sea_orm(string_value = "board-card")]
    BoardCard,
}

/// Route segment for kinds that live under a parent record.
#[derive(Debug)]
pub struct ParentRoute {
    pub kind: EntityKind,
    /// JSON field holding the parent id, both in records and queue payloads.
    pub field: &'static str,
    /// Path segment below `/{parent collection}/{parent id}`.
    pub segment: &'static str,
}

/// Child array embedded in a parent's detail response.
#[derive(Debug)]
pub struct ChildCollection {
    pub kind: EntityKind,
    pub field: &'static str,
}

#[derive(Debug)]
pub struct KindDescriptor {
    pub kind: EntityKind,
    pub collection: &'static str,
    pub parent: Option<ParentRoute>,
    /// Shared copies of this kind must never go through the REST write path.
    pub ownership_guarded: bool,
    /// Whether the local model tracks `updatedAt`, enabling the push race check.
    pub has_timestamp: bool,
    pub supports_trash: bool,
    /// Fields the list endpoint omits; pulls keep the local value instead.
    pub preserved_fields: &'static [&'static str],
    pub children: &'static [ChildCollection],
}

/// Keys that exist only in the local replica and never travel to the server.
const LOCAL_ONLY_FIELDS: &[&str] = &["syncStatus", "ownership"];

static DOCUMENT: KindDescriptor = KindDescriptor {
    kind: EntityKind::Document,
    collection: "documents",
    parent: None,
    ownership_guarded: true,
    has_timestamp: true,
    supports_trash: true,
    preserved_fields: &["content"],
    children: &[],
};

static CONTAINER: KindDescriptor = KindDescriptor {
    kind: EntityKind::Container,
    collection: "containers",
    parent: None,
    ownership_guarded: false,
    has_timestamp: true,
    supports_trash: false,
    preserved_fields: &[],
    children: &[],
};

static LABEL: KindDescriptor = KindDescriptor {
    kind: EntityKind::Label,
    collection: "labels",
    parent: None,
    ownership_guarded: false,
    has_timestamp: true,
    supports_trash: false,
    preserved_fields: &[],
    children: &[],
};

static CHECKLIST: KindDescriptor = KindDescriptor {
    kind: EntityKind::Checklist,
    collection: "checklists",
    parent: None,
    ownership_guarded: false,
    has_timestamp: true,
    supports_trash: false,
    preserved_fields: &[],
    children: &[ChildCollection {
        kind: EntityKind::ChecklistItem,
        field: "items",
    }],
};

static CHECKLIST_ITEM: KindDescriptor = KindDescriptor {
    kind: EntityKind::ChecklistItem,
    collection: "checklist-items",
    parent: Some(ParentRoute {
        kind: EntityKind::Checklist,
        field: "checklistId",
        segment: "items",
    }),
    ownership_guarded: false,
    has_timestamp: false,
    supports_trash: false,
    preserved_fields: &[],
    children: &[],
};

static BOARD: KindDescriptor = KindDescriptor {
    kind: EntityKind::Board,
    collection: "boards",
    parent: None,
    ownership_guarded: true,
    has_timestamp: true,
    supports_trash: false,
    preserved_fields: &[],
    children: &[
        ChildCollection {
            kind: EntityKind::BoardColumn,
            field: "columns",
        },
        ChildCollection {
            kind: EntityKind::BoardCard,
            field: "cards",
        },
    ],
};

static BOARD_COLUMN: KindDescriptor = KindDescriptor {
    kind: EntityKind::BoardColumn,
    collection: "board-columns",
    parent: Some(ParentRoute {
        kind: EntityKind::Board,
        field: "boardId",
        segment: "columns",
    }),
    ownership_guarded: false,
    has_timestamp: false,
    supports_trash: false,
    preserved_fields: &[],
    children: &[],
};

static BOARD_CARD: KindDescriptor = KindDescriptor {
    kind: EntityKind::BoardCard,
    collection: "board-cards",
    parent: Some(ParentRoute {
        kind: EntityKind::Board,
        field: "boardId",
        segment: "cards",
    }),
    ownership_guarded: false,
    has_timestamp: true,
    supports_trash: false,
    preserved_fields: &[],
    children: &[],
};

static DOCUMENTS: Table<document::Model> = Table::new();
static CONTAINERS: Table<container::Model> = Table::new();
static LABELS: Table<label::Model> = Table::new();
static CHECKLISTS: Table<checklist::Model> = Table::new();
static CHECKLIST_ITEMS: Table<checklist_item::Model> = Table::new();
static BOARDS: Table<board::Model> = Table::new();
static BOARD_COLUMNS: Table<board_column::Model> = Table::new();
static BOARD_CARDS: Table<board_card::Model> = Table::new();

impl EntityKind {
    /// Kinds fetched from their own list endpoint, in pull order.
    pub const TOP_LEVEL: [EntityKind; 5] = [
        EntityKind::Container,
        EntityKind::Label,
        EntityKind::Document,
        EntityKind::Checklist,
        EntityKind::Board,
    ];

    pub fn descriptor(self) -> &'static KindDescriptor {
        match self {
            EntityKind::Document => &DOCUMENT,
            EntityKind::Container => &CONTAINER,
            EntityKind::Label => &LABEL,
            EntityKind::Checklist => &CHECKLIST,
            EntityKind::ChecklistItem => &CHECKLIST_ITEM,
            EntityKind::Board => &BOARD,
            EntityKind::BoardColumn => &BOARD_COLUMN,
            EntityKind::BoardCard => &BOARD_CARD,
        }
    }

    /// Replica table holding records of this kind.
    pub fn table(self) -> &'static dyn ReplicaTable {
        match self {
            EntityKind::Document => &DOCUMENTS,
            EntityKind::Container => &CONTAINERS,
            EntityKind::Label => &LABELS,
            EntityKind::Checklist => &CHECKLISTS,
            EntityKind::ChecklistItem => &CHECKLIST_ITEMS,
            EntityKind::Board => &BOARDS,
            EntityKind::BoardColumn => &BOARD_COLUMNS,
            EntityKind::BoardCard => &BOARD_CARDS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Document => "document",
            EntityKind::Container => "container",
            EntityKind::Label => "label",
            EntityKind::Checklist => "checklist",
            EntityKind::ChecklistItem => "checklist-item",
            EntityKind::Board => "board",
            EntityKind::BoardColumn => "board-column",
            EntityKind::BoardCard => "board-card",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KindDescriptor {
    /// Collection path, e.g. `/documents` or `/boards/{boardId}/cards`.
    pub fn collection_path(&self, parent_id: Option<&str>) -> Result<String> {
        match &self.parent {
            None => Ok(format!("/{}", self.collection)),
            Some(route) => {
                let parent_id = parent_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                    anyhow::anyhow!("{} requires a {} to build its endpoint", self.kind, route.field)
                })?;
                let parent = route.kind.descriptor();
                Ok(format!("/{}/{}/{}", parent.collection, parent_id, route.segment))
            }
        }
    }

    pub fn item_path(&self, id: &str, parent_id: Option<&str>) -> Result<String> {
        Ok(format!("{}/{}", self.collection_path(parent_id)?, id))
    }

    /// Accepted-shares endpoint, for kinds that can be shared.
    pub fn accepted_path(&self) -> Option<String> {
        self.ownership_guarded
            .then(|| format!("/{}/accepted", self.collection))
    }

    pub fn detail_path(&self, id: &str) -> String {
        format!("/{}/{}", self.collection, id)
    }

    /// Parent id carried in a record or queue payload.
    pub fn parent_id_in(&self, data: Option<&Value>) -> Option<String> {
        let route = self.parent.as_ref()?;
        data?.get(route.field)?.as_str().map(str::to_owned)
    }

    /// Builds the REST call that replays `op` for the record `id`.
    pub fn request_for(&self, op: MutationType, id: &str, data: Option<&Value>) -> Result<ApiRequest> {
        let parent_id = self.parent_id_in(data);
        let parent_id = parent_id.as_deref();

        match op {
            MutationType::Create => {
                let mut body = self.serialize(data);
                body.insert("id".to_string(), Value::String(id.to_string()));
                Ok(ApiRequest::post(self.collection_path(parent_id)?, Value::Object(body)))
            }
            MutationType::Update => Ok(ApiRequest::patch(
                self.item_path(id, parent_id)?,
                Value::Object(self.serialize(data)),
            )),
            MutationType::Delete => Ok(ApiRequest::delete(self.item_path(id, parent_id)?)),
            MutationType::Trash => {
                self.ensure_trash(op)?;
                Ok(ApiRequest::post(
                    format!("{}/trash", self.item_path(id, parent_id)?),
                    Value::Object(Map::new()),
                ))
            }
            MutationType::PurgeTrashed => {
                self.ensure_trash(op)?;
                Ok(ApiRequest::delete(format!("{}/purge", self.item_path(id, parent_id)?)))
            }
        }
    }

    /// Request body for a queue payload, without replica-only fields.
    pub fn serialize(&self, data: Option<&Value>) -> Map<String, Value> {
        let mut body = match data {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        for field in LOCAL_ONLY_FIELDS {
            body.remove(*field);
        }
        body
    }

    fn ensure_trash(&self, op: MutationType) -> Result<()> {
        if !self.supports_trash {
            anyhow::bail!("{:?} is not supported for {}", op, self.kind);
        }
        Ok(())
    }
}
