//! Mutation queue repository for database operations.

use std::collections::HashSet;

use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    Iterable, QueryFilter, QueryOrder, QuerySelect,
};
use serde_json::Value;

use crate::entities::mutation::{self, MutationType};
use crate::kinds::EntityKind;

/// A mutation about to be enqueued.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMutation {
    pub op: MutationType,
    pub kind: EntityKind,
    pub entity_id: String,
    pub user_id: String,
    pub data: Option<Value>,
}

/// Repository for mutation queue operations.
pub struct MutationRepository;

impl MutationRepository {
    /// Append a mutation. The queue assigns the id.
    pub async fn enqueue<C>(conn: &C, new: NewMutation, created_at: i64) -> Result<mutation::Model>
    where
        C: ConnectionTrait,
    {
        let model = mutation::ActiveModel {
            id: ActiveValue::NotSet,
            op: ActiveValue::Set(new.op),
            entity_kind: ActiveValue::Set(new.kind),
            entity_id: ActiveValue::Set(new.entity_id),
            user_id: ActiveValue::Set(new.user_id),
            data: ActiveValue::Set(new.data),
            created_at: ActiveValue::Set(created_at),
        };
        Ok(model.insert(conn).await?)
    }

    /// Get a user's mutations in replay order: enqueue time, then id.
    pub async fn get_for_user<C>(conn: &C, user_id: &str) -> Result<Vec<mutation::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(mutation::Entity::find()
            .filter(mutation::Column::UserId.eq(user_id))
            .order_by_asc(mutation::Column::CreatedAt)
            .order_by_asc(mutation::Column::Id)
            .all(conn)
            .await?)
    }

    /// Get every queued mutation, in replay order.
    pub async fn get_all<C>(conn: &C) -> Result<Vec<mutation::Model>>
    where
        C: ConnectionTrait,
    {
        Ok(mutation::Entity::find()
            .order_by_asc(mutation::Column::CreatedAt)
            .order_by_asc(mutation::Column::Id)
            .all(conn)
            .await?)
    }

    /// Remove a mutation. Removing an id that is already gone is a no-op.
    pub async fn remove<C>(conn: &C, id: i64) -> Result<bool>
    where
        C: ConnectionTrait,
    {
        let result = mutation::Entity::delete_by_id(id).exec(conn).await?;
        Ok(result.rows_affected > 0)
    }

    /// Total number of queued mutations.
    pub async fn count<C>(conn: &C) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        Ok(mutation::Entity::find().count(conn).await?)
    }

    /// Number of mutations queued by one user.
    pub async fn count_for_user<C>(conn: &C, user_id: &str) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        Ok(mutation::Entity::find()
            .filter(mutation::Column::UserId.eq(user_id))
            .count(conn)
            .await?)
    }

    /// Number of mutations still queued for one record.
    pub async fn count_for_entity<C>(conn: &C, kind: EntityKind, entity_id: &str) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        Ok(mutation::Entity::find()
            .filter(mutation::Column::EntityKind.eq(kind))
            .filter(mutation::Column::EntityId.eq(entity_id))
            .count(conn)
            .await?)
    }

    /// Ids of records of `kind` with a queued removal (DELETE or PURGE_TRASHED).
    pub async fn pending_removal_ids<C>(conn: &C, kind: EntityKind) -> Result<HashSet<String>>
    where
        C: ConnectionTrait,
    {
        let ids: Vec<String> = mutation::Entity::find()
            .select_only()
            .column(mutation::Column::EntityId)
            .filter(mutation::Column::EntityKind.eq(kind))
            .filter(mutation::Column::Op.is_in(MutationType::iter().filter(|op| op.removes())))
            .into_tuple()
            .all(conn)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Drop every mutation belonging to a user.
    pub async fn delete_for_user<C>(conn: &C, user_id: &str) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        let result = mutation::Entity::delete_many()
            .filter(mutation::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}
