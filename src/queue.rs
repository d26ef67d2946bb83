//! Mutation queue: durable log of local writes awaiting confirmation.
//!
//! Entries are appended in the same transaction as the replica write they
//! describe. The number of queued entries is published on a watch channel;
//! the scheduler's push task wakes up whenever it changes.

use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;
use tokio::sync::watch;

use crate::entities::mutation;
use crate::repositories::{MutationRepository, NewMutation};
use crate::utils::now_millis;

#[derive(Clone)]
pub struct MutationQueue {
    conn: DatabaseConnection,
    pending: Arc<watch::Sender<u64>>,
}

impl MutationQueue {
    /// Opens the queue over an existing connection, seeding the count from disk.
    pub async fn open(conn: DatabaseConnection) -> Result<Self> {
        let count = MutationRepository::count(&conn).await?;
        let (pending, _) = watch::channel(count);
        Ok(Self {
            conn,
            pending: Arc::new(pending),
        })
    }

    /// Watch the number of queued mutations.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.pending.subscribe()
    }

    /// Last published count.
    pub fn pending(&self) -> u64 {
        *self.pending.borrow()
    }

    /// Recount from disk and notify watchers if the count moved.
    pub async fn refresh(&self) -> Result<u64> {
        let count = MutationRepository::count(&self.conn).await?;
        self.pending.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
        Ok(count)
    }

    /// Append a mutation outside of any replica write.
    pub async fn enqueue(&self, new: NewMutation) -> Result<mutation::Model> {
        let item = MutationRepository::enqueue(&self.conn, new, now_millis()).await?;
        self.refresh().await?;
        Ok(item)
    }

    /// A user's mutations in replay order.
    pub async fn items_for_user(&self, user_id: &str) -> Result<Vec<mutation::Model>> {
        MutationRepository::get_for_user(&self.conn, user_id).await
    }

    pub async fn all(&self) -> Result<Vec<mutation::Model>> {
        MutationRepository::get_all(&self.conn).await
    }

    pub async fn len(&self) -> Result<u64> {
        MutationRepository::count(&self.conn).await
    }

    pub async fn len_for_user(&self, user_id: &str) -> Result<u64> {
        MutationRepository::count_for_user(&self.conn, user_id).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drop every entry of a user, e.g. when signing out without pushing.
    pub async fn clear_user(&self, user_id: &str) -> Result<u64> {
        let removed = MutationRepository::delete_for_user(&self.conn, user_id).await?;
        self.refresh().await?;
        Ok(removed)
    }
}
