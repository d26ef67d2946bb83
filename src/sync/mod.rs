//! Synchronization service: the reconciliation core between the local
//! replica and the remote store.
//!
//! [`SyncService`] owns the pieces every sync operation needs and is split
//! across submodules the same way the work is:
//! - [`local`]: the optimistic write path (replica write + queued mutation)
//! - [`push`]: replays the mutation queue against the remote API
//! - [`pull`]: merges server collections into the replica
//! - [`documents`], [`boards`], [`checklists`]: per-kind conveniences
//! - [`scheduler`]: background triggers for push and pull
//!
//! Push and pull never return errors to their callers. Failures are logged
//! and reported through [`SyncOutcome`]; the queue stays the durable work
//! list, so anything that failed is retried on the next trigger.

pub mod boards;
pub mod checklists;
pub mod documents;
pub mod gate;
pub mod local;
pub mod pull;
pub mod push;
pub mod scheduler;

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::queue::MutationQueue;
use crate::remote::RemoteApi;
use crate::replica::LocalReplica;
use crate::session::Session;
use crate::storage::LocalStorage;

pub use gate::{RunGate, RunState};
pub use pull::PullReport;
pub use push::PushReport;
pub use scheduler::{Scheduler, SchedulerHandle};

/// Result of a push or pull invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome<T> {
    /// Nobody is signed in; nothing was touched.
    NoSession,
    /// Another run held the gate; this invocation was dropped.
    AlreadyRunning,
    /// The run aborted before finishing, e.g. the queue could not be read.
    Failed(String),
    Completed(T),
}

impl<T> SyncOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Data layer for the application: local reads and writes plus background
/// reconciliation with the remote store.
#[derive(Clone)]
pub struct SyncService {
    replica: LocalReplica,
    queue: MutationQueue,
    remote: Arc<dyn RemoteApi>,
    session: Session,
    push_gate: RunGate,
}

impl SyncService {
    /// Creates a service over an opened storage.
    ///
    /// # Errors
    /// Returns an error if the mutation queue cannot be read.
    pub async fn new(storage: &LocalStorage, remote: Arc<dyn RemoteApi>, session: Session) -> Result<Self> {
        let replica = LocalReplica::new(storage.conn.clone());
        let queue = MutationQueue::open(storage.conn.clone()).await?;

        Ok(Self {
            replica,
            queue,
            remote,
            session,
            push_gate: RunGate::new(),
        })
    }

    pub fn replica(&self) -> &LocalReplica {
        &self.replica
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether a push run currently holds the gate.
    pub fn is_pushing(&self) -> bool {
        self.push_gate.is_running()
    }

    /// Resolves once no push run is in flight.
    pub async fn push_idle(&self) {
        self.push_gate.idle().await;
    }

    pub fn login(&self, user_id: impl Into<String>, access_token: impl Into<String>) {
        let user_id = user_id.into();
        info!("Signed in as {user_id}");
        self.session.login(user_id, access_token);
    }

    /// Ends the session. With `discard_pending`, the departing user's queued
    /// mutations are dropped; otherwise they stay partitioned under their
    /// user id and replay only once that user signs in again.
    pub async fn logout(&self, discard_pending: bool) -> Result<()> {
        let Some(previous) = self.session.logout() else {
            return Ok(());
        };
        info!("Signed out {}", previous.user_id);

        if discard_pending {
            let dropped = self.queue.clear_user(&previous.user_id).await?;
            if dropped > 0 {
                info!("Discarded {dropped} pending mutations of {}", previous.user_id);
            }
        }
        Ok(())
    }

    fn require_user(&self) -> Result<String> {
        self.session
            .user_id()
            .ok_or_else(|| anyhow::anyhow!("No user is signed in"))
    }
}
