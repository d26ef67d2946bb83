//! Single-slot run gate for the push engine.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// `Idle -> Running -> Idle` state machine shared by every clone.
///
/// [`RunGate::try_begin`] never waits: a caller that finds the gate busy
/// gets `None`. Callers that must run after the current holder await
/// [`RunGate::idle`] and try again.
#[derive(Clone, Debug)]
pub struct RunGate {
    state: Arc<watch::Sender<RunState>>,
}

impl Default for RunGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RunGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self { state: Arc::new(state) }
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Moves to `Running` unless a run is already in flight.
    pub fn try_begin(&self) -> Option<RunGuard> {
        let began = self.state.send_if_modified(|state| {
            if *state == RunState::Running {
                return false;
            }
            *state = RunState::Running;
            true
        });
        began.then(|| RunGuard {
            state: Arc::clone(&self.state),
        })
    }

    /// Resolves once no run holds the gate.
    pub async fn idle(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|state| *state == RunState::Idle).await;
    }
}

/// Returns the gate to `Idle` when dropped, whatever way the run ended.
#[derive(Debug)]
pub struct RunGuard {
    state: Arc<watch::Sender<RunState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.send_replace(RunState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::AssertUnwindSafe;
    use std::time::Duration;

    use super::*;

    #[test]
    fn second_run_is_refused_while_first_is_in_flight() {
        let gate = RunGate::new();
        let guard = gate.try_begin().expect("idle gate should open");
        assert_eq!(gate.state(), RunState::Running);
        assert!(gate.clone().try_begin().is_none());

        drop(guard);
        assert_eq!(gate.state(), RunState::Idle);
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn guard_releases_on_panic() {
        let gate = RunGate::new();
        let shared = gate.clone();
        let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
            let _guard = shared.try_begin();
            panic!("push blew up");
        }));
        assert!(result.is_err());
        assert!(!gate.is_running());
    }

    #[tokio::test]
    async fn idle_waits_for_the_running_holder() {
        let gate = RunGate::new();
        gate.idle().await;

        let guard = gate.try_begin().expect("idle gate should open");
        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.idle().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake once the gate is released")
            .unwrap();
    }
}
