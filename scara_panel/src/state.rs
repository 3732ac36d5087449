use std::sync::Arc;

use scara_link::Status;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::models::MotionState;

/// The one shared [`MotionState`]. Every input source and the synchronizer
/// hold a clone; observers subscribe for change notifications.
#[derive(Clone)]
pub struct SharedMotion {
    inner: Arc<watch::Sender<MotionState>>,
}

impl SharedMotion {
    pub fn new(initial: MotionState) -> Self {
        Self {
            inner: Arc::new(watch::Sender::new(initial)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MotionState> {
        self.inner.subscribe()
    }

    pub fn snapshot(&self) -> MotionState {
        self.inner.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.borrow().busy
    }

    pub fn update(&self, f: impl FnOnce(&mut MotionState)) {
        self.inner.send_modify(f);
    }

    /// Runs `f` only while idle. Returns whether `f` reported a change.
    pub fn update_if_idle(&self, f: impl FnOnce(&mut MotionState) -> bool) -> bool {
        self.inner.send_if_modified(|state| {
            if state.busy || state.in_flight {
                return false;
            }
            f(state)
        })
    }

    /// Claims the busy flag. The check, `mutate` and the claim happen under
    /// one lock, so of two concurrent callers exactly one wins. Nothing is
    /// modified when the state is already busy.
    pub fn try_acquire_with(&self, mutate: impl FnOnce(&mut MotionState)) -> Option<MotionState> {
        let mut acquired = None;

        self.inner.send_if_modified(|state| {
            if state.busy || state.in_flight {
                return false;
            }

            mutate(state);
            state.busy = true;
            state.in_flight = true;
            acquired = Some(state.clone());
            true
        });

        acquired
    }

    pub fn release(&self) {
        self.release_with(|_| {});
    }

    /// Clears the busy claim, applying `undo` under the same lock so no
    /// other dispatch can observe the state in between.
    pub fn release_with(&self, undo: impl FnOnce(&mut MotionState)) {
        self.inner.send_modify(|state| {
            undo(state);
            state.in_flight = false;
            state.busy = false;
        });
    }

    pub fn apply_status(&self, status: &Status) {
        self.inner.send_if_modified(|state| {
            let before = state.clone();
            state.apply_status(status);
            *state != before
        });
    }
}

/// Presentation adapter: logs every observable change of the motion state.
pub async fn report_state_changes(mut rx: watch::Receiver<MotionState>) {
    let mut last_enabled = rx.borrow_and_update().controls_enabled();

    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();

        let enabled = state.controls_enabled();
        if enabled != last_enabled {
            info!(
                "Controls {}",
                if enabled { "enabled" } else { "disabled" }
            );
            last_enabled = enabled;
        }

        debug!("{}", state);
    }
}
