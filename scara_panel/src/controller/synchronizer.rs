use std::time::Duration;

use scara_link::{Ack, CommandPayload, LinkError, RemoteLink, Status};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::{
    models::{CommandError, MotionState},
    state::SharedMotion,
};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Robot is busy, command not sent")]
    Busy,

    #[error("Backend rejected the command: {0}")]
    RemoteRejected(String),

    #[error("Transport failure: {0}")]
    Transport(#[from] LinkError),
}

impl From<DispatchError> for CommandError {
    fn from(error: DispatchError) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionRequest {
    Move(CommandPayload),
    Home,
}

/// Owns the busy handshake with the backend: at most one motion command is
/// in flight, and `busy` is only cleared once the backend reports the arm
/// idle (or stops answering).
pub struct CommandSynchronizer<L> {
    link: L,
    state: SharedMotion,
    busy_poll: Duration,
}

impl<L: RemoteLink> CommandSynchronizer<L> {
    pub fn new(link: L, state: SharedMotion, busy_poll: Duration) -> Self {
        Self {
            link,
            state,
            busy_poll,
        }
    }

    pub fn state(&self) -> &SharedMotion {
        &self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub async fn dispatch(&self, request: MotionRequest) -> Result<Ack, DispatchError> {
        if self.state.try_acquire_with(|_| {}).is_none() {
            debug!("Dispatch refused, robot busy");
            return Err(DispatchError::Busy);
        }

        self.run_acquired(request, |_| {}).await
    }

    pub async fn send_current(&self) -> Result<Ack, DispatchError> {
        self.send_with(|_| {}).await
    }

    /// Applies `mutation` and sends the resulting pose. The state is left
    /// untouched when the robot is busy.
    pub async fn send_with(
        &self,
        mutation: impl FnOnce(&mut MotionState),
    ) -> Result<Ack, DispatchError> {
        let Some(snapshot) = self.state.try_acquire_with(mutation) else {
            debug!("Move refused, robot busy");
            return Err(DispatchError::Busy);
        };

        self.run_acquired(MotionRequest::Move(snapshot.command_payload()), |_| {})
            .await
    }

    pub async fn home(&self) -> Result<Ack, DispatchError> {
        info!("Homing");
        self.dispatch(MotionRequest::Home).await
    }

    pub async fn toggle_gripper(&self) -> Result<Ack, DispatchError> {
        let Some(snapshot) = self
            .state
            .try_acquire_with(|state| state.gripper_closed = !state.gripper_closed)
        else {
            debug!("Gripper toggle refused, robot busy");
            return Err(DispatchError::Busy);
        };

        let previous = !snapshot.gripper_closed;
        info!(
            "Gripper {}",
            if snapshot.gripper_closed { "closing" } else { "opening" }
        );

        // A failed toggle restores the gripper before the gate reopens.
        self.run_acquired(
            MotionRequest::Move(snapshot.command_payload()),
            move |state| state.gripper_closed = previous,
        )
        .await
    }

    /// Single status fetch, applied to the shared state. Never fails: an
    /// unreachable backend reads as disconnected and idle.
    pub async fn query_status(&self) -> Status {
        let status = match self.link.get_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Status query failed: {}", e);
                Status::offline()
            }
        };

        self.state.apply_status(&status);
        status
    }

    /// Sends `request` under an already claimed gate. On failure `undo` is
    /// applied in the same update that releases the gate.
    #[instrument(skip(self, undo), level = "debug")]
    async fn run_acquired(
        &self,
        request: MotionRequest,
        undo: impl FnOnce(&mut MotionState),
    ) -> Result<Ack, DispatchError> {
        let sent = match request {
            MotionRequest::Move(payload) => self.link.send_command(&payload).await,
            MotionRequest::Home => self.link.home().await,
        };

        let ack = match sent {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Dispatch failed: {}", e);
                self.abort(undo).await;
                return Err(DispatchError::Transport(e));
            }
        };

        if !ack.is_success() {
            let reason = ack.error_message();
            warn!("Dispatch rejected: {}", reason);
            self.abort(undo).await;
            return Err(DispatchError::RemoteRejected(reason));
        }

        if request == MotionRequest::Home {
            self.state.update(MotionState::reset_home);
        }

        debug!("Command accepted, waiting for the arm");
        self.wait_until_free().await;
        info!("Arm idle, controls enabled");

        Ok(ack)
    }

    async fn abort(&self, undo: impl FnOnce(&mut MotionState)) {
        self.state.release_with(undo);
        self.query_status().await;
    }

    async fn wait_until_free(&self) {
        loop {
            sleep(self.busy_poll).await;

            if !self.query_status().await.busy {
                break;
            }
        }

        self.state.release();
    }
}
