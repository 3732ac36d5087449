use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use scara_link::{Ack, RemoteLink};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use super::synchronizer::{CommandSynchronizer, DispatchError};
use crate::models::JointAngles;

/// Plays the backend's stored sequence one position at a time.
pub struct SequencePlayer<L> {
    sync: Arc<CommandSynchronizer<L>>,
    step_delay: Duration,
    playback: Mutex<Option<JoinHandle<usize>>>,
}

impl<L: RemoteLink + 'static> SequencePlayer<L> {
    pub fn new(sync: Arc<CommandSynchronizer<L>>, step_delay: Duration) -> Self {
        Self {
            sync,
            step_delay,
            playback: Mutex::new(None),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Starts the sequence on the backend and spawns local playback.
    pub async fn run(self: &Arc<Self>) -> Result<Ack, DispatchError> {
        let ack = expect_success(self.sync.link().run_sequence().await?)?;

        let mut slot = self.playback.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            info!("Sequence playback already running");
            return Ok(ack);
        }

        let player = Arc::clone(self);
        *slot = Some(tokio::spawn(async move { player.play().await }));
        info!("Sequence playback started");

        Ok(ack)
    }

    pub async fn stop(&self) -> Result<Ack, DispatchError> {
        let ack = expect_success(self.sync.link().stop_sequence().await?)?;
        info!("Sequence stop requested");
        Ok(ack)
    }

    pub async fn clear(&self) -> Result<Ack, DispatchError> {
        let ack = expect_success(self.sync.link().clear_sequence().await?)?;
        info!("Sequence cleared");
        Ok(ack)
    }

    /// Returns the number of positions reached.
    pub async fn play(&self) -> usize {
        let mut played = 0;

        loop {
            let next = match self.sync.link().next_position().await {
                Ok(next) => next,
                Err(e) => {
                    warn!("Failed to fetch next position: {}", e);
                    break;
                }
            };

            let Some(position) = next.step() else {
                info!(
                    "Sequence finished after {} positions: {}",
                    played,
                    next.message.as_deref().unwrap_or(&next.status)
                );
                break;
            };

            let angles = JointAngles::from_position(&position);
            let result = self
                .sync
                .send_with(|state| {
                    state.angles = angles;
                    state.gripper_closed = position.gripper;
                })
                .await;

            if let Err(e) = result {
                warn!("Sequence step failed, stopping playback: {}", e);
                break;
            }

            played += 1;
            info!(
                "Sequence position {}/{} reached",
                next.index.unwrap_or_default(),
                next.total.unwrap_or_default()
            );

            sleep(self.step_delay).await;
        }

        played
    }
}

fn expect_success(ack: Ack) -> Result<Ack, DispatchError> {
    if ack.is_success() {
        Ok(ack)
    } else {
        Err(DispatchError::RemoteRejected(ack.error_message()))
    }
}
