use std::{future::Future, sync::Arc, time::Duration};

use scara_link::{Ack, RemoteLink};
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior, interval, sleep_until},
};
use tracing::{debug, info, warn};

use super::{
    device::{GamepadDevice, GamepadSnapshot},
    mapping::GamepadMapping,
};
use crate::{
    controller::synchronizer::{CommandSynchronizer, DispatchError},
    models::Axis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamepadTiming {
    pub poll: Duration,
    pub input_throttle: Duration,
    pub grip_throttle: Duration,
    pub auto_send_delay: Duration,
    pub auto_send: bool,
}

impl Default for GamepadTiming {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
            input_throttle: Duration::from_millis(100),
            grip_throttle: Duration::from_millis(500),
            auto_send_delay: Duration::from_millis(300),
            auto_send: true,
        }
    }
}

/// Debounce state of the automatic send after gamepad movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSend {
    Idle,
    Scheduled { deadline: Instant },
}

impl AutoSend {
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            AutoSend::Idle => None,
            AutoSend::Scheduled { deadline } => Some(*deadline),
        }
    }
}

pub struct GamepadInput<D, L> {
    device: D,
    sync: Arc<CommandSynchronizer<L>>,
    mapping: GamepadMapping,
    timing: GamepadTiming,

    attached: bool,
    last_input: Option<Instant>,
    last_grip: Option<Instant>,
    auto_send: AutoSend,
}

impl<D: GamepadDevice, L: RemoteLink + 'static> GamepadInput<D, L> {
    pub fn new(
        device: D,
        sync: Arc<CommandSynchronizer<L>>,
        mapping: GamepadMapping,
        timing: GamepadTiming,
    ) -> Self {
        Self {
            device,
            sync,
            mapping,
            timing,
            attached: false,
            last_input: None,
            last_grip: None,
            auto_send: AutoSend::Idle,
        }
    }

    pub fn auto_send(&self) -> AutoSend {
        self.auto_send
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = interval(self.timing.poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // The branch is disabled while idle, but its future is still built.
            let deadline = self.auto_send.deadline();
            let fire_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Gamepad input stopped");
                        break;
                    }
                }
                _ = sleep_until(fire_at), if deadline.is_some() => {
                    self.fire_auto_send();
                }
                _ = poll.tick() => {
                    self.poll_device();
                }
            }
        }
    }

    pub fn poll_device(&mut self) {
        let reading = self.device.poll();

        match (&reading, self.attached) {
            (Some(_), false) => {
                info!("Gamepad connected");
                self.attached = true;
            }
            (None, true) => {
                info!("Gamepad disconnected");
                self.attached = false;
            }
            _ => {}
        }

        if let Some(pad) = reading {
            self.apply_mapping(&pad, Instant::now());
        }
    }

    /// Evaluates one reading. Returns whether any joint moved.
    pub fn apply_mapping(&mut self, pad: &GamepadSnapshot, now: Instant) -> bool {
        if self
            .last_input
            .is_some_and(|last| now.duration_since(last) < self.timing.input_throttle)
        {
            return false;
        }

        if self.sync.state().is_busy() {
            return false;
        }

        let mut moved = false;
        for axis in Axis::ALL {
            let Some(delta) = self.mapping.delta(axis, pad) else {
                continue;
            };

            moved |= self
                .sync
                .state()
                .update_if_idle(|state| state.angles.offset(axis, delta));
        }

        if moved {
            self.last_input = Some(now);
            self.schedule_auto_send(now);
        }

        if self.mapping.grip_pressed(pad) && self.grip_ready(now) {
            self.last_grip = Some(now);
            let sync = self.sync.clone();
            spawn_dispatch("Gripper toggle", async move { sync.toggle_gripper().await });
        }

        moved
    }

    fn grip_ready(&self, now: Instant) -> bool {
        self.last_grip
            .is_none_or(|last| now.duration_since(last) >= self.timing.grip_throttle)
    }

    fn schedule_auto_send(&mut self, now: Instant) {
        if !self.timing.auto_send {
            return;
        }

        self.auto_send = AutoSend::Scheduled {
            deadline: now + self.timing.auto_send_delay,
        };
    }

    fn fire_auto_send(&mut self) {
        self.auto_send = AutoSend::Idle;

        let sync = self.sync.clone();
        spawn_dispatch("Gamepad movement", async move { sync.send_current().await });
    }
}

/// Runs a dispatch off the input loop, so polling and shutdown keep being
/// served while it waits for the arm.
fn spawn_dispatch<F>(action: &'static str, dispatch: F)
where
    F: Future<Output = Result<Ack, DispatchError>> + Send + 'static,
{
    tokio::spawn(async move {
        match dispatch.await {
            Ok(_) => info!("{} sent", action),
            Err(DispatchError::Busy) => debug!("{} not sent, robot busy", action),
            Err(e) => warn!("{} failed: {}", action, e),
        }
    });
}
