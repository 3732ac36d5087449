use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use scara_link::{Ack, RemoteLink};
use tracing::info;

use super::synchronizer::{CommandSynchronizer, DispatchError};
use crate::models::{Axis, JointAngles, clamp_speed_percent};

/// Operator-facing controls: sliders, plus/minus buttons and the panel's
/// action buttons. Every motion goes through the synchronizer's gate.
pub struct ManualControl<L> {
    sync: Arc<CommandSynchronizer<L>>,
}

impl<L: RemoteLink> ManualControl<L> {
    pub fn new(sync: Arc<CommandSynchronizer<L>>) -> Self {
        Self { sync }
    }

    pub async fn set_axis(&self, axis: Axis, value: i32) -> Result<Ack, DispatchError> {
        self.sync
            .send_with(|state| {
                state.angles.set(axis, value);
            })
            .await
    }

    pub async fn nudge(&self, axis: Axis, delta: i32) -> Result<Ack, DispatchError> {
        self.sync
            .send_with(|state| {
                state.angles.offset(axis, delta);
            })
            .await
    }

    pub async fn set_pose(&self, base: i32, arm1: i32, arm2: i32) -> Result<Ack, DispatchError> {
        let angles = JointAngles::clamped(base, arm1, arm2);
        self.sync.send_with(|state| state.angles = angles).await
    }

    pub async fn reset(&self) -> Result<Ack, DispatchError> {
        info!("Resetting to the zero pose");
        self.sync.send_with(|state| state.reset_home()).await
    }

    pub async fn home(&self) -> Result<Ack, DispatchError> {
        self.sync.home().await
    }

    pub async fn toggle_gripper(&self) -> Result<Ack, DispatchError> {
        self.sync.toggle_gripper().await
    }

    pub async fn resend(&self) -> Result<Ack, DispatchError> {
        self.sync.send_current().await
    }

    /// Not a motion command: only the next dispatch picks it up.
    pub fn set_speed(&self, percent: i64) -> u8 {
        let percent = clamp_speed_percent(percent);
        self.sync.state().update(|state| state.speed_percent = percent);
        info!("Speed set to {}%", percent);
        percent
    }

    pub async fn save_position(&self, name: Option<String>) -> Result<Ack, DispatchError> {
        let snapshot = self.sync.state().snapshot();
        if snapshot.busy {
            return Err(DispatchError::Busy);
        }

        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(default_position_name);

        let ack = self
            .sync
            .link()
            .save_position(&snapshot.save_payload(name.clone()))
            .await?;

        if !ack.is_success() {
            return Err(DispatchError::RemoteRejected(ack.error_message()));
        }

        info!(
            "Saved position {} (sequence length {})",
            name,
            ack.sequence_length.unwrap_or_default()
        );
        Ok(ack)
    }
}

fn default_position_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();

    format!("Position_{}", millis)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use scara_link::mock::{Call, MockLink};

    use super::*;
    use crate::{models::MotionState, state::SharedMotion};

    fn manual(link: Arc<MockLink>) -> ManualControl<Arc<MockLink>> {
        let state = SharedMotion::new(MotionState::default());
        let sync = CommandSynchronizer::new(link, state, Duration::from_millis(500));
        ManualControl::new(Arc::new(sync))
    }

    #[tokio::test(start_paused = true)]
    async fn slider_values_are_clamped_before_sending() {
        let link = Arc::new(MockLink::new());
        let manual = manual(link.clone());

        manual.set_axis(Axis::Arm2, 90).await.unwrap();
        manual.nudge(Axis::Base, -1).await.unwrap();
        manual.set_pose(40, -100, 10).await.unwrap();

        let sent: Vec<_> = link
            .commands()
            .iter()
            .map(|c| (c.base, c.arm1, c.arm2))
            .collect();
        assert_eq!(sent, vec![(0, 0, 60), (0, 0, 60), (25, -90, 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_applies_to_the_next_command() {
        let link = Arc::new(MockLink::new());
        let manual = manual(link.clone());

        assert_eq!(manual.set_speed(0), 1);
        manual.resend().await.unwrap();
        assert_eq!(manual.set_speed(100), 100);
        manual.resend().await.unwrap();

        let speeds: Vec<_> = link.commands().iter().map(|c| c.speed).collect();
        assert_eq!(speeds, vec![100, 1000]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_sends_zero_pose_with_open_gripper() {
        let link = Arc::new(MockLink::new());
        let manual = manual(link.clone());
        manual.set_pose(5, 5, 5).await.unwrap();
        manual.toggle_gripper().await.unwrap();

        manual.reset().await.unwrap();

        let last = *link.commands().last().unwrap();
        assert_eq!((last.base, last.arm1, last.arm2, last.gripper), (0, 0, 0, false));
    }

    #[tokio::test(start_paused = true)]
    async fn save_position_is_refused_while_busy() {
        let link = Arc::new(MockLink::new());
        let manual = manual(link.clone());
        manual.sync.state().update(|state| state.busy = true);

        let result = manual.save_position(Some("pick".to_string())).await;
        assert!(matches!(result, Err(DispatchError::Busy)));
        assert_eq!(link.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn save_position_uses_generated_name_when_blank() {
        let link = Arc::new(MockLink::new());
        let manual = manual(link.clone());
        manual.set_axis(Axis::Arm1, 30).await.unwrap();

        let ack = manual.save_position(Some("  ".to_string())).await.unwrap();
        assert_eq!(ack.sequence_length, Some(1));

        let saved = link
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::SavePosition(payload) => Some(payload),
                _ => None,
            })
            .unwrap();
        assert!(saved.name.starts_with("Position_"));
        assert_eq!(saved.arm1, 30);
    }
}
