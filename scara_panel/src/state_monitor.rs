use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use scara_link::RemoteLink;

use crate::controller::synchronizer::CommandSynchronizer;

/// Passive reconciliation with the backend for the whole session.
pub async fn run_state_monitor<L: RemoteLink>(
    synchronizer: Arc<CommandSynchronizer<L>>,
    period: Duration,
) -> Result<()> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut connected = None;

    loop {
        interval.tick().await;

        let status = synchronizer.query_status().await;
        if connected != Some(status.connected) {
            if status.connected {
                info!("Robot connected");
            } else {
                warn!("Robot not connected");
            }
            connected = Some(status.connected);
        }
    }
}

#[cfg(test)]
mod tests {
    use scara_link::mock::MockLink;

    use super::*;
    use crate::{models::MotionState, state::SharedMotion};

    #[tokio::test(start_paused = true)]
    async fn polls_status_every_period() {
        let link = Arc::new(MockLink::new());
        let state = SharedMotion::new(MotionState::default());
        let sync = Arc::new(CommandSynchronizer::new(
            link.clone(),
            state.clone(),
            Duration::from_millis(500),
        ));

        let monitor = tokio::spawn(run_state_monitor(sync, Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(link.status_polls(), 3);
        assert!(state.snapshot().connected);

        link.set_connected(false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!state.snapshot().controls_enabled());

        monitor.abort();
    }
}
