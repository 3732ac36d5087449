use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use scara_link::{Ack, RemoteLink};

use super::manual::ManualControl;
use super::sequence::SequencePlayer;
use super::synchronizer::{CommandSynchronizer, DispatchError};
use crate::models::{Command, CommandEnvelope, CommandResponse, CommandResult};

pub struct Panel<L> {
    sync: Arc<CommandSynchronizer<L>>,
    manual: ManualControl<L>,
    sequence: Arc<SequencePlayer<L>>,
}

impl<L: RemoteLink + 'static> Panel<L> {
    pub fn new(sync: Arc<CommandSynchronizer<L>>, sequence_step: Duration) -> Self {
        Self {
            manual: ManualControl::new(sync.clone()),
            sequence: Arc::new(SequencePlayer::new(sync.clone(), sequence_step)),
            sync,
        }
    }

    pub async fn handle(&self, command: Command) -> CommandResult {
        debug!("Handling {:?}", command);

        match command {
            Command::Move { axis, value } => motion(self.manual.set_axis(axis, value).await),
            Command::Nudge { axis, delta } => motion(self.manual.nudge(axis, delta).await),
            Command::Pose { base, arm1, arm2 } => {
                motion(self.manual.set_pose(base, arm1, arm2).await)
            }
            Command::Gripper => motion(self.manual.toggle_gripper().await),
            Command::Home => motion(self.manual.home().await),
            Command::Reset => motion(self.manual.reset().await),
            Command::Send => motion(self.manual.resend().await),
            Command::Save { name } => message(self.manual.save_position(name).await),
            Command::Speed(percent) => {
                let percent = self.manual.set_speed(percent);
                Ok(CommandResponse::Speed {
                    percent,
                    units: crate::models::speed_units(percent),
                })
            }
            Command::Run => message(self.sequence.run().await),
            Command::Stop => message(self.sequence.stop().await),
            Command::Clear => message(self.sequence.clear().await),
            Command::Status => {
                self.sync.query_status().await;
                Ok(CommandResponse::State(self.sync.state().snapshot()))
            }
        }
    }
}

fn motion(result: Result<Ack, DispatchError>) -> CommandResult {
    result
        .map(|_| CommandResponse::Success)
        .map_err(Into::into)
}

fn message(result: Result<Ack, DispatchError>) -> CommandResult {
    result
        .map(|ack| match ack.summary() {
            Some(text) => CommandResponse::Message(text),
            None => CommandResponse::Success,
        })
        .map_err(Into::into)
}

/// Each envelope gets its own task, so a second motion command arriving
/// during a busy-wait meets the busy gate instead of waiting in line.
pub async fn run_controller<L: RemoteLink + 'static>(
    mut command_rx: mpsc::Receiver<CommandEnvelope>,
    panel: Arc<Panel<L>>,
) -> Result<()> {
    while let Some(envelope) = command_rx.recv().await {
        let CommandEnvelope { command, response } = envelope;
        let panel = panel.clone();

        tokio::spawn(async move {
            let result = panel.handle(command).await;
            let _ = response.send(result);
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use scara_link::mock::MockLink;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        models::{Axis, MotionState},
        state::SharedMotion,
    };

    fn panel(link: Arc<MockLink>) -> Arc<Panel<Arc<MockLink>>> {
        let state = SharedMotion::new(MotionState::default());
        let sync = Arc::new(CommandSynchronizer::new(
            link,
            state,
            Duration::from_millis(500),
        ));
        Arc::new(Panel::new(sync, Duration::from_millis(1000)))
    }

    fn envelope(command: Command) -> (CommandEnvelope, oneshot::Receiver<CommandResult>) {
        let (tx, rx) = oneshot::channel();
        (
            CommandEnvelope {
                command,
                response: tx,
            },
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_motion_commands_meet_the_busy_gate() {
        let link = Arc::new(MockLink::new().with_busy_polls(4));
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(run_controller(rx, panel(link.clone())));

        let (first, first_rx) = envelope(Command::Move {
            axis: Axis::Arm1,
            value: 30,
        });
        let (second, second_rx) = envelope(Command::Nudge {
            axis: Axis::Base,
            delta: 1,
        });
        tx.send(first).await.unwrap();
        tx.send(second).await.unwrap();

        assert_eq!(first_rx.await.unwrap(), Ok(CommandResponse::Success));
        let refused = second_rx.await.unwrap().unwrap_err();
        assert_eq!(refused.message, DispatchError::Busy.to_string());
        assert_eq!(link.commands().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_reported_busy_refuses_motion() {
        let link = Arc::new(MockLink::new());
        let panel = panel(link.clone());
        link.set_busy_for(1);

        let Ok(CommandResponse::State(state)) = panel.handle(Command::Status).await else {
            panic!("status must report the motion state");
        };
        assert!(state.busy);
        assert!(!state.controls_enabled());

        let refused = panel
            .handle(Command::Move {
                axis: Axis::Arm2,
                value: 15,
            })
            .await
            .unwrap_err();
        assert_eq!(refused.message, DispatchError::Busy.to_string());
        assert!(link.commands().is_empty());

        // The next poll reports idle again.
        panel.handle(Command::Status).await.unwrap();
        assert_eq!(panel.handle(Command::Send).await, Ok(CommandResponse::Success));
        assert_eq!(link.commands()[0].arm2, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn status_and_speed_report_local_state() {
        let link = Arc::new(MockLink::new());
        let panel = panel(link.clone());

        assert_eq!(
            panel.handle(Command::Speed(50)).await,
            Ok(CommandResponse::Speed {
                percent: 50,
                units: 500
            })
        );

        let Ok(CommandResponse::State(state)) = panel.handle(Command::Status).await else {
            panic!("status must report the motion state");
        };
        assert!(state.controls_enabled());
        assert_eq!(state.speed_percent, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_commands_report_backend_messages() {
        let link = Arc::new(MockLink::new());
        let panel = panel(link.clone());

        assert_eq!(
            panel.handle(Command::Clear).await,
            Ok(CommandResponse::Message("Secuencia borrada".to_string()))
        );
        assert_eq!(
            panel.handle(Command::Stop).await,
            Ok(CommandResponse::Message("Secuencia detenida".to_string()))
        );
    }
}
