//! In-memory backend used by tests. It follows the bridge's observable
//! behaviour: motion is accepted immediately, then reported busy for a
//! configurable number of status polls.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use serde_json::Value;

use crate::{
    Ack, CommandPayload, LastPosition, LinkError, LinkResult, NextPosition, RemoteLink,
    SavePositionPayload, SequencePosition, Status,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SendCommand(CommandPayload),
    Home,
    SavePosition(SavePositionPayload),
    RunSequence,
    StopSequence,
    ClearSequence,
    NextPosition,
    GetStatus,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,

    connected: bool,
    busy_polls: usize,
    busy_remaining: usize,
    last_position: Option<LastPosition>,

    reject_motion: Option<String>,
    fail_motion: bool,
    fail_status: bool,
    status_delay: Duration,

    sequence: Vec<SequencePosition>,
    sequence_running: bool,
    sequence_index: usize,
    scripted_steps: VecDeque<NextPosition>,
}

#[derive(Debug)]
pub struct MockLink {
    state: Mutex<MockState>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                connected: true,
                ..Default::default()
            }),
        }
    }

    /// Number of status polls reporting `busy` after each accepted motion.
    pub fn with_busy_polls(self, polls: usize) -> Self {
        self.with(|state| state.busy_polls = polls);
        self
    }

    pub fn with_sequence(self, positions: Vec<SequencePosition>) -> Self {
        self.with(|state| state.sequence = positions);
        self
    }

    /// Answers returned by `next_position` ahead of the stored sequence.
    pub fn with_scripted_steps(self, steps: Vec<NextPosition>) -> Self {
        self.with(|state| state.scripted_steps = steps.into());
        self
    }

    /// Makes every status request take `delay` before answering.
    pub fn with_status_delay(self, delay: Duration) -> Self {
        self.with(|state| state.status_delay = delay);
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.with(|state| state.connected = connected);
    }

    /// Report busy for the next `polls` status requests.
    pub fn set_busy_for(&self, polls: usize) {
        self.with(|state| state.busy_remaining = polls);
    }

    pub fn reject_motion(&self, reason: Option<&str>) {
        self.with(|state| state.reject_motion = reason.map(str::to_string));
    }

    pub fn fail_motion(&self, fail: bool) {
        self.with(|state| state.fail_motion = fail);
    }

    pub fn fail_status(&self, fail: bool) {
        self.with(|state| state.fail_status = fail);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|state| state.calls.clone())
    }

    pub fn request_count(&self) -> usize {
        self.with(|state| state.calls.len())
    }

    pub fn commands(&self) -> Vec<CommandPayload> {
        self.with(|state| {
            state
                .calls
                .iter()
                .filter_map(|call| match call {
                    Call::SendCommand(payload) => Some(*payload),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn status_polls(&self) -> usize {
        self.with(|state| {
            state
                .calls
                .iter()
                .filter(|call| matches!(call, Call::GetStatus))
                .count()
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn accept_motion(state: &mut MockState, position: LastPosition) -> LinkResult<Ack> {
        if state.fail_motion {
            return Err(LinkError::Unreachable("mock motion failure".to_string()));
        }
        if let Some(reason) = &state.reject_motion {
            return Ok(Ack::rejected(reason.clone()));
        }

        state.last_position = Some(position);
        state.busy_remaining = state.busy_polls;
        Ok(Ack::accepted())
    }
}

fn position_of(payload: &CommandPayload) -> LastPosition {
    LastPosition {
        base: Some(payload.base as f64),
        arm1: Some(payload.arm1 as f64),
        arm2: Some(payload.arm2 as f64),
        gripper: Some(Value::Bool(payload.gripper)),
        speed: Some(payload.speed as f64),
    }
}

fn sequence_ack(message: &str) -> Ack {
    Ack {
        status: Some("success".to_string()),
        message: Some(message.to_string()),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl RemoteLink for MockLink {
    async fn send_command(&self, payload: &CommandPayload) -> LinkResult<Ack> {
        self.with(|state| {
            state.calls.push(Call::SendCommand(*payload));
            Self::accept_motion(state, position_of(payload))
        })
    }

    async fn home(&self) -> LinkResult<Ack> {
        self.with(|state| {
            state.calls.push(Call::Home);
            let home = CommandPayload {
                base: 0,
                arm1: 0,
                arm2: 0,
                gripper: false,
                speed: 500,
            };
            Self::accept_motion(state, position_of(&home))
        })
    }

    async fn save_position(&self, payload: &SavePositionPayload) -> LinkResult<Ack> {
        self.with(|state| {
            state.calls.push(Call::SavePosition(payload.clone()));
            state.sequence.push(SequencePosition {
                base: payload.base as f64,
                arm1: payload.arm1 as f64,
                arm2: payload.arm2 as f64,
                gripper: payload.gripper,
            });

            Ok(Ack {
                success: Some(true),
                message: Some(format!("Posición guardada: {}", payload.name)),
                sequence_length: Some(state.sequence.len() as u32),
                ..Default::default()
            })
        })
    }

    async fn run_sequence(&self) -> LinkResult<Ack> {
        self.with(|state| {
            state.calls.push(Call::RunSequence);
            state.sequence_running = true;
            state.sequence_index = 0;
            Ok(sequence_ack("Secuencia iniciada"))
        })
    }

    async fn stop_sequence(&self) -> LinkResult<Ack> {
        self.with(|state| {
            state.calls.push(Call::StopSequence);
            state.sequence_running = false;
            Ok(sequence_ack("Secuencia detenida"))
        })
    }

    async fn clear_sequence(&self) -> LinkResult<Ack> {
        self.with(|state| {
            state.calls.push(Call::ClearSequence);
            state.sequence.clear();
            Ok(sequence_ack("Secuencia borrada"))
        })
    }

    async fn next_position(&self) -> LinkResult<NextPosition> {
        self.with(|state| {
            state.calls.push(Call::NextPosition);

            if let Some(step) = state.scripted_steps.pop_front() {
                return Ok(step);
            }

            if !state.sequence_running || state.sequence_index >= state.sequence.len() {
                state.sequence_running = false;
                return Ok(NextPosition::stopped("Secuencia completada o detenida"));
            }

            let position = state.sequence[state.sequence_index];
            state.sequence_index += 1;

            Ok(NextPosition {
                status: "success".to_string(),
                position: Some(position),
                index: Some(state.sequence_index as u32),
                total: Some(state.sequence.len() as u32),
                message: None,
            })
        })
    }

    async fn get_status(&self) -> LinkResult<Status> {
        let delay = self.with(|state| state.status_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.with(|state| {
            state.calls.push(Call::GetStatus);

            if state.fail_status {
                return Err(LinkError::Unreachable("mock status failure".to_string()));
            }

            let busy = state.busy_remaining > 0;
            state.busy_remaining = state.busy_remaining.saturating_sub(1);

            Ok(Status {
                connected: state.connected,
                busy: state.connected && busy,
                last_position: state
                    .connected
                    .then(|| state.last_position.clone())
                    .flatten(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_busy_for_configured_polls() {
        let link = MockLink::new().with_busy_polls(2);
        let payload = CommandPayload {
            base: 5,
            arm1: 10,
            arm2: -20,
            gripper: true,
            speed: 500,
        };

        assert!(link.send_command(&payload).await.unwrap().is_success());
        assert!(link.get_status().await.unwrap().busy);
        assert!(link.get_status().await.unwrap().busy);

        let idle = link.get_status().await.unwrap();
        assert!(!idle.busy);
        assert_eq!(idle.last_position.unwrap().gripper_closed(), Some(true));
    }

    #[tokio::test]
    async fn sequence_plays_saved_positions_then_stops() {
        let link = MockLink::new();
        let save = SavePositionPayload {
            name: "pick".to_string(),
            base: 3,
            arm1: 45,
            arm2: -30,
            gripper: false,
        };

        let ack = link.save_position(&save).await.unwrap();
        assert_eq!(ack.sequence_length, Some(1));

        // Not running yet.
        assert!(link.next_position().await.unwrap().step().is_none());

        link.run_sequence().await.unwrap();
        let first = link.next_position().await.unwrap();
        assert_eq!(first.step().unwrap().arm1, 45.0);
        assert!(link.next_position().await.unwrap().step().is_none());
    }
}
