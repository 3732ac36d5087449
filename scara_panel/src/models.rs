use std::{fmt, str::FromStr};

use scara_link::{CommandPayload, LastPosition, SavePositionPayload, SequencePosition, Status};
use tokio::sync::oneshot;

pub const MIN_SPEED_PERCENT: u8 = 1;
pub const MAX_SPEED_PERCENT: u8 = 100;
pub const DEFAULT_SPEED_PERCENT: u8 = 50;

const DEVICE_SPEED_MIN: u32 = 100;
const DEVICE_SPEED_MAX: u32 = 1000;

/// Maps the panel's speed percentage onto the firmware's speed units.
pub fn speed_units(percent: u8) -> u32 {
    let units = (f64::from(percent) / 100.0 * f64::from(DEVICE_SPEED_MAX)).round() as u32;
    units.clamp(DEVICE_SPEED_MIN, DEVICE_SPEED_MAX)
}

pub fn clamp_speed_percent(percent: i64) -> u8 {
    percent.clamp(i64::from(MIN_SPEED_PERCENT), i64::from(MAX_SPEED_PERCENT)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Vertical lift, in centimetres.
    Base,
    /// Shoulder, in degrees.
    Arm1,
    /// Elbow, in degrees, relative to the shoulder link.
    Arm2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Base, Axis::Arm1, Axis::Arm2];

    pub fn limits(self) -> (i32, i32) {
        match self {
            Axis::Base => (0, 25),
            Axis::Arm1 => (-90, 90),
            Axis::Arm2 => (-120, 60),
        }
    }

    pub fn clamp(self, value: i32) -> i32 {
        let (min, max) = self.limits();
        value.clamp(min, max)
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Base => "base",
            Axis::Arm1 => "arm1",
            Axis::Arm2 => "arm2",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" | "z" | "lift" => Ok(Axis::Base),
            "arm1" | "q1" | "shoulder" => Ok(Axis::Arm1),
            "arm2" | "q2" | "elbow" => Ok(Axis::Arm2),
            other => Err(format!("Unknown axis: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JointAngles {
    pub base: i32,
    pub arm1: i32,
    pub arm2: i32,
}

impl JointAngles {
    pub fn clamped(base: i32, arm1: i32, arm2: i32) -> Self {
        Self {
            base: Axis::Base.clamp(base),
            arm1: Axis::Arm1.clamp(arm1),
            arm2: Axis::Arm2.clamp(arm2),
        }
    }

    pub fn from_position(position: &SequencePosition) -> Self {
        Self::clamped(
            position.base.round() as i32,
            position.arm1.round() as i32,
            position.arm2.round() as i32,
        )
    }

    pub fn get(&self, axis: Axis) -> i32 {
        match axis {
            Axis::Base => self.base,
            Axis::Arm1 => self.arm1,
            Axis::Arm2 => self.arm2,
        }
    }

    /// Stores the clamped value and reports whether the joint moved.
    pub fn set(&mut self, axis: Axis, value: i32) -> bool {
        let value = axis.clamp(value);
        let slot = match axis {
            Axis::Base => &mut self.base,
            Axis::Arm1 => &mut self.arm1,
            Axis::Arm2 => &mut self.arm2,
        };

        let changed = *slot != value;
        *slot = value;
        changed
    }

    pub fn offset(&mut self, axis: Axis, delta: i32) -> bool {
        self.set(axis, self.get(axis).saturating_add(delta))
    }
}

/// Client-side copy of the arm's motion state.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionState {
    pub angles: JointAngles,
    pub gripper_closed: bool,
    pub connected: bool,
    pub busy: bool,
    pub speed_percent: u8,
    pub last_position: Option<LastPosition>,

    // Set while this client owns the single in-flight command.
    pub(crate) in_flight: bool,
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_PERCENT)
    }
}

impl MotionState {
    pub fn new(speed_percent: u8) -> Self {
        Self {
            angles: JointAngles::default(),
            gripper_closed: false,
            connected: false,
            busy: false,
            speed_percent: clamp_speed_percent(i64::from(speed_percent)),
            last_position: None,
            in_flight: false,
        }
    }

    pub fn controls_enabled(&self) -> bool {
        self.connected && !self.busy
    }

    pub fn speed_units(&self) -> u32 {
        speed_units(self.speed_percent)
    }

    pub fn command_payload(&self) -> CommandPayload {
        CommandPayload {
            base: self.angles.base,
            arm1: self.angles.arm1,
            arm2: self.angles.arm2,
            gripper: self.gripper_closed,
            speed: self.speed_units(),
        }
    }

    pub fn save_payload(&self, name: String) -> SavePositionPayload {
        SavePositionPayload {
            name,
            base: self.angles.base,
            arm1: self.angles.arm1,
            arm2: self.angles.arm2,
            gripper: self.gripper_closed,
        }
    }

    pub fn apply_status(&mut self, status: &Status) {
        self.connected = status.connected;
        // A reported idle backend cannot release a command we still own.
        self.busy = status.busy || self.in_flight;

        if let Some(last) = &status.last_position {
            if let Some(closed) = last.gripper_closed() {
                self.gripper_closed = closed;
            }
            self.last_position = Some(last.clone());
        }
    }

    pub fn reset_home(&mut self) {
        self.angles = JointAngles::default();
        self.gripper_closed = false;
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = match (self.connected, self.busy) {
            (false, _) => "disconnected",
            (true, true) => "busy",
            (true, false) => "connected",
        };

        write!(
            f,
            "Z={}cm | θ1={}° | θ2={}° | gripper {} | speed {}% | {}",
            self.angles.base,
            self.angles.arm1,
            self.angles.arm1 + self.angles.arm2,
            if self.gripper_closed { "closed" } else { "open" },
            self.speed_percent,
            link
        )
    }
}

pub type CommandResult = Result<CommandResponse, CommandError>;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandError {
    pub message: String,
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        CommandError { message }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    Success,
    Message(String),
    Speed { percent: u8, units: u32 },
    State(MotionState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move { axis: Axis, value: i32 },
    Nudge { axis: Axis, delta: i32 },
    Pose { base: i32, arm1: i32, arm2: i32 },
    Gripper,
    Home,
    Reset,
    Send,
    Save { name: Option<String> },
    Speed(i64),
    Run,
    Stop,
    Clear,
    Status,
}

#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    pub response: oneshot::Sender<CommandResult>,
}
