use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::device::GamepadSnapshot;
use crate::models::Axis;

/// Analog readings at or below this magnitude are ignored.
pub const DEAD_ZONE: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    X,
    O,
    Square,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl Button {
    const ALL: [Button; 12] = [
        Button::X,
        Button::O,
        Button::Square,
        Button::Triangle,
        Button::L1,
        Button::R1,
        Button::L2,
        Button::R2,
        Button::DpadUp,
        Button::DpadDown,
        Button::DpadLeft,
        Button::DpadRight,
    ];

    pub fn index(self) -> usize {
        match self {
            Button::X => 0,
            Button::O => 1,
            Button::Square => 2,
            Button::Triangle => 3,
            Button::L1 => 4,
            Button::R1 => 5,
            Button::L2 => 6,
            Button::R2 => 7,
            Button::DpadUp => 12,
            Button::DpadDown => 13,
            Button::DpadLeft => 14,
            Button::DpadRight => 15,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::X => "x",
            Button::O => "o",
            Button::Square => "square",
            Button::Triangle => "triangle",
            Button::L1 => "l1",
            Button::R1 => "r1",
            Button::L2 => "l2",
            Button::R2 => "r2",
            Button::DpadUp => "dpad-up",
            Button::DpadDown => "dpad-down",
            Button::DpadLeft => "dpad-left",
            Button::DpadRight => "dpad-right",
        }
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Button::ALL
            .into_iter()
            .find(|button| button.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("Unknown button: {}", name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stick {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickAxis {
    X,
    Y,
}

/// How one joint (or the gripper) is driven: `"a/b"` for a button pair,
/// `"axis-left-x"` style for an analog stick axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ControlBinding {
    Buttons(Button, Button),
    Analog { stick: Stick, axis: StickAxis },
}

impl ControlBinding {
    fn analog_index(stick: Stick, axis: StickAxis) -> usize {
        match (stick, axis) {
            (Stick::Left, StickAxis::X) => 0,
            (Stick::Left, StickAxis::Y) => 1,
            (Stick::Right, StickAxis::X) => 2,
            (Stick::Right, StickAxis::Y) => 3,
        }
    }
}

impl FromStr for ControlBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some((first, second)) = s.split_once('/') {
            return Ok(ControlBinding::Buttons(first.parse()?, second.parse()?));
        }

        let analog = s
            .strip_prefix("axis-")
            .and_then(|rest| rest.split_once('-'))
            .and_then(|(stick, axis)| {
                let stick = match stick {
                    "left" => Stick::Left,
                    "right" => Stick::Right,
                    _ => return None,
                };
                let axis = match axis {
                    "x" => StickAxis::X,
                    "y" => StickAxis::Y,
                    _ => return None,
                };
                Some(ControlBinding::Analog { stick, axis })
            });

        analog.ok_or_else(|| format!("Invalid control binding: {}", s))
    }
}

impl fmt::Display for ControlBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlBinding::Buttons(first, second) => {
                write!(f, "{}/{}", first.name(), second.name())
            }
            ControlBinding::Analog { stick, axis } => {
                let stick = match stick {
                    Stick::Left => "left",
                    Stick::Right => "right",
                };
                let axis = match axis {
                    StickAxis::X => "x",
                    StickAxis::Y => "y",
                };
                write!(f, "axis-{}-{}", stick, axis)
            }
        }
    }
}

impl TryFrom<String> for ControlBinding {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ControlBinding> for String {
    fn from(binding: ControlBinding) -> Self {
        binding.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadMapping {
    pub arm1: ControlBinding,
    pub arm2: ControlBinding,
    pub base: ControlBinding,
    pub grip: ControlBinding,
    pub sens_left: f32,
    pub sens_right: f32,
}

impl Default for GamepadMapping {
    fn default() -> Self {
        Self {
            arm1: ControlBinding::Buttons(Button::DpadLeft, Button::DpadRight),
            arm2: ControlBinding::Buttons(Button::L1, Button::R1),
            base: ControlBinding::Buttons(Button::DpadUp, Button::DpadDown),
            grip: ControlBinding::Buttons(Button::X, Button::O),
            sens_left: 1.0,
            sens_right: 1.0,
        }
    }
}

impl GamepadMapping {
    pub fn binding(&self, axis: Axis) -> ControlBinding {
        match axis {
            Axis::Base => self.base,
            Axis::Arm1 => self.arm1,
            Axis::Arm2 => self.arm2,
        }
    }

    fn sensitivity(&self, stick: Stick) -> f32 {
        match stick {
            Stick::Left => self.sens_left,
            Stick::Right => self.sens_right,
        }
    }

    /// Requested change for `axis`, before clamping.
    pub fn delta(&self, axis: Axis, pad: &GamepadSnapshot) -> Option<i32> {
        let step = step(axis);

        match self.binding(axis) {
            ControlBinding::Buttons(first, second) => {
                let sign = first_button_sign(axis);
                if pad.pressed(first.index()) {
                    Some(sign * step)
                } else if pad.pressed(second.index()) {
                    Some(-sign * step)
                } else {
                    None
                }
            }
            ControlBinding::Analog { stick, axis: dir } => {
                let value =
                    pad.axis(ControlBinding::analog_index(stick, dir)) * self.sensitivity(stick);
                if value.abs() <= DEAD_ZONE {
                    return None;
                }

                let sign = if value > 0.0 { 1 } else { -1 };
                // Stick up reads negative.
                let sign = match dir {
                    StickAxis::X => sign,
                    StickAxis::Y => -sign,
                };
                Some(sign * step)
            }
        }
    }

    pub fn grip_pressed(&self, pad: &GamepadSnapshot) -> bool {
        match self.grip {
            ControlBinding::Buttons(first, second) => {
                pad.pressed(first.index()) || pad.pressed(second.index())
            }
            ControlBinding::Analog { stick, axis } => {
                let value = pad.axis(ControlBinding::analog_index(stick, axis));
                (value * self.sensitivity(stick)).abs() > DEAD_ZONE
            }
        }
    }
}

fn step(axis: Axis) -> i32 {
    match axis {
        Axis::Base => 1,
        Axis::Arm1 | Axis::Arm2 => 2,
    }
}

fn first_button_sign(axis: Axis) -> i32 {
    match axis {
        Axis::Arm1 => -1,
        Axis::Arm2 | Axis::Base => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_parse_and_print() {
        for text in ["dpad-left/dpad-right", "l1/r1", "x/o", "axis-left-x", "axis-right-y"] {
            let binding: ControlBinding = text.parse().unwrap();
            assert_eq!(binding.to_string(), text);
        }

        assert!("axis-middle-x".parse::<ControlBinding>().is_err());
        assert!("l3/r3".parse::<ControlBinding>().is_err());
        assert_eq!(
            " L1 / R1 ".parse::<ControlBinding>(),
            Ok(ControlBinding::Buttons(Button::L1, Button::R1))
        );
    }

    #[test]
    fn default_buttons_follow_panel_directions() {
        let mapping = GamepadMapping::default();
        let pad = |button: Button| GamepadSnapshot::default().with_button(button.index());

        assert_eq!(mapping.delta(Axis::Arm1, &pad(Button::DpadLeft)), Some(-2));
        assert_eq!(mapping.delta(Axis::Arm1, &pad(Button::DpadRight)), Some(2));
        assert_eq!(mapping.delta(Axis::Arm2, &pad(Button::L1)), Some(2));
        assert_eq!(mapping.delta(Axis::Arm2, &pad(Button::R1)), Some(-2));
        assert_eq!(mapping.delta(Axis::Base, &pad(Button::DpadUp)), Some(1));
        assert_eq!(mapping.delta(Axis::Base, &pad(Button::DpadDown)), Some(-1));
        assert_eq!(mapping.delta(Axis::Base, &GamepadSnapshot::default()), None);

        assert!(mapping.grip_pressed(&pad(Button::O)));
        assert!(!mapping.grip_pressed(&pad(Button::Square)));
    }

    #[test]
    fn analog_axes_respect_dead_zone_and_inversion() {
        let mapping = GamepadMapping {
            arm1: "axis-left-x".parse().unwrap(),
            arm2: "axis-left-y".parse().unwrap(),
            base: "axis-right-y".parse().unwrap(),
            sens_right: 0.5,
            ..Default::default()
        };

        let pad = GamepadSnapshot::default()
            .with_axis(0, 0.9)
            .with_axis(1, -0.3)
            .with_axis(3, -0.6);
        assert_eq!(mapping.delta(Axis::Arm1, &pad), Some(2));
        // Stick pushed up raises the elbow.
        assert_eq!(mapping.delta(Axis::Arm2, &pad), Some(2));
        assert_eq!(mapping.delta(Axis::Base, &pad), Some(1));

        // 0.25 scaled by 0.5 falls inside the dead zone.
        let pad = GamepadSnapshot::default().with_axis(0, 0.1).with_axis(3, 0.25);
        assert_eq!(mapping.delta(Axis::Arm1, &pad), None);
        assert_eq!(mapping.delta(Axis::Base, &pad), None);
    }
}
