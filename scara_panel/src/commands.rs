use crate::models::{Axis, Command, CommandEnvelope, CommandResult};
use tokio::sync::oneshot;

pub fn parse_command(cmd_str: &str) -> Option<(CommandEnvelope, oneshot::Receiver<CommandResult>)> {
    let parts: Vec<&str> = cmd_str.trim().split(':').map(str::trim).collect();
    if parts.is_empty() || parts[0].is_empty() {
        return None;
    }

    let command = match (parts[0].to_ascii_lowercase().as_str(), parts.len()) {
        ("move", 3) => Command::Move {
            axis: parts[1].parse::<Axis>().ok()?,
            value: parts[2].parse::<i32>().ok()?,
        },
        ("nudge", 3) => Command::Nudge {
            axis: parts[1].parse::<Axis>().ok()?,
            delta: parts[2].parse::<i32>().ok()?,
        },
        ("pose", 4) => Command::Pose {
            base: parts[1].parse::<i32>().ok()?,
            arm1: parts[2].parse::<i32>().ok()?,
            arm2: parts[3].parse::<i32>().ok()?,
        },
        ("grip" | "gripper", 1) => Command::Gripper,
        ("home", 1) => Command::Home,
        ("reset", 1) => Command::Reset,
        ("send", 1) => Command::Send,
        ("save", 1) => Command::Save { name: None },
        // Names may contain colons.
        ("save", _) => Command::Save {
            name: Some(parts[1..].join(":")),
        },
        ("speed", 2) => Command::Speed(parts[1].parse::<i64>().ok()?),
        ("run", 1) => Command::Run,
        ("stop", 1) => Command::Stop,
        ("clear", 1) => Command::Clear,
        ("status", 1) => Command::Status,
        _ => return None,
    };

    let (tx, rx) = oneshot::channel();

    Some((
        CommandEnvelope {
            command,
            response: tx,
        },
        rx,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> Option<Command> {
        parse_command(line).map(|(envelope, _)| envelope.command)
    }

    #[test]
    fn parses_motion_commands() {
        assert_eq!(
            parsed("move:arm1:45"),
            Some(Command::Move {
                axis: Axis::Arm1,
                value: 45
            })
        );
        assert_eq!(
            parsed(" nudge : base : -1 \n"),
            Some(Command::Nudge {
                axis: Axis::Base,
                delta: -1
            })
        );
        assert_eq!(
            parsed("pose:10:20:-30"),
            Some(Command::Pose {
                base: 10,
                arm1: 20,
                arm2: -30
            })
        );
        assert_eq!(parsed("grip"), Some(Command::Gripper));
        assert_eq!(parsed("HOME"), Some(Command::Home));
    }

    #[test]
    fn parses_save_with_and_without_name() {
        assert_eq!(parsed("save"), Some(Command::Save { name: None }));
        assert_eq!(
            parsed("save:pick:1"),
            Some(Command::Save {
                name: Some("pick:1".to_string())
            })
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parsed(""), None);
        assert_eq!(parsed("move:arm1"), None);
        assert_eq!(parsed("move:wrist:10"), None);
        assert_eq!(parsed("speed:fast"), None);
        assert_eq!(parsed("home:now"), None);
        assert_eq!(parsed("dance"), None);
    }
}
