use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `POST /send-command/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub base: i32,
    pub arm1: i32,
    pub arm2: i32,
    pub gripper: bool,
    pub speed: u32,
}

/// Body of `POST /save-position/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePositionPayload {
    pub name: String,
    pub base: i32,
    pub arm1: i32,
    pub arm2: i32,
    pub gripper: bool,
}

/// Acknowledgement returned by every mutating endpoint.
///
/// Motion endpoints answer with `{success, response|error}` while the
/// sequence endpoints answer with `{status, message}`, so both shapes are
/// accepted here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub sequence_length: Option<u32>,
}

impl Ack {
    pub fn accepted() -> Self {
        Self {
            success: Some(true),
            ..Default::default()
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(false) || self.status.as_deref() == Some("success")
    }

    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }

    /// Human readable outcome, if the backend sent one.
    pub fn summary(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(message.clone());
        }

        match &self.response {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Answer of `GET /get-status/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub last_position: Option<LastPosition>,
}

impl Status {
    /// Conservative status used whenever the backend cannot be observed.
    pub fn offline() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LastPosition {
    #[serde(default)]
    pub base: Option<f64>,
    #[serde(default)]
    pub arm1: Option<f64>,
    #[serde(default)]
    pub arm2: Option<f64>,
    #[serde(default)]
    pub gripper: Option<Value>,
    #[serde(default)]
    pub speed: Option<f64>,
}

impl LastPosition {
    /// Gripper flag, only when the backend reported it as a boolean.
    pub fn gripper_closed(&self) -> Option<bool> {
        self.gripper.as_ref().and_then(Value::as_bool)
    }
}

/// Answer of `GET /next-position/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NextPosition {
    pub status: String,
    #[serde(default)]
    pub position: Option<SequencePosition>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NextPosition {
    pub fn stopped(message: impl Into<String>) -> Self {
        Self {
            status: "stopped".to_string(),
            position: None,
            index: None,
            total: None,
            message: Some(message.into()),
        }
    }

    /// The position to play next, or `None` once playback is over.
    pub fn step(&self) -> Option<SequencePosition> {
        if self.status == "success" {
            self.position
        } else {
            None
        }
    }
}

/// One stored pose. Older backends use `z/q1/q2/grip` and send the
/// gripper as a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePosition {
    #[serde(alias = "z", default)]
    pub base: f64,
    #[serde(alias = "q1", default)]
    pub arm1: f64,
    #[serde(alias = "q2", default)]
    pub arm2: f64,
    #[serde(alias = "grip", default, deserialize_with = "bool_or_number")]
    pub gripper: bool,
}

fn bool_or_number<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Number(f64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => flag,
        Flag::Number(value) => value != 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_accepts_both_response_shapes() {
        let motion: Ack = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(motion.is_success());

        let sequence: Ack =
            serde_json::from_str(r#"{"status": "success", "message": "Secuencia iniciada"}"#)
                .unwrap();
        assert!(sequence.is_success());
        assert_eq!(sequence.summary().as_deref(), Some("Secuencia iniciada"));

        let rejected: Ack =
            serde_json::from_str(r#"{"success": false, "error": "Arduino no conectado"}"#)
                .unwrap();
        assert!(!rejected.is_success());
        assert_eq!(rejected.error_message(), "Arduino no conectado");
    }

    #[test]
    fn status_tolerates_missing_and_null_fields() {
        let status: Status =
            serde_json::from_str(r#"{"connected": true, "busy": false, "last_position": null}"#)
                .unwrap();
        assert!(status.connected);
        assert!(status.last_position.is_none());

        let status: Status = serde_json::from_str("{}").unwrap();
        assert_eq!(status, Status::offline());
    }

    #[test]
    fn gripper_is_synced_only_from_booleans() {
        let status: Status = serde_json::from_str(
            r#"{"connected": true, "busy": true,
                "last_position": {"arm1": 10, "arm2": -5, "base": 2.5, "gripper": true, "speed": 500}}"#,
        )
        .unwrap();
        let last = status.last_position.unwrap();
        assert_eq!(last.gripper_closed(), Some(true));
        assert_eq!(last.base, Some(2.5));

        let numeric = LastPosition {
            gripper: Some(Value::from(1)),
            ..Default::default()
        };
        assert_eq!(numeric.gripper_closed(), None);
    }

    #[test]
    fn next_position_reads_legacy_field_names() {
        let next: NextPosition = serde_json::from_str(
            r#"{"status": "success", "position": {"q1": 30, "q2": -45, "z": 12, "grip": 100},
                "index": 1, "total": 3}"#,
        )
        .unwrap();
        let step = next.step().unwrap();
        assert_eq!(step.arm1, 30.0);
        assert_eq!(step.arm2, -45.0);
        assert_eq!(step.base, 12.0);
        assert!(step.gripper);
        assert_eq!(next.total, Some(3));

        let stopped: NextPosition = serde_json::from_str(
            r#"{"status": "stopped", "message": "Secuencia completada o detenida"}"#,
        )
        .unwrap();
        assert!(stopped.step().is_none());
    }
}
