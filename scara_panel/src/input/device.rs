use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// One reading of a pad in the standard gamepad layout: buttons by index,
/// axes as left-x, left-y, right-x, right-y in `-1.0..=1.0` (up is
/// negative).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamepadSnapshot {
    #[serde(default)]
    pub buttons: Vec<bool>,
    #[serde(default)]
    pub axes: Vec<f32>,
}

impl GamepadSnapshot {
    pub fn pressed(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }

    pub fn with_button(mut self, index: usize) -> Self {
        if self.buttons.len() <= index {
            self.buttons.resize(index + 1, false);
        }
        self.buttons[index] = true;
        self
    }

    pub fn with_axis(mut self, index: usize, value: f32) -> Self {
        if self.axes.len() <= index {
            self.axes.resize(index + 1, 0.0);
        }
        self.axes[index] = value;
        self
    }
}

pub trait GamepadDevice {
    /// Current pad reading, or `None` while no pad is attached.
    fn poll(&mut self) -> Option<GamepadSnapshot>;
}

/// Publishing half of a [`FeedGamepad`].
#[derive(Clone)]
pub struct GamepadFeed {
    tx: watch::Sender<Option<GamepadSnapshot>>,
}

impl GamepadFeed {
    pub fn publish(&self, snapshot: GamepadSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }

    pub fn detach(&self) {
        self.tx.send_replace(None);
    }
}

/// Gamepad whose readings are pushed by another task.
pub struct FeedGamepad {
    rx: watch::Receiver<Option<GamepadSnapshot>>,
}

impl GamepadDevice for FeedGamepad {
    fn poll(&mut self) -> Option<GamepadSnapshot> {
        self.rx.borrow_and_update().clone()
    }
}

pub fn feed() -> (GamepadFeed, FeedGamepad) {
    let (tx, rx) = watch::channel(None);
    (GamepadFeed { tx }, FeedGamepad { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_read_as_released() {
        let pad = GamepadSnapshot::default().with_button(15).with_axis(1, -0.5);
        assert!(pad.pressed(15));
        assert!(!pad.pressed(3));
        assert!(!pad.pressed(40));
        assert_eq!(pad.axis(1), -0.5);
        assert_eq!(pad.axis(3), 0.0);
    }

    #[test]
    fn feed_reports_latest_reading() {
        let (feed, mut pad) = feed();
        assert_eq!(pad.poll(), None);

        feed.publish(GamepadSnapshot::default().with_button(0));
        feed.publish(GamepadSnapshot::default().with_button(1));
        assert!(pad.poll().is_some_and(|s| s.pressed(1) && !s.pressed(0)));

        feed.detach();
        assert_eq!(pad.poll(), None);
    }
}
