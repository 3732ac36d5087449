use anyhow::{Result, anyhow};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use super::device::{GamepadFeed, GamepadSnapshot};

/// Accepts gamepad readers on a Unix socket. Each line is one JSON
/// [`GamepadSnapshot`]; closing the connection detaches the pad.
pub async fn run_gamepad_socket(path: &Path, feed: GamepadFeed) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .map_err(|e| anyhow!("Failed to remove existing socket file: {}", e))?;
    }

    let listener =
        UnixListener::bind(path).map_err(|e| anyhow!("Failed to bind to socket: {}", e))?;
    info!("Gamepad socket listening on {}", path.display());

    loop {
        let (socket, _) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("Failed to accept connection: {}", e))?;

        let feed = feed.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(socket).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<GamepadSnapshot>(&line) {
                        Ok(snapshot) => feed.publish(snapshot),
                        Err(e) => debug!("Ignoring malformed gamepad reading: {}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Error reading from gamepad socket: {}", e);
                        break;
                    }
                }
            }

            feed.detach();
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{io::AsyncWriteExt, net::UnixStream};

    use super::*;
    use crate::input::device::{GamepadDevice, feed};

    #[tokio::test]
    async fn readings_arrive_through_the_socket() {
        let path = std::env::temp_dir().join(format!("scara_gamepad_{}.sock", std::process::id()));
        let (tx, mut pad) = feed();

        let server = tokio::spawn({
            let path = path.clone();
            async move { run_gamepad_socket(&path, tx).await }
        });

        let mut client = loop {
            match UnixStream::connect(&path).await {
                Ok(client) => break client,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };

        client
            .write_all(b"not json\n{\"buttons\": [false, true], \"axes\": [0.5]}\n")
            .await
            .unwrap();

        let reading = loop {
            if let Some(reading) = pad.poll() {
                break reading;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert!(reading.pressed(1));
        assert_eq!(reading.axis(0), 0.5);

        drop(client);
        while pad.poll().is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        server.abort();
        let _ = std::fs::remove_file(&path);
    }
}
