use anyhow::{Result, anyhow};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::commands::parse_command;
use crate::models::{CommandEnvelope, CommandResponse};

fn format_response(response: CommandResponse) -> String {
    match response {
        CommandResponse::Success => "OK\n".to_string(),
        CommandResponse::Message(message) => format!("OK: {}\n", message),
        CommandResponse::Speed { percent, units } => {
            format!("Speed: {}% ({} units)\n", percent, units)
        }
        CommandResponse::State(state) => format!("State: {}\n", state),
    }
}

/// Line console: one command per input line, one reply line per command.
pub async fn run_console<R, W>(
    command_tx: mpsc::Sender<CommandEnvelope>,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| anyhow!("Failed to read console input: {}", e))?
    {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Console command: {}", line.trim());

        let reply = match parse_command(&line) {
            Some((envelope, receiver)) => {
                if command_tx.send(envelope).await.is_err() {
                    "Error: Failed to process command\n".to_string()
                } else {
                    match receiver.await {
                        Ok(Ok(response)) => format_response(response),
                        Ok(Err(err)) => format!("{}\n", err),
                        Err(_) => "Error: Failed to receive response\n".to_string(),
                    }
                }
            }
            None => "Error: Invalid command format\n".to_string(),
        };

        output
            .write_all(reply.as_bytes())
            .await
            .map_err(|e| anyhow!("Failed to write console output: {}", e))?;
        output.flush().await?;
    }

    Ok(())
}
