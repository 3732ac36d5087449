use crate::{
    communication::run_console,
    config::{create_default_config, init_config},
    controller::{
        controller_service::{Panel, run_controller},
        synchronizer::CommandSynchronizer,
    },
    input::{device, gamepad::GamepadInput, socket::run_gamepad_socket},
    models::MotionState,
    state::{SharedMotion, report_state_changes},
    state_monitor::run_state_monitor,
};

use scara_link::HttpLink;
use std::{path::PathBuf, sync::Arc};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

pub mod commands;
pub mod communication;
pub mod config;
pub mod controller;
pub mod input;
pub mod logging;
pub mod models;
pub mod state;
pub mod state_monitor;

fn should_create_config() -> bool {
    std::env::var("CREATE_CONFIG")
        .map(|val| val == "1" || val.to_lowercase() == "true")
        .unwrap_or(false)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    if should_create_config() {
        create_default_config(None::<PathBuf>)?;
    }

    let (_config_manager, config) = init_config().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Run with CREATE_CONFIG=1 to create a default configuration file.");
        e
    })?;

    let _log_guard = logging::init(&config.logging)?;

    let link = HttpLink::new(
        config.backend.base_url.as_str(),
        config.backend.request_timeout(),
        config.backend.csrf_token.clone(),
    )?;
    info!("Using backend at {}", link.base_url());

    let state = SharedMotion::new(MotionState::new(config.motion.default_speed_percent));
    let synchronizer = Arc::new(CommandSynchronizer::new(
        link,
        state.clone(),
        config.timing.busy_poll(),
    ));
    let panel = Arc::new(Panel::new(
        synchronizer.clone(),
        config.timing.sequence_step(),
    ));

    tokio::spawn(report_state_changes(state.subscribe()));

    let monitor = synchronizer.clone();
    let status_poll = config.timing.status_poll();
    tokio::spawn(async move {
        if let Err(e) = run_state_monitor(monitor, status_poll).await {
            error!("State monitor stopped: {}", e);
        }
    });

    let (command_tx, command_rx) = mpsc::channel(32);
    tokio::spawn(async move {
        if let Err(e) = run_controller(command_rx, panel).await {
            error!("Controller service stopped: {}", e);
        }
    });

    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = run_console(command_tx, stdin, tokio::io::stdout()).await {
            error!("Console stopped: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if config.gamepad.enabled {
        let (feed, pad) = device::feed();
        let socket_path = config.gamepad.socket_path.clone();
        tokio::spawn(async move {
            if let Err(e) = run_gamepad_socket(&socket_path, feed).await {
                error!("Gamepad socket stopped: {}", e);
            }
        });

        let gamepad = GamepadInput::new(
            pad,
            synchronizer.clone(),
            config.gamepad.mapping.clone(),
            config.gamepad_timing(),
        );
        tokio::spawn(gamepad.run(shutdown_rx));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);

    Ok(())
}
