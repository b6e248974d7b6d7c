// Command boundary for the presentation layer
// UI event handlers call these on the controlling thread; errors come back
// as display strings ready for the UI

use std::path::PathBuf;

use crate::audio::player::PlayerStatus;
use crate::state::AppState;

/// A transport command emitted by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(PathBuf),
    PauseToggle,
    Stop,
    Close,
}

/// Apply one UI command to the transport.
pub fn dispatch(state: &AppState, command: Command) -> Result<(), String> {
    match command {
        Command::Open(path) => request_open(state, path),
        Command::PauseToggle => request_pause_toggle(state),
        Command::Stop => request_stop(state),
        Command::Close => request_close(state),
    }
}

pub fn request_open(state: &AppState, path: PathBuf) -> Result<(), String> {
    state
        .player
        .open(&path)
        .map_err(|e| format!("Failed to play file: {}", e))?;

    Ok(())
}

pub fn request_pause_toggle(state: &AppState) -> Result<(), String> {
    // A toggle with nothing playing is ignored, not an error
    state
        .player
        .pause_toggle()
        .map_err(|e| format!("Failed to toggle pause: {}", e))?;

    Ok(())
}

pub fn request_stop(state: &AppState) -> Result<(), String> {
    state.player.stop();
    Ok(())
}

pub fn request_close(state: &AppState) -> Result<(), String> {
    state.player.close();
    Ok(())
}

pub fn set_volume(state: &AppState, volume: f32) -> Result<(), String> {
    state.player.set_volume(volume);
    Ok(())
}

/// Snapshot for the UI to refresh button labels and enablement.
pub fn player_status(state: &AppState) -> PlayerStatus {
    state.player.status()
}
