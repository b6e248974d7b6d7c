// Tonearm - streaming decode-and-playback core for a desktop audio player
// Module declarations
pub mod audio;
pub mod commands;
pub mod error;
pub mod settings;
pub mod state;

pub use audio::decoder::AudioFormat;
pub use audio::player::{PlaybackState, Player, PlayerStatus, DEFAULT_VOLUME};
pub use commands::Command;
pub use error::{DecodeError, DeviceError, PlayerError};
pub use settings::PlayerSettings;
pub use state::AppState;
