// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod decoder;
pub mod gain;
pub mod output;
pub mod player;

pub use decoder::{AudioFormat, DecoderSession};
pub use player::{PlaybackState, Player, PlayerStatus};
