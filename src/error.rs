// Error types for the playback core
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening or reading a compressed audio source.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognized or corrupt audio container: {0}")]
    Probe(symphonia::core::errors::Error),

    #[error("no decodable audio track in file")]
    NoTrack,

    #[error("failed to create decoder for track: {0}")]
    CreateDecoder(symphonia::core::errors::Error),

    #[error("error while decoding stream: {0}")]
    Read(symphonia::core::errors::Error),
}

/// Errors raised while opening the audio output device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("failed to query output device config: {0}")]
    Config(cpal::DefaultStreamConfigError),

    #[error("unsupported output sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to open output stream: {0}")]
    OpenStream(cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    StartStream(cpal::PlayStreamError),

    #[error("failed to pause output stream: {0}")]
    PauseStream(cpal::PauseStreamError),
}

/// Transport-level error: anything that can make an open request fail.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
