// Transport controller
// Serializes open/pause/stop against the stream lifecycle and owns the
// state shared with the real-time callback

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::audio::decoder::{AudioFormat, DecoderSession};
use crate::audio::gain;
use crate::audio::output::AudioOutput;
use crate::error::PlayerError;

/// Deliberately quiet startup volume.
pub const DEFAULT_VOLUME: f32 = 0.04;

/// Where the transport currently is.
///
/// `Stopping` is transient: the audio callback can observe it mid-teardown,
/// but the status surface never reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Idle = 0,
    Playing = 1,
    Paused = 2,
    Stopping = 3,
}

impl PlaybackState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Stopping,
            _ => PlaybackState::Idle,
        }
    }
}

/// State shared between the controlling thread and the audio callback.
/// Plain atomics: the callback never locks and never sees a torn value.
struct SharedState {
    state: AtomicU8,
    volume_bits: AtomicU32,
    decode_fault: AtomicBool,
}

impl SharedState {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Idle as u8),
            volume_bits: AtomicU32::new(DEFAULT_VOLUME.to_bits()),
            decode_fault: AtomicBool::new(false),
        }
    }

    fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_playback_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// Snapshot of the transport for the UI to poll.
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub track: Option<PathBuf>,
    pub format: Option<AudioFormat>,
    pub last_error: Option<String>,
}

struct ActivePlayback {
    output: AudioOutput,
    track: PathBuf,
}

/// The transport controller.
///
/// All methods take `&self` and may be called from any non-real-time
/// thread; transport operations serialize on an internal lock the audio
/// callback never touches.
pub struct Player {
    shared: Arc<SharedState>,
    active: Mutex<Option<ActivePlayback>>,
    last_error: Mutex<Option<String>>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedState::new()),
            active: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Open a file and start playing it, tearing down any current playback
    /// first. On failure the transport is left Idle with nothing live.
    pub fn open(&self, path: &Path) -> Result<AudioFormat, PlayerError> {
        let mut active = self.active.lock();
        Self::teardown(&self.shared, &mut active);

        let session = match DecoderSession::open(path) {
            Ok(session) => session,
            Err(e) => return Err(self.record(e.into())),
        };
        let format = session.format();

        self.shared.decode_fault.store(false, Ordering::Relaxed);

        // If the device open fails the pull source is dropped here, and the
        // session inside it goes with it; nothing stays half-started.
        let pull = pull_source(session, Arc::clone(&self.shared));
        let output = match AudioOutput::start(format, pull) {
            Ok(output) => output,
            Err(e) => return Err(self.record(e.into())),
        };

        self.shared.set_playback_state(PlaybackState::Playing);
        *active = Some(ActivePlayback {
            output,
            track: path.to_path_buf(),
        });
        *self.last_error.lock() = None;

        info!(
            "playing {} ({} Hz, {} ch)",
            path.display(),
            format.sample_rate,
            format.channels
        );
        Ok(format)
    }

    /// Toggle between Playing and Paused. Ignored in Idle; returns whether
    /// a toggle happened.
    pub fn pause_toggle(&self) -> Result<bool, PlayerError> {
        let active = self.active.lock();
        let Some(playback) = active.as_ref() else {
            debug!("pause toggle ignored: nothing playing");
            return Ok(false);
        };

        match self.shared.playback_state() {
            PlaybackState::Playing => {
                playback.output.pause().map_err(|e| self.record(e.into()))?;
                self.shared.set_playback_state(PlaybackState::Paused);
            }
            PlaybackState::Paused => {
                playback.output.resume().map_err(|e| self.record(e.into()))?;
                self.shared.set_playback_state(PlaybackState::Playing);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Stop playback and release the decoder. No-op when already Idle.
    pub fn stop(&self) {
        let mut active = self.active.lock();
        Self::teardown(&self.shared, &mut active);
    }

    /// Stop and release everything held by the transport; called when the
    /// application shuts down.
    pub fn close(&self) {
        self.stop();
        info!("audio closed");
    }

    /// Set playback volume, clamped to [0.0, 1.0]. Takes effect on the next
    /// callback invocation.
    pub fn set_volume(&self, volume: f32) {
        self.shared.set_volume(volume);
    }

    /// Get the current volume
    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    /// Poll the transport state, current track, negotiated format, and the
    /// latest error (including decode faults flagged by the audio thread).
    pub fn status(&self) -> PlayerStatus {
        let active = self.active.lock();

        let state = match self.shared.playback_state() {
            PlaybackState::Stopping => PlaybackState::Idle,
            state => state,
        };

        let last_error = if self.shared.decode_fault.load(Ordering::Relaxed) {
            Some("decode failed mid-stream; output muted".to_string())
        } else {
            self.last_error.lock().clone()
        };

        PlayerStatus {
            state,
            track: active.as_ref().map(|a| a.track.clone()),
            format: active.as_ref().map(|a| a.output.format()),
            last_error,
        }
    }

    /// Mark-stopping, close the stream, release the decoder, go Idle.
    ///
    /// Setting `Stopping` first makes the callback emit silence on its very
    /// next invocation; dropping the output then blocks until the device has
    /// retired the callback, so the decoder session inside it is never freed
    /// mid-read.
    fn teardown(shared: &SharedState, active: &mut Option<ActivePlayback>) {
        let Some(playback) = active.take() else {
            return;
        };

        shared.set_playback_state(PlaybackState::Stopping);
        drop(playback);
        shared.set_playback_state(PlaybackState::Idle);
        debug!("playback torn down");
    }

    fn record(&self, err: PlayerError) -> PlayerError {
        *self.last_error.lock() = Some(err.to_string());
        err
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the pull source the output callback drives: state check first,
/// then decode, gain, and silence for whatever is left of the buffer.
fn pull_source(
    mut session: DecoderSession,
    shared: Arc<SharedState>,
) -> impl FnMut(&mut [i16]) -> usize + Send + 'static {
    let channels = session.channels() as usize;

    move |out: &mut [i16]| {
        // Anything but Playing means silence, without touching the decoder.
        if shared.playback_state() != PlaybackState::Playing {
            out.fill(0);
            return 0;
        }

        let frames = match session.read(out) {
            Ok(frames) => frames,
            Err(_) => {
                // Cannot surface an error from the device thread; flag it
                // for the next status poll and go quiet.
                shared.decode_fault.store(true, Ordering::Relaxed);
                0
            }
        };

        let filled = frames * channels;
        gain::apply(&mut out[..filled], shared.volume());
        out[filled..].fill(0);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::session_count;
    use crate::audio::fixtures;
    use crate::error::{DecodeError, PlayerError};

    #[test]
    fn test_default_volume_is_quiet() {
        let player = Player::new();
        assert!((player.volume() - DEFAULT_VOLUME).abs() < f32::EPSILON);
    }

    #[test]
    fn test_volume_is_clamped() {
        let player = Player::new();
        player.set_volume(2.5);
        assert_eq!(player.volume(), 1.0);
        player.set_volume(-0.5);
        assert_eq!(player.volume(), 0.0);
        player.set_volume(0.3);
        assert_eq!(player.volume(), 0.3);
    }

    #[test]
    fn test_pause_toggle_ignored_when_idle() {
        let player = Player::new();
        assert!(!player.pause_toggle().unwrap());
        assert_eq!(player.status().state, PlaybackState::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let player = Player::new();
        player.stop();
        player.stop();
        let status = player.status();
        assert_eq!(status.state, PlaybackState::Idle);
        assert!(status.track.is_none());
        assert!(status.format.is_none());
    }

    #[test]
    fn test_open_missing_file_stays_idle() {
        let player = Player::new();
        let err = player.open(Path::new("/nonexistent/missing.mp3")).unwrap_err();
        assert!(matches!(
            err,
            PlayerError::Decode(DecodeError::Open { .. })
        ));

        let status = player.status();
        assert_eq!(status.state, PlaybackState::Idle);
        assert!(status.track.is_none());
        assert!(status.last_error.is_some());
    }

    #[test]
    fn test_pull_source_silent_unless_playing() {
        let _serial = session_count::lock();
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::wav(dir.path(), "tone.wav", 44100, 2, 2048);

        let session = DecoderSession::open(&path).unwrap();
        let shared = Arc::new(SharedState::new());
        let mut pull = pull_source(session, Arc::clone(&shared));

        // Idle: silence, decoder untouched
        let mut buf = vec![123i16; 512];
        assert_eq!(pull(&mut buf), 0);
        assert!(buf.iter().all(|&s| s == 0));

        // Playing at unity volume: real frames come through
        shared.set_playback_state(PlaybackState::Playing);
        shared.set_volume(1.0);
        assert_eq!(pull(&mut buf), 256);
        assert!(buf.iter().any(|&s| s != 0));

        // Paused again: silence
        shared.set_playback_state(PlaybackState::Paused);
        assert_eq!(pull(&mut buf), 0);
        assert!(buf.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_pull_source_applies_volume() {
        let _serial = session_count::lock();
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::wav(dir.path(), "tone.wav", 44100, 2, 2048);

        let session = DecoderSession::open(&path).unwrap();
        let shared = Arc::new(SharedState::new());
        shared.set_playback_state(PlaybackState::Playing);
        shared.set_volume(0.0);

        let mut pull = pull_source(session, Arc::clone(&shared));
        let mut buf = vec![123i16; 512];

        // Zero volume still pulls frames, but every sample scales to zero
        assert_eq!(pull(&mut buf), 256);
        assert!(buf.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_pull_source_end_of_stream_keeps_state() {
        let _serial = session_count::lock();
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::wav(dir.path(), "short.wav", 44100, 2, 64);

        let session = DecoderSession::open(&path).unwrap();
        let shared = Arc::new(SharedState::new());
        shared.set_playback_state(PlaybackState::Playing);
        shared.set_volume(1.0);

        let mut pull = pull_source(session, Arc::clone(&shared));
        let mut buf = vec![0i16; 256 * 2];

        // First pull drains the whole short file
        assert_eq!(pull(&mut buf), 64);

        // Past the end: silence, but the transport does not go Idle on its
        // own -- stopping is the controller's decision
        assert_eq!(pull(&mut buf), 0);
        assert!(buf.iter().all(|&s| s == 0));
        assert_eq!(shared.playback_state(), PlaybackState::Playing);
    }

    #[test]
    fn test_swapping_sources_leaves_one_session() {
        let _serial = session_count::lock();
        let dir = tempfile::tempdir().unwrap();
        let path_a = fixtures::wav(dir.path(), "a.wav", 44100, 2, 64);
        let path_b = fixtures::wav(dir.path(), "b.wav", 44100, 2, 64);

        let shared = Arc::new(SharedState::new());
        let before = session_count::live();

        let source_a = pull_source(DecoderSession::open(&path_a).unwrap(), Arc::clone(&shared));
        assert_eq!(session_count::live(), before + 1);

        // The old source must be fully dropped before the next one exists,
        // mirroring the controller's stop-before-open ordering
        drop(source_a);
        let source_b = pull_source(DecoderSession::open(&path_b).unwrap(), Arc::clone(&shared));
        assert_eq!(session_count::live(), before + 1);

        drop(source_b);
        assert_eq!(session_count::live(), before);
    }

    #[test]
    #[ignore = "needs a real audio output device"]
    fn test_open_play_pause_stop_on_device() {
        let _serial = session_count::lock();
        let dir = tempfile::tempdir().unwrap();
        let path_a = fixtures::wav(dir.path(), "a.wav", 44100, 2, 44100);
        let path_b = fixtures::wav(dir.path(), "b.wav", 44100, 2, 44100);
        let before = session_count::live();

        let player = Player::new();
        let format = player.open(&path_a).unwrap();
        assert_eq!(
            format,
            AudioFormat {
                sample_rate: 44100,
                channels: 2
            }
        );
        assert_eq!(player.status().state, PlaybackState::Playing);

        assert!(player.pause_toggle().unwrap());
        assert_eq!(player.status().state, PlaybackState::Paused);
        assert!(player.pause_toggle().unwrap());
        assert_eq!(player.status().state, PlaybackState::Playing);

        // Switching tracks without an explicit stop leaves exactly one
        // live session
        player.open(&path_b).unwrap();
        assert_eq!(session_count::live(), before + 1);
        assert_eq!(player.status().track.as_deref(), Some(path_b.as_path()));

        player.stop();
        assert_eq!(player.status().state, PlaybackState::Idle);
        assert_eq!(session_count::live(), before);

        player.stop();
        assert_eq!(player.status().state, PlaybackState::Idle);
    }
}
