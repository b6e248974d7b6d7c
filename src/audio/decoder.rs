// Audio decoder using Symphonia
// Streams a compressed audio file into interleaved 16-bit PCM frames

use symphonia::core::audio::{Channels, SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use log::warn;
use std::fs::File;
use std::path::Path;

use crate::error::DecodeError;

/// Stream format discovered while probing a compressed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Corrupt packets tolerated in a row before a read fails for good.
const MAX_DECODE_RETRIES: usize = 3;

/// One live decode of one compressed file.
///
/// Owns the format reader, the codec decoder, and the open file. Dropping
/// the session releases all of them.
pub struct DecoderSession {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    sample_buf: SampleBuffer<i16>,
    cursor: usize,
    finished: bool,
}

impl std::fmt::Debug for DecoderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderSession")
            .field("track_id", &self.track_id)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("cursor", &self.cursor)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl DecoderSession {
    /// Open an audio file and prepare for streaming decode.
    ///
    /// Probes the container, picks the first decodable track, and decodes
    /// the first packet up front. The eager decode proves the track really
    /// produces samples and sizes the sample buffer, so the audio thread
    /// does not allocate on its first pull.
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let file = File::open(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint using the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        // Probe the media source
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(DecodeError::Probe)?;

        let format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channel_spec = track
            .codec_params
            .channels
            .unwrap_or(Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let channels = channel_spec.count() as u16;

        // Create decoder for the track
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(DecodeError::CreateDecoder)?;

        let mut session = Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: SampleBuffer::new(0, SignalSpec::new(sample_rate, channel_spec)),
            cursor: 0,
            finished: false,
        };

        #[cfg(test)]
        session_count::LIVE.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        session.refill()?;

        Ok(session)
    }

    /// Get the discovered sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the discovered channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get the discovered format for device negotiation
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Fill `out` with interleaved 16-bit samples, returning frames written.
    ///
    /// Returns fewer frames than requested (eventually zero) at end of
    /// stream; that is not an error, and later calls keep returning zero.
    /// `out.len()` should be a multiple of the channel count.
    pub fn read(&mut self, out: &mut [i16]) -> Result<usize, DecodeError> {
        let channels = self.channels as usize;
        let mut written = 0;

        while written < out.len() {
            if self.cursor == self.sample_buf.len() && (self.finished || !self.refill()?) {
                break;
            }

            let available = &self.sample_buf.samples()[self.cursor..];
            let n = available.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&available[..n]);
            self.cursor += n;
            written += n;
        }

        Ok(written / channels)
    }

    /// Decode packets until one yields samples for the selected track.
    /// Returns false at end of stream.
    fn refill(&mut self) -> Result<bool, DecodeError> {
        let mut retries = 0;

        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(DecodeError::Read(e)),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }

                    // Codecs allocate their output from one max-frames
                    // parameter, so this reallocates once at most.
                    if self.sample_buf.capacity() < decoded.frames() * self.channels as usize {
                        self.sample_buf =
                            SampleBuffer::new(decoded.capacity() as u64, *decoded.spec());
                    }

                    self.sample_buf.copy_interleaved_ref(decoded);
                    self.cursor = 0;
                    return Ok(true);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    retries += 1;
                    if retries > MAX_DECODE_RETRIES {
                        return Err(DecodeError::Read(SymphoniaError::DecodeError(e)));
                    }
                    warn!("skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(DecodeError::Read(e)),
            }
        }
    }
}

#[cfg(test)]
impl Drop for DecoderSession {
    fn drop(&mut self) {
        session_count::LIVE.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Live-session accounting for tests that assert on resource lifetimes.
#[cfg(test)]
pub(crate) mod session_count {
    use parking_lot::{Mutex, MutexGuard};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static LIVE: AtomicUsize = AtomicUsize::new(0);
    static SERIAL: Mutex<()> = Mutex::new(());

    pub fn live() -> usize {
        LIVE.load(Ordering::SeqCst)
    }

    /// Serializes every test that opens sessions, so the counter is stable
    /// while a test is asserting on it.
    pub fn lock() -> MutexGuard<'static, ()> {
        SERIAL.lock()
    }
}
