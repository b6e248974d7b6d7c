// Audio output using cpal
// Opens the device at the decoder's discovered format and drives a
// pull-based real-time callback

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};
use log::{info, warn};

use crate::audio::decoder::AudioFormat;
use crate::error::DeviceError;

/// Frames per device buffer request.
const BUFFER_FRAMES: u32 = 4096;

/// A running output stream.
///
/// Dropping the handle closes the stream. cpal's close is synchronous with
/// respect to the callback thread: once drop returns, the data callback can
/// no longer be running, so anything the callback owns (the decoder session
/// inside the pull source) is safe to free afterwards.
pub struct AudioOutput {
    stream: Stream,
    format: AudioFormat,
}

impl AudioOutput {
    /// Open the default output device at `format` and begin delivery.
    ///
    /// `pull` is invoked from the device's real-time thread to fill
    /// interleaved 16-bit samples; it returns the number of frames it
    /// produced. Whatever the pull source leaves silent stays silent.
    pub fn start<F>(format: AudioFormat, pull: F) -> Result<Self, DeviceError>
    where
        F: FnMut(&mut [i16]) -> usize + Send + 'static,
    {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;

        let device_config = device.default_output_config().map_err(DeviceError::Config)?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Fixed(BUFFER_FRAMES),
        };

        info!(
            "opening output stream: {} Hz, {} ch, device format {:?}",
            format.sample_rate,
            format.channels,
            device_config.sample_format()
        );

        // Feed the device in its native sample type, converting from the
        // decoder's 16-bit samples
        let stream = match device_config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32, F>(&device, &config, pull)?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16, F>(&device, &config, pull)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16, F>(&device, &config, pull)?,
            other => return Err(DeviceError::UnsupportedFormat(other)),
        };

        stream.play().map_err(DeviceError::StartStream)?;

        Ok(Self { stream, format })
    }

    fn build_stream<T, F>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut pull: F,
    ) -> Result<Stream, DeviceError>
    where
        T: cpal::SizedSample + cpal::FromSample<i16>,
        F: FnMut(&mut [i16]) -> usize + Send + 'static,
    {
        let channels = config.channels as usize;
        // Reused across invocations so the callback never allocates. Sized
        // in whole frames, so chunk boundaries stay frame-aligned.
        let mut scratch = vec![0i16; BUFFER_FRAMES as usize * channels];

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(scratch.len()) {
                        let samples = &mut scratch[..chunk.len()];
                        pull(samples);
                        for (out, &sample) in chunk.iter_mut().zip(samples.iter()) {
                            *out = T::from_sample(sample);
                        }
                    }
                },
                move |err| {
                    warn!("audio output stream error: {}", err);
                },
                None,
            )
            .map_err(DeviceError::OpenStream)?;

        Ok(stream)
    }

    /// Suspend delivery; the device stops invoking the callback.
    pub fn pause(&self) -> Result<(), DeviceError> {
        self.stream.pause().map_err(DeviceError::PauseStream)
    }

    /// Resume delivery after a pause.
    pub fn resume(&self) -> Result<(), DeviceError> {
        self.stream.play().map_err(DeviceError::StartStream)
    }

    /// Get the negotiated stream format
    pub fn format(&self) -> AudioFormat {
        self.format
    }
}
