// Gain stage
// Scales decoded 16-bit PCM samples by a volume factor, in place

/// Apply a volume factor to a buffer of interleaved 16-bit samples.
///
/// `volume` is clamped to [0.0, 1.0] before use, so the scaled value always
/// stays inside the i16 range. Rounding rule: truncation toward zero (the
/// behavior of an `as` cast), so `-1` at volume 0.9 becomes `0`, not `-1`.
pub fn apply(samples: &mut [i16], volume: f32) {
    let vol = volume.clamp(0.0, 1.0);

    for sample in samples.iter_mut() {
        *sample = (f32::from(*sample) * vol) as i16;
    }
}
