//! One-shot conversion of a whole sample buffer between two [`AudioSpec`]s.
//!
//! Sample-rate conversion is delegated to rubato; decoding, encoding and the
//! channel remap are handled here.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::{
    audio::format::{decode_samples, encode_samples, AudioSpec},
    HarnessError, Result,
};

/// Converts `bytes` laid out as `src` into a freshly allocated buffer laid
/// out as `dst`.
pub fn convert_samples(src: &AudioSpec, bytes: &[u8], dst: &AudioSpec) -> Result<Vec<u8>> {
    if !src.is_valid() {
        return Err(HarnessError::InvalidInput("source spec needs channels and a frequency"));
    }
    if !dst.is_valid() {
        return Err(HarnessError::InvalidInput(
            "destination spec needs channels and a frequency",
        ));
    }

    let whole_frames = bytes.len() / src.frame_size() * src.frame_size();
    let samples = decode_samples(src.format, &bytes[..whole_frames]);
    let remapped = remap_channels(&samples, src.channels, dst.channels);
    let resampled = resample_interleaved(&remapped, dst.channels, src.freq, dst.freq)?;

    let mut out = Vec::new();
    encode_samples(dst.format, &resampled, &mut out);
    debug!(
        from = %src,
        to = %dst,
        in_bytes = bytes.len(),
        out_bytes = out.len(),
        "converted sample buffer"
    );
    Ok(out)
}

/// Maps interleaved frames from `from` channels to `to` channels.
///
/// Extra destination channels get a mono source on front left/right and
/// silence otherwise. Dropped source channels fold into the kept ones at half
/// gain; a mono destination averages everything.
pub fn remap_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from as usize, to as usize);
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = vec![0.0_f32; frames * to];
    for (input, output) in samples.chunks_exact(from).zip(out.chunks_exact_mut(to)) {
        if to == 1 {
            output[0] = input.iter().sum::<f32>() / from as f32;
        } else if from == 1 {
            output[0] = input[0];
            output[1] = input[0];
        } else if from < to {
            output[..from].copy_from_slice(input);
        } else {
            output.copy_from_slice(&input[..to]);
            for (extra, &sample) in input[to..].iter().enumerate() {
                output[extra % to] += sample * 0.5;
            }
        }
    }
    out
}

/// Resamples interleaved audio using rubato's polynomial resampler, processing
/// the whole buffer as a single chunk.
pub fn resample_interleaved(
    samples: &[f32],
    channels: u16,
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>> {
    if input_rate == output_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let planar_input = deinterleave(samples, channels);
    let input_frames = planar_input[0].len();
    if input_frames == 0 {
        return Ok(Vec::new());
    }

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Cubic,
        input_frames,
        channels as usize,
    )?;
    let planar_output = resampler.process(&planar_input, None)?;
    Ok(interleave(&planar_output))
}

/// `[L, R, L, R, ...]` -> `[[L, L, ...], [R, R, ...]]`
pub(crate) fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &sample) in planar.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }
    planar
}

/// `[[L, L, ...], [R, R, ...]]` -> `[L, R, L, R, ...]`
pub(crate) fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut interleaved = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for plane in planar {
            interleaved.push(plane[frame]);
        }
    }
    interleaved
}
