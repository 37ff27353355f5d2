use std::fmt;

use serde::{Deserialize, Serialize};

/// Sample encodings the stream understands. Multi-byte formats are little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    S8,
    S16,
    S32,
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::S8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "U8",
            SampleFormat::S8 => "S8",
            SampleFormat::S16 => "S16LE",
            SampleFormat::S32 => "S32LE",
            SampleFormat::F32 => "F32LE",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Format / channel count / frequency triple describing a block of audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    pub format: SampleFormat,
    pub channels: u16,
    pub freq: u32,
}

impl AudioSpec {
    pub fn new(format: SampleFormat, channels: u16, freq: u32) -> Self {
        Self {
            format,
            channels,
            freq,
        }
    }

    /// Size in bytes of one sample for every channel.
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Bytes needed to hold one second of audio in this spec.
    pub fn bytes_per_second(&self) -> usize {
        self.frame_size() * self.freq as usize
    }

    pub fn is_valid(&self) -> bool {
        self.channels > 0 && self.freq > 0
    }
}

impl fmt::Display for AudioSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.format,
            channel_name(self.channels),
            self.freq
        )
    }
}

/// Human readable speaker layout for a channel count.
pub fn channel_name(channels: u16) -> &'static str {
    match channels {
        1 => "Mono",
        2 => "Stereo",
        3 => "2.1",
        4 => "Quad",
        5 => "4.1",
        6 => "5.1",
        7 => "6.1",
        8 => "7.1",
        _ => "?",
    }
}

/// Decodes raw bytes into normalised `f32` samples. A trailing partial sample
/// is ignored.
pub fn decode_samples(format: SampleFormat, bytes: &[u8]) -> Vec<f32> {
    let width = format.bytes_per_sample();
    bytes
        .chunks_exact(width)
        .map(|raw| match format {
            SampleFormat::U8 => (raw[0] as f32 - 128.0) / 128.0,
            SampleFormat::S8 => raw[0] as i8 as f32 / 128.0,
            SampleFormat::S16 => i16::from_le_bytes([raw[0], raw[1]]) as f32 / 32_768.0,
            SampleFormat::S32 => {
                i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32 / 2_147_483_648.0
            }
            SampleFormat::F32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        })
        .collect()
}

/// Appends `samples` to `out` in the requested encoding, clipping to [-1, 1].
pub fn encode_samples(format: SampleFormat, samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * format.bytes_per_sample());
    for &sample in samples {
        let sample = sample.clamp(-1.0, 1.0);
        match format {
            SampleFormat::U8 => out.push((sample * 127.0 + 128.0).round() as u8),
            SampleFormat::S8 => out.push((sample * 127.0).round() as i8 as u8),
            SampleFormat::S16 => {
                out.extend_from_slice(&((sample * 32_767.0).round() as i16).to_le_bytes())
            }
            SampleFormat::S32 => out.extend_from_slice(
                &((sample as f64 * 2_147_483_647.0).round() as i32).to_le_bytes(),
            ),
            SampleFormat::F32 => out.extend_from_slice(&sample.to_le_bytes()),
        }
    }
}
