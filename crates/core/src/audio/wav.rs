use std::{io::Read, path::Path};

use hound::{SampleFormat as WavSampleFormat, WavReader};
use tracing::info;

use crate::{
    audio::format::{AudioSpec, SampleFormat},
    HarnessError, Result,
};

/// Decoded WAV contents kept in their native sample format.
#[derive(Debug, Clone)]
pub struct WavData {
    pub spec: AudioSpec,
    pub bytes: Vec<u8>,
}

impl WavData {
    pub fn new(spec: AudioSpec, bytes: Vec<u8>) -> Self {
        Self { spec, bytes }
    }

    /// Loads a PCM or float WAV file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = Self::from_reader(WavReader::open(path)?)?;
        info!(
            path = %path.display(),
            spec = %data.spec,
            bytes = data.bytes.len(),
            "loaded wav"
        );
        Ok(data)
    }

    pub fn from_reader<R: Read>(mut reader: WavReader<R>) -> Result<Self> {
        let header = reader.spec();
        let mut bytes = Vec::new();
        let format = match (header.sample_format, header.bits_per_sample) {
            (WavSampleFormat::Int, 8) => {
                for sample in reader.samples::<i8>() {
                    bytes.push((sample? as i16 + 128) as u8);
                }
                SampleFormat::U8
            }
            (WavSampleFormat::Int, 16) => {
                for sample in reader.samples::<i16>() {
                    bytes.extend_from_slice(&sample?.to_le_bytes());
                }
                SampleFormat::S16
            }
            (WavSampleFormat::Int, bits @ (24 | 32)) => {
                let shift = 32 - bits as u32;
                for sample in reader.samples::<i32>() {
                    bytes.extend_from_slice(&(sample? << shift).to_le_bytes());
                }
                SampleFormat::S32
            }
            (WavSampleFormat::Float, 32) => {
                for sample in reader.samples::<f32>() {
                    bytes.extend_from_slice(&sample?.to_le_bytes());
                }
                SampleFormat::F32
            }
            (kind, bits) => {
                return Err(HarnessError::msg(format!(
                    "unsupported wav encoding: {bits}-bit {kind:?}"
                )))
            }
        };

        let spec = AudioSpec::new(format, header.channels, header.sample_rate);
        if !spec.is_valid() {
            return Err(HarnessError::InvalidInput("wav header has no channels or rate"));
        }
        Ok(Self::new(spec, bytes))
    }

    /// Playback length at the native rate.
    pub fn duration_seconds(&self) -> f32 {
        self.bytes.len() as f32 / self.spec.bytes_per_second() as f32
    }
}
