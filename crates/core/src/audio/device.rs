//! Output devices that drain an [`AudioStream`].

use std::sync::Arc;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat as CpalSampleFormat, Stream, StreamConfig,
};
use tracing::{error, info, warn};

use crate::{
    audio::{
        format::{AudioSpec, SampleFormat},
        stream::AudioStream,
    },
    HarnessError, Result,
};

/// Playback endpoint a single stream is bound to for the session lifetime.
pub trait OutputDevice {
    /// Format the device consumes; the bound stream converts into it.
    fn spec(&self) -> AudioSpec;

    /// Attaches `stream` as the device's only source and starts playback.
    fn bind(&mut self, stream: Arc<AudioStream>) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    fn is_paused(&self) -> bool;
}

/// Default system output opened through cpal.
pub struct CpalDevice {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    paused: bool,
}

impl CpalDevice {
    /// Opens the default output device, preferring an `f32` configuration at
    /// the device's default rate and channel count.
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| HarnessError::device("no default output device"))?;
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let default = device
            .default_output_config()
            .map_err(|e| HarnessError::device(format!("failed to query default config: {e}")))?;
        let rate = default.sample_rate();
        let channels = default.channels();

        let preferred = device
            .supported_output_configs()
            .map_err(|e| HarnessError::device(format!("failed to enumerate configs: {e}")))?
            .find(|range| {
                range.sample_format() == CpalSampleFormat::F32
                    && range.channels() == channels
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
            .map(|range| range.with_sample_rate(rate));

        let supported = match preferred {
            Some(config) => config,
            None if default.sample_format() == CpalSampleFormat::F32 => default,
            None => {
                return Err(HarnessError::device(format!(
                    "device `{name}` offers no f32 output (default is {:?})",
                    default.sample_format()
                )))
            }
        };

        let config = supported.config();
        info!(
            device = %name,
            channels = config.channels,
            rate = config.sample_rate.0,
            "opened audio output"
        );

        Ok(Self {
            device,
            config,
            stream: None,
            paused: true,
        })
    }
}

impl OutputDevice for CpalDevice {
    fn spec(&self) -> AudioSpec {
        AudioSpec::new(
            SampleFormat::F32,
            self.config.channels,
            self.config.sample_rate.0,
        )
    }

    fn bind(&mut self, stream: Arc<AudioStream>) -> Result<()> {
        if self.stream.is_some() {
            return Err(HarnessError::device("a stream is already bound to this device"));
        }
        stream.lock()?.set_format(None, Some(self.spec()))?;

        let source = stream;
        let output = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let written = match source.lock() {
                        Ok(mut state) => state.fill_f32(data).unwrap_or_else(|e| {
                            warn!("stream pull failed: {e}");
                            0
                        }),
                        Err(_) => 0,
                    };
                    data[written..].fill(0.0);
                },
                |err| error!("audio output error: {err}"),
                None,
            )
            .map_err(|e| HarnessError::device(format!("failed to build output stream: {e}")))?;

        output
            .play()
            .map_err(|e| HarnessError::device(format!("failed to start output stream: {e}")))?;
        self.stream = Some(output);
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref() {
            stream
                .pause()
                .map_err(|e| HarnessError::device(format!("failed to pause: {e}")))?;
        }
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref() {
            stream
                .play()
                .map_err(|e| HarnessError::device(format!("failed to resume: {e}")))?;
        }
        self.paused = false;
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Device double that never plays; tests pull from the stream by hand.
#[cfg(test)]
pub(crate) struct ManualDevice {
    spec: AudioSpec,
    bound: Option<Arc<AudioStream>>,
    paused: bool,
}

#[cfg(test)]
impl ManualDevice {
    pub(crate) fn new(spec: AudioSpec) -> Self {
        Self {
            spec,
            bound: None,
            paused: true,
        }
    }
}

#[cfg(test)]
impl OutputDevice for ManualDevice {
    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn bind(&mut self, stream: Arc<AudioStream>) -> Result<()> {
        if self.bound.is_some() {
            return Err(HarnessError::device("a stream is already bound to this device"));
        }
        stream.lock()?.set_format(None, Some(self.spec))?;
        self.bound = Some(stream);
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.paused = false;
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}
