use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{info, trace, warn};

use crate::{
    audio::{convert_samples, AudioSpec, AudioStream, OutputDevice, WavData},
    config::AudioConfig,
    HarnessError, Result,
};

/// Most recent pull the device made from the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastGet {
    pub additional: usize,
    pub total: usize,
    pub elapsed: Duration,
}

/// Snapshot of stream and session state for the status overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetrics {
    pub paused: bool,
    pub auto_loop: bool,
    pub auto_flush: bool,
    pub queued_bytes: usize,
    pub available_bytes: usize,
    pub available_seconds: f32,
    pub wav_spec: AudioSpec,
    pub src_spec: AudioSpec,
    pub dst_spec: AudioSpec,
    pub last_get: Option<LastGet>,
}

/// Bytes to pull while skipping `seconds` of audio at `speed`, given that the
/// stream runs at `skip_ratio` during the pull.
pub fn skip_byte_count(dst: &AudioSpec, speed: f32, seconds: f32, skip_ratio: f32) -> usize {
    (dst.bytes_per_second() as f32 * ((speed * seconds) / skip_ratio)) as usize
}

/// Keeps the stream fed from the loaded WAV according to the slider targets.
///
/// Every operation is best effort: failures are logged, the operation is
/// abandoned and the caller only learns whether it worked.
pub struct AudioBridge {
    source: WavData,
    stream: Arc<AudioStream>,
    device: Box<dyn OutputDevice>,
    auto_loop: bool,
    auto_flush: bool,
    loop_threshold_seconds: f32,
    skip_ratio: f32,
}

impl AudioBridge {
    /// Creates the stream for `source` and binds it to `device`.
    pub fn new(source: WavData, mut device: Box<dyn OutputDevice>, config: &AudioConfig) -> Result<Self> {
        let stream = Arc::new(AudioStream::new(source.spec, source.spec, config.chunk_frames));
        stream.set_get_callback(|request| {
            trace!(
                additional = request.additional,
                total = request.total,
                "stream pulled"
            );
        })?;
        device.bind(Arc::clone(&stream))?;

        Ok(Self {
            source,
            stream,
            device,
            auto_loop: config.auto_loop,
            auto_flush: config.auto_flush,
            loop_threshold_seconds: config.loop_threshold_seconds,
            skip_ratio: config.skip_ratio,
        })
    }

    pub fn source_spec(&self) -> AudioSpec {
        self.source.spec
    }

    pub fn stream(&self) -> &Arc<AudioStream> {
        &self.stream
    }

    pub fn auto_loop(&self) -> bool {
        self.auto_loop
    }

    pub fn auto_flush(&self) -> bool {
        self.auto_flush
    }

    pub fn toggle_auto_loop(&mut self) {
        self.auto_loop = !self.auto_loop;
        info!(enabled = self.auto_loop, "auto loop toggled");
    }

    pub fn toggle_auto_flush(&mut self) {
        self.auto_flush = !self.auto_flush;
        info!(enabled = self.auto_flush, "auto flush toggled");
    }

    pub fn toggle_pause(&mut self) -> bool {
        let result = if self.device.is_paused() {
            self.device.resume()
        } else {
            self.device.pause()
        };
        match result {
            Ok(()) => {
                info!(paused = self.device.is_paused(), "audio device toggled");
                true
            }
            Err(e) => {
                warn!("Failed to toggle pause: {e}");
                false
            }
        }
    }

    /// Sets the stream's playback-rate multiplier.
    pub fn apply_speed(&self, speed: f32) -> bool {
        match self.stream.lock().and_then(|mut s| s.set_frequency_ratio(speed)) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to set speed {speed}: {e}");
                false
            }
        }
    }

    pub fn clear(&self) -> bool {
        match self.stream.clear() {
            Ok(()) => {
                info!("Cleared audio stream");
                true
            }
            Err(e) => {
                warn!("Failed to clear audio stream: {e}");
                false
            }
        }
    }

    /// Converts the whole source to `channels`/`freq` in its native sample
    /// format and queues it, flushing afterwards when auto-flush is on.
    pub fn refill(&mut self, channels: u16, freq: u32) -> bool {
        let target = AudioSpec::new(self.source.spec.format, channels, freq);
        info!("Converting audio from {} to {}", self.source.spec.freq, target.freq);

        match self.try_refill(target) {
            Ok(()) => {
                info!("Queued audio");
                true
            }
            Err(e) => {
                warn!("Failed to queue audio: {e}");
                false
            }
        }
    }

    fn try_refill(&self, target: AudioSpec) -> Result<()> {
        let converted = convert_samples(&self.source.spec, &self.source.bytes, &target)?;

        let mut stream = self.stream.lock()?;
        stream.set_format(Some(target), None)?;
        stream.put_data(&converted)?;
        if self.auto_flush {
            stream.flush();
        }
        Ok(())
    }

    /// Discards roughly `seconds` of playback, that is `speed * seconds` of
    /// input, by pulling it at a high playback rate. Output already converted
    /// at the current speed is dropped first and counts towards the request.
    /// The previous rate is restored even when the pull fails.
    pub fn skip(&self, seconds: f32) -> bool {
        match self.try_skip(seconds) {
            Ok(()) => {
                info!("Skipped {seconds:.2} seconds");
                true
            }
            Err(e) => {
                warn!("Failed to skip: {e}");
                false
            }
        }
    }

    fn try_skip(&self, seconds: f32) -> Result<()> {
        let mut stream = self.stream.lock()?;
        let speed = stream.frequency_ratio();
        let dst = stream.dst_spec();

        let dropped = stream.drop_pending((seconds * dst.freq as f32) as usize);
        let remaining = seconds - dropped as f32 / dst.freq as f32;

        stream.set_frequency_ratio(self.skip_ratio)?;

        let num_bytes = skip_byte_count(&dst, speed, remaining, self.skip_ratio);
        let pulled = if num_bytes == 0 {
            Ok(0)
        } else {
            let mut scratch: Vec<u8> = Vec::new();
            match scratch.try_reserve_exact(num_bytes) {
                Ok(()) => {
                    scratch.resize(num_bytes, 0);
                    stream.get_data_bounded(&mut scratch)
                }
                Err(_) => Err(HarnessError::msg(format!(
                    "could not allocate {num_bytes} bytes to skip"
                ))),
            }
        };

        let restored = stream.set_frequency_ratio(speed);
        drop(stream);

        let discarded = pulled?;
        restored?;
        trace!(dropped, requested = num_bytes, discarded, "skip pulled");
        Ok(())
    }

    /// Output still obtainable from the stream, in seconds of device audio.
    pub fn available_seconds(&self) -> Result<f32> {
        let stream = self.stream.lock()?;
        Ok(seconds_of(stream.available_bytes(), &stream.dst_spec()))
    }

    /// Auto-loop policy: true when looping is on and the stream holds less
    /// than the threshold of output. Level triggered, so a caller polling
    /// faster than playback drains may refill more than once.
    pub fn needs_refill(&self) -> bool {
        if !self.auto_loop {
            return false;
        }
        match self.available_seconds() {
            Ok(available) => available < self.loop_threshold_seconds,
            Err(e) => {
                warn!("Failed to read stream backlog: {e}");
                false
            }
        }
    }

    /// Reads every counter the overlay shows in one pass under the stream lock.
    pub fn metrics(&self) -> Result<StreamMetrics> {
        let stream = self.stream.lock()?;
        let dst_spec = stream.dst_spec();
        let available_bytes = stream.available_bytes();
        let now = Instant::now();

        Ok(StreamMetrics {
            paused: self.device.is_paused(),
            auto_loop: self.auto_loop,
            auto_flush: self.auto_flush,
            queued_bytes: stream.queued_bytes(),
            available_bytes,
            available_seconds: seconds_of(available_bytes, &dst_spec),
            wav_spec: self.source.spec,
            src_spec: stream.src_spec(),
            dst_spec,
            last_get: stream.last_get_request().map(|request| LastGet {
                additional: request.additional,
                total: request.total,
                elapsed: now.saturating_duration_since(request.at),
            }),
        })
    }
}

fn seconds_of(bytes: usize, spec: &AudioSpec) -> f32 {
    match spec.bytes_per_second() {
        0 => 0.0,
        per_second => bytes as f32 / per_second as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{device::ManualDevice, SampleFormat};

    fn tone(spec: AudioSpec, seconds: f32) -> WavData {
        let frames = (spec.freq as f32 * seconds) as usize;
        let mut bytes = Vec::new();
        for i in 0..frames * spec.channels as usize {
            bytes.extend_from_slice(&(((i % 64) as i16 - 32) * 256).to_le_bytes());
        }
        WavData::new(spec, bytes)
    }

    fn config(auto_loop: bool, auto_flush: bool) -> AudioConfig {
        AudioConfig {
            auto_loop,
            auto_flush,
            chunk_frames: 64,
            ..AudioConfig::default()
        }
    }

    fn bridge(source: WavData, device_spec: AudioSpec, config: AudioConfig) -> AudioBridge {
        AudioBridge::new(source, Box::new(ManualDevice::new(device_spec)), &config).unwrap()
    }

    #[test]
    fn skip_bytes_cover_seconds_at_previous_rate() {
        let dst = AudioSpec::new(SampleFormat::F32, 2, 48_000);
        assert_eq!(skip_byte_count(&dst, 1.0, 100.0, 100.0), 384_000);
        assert_eq!(skip_byte_count(&dst, 2.0, 100.0, 100.0), 768_000);
        assert_eq!(skip_byte_count(&dst, 1.0, 1.0, 100.0), 3_840);
    }

    #[test]
    fn refill_converts_to_chosen_channels() {
        let wav = AudioSpec::new(SampleFormat::S16, 2, 44_100);
        let device = AudioSpec::new(SampleFormat::F32, 2, 48_000);
        let mut bridge = bridge(tone(wav, 1.0), device, config(false, false));

        assert!(bridge.refill(6, 44_100));

        let metrics = bridge.metrics().unwrap();
        assert_eq!(metrics.src_spec, AudioSpec::new(SampleFormat::S16, 6, 44_100));
        assert_eq!(metrics.dst_spec, device);
        assert_eq!(metrics.queued_bytes, 44_100 * 12);
    }

    #[test]
    fn refill_failure_leaves_stream_untouched() {
        let wav = AudioSpec::new(SampleFormat::S16, 2, 44_100);
        let mut bridge = bridge(tone(wav, 0.1), wav, config(false, false));

        assert!(!bridge.refill(0, 44_100));
        let metrics = bridge.metrics().unwrap();
        assert_eq!(metrics.queued_bytes, 0);
        assert_eq!(metrics.src_spec, wav);
    }

    /// Slack for skip amounts: one output frame at the skip rate plus one
    /// resampler chunk of input, in S16 mono bytes.
    const SKIP_TOLERANCE: usize = (100 + 64) * 2;

    /// Queues 30 s of 8 kHz mono, plays `played_frames` at `speed`, then
    /// skips `seconds`. Returns the queued input bytes the skip removed.
    fn skip_after_playback(speed: f32, played_frames: usize, seconds: f32) -> usize {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let device = AudioSpec::new(SampleFormat::F32, 1, 8_000);
        let mut bridge = bridge(tone(wav, 30.0), device, config(false, true));
        assert!(bridge.refill(1, 8_000));
        assert!(bridge.apply_speed(speed));

        let mut out = vec![0; played_frames * device.frame_size()];
        let played = bridge.stream().lock().unwrap().get_data(&mut out).unwrap();
        assert_eq!(played, out.len());

        let before = bridge.stream().queued_bytes().unwrap();
        assert!(bridge.skip(seconds));
        assert_eq!(bridge.stream().lock().unwrap().frequency_ratio(), speed);
        before - bridge.stream().queued_bytes().unwrap()
    }

    fn assert_close(actual: usize, expected: usize) {
        assert!(
            actual.abs_diff(expected) <= SKIP_TOLERANCE,
            "discarded {actual} bytes, expected about {expected}"
        );
    }

    #[test]
    fn skip_discards_and_restores_rate() {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let device = AudioSpec::new(SampleFormat::F32, 1, 8_000);
        let mut bridge = bridge(tone(wav, 2.0), device, config(false, true));
        assert!(bridge.refill(1, 8_000));
        let before = bridge.metrics().unwrap().queued_bytes;

        assert!(bridge.skip(1.0));

        let after = bridge.metrics().unwrap().queued_bytes;
        assert_close(before - after, wav.bytes_per_second());
        assert_eq!(bridge.stream().lock().unwrap().frequency_ratio(), 1.0);
    }

    #[test]
    fn skip_after_playback_consumes_one_second() {
        assert_close(skip_after_playback(1.0, 1_000, 1.0), 16_000);
    }

    #[test]
    fn skip_at_slow_speed_consumes_scaled_input() {
        assert_close(skip_after_playback(0.2, 1_000, 1.0), 3_200);
    }

    #[test]
    fn skip_leaves_no_fast_output_behind() {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let device = AudioSpec::new(SampleFormat::F32, 1, 8_000);
        let mut bridge = bridge(tone(wav, 30.0), device, config(false, true));
        assert!(bridge.refill(1, 8_000));
        let mut out = vec![0; 1_000 * device.frame_size()];
        bridge.stream().lock().unwrap().get_data(&mut out).unwrap();

        assert!(bridge.skip(0.5));

        // Nothing stays parked from the fast pull.
        let state = bridge.stream().lock().unwrap();
        let from_input = state.queued_bytes() / wav.frame_size() * device.frame_size();
        assert_eq!(state.available_bytes(), from_input);
    }

    #[test]
    fn skip_on_empty_stream_still_restores_rate() {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let bridge = bridge(tone(wav, 0.1), wav, config(false, false));
        assert!(bridge.apply_speed(2.5));

        assert!(bridge.skip(0.0));
        assert_eq!(bridge.stream().lock().unwrap().frequency_ratio(), 2.5);
    }

    #[test]
    fn auto_loop_refills_only_when_low() {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let device = AudioSpec::new(SampleFormat::F32, 1, 8_000);
        let mut bridge = bridge(tone(wav, 6.0), device, config(true, false));

        assert!(bridge.needs_refill());
        assert!(bridge.refill(1, 8_000));
        assert!((bridge.available_seconds().unwrap() - 6.0).abs() < 0.01);
        assert!(bridge.needs_refill());

        assert!(bridge.refill(1, 8_000));
        assert!(bridge.available_seconds().unwrap() >= 10.0);
        assert!(!bridge.needs_refill());
    }

    #[test]
    fn disabled_auto_loop_never_refills() {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let mut bridge = bridge(tone(wav, 1.0), wav, config(false, false));
        assert!(!bridge.needs_refill());

        bridge.toggle_auto_loop();
        assert!(bridge.needs_refill());
    }

    #[test]
    fn pause_toggles_device() {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let mut bridge = bridge(tone(wav, 0.1), wav, config(false, false));
        assert!(!bridge.metrics().unwrap().paused);

        assert!(bridge.toggle_pause());
        assert!(bridge.metrics().unwrap().paused);
        assert!(bridge.toggle_pause());
        assert!(!bridge.metrics().unwrap().paused);
    }

    #[test]
    fn metrics_report_last_pull() {
        let wav = AudioSpec::new(SampleFormat::S16, 1, 8_000);
        let bridge = bridge(tone(wav, 0.1), wav, config(false, false));
        assert!(bridge.metrics().unwrap().last_get.is_none());

        let mut out = vec![0_u8; 32];
        bridge.stream().lock().unwrap().get_data(&mut out).unwrap();

        let last = bridge.metrics().unwrap().last_get.unwrap();
        assert_eq!(last.total, 32);
        assert_eq!(last.additional, 32);
    }
}
