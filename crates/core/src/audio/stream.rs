use std::{
    collections::VecDeque,
    fmt,
    sync::{Mutex, MutexGuard},
    time::Instant,
};

use rubato::{FastFixedOut, PolynomialDegree, Resampler};
use tracing::{debug, trace};

use crate::{
    audio::{
        convert::{deinterleave, interleave, remap_channels},
        format::{decode_samples, encode_samples, AudioSpec},
    },
    HarnessError, Result,
};

/// Bounds of the playback-rate multiplier.
pub const MIN_FREQUENCY_RATIO: f32 = 0.01;
pub const MAX_FREQUENCY_RATIO: f32 = 100.0;

/// Relative-ratio bound handed to the resampler. Slightly wider than the
/// clamp so the extremes survive float rounding.
const RESAMPLER_RATIO_BOUND: f64 = MAX_FREQUENCY_RATIO as f64 * 1.01;

/// Observer invoked every time output is pulled from the stream.
pub type GetCallback = Box<dyn FnMut(&GetRequest) + Send>;

/// Record of a single pull from the stream.
#[derive(Debug, Clone, Copy)]
pub struct GetRequest {
    pub at: Instant,
    /// Bytes requested beyond what was already available.
    pub additional: usize,
    /// Bytes requested in total.
    pub total: usize,
}

/// Format-converting, rate-adjustable audio stream.
///
/// Producers push blocks of audio in any [`AudioSpec`]; the consumer pulls
/// audio in the destination spec. Every operation goes through [`lock`], so
/// a caller that needs several steps to happen atomically holds the guard
/// across them.
///
/// [`lock`]: AudioStream::lock
pub struct AudioStream {
    state: Mutex<StreamState>,
}

impl AudioStream {
    pub fn new(src: AudioSpec, dst: AudioSpec, chunk_frames: usize) -> Self {
        Self {
            state: Mutex::new(StreamState::new(src, dst, chunk_frames)),
        }
    }

    /// Exclusive access to the stream internals.
    pub fn lock(&self) -> Result<MutexGuard<'_, StreamState>> {
        self.state
            .lock()
            .map_err(|_| HarnessError::msg("audio stream has been poisoned"))
    }

    pub fn set_get_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(&GetRequest) + Send + 'static,
    {
        self.lock()?.get_callback = Some(Box::new(callback));
        Ok(())
    }

    pub fn put_data(&self, bytes: &[u8]) -> Result<()> {
        self.lock()?.put_data(bytes)
    }

    pub fn flush(&self) -> Result<()> {
        self.lock()?.flush();
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    pub fn queued_bytes(&self) -> Result<usize> {
        Ok(self.lock()?.queued_bytes())
    }

    pub fn available_bytes(&self) -> Result<usize> {
        Ok(self.lock()?.available_bytes())
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream").finish_non_exhaustive()
    }
}

/// Queued input that shares one spec.
struct Block {
    spec: AudioSpec,
    samples: Vec<f32>,
    cursor: usize,
    flushed: bool,
}

impl Block {
    fn remaining_frames(&self) -> usize {
        (self.samples.len() - self.cursor) / self.spec.channels as usize
    }
}

struct RateConverter {
    spec: AudioSpec,
    dst_freq: u32,
    /// Output frames the resampler currently emits per pass.
    chunk: usize,
    resampler: FastFixedOut<f32>,
}

/// Stream internals, reachable through [`AudioStream::lock`].
pub struct StreamState {
    src: AudioSpec,
    dst: AudioSpec,
    ratio: f32,
    chunk_frames: usize,
    blocks: VecDeque<Block>,
    /// Converted output waiting to be pulled, interleaved in `dst` layout.
    pending: VecDeque<f32>,
    converter: Option<RateConverter>,
    last_get: Option<GetRequest>,
    get_callback: Option<GetCallback>,
}

impl StreamState {
    fn new(src: AudioSpec, dst: AudioSpec, chunk_frames: usize) -> Self {
        Self {
            src,
            dst,
            ratio: 1.0,
            chunk_frames: chunk_frames.max(1),
            blocks: VecDeque::new(),
            pending: VecDeque::new(),
            converter: None,
            last_get: None,
            get_callback: None,
        }
    }

    pub fn src_spec(&self) -> AudioSpec {
        self.src
    }

    pub fn dst_spec(&self) -> AudioSpec {
        self.dst
    }

    /// Changes the input and/or output spec. Data already queued keeps the
    /// spec it was put with.
    pub fn set_format(&mut self, src: Option<AudioSpec>, dst: Option<AudioSpec>) -> Result<()> {
        if let Some(src) = src {
            if !src.is_valid() {
                return Err(HarnessError::InvalidInput("stream input spec is empty"));
            }
            self.src = src;
        }
        if let Some(dst) = dst {
            if !dst.is_valid() {
                return Err(HarnessError::InvalidInput("stream output spec is empty"));
            }
            if dst.channels != self.dst.channels {
                self.pending.clear();
            }
            if dst != self.dst {
                debug!(from = %self.dst, to = %dst, "stream output format changed");
                self.converter = None;
            }
            self.dst = dst;
        }
        Ok(())
    }

    pub fn frequency_ratio(&self) -> f32 {
        self.ratio
    }

    /// Sets the playback-rate multiplier, clamped to the supported range.
    pub fn set_frequency_ratio(&mut self, ratio: f32) -> Result<()> {
        let ratio = ratio.clamp(MIN_FREQUENCY_RATIO, MAX_FREQUENCY_RATIO);
        if let Some(converter) = self.converter.as_mut() {
            converter
                .resampler
                .set_resample_ratio_relative(1.0 / ratio as f64, false)?;
        }
        self.ratio = ratio;
        Ok(())
    }

    /// Queues `bytes` laid out in the current input spec. A trailing partial
    /// frame is dropped.
    pub fn put_data(&mut self, bytes: &[u8]) -> Result<()> {
        let spec = self.src;
        let whole = bytes.len() / spec.frame_size() * spec.frame_size();
        if whole == 0 {
            return Ok(());
        }
        let samples = decode_samples(spec.format, &bytes[..whole]);

        let open_block = self
            .blocks
            .back_mut()
            .filter(|block| block.spec == spec && !block.flushed);
        if let Some(block) = open_block {
            if block.cursor > block.samples.len() / 2 {
                block.samples.drain(..block.cursor);
                block.cursor = 0;
            }
            block.samples.extend_from_slice(&samples);
        } else {
            self.blocks.push_back(Block {
                spec,
                samples,
                cursor: 0,
                flushed: false,
            });
        }
        trace!(bytes = whole, blocks = self.blocks.len(), "queued stream data");
        Ok(())
    }

    /// Marks the queued data as complete; its tail is converted without
    /// waiting for more input.
    pub fn flush(&mut self) {
        if let Some(block) = self.blocks.back_mut() {
            block.flushed = true;
        }
    }

    /// Drops all queued input and converted output.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.pending.clear();
        if let Some(converter) = self.converter.as_mut() {
            converter.resampler.reset();
        }
    }

    /// Bytes of input still queued, each block measured in its own spec.
    pub fn queued_bytes(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| block.remaining_frames() * block.spec.frame_size())
            .sum()
    }

    /// Estimated output bytes obtainable right now, in whole output frames.
    pub fn available_bytes(&self) -> usize {
        let dst_channels = self.dst.channels as usize;
        let mut frames = (self.pending.len() / dst_channels) as f64;
        for block in &self.blocks {
            let scale = self.dst.freq as f64 / (block.spec.freq as f64 * self.ratio as f64);
            frames += block.remaining_frames() as f64 * scale;
        }
        frames.floor() as usize * self.dst.frame_size()
    }

    /// Most recent pull, if any happened yet.
    pub fn last_get_request(&self) -> Option<GetRequest> {
        self.last_get
    }

    /// Pulls converted audio in the output spec. Returns the bytes written,
    /// always a whole number of frames.
    pub fn get_data(&mut self, out: &mut [u8]) -> Result<usize> {
        self.get_data_with(out, false)
    }

    /// Like [`get_data`](Self::get_data), but the resampler runs in passes
    /// no larger than what is still missing, so no converted output is left
    /// behind and no more input is consumed than the request covers.
    pub fn get_data_bounded(&mut self, out: &mut [u8]) -> Result<usize> {
        self.get_data_with(out, true)
    }

    fn get_data_with(&mut self, out: &mut [u8], bounded: bool) -> Result<usize> {
        let frame_size = self.dst.frame_size();
        let frames = out.len() / frame_size;
        self.note_request(frames * frame_size);

        let samples = self.pull_frames(frames, bounded)?;
        let mut bytes = Vec::with_capacity(samples.len() * self.dst.format.bytes_per_sample());
        encode_samples(self.dst.format, &samples, &mut bytes);
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Pulls converted audio straight into `f32` samples laid out in the
    /// output channel order. Returns the number of samples written.
    pub fn fill_f32(&mut self, out: &mut [f32]) -> Result<usize> {
        let frames = out.len() / self.dst.channels as usize;
        self.note_request(frames * self.dst.frame_size());

        let samples = self.pull_frames(frames, false)?;
        out[..samples.len()].copy_from_slice(&samples);
        Ok(samples.len())
    }

    fn note_request(&mut self, total: usize) {
        let request = GetRequest {
            at: Instant::now(),
            additional: total.saturating_sub(self.available_bytes()),
            total,
        };
        self.last_get = Some(request);
        if let Some(callback) = self.get_callback.as_mut() {
            callback(&request);
        }
    }

    /// Drops up to `frames` of output that was converted before now and is
    /// still waiting to be pulled. Returns the frames dropped.
    pub fn drop_pending(&mut self, frames: usize) -> usize {
        let channels = self.dst.channels as usize;
        let dropped = frames.min(self.pending.len() / channels);
        self.pending.drain(..dropped * channels);
        dropped
    }

    fn pull_frames(&mut self, frames: usize, bounded: bool) -> Result<Vec<f32>> {
        let channels = self.dst.channels as usize;
        let wanted = frames * channels;
        while self.pending.len() < wanted {
            let chunk = if bounded {
                (wanted - self.pending.len())
                    .div_ceil(channels)
                    .min(self.chunk_frames)
            } else {
                self.chunk_frames
            };
            if !self.produce(chunk)? {
                break;
            }
        }
        let take = wanted.min(self.pending.len()) / channels * channels;
        Ok(self.pending.drain(..take).collect())
    }

    /// Runs the resampler once over the front block, emitting `chunk` frames
    /// of output. Returns `false` when no progress can be made with the data
    /// queued so far.
    fn produce(&mut self, chunk: usize) -> Result<bool> {
        let Some(spec) = self.blocks.front().map(|block| block.spec) else {
            return Ok(false);
        };
        self.ensure_converter(spec, chunk.max(1))?;

        let has_successor = self.blocks.len() > 1;
        let (Some(block), Some(converter)) = (self.blocks.front_mut(), self.converter.as_mut())
        else {
            return Ok(false);
        };

        let channels = spec.channels as usize;
        let needed = converter.resampler.input_frames_next();
        let remaining = block.remaining_frames();

        let planar_out = if remaining >= needed {
            let end = block.cursor + needed * channels;
            let planar = deinterleave(&block.samples[block.cursor..end], spec.channels);
            block.cursor = end;
            converter.resampler.process(&planar, None)?
        } else if block.flushed || has_successor {
            let planar = deinterleave(&block.samples[block.cursor..], spec.channels);
            let out = if remaining > 0 {
                converter.resampler.process_partial(Some(planar.as_slice()), None)?
            } else {
                Vec::new()
            };
            converter.resampler.reset();
            self.blocks.pop_front();
            out
        } else {
            return Ok(false);
        };

        let converted = remap_channels(&interleave(&planar_out), spec.channels, self.dst.channels);
        self.pending.extend(converted);
        Ok(true)
    }

    /// Rebuilds the resampler when the input spec, output rate or output
    /// chunk size differs from the current one.
    fn ensure_converter(&mut self, spec: AudioSpec, chunk: usize) -> Result<()> {
        let current = self.converter.as_ref().is_some_and(|c| {
            c.spec == spec && c.dst_freq == self.dst.freq && c.chunk == chunk
        });
        if current {
            return Ok(());
        }

        let mut resampler = FastFixedOut::<f32>::new(
            self.dst.freq as f64 / spec.freq as f64,
            RESAMPLER_RATIO_BOUND,
            PolynomialDegree::Cubic,
            chunk,
            spec.channels as usize,
        )?;
        resampler.set_resample_ratio_relative(1.0 / self.ratio as f64, false)?;
        trace!(input = %spec, output = %self.dst, chunk, "rebuilt stream resampler");

        self.converter = Some(RateConverter {
            spec,
            dst_freq: self.dst.freq,
            chunk,
            resampler,
        });
        Ok(())
    }
}

impl fmt::Debug for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamState")
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("ratio", &self.ratio)
            .field("blocks", &self.blocks.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::audio::format::SampleFormat;

    const CHUNK: usize = 64;

    fn spec(channels: u16, freq: u32) -> AudioSpec {
        AudioSpec::new(SampleFormat::S16, channels, freq)
    }

    fn silence(spec: AudioSpec, frames: usize) -> Vec<u8> {
        vec![0; frames * spec.frame_size()]
    }

    #[test]
    fn reports_queued_bytes_in_input_format() {
        let stream = AudioStream::new(spec(2, 8_000), spec(2, 8_000), CHUNK);
        stream.put_data(&silence(spec(2, 8_000), 100)).unwrap();

        assert_eq!(stream.queued_bytes().unwrap(), 400);
        assert_eq!(stream.available_bytes().unwrap(), 400);
    }

    #[test]
    fn clear_drops_everything() {
        let stream = AudioStream::new(spec(2, 8_000), spec(2, 8_000), CHUNK);
        stream.put_data(&silence(spec(2, 8_000), 1_000)).unwrap();
        let mut out = vec![0; 64];
        stream.lock().unwrap().get_data(&mut out).unwrap();

        stream.clear().unwrap();
        assert_eq!(stream.queued_bytes().unwrap(), 0);
        assert_eq!(stream.available_bytes().unwrap(), 0);
    }

    #[test]
    fn format_change_starts_a_new_block() {
        let stream = AudioStream::new(spec(2, 8_000), spec(2, 8_000), CHUNK);
        stream.put_data(&silence(spec(2, 8_000), 10)).unwrap();
        stream
            .lock()
            .unwrap()
            .set_format(Some(spec(6, 8_000)), None)
            .unwrap();
        stream.put_data(&silence(spec(6, 8_000), 10)).unwrap();

        let state = stream.lock().unwrap();
        assert_eq!(state.blocks.len(), 2);
        assert_eq!(state.queued_bytes(), 10 * 4 + 10 * 12);
        assert_eq!(state.src_spec().channels, 6);
    }

    #[test]
    fn available_scales_with_ratio() {
        let stream = AudioStream::new(spec(1, 8_000), spec(1, 8_000), CHUNK);
        stream.put_data(&silence(spec(1, 8_000), 8_000)).unwrap();

        stream.lock().unwrap().set_frequency_ratio(2.0).unwrap();
        assert_eq!(stream.available_bytes().unwrap(), 4_000 * 2);
    }

    #[test]
    fn ratio_is_clamped() {
        let stream = AudioStream::new(spec(1, 8_000), spec(1, 8_000), CHUNK);
        let mut state = stream.lock().unwrap();
        state.set_frequency_ratio(1_000.0).unwrap();
        assert_eq!(state.frequency_ratio(), MAX_FREQUENCY_RATIO);
        state.set_frequency_ratio(0.0).unwrap();
        assert_eq!(state.frequency_ratio(), MIN_FREQUENCY_RATIO);
    }

    #[test]
    fn pulls_converted_output_and_consumes_input() {
        let stream = AudioStream::new(spec(2, 8_000), spec(2, 8_000), CHUNK);
        stream
            .lock()
            .unwrap()
            .set_format(None, Some(AudioSpec::new(SampleFormat::F32, 2, 16_000)))
            .unwrap();
        stream.put_data(&silence(spec(2, 8_000), 4_000)).unwrap();
        let before = stream.queued_bytes().unwrap();

        let mut out = vec![0; 8 * 256];
        let written = stream.lock().unwrap().get_data(&mut out).unwrap();

        assert_eq!(written, out.len());
        assert!(stream.queued_bytes().unwrap() < before);
    }

    #[test]
    fn bounded_pull_leaves_nothing_pending() {
        let stream = AudioStream::new(spec(1, 8_000), spec(1, 8_000), CHUNK);
        stream.put_data(&silence(spec(1, 8_000), 4_000)).unwrap();
        let mut state = stream.lock().unwrap();

        let mut out = vec![0; 2 * 100];
        assert_eq!(state.get_data(&mut out).unwrap(), out.len());
        assert_eq!(state.pending.len(), 2 * CHUNK - 100);

        let mut out = vec![0; 2 * 10];
        assert_eq!(state.get_data_bounded(&mut out).unwrap(), out.len());
        assert_eq!(state.drop_pending(usize::MAX), 2 * CHUNK - 110);

        assert_eq!(state.get_data_bounded(&mut out).unwrap(), out.len());
        assert!(state.pending.is_empty());
    }

    #[test]
    fn unflushed_tail_waits_for_more_data() {
        let stream = AudioStream::new(spec(1, 8_000), spec(1, 8_000), CHUNK);
        stream.put_data(&silence(spec(1, 8_000), 4)).unwrap();

        let mut out = vec![0; 2 * 64];
        assert_eq!(stream.lock().unwrap().get_data(&mut out).unwrap(), 0);

        stream.flush().unwrap();
        assert!(stream.lock().unwrap().get_data(&mut out).unwrap() > 0);
        assert_eq!(stream.queued_bytes().unwrap(), 0);
    }

    #[test]
    fn records_get_requests_and_notifies_callback() {
        let stream = AudioStream::new(spec(1, 8_000), spec(1, 8_000), CHUNK);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        stream
            .set_get_callback(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        stream.put_data(&silence(spec(1, 8_000), 10)).unwrap();

        let mut out = vec![0.0_f32; 30];
        stream.lock().unwrap().fill_f32(&mut out).unwrap();

        let request = stream.lock().unwrap().last_get_request().unwrap();
        assert_eq!(request.total, 60);
        assert_eq!(request.additional, 40);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
