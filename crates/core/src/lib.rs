//! Core library for the resampler test harness.
//!
//! Plays a WAV file through a converting audio stream and lets the user vary
//! playback speed, stream frequency and channel count while watching the
//! stream's counters. Everything here is platform agnostic: the frontend
//! supplies window events, a [`render::Canvas`] and an
//! [`audio::OutputDevice`], then drives [`session::Harness::tick`] once per
//! frame.

pub mod audio;
pub mod bridge;
pub mod config;
pub mod error;
pub mod input;
pub mod render;
pub mod session;
pub mod slider;

pub use audio::{AudioSpec, AudioStream, CpalDevice, OutputDevice, SampleFormat, WavData};
pub use bridge::{AudioBridge, StreamMetrics};
pub use config::{AppConfig, AudioConfig};
pub use error::{HarnessError, Result};
pub use input::{InputEvent, Key, Modifiers, PointerState, WindowMetrics};
pub use render::{Canvas, Color};
pub use session::{Harness, TickInput, TickStatus};
pub use slider::{Rect, SliderPanel};
