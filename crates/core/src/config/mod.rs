use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub audio: AudioConfig,
    pub keys: KeyBindings,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }
}

/// Initial window geometry and text metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
    pub font_size: f32,
}

impl WindowConfig {
    pub fn line_height(&self) -> f32 {
        self.font_size + 2.0
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 480.0,
            title: "Resampler Test".to_string(),
            font_size: 16.0,
        }
    }
}

/// Configuration specific to the audio bridge and stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub auto_loop: bool,
    pub auto_flush: bool,
    /// Available output, in seconds, under which auto-loop queues another copy.
    pub loop_threshold_seconds: f32,
    /// Frequency ratio the stream is cranked to while skipping.
    pub skip_ratio: f32,
    /// Output frames produced per resampler pass.
    pub chunk_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            auto_loop: true,
            auto_flush: false,
            loop_threshold_seconds: 10.0,
            skip_ratio: 100.0,
            chunk_frames: 1024,
        }
    }
}

/// Keyboard command surface. Letters are matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub pause: char,
    pub auto_loop: char,
    pub auto_flush: char,
    pub clear: char,
    pub queue: char,
    pub skip: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            pause: 'q',
            auto_loop: 'w',
            auto_flush: 'e',
            clear: 'a',
            queue: 's',
            skip: 'd',
        }
    }
}
