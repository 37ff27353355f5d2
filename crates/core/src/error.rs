/// Result alias that carries the custom [`HarnessError`] type.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Free-form failure reported by one of the subsystems.
    #[error("{0}")]
    Message(String),
    /// Caller handed over data the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The WAV file could not be opened or decoded.
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    /// Configuration file did not parse.
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
    /// The resampler rejected its parameters.
    #[error("resampler setup: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),
    /// The resampler failed while processing a block.
    #[error("resampling: {0}")]
    Resample(#[from] rubato::ResampleError),
    /// Output device could not be opened, configured or driven.
    #[error("audio device: {0}")]
    Device(String),
}

impl HarnessError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn device<T: Into<String>>(msg: T) -> Self {
        Self::Device(msg.into())
    }
}

impl From<&str> for HarnessError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for HarnessError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
