//! Audio substrate: sample formats, buffer conversion, the pull stream the
//! sliders steer, the device it plays through and the WAV source.

pub mod convert;
pub mod device;
pub mod format;
pub mod stream;
pub mod wav;

pub use convert::convert_samples;
pub use device::{CpalDevice, OutputDevice};
pub use format::{channel_name, AudioSpec, SampleFormat};
pub use stream::{AudioStream, GetRequest, StreamState};
pub use wav::WavData;
