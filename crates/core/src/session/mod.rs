//! Per-frame driver tying input, sliders, the audio bridge and rendering
//! together. The frontend owns the window and the event source; it hands one
//! [`TickInput`] per frame to [`Harness::tick`].

use tracing::{debug, info, warn};

use crate::{
    audio::{OutputDevice, WavData},
    bridge::{AudioBridge, StreamMetrics},
    config::AppConfig,
    input::{Command, InputEvent, InputMapper, PointerState, WindowMetrics},
    render::{Canvas, FrameRenderer},
    slider::SliderPanel,
    Result,
};

/// Everything the frontend observed since the previous tick.
#[derive(Debug, Clone)]
pub struct TickInput {
    pub events: Vec<InputEvent>,
    pub pointer: PointerState,
    pub window: WindowMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Continue,
    Quit,
}

pub struct Harness {
    sliders: SliderPanel,
    input: InputMapper,
    bridge: AudioBridge,
    renderer: FrameRenderer,
    metrics: Option<StreamMetrics>,
}

impl Harness {
    pub fn new(source: WavData, device: Box<dyn OutputDevice>, config: &AppConfig) -> Result<Self> {
        let sliders = SliderPanel::for_source(
            &source.spec,
            (config.window.width, config.window.height),
        );
        let bridge = AudioBridge::new(source, device, &config.audio)?;
        info!(source = %bridge.source_spec(), "harness ready");

        Ok(Self {
            sliders,
            input: InputMapper::new(config.keys.clone()),
            bridge,
            renderer: FrameRenderer::new(config.window.line_height()),
            metrics: None,
        })
    }

    pub fn sliders(&self) -> &SliderPanel {
        &self.sliders
    }

    pub fn bridge(&self) -> &AudioBridge {
        &self.bridge
    }

    /// Metrics gathered by the most recent tick.
    pub fn metrics(&self) -> Option<&StreamMetrics> {
        self.metrics.as_ref()
    }

    /// Runs one frame: commands, slider drag, speed, auto-loop, then paint.
    pub fn tick(&mut self, input: &TickInput, canvases: &mut [&mut dyn Canvas]) -> TickStatus {
        let (width, height) = input.window.physical;
        self.sliders.relayout(width, height);

        for command in self.input.commands(&input.events) {
            if command == Command::Quit {
                info!("quit requested");
                return TickStatus::Quit;
            }
            self.dispatch(command);
        }

        self.input
            .update_pointer(&input.pointer, &input.window, &mut self.sliders);

        if let Some(speed) = self.sliders.take_speed_change() {
            debug!(speed, "speed changed");
            self.bridge.apply_speed(speed);
        }

        if self.bridge.needs_refill() {
            self.queue_audio();
        }

        match self.bridge.metrics() {
            Ok(metrics) => self.metrics = Some(metrics),
            Err(e) => warn!("Failed to read stream metrics: {e}"),
        }
        if let Some(metrics) = self.metrics.as_ref() {
            self.renderer
                .paint_all(canvases, &self.sliders, metrics, height);
        }

        TickStatus::Continue
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::TogglePause => {
                self.bridge.toggle_pause();
            }
            Command::ToggleAutoLoop => self.bridge.toggle_auto_loop(),
            Command::ToggleAutoFlush => self.bridge.toggle_auto_flush(),
            Command::ClearStream => {
                self.bridge.clear();
            }
            Command::QueueAudio => self.queue_audio(),
            Command::Skip { seconds } => {
                self.bridge.skip(seconds);
            }
            Command::Quit => {}
        }
    }

    fn queue_audio(&mut self) {
        if self.sliders.take_format_change() {
            debug!(
                channels = self.sliders.channels(),
                freq = self.sliders.frequency(),
                "queueing with new target format"
            );
        }
        self.bridge
            .refill(self.sliders.channels(), self.sliders.frequency());
    }
}
