use tracing::trace;

use crate::{config::KeyBindings, slider::SliderPanel};

/// Keys the harness distinguishes. Letters are carried lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

/// Platform event translated into harness terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown { key: Key, modifiers: Modifiers },
    Quit,
}

/// Pointer snapshot for the current tick, in logical coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub position: Option<(f32, f32)>,
    pub primary_down: bool,
}

/// Window size in logical units and in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMetrics {
    pub logical: (f32, f32),
    pub physical: (f32, f32),
}

impl WindowMetrics {
    pub fn uniform(width: f32, height: f32) -> Self {
        Self {
            logical: (width, height),
            physical: (width, height),
        }
    }

    /// Factor that turns logical pointer coordinates into physical pixels.
    pub fn pixel_scale(&self) -> f32 {
        if self.logical.0 > 0.0 && self.logical.0 != self.physical.0 {
            self.physical.0 / self.logical.0
        } else {
            1.0
        }
    }
}

/// Action requested from the keyboard or the window system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePause,
    ToggleAutoLoop,
    ToggleAutoFlush,
    ClearStream,
    QueueAudio,
    Skip { seconds: f32 },
    Quit,
}

/// Skip distance: one second, times ten for each held modifier.
pub fn skip_seconds(modifiers: Modifiers) -> f32 {
    let mut amount = 1.0;
    if modifiers.ctrl {
        amount *= 10.0;
    }
    if modifiers.shift {
        amount *= 10.0;
    }
    amount
}

/// Turns raw events and pointer state into commands and slider drags.
#[derive(Debug, Clone)]
pub struct InputMapper {
    bindings: KeyBindings,
    active_slider: Option<usize>,
}

impl InputMapper {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            active_slider: None,
        }
    }

    pub fn active_slider(&self) -> Option<usize> {
        self.active_slider
    }

    pub fn map_event(&self, event: &InputEvent) -> Option<Command> {
        let (key, modifiers) = match *event {
            InputEvent::Quit => return Some(Command::Quit),
            InputEvent::KeyDown { key, modifiers } => (key, modifiers),
        };

        let letter = match key {
            Key::Escape => return Some(Command::Quit),
            Key::Other => return None,
            Key::Char(c) => c.to_ascii_lowercase(),
        };

        let b = &self.bindings;
        let command = if letter == b.pause.to_ascii_lowercase() {
            Command::TogglePause
        } else if letter == b.auto_loop.to_ascii_lowercase() {
            Command::ToggleAutoLoop
        } else if letter == b.auto_flush.to_ascii_lowercase() {
            Command::ToggleAutoFlush
        } else if letter == b.clear.to_ascii_lowercase() {
            Command::ClearStream
        } else if letter == b.queue.to_ascii_lowercase() {
            Command::QueueAudio
        } else if letter == b.skip.to_ascii_lowercase() {
            Command::Skip {
                seconds: skip_seconds(modifiers),
            }
        } else {
            return None;
        };
        Some(command)
    }

    /// Maps the tick's events in arrival order, dropping unbound keys.
    pub fn commands(&self, events: &[InputEvent]) -> Vec<Command> {
        events.iter().filter_map(|e| self.map_event(e)).collect()
    }

    /// Drives the slider under the pointer while the primary button is held.
    ///
    /// Hit-testing happens only when no slider is active, so a drag stays on
    /// its slider until release even if the pointer wanders off.
    pub fn update_pointer(
        &mut self,
        pointer: &PointerState,
        window: &WindowMetrics,
        sliders: &mut SliderPanel,
    ) {
        if !pointer.primary_down {
            self.active_slider = None;
            return;
        }
        let Some((x, y)) = pointer.position else {
            return;
        };
        let scale = window.pixel_scale();
        let (x, y) = (x * scale, y * scale);

        if self.active_slider.is_none() {
            self.active_slider = sliders.hit_test(x, y);
            if let Some(index) = self.active_slider {
                trace!(index, "slider grabbed");
            }
        }

        if let Some(slider) = self.active_slider.and_then(|i| sliders.get_mut(i)) {
            let area = slider.area();
            slider.update_from_pointer((x - area.x) / area.w);
        }
    }
}
