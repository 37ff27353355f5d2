use crate::{
    audio::{channel_name, AudioSpec},
    bridge::StreamMetrics,
    slider::{Rect, SliderPanel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub const BACKGROUND: Color = Color::rgb(0x00, 0x2B, 0x36);
pub const SLIDER_TRACK: Color = Color::rgb(0x07, 0x36, 0x42);
pub const SLIDER_FILL: Color = Color::rgb(0x58, 0x6E, 0x75);
pub const TEXT: Color = Color::rgb(0xFD, 0xF6, 0xE3);

/// Drawing surface in physical pixels. One per window.
pub trait Canvas {
    fn clear(&mut self, color: Color);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn draw_text(&mut self, x: f32, y: f32, text: &str, color: Color);
}

/// Paints the sliders and the status overlay. Holds no model state.
#[derive(Debug, Clone)]
pub struct FrameRenderer {
    line_height: f32,
}

impl FrameRenderer {
    pub fn new(line_height: f32) -> Self {
        Self { line_height }
    }

    pub fn paint_all(
        &self,
        canvases: &mut [&mut dyn Canvas],
        sliders: &SliderPanel,
        metrics: &StreamMetrics,
        window_height: f32,
    ) {
        for canvas in canvases.iter_mut() {
            self.paint(&mut **canvas, sliders, metrics, window_height);
        }
    }

    pub fn paint(
        &self,
        canvas: &mut dyn Canvas,
        sliders: &SliderPanel,
        metrics: &StreamMetrics,
        window_height: f32,
    ) {
        canvas.clear(BACKGROUND);

        for slider in sliders.sliders() {
            let area = slider.area();
            canvas.fill_rect(area, SLIDER_TRACK);
            canvas.fill_rect(Rect { w: area.w * slider.pos(), ..area }, SLIDER_FILL);
            canvas.draw_text(area.x, area.y, &slider.label(), TEXT);
        }

        let mut y = 0.0;
        for line in status_lines(metrics) {
            canvas.draw_text(0.0, y, &line, TEXT);
            y += self.line_height;
        }

        let mut y = window_height - self.line_height * 3.0;
        for line in format_lines(metrics) {
            canvas.draw_text(0.0, y, &line, TEXT);
            y += self.line_height;
        }
    }
}

/// Lines anchored to the top of the window.
pub fn status_lines(metrics: &StreamMetrics) -> [String; 4] {
    let on_off = |flag: bool| if flag { "On" } else { "Off" };
    let state = if metrics.paused { "Paused" } else { "Playing" };

    let callback = match metrics.last_get {
        Some(last) => format!(
            "Get Callback: {}/{} bytes, {:2} ms ago",
            last.additional,
            last.total,
            last.elapsed.as_millis()
        ),
        None => "Get Callback: 0/0 bytes, never".to_string(),
    };

    [
        format!(
            "{state:>7}, Loop: {:>3}, Flush: {:>3}",
            on_off(metrics.auto_loop),
            on_off(metrics.auto_flush)
        ),
        format!(
            "Available: {:4.2} ({} bytes)",
            metrics.available_seconds, metrics.available_bytes
        ),
        format!("Queued: {} bytes", metrics.queued_bytes),
        callback,
    ]
}

/// Lines anchored to the bottom of the window.
pub fn format_lines(metrics: &StreamMetrics) -> [String; 3] {
    [
        describe("Wav", &metrics.wav_spec),
        describe("Src", &metrics.src_spec),
        describe("Dst", &metrics.dst_spec),
    ]
}

fn describe(label: &str, spec: &AudioSpec) -> String {
    format!(
        "{label}: {:>6}/{:>6}/{}",
        spec.format,
        channel_name(spec.channels),
        spec.freq
    )
}
