//! eframe glue: translates egui input into harness ticks and paints through
//! the egui painter.

use egui::{Align2, Color32, Context, FontId, LayerId, Painter, Pos2};
use resampler_test_core::{
    Canvas, Color, Harness, InputEvent, Key, Modifiers, PointerState, Rect, TickInput,
    TickStatus, WindowMetrics,
};

pub struct HarnessApp {
    harness: Harness,
    font_size: f32,
}

impl HarnessApp {
    pub fn new(harness: Harness, font_size: f32) -> Self {
        Self { harness, font_size }
    }
}

impl eframe::App for HarnessApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let tick = collect_input(ctx);

        let mut canvas = EguiCanvas {
            painter: ctx.layer_painter(LayerId::background()),
            pixels_per_point: ctx.pixels_per_point(),
            font_size: self.font_size,
        };
        if self.harness.tick(&tick, &mut [&mut canvas]) == TickStatus::Quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        ctx.request_repaint();
    }
}

fn collect_input(ctx: &Context) -> TickInput {
    let pixels_per_point = ctx.pixels_per_point();
    ctx.input(|i| {
        let mut events: Vec<InputEvent> = i
            .events
            .iter()
            .filter_map(|event| match event {
                egui::Event::Key {
                    key,
                    pressed: true,
                    modifiers,
                    ..
                } => Some(InputEvent::KeyDown {
                    key: map_key(*key),
                    modifiers: Modifiers {
                        ctrl: modifiers.ctrl || modifiers.command,
                        shift: modifiers.shift,
                    },
                }),
                _ => None,
            })
            .collect();
        if i.viewport().close_requested() {
            events.push(InputEvent::Quit);
        }

        let screen = i.screen_rect();
        let logical = (screen.width(), screen.height());
        TickInput {
            events,
            pointer: PointerState {
                position: i.pointer.latest_pos().map(|p| (p.x, p.y)),
                primary_down: i.pointer.primary_down(),
            },
            window: WindowMetrics {
                logical,
                physical: (logical.0 * pixels_per_point, logical.1 * pixels_per_point),
            },
        }
    })
}

fn map_key(key: egui::Key) -> Key {
    if key == egui::Key::Escape {
        return Key::Escape;
    }
    let mut chars = key.name().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Key::Char(c.to_ascii_lowercase()),
        _ => Key::Other,
    }
}

/// Canvas over an egui painter. Harness coordinates are physical pixels.
struct EguiCanvas {
    painter: Painter,
    pixels_per_point: f32,
    font_size: f32,
}

impl EguiCanvas {
    fn point(&self, x: f32, y: f32) -> Pos2 {
        Pos2::new(x / self.pixels_per_point, y / self.pixels_per_point)
    }
}

fn color32(color: Color) -> Color32 {
    Color32::from_rgb(color.r, color.g, color.b)
}

impl Canvas for EguiCanvas {
    fn clear(&mut self, color: Color) {
        let clip = self.painter.clip_rect();
        self.painter.rect_filled(clip, 0.0, color32(color));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let area = egui::Rect::from_min_max(
            self.point(rect.x, rect.y),
            self.point(rect.x + rect.w, rect.y + rect.h),
        );
        self.painter.rect_filled(area, 0.0, color32(color));
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, color: Color) {
        self.painter.text(
            self.point(x, y),
            Align2::LEFT_TOP,
            text,
            FontId::monospace(self.font_size / self.pixels_per_point),
            color32(color),
        );
    }
}
