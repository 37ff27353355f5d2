use crate::audio::AudioSpec;

const SLIDER_WIDTH_FRAC: f32 = 500.0 / 600.0;
const SLIDER_HEIGHT_FRAC: f32 = 70.0 / 480.0;

/// Axis-aligned rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Closed containment: points on any edge are inside.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

/// How a pointer position turns into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderMapping {
    /// Uniform spread over `[min, max]`, biased for whole-number controls.
    LinearRange,
    /// Centre maps to the initial value; each half interpolates towards its
    /// bound.
    MidpointRange,
}

/// How the value shows up in the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDisplay {
    FloatDisplay,
    IntegerDisplay,
}

/// Fixed label text around the formatted value, e.g. `Speed: ` `1.00` `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTemplate {
    pub prefix: &'static str,
    pub precision: Option<usize>,
    pub suffix: &'static str,
}

impl LabelTemplate {
    pub const fn new(prefix: &'static str, precision: Option<usize>, suffix: &'static str) -> Self {
        Self {
            prefix,
            precision,
            suffix,
        }
    }

    pub fn render(&self, value: f32) -> String {
        match self.precision {
            Some(precision) => format!("{}{value:.precision$}{}", self.prefix, self.suffix),
            None => format!("{}{value}{}", self.prefix, self.suffix),
        }
    }
}

/// One draggable control.
#[derive(Debug, Clone)]
pub struct Slider {
    index: usize,
    area: Rect,
    pos: f32,
    changed: bool,
    template: LabelTemplate,
    mapping: SliderMapping,
    display: ValueDisplay,
    min: f32,
    max: f32,
    /// Value at the centre of a midpoint slider.
    mid: f32,
    value: f32,
}

impl Slider {
    /// Builds the slider stacked at `index` inside a `width` x `height` window.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        template: LabelTemplate,
        mapping: SliderMapping,
        display: ValueDisplay,
        value: f32,
        min: f32,
        max: f32,
        window: (f32, f32),
    ) -> Self {
        let value = value.clamp(min, max);
        let pos = match mapping {
            SliderMapping::LinearRange => {
                ((value - min + 0.5) / (max - min + 1.0)).clamp(0.0, 1.0)
            }
            SliderMapping::MidpointRange => 0.5,
        };

        Self {
            index,
            area: layout(index, window.0, window.1),
            pos,
            changed: true,
            template,
            mapping,
            display,
            min,
            max,
            mid: value,
            value,
        }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn pos(&self) -> f32 {
        self.pos
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Reports whether the value moved since the last call and clears the flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Applies a pointer position expressed as a fraction of the slider width.
    pub fn update_from_pointer(&mut self, normalized_x: f32) {
        let pos = normalized_x.clamp(0.0, 1.0);
        self.pos = pos;

        let value = match self.mapping {
            SliderMapping::LinearRange => {
                (self.min + pos * (self.max - self.min + 1.0)).clamp(self.min, self.max)
            }
            SliderMapping::MidpointRange => {
                let mid = self.mid;
                let offset = pos * 2.0 - 1.0;
                if offset >= 0.0 {
                    lerp(mid, self.max, offset)
                } else {
                    lerp(mid, self.min, -offset)
                }
            }
        };

        if value != self.value {
            self.value = value;
            self.changed = true;
        }
    }

    /// Label text with the current value.
    pub fn label(&self) -> String {
        let shown = match self.display {
            ValueDisplay::FloatDisplay => self.value,
            ValueDisplay::IntegerDisplay => self.value.trunc(),
        };
        self.template.render(shown)
    }

    fn relayout(&mut self, width: f32, height: f32) {
        self.area = layout(self.index, width, height);
    }
}

fn layout(index: usize, width: f32, height: f32) -> Rect {
    Rect::new(
        width * (1.0 - SLIDER_WIDTH_FRAC) / 2.0,
        height * (0.2 + index as f32 * SLIDER_HEIGHT_FRAC * 1.4),
        SLIDER_WIDTH_FRAC * width,
        SLIDER_HEIGHT_FRAC * height,
    )
}

fn lerp(v0: f32, v1: f32, t: f32) -> f32 {
    (1.0 - t) * v0 + t * v1
}

/// The speed, frequency and channel-count controls.
#[derive(Debug, Clone)]
pub struct SliderPanel {
    sliders: [Slider; 3],
    window: (f32, f32),
}

impl SliderPanel {
    pub const SPEED: usize = 0;
    pub const FREQUENCY: usize = 1;
    pub const CHANNELS: usize = 2;

    /// Sliders seeded from the source audio: speed spreads around 1.0x,
    /// frequency around the source rate, channels start at the source layout.
    pub fn for_source(source: &AudioSpec, window: (f32, f32)) -> Self {
        let sliders = [
            Slider::new(
                Self::SPEED,
                LabelTemplate::new("Speed: ", Some(2), "x"),
                SliderMapping::MidpointRange,
                ValueDisplay::FloatDisplay,
                1.0,
                0.2,
                5.0,
                window,
            ),
            Slider::new(
                Self::FREQUENCY,
                LabelTemplate::new("Freq: ", None, ""),
                SliderMapping::MidpointRange,
                ValueDisplay::IntegerDisplay,
                source.freq as f32,
                4_000.0,
                192_000.0,
                window,
            ),
            Slider::new(
                Self::CHANNELS,
                LabelTemplate::new("Channels: ", None, ""),
                SliderMapping::LinearRange,
                ValueDisplay::IntegerDisplay,
                source.channels as f32,
                1.0,
                8.0,
                window,
            ),
        ];
        Self { sliders, window }
    }

    pub fn sliders(&self) -> &[Slider] {
        &self.sliders
    }

    pub fn get(&self, index: usize) -> Option<&Slider> {
        self.sliders.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slider> {
        self.sliders.get_mut(index)
    }

    /// First slider, in index order, whose rectangle holds the point.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<usize> {
        self.sliders
            .iter()
            .position(|slider| slider.area.contains(x, y))
    }

    /// Moves the sliders to fit a new window size; values are untouched.
    pub fn relayout(&mut self, width: f32, height: f32) {
        if self.window == (width, height) {
            return;
        }
        self.window = (width, height);
        for slider in &mut self.sliders {
            slider.relayout(width, height);
        }
    }

    pub fn speed(&self) -> f32 {
        self.sliders[Self::SPEED].value
    }

    pub fn frequency(&self) -> u32 {
        self.sliders[Self::FREQUENCY].value as u32
    }

    pub fn channels(&self) -> u16 {
        self.sliders[Self::CHANNELS].value as u16
    }

    /// Consumes a pending speed change, returning the new multiplier.
    pub fn take_speed_change(&mut self) -> Option<f32> {
        let slider = &mut self.sliders[Self::SPEED];
        slider.take_changed().then_some(slider.value)
    }

    /// Consumes pending frequency and channel changes; true if either moved
    /// since the last call.
    pub fn take_format_change(&mut self) -> bool {
        let frequency = self.sliders[Self::FREQUENCY].take_changed();
        let channels = self.sliders[Self::CHANNELS].take_changed();
        frequency || channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleFormat;

    const WINDOW: (f32, f32) = (640.0, 480.0);

    fn panel() -> SliderPanel {
        SliderPanel::for_source(&AudioSpec::new(SampleFormat::S16, 2, 44_100), WINDOW)
    }

    fn linear(min: f32, max: f32) -> Slider {
        Slider::new(
            0,
            LabelTemplate::new("", None, ""),
            SliderMapping::LinearRange,
            ValueDisplay::IntegerDisplay,
            min,
            min,
            max,
            WINDOW,
        )
    }

    #[test]
    fn linear_mapping_stays_in_range() {
        let mut slider = linear(1.0, 8.0);
        for step in 0..=100 {
            slider.update_from_pointer(step as f32 / 100.0);
            assert!((1.0..=8.0).contains(&slider.value()), "value = {}", slider.value());
        }
        slider.update_from_pointer(1.0);
        assert_eq!(slider.value(), 8.0);
    }

    #[test]
    fn linear_mapping_keeps_the_rounding_bias() {
        let mut slider = linear(1.0, 8.0);
        slider.update_from_pointer(0.5);
        assert_eq!(slider.value(), 5.0);
    }

    #[test]
    fn midpoint_mapping_hits_anchors() {
        let mut panel = panel();
        let speed = panel.get_mut(SliderPanel::SPEED).unwrap();

        speed.update_from_pointer(0.5);
        assert_eq!(speed.value(), 1.0);
        speed.update_from_pointer(1.0);
        assert_eq!(speed.value(), 5.0);
        speed.update_from_pointer(0.0);
        assert_eq!(speed.value(), 0.2);
    }

    #[test]
    fn pointer_positions_are_clamped() {
        let mut slider = linear(1.0, 8.0);
        slider.update_from_pointer(-3.0);
        assert_eq!(slider.pos(), 0.0);
        slider.update_from_pointer(7.0);
        assert_eq!(slider.pos(), 1.0);
    }

    #[test]
    fn changed_flag_is_consumed_once() {
        let mut panel = panel();
        assert_eq!(panel.take_speed_change(), Some(1.0));
        assert_eq!(panel.take_speed_change(), None);

        let speed = panel.get_mut(SliderPanel::SPEED).unwrap();
        speed.update_from_pointer(0.5);
        assert!(!speed.take_changed());

        speed.update_from_pointer(0.75);
        assert!(speed.take_changed());
        assert!(!speed.take_changed());
    }

    #[test]
    fn format_change_covers_frequency_and_channels() {
        let mut panel = panel();
        assert!(panel.take_format_change());
        assert!(!panel.take_format_change());

        panel
            .get_mut(SliderPanel::CHANNELS)
            .unwrap()
            .update_from_pointer(0.9);
        assert!(panel.take_format_change());
        assert!(!panel.take_format_change());
        assert_eq!(panel.take_speed_change(), Some(1.0));
    }

    #[test]
    fn initial_positions_reflect_source() {
        let panel = panel();
        assert_eq!(panel.frequency(), 44_100);
        assert_eq!(panel.channels(), 2);
        let channels = panel.get(SliderPanel::CHANNELS).unwrap();
        assert!((channels.pos() - 1.5 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn sliders_stack_vertically() {
        let panel = panel();
        let first = panel.get(0).unwrap().area();
        let second = panel.get(1).unwrap().area();
        assert!((first.x - 640.0 / 12.0).abs() < 1e-3);
        assert!((first.y - 96.0).abs() < 1e-3);
        assert!((first.h - 70.0).abs() < 1e-3);
        assert!((second.y - (96.0 + 98.0)).abs() < 1e-3);
    }

    #[test]
    fn hit_test_misses_outside() {
        let panel = panel();
        assert_eq!(panel.hit_test(1.0, 1.0), None);
        let area = panel.get(2).unwrap().area();
        assert_eq!(panel.hit_test(area.x + 1.0, area.y + 1.0), Some(2));
    }

    #[test]
    fn hit_test_includes_edges() {
        let panel = panel();
        let area = panel.get(1).unwrap().area();
        assert_eq!(panel.hit_test(area.x + area.w, area.y + area.h), Some(1));
        assert_eq!(panel.hit_test(area.x, area.y), Some(1));
        assert_eq!(panel.hit_test(area.x + area.w + 0.5, area.y), None);
    }

    #[test]
    fn midpoint_centre_is_the_initial_value() {
        let mut panel = panel();
        let freq = panel.get_mut(SliderPanel::FREQUENCY).unwrap();
        assert_eq!(freq.pos(), 0.5);

        freq.update_from_pointer(0.25);
        assert_eq!(freq.value(), lerp(44_100.0, 4_000.0, 0.5));
        freq.update_from_pointer(0.5);
        assert_eq!(freq.value(), 44_100.0);
    }

    #[test]
    fn labels_follow_display_mode() {
        let mut panel = panel();
        assert_eq!(panel.get(0).unwrap().label(), "Speed: 1.00x");
        assert_eq!(panel.get(1).unwrap().label(), "Freq: 44100");

        panel.get_mut(1).unwrap().update_from_pointer(0.6);
        let label = panel.get(1).unwrap().label();
        assert!(!label.contains('.'), "label = {label}");
    }

    #[test]
    fn out_of_range_sources_are_clamped() {
        let panel = SliderPanel::for_source(&AudioSpec::new(SampleFormat::S16, 12, 1_000), WINDOW);
        assert_eq!(panel.channels(), 8);
        assert_eq!(panel.frequency(), 4_000);
    }

    #[test]
    fn relayout_keeps_values() {
        let mut panel = panel();
        panel.get_mut(2).unwrap().update_from_pointer(1.0);
        panel.relayout(1280.0, 960.0);
        assert_eq!(panel.channels(), 8);
        assert!((panel.get(0).unwrap().area().w - 1280.0 * 500.0 / 600.0).abs() < 1e-3);
    }
}
