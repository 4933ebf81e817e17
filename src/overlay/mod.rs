mod cleanup;
mod fit;
mod font;
mod record;
mod render;
mod script;
mod style;

use std::path::PathBuf;

pub use cleanup::fill_solid_background;
pub use fit::{DEFAULT_FONT_SIZE, find_font_size, fit_font_size, target_fill_ratio};
pub use font::{FontMetrics, TextExtent, load_font_metrics, measure_text, resolve_system_font};
pub use record::{Flag, StyleOverrides, StyleRecord};
pub use render::{Compositor, FontCatalog};
pub use script::{ScriptEntry, detect_source_lang, has_chinese, lookup_script};
pub use style::{StyleThresholds, estimate_style, extract_dominant_color};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// A block of text found by the external detector, in image coordinates.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DetectedRegion {
    #[serde(rename = "box")]
    pub polygon: Vec<Point>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    pub fn from_f32(values: [f32; 3]) -> Self {
        let channel = |value: f32| value.clamp(0.0, 255.0) as u8;
        Rgb([channel(values[0]), channel(values[1]), channel(values[2])])
    }

    pub fn to_f32(self) -> [f32; 3] {
        [self.0[0] as f32, self.0[1] as f32, self.0[2] as f32]
    }

    /// Perceptual brightness (ITU-R BT.601 weights).
    pub fn luma(self) -> f32 {
        luma_of(self.to_f32())
    }

    /// Plain channel mean.
    pub fn brightness(self) -> f32 {
        let [r, g, b] = self.to_f32();
        (r + g + b) / 3.0
    }

    pub fn to_css(self) -> String {
        let [r, g, b] = self.0;
        format!("rgb({}, {}, {})", r, g, b)
    }

    pub fn to_css_rgba(self, alpha: f32) -> String {
        let [r, g, b] = self.0;
        format!("rgba({}, {}, {}, {})", r, g, b, alpha)
    }

    /// Accepts `rgb(r, g, b)`, `rgba(r, g, b, a)`, `#rrggbb` and `#rgb`.
    pub fn parse_css(value: &str) -> Option<Rgb> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = value.to_ascii_lowercase();
        let inner = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            let value: f32 = part.parse().ok()?;
            *slot = value.round().clamp(0.0, 255.0) as u8;
        }
        Some(Rgb(channels))
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.is_ascii() {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

pub(crate) fn luma_of([r, g, b]: [f32; 3]) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

/// Visual style estimated for one region. A changed style is a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: Rgb,
    /// `None` means transparent or unknown.
    pub background: Option<Rgb>,
    pub font_size: u32,
    pub bold: bool,
    pub italic: bool,
    pub align: Alignment,
    pub width: u32,
    pub height: u32,
    pub stroke_width: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: Rgb::BLACK,
            background: None,
            font_size: 20,
            bold: false,
            italic: false,
            align: Alignment::Center,
            width: 100,
            height: 30,
            stroke_width: 0,
        }
    }
}

/// Everything needed to paint one translated region.
#[derive(Debug, Clone)]
pub struct RenderInstruction {
    pub polygon: Vec<Point>,
    pub text: String,
    pub style: TextStyle,
    pub font_path: PathBuf,
    pub font_size: u32,
}
