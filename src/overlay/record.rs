use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};

use super::{Alignment, Rgb, TextStyle};

const BACKGROUND_ALPHA: f32 = 0.85;

/// Serializable form of a `TextStyle`, with CSS color strings and 0/1 flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRecord {
    pub color: String,
    pub bg_color: Option<String>,
    pub is_bold: u8,
    pub is_italic: u8,
    pub font_size: u32,
    pub width: u32,
    pub height: u32,
    pub align: Alignment,
}

impl StyleRecord {
    pub fn default_record() -> Self {
        Self::from(&TextStyle::default())
    }
}

impl From<&TextStyle> for StyleRecord {
    fn from(style: &TextStyle) -> Self {
        Self {
            color: style.color.to_css(),
            bg_color: style
                .background
                .map(|color| color.to_css_rgba(BACKGROUND_ALPHA)),
            is_bold: style.bold as u8,
            is_italic: style.italic as u8,
            font_size: style.font_size,
            width: style.width,
            height: style.height,
            align: style.align,
        }
    }
}

/// Boolean written either as `true`/`false` or as `1`/`0`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    pub fn as_bool(self) -> bool {
        match self {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        }
    }
}

/// User edits applied on top of estimated styles. Absent fields keep the
/// estimate; `"bg_color": null` clears the background.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StyleOverrides {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub bg_color: Option<Option<String>>,
    #[serde(default)]
    pub is_bold: Option<Flag>,
    #[serde(default)]
    pub is_italic: Option<Flag>,
    #[serde(default)]
    pub font_size: Option<u32>,
    #[serde(default)]
    pub align: Option<Alignment>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl StyleOverrides {
    pub fn from_json(raw: &str) -> Result<Self> {
        let overrides: StyleOverrides = serde_json::from_str(raw)?;
        overrides.validate()?;
        Ok(overrides)
    }

    /// Explicit size that replaces the fitted one when drawing.
    pub fn font_size_override(&self) -> Option<u32> {
        self.font_size.filter(|size| *size > 0)
    }

    /// Rejects colors that cannot be parsed.
    pub fn validate(&self) -> Result<()> {
        if let Some(color) = &self.color {
            Rgb::parse_css(color).ok_or_else(|| anyhow!("invalid color '{}'", color))?;
        }
        if let Some(Some(color)) = &self.bg_color {
            Rgb::parse_css(color).ok_or_else(|| anyhow!("invalid bg_color '{}'", color))?;
        }
        Ok(())
    }
}

impl TextStyle {
    /// New style with `overrides` applied. Unparseable colors and a zero
    /// font size leave the original value in place.
    pub fn with_overrides(&self, overrides: &StyleOverrides) -> TextStyle {
        let mut style = self.clone();
        if let Some(color) = overrides.color.as_deref().and_then(Rgb::parse_css) {
            style.color = color;
        }
        match &overrides.bg_color {
            Some(None) => style.background = None,
            Some(Some(value)) => {
                if let Some(color) = Rgb::parse_css(value) {
                    style.background = Some(color);
                }
            }
            None => {}
        }
        if let Some(flag) = overrides.is_bold {
            style.bold = flag.as_bool();
        }
        if let Some(flag) = overrides.is_italic {
            style.italic = flag.as_bool();
        }
        if let Some(size) = overrides.font_size_override() {
            style.font_size = size;
        }
        if let Some(align) = overrides.align {
            style.align = align;
        }
        style
    }
}
