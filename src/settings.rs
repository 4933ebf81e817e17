use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::StyleThresholds;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub fonts_dir: PathBuf,
    pub fallback_font_path: Option<PathBuf>,
    pub fallback_families: Vec<String>,
    pub style: StyleThresholds,
    pub honor_alignment: bool,
    pub synthetic_italic: bool,
    pub solid_background: bool,
    pub source_lang: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fonts_dir: PathBuf::from("fonts"),
            fallback_font_path: platform_fallback_font(),
            fallback_families: vec!["sans-serif".to_string()],
            style: StyleThresholds::default(),
            honor_alignment: true,
            synthetic_italic: true,
            solid_background: false,
            source_lang: "auto".to_string(),
        }
    }
}

fn platform_fallback_font() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        Some(PathBuf::from("C:/Windows/Fonts/simhei.ttf"))
    } else if cfg!(target_os = "macos") {
        Some(PathBuf::from("/System/Library/Fonts/Supplemental/Arial Unicode.ttf"))
    } else if cfg!(target_os = "linux") {
        Some(PathBuf::from(
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        ))
    } else {
        None
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    fonts: Option<FontSettings>,
    style: Option<StyleSettings>,
    render: Option<RenderSettings>,
    cleanup: Option<CleanupSettings>,
    translate: Option<TranslateSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    dir: Option<String>,
    fallback_path: Option<String>,
    fallback_families: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    padding: Option<u32>,
    min_contrast: Option<f32>,
    transparent_brightness: Option<f32>,
    bold_edge_density: Option<f32>,
    bold_stroke_width: Option<u32>,
    italic_ratio: Option<f32>,
    align_dominance: Option<f32>,
    font_size_ratio: Option<f32>,
    min_font_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    honor_alignment: Option<bool>,
    synthetic_italic: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CleanupSettings {
    solid_background: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    source_lang: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    load_settings_from(home_dir().as_deref(), extra_path)
}

/// Same as `load_settings` with an explicit per-user settings directory.
pub fn load_settings_from(home: Option<&Path>, extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults);

    if let Some(home) = home {
        ensure_home_settings_file(home)?;
    }

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn positive(value: Option<f32>) -> Option<f32> {
    value.filter(|value| *value > 0.0)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(fonts) = incoming.fonts {
            if let Some(dir) = non_empty(fonts.dir) {
                self.fonts_dir = PathBuf::from(dir);
            }
            if let Some(path) = non_empty(fonts.fallback_path) {
                self.fallback_font_path = Some(PathBuf::from(path));
            }
            if let Some(families) = fonts.fallback_families {
                let families: Vec<String> = families
                    .into_iter()
                    .filter(|family| !family.trim().is_empty())
                    .collect();
                if !families.is_empty() {
                    self.fallback_families = families;
                }
            }
        }
        if let Some(style) = incoming.style {
            let thresholds = &mut self.style;
            if let Some(padding) = style.padding {
                thresholds.padding = padding;
            }
            if let Some(value) = positive(style.min_contrast) {
                thresholds.min_contrast = value;
            }
            if let Some(value) = positive(style.transparent_brightness) {
                thresholds.transparent_brightness = value;
            }
            if let Some(value) = positive(style.bold_edge_density) {
                thresholds.bold_edge_density = value;
            }
            if let Some(value) = style.bold_stroke_width.filter(|value| *value > 0) {
                thresholds.bold_stroke_width = value;
            }
            if let Some(value) = positive(style.italic_ratio) {
                thresholds.italic_ratio = value;
            }
            if let Some(value) = positive(style.align_dominance) {
                thresholds.align_dominance = value;
            }
            if let Some(value) = positive(style.font_size_ratio) {
                thresholds.font_size_ratio = value;
            }
            if let Some(value) = style.min_font_size.filter(|value| *value > 0) {
                thresholds.min_font_size = value;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(honor) = render.honor_alignment {
                self.honor_alignment = honor;
            }
            if let Some(italic) = render.synthetic_italic {
                self.synthetic_italic = italic;
            }
        }
        if let Some(cleanup) = incoming.cleanup {
            if let Some(solid) = cleanup.solid_background {
                self.solid_background = solid;
            }
        }
        if let Some(translate) = incoming.translate {
            if let Some(lang) = non_empty(translate.source_lang) {
                self.source_lang = lang;
            }
        }
    }
}

fn ensure_home_settings_file(home: &Path) -> Result<()> {
    fs::create_dir_all(home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".retypeset"))
        }
    })
}
