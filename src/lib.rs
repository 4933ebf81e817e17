use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod error;
pub mod logging;
pub mod overlay;
pub mod pipeline;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use error::StyleError;
pub use pipeline::{
    ImageJob, JobOutput, JobReport, PassThrough, Pipeline, Precomputed, RegionReport,
    TextTranslator,
};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: PathBuf,
    pub regions: PathBuf,
    pub translations: Option<PathBuf>,
    pub canvas: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub style_overrides: Option<PathBuf>,
    pub source_lang: Option<String>,
    pub solid_background: bool,
    pub no_align: bool,
    pub settings_path: Option<PathBuf>,
    /// Per-user settings directory. Defaults to `~/.retypeset`.
    pub settings_home: Option<PathBuf>,
}

/// Runs one job from files on disk. Returns the JSON report when no report
/// path was given, otherwise an empty string.
pub fn run(config: Config) -> Result<String> {
    let home = config.settings_home.clone().or_else(settings::home_dir);
    let mut settings =
        settings::load_settings_from(home.as_deref(), config.settings_path.as_deref())?;
    if config.solid_background {
        settings.solid_background = true;
    }
    if config.no_align {
        settings.honor_alignment = false;
    }
    let source_lang = config
        .source_lang
        .clone()
        .filter(|lang| !lang.trim().is_empty())
        .unwrap_or_else(|| settings.source_lang.clone());

    let source = open_image(&config.image)?;
    let canvas = config.canvas.as_deref().map(open_image).transpose()?;
    let regions: Vec<overlay::DetectedRegion> = read_json(&config.regions, "regions")?;
    let overrides = match config.style_overrides.as_deref() {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read style overrides: {}", path.display()))?;
            Some(
                overlay::StyleOverrides::from_json(&raw)
                    .with_context(|| format!("invalid style overrides: {}", path.display()))?,
            )
        }
        None => None,
    };
    let translator: Box<dyn TextTranslator> = match config.translations.as_deref() {
        Some(path) => Box::new(Precomputed::for_regions(
            read_json(path, "translations")?,
            &regions,
        )),
        None => Box::new(PassThrough),
    };

    let pipeline = Pipeline::from_settings(&settings);
    let job = ImageJob {
        source: &source,
        canvas: canvas.as_ref(),
        regions,
        overrides,
        source_lang,
    };
    let output = pipeline.process(&job, translator.as_ref());

    let output_path = config
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&config.image));
    save_image(output.image, &output_path)?;
    info!("wrote {}", output_path.display());

    let report = serde_json::to_string_pretty(&output.report)
        .with_context(|| "failed to serialize report")?;
    match config.report.as_deref() {
        Some(path) => {
            fs::write(path, &report)
                .with_context(|| format!("failed to write report: {}", path.display()))?;
            Ok(String::new())
        }
        None => Ok(report),
    }
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to open image: {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}: {}", what, path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}: {}", what, path.display()))
}

/// `<dir>/<stem>_translated.png` next to the source image.
pub fn default_output_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    image.with_file_name(format!("{}_translated.png", stem))
}

fn save_image(image: image::RgbaImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|_| anyhow!("unsupported output image type: {}", path.display()))?;
    let image = DynamicImage::ImageRgba8(image);
    let image = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    image
        .save_with_format(path, format)
        .with_context(|| format!("failed to write image: {}", path.display()))
}
