use anyhow::Result;
use image::{DynamicImage, GenericImageView, RgbaImage};
use serde::Serialize;
use tracing::{info, warn};

use crate::overlay::{
    Compositor, DetectedRegion, FontCatalog, Point, StyleOverrides, StyleRecord, StyleThresholds,
    TextStyle, detect_source_lang, estimate_style, fill_solid_background,
};
use crate::settings::Settings;

/// Turns source strings into target strings, one for one and in order.
pub trait TextTranslator {
    fn translate(&self, texts: &[String]) -> Result<Vec<String>>;
}

/// Leaves every string as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl TextTranslator for PassThrough {
    fn translate(&self, texts: &[String]) -> Result<Vec<String>> {
        Ok(texts.to_vec())
    }
}

/// Translations produced ahead of time, e.g. read from a file.
#[derive(Debug, Clone, Default)]
pub struct Precomputed(pub Vec<String>);

impl Precomputed {
    /// Lines `translations` up with the regions that reach the translator.
    /// A list with one entry per detected region loses the entries of
    /// regions without text; any other list is used as given.
    pub fn for_regions(translations: Vec<String>, regions: &[DetectedRegion]) -> Self {
        if translations.len() != regions.len() {
            return Self(translations);
        }
        Self(
            translations
                .into_iter()
                .zip(regions)
                .filter(|(_, region)| has_text(region))
                .map(|(text, _)| text)
                .collect(),
        )
    }
}

fn has_text(region: &DetectedRegion) -> bool {
    !region.text.trim().is_empty()
}

impl TextTranslator for Precomputed {
    fn translate(&self, _texts: &[String]) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Inputs of one image job. Nothing here outlives the job.
#[derive(Debug, Clone)]
pub struct ImageJob<'a> {
    pub source: &'a DynamicImage,
    /// Image with the source text already removed. Falls back to the source.
    pub canvas: Option<&'a DynamicImage>,
    pub regions: Vec<DetectedRegion>,
    pub overrides: Option<StyleOverrides>,
    /// Language code or `auto`.
    pub source_lang: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    #[serde(rename = "box")]
    pub polygon: Vec<Point>,
    pub text: String,
    pub translated_text: String,
    pub style: StyleRecord,
    pub font_size: u32,
    pub font_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub source_lang: String,
    pub regions: Vec<RegionReport>,
}

#[derive(Debug)]
pub struct JobOutput {
    pub image: RgbaImage,
    pub report: JobReport,
}

#[derive(Debug)]
pub struct Pipeline {
    pub compositor: Compositor,
    pub thresholds: StyleThresholds,
    pub solid_background: bool,
}

impl Pipeline {
    pub fn from_settings(settings: &Settings) -> Self {
        let catalog = FontCatalog::new(
            settings.fonts_dir.clone(),
            settings.fallback_font_path.clone(),
            settings.fallback_families.clone(),
        );
        let mut compositor = Compositor::new(catalog);
        compositor.honor_alignment = settings.honor_alignment;
        compositor.synthetic_italic = settings.synthetic_italic;
        Self {
            compositor,
            thresholds: settings.style.clone(),
            solid_background: settings.solid_background,
        }
    }

    /// Runs style estimation, translation, fitting and compositing for one
    /// image. Region-level failures degrade; they never fail the job.
    pub fn process(&self, job: &ImageJob<'_>, translator: &dyn TextTranslator) -> JobOutput {
        let regions: Vec<&DetectedRegion> = job
            .regions
            .iter()
            .filter(|region| has_text(region))
            .collect();
        if regions.len() < job.regions.len() {
            info!(
                "pipeline: skipped {} regions without text",
                job.regions.len() - regions.len()
            );
        }
        let texts: Vec<String> = regions.iter().map(|region| region.text.clone()).collect();

        let source_lang = if job.source_lang.trim().eq_ignore_ascii_case("auto") {
            detect_source_lang(&texts).to_string()
        } else {
            job.source_lang.trim().to_string()
        };
        info!(
            "pipeline: {} regions, source language {}",
            regions.len(),
            source_lang
        );

        let styles: Vec<TextStyle> = regions
            .iter()
            .map(|region| {
                let style = estimate_style(job.source, &region.polygon, &self.thresholds);
                match &job.overrides {
                    Some(overrides) => style.with_overrides(overrides),
                    None => style,
                }
            })
            .collect();

        let translated = translate_all(translator, &texts);
        let canvas = self.prepare_canvas(job, &regions);

        let size_override = job
            .overrides
            .as_ref()
            .and_then(StyleOverrides::font_size_override);
        let instructions: Vec<_> = regions
            .iter()
            .zip(&translated)
            .zip(&styles)
            .map(|((region, text), style)| {
                let mut instruction = self.compositor.plan(region, text, style);
                if let Some(size) = size_override {
                    instruction.font_size = size;
                }
                instruction
            })
            .collect();
        let image = self
            .compositor
            .render(&DynamicImage::ImageRgba8(canvas), &instructions);

        let report = JobReport {
            source_lang,
            regions: instructions
                .iter()
                .zip(&regions)
                .map(|(instruction, region)| RegionReport {
                    polygon: region.polygon.clone(),
                    text: region.text.clone(),
                    translated_text: instruction.text.clone(),
                    style: StyleRecord::from(&instruction.style),
                    font_size: instruction.font_size,
                    font_path: instruction.font_path.display().to_string(),
                })
                .collect(),
        };
        info!("pipeline: composited {} regions", report.regions.len());
        JobOutput { image, report }
    }

    fn prepare_canvas(&self, job: &ImageJob<'_>, regions: &[&DetectedRegion]) -> RgbaImage {
        if let Some(canvas) = job.canvas {
            if canvas.dimensions() == job.source.dimensions() {
                return canvas.to_rgba8();
            }
            warn!(
                "pipeline: canvas is {:?} but source is {:?}, drawing on the source",
                canvas.dimensions(),
                job.source.dimensions()
            );
        }
        let mut canvas = job.source.to_rgba8();
        if self.solid_background {
            let polygons: Vec<Vec<Point>> = regions
                .iter()
                .map(|region| region.polygon.clone())
                .collect();
            fill_solid_background(&mut canvas, &polygons);
        }
        canvas
    }
}

/// Translates `texts`, passing the source through for any entry the
/// translator cannot account for.
fn translate_all(translator: &dyn TextTranslator, texts: &[String]) -> Vec<String> {
    let translated = match translator.translate(texts) {
        Ok(translated) => translated,
        Err(err) => {
            warn!("pipeline: translation failed, keeping source text: {:#}", err);
            return texts.to_vec();
        }
    };
    if translated.len() != texts.len() {
        warn!(
            "pipeline: translator returned {} strings for {} inputs",
            translated.len(),
            texts.len()
        );
    }
    texts
        .iter()
        .enumerate()
        .map(|(idx, source)| match translated.get(idx) {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => source.clone(),
        })
        .collect()
}
