use std::path::Path;

use tracing::{debug, warn};

use super::font::{FontMetrics, load_font_metrics, measure_text};
use super::script::lookup_script;

/// Size used when no font can be measured.
pub const DEFAULT_FONT_SIZE: u32 = 24;

const SEARCH_MIN: u32 = 8;
const SEARCH_MAX: u32 = 200;
const SEARCH_STEPS: usize = 15;
const FIT_LIMIT: f32 = 0.95;
const FINAL_MIN: u32 = 10;
const FINAL_MAX: u32 = 120;

/// Share of the box the rendered text should fill: large boxes are filled
/// more, small ones less.
pub fn target_fill_ratio(max_width: f32, max_height: f32) -> f32 {
    if max_width > 300.0 || max_height > 100.0 {
        0.8
    } else if max_width < 100.0 || max_height < 30.0 {
        0.6
    } else {
        0.7
    }
}

/// `min(1, original / translated)` character counts, with the translated
/// count scaled by its script's width factor.
pub(crate) fn length_ratio(text: &str, original_text: Option<&str>) -> f32 {
    let Some(original) = original_text.filter(|value| !value.is_empty()) else {
        return 1.0;
    };
    let original_chars = original.chars().count() as f32;
    let translated_chars = text.chars().count() as f32 * lookup_script(text).width_factor;
    (original_chars / translated_chars.max(1.0)).min(1.0)
}

/// Largest font size whose rendering of `text` fills the box close to its
/// target ratio, damped by how much longer the translation is than the
/// original. Falls back to `DEFAULT_FONT_SIZE` when the font is unusable.
pub fn find_font_size(
    font_path: &Path,
    text: &str,
    max_width: f32,
    max_height: f32,
    original_text: Option<&str>,
) -> u32 {
    if !font_path.exists() {
        warn!(
            "font-fit: {} not found, using size {}",
            font_path.display(),
            DEFAULT_FONT_SIZE
        );
        return DEFAULT_FONT_SIZE;
    }
    match load_font_metrics(font_path) {
        Ok(font) => fit_font_size(&font, text, max_width, max_height, original_text),
        Err(err) => {
            warn!("font-fit: {}, using size {}", err, DEFAULT_FONT_SIZE);
            DEFAULT_FONT_SIZE
        }
    }
}

pub fn fit_font_size(
    font: &FontMetrics,
    text: &str,
    max_width: f32,
    max_height: f32,
    original_text: Option<&str>,
) -> u32 {
    let target = target_fill_ratio(max_width, max_height);
    let box_w = max_width.max(1.0);
    let box_h = max_height.max(1.0);

    let mut low = SEARCH_MIN;
    let mut high = SEARCH_MAX;
    let mut best = SEARCH_MIN;
    let mut best_gap = f32::INFINITY;
    for _ in 0..SEARCH_STEPS {
        let size = (low + high) / 2;
        let extent = measure_text(text, size as f32, font);
        let ratio = (extent.width / box_w).max(extent.height / box_h);
        if ratio <= FIT_LIMIT {
            let gap = (ratio - target).abs();
            if gap < best_gap {
                best_gap = gap;
                best = size;
            }
            low = size;
        } else {
            high = size;
        }
    }

    let length_ratio = length_ratio(text, original_text);
    let adjusted = (best as f32 * (length_ratio * 0.7 + 0.3)) as u32;
    let size = adjusted.clamp(FINAL_MIN, FINAL_MAX);
    debug!(
        "font-fit: '{}' in {}x{} target={} best={} length_ratio={:.2} size={}",
        text, max_width, max_height, target, best, length_ratio, size
    );
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{system_font, system_font_path};

    #[test]
    fn target_ratio_follows_box_size() {
        assert_eq!(target_fill_ratio(400.0, 50.0), 0.8);
        assert_eq!(target_fill_ratio(200.0, 120.0), 0.8);
        assert_eq!(target_fill_ratio(80.0, 50.0), 0.6);
        assert_eq!(target_fill_ratio(200.0, 20.0), 0.6);
        assert_eq!(target_fill_ratio(100.0, 100.0), 0.7);
    }

    #[test]
    fn longer_translations_shrink() {
        assert_eq!(length_ratio("abc", None), 1.0);
        assert_eq!(length_ratio("abc", Some("")), 1.0);
        assert_eq!(length_ratio("ab", Some("abcd")), 1.0);
        assert!((length_ratio("abcdefgh", Some("abcd")) - 0.5).abs() < 1e-6);
        // Thai glyphs count 1.2x.
        let thai = "สวัสดี";
        let expected = 3.0 / (thai.chars().count() as f32 * 1.2);
        assert!((length_ratio(thai, Some("abc")) - expected).abs() < 1e-6);
    }

    #[test]
    fn missing_font_uses_default_size() {
        let size = find_font_size(
            Path::new("/nonexistent/NotoSansSC-Regular.otf"),
            "hello",
            200.0,
            50.0,
            Some("hello"),
        );
        assert_eq!(size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn search_is_deterministic() {
        let Some(path) = system_font_path() else {
            return;
        };
        let first = find_font_size(&path, "Grand opening", 240.0, 60.0, Some("盛大开业"));
        for _ in 0..5 {
            assert_eq!(
                find_font_size(&path, "Grand opening", 240.0, 60.0, Some("盛大开业")),
                first
            );
        }
        assert!((FINAL_MIN..=FINAL_MAX).contains(&first));
    }

    #[test]
    fn converges_near_target_ratio() {
        let Some(font) = system_font() else {
            return;
        };
        if font.family() != Some("DejaVu Sans") {
            return;
        }
        let size = fit_font_size(&font, "Text", 100.0, 100.0, Some("Text"));
        let extent = measure_text("Text", size as f32, &font);
        let ratio = (extent.width / 100.0).max(extent.height / 100.0);
        assert!((ratio - 0.7).abs() <= 0.05, "size {} ratio {}", size, ratio);
    }

    #[test]
    fn oversized_text_stays_within_clamp() {
        let Some(font) = system_font() else {
            return;
        };
        let tiny = fit_font_size(&font, "a very long sentence that cannot fit", 10.0, 5.0, None);
        assert_eq!(tiny, FINAL_MIN);
        let huge = fit_font_size(&font, "I", 4000.0, 4000.0, None);
        assert!(huge <= FINAL_MAX);
    }
}
