mod cluster;
mod geom;
mod metrics;
mod preprocess;

use image::{DynamicImage, GenericImageView, GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use tracing::{debug, warn};

use crate::error::StyleError;
use crate::overlay::{Point, Rgb, TextStyle, luma_of};

use cluster::{KMeansConfig, distance, distinct_colors, kmeans};

pub(crate) use geom::polygon_bounds;
pub(crate) use preprocess::to_rgb;

/// Tunable constants of the style heuristics. The defaults are hand-picked,
/// not derived from a model.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleThresholds {
    pub padding: u32,
    pub min_contrast: f32,
    pub transparent_brightness: f32,
    pub bold_edge_density: f32,
    pub bold_stroke_width: u32,
    pub italic_ratio: f32,
    pub align_dominance: f32,
    pub font_size_ratio: f32,
    pub min_font_size: u32,
}

impl Default for StyleThresholds {
    fn default() -> Self {
        Self {
            padding: 5,
            min_contrast: 40.0,
            transparent_brightness: 240.0,
            bold_edge_density: 0.15,
            bold_stroke_width: 2,
            italic_ratio: 0.7,
            align_dominance: 1.5,
            font_size_ratio: 0.85,
            min_font_size: 12,
        }
    }
}

struct ColorSplit {
    text: Rgb,
    background: Rgb,
}

/// Estimates the style of the text inside `polygon`. Never fails: a region
/// that cannot be analyzed gets `TextStyle::default()`.
pub fn estimate_style(
    image: &DynamicImage,
    polygon: &[Point],
    thresholds: &StyleThresholds,
) -> TextStyle {
    match analyze_region(image, polygon, thresholds) {
        Ok(style) => style,
        Err(err) => {
            warn!("style: {}, using default style", err);
            TextStyle::default()
        }
    }
}

fn analyze_region(
    image: &DynamicImage,
    polygon: &[Point],
    thresholds: &StyleThresholds,
) -> Result<TextStyle, StyleError> {
    let (width, height) = image.dimensions();
    let rect = geom::padded_crop(polygon, thresholds.padding, width, height)?;
    let region = to_rgb(&image.crop_imm(rect.x, rect.y, rect.w, rect.h));

    let gray = preprocess::grayscale(&region);
    let ink = preprocess::ink_mask(&gray);
    let strokes = preprocess::stroke_mask(&ink);
    let border = preprocess::border_background(&region);

    let pixels: Vec<[u8; 3]> = region.pixels().map(|p| p.0).collect();
    let split = split_colors(&pixels, border).unwrap_or_else(|err| {
        warn!("style: {}, falling back to black on white", err);
        ColorSplit {
            text: Rgb::BLACK,
            background: Rgb::WHITE,
        }
    });
    let color = contrast_guard(split.text, border, thresholds);

    let background = refine_background(&region, &strokes, thresholds).unwrap_or_else(|err| {
        warn!("style: background refinement skipped: {}", err);
        None
    });

    let font_size =
        ((rect.h as f32 * thresholds.font_size_ratio).round() as u32).max(thresholds.min_font_size);

    let edge_density = metrics::edge_density(&gray);
    let stroke_width = metrics::stroke_width(&ink);
    let bold =
        edge_density > thresholds.bold_edge_density || stroke_width > thresholds.bold_stroke_width;
    let italic = metrics::looks_italic(&metrics::row_profile(&strokes), thresholds);
    let align = metrics::alignment(&metrics::column_profile(&strokes), thresholds);

    debug!(
        "style: rect={}x{}+{}+{} text={:?} cluster_bg={:?} bg={:?} size={} edges={:.3} stroke={} bold={} italic={} align={:?}",
        rect.w,
        rect.h,
        rect.x,
        rect.y,
        color,
        split.background,
        background,
        font_size,
        edge_density,
        stroke_width,
        bold,
        italic,
        align
    );

    Ok(TextStyle {
        color,
        background,
        font_size,
        bold,
        italic,
        align,
        width: rect.w,
        height: rect.h,
        stroke_width,
    })
}

/// Two-color split of the crop: the center farther from the border estimate
/// is the ink.
fn split_colors(pixels: &[[u8; 3]], border: [f32; 3]) -> Result<ColorSplit, StyleError> {
    let config = KMeansConfig {
        k: 2,
        max_iter: 10,
        epsilon: 1.0,
    };
    let clusters = kmeans(pixels, &config)?;
    let (first, second) = (clusters.centers[0], clusters.centers[1]);
    let (text, background) = if distance(&first, &border) > distance(&second, &border) {
        (first, second)
    } else {
        (second, first)
    };
    Ok(ColorSplit {
        text: Rgb::from_f32(text),
        background: Rgb::from_f32(background),
    })
}

/// Replaces an ink color that would be unreadable on `border` with black or
/// white.
fn contrast_guard(text: Rgb, border: [f32; 3], thresholds: &StyleThresholds) -> Rgb {
    let background_luma = luma_of(border);
    if (text.luma() - background_luma).abs() >= thresholds.min_contrast {
        return text;
    }
    if background_luma > 128.0 {
        Rgb::BLACK
    } else {
        Rgb::WHITE
    }
}

fn refine_background(
    region: &RgbImage,
    strokes: &GrayImage,
    thresholds: &StyleThresholds,
) -> Result<Option<Rgb>, StyleError> {
    let samples: Vec<[u8; 3]> = region
        .enumerate_pixels()
        .filter(|(x, y, _)| strokes.get_pixel(*x, *y)[0] == 0)
        .map(|(_, _, pixel)| pixel.0)
        .collect();
    if samples.len() <= 10 {
        return Ok(None);
    }
    let wanted = (samples.len() / 50 + 1).min(3);
    let config = KMeansConfig {
        k: wanted.min(distinct_colors(&samples, wanted)).max(1),
        max_iter: 200,
        epsilon: 0.1,
    };
    let clusters = kmeans(&samples, &config)?;
    let center = clusters
        .largest()
        .ok_or_else(|| StyleError::ClusteringFailure("no background cluster".to_string()))?;
    let color = Rgb::from_f32(center);
    if color.brightness() > thresholds.transparent_brightness {
        return Ok(None);
    }
    Ok(Some(color))
}

/// Most common color inside the filled polygon, swapped for black or white
/// when it is too bright or too dark to be used as a text color.
pub fn extract_dominant_color(image: &DynamicImage, polygon: &[Point]) -> Rgb {
    match dominant_color(image, polygon) {
        Ok(color) => {
            let brightness = color.brightness();
            if brightness > 200.0 {
                Rgb::BLACK
            } else if brightness < 50.0 {
                Rgb::WHITE
            } else {
                color
            }
        }
        Err(err) => {
            warn!("dominant color: {}", err);
            Rgb::BLACK
        }
    }
}

fn dominant_color(image: &DynamicImage, polygon: &[Point]) -> Result<Rgb, StyleError> {
    let bounds = polygon_bounds(polygon).ok_or(StyleError::DegenerateRegion {
        width: 0,
        height: 0,
    })?;
    let (image_w, image_h) = image.dimensions();
    let x0 = (bounds.x_min.floor().max(0.0) as u32).min(image_w);
    let y0 = (bounds.y_min.floor().max(0.0) as u32).min(image_h);
    let x1 = ((bounds.x_max.floor() + 1.0).max(0.0) as u32).min(image_w);
    let y1 = ((bounds.y_max.floor() + 1.0).max(0.0) as u32).min(image_h);
    if x1 <= x0 || y1 <= y0 {
        return Err(StyleError::DegenerateRegion {
            width: x1 as i64 - x0 as i64,
            height: y1 as i64 - y0 as i64,
        });
    }

    let mut outline: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(polygon.len());
    for point in polygon {
        let local = imageproc::point::Point::new(
            point.x.floor() as i32 - x0 as i32,
            point.y.floor() as i32 - y0 as i32,
        );
        if outline.last() != Some(&local) {
            outline.push(local);
        }
    }
    while outline.len() > 1 && outline.first() == outline.last() {
        outline.pop();
    }
    if outline.len() < 3 {
        return Err(StyleError::DegenerateRegion {
            width: (x1 - x0) as i64,
            height: (y1 - y0) as i64,
        });
    }

    let mut mask = GrayImage::new(x1 - x0, y1 - y0);
    draw_polygon_mut(&mut mask, &outline, Luma([255u8]));
    let region = to_rgb(&image.crop_imm(x0, y0, x1 - x0, y1 - y0));
    let pixels: Vec<[u8; 3]> = region
        .enumerate_pixels()
        .filter(|(x, y, _)| mask.get_pixel(*x, *y)[0] > 0)
        .map(|(_, _, pixel)| pixel.0)
        .collect();
    if pixels.is_empty() {
        return Err(StyleError::ClusteringFailure("polygon covers no pixels".to_string()));
    }
    let wanted = pixels.len().min(3);
    let config = KMeansConfig {
        k: wanted.min(distinct_colors(&pixels, wanted)).max(1),
        max_iter: 100,
        epsilon: 0.5,
    };
    let clusters = kmeans(&pixels, &config)?;
    let center = clusters
        .largest()
        .ok_or_else(|| StyleError::ClusteringFailure("no dominant cluster".to_string()))?;
    Ok(Rgb::from_f32(center))
}
