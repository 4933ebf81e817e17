use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use super::Point;
use super::style::polygon_bounds;

const SAMPLE_MARGIN: i64 = 3;
const FILL_EXPAND: i64 = 2;

/// Covers each polygon's bounding box with the mean color found just outside
/// it. Used in place of inpainting when a flat background is good enough.
/// Polygons are processed in order, so later samples see earlier fills.
pub fn fill_solid_background(image: &mut RgbaImage, polygons: &[Vec<Point>]) {
    for polygon in polygons {
        let Some(bounds) = polygon_bounds(polygon) else {
            continue;
        };
        let (width, height) = (image.width() as i64, image.height() as i64);
        let x_min = (bounds.x_min.trunc() as i64).max(0);
        let y_min = (bounds.y_min.trunc() as i64).max(0);
        let x_max = (bounds.x_max.trunc() as i64).min(width);
        let y_max = (bounds.y_max.trunc() as i64).min(height);
        if x_max <= x_min || y_max <= y_min {
            continue;
        }

        let color = ring_color(image, x_min, y_min, x_max, y_max)
            .or_else(|| corner_color(image, x_min, y_min, x_max, y_max))
            .unwrap_or(Rgba([0, 0, 0, 255]));

        // The filled box is inclusive of its far corner.
        let x1 = (x_min - FILL_EXPAND).max(0);
        let y1 = (y_min - FILL_EXPAND).max(0);
        let x2 = (x_max + FILL_EXPAND).min(width);
        let y2 = (y_max + FILL_EXPAND).min(height);
        let rect =
            Rect::at(x1 as i32, y1 as i32).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32);
        draw_filled_rect_mut(image, rect, color);
        debug!("cleanup: filled ({},{})-({},{}) with {:?}", x1, y1, x2, y2, color.0);
    }
}

/// Mean of the columns and rows `SAMPLE_MARGIN` pixels outside the box,
/// skipping sides that fall off the image.
fn ring_color(
    image: &RgbaImage,
    x_min: i64,
    y_min: i64,
    x_max: i64,
    y_max: i64,
) -> Option<Rgba<u8>> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let rows = (y_min - SAMPLE_MARGIN).max(0)..(y_max + SAMPLE_MARGIN).min(height);
    let cols = (x_min - SAMPLE_MARGIN).max(0)..(x_max + SAMPLE_MARGIN).min(width);

    let mut samples = Vec::new();
    if x_min > SAMPLE_MARGIN {
        samples.extend(rows.clone().map(|y| (x_min - SAMPLE_MARGIN, y)));
    }
    if x_max + SAMPLE_MARGIN < width {
        samples.extend(rows.clone().map(|y| (x_max + SAMPLE_MARGIN, y)));
    }
    if y_min > SAMPLE_MARGIN {
        samples.extend(cols.clone().map(|x| (x, y_min - SAMPLE_MARGIN)));
    }
    if y_max + SAMPLE_MARGIN < height {
        samples.extend(cols.map(|x| (x, y_max + SAMPLE_MARGIN)));
    }
    mean_color(image, &samples)
}

fn corner_color(
    image: &RgbaImage,
    x_min: i64,
    y_min: i64,
    x_max: i64,
    y_max: i64,
) -> Option<Rgba<u8>> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let left = (x_min - 1).max(0);
    let top = (y_min - 1).max(0);
    let right = x_max.min(width - 1);
    let bottom = y_max.min(height - 1);
    let corners: Vec<(i64, i64)> = [(left, top), (right, top), (left, bottom), (right, bottom)]
        .into_iter()
        .filter(|(x, y)| (0..width).contains(x) && (0..height).contains(y))
        .collect();
    mean_color(image, &corners)
}

fn mean_color(image: &RgbaImage, points: &[(i64, i64)]) -> Option<Rgba<u8>> {
    if points.is_empty() {
        return None;
    }
    let mut sum = [0u64; 3];
    for (x, y) in points {
        let pixel = image.get_pixel(*x as u32, *y as u32);
        for (acc, value) in sum.iter_mut().zip(pixel.0) {
            *acc += value as u64;
        }
    }
    let count = points.len() as u64;
    Some(Rgba([
        (sum[0] / count) as u8,
        (sum[1] / count) as u8,
        (sum[2] / count) as u8,
        255,
    ]))
}
