use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use imageproc::gradients::sobel_gradients;

use crate::overlay::Alignment;

use super::StyleThresholds;

/// Fraction of pixels whose max-normalized Sobel magnitude exceeds 50.
pub(crate) fn edge_density(gray: &GrayImage) -> f32 {
    let total = gray.width() as usize * gray.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let gradients = sobel_gradients(gray);
    let max = gradients.pixels().map(|p| p[0]).max().unwrap_or(0);
    if max == 0 {
        return 0.0;
    }
    let scale = 255.0 / max as f32;
    let edges = gradients
        .pixels()
        .filter(|p| p[0] as f32 * scale > 50.0)
        .count();
    edges as f32 / total as f32
}

/// Twice the mean distance from ink pixels to the nearest non-ink pixel.
pub(crate) fn stroke_width(ink: &GrayImage) -> u32 {
    let background = GrayImage::from_fn(ink.width(), ink.height(), |x, y| {
        if ink.get_pixel(x, y)[0] == 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    if !background.pixels().any(|p| p[0] > 0) {
        return 0;
    }
    let distances = euclidean_squared_distance_transform(&background);
    let mut sum = 0f64;
    let mut count = 0usize;
    for squared in distances.pixels() {
        let value = squared[0];
        if value > 0.0 && value.is_finite() {
            sum += value.sqrt();
            count += 1;
        }
    }
    if count == 0 {
        return 0;
    }
    (sum / count as f64 * 2.0) as u32
}

pub(crate) fn row_profile(mask: &GrayImage) -> Vec<u64> {
    let mut rows = vec![0u64; mask.height() as usize];
    for (_, y, pixel) in mask.enumerate_pixels() {
        rows[y as usize] += pixel[0] as u64;
    }
    rows
}

pub(crate) fn column_profile(mask: &GrayImage) -> Vec<u64> {
    let mut columns = vec![0u64; mask.width() as usize];
    for (x, _, pixel) in mask.enumerate_pixels() {
        columns[x as usize] += pixel[0] as u64;
    }
    columns
}

/// Slanted text leaves the upper half of the row profile sparser.
pub(crate) fn looks_italic(rows: &[u64], thresholds: &StyleThresholds) -> bool {
    if rows.len() <= 10 {
        return false;
    }
    let mid = rows.len() / 2;
    let upper: u64 = rows[..mid].iter().sum();
    let lower: u64 = rows[mid..].iter().sum();
    (upper as f64) < lower as f64 * thresholds.italic_ratio as f64
}

pub(crate) fn alignment(columns: &[u64], thresholds: &StyleThresholds) -> Alignment {
    let n = columns.len();
    if n == 0 {
        return Alignment::Center;
    }
    let left: u64 = columns[..n / 3].iter().sum();
    let middle: u64 = columns[n / 3..2 * n / 3].iter().sum();
    let right: u64 = columns[2 * n / 3..].iter().sum();
    let dominance = thresholds.align_dominance as f64;
    let dominates = |a: u64, b: u64, c: u64| {
        a as f64 > b as f64 * dominance && a as f64 > c as f64 * dominance
    };
    if dominates(left, middle, right) {
        Alignment::Left
    } else if dominates(right, middle, left) {
        Alignment::Right
    } else {
        Alignment::Center
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with(width: u32, height: u32, ink: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if ink(x, y) { Luma([255]) } else { Luma([0]) }
        })
    }

    #[test]
    fn flat_image_has_no_edges() {
        let gray = GrayImage::from_pixel(20, 20, Luma([128]));
        assert_eq!(edge_density(&gray), 0.0);
    }

    #[test]
    fn thick_bar_has_wide_stroke() {
        let thin = mask_with(30, 30, |x, _| x == 15);
        let thick = mask_with(30, 30, |x, _| (10..20).contains(&x));
        assert!(stroke_width(&thin) <= 2);
        assert!(stroke_width(&thick) > 2);
        assert_eq!(stroke_width(&mask_with(5, 5, |_, _| true)), 0);
    }

    #[test]
    fn bottom_heavy_profile_reads_as_italic() {
        let thresholds = StyleThresholds::default();
        let rows = row_profile(&mask_with(20, 20, |x, y| y >= 10 || x < 2));
        assert!(looks_italic(&rows, &thresholds));
        let even = row_profile(&mask_with(20, 20, |x, _| x < 10));
        assert!(!looks_italic(&even, &thresholds));
        let short = row_profile(&mask_with(20, 8, |_, y| y >= 4));
        assert!(!looks_italic(&short, &thresholds));
    }

    #[test]
    fn column_mass_decides_alignment() {
        let thresholds = StyleThresholds::default();
        let left = column_profile(&mask_with(30, 10, |x, _| x < 8));
        let right = column_profile(&mask_with(30, 10, |x, _| x >= 22));
        let spread = column_profile(&mask_with(30, 10, |x, _| x % 2 == 0));
        assert_eq!(alignment(&left, &thresholds), Alignment::Left);
        assert_eq!(alignment(&right, &thresholds), Alignment::Right);
        assert_eq!(alignment(&spread, &thresholds), Alignment::Center);
        assert_eq!(alignment(&[], &thresholds), Alignment::Center);
    }
}
