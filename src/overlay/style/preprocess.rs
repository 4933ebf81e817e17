use image::{DynamicImage, GrayImage, Luma, Rgb as RgbPixel, RgbImage};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

/// Normalizes any color depth to 8-bit RGB, compositing alpha over white.
pub(crate) fn to_rgb(image: &DynamicImage) -> RgbImage {
    if let DynamicImage::ImageRgb8(rgb) = image {
        return rgb.clone();
    }
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let blend = |value: u8| (value as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, RgbPixel([blend(r), blend(g), blend(b)]));
    }
    rgb
}

pub(crate) fn grayscale(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let value = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
        luma.put_pixel(x, y, Luma([value]));
    }
    luma
}

/// Otsu split of `gray` with dark ink mapped to 255.
pub(crate) fn ink_mask(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::BinaryInverted)
}

/// 3x3 dilation of the ink mask.
pub(crate) fn stroke_mask(ink: &GrayImage) -> GrayImage {
    dilate(ink, Norm::LInf, 1)
}

/// Mean color of the 1-pixel border ring, or of the whole crop when it is
/// too small to have an interior.
pub(crate) fn border_background(region: &RgbImage) -> [f32; 3] {
    let (width, height) = region.dimensions();
    let mut sum = [0f64; 3];
    let mut count = 0usize;
    let has_ring = width > 2 && height > 2;
    for (x, y, pixel) in region.enumerate_pixels() {
        let on_ring = x == 0 || y == 0 || x == width - 1 || y == height - 1;
        if has_ring && !on_ring {
            continue;
        }
        for (acc, value) in sum.iter_mut().zip(pixel.0) {
            *acc += value as f64;
        }
        count += 1;
    }
    if count == 0 {
        return [255.0; 3];
    }
    let count = count as f64;
    [
        (sum[0] / count) as f32,
        (sum[1] / count) as f32,
        (sum[2] / count) as f32,
    ]
}
