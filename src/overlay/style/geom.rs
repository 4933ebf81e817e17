use crate::error::StyleError;
use crate::overlay::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CropRect {
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) w: u32,
    pub(crate) h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bounds {
    pub(crate) x_min: f32,
    pub(crate) y_min: f32,
    pub(crate) x_max: f32,
    pub(crate) y_max: f32,
}

impl Bounds {
    pub(crate) fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub(crate) fn height(&self) -> f32 {
        self.y_max - self.y_min
    }
}

pub(crate) fn polygon_bounds(polygon: &[Point]) -> Option<Bounds> {
    let first = polygon.first()?;
    let mut bounds = Bounds {
        x_min: first.x,
        y_min: first.y,
        x_max: first.x,
        y_max: first.y,
    };
    for point in polygon {
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }
        bounds.x_min = bounds.x_min.min(point.x);
        bounds.y_min = bounds.y_min.min(point.y);
        bounds.x_max = bounds.x_max.max(point.x);
        bounds.y_max = bounds.y_max.max(point.y);
    }
    Some(bounds)
}

/// Axis-aligned box of `polygon` grown by `padding` and clamped to the image.
pub(crate) fn padded_crop(
    polygon: &[Point],
    padding: u32,
    image_w: u32,
    image_h: u32,
) -> Result<CropRect, StyleError> {
    let degenerate = |width: i64, height: i64| StyleError::DegenerateRegion { width, height };
    if polygon.len() < 3 {
        return Err(degenerate(0, 0));
    }
    let bounds = polygon_bounds(polygon).ok_or_else(|| degenerate(0, 0))?;
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Err(degenerate(bounds.width() as i64, bounds.height() as i64));
    }

    let padding = padding as i64;
    let x_min = (bounds.x_min.trunc() as i64 - padding).max(0);
    let y_min = (bounds.y_min.trunc() as i64 - padding).max(0);
    let x_max = (bounds.x_max.trunc() as i64 + padding).min(image_w as i64);
    let y_max = (bounds.y_max.trunc() as i64 + padding).min(image_h as i64);
    if x_max <= x_min || y_max <= y_min {
        return Err(degenerate(x_max - x_min, y_max - y_min));
    }
    Ok(CropRect {
        x: x_min as u32,
        y: y_min as u32,
        w: (x_max - x_min) as u32,
        h: (y_max - y_min) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn pads_and_clamps_to_image() {
        let rect = padded_crop(&quad(2.0, 10.0, 40.0, 30.0), 5, 42, 100).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 5,
                w: 42,
                h: 30
            }
        );
    }

    #[test]
    fn rejects_collapsed_polygons() {
        let point = vec![Point::new(50.0, 50.0); 4];
        assert!(matches!(
            padded_crop(&point, 5, 100, 100),
            Err(StyleError::DegenerateRegion { .. })
        ));
        let line = quad(10.0, 20.0, 60.0, 20.0);
        assert!(padded_crop(&line, 5, 100, 100).is_err());
        assert!(padded_crop(&quad(0.0, 0.0, 5.0, 5.0)[..2], 5, 100, 100).is_err());
    }

    #[test]
    fn rejects_regions_outside_the_image() {
        let far = quad(500.0, 500.0, 600.0, 540.0);
        assert!(padded_crop(&far, 5, 100, 100).is_err());
    }
}
