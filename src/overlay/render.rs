use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use image::{DynamicImage, Rgba, RgbaImage};
use tiny_skia::{ColorU8, Pixmap};
use tracing::{debug, warn};
use usvg::{Options, Tree, fontdb};

use super::fit::{DEFAULT_FONT_SIZE, find_font_size};
use super::font::{FontMetrics, load_font_metrics, measure_text, resolve_system_font};
use super::script::lookup_script;
use super::style::polygon_bounds;
use super::{Alignment, DetectedRegion, RenderInstruction, TextStyle};
use crate::error::StyleError;

const ITALIC_SKEW_DEG: f32 = -12.0;

/// Where font files live and what to use when one is missing.
#[derive(Debug)]
pub struct FontCatalog {
    fonts_dir: PathBuf,
    fallback_path: Option<PathBuf>,
    fallback_families: Vec<String>,
    system: OnceLock<Option<FontMetrics>>,
}

impl FontCatalog {
    pub fn new(
        fonts_dir: impl Into<PathBuf>,
        fallback_path: Option<PathBuf>,
        fallback_families: Vec<String>,
    ) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            fallback_path,
            fallback_families,
            system: OnceLock::new(),
        }
    }

    /// Font file for `text`, chosen by script. The bold variant is used
    /// when requested and present on disk.
    pub fn font_for(&self, text: &str, bold: bool) -> PathBuf {
        let regular = self.fonts_dir.join(lookup_script(text).font_file);
        if bold {
            if let Some(variant) = bold_variant(&regular).filter(|path| path.exists()) {
                return variant;
            }
        }
        regular
    }

    fn fallback_file(&self) -> Option<&Path> {
        self.fallback_path.as_deref().filter(|path| path.exists())
    }

    fn system_font(&self) -> Option<&FontMetrics> {
        self.system
            .get_or_init(|| match resolve_system_font(&self.fallback_families) {
                Ok(font) => Some(font),
                Err(err) => {
                    warn!("fonts: {}", err);
                    None
                }
            })
            .as_ref()
    }

    /// Loads `path`, walking the fallback chain when it cannot be read.
    pub fn load(&self, path: &Path) -> Result<FontMetrics, StyleError> {
        match load_font_metrics(path) {
            Ok(font) => return Ok(font),
            Err(err) => warn!("fonts: {:#}, trying fallbacks", err),
        }
        if let Some(fallback) = self.fallback_file() {
            match load_font_metrics(fallback) {
                Ok(font) => return Ok(font),
                Err(err) => warn!("fonts: {:#}", err),
            }
        }
        self.system_font()
            .cloned()
            .ok_or_else(|| StyleError::FontAssetMissing(path.to_path_buf()))
    }
}

fn bold_variant(regular: &Path) -> Option<PathBuf> {
    let name = regular.file_name()?.to_str()?;
    if !name.contains("Regular") {
        return None;
    }
    Some(regular.with_file_name(name.replace("Regular", "Bold")))
}

/// Turns translated regions into draw instructions and paints them.
#[derive(Debug)]
pub struct Compositor {
    pub catalog: FontCatalog,
    pub honor_alignment: bool,
    pub synthetic_italic: bool,
}

impl Compositor {
    pub fn new(catalog: FontCatalog) -> Self {
        Self {
            catalog,
            honor_alignment: true,
            synthetic_italic: true,
        }
    }

    /// Resolves the font file and size for `text` drawn over `region`.
    pub fn plan(
        &self,
        region: &DetectedRegion,
        text: &str,
        style: &TextStyle,
    ) -> RenderInstruction {
        let (box_w, box_h) = polygon_bounds(&region.polygon)
            .map(|bounds| (bounds.width(), bounds.height()))
            .unwrap_or((0.0, 0.0));
        let original = Some(region.text.as_str());
        let requested = self.catalog.font_for(text, style.bold);

        let (font_path, font_size) = if requested.exists() {
            let size = find_font_size(&requested, text, box_w, box_h, original);
            (requested, size)
        } else {
            warn!("render: {}", StyleError::FontAssetMissing(requested.clone()));
            if let Some(fallback) = self.catalog.fallback_file() {
                let size = find_font_size(fallback, text, box_w, box_h, original);
                (fallback.to_path_buf(), size)
            } else {
                let system = self
                    .catalog
                    .system_font()
                    .and_then(|font| font.source())
                    .map(Path::to_path_buf);
                (system.unwrap_or(requested), DEFAULT_FONT_SIZE)
            }
        };

        RenderInstruction {
            polygon: region.polygon.clone(),
            text: text.to_string(),
            style: style.clone(),
            font_path,
            font_size,
        }
    }

    /// Paints every instruction onto a copy of `canvas`. A region that fails
    /// is logged and left untouched.
    pub fn render(&self, canvas: &DynamicImage, instructions: &[RenderInstruction]) -> RgbaImage {
        let mut output = canvas.to_rgba8();
        for (idx, instruction) in instructions.iter().enumerate() {
            if let Err(err) = self.paint(&mut output, instruction) {
                warn!("render: skipping region {}: {}", idx, err);
            }
        }
        output
    }

    fn paint(
        &self,
        canvas: &mut RgbaImage,
        instruction: &RenderInstruction,
    ) -> Result<(), StyleError> {
        let bounds = polygon_bounds(&instruction.polygon)
            .filter(|bounds| bounds.width() > 0.0 && bounds.height() > 0.0)
            .ok_or_else(|| {
                let (width, height) = polygon_bounds(&instruction.polygon)
                    .map(|b| (b.width() as i64, b.height() as i64))
                    .unwrap_or((0, 0));
                StyleError::DegenerateRegion { width, height }
            })?;
        let text = instruction.text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let font = self.catalog.load(&instruction.font_path)?;
        let size = instruction.font_size.max(1) as f32;
        let extent = measure_text(text, size, &font);
        let align = if self.honor_alignment {
            instruction.style.align
        } else {
            Alignment::Center
        };
        let ink_x = match align {
            Alignment::Left => bounds.x_min,
            Alignment::Right => bounds.x_max - extent.width,
            Alignment::Center => bounds.x_min + (bounds.width() - extent.width) / 2.0,
        };
        let ink_y = bounds.y_min + (bounds.height() - extent.height) / 2.0;
        let pen_x = ink_x - extent.left;
        let baseline = ink_y + extent.ascent;

        let italic = instruction.style.italic && self.synthetic_italic;
        let slant = if italic {
            extent.ascent.max(0.0) * ITALIC_SKEW_DEG.to_radians().tan().abs()
        } else {
            0.0
        };
        let margin = (size / 4.0).ceil() + 2.0;
        let area = TextArea::clip(
            ink_x - margin,
            ink_y - margin,
            ink_x + extent.width + slant + margin,
            ink_y + extent.height + margin,
            canvas.width(),
            canvas.height(),
        )
        .ok_or_else(|| StyleError::RenderFailure("text falls outside the canvas".to_string()))?;

        let (db, family) = font_database(&font)?;
        let svg = text_svg(
            text,
            &family,
            size,
            instruction.style.color.to_css(),
            pen_x - area.x as f32,
            baseline - area.y as f32,
            italic,
            &area,
        );
        let mut pixmap = seed_pixmap(canvas, &area)?;
        rasterize(&svg, db, family, &mut pixmap)?;
        write_back(canvas, &area, &pixmap);

        debug!(
            "render: '{}' size={} font={} at {},{} {}x{}",
            text,
            instruction.font_size,
            instruction.font_path.display(),
            area.x,
            area.y,
            area.w,
            area.h
        );
        Ok(())
    }
}

/// Canvas rectangle a region is rasterized into.
struct TextArea {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl TextArea {
    fn clip(x0: f32, y0: f32, x1: f32, y1: f32, width: u32, height: u32) -> Option<Self> {
        let left = x0.floor().max(0.0) as u32;
        let top = y0.floor().max(0.0) as u32;
        let right = (x1.ceil().max(0.0) as u32).min(width);
        let bottom = (y1.ceil().max(0.0) as u32).min(height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            x: left,
            y: top,
            w: right - left,
            h: bottom - top,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn text_svg(
    text: &str,
    family: &str,
    size: f32,
    fill: String,
    x: f32,
    y: f32,
    italic: bool,
    area: &TextArea,
) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = area.w,
        h = area.h
    ));
    let (position, transform) = if italic {
        (
            String::from(r#"x="0" y="0""#),
            format!(
                r#" transform="translate({x:.2} {y:.2}) skewX({skew})""#,
                x = x,
                y = y,
                skew = ITALIC_SKEW_DEG
            ),
        )
    } else {
        (format!(r#"x="{:.2}" y="{:.2}""#, x, y), String::new())
    };
    svg.push_str(&format!(
        r#"<text {position}{transform} font-family="{family}" font-size="{size:.2}" fill="{fill}" xml:space="preserve">{text}</text>"#,
        position = position,
        transform = transform,
        family = escape_xml(family),
        size = size,
        fill = fill,
        text = escape_xml(text)
    ));
    svg.push_str("</svg>");
    svg
}

/// Database holding only `font`, with every generic family mapped to it.
fn font_database(font: &FontMetrics) -> Result<(fontdb::Database, String), StyleError> {
    let mut db = fontdb::Database::new();
    db.load_font_data(font.data().to_vec());
    let family = db
        .faces()
        .find(|face| face.index == font.face_index())
        .or_else(|| db.faces().next())
        .and_then(|face| face.families.first())
        .map(|(name, _)| name.clone())
        .or_else(|| font.family().map(str::to_string))
        .ok_or_else(|| StyleError::RenderFailure("font has no usable face".to_string()))?;
    db.set_serif_family(family.as_str());
    db.set_sans_serif_family(family.as_str());
    Ok((db, family))
}

fn seed_pixmap(canvas: &RgbaImage, area: &TextArea) -> Result<Pixmap, StyleError> {
    let mut pixmap = Pixmap::new(area.w, area.h)
        .ok_or_else(|| StyleError::RenderFailure("empty text area".to_string()))?;
    let width = area.w as usize;
    let pixels = pixmap.pixels_mut();
    for dy in 0..area.h {
        for dx in 0..area.w {
            let [r, g, b, a] = canvas.get_pixel(area.x + dx, area.y + dy).0;
            pixels[dy as usize * width + dx as usize] =
                ColorU8::from_rgba(r, g, b, a).premultiply();
        }
    }
    Ok(pixmap)
}

fn rasterize(
    svg: &str,
    db: fontdb::Database,
    family: String,
    pixmap: &mut Pixmap,
) -> Result<(), StyleError> {
    let options = Options {
        fontdb: Arc::new(db),
        font_family: family,
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)
        .map_err(|err| StyleError::RenderFailure(format!("failed to parse SVG: {}", err)))?;
    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    Ok(())
}

fn write_back(canvas: &mut RgbaImage, area: &TextArea, pixmap: &Pixmap) {
    let width = area.w as usize;
    for (idx, pixel) in pixmap.pixels().iter().enumerate() {
        let color = pixel.demultiply();
        let x = area.x + (idx % width) as u32;
        let y = area.y + (idx / width) as u32;
        canvas.put_pixel(
            x,
            y,
            Rgba([color.red(), color.green(), color.blue(), color.alpha()]),
        );
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{Point, Rgb};
    use crate::test_util::system_font_path;

    fn quad(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn catalog(fallback_path: Option<PathBuf>) -> FontCatalog {
        FontCatalog::new(
            "/nonexistent/fonts",
            fallback_path,
            vec!["DejaVu Sans".to_string(), "sans-serif".to_string()],
        )
    }

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        ))
    }

    fn instruction(
        polygon: Vec<Point>,
        text: &str,
        font_path: PathBuf,
        style: TextStyle,
    ) -> RenderInstruction {
        RenderInstruction {
            polygon,
            text: text.to_string(),
            style,
            font_path,
            font_size: 28,
        }
    }

    fn dark_pixels(image: &RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Vec<(u32, u32)> {
        let mut found = Vec::new();
        for y in y0..y1 {
            for x in x0..x1 {
                if image.get_pixel(x, y).0[0] < 128 {
                    found.push((x, y));
                }
            }
        }
        found
    }

    #[test]
    fn bold_variant_only_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("NotoSansSC-Regular.otf"), b"").unwrap();
        let catalog = FontCatalog::new(dir.path(), None, Vec::new());
        assert_eq!(
            catalog.font_for("hello", true),
            dir.path().join("NotoSansSC-Regular.otf")
        );
        std::fs::write(dir.path().join("NotoSansSC-Bold.otf"), b"").unwrap();
        assert_eq!(
            catalog.font_for("hello", true),
            dir.path().join("NotoSansSC-Bold.otf")
        );
        assert_eq!(
            catalog.font_for("hello", false),
            dir.path().join("NotoSansSC-Regular.otf")
        );
        assert_eq!(
            catalog.font_for("สวัสดี", false),
            dir.path().join("NotoSansThai-Regular.ttf")
        );
    }

    #[test]
    fn xml_is_escaped() {
        assert_eq!(escape_xml(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
    }

    #[test]
    fn degenerate_region_leaves_canvas_untouched() {
        let compositor = Compositor::new(catalog(None));
        let canvas = white(40, 40);
        let output = compositor.render(
            &canvas,
            &[instruction(
                vec![Point::new(10.0, 10.0); 4],
                "Hi",
                PathBuf::from("/nonexistent/font.ttf"),
                TextStyle::default(),
            )],
        );
        assert_eq!(output, canvas.to_rgba8());
    }

    #[test]
    fn missing_font_region_still_painted_with_fallback() {
        let Some(font_path) = system_font_path() else {
            return;
        };
        let compositor = Compositor::new(catalog(None));
        let output = compositor.render(
            &white(240, 120),
            &[
                instruction(
                    quad(10.0, 10.0, 110.0, 50.0),
                    "Sale",
                    PathBuf::from("/nonexistent/NotoSansThai-Regular.ttf"),
                    TextStyle::default(),
                ),
                instruction(
                    quad(10.0, 70.0, 230.0, 110.0),
                    "Open",
                    font_path,
                    TextStyle::default(),
                ),
            ],
        );
        assert!(!dark_pixels(&output, 10, 10, 110, 50).is_empty());
        assert!(!dark_pixels(&output, 10, 70, 230, 110).is_empty());
        assert!(dark_pixels(&output, 0, 55, 240, 65).is_empty());
    }

    #[test]
    fn text_uses_the_style_color() {
        let Some(font_path) = system_font_path() else {
            return;
        };
        let compositor = Compositor::new(catalog(None));
        let style = TextStyle {
            color: Rgb([200, 0, 0]),
            ..TextStyle::default()
        };
        let output = compositor.render(
            &white(120, 60),
            &[instruction(quad(10.0, 10.0, 110.0, 50.0), "HHH", font_path, style)],
        );
        let reds = output
            .pixels()
            .filter(|pixel| pixel.0[0] > 180 && pixel.0[1] < 40 && pixel.0[2] < 40)
            .count();
        assert!(reds > 0);
    }

    #[test]
    fn alignment_moves_ink() {
        let Some(font_path) = system_font_path() else {
            return;
        };
        let leftmost = |compositor: &Compositor, align: Alignment| {
            let style = TextStyle {
                align,
                ..TextStyle::default()
            };
            let output = compositor.render(
                &white(220, 70),
                &[instruction(quad(10.0, 10.0, 210.0, 60.0), "Hi", font_path.clone(), style)],
            );
            dark_pixels(&output, 0, 0, 220, 70)
                .into_iter()
                .map(|(x, _)| x)
                .min()
        };

        let honoring = Compositor::new(catalog(None));
        let left = leftmost(&honoring, Alignment::Left).unwrap();
        let center = leftmost(&honoring, Alignment::Center).unwrap();
        let right = leftmost(&honoring, Alignment::Right).unwrap();
        assert!((8..=14).contains(&left), "left edge at {}", left);
        assert!(center > left + 40);
        assert!(right > center + 40);

        let mut centered = Compositor::new(catalog(None));
        centered.honor_alignment = false;
        assert_eq!(leftmost(&centered, Alignment::Left), Some(center));
    }

    #[test]
    fn plan_without_any_font_file_uses_default_size() {
        let compositor = Compositor::new(catalog(None));
        let region = DetectedRegion {
            polygon: quad(0.0, 0.0, 200.0, 50.0),
            text: "你好".to_string(),
        };
        let planned = compositor.plan(&region, "Hello", &TextStyle::default());
        assert_eq!(planned.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(planned.text, "Hello");
        assert_eq!(planned.polygon, region.polygon);
    }

    #[test]
    fn plan_sizes_with_the_fallback_file() {
        let Some(font_path) = system_font_path() else {
            return;
        };
        let compositor = Compositor::new(catalog(Some(font_path.clone())));
        let region = DetectedRegion {
            polygon: quad(0.0, 0.0, 200.0, 50.0),
            text: "Hello".to_string(),
        };
        let planned = compositor.plan(&region, "Hello", &TextStyle::default());
        assert_eq!(planned.font_path, font_path);
        assert_eq!(
            planned.font_size,
            find_font_size(&font_path, "Hello", 200.0, 50.0, Some("Hello"))
        );
    }
}
