use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
    face_index: u32,
    source: Option<PathBuf>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("source", &self.source)
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    /// File the face was read from, when known.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Ink bounding box of a single line of text, in pixels. `left` is the ink
/// offset from the pen origin and `ascent` the ink top above the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
    pub left: f32,
    pub ascent: f32,
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    let mut metrics = load_font_metrics_from_data(Arc::new(data), 0)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))?;
    metrics.source = Some(path.to_path_buf());
    Ok(metrics)
}

/// First installed font matching one of `families`, in order.
/// `sans-serif`, `serif` and `monospace` map to the generic families.
pub fn resolve_system_font<S: AsRef<str>>(families: &[S]) -> Result<FontMetrics> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    for candidate in families {
        if let Ok(metrics) = load_font_metrics_from_family(&db, candidate.as_ref()) {
            return Ok(metrics);
        }
    }
    Err(anyhow!("no fallback fonts found"))
}

pub fn measure_text(text: &str, font_size: f32, font: &FontMetrics) -> TextExtent {
    let Ok(face) = Face::parse(&font.data, font.face_index) else {
        return estimate_extent(text, font_size);
    };
    let scale = font_size / font.units_per_em.max(1) as f32;

    let mut pen = 0i64;
    let mut ink: Option<(i64, i64, i64, i64)> = None;
    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            continue;
        }
        let glyph = face.glyph_index(ch);
        let advance = glyph
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(font.space_advance) as i64;
        if let Some(rect) = glyph.and_then(|id| face.glyph_bounding_box(id)) {
            let glyph_box = (
                pen + rect.x_min as i64,
                rect.y_min as i64,
                pen + rect.x_max as i64,
                rect.y_max as i64,
            );
            ink = Some(match ink {
                Some((x0, y0, x1, y1)) => (
                    x0.min(glyph_box.0),
                    y0.min(glyph_box.1),
                    x1.max(glyph_box.2),
                    y1.max(glyph_box.3),
                ),
                None => glyph_box,
            });
        }
        pen += advance;
    }

    match ink {
        Some((x0, y0, x1, y1)) => TextExtent {
            width: (x1 - x0) as f32 * scale,
            height: (y1 - y0) as f32 * scale,
            left: x0 as f32 * scale,
            ascent: y1 as f32 * scale,
        },
        None => TextExtent {
            width: pen as f32 * scale,
            height: (font.ascender as f32 - font.descender as f32) * scale,
            left: 0.0,
            ascent: font.ascender as f32 * scale,
        },
    }
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_extent(text: &str, font_size: f32) -> TextExtent {
    let units: f32 = text.chars().map(estimate_char_units_for_width).sum();
    TextExtent {
        width: units * font_size,
        height: font_size,
        left: 0.0,
        ascent: font_size * 0.8,
    }
}

fn load_font_metrics_from_data(data: Arc<Vec<u8>>, face_index: u32) -> Result<FontMetrics> {
    let face = Face::parse(&data, face_index).map_err(|err| anyhow!("{}", err))?;
    let family = extract_family_name(&face);
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    let ascender = face.ascender();
    let descender = face.descender();
    drop(face);
    Ok(FontMetrics {
        data,
        units_per_em,
        space_advance,
        ascender,
        descender,
        family,
        face_index,
        source: None,
    })
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let generic = match family.to_ascii_lowercase().as_str() {
        "sans-serif" => Some(fontdb::Family::SansSerif),
        "serif" => Some(fontdb::Family::Serif),
        "monospace" => Some(fontdb::Family::Monospace),
        _ => None,
    };
    let families = vec![generic.unwrap_or(fontdb::Family::Name(family))];
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let mut metrics = load_font_metrics_from_data(Arc::new(data), face_index)?;
    metrics.source = db.face(id).and_then(|info| match &info.source {
        fontdb::Source::File(path) => Some(path.clone()),
        fontdb::Source::SharedFile(path, _) => Some(path.clone()),
        fontdb::Source::Binary(_) => None,
    });
    Ok(metrics)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
