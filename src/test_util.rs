use std::path::PathBuf;
use std::sync::OnceLock;

use crate::overlay::{FontMetrics, resolve_system_font};

/// An installed sans-serif face, if the machine has one. Tests that need
/// real glyph metrics return early without it.
pub(crate) fn system_font() -> Option<FontMetrics> {
    static FONT: OnceLock<Option<FontMetrics>> = OnceLock::new();
    FONT.get_or_init(|| resolve_system_font(&["DejaVu Sans", "sans-serif"]).ok())
        .clone()
}

pub(crate) fn system_font_path() -> Option<PathBuf> {
    system_font().and_then(|font| font.source().map(|path| path.to_path_buf()))
}
