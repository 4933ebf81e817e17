/// One row of the script table: code point ranges, the font file used to
/// render them and how wide their glyphs run compared to the source text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptEntry {
    pub name: &'static str,
    pub ranges: &'static [(u32, u32)],
    pub font_file: &'static str,
    pub width_factor: f32,
}

/// Evaluated top to bottom; the first entry with a matching character wins.
const SCRIPT_TABLE: &[ScriptEntry] = &[
    ScriptEntry {
        name: "thai",
        ranges: &[(0x0E00, 0x0E7F)],
        font_file: "NotoSansThai-Regular.ttf",
        width_factor: 1.2,
    },
    ScriptEntry {
        name: "cyrillic",
        ranges: &[(0x0400, 0x04FF)],
        font_file: "NotoSans-Regular.ttf",
        width_factor: 0.9,
    },
    ScriptEntry {
        name: "vietnamese",
        ranges: &[(0x1E00, 0x1EFF)],
        font_file: "NotoSans-Regular.ttf",
        width_factor: 1.1,
    },
];

const DEFAULT_SCRIPT: ScriptEntry = ScriptEntry {
    name: "default",
    ranges: &[],
    font_file: "NotoSansSC-Regular.otf",
    width_factor: 1.0,
};

impl ScriptEntry {
    fn matches(&self, ch: char) -> bool {
        let code = ch as u32;
        self.ranges
            .iter()
            .any(|(start, end)| (*start..=*end).contains(&code))
    }
}

pub fn lookup_script(text: &str) -> &'static ScriptEntry {
    if text.is_ascii() {
        return &DEFAULT_SCRIPT;
    }
    SCRIPT_TABLE
        .iter()
        .find(|entry| text.chars().any(|ch| entry.matches(ch)))
        .unwrap_or(&DEFAULT_SCRIPT)
}

pub fn has_chinese(text: &str) -> bool {
    text.chars().any(|ch| matches!(ch as u32, 0x4E00..=0x9FFF))
}

/// Guesses the source language of detected text: `zh` as soon as one entry
/// contains CJK ideographs, `en` otherwise.
pub fn detect_source_lang<S: AsRef<str>>(texts: &[S]) -> &'static str {
    if texts.iter().any(|text| has_chinese(text.as_ref())) {
        "zh"
    } else {
        "en"
    }
}
