//! `@font-face` stylesheet parsing
//!
//! Understands the subset of CSS a font service returns: optional subset
//! comments followed by `@font-face` blocks.

use crate::types::{FontStyle, FontWeight};

/// One `src` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceSource {
    pub url: String,
    /// `format(...)` hint, lowercased
    pub format: Option<String>,
}

/// @font-face rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFaceRule {
    pub family: String,
    pub style: FontStyle,
    /// Inclusive weight range; static faces have min == max
    pub weight_min: u16,
    pub weight_max: u16,
    pub sources: Vec<FaceSource>,
    /// Subset named by the preceding comment (`/* latin */`)
    pub subset: Option<String>,
}

impl FontFaceRule {
    pub fn covers(&self, weight: FontWeight, style: FontStyle) -> bool {
        self.style == style && (self.weight_min..=self.weight_max).contains(&weight.0)
    }

    /// Preferred source: uncompressed outlines first
    pub fn best_source(&self) -> Option<&FaceSource> {
        self.sources
            .iter()
            .min_by_key(|src| format_rank(src.format.as_deref()))
    }
}

fn format_rank(format: Option<&str>) -> u8 {
    match format {
        Some("truetype") => 0,
        Some("opentype") => 1,
        Some("woff2") => 2,
        Some("woff") => 3,
        _ => 4,
    }
}

/// Parse every `@font-face` block in a stylesheet
pub fn parse_font_faces(css: &str) -> Vec<FontFaceRule> {
    let mut faces = Vec::new();
    let mut subset = None;
    let mut rest = css;

    loop {
        let comment = rest.find("/*");
        let face = rest.find("@font-face");

        match (comment, face) {
            (Some(c), Some(f)) if c < f => {
                let (text, after) = take_comment(&rest[c..]);
                subset = Some(text).filter(|s| !s.is_empty());
                rest = after;
            }
            (Some(c), None) => {
                let (_, after) = take_comment(&rest[c..]);
                rest = after;
            }
            (_, Some(f)) => {
                let block = &rest[f + "@font-face".len()..];
                let Some(open) = block.find('{') else { break };
                let Some(close) = block[open..].find('}') else { break };
                if let Some(rule) = parse_font_face_rule(&block[open + 1..open + close], subset.take()) {
                    faces.push(rule);
                }
                rest = &block[open + close + 1..];
            }
            (None, None) => break,
        }
    }

    faces
}

fn take_comment(text: &str) -> (String, &str) {
    let body = &text[2..];
    match body.find("*/") {
        Some(end) => (body[..end].trim().to_string(), &body[end + 2..]),
        None => (String::new(), ""),
    }
}

fn parse_font_face_rule(body: &str, subset: Option<String>) -> Option<FontFaceRule> {
    let mut rule = FontFaceRule {
        family: String::new(),
        style: FontStyle::Normal,
        weight_min: 400,
        weight_max: 400,
        sources: Vec::new(),
        subset,
    };

    for decl in body.split(';') {
        let Some((property, value)) = decl.split_once(':') else { continue };
        let value = value.trim();
        match property.trim().to_ascii_lowercase().as_str() {
            "font-family" => rule.family = unquote(value).to_string(),
            "font-style" => rule.style = FontStyle::parse(value).unwrap_or(FontStyle::Normal),
            "font-weight" => {
                let (min, max) = parse_weight_range(value)?;
                rule.weight_min = min;
                rule.weight_max = max;
            }
            "src" => rule.sources = parse_sources(value),
            _ => {}
        }
    }

    (!rule.sources.is_empty()).then_some(rule)
}

fn parse_weight_range(value: &str) -> Option<(u16, u16)> {
    let mut parts = value.split_whitespace().map(|part| match part {
        "normal" => Some(400),
        "bold" => Some(700),
        n => n.parse::<u16>().ok(),
    });
    let min = parts.next()??;
    let max = match parts.next() {
        Some(max) => max?,
        None => min,
    };
    Some((min.min(max), min.max(max)))
}

fn parse_sources(value: &str) -> Vec<FaceSource> {
    let mut sources = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find("url(") {
        let after = &rest[start + 4..];
        let Some(end) = after.find(')') else { break };
        let url = unquote(after[..end].trim()).to_string();
        rest = &after[end + 1..];

        // format() belongs to this url only if it precedes the next comma
        let segment_end = rest.find(',').unwrap_or(rest.len());
        let format = rest[..segment_end].find("format(").and_then(|f| {
            let hint = &rest[f + 7..segment_end];
            hint.find(')')
                .map(|close| unquote(hint[..close].trim()).to_ascii_lowercase())
        });

        if !url.is_empty() {
            sources.push(FaceSource { url, format });
        }
    }

    sources
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// Pick the face serving `(weight, style)`, preferring the latin subset
pub fn select_face(faces: &[FontFaceRule], weight: FontWeight, style: FontStyle) -> Option<&FontFaceRule> {
    let subset_rank = |face: &FontFaceRule| match face.subset.as_deref() {
        Some("latin") => 0,
        None => 1,
        Some(_) => 2,
    };

    faces
        .iter()
        .filter(|face| face.covers(weight, style))
        .min_by_key(|face| subset_rank(*face))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLE_CSS: &str = r#"
/* cyrillic */
@font-face {
  font-family: 'Roboto';
  font-style: normal;
  font-weight: 400;
  src: url(https://fonts.gstatic.com/s/roboto/cyr.woff2) format('woff2');
  unicode-range: U+0301, U+0400-045F;
}
/* latin */
@font-face {
  font-family: 'Roboto';
  font-style: normal;
  font-weight: 400;
  src: url(https://fonts.gstatic.com/s/roboto/latin.woff2) format('woff2');
  unicode-range: U+0000-00FF;
}
@font-face {
  font-family: 'Roboto';
  font-style: italic;
  font-weight: 700;
  src: url("https://fonts.gstatic.com/s/roboto/bi.ttf") format("truetype");
}
"#;

    #[test]
    fn test_parse_faces() {
        let faces = parse_font_faces(GOOGLE_CSS);
        assert_eq!(faces.len(), 3);
        assert_eq!(faces[0].subset.as_deref(), Some("cyrillic"));
        assert_eq!(faces[1].subset.as_deref(), Some("latin"));
        assert_eq!(faces[2].subset, None);
        assert_eq!(faces[2].family, "Roboto");
        assert_eq!(faces[2].style, FontStyle::Italic);
        assert_eq!(faces[2].sources[0].url, "https://fonts.gstatic.com/s/roboto/bi.ttf");
        assert_eq!(faces[2].sources[0].format.as_deref(), Some("truetype"));
    }

    #[test]
    fn test_select_prefers_latin() {
        let faces = parse_font_faces(GOOGLE_CSS);
        let face = select_face(&faces, FontWeight::NORMAL, FontStyle::Normal).unwrap();
        assert_eq!(face.best_source().unwrap().url, "https://fonts.gstatic.com/s/roboto/latin.woff2");

        let face = select_face(&faces, FontWeight::BOLD, FontStyle::Italic).unwrap();
        assert!(face.best_source().unwrap().url.ends_with("bi.ttf"));

        assert!(select_face(&faces, FontWeight::BOLD, FontStyle::Normal).is_none());
    }

    #[test]
    fn test_weight_range() {
        let css = "@font-face { font-family: Inter; font-weight: 100 900; src: url(inter.ttf); }";
        let faces = parse_font_faces(css);
        assert_eq!((faces[0].weight_min, faces[0].weight_max), (100, 900));
        assert!(faces[0].covers(FontWeight(300), FontStyle::Normal));
        assert_eq!(faces[0].sources[0].format, None);
    }

    #[test]
    fn test_source_preference() {
        let css = "@font-face { font-family: X; src: url(a.woff2) format('woff2'), url(a.ttf) format('truetype'), url(a.woff) format('woff'); }";
        let faces = parse_font_faces(css);
        assert_eq!(faces[0].sources.len(), 3);
        assert_eq!(faces[0].best_source().unwrap().url, "a.ttf");
    }

    #[test]
    fn test_block_without_src_is_skipped() {
        let faces = parse_font_faces("@font-face { font-family: X; font-weight: 400; }");
        assert!(faces.is_empty());
    }
}
