use crate::metadata::{Field, TrackMetadata};
use crate::sanitize::sanitize_segment;
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_FORMAT: &str = "artist - album [track] title";
pub const SEPARATOR_MARKER: &str = "(=)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Field(Field),
    Separator,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("format string is blank")]
    InvalidFormat,
    #[error("format template has no tokens")]
    EmptyTemplate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub padding: usize,
    pub flatten: bool,
}

/// Relative target of one file: directory segments followed by the base name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPath {
    segments: Vec<String>,
    /// Copied from the source file byte for byte, leading dot included.
    #[serde(with = "lossy_extension")]
    extension: OsString,
}

impl ResolvedPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn directories(&self) -> &[String] {
        &self.segments[..self.segments.len().saturating_sub(1)]
    }

    pub fn file_stem(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn extension(&self) -> &OsStr {
        &self.extension
    }

    pub fn file_name(&self) -> OsString {
        let mut name = OsString::from(self.file_stem());
        name.push(&self.extension);
        name
    }

    /// Segments as they land on disk, the extension attached to the last one.
    pub fn components(&self) -> Vec<OsString> {
        let mut out: Vec<OsString> = self.directories().iter().map(OsString::from).collect();
        out.push(self.file_name());
        out
    }

    pub fn to_relative_path(&self) -> PathBuf {
        self.components().into_iter().collect()
    }

    pub fn with_file_stem(&self, stem: impl Into<String>) -> Self {
        let mut segments = self.directories().to_vec();
        segments.push(stem.into());
        Self {
            segments,
            extension: self.extension.clone(),
        }
    }

    pub(crate) fn map_directories(self, f: impl Fn(&str) -> String) -> Self {
        let last = self.segments.len().saturating_sub(1);
        let segments = self
            .segments
            .into_iter()
            .enumerate()
            .map(|(i, s)| if i == last { s } else { f(&s) })
            .collect();
        Self {
            segments,
            extension: self.extension,
        }
    }
}

pub fn validate_template(input: &str) -> Result<(), TemplateError> {
    parse_template(input, DEFAULT_FORMAT).map(|_| ())
}

/// An empty `input` selects `default_format`; a blank one is rejected.
pub fn parse_template(
    input: &str,
    default_format: &str,
) -> Result<Vec<TemplatePart>, TemplateError> {
    let source = if input.is_empty() {
        default_format
    } else {
        input
    };
    if source.trim().is_empty() {
        return Err(TemplateError::InvalidFormat);
    }
    Ok(tokenize(source))
}

pub fn has_fields(parts: &[TemplatePart]) -> bool {
    parts
        .iter()
        .any(|part| matches!(part, TemplatePart::Field(_)))
}

pub fn resolve_field(field: Field, metadata: &TrackMetadata, padding: usize) -> String {
    let value = metadata.get(field).map(str::trim).unwrap_or_default();
    if field.is_numeric() && padding > 0 {
        pad_number(value, padding)
    } else {
        value.to_string()
    }
}

pub fn assemble_path(
    parts: &[TemplatePart],
    metadata: &TrackMetadata,
    options: &RenderOptions,
    extension: impl Into<OsString>,
) -> Result<ResolvedPath, TemplateError> {
    if parts.is_empty() {
        return Err(TemplateError::EmptyTemplate);
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => current.push_str(s),
            TemplatePart::Field(field) => {
                current.push_str(&resolve_field(*field, metadata, options.padding))
            }
            TemplatePart::Separator => {
                if !options.flatten {
                    segments.push(sanitize_segment(&std::mem::take(&mut current)));
                }
            }
        }
    }
    segments.push(sanitize_segment(&current));

    Ok(ResolvedPath {
        segments,
        extension: extension.into(),
    })
}

// JSON carries the extension as text; a non-UTF-8 one is shown lossily.
mod lossy_extension {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::ffi::OsString;

    pub fn serialize<S: Serializer>(value: &OsString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string_lossy())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OsString, D::Error> {
        String::deserialize(deserializer).map(OsString::from)
    }
}

fn tokenize(input: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut cursor = 0usize;

    while cursor < input.len() {
        let rest = &input[cursor..];
        if rest.starts_with(SEPARATOR_MARKER) {
            flush_literal(&mut parts, &mut literal);
            parts.push(TemplatePart::Separator);
            cursor += SEPARATOR_MARKER.len();
            continue;
        }

        if let Some(field) = match_keyword(input, cursor) {
            flush_literal(&mut parts, &mut literal);
            parts.push(TemplatePart::Field(field));
            cursor += field.keyword().len();
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        literal.push(ch);
        cursor += ch.len_utf8();
    }

    flush_literal(&mut parts, &mut literal);
    parts
}

fn flush_literal(parts: &mut Vec<TemplatePart>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(std::mem::take(literal)));
    }
}

// Keywords only count as whole words: `artists` and `subtitle` stay literal.
fn match_keyword(input: &str, at: usize) -> Option<Field> {
    if input[..at].chars().next_back().is_some_and(is_word_char) {
        return None;
    }
    let rest = &input[at..];
    Field::ALL.into_iter().find(|field| {
        let keyword = field.keyword();
        rest.starts_with(keyword)
            && !rest[keyword.len()..]
                .chars()
                .next()
                .is_some_and(is_word_char)
    })
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric()
}

fn pad_number(value: &str, width: usize) -> String {
    if value.is_empty() {
        return String::new();
    }
    let (number, rest) = match value.split_once('/') {
        Some((number, rest)) => (number, Some(rest)),
        None => (value, None),
    };
    let padded = if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
        format!("{number:0>width$}")
    } else {
        number.to_string()
    };
    match rest {
        Some(rest) => format!("{padded}/{rest}"),
        None => padded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrackMetadata {
        TrackMetadata::new()
            .with(Field::Artist, "Sample Artist")
            .with(Field::Album, "Sample Album")
            .with(Field::Track, "1")
            .with(Field::Title, "Sample Title")
    }

    fn render(format: &str, meta: &TrackMetadata, options: RenderOptions) -> ResolvedPath {
        let parts = parse_template(format, DEFAULT_FORMAT).expect("must parse");
        assemble_path(&parts, meta, &options, ".mp3").expect("must assemble")
    }

    #[test]
    fn parse_default_format_tokens() {
        let parts = parse_template(DEFAULT_FORMAT, DEFAULT_FORMAT).expect("must parse");
        assert_eq!(
            parts,
            vec![
                TemplatePart::Field(Field::Artist),
                TemplatePart::Literal(" - ".to_string()),
                TemplatePart::Field(Field::Album),
                TemplatePart::Literal(" [".to_string()),
                TemplatePart::Field(Field::Track),
                TemplatePart::Literal("] ".to_string()),
                TemplatePart::Field(Field::Title),
            ]
        );
    }

    #[test]
    fn parse_recognizes_separator_marker() {
        let parts = parse_template("artist(=)album", DEFAULT_FORMAT).expect("must parse");
        assert_eq!(
            parts,
            vec![
                TemplatePart::Field(Field::Artist),
                TemplatePart::Separator,
                TemplatePart::Field(Field::Album),
            ]
        );
    }

    #[test]
    fn parse_keeps_keywords_inside_longer_words_literal() {
        let parts = parse_template("artists subtitle discs", DEFAULT_FORMAT).expect("must parse");
        assert_eq!(
            parts,
            vec![TemplatePart::Literal("artists subtitle discs".to_string())]
        );
        assert!(!has_fields(&parts));
    }

    #[test]
    fn parse_treats_underscore_as_boundary() {
        let parts = parse_template("track_title", DEFAULT_FORMAT).expect("must parse");
        assert_eq!(
            parts,
            vec![
                TemplatePart::Field(Field::Track),
                TemplatePart::Literal("_".to_string()),
                TemplatePart::Field(Field::Title),
            ]
        );
    }

    #[test]
    fn parse_handles_multibyte_literals() {
        let parts = parse_template("título—title", DEFAULT_FORMAT).expect("must parse");
        assert_eq!(
            parts,
            vec![
                TemplatePart::Literal("título—".to_string()),
                TemplatePart::Field(Field::Title),
            ]
        );
    }

    #[test]
    fn parse_rejects_blank_format() {
        let err = parse_template("   ", DEFAULT_FORMAT).expect_err("must fail");
        assert_eq!(err, TemplateError::InvalidFormat);
        assert!(validate_template("\t").is_err());
    }

    #[test]
    fn empty_format_uses_default() {
        let meta = sample();
        let implicit = render("", &meta, RenderOptions::default());
        let explicit = render(DEFAULT_FORMAT, &meta, RenderOptions::default());
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn assemble_rejects_empty_token_list() {
        let err = assemble_path(&[], &sample(), &RenderOptions::default(), ".mp3")
            .expect_err("must fail");
        assert_eq!(err, TemplateError::EmptyTemplate);
    }

    #[test]
    fn renders_default_format_with_extension() {
        let path = render(DEFAULT_FORMAT, &sample(), RenderOptions::default());
        assert_eq!(path.components().len(), 1);
        assert_eq!(
            path.file_name(),
            "Sample Artist - Sample Album [1] Sample Title.mp3"
        );
    }

    #[test]
    fn separator_marker_builds_directories() {
        let path = render(
            "artist(=)album(=)track - title",
            &sample(),
            RenderOptions::default(),
        );
        assert_eq!(
            path.directories(),
            &["Sample Artist".to_string(), "Sample Album".to_string()]
        );
        assert_eq!(path.file_name(), "1 - Sample Title.mp3");
        assert_eq!(
            path.to_relative_path(),
            PathBuf::from("Sample Artist")
                .join("Sample Album")
                .join("1 - Sample Title.mp3")
        );
    }

    #[test]
    fn flatten_folds_segments_into_one() {
        let format = "artist(=)album(=)track - title";
        let nested = render(format, &sample(), RenderOptions::default());
        let flat = render(
            format,
            &sample(),
            RenderOptions {
                padding: 0,
                flatten: true,
            },
        );
        assert_eq!(flat.segments().len(), 1);
        assert_eq!(flat.file_stem(), nested.segments().concat());
    }

    #[test]
    fn missing_fields_resolve_to_empty() {
        let meta = TrackMetadata::new().with(Field::Title, "Only Title");
        let path = render("composer - title", &meta, RenderOptions::default());
        assert_eq!(path.file_stem(), "- Only Title");
        assert!(!path.file_stem().contains("composer"));
    }

    #[test]
    fn no_keyword_survives_substitution() {
        let meta = TrackMetadata::new()
            .with(Field::Composer, "C")
            .with(Field::Disc, "2");
        let path = render(
            "album artist composer title track disc",
            &meta,
            RenderOptions::default(),
        );
        for field in Field::ALL {
            assert!(!path.file_stem().contains(field.keyword()));
        }
        assert_eq!(path.file_stem(), "C   2");
    }

    #[test]
    fn resolve_pads_track_numbers() {
        let meta = TrackMetadata::new().with(Field::Track, "3");
        assert_eq!(resolve_field(Field::Track, &meta, 2), "03");
        assert_eq!(resolve_field(Field::Track, &meta, 0), "3");

        let meta = TrackMetadata::new().with(Field::Track, "3/12");
        assert_eq!(resolve_field(Field::Track, &meta, 2), "03/12");

        assert_eq!(resolve_field(Field::Track, &TrackMetadata::new(), 2), "");
    }

    #[test]
    fn resolve_pads_disc_but_not_text_fields() {
        let meta = TrackMetadata::new()
            .with(Field::Disc, "1/2")
            .with(Field::Title, "7");
        assert_eq!(resolve_field(Field::Disc, &meta, 3), "001/2");
        assert_eq!(resolve_field(Field::Title, &meta, 3), "7");
    }

    #[test]
    fn resolve_leaves_wide_or_non_numeric_values() {
        let meta = TrackMetadata::new().with(Field::Track, "123");
        assert_eq!(resolve_field(Field::Track, &meta, 2), "123");

        let meta = TrackMetadata::new().with(Field::Track, "A1");
        assert_eq!(resolve_field(Field::Track, &meta, 3), "A1");
    }

    #[test]
    fn resolve_trims_values() {
        let meta = TrackMetadata::new().with(Field::Artist, "  Spaced  ");
        assert_eq!(resolve_field(Field::Artist, &meta, 0), "Spaced");
    }

    #[test]
    fn sanitizes_field_values() {
        let meta = TrackMetadata::new()
            .with(Field::Artist, "AC/DC")
            .with(Field::Title, "What? \"Why\"");
        let path = render("artist - title", &meta, RenderOptions::default());
        assert_eq!(path.file_name(), "ACDC - What Why.mp3");
    }

    #[test]
    fn empty_segment_becomes_placeholder() {
        let path = render("album(=)title", &sample(), RenderOptions::default());
        assert_eq!(path.directories(), &["Sample Album".to_string()]);

        let path = render("composer(=)title", &sample(), RenderOptions::default());
        assert_eq!(path.directories(), &["untitled".to_string()]);
    }

    #[test]
    fn with_file_stem_keeps_directories_and_extension() {
        let path = render("artist(=)title", &sample(), RenderOptions::default());
        let renamed = path.with_file_stem("Sample Title (1)");
        assert_eq!(
            renamed.to_relative_path(),
            PathBuf::from("Sample Artist").join("Sample Title (1).mp3")
        );
        assert_eq!(renamed.extension(), ".mp3");
    }

    #[test]
    fn serializes_extension_as_text() {
        let path = render("title", &sample(), RenderOptions::default());
        let json = serde_json::to_value(&path).expect("serialize");
        assert_eq!(json["extension"], ".mp3");

        let back: ResolvedPath = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, path);
    }
}
