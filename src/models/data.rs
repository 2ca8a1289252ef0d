use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::utils::{BackendError, ScanError};

/// Filler character used to pad unused MRZ positions.
pub const MRZ_FILLER: char = '<';

/// Minimum length of a normalized MRZ line.
pub const MRZ_MIN_LINE_LEN: usize = 20;

/// Names are capped at this many characters.
pub const MRZ_NAME_MAX_LEN: usize = 25;

/// Characters that end a line of recognized text. Besides `\n` and `\r`
/// this covers the vertical tab, form feed, the file/group/record
/// separators, NEL and the Unicode line and paragraph separators.
pub const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\x0b', '\x0c', '\x1c', '\x1d', '\x1e', '\u{85}', '\u{2028}', '\u{2029}',
];

/// True for the characters allowed inside an MRZ line: `A-Z`, `0-9` and `<`.
pub fn is_mrz_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == MRZ_FILLER
}

/// A photo as supplied by the caller: the original bytes and the decoded pixels.
#[derive(Debug, Clone)]
pub struct RawPhoto {
    bytes: Vec<u8>,
    pixels: DynamicImage,
}

impl RawPhoto {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ScanError> {
        let pixels = image::load_from_memory(&bytes)?;
        Ok(RawPhoto { bytes, pixels })
    }

    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Wrap an already-decoded image. The byte buffer stays empty.
    pub fn from_image(pixels: DynamicImage) -> Self {
        RawPhoto {
            bytes: Vec::new(),
            pixels,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn image(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Cropped, fixed-width RGBA bitmap handed to the recognition backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pixels: RgbaImage,
}

impl NormalizedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        NormalizedImage { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }

    /// Encode as PNG, the payload format every backend accepts.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, BackendError> {
        let mut buf = Cursor::new(Vec::new());
        PngEncoder::new(&mut buf)
            .write_image(
                self.pixels.as_raw(),
                self.pixels.width(),
                self.pixels.height(),
                ColorType::Rgba8,
            )
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<(), ScanError> {
        self.pixels
            .save(path)
            .map_err(|e| ScanError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
    }
}

/// Text exactly as a recognition backend returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawText(String);

impl RawText {
    pub fn new(text: impl Into<String>) -> Self {
        RawText(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty lines, split on any of [`LINE_BREAKS`]. A `\r\n` pair
    /// counts as a single break.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.split(LINE_BREAKS).filter(|line| !line.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for RawText {
    fn from(text: String) -> Self {
        RawText(text)
    }
}

impl From<&str> for RawText {
    fn from(text: &str) -> Self {
        RawText(text.to_string())
    }
}

impl fmt::Display for RawText {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three consecutive normalized lines that all look like MRZ lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MrzBlock {
    lines: [String; 3],
}

impl MrzBlock {
    /// Returns `None` unless every line is `[A-Z0-9<]{20,}`.
    pub fn new(l1: String, l2: String, l3: String) -> Option<Self> {
        let lines = [l1, l2, l3];
        if lines.iter().all(|line| Self::is_mrz_line(line)) {
            Some(MrzBlock { lines })
        } else {
            None
        }
    }

    pub fn is_mrz_line(line: &str) -> bool {
        line.chars().count() >= MRZ_MIN_LINE_LEN && line.chars().all(is_mrz_char)
    }

    pub fn line1(&self) -> &str {
        &self.lines[0]
    }

    pub fn line2(&self) -> &str {
        &self.lines[1]
    }

    pub fn line3(&self) -> &str {
        &self.lines[2]
    }

    pub fn lines(&self) -> &[String; 3] {
        &self.lines
    }
}

/// Decoded identity fields.
///
/// The date keys say `YY-MM-DD` but the values are `MM-DD-YY`. Consumers
/// already depend on these key names, so the label stays as it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrzRecord {
    #[serde(rename = "ID Number")]
    pub id_number: Option<String>,
    #[serde(rename = "Date of Birth (YY-MM-DD)")]
    pub date_of_birth: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Expiry Date (YY-MM-DD)")]
    pub expiry_date: String,
    #[serde(rename = "First Name")]
    pub first_name: String,
    #[serde(rename = "Last Name")]
    pub last_name: String,
}

/// What the caller gets back for the parsed fields: a record or an error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedData {
    Record(MrzRecord),
    Error { error: String },
}

impl ParsedData {
    pub fn error(message: impl Into<String>) -> Self {
        ParsedData::Error {
            error: message.into(),
        }
    }

    pub fn record(&self) -> Option<&MrzRecord> {
        match self {
            ParsedData::Record(record) => Some(record),
            ParsedData::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ParsedData::Error { .. })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }
}

impl From<Result<MrzRecord, ScanError>> for ParsedData {
    fn from(result: Result<MrzRecord, ScanError>) -> Self {
        match result {
            Ok(record) => ParsedData::Record(record),
            Err(err) => ParsedData::error(err.to_string()),
        }
    }
}

/// Everything one scan produces.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// The bitmap that was sent to the backend, for display.
    pub normalized: NormalizedImage,
    /// Backend output after noise correction, for diagnostics.
    pub text: RawText,
    pub parsed: ParsedData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> MrzRecord {
        MrzRecord {
            id_number: None,
            date_of_birth: "01-15-90".to_string(),
            gender: "M".to_string(),
            expiry_date: "01-01-25".to_string(),
            first_name: "JOHN".to_string(),
            last_name: "DOE".to_string(),
        }
    }

    #[test]
    fn test_record_serializes_with_display_keys() {
        let value = ParsedData::Record(sample_record()).to_json();
        assert_eq!(
            value,
            json!({
                "ID Number": null,
                "Date of Birth (YY-MM-DD)": "01-15-90",
                "Gender": "M",
                "Expiry Date (YY-MM-DD)": "01-01-25",
                "First Name": "JOHN",
                "Last Name": "DOE"
            })
        );
    }

    #[test]
    fn test_error_serializes_as_single_key() {
        let parsed: ParsedData = Err(ScanError::NotFound).into();
        assert_eq!(parsed.to_json(), json!({ "error": "Valid MRZ block not found" }));
        assert!(parsed.is_error());
        assert!(parsed.record().is_none());
    }

    #[test]
    fn test_parsed_data_deserializes_both_shapes() {
        let error: ParsedData = serde_json::from_value(json!({ "error": "boom" })).unwrap();
        assert_eq!(error, ParsedData::error("boom"));

        let record: ParsedData =
            serde_json::from_value(ParsedData::Record(sample_record()).to_json()).unwrap();
        assert_eq!(record.record(), Some(&sample_record()));
    }

    #[test]
    fn test_lines_split_on_every_break_kind() {
        let text = RawText::new("A\rB\r\nC\nD\x0cE\u{2028}F\x1eG\n");
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["A", "B", "C", "D", "E", "F", "G"]);
        assert_eq!(RawText::new("\r\n\r\n").lines().count(), 0);
    }

    #[test]
    fn test_block_rejects_short_or_lowercase_lines() {
        let good = "P<OMNDOE<<JOHN<<<<<<<<<".to_string();
        assert!(MrzBlock::new(good.clone(), good.clone(), good.clone()).is_some());
        assert!(MrzBlock::new(good.clone(), "SHORT<<".to_string(), good.clone()).is_none());
        assert!(MrzBlock::new(good.clone(), good.clone(), "p<omndoe<<john<<<<<<<<<".to_string()).is_none());
    }

    #[test]
    fn test_png_encoding_round_trips_dimensions() {
        let image = NormalizedImage::new(RgbaImage::new(600, 40));
        let png = image.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (600, 40));
    }

    #[test]
    fn test_raw_photo_rejects_garbage() {
        let err = RawPhoto::from_bytes(b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, ScanError::Decode(_)));
    }
}
