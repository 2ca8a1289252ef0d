use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{MrzBlock, MrzRecord, RawText, MRZ_FILLER, MRZ_NAME_MAX_LEN};
use crate::processing::field_correction::FieldCorrection;
use crate::utils::ScanError;

lazy_static! {
    // Issuer code followed by the 8-digit document number and a filler.
    static ref ID_NUMBER_PATTERN: Regex = Regex::new(r"[A-Z]{3}([0-9]{8})<").unwrap();
}

/// Sentinel for a date field that is not six characters long.
pub const INVALID_DATE: &str = "Invalid";

pub struct MrzExtractor;

impl MrzExtractor {
    /// Locate and decode the MRZ block in already-corrected OCR text.
    pub fn extract(text: &RawText) -> Result<MrzRecord, ScanError> {
        let block = Self::locate(text)?;
        Ok(Self::decode(&block))
    }

    /// First window of three consecutive non-blank lines that all qualify
    /// as MRZ lines after normalization. Earlier windows always win.
    pub fn locate(text: &RawText) -> Result<MrzBlock, ScanError> {
        let lines: Vec<String> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(FieldCorrection::normalize_line)
            .collect();

        lines
            .windows(3)
            .find_map(|w| MrzBlock::new(w[0].clone(), w[1].clone(), w[2].clone()))
            .map(|block| {
                log::debug!("MRZ block found: {:?}", block.lines());
                block
            })
            .ok_or(ScanError::NotFound)
    }

    pub fn decode(block: &MrzBlock) -> MrzRecord {
        let l1 = block.line1();
        let l2 = block.line2();

        let id_number = ID_NUMBER_PATTERN
            .captures(l1)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        let (first_name, last_name) = Self::split_names(block.line3());

        MrzRecord {
            id_number,
            date_of_birth: Self::format_date_ymd(&Self::slice(l2, 0, 6)),
            gender: Self::slice(l2, 7, 8),
            expiry_date: Self::format_date_ymd(&Self::slice(l2, 8, 14)),
            first_name,
            last_name,
        }
    }

    /// `YYMMDD` to `MM-DD-YY`. Anything not six characters long is `"Invalid"`.
    /// No calendar check is made.
    pub fn format_date_ymd(ymd: &str) -> String {
        let chars: Vec<char> = ymd.chars().collect();
        if chars.len() != 6 {
            return INVALID_DATE.to_string();
        }
        let year: String = chars[0..2].iter().collect();
        let month: String = chars[2..4].iter().collect();
        let day: String = chars[4..6].iter().collect();
        format!("{}-{}-{}", month, day, year)
    }

    /// Split on the first filler: before is the first name, after is the
    /// last name. Remaining fillers are dropped and both are capped.
    pub fn split_names(line: &str) -> (String, String) {
        let (first, last) = match line.split_once(MRZ_FILLER) {
            Some((first, last)) => (first, last),
            None => (line, ""),
        };
        (Self::clean_name(first), Self::clean_name(last))
    }

    fn clean_name(part: &str) -> String {
        part.chars()
            .filter(|&c| c != MRZ_FILLER)
            .take(MRZ_NAME_MAX_LEN)
            .collect()
    }

    // Character-based substring, clamped to the line length.
    fn slice(line: &str, start: usize, end: usize) -> String {
        line.chars().skip(start).take(end.saturating_sub(start)).collect()
    }
}
