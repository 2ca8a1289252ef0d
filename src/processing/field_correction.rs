use crate::models::{is_mrz_char, RawText, MRZ_FILLER};

/// Undoes the systematic OCR misreads seen on MRZ text.
///
/// Some recognizers emit `K` for the filler glyph. Two passes deal with it:
/// a line-local one used only to classify lines, and a contextual one over
/// the whole text that only touches a `K` sitting between two MRZ characters.
pub struct FieldCorrection;

impl FieldCorrection {
    /// Strip all whitespace and turn every `K`/`k` into the filler.
    pub fn normalize_line(line: &str) -> String {
        line.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == 'K' || c == 'k' { MRZ_FILLER } else { c })
            .collect()
    }

    /// Replace a `K` with the filler when both its neighbours are MRZ
    /// characters. Neighbours are read from the uncorrected text, and
    /// whitespace and line breaks are kept as they are.
    pub fn correct_str(text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut corrected = String::with_capacity(text.len());
        for (i, &c) in chars.iter().enumerate() {
            let flanked = c == 'K'
                && i > 0
                && chars.get(i - 1).copied().map_or(false, is_mrz_char)
                && chars.get(i + 1).copied().map_or(false, is_mrz_char);
            corrected.push(if flanked { MRZ_FILLER } else { c });
        }
        corrected
    }

    pub fn correct(text: &RawText) -> RawText {
        let corrected = Self::correct_str(text.as_str());
        if corrected != text.as_str() {
            log::trace!("noise correction rewrote OCR text");
        }
        RawText::new(corrected)
    }
}
