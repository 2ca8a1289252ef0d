use std::path::Path;

use crate::config::ScannerConfig;
use crate::models::{ParsedData, RawPhoto, RawText, ScanReport};
use crate::processing::{
    backend_from_config, FieldCorrection, ImageProcessor, MrzExtractor, NormalizeOptions,
    RecognitionBackend,
};
use crate::utils::ScanError;

/// Runs the whole pipeline for one photo at a time.
///
/// The scanner only holds its configuration and the backend adapter; every
/// call owns its intermediate buffers, so scans never influence each other.
pub struct MrzScanner {
    options: NormalizeOptions,
    backend: Box<dyn RecognitionBackend>,
}

impl MrzScanner {
    pub fn new(options: NormalizeOptions, backend: Box<dyn RecognitionBackend>) -> Self {
        MrzScanner { options, backend }
    }

    pub fn from_config(config: &ScannerConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let backend = backend_from_config(&config.backend)?;
        Ok(Self::new(config.normalize.clone(), backend))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // Main entry point: normalize, recognize, correct, locate, decode
    pub fn scan(&self, photo: &RawPhoto) -> ScanReport {
        // Step 1: Normalize the photo
        let normalized = ImageProcessor::normalize(photo, &self.options);

        // Step 2: Recognize. Backend failures end up in the parsed data.
        let (text, parsed) = match self.backend.recognize(&normalized) {
            Ok(raw) => Self::parse_text(&raw),
            Err(err) => {
                log::debug!("{} backend failed: {}", self.backend.name(), err);
                (RawText::default(), ParsedData::error(err.to_string()))
            }
        };

        ScanReport {
            normalized,
            text,
            parsed,
        }
    }

    pub fn scan_bytes(&self, bytes: Vec<u8>) -> Result<ScanReport, ScanError> {
        let photo = RawPhoto::from_bytes(bytes)?;
        Ok(self.scan(&photo))
    }

    pub fn scan_path(&self, path: &Path) -> Result<ScanReport, ScanError> {
        let photo = RawPhoto::open(path)?;
        Ok(self.scan(&photo))
    }

    /// Noise correction, block location and decoding on text that was
    /// already recognized. Returns the corrected text alongside the result.
    pub fn parse_text(raw: &RawText) -> (RawText, ParsedData) {
        let corrected = FieldCorrection::correct(raw);
        let parsed = MrzExtractor::extract(&corrected).into();
        (corrected, parsed)
    }
}
