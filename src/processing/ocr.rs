use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder};

use crate::config::{BackendConfig, TesseractConfig};
use crate::models::{NormalizedImage, RawText};
use crate::processing::remote::{CloudVisionBackend, HttpBackend};
use crate::utils::{BackendError, ScanError};

/// Characters Tesseract is allowed to emit when reading an MRZ.
pub const MRZ_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<";

/// Anything that turns a normalized bitmap into text.
///
/// Calls block until the recognizer answers. Implementations must keep the
/// line breaks of the document rows in the returned text.
pub trait RecognitionBackend {
    fn name(&self) -> &str;

    fn recognize(&self, image: &NormalizedImage) -> Result<RawText, BackendError>;
}

/// Build the adapter named by the configuration.
pub fn backend_from_config(config: &BackendConfig) -> Result<Box<dyn RecognitionBackend>, ScanError> {
    let backend: Box<dyn RecognitionBackend> = match config {
        BackendConfig::Tesseract(tess) => Box::new(TesseractBackend::new(tess.clone())),
        BackendConfig::Http(http) => Box::new(HttpBackend::new(http.clone())?),
        BackendConfig::CloudVision(vision) => Box::new(CloudVisionBackend::new(vision.clone())?),
    };
    log::debug!("using recognition backend {}", backend.name());
    Ok(backend)
}

pub(crate) fn encode_gray_png(gray: &GrayImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new(&mut buf)
        .write_image(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)
        .map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Local Tesseract engine, restricted to the MRZ alphabet and reading the
/// page as one uniform block of text.
pub struct TesseractBackend {
    config: TesseractConfig,
}

impl TesseractBackend {
    pub fn new(config: TesseractConfig) -> Self {
        TesseractBackend { config }
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    /// The bytes handed to the engine, binarized when configured.
    pub fn prepare(&self, image: &NormalizedImage) -> Result<Vec<u8>, BackendError> {
        if self.config.binarize {
            encode_gray_png(&crate::processing::ImageProcessor::binarize(image))
        } else {
            image.to_png_bytes()
        }
    }

    #[cfg(feature = "tesseract")]
    fn run(&self, image: &NormalizedImage) -> Result<RawText, BackendError> {
        use std::io::Write;
        use tesseract::{PageSegMode, Tesseract};

        let png = self.prepare(image)?;

        let mut temp_file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|e| BackendError::Engine(format!("Failed to create temp file: {}", e)))?;
        temp_file
            .write_all(&png)
            .map_err(|e| BackendError::Engine(format!("Failed to write to temp file: {}", e)))?;
        let path_str = temp_file
            .path()
            .to_str()
            .ok_or_else(|| BackendError::Engine("Failed to convert path to string".to_string()))?;

        let mut tess = Tesseract::new(self.config.tessdata_dir.as_deref(), Some(self.config.language.as_str()))
            .map_err(|e| BackendError::Unavailable(format!("Tesseract init error: {}", e)))?
            .set_variable("tessedit_char_whitelist", MRZ_WHITELIST)
            .map_err(|e| BackendError::Engine(format!("Tesseract set variable error: {}", e)))?;

        // psm 6: a single uniform block of text
        tess.set_page_seg_mode(PageSegMode::PsmSingleBlock);

        tess = tess
            .set_image(path_str)
            .map_err(|e| BackendError::Engine(format!("Tesseract set image error: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| BackendError::Malformed(format!("Tesseract returned unreadable text: {}", e)))?;
        log::trace!("tesseract output:\n{}", text);
        Ok(RawText::new(text))
    }
}

impl RecognitionBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<RawText, BackendError> {
        #[cfg(feature = "tesseract")]
        {
            self.run(image)
        }

        #[cfg(not(feature = "tesseract"))]
        {
            let _ = image;
            Err(BackendError::Unavailable(
                "built without the `tesseract` feature".to_string(),
            ))
        }
    }
}
