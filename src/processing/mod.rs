pub mod background;
pub mod field_correction;
pub mod image;
pub mod mrz;
pub mod ocr;
pub mod remote;

pub use self::image::{ImageProcessor, NormalizeOptions, TARGET_WIDTH};
pub use background::{BackgroundMode, BackgroundRemover, BorderFloodRemover, KeepBackground};
pub use field_correction::FieldCorrection;
pub use mrz::MrzExtractor;
pub use ocr::{backend_from_config, RecognitionBackend, TesseractBackend};
pub use remote::{CloudVisionBackend, HttpBackend};
