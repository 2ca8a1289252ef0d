pub mod config;
pub mod models;
pub mod processing;
pub mod scanner;
pub mod utils;

pub use config::ScannerConfig;
pub use models::{MrzRecord, ParsedData, RawPhoto, ScanReport};
pub use scanner::MrzScanner;
pub use utils::{BackendError, ScanError};
