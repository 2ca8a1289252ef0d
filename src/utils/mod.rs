pub mod error;

pub use error::{BackendError, ScanError, MRZ_NOT_FOUND};
