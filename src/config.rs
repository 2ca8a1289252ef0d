use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::processing::NormalizeOptions;
use crate::utils::ScanError;

/// Environment variable consulted when a remote backend has no API key configured.
pub const API_KEY_ENV: &str = "MRZSCAN_API_KEY";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Everything a scanner needs, built once and handed to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub normalize: NormalizeOptions,
    pub backend: BackendConfig,
}

impl ScannerConfig {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ScanError> {
        let config: ScannerConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.normalize.target_width == 0 {
            return Err(ScanError::Config("normalize.target_width must be positive".to_string()));
        }
        match &self.backend {
            BackendConfig::Tesseract(tess) if tess.language.trim().is_empty() => {
                Err(ScanError::Config("tesseract language must not be empty".to_string()))
            }
            BackendConfig::Http(http) if http.url.trim().is_empty() => {
                Err(ScanError::Config("http backend requires a url".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Tesseract(TesseractConfig),
    Http(HttpConfig),
    CloudVision(CloudVisionConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Tesseract(TesseractConfig::default())
    }
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Tesseract(_) => "tesseract",
            BackendConfig::Http(_) => "http",
            BackendConfig::CloudVision(_) => "cloud_vision",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub language: String,
    pub tessdata_dir: Option<String>,
    /// Grayscale, smooth and Otsu-threshold the image before recognition.
    pub binarize: bool,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        TesseractConfig {
            language: "eng".to_string(),
            tessdata_dir: None,
            binarize: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HttpResponseFormat {
    /// The response body is the recognized text.
    #[default]
    PlainText,
    /// OCR.space style JSON: `ParsedResults[].ParsedText`.
    OcrSpace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub file_field: String,
    /// Extra multipart text fields sent with every upload.
    pub fields: BTreeMap<String, String>,
    pub response_format: HttpResponseFormat,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            url: String::new(),
            api_key: None,
            api_key_header: "apikey".to_string(),
            file_field: "file".to_string(),
            fields: BTreeMap::new(),
            response_format: HttpResponseFormat::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudVisionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CloudVisionConfig {
    fn default() -> Self {
        CloudVisionConfig {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CloudVisionConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }
}

fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::BackgroundMode;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ScannerConfig::from_json("{}").unwrap();
        assert_eq!(config, ScannerConfig::default());
        assert_eq!(config.normalize.target_width, 600);
        assert_eq!(config.backend.kind(), "tesseract");
    }

    #[test]
    fn test_http_backend_from_json() {
        let config = ScannerConfig::from_json(
            r#"{
                "normalize": { "background": "keep" },
                "backend": {
                    "kind": "http",
                    "url": "https://ocr.example.test/parse/image",
                    "response_format": "ocr_space",
                    "fields": { "OCREngine": "2" }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.normalize.background, BackgroundMode::Keep);
        match config.backend {
            BackendConfig::Http(http) => {
                assert_eq!(http.url, "https://ocr.example.test/parse/image");
                assert_eq!(http.response_format, HttpResponseFormat::OcrSpace);
                assert_eq!(http.file_field, "file");
                assert_eq!(http.fields.get("OCREngine").map(String::as_str), Some("2"));
                assert_eq!(http.timeout_secs, DEFAULT_TIMEOUT_SECS);
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_http_backend_requires_url() {
        let err = ScannerConfig::from_json(r#"{ "backend": { "kind": "http" } }"#).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = ScannerConfig::from_json(r#"{ "backend": { "kind": "carrier_pigeon" } }"#).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn test_configured_key_wins() {
        let vision = CloudVisionConfig {
            api_key: Some("from-file".to_string()),
            ..CloudVisionConfig::default()
        };
        assert_eq!(vision.resolved_api_key().as_deref(), Some("from-file"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "backend": {{ "kind": "cloud_vision", "api_key": "k" }} }}"#).unwrap();
        let config = ScannerConfig::load(file.path()).unwrap();
        assert_eq!(config.backend.kind(), "cloud_vision");
    }
}
