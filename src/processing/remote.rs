//! Recognition backends reached over HTTP.
//!
//! Both adapters upload the normalized bitmap as PNG and block until the
//! service answers. Response parsing is kept in free functions so it can be
//! exercised without a network.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::{multipart, Client, Response};
use serde::Deserialize;
use serde_json::json;

use crate::config::{CloudVisionConfig, HttpConfig, HttpResponseFormat};
use crate::models::{NormalizedImage, RawText};
use crate::processing::ocr::RecognitionBackend;
use crate::utils::BackendError;

fn build_client(timeout_secs: u64) -> Result<Client, BackendError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()?)
}

fn read_body(response: Response) -> Result<String, BackendError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| BackendError::Malformed(format!("Unreadable response body: {}", e)))?;
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Multipart upload to an OCR HTTP endpoint.
pub struct HttpBackend {
    config: HttpConfig,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: HttpConfig) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs)?;
        Ok(HttpBackend { config, client })
    }
}

impl RecognitionBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<RawText, BackendError> {
        let png = image.to_png_bytes()?;
        let part = multipart::Part::bytes(png)
            .file_name("document.png")
            .mime_str("image/png")?;

        let mut form = multipart::Form::new().part(self.config.file_field.clone(), part);
        for (name, value) in &self.config.fields {
            form = form.text(name.clone(), value.clone());
        }

        let mut request = self.client.post(&self.config.url).multipart(form);
        if let Some(key) = self.config.resolved_api_key() {
            request = request.header(self.config.api_key_header.as_str(), key);
        }

        log::debug!("uploading {}x{} image to {}", image.width(), image.height(), self.config.url);
        let body = read_body(request.send()?)?;

        match self.config.response_format {
            HttpResponseFormat::PlainText => Ok(RawText::new(body)),
            HttpResponseFormat::OcrSpace => parse_ocr_space(&body),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Vec<OcrSpaceResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResult {
    #[serde(default)]
    parsed_text: String,
}

/// Text from an OCR.space style response; one parsed result per page.
pub fn parse_ocr_space(body: &str) -> Result<RawText, BackendError> {
    let response: OcrSpaceResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;

    if response.is_errored_on_processing {
        let message = match response.error_message {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            _ => "processing failed".to_string(),
        };
        return Err(BackendError::Service(message));
    }

    let text = response
        .parsed_results
        .into_iter()
        .map(|r| r.parsed_text)
        .collect::<Vec<_>>()
        .join("\n");
    Ok(RawText::new(text))
}

/// Google Cloud Vision `images:annotate` with TEXT_DETECTION.
pub struct CloudVisionBackend {
    config: CloudVisionConfig,
    client: Client,
}

impl CloudVisionBackend {
    pub fn new(config: CloudVisionConfig) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs)?;
        Ok(CloudVisionBackend { config, client })
    }

    pub fn request_body(png: &[u8]) -> serde_json::Value {
        json!({
            "requests": [{
                "image": { "content": STANDARD.encode(png) },
                "features": [{ "type": "TEXT_DETECTION" }]
            }]
        })
    }
}

impl RecognitionBackend for CloudVisionBackend {
    fn name(&self) -> &str {
        "cloud_vision"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<RawText, BackendError> {
        let key = self
            .config
            .resolved_api_key()
            .ok_or_else(|| BackendError::Unavailable("no API key configured".to_string()))?;

        let body = Self::request_body(&image.to_png_bytes()?);
        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("key", key.as_str())])
            .json(&body)
            .send()?;

        parse_vision_response(&read_body(response)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    #[serde(default)]
    message: String,
}

pub fn parse_vision_response(body: &str) -> Result<RawText, BackendError> {
    let response: VisionResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    let first = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Malformed("response contained no results".to_string()))?;

    if let Some(status) = first.error {
        return Err(BackendError::Service(status.message));
    }

    let text = match first.full_text_annotation {
        Some(annotation) => annotation.text,
        None => first
            .text_annotations
            .into_iter()
            .next()
            .map(|a| a.description)
            .unwrap_or_default(),
    };
    Ok(RawText::new(text))
}
