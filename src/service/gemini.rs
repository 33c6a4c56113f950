//! # Gemini Backend
//!
//! Implements [`DescriptionService`] and [`GenerationService`] on top of the
//! Generative Language `generateContent` REST endpoint.
//!
//! ## Request Shape
//!
//! ```text
//! POST {base}/v1beta/models/{model}:generateContent
//! x-goog-api-key: <key>
//!
//! { "contents": [{ "parts": [ { "inlineData": { "mimeType", "data": <base64> } },
//!                             { "text": <instruction> } ] }],
//!   "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] } }
//! ```

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ContentPart, DescriptionService, GenerationRequest, GenerationService, Modality};
use crate::config::ServiceConfig;
use crate::error::{Result, RoomstageError};
use crate::media::ImageData;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart<'a> {
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: String,
    },
    Text(&'a str),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<Modality>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

/// HTTP client for the Generative Language API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: ServiceConfig,
}

impl GeminiClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("roomstage/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| RoomstageError::Service(format!("HTTP client error: {}", e)))?;
        Ok(Self { http, config })
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest<'_>,
    ) -> Result<Vec<ContentPart>> {
        let url = self.config.endpoint(model);
        debug!(model, "sending generateContent request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| RoomstageError::Service(format!("Request to {} failed: {}", model, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(300).collect();
            return Err(RoomstageError::Service(format!(
                "{} returned HTTP {}: {}",
                model, status, excerpt
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| RoomstageError::Service(format!("Failed to parse response: {}", e)))?;

        Ok(flatten_parts(parsed))
    }
}

/// Flatten all candidates' parts into [`ContentPart`]s, in response order.
fn flatten_parts(response: GenerateContentResponse) -> Vec<ContentPart> {
    let mut out = Vec::new();
    let parts = response
        .candidates
        .into_iter()
        .flatten()
        .filter_map(|c| c.content)
        .filter_map(|c| c.parts)
        .flatten();

    for part in parts {
        if let Some(inline) = part.inline_data {
            match BASE64.decode(inline.data.as_bytes()) {
                Ok(bytes) => out.push(ContentPart::InlineData(ImageData::new(
                    bytes,
                    inline.mime_type,
                ))),
                Err(e) => warn!("Skipping undecodable inline data: {}", e),
            }
        } else if let Some(text) = part.text {
            out.push(ContentPart::Text(text));
        }
    }
    out
}

fn image_request<'a>(
    image: &'a ImageData,
    instruction: &'a str,
    modalities: Option<Vec<Modality>>,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::InlineData {
                    mime_type: image.mime_type(),
                    data: BASE64.encode(image.bytes()),
                },
                RequestPart::Text(instruction),
            ],
        }],
        generation_config: modalities.map(|response_modalities| GenerationConfig {
            response_modalities,
        }),
    }
}

#[async_trait]
impl DescriptionService for GeminiClient {
    async fn describe(&self, image: &ImageData, instruction: &str) -> Result<String> {
        let body = image_request(image, instruction, None);
        let parts = self
            .generate_content(&self.config.description_model, &body)
            .await?;

        let text: String = parts
            .into_iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t),
                ContentPart::InlineData(_) => None,
            })
            .collect();
        let text = text.trim();
        if text.is_empty() {
            return Err(RoomstageError::Service("Empty description".to_string()));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<ContentPart>> {
        let body = image_request(
            &request.image,
            &request.instruction,
            Some(request.modalities.clone()),
        );
        self.generate_content(&self.config.image_model, &body).await
    }
}
