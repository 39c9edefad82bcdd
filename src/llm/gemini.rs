use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::codec::ImageFile;
use crate::config::Config;
use crate::llm::{GenerationError, ImageGenerator};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_generation_timing;

const BASE_PROMPT: &str = "En utilisant le visage fourni, générez une image de séance photo d'anniversaire hyper stylée et festive. La personne doit être au centre de l'attention, l'air heureux et à la mode. Pensez à des couleurs vives, des confettis, des ballons ou un décor de fête chic. L'ambiance générale doit être joyeuse et sophistiquée.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

/// Gemini `generateContent` client asking for image-only output.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        http: Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            get_http_client().clone(),
            config.api_key.clone(),
            config.gemini_image_model.clone(),
            config.gemini_base_url.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    async fn call_generate_content(&self, payload: &Value) -> Result<GeminiResponse, GenerationError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.trim())
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact_api_key(&err.to_string());
                error!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                GenerationError::Failed(format!("request failed: {err_text}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            let err_text = self.redact_api_key(&err.to_string());
            error!("Failed to read Gemini response body: {}", err_text);
            GenerationError::Failed(format!("failed to read response body: {err_text}"))
        })?;

        if !status.is_success() {
            let (message, body_summary) = summarize_error_body(&body);
            error!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(GenerationError::Failed(format!(
                "status {}: {}",
                status,
                self.redact_api_key(&detail)
            )));
        }

        serde_json::from_str::<GeminiResponse>(&body).map_err(|err| {
            error!(
                "Gemini response has an unexpected shape: {} body={}",
                err,
                truncate_for_log(&body, 500)
            );
            GenerationError::Failed(format!("malformed response: {err}"))
        })
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(
        &self,
        source: &ImageFile,
        age: &str,
        outfit: &str,
    ) -> Result<String, GenerationError> {
        if self.api_key.trim().is_empty() {
            return Err(GenerationError::Configuration);
        }

        let prompt = build_prompt(age, outfit);
        let payload = build_payload(source, &prompt);
        debug!(
            target: "llm.gemini",
            model = %self.model,
            image_mime = %source.mime_type,
            image_bytes = source.len(),
            prompt = %prompt
        );

        let metadata = json!({
            "imageBytes": source.len(),
            "hasAge": !age.is_empty(),
            "hasOutfit": !outfit.is_empty(),
        });
        let client = self;
        log_generation_timing("gemini", &self.model, "birthday_shoot", Some(metadata), move || async move {
            let response = client.call_generate_content(&payload).await?;
            debug!(target: "llm.gemini", response = %summarize_gemini_response(&response));
            extract_first_image(response)
        })
        .await
    }
}

/// Whether `value` reads as a number the way form inputs are read: leading
/// whitespace and an optional sign, then at least one digit. Anything after
/// the first digit is ignored.
fn starts_with_integer(value: &str) -> bool {
    let trimmed = value.trim_start();
    let unsigned = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);
    unsigned.starts_with(|ch: char| ch.is_ascii_digit())
}

pub fn build_prompt(age: &str, outfit: &str) -> String {
    let mut prompt = BASE_PROMPT.to_string();

    if !outfit.is_empty() {
        prompt.push_str(&format!(" La personne porte une tenue de style '{outfit}'."));
    }

    // An age that does not parse simply drops the balloon clause.
    if starts_with_integer(age) {
        prompt.push_str(&format!(
            " Elle tient ou est à côté de grands ballons brillants en forme du nombre {age}."
        ));
    }

    prompt
}

fn build_payload(source: &ImageFile, prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inlineData": {
                        "mimeType": source.mime_type,
                        "data": source.to_base64()
                    }
                },
                { "text": prompt }
            ]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"]
        }
    })
}

fn extract_first_image(response: GeminiResponse) -> Result<String, GenerationError> {
    let mut text_preview = None;
    let mut finish_reasons = Vec::new();

    for candidate in response.candidates.unwrap_or_default() {
        if let Some(reason) = candidate.finish_reason {
            finish_reasons.push(reason);
        }
        let parts = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default();
        for part in parts {
            match part {
                GeminiPart::InlineData { inline_data } => {
                    if inline_data.mime_type.starts_with("image/") && !inline_data.data.trim().is_empty() {
                        return Ok(inline_data.data);
                    }
                }
                GeminiPart::Text { text } => {
                    if text_preview.is_none() && !text.trim().is_empty() {
                        text_preview = Some(truncate_for_log(&text, 200));
                    }
                }
                GeminiPart::Other(_) => {}
            }
        }
    }

    let mut detail = Vec::new();
    if let Some(reason) = response.prompt_feedback.and_then(|feedback| feedback.block_reason) {
        detail.push(format!("blockReason={reason}"));
    }
    if !finish_reasons.is_empty() {
        detail.push(format!("finishReason={}", finish_reasons.join(",")));
    }
    if let Some(text) = text_preview {
        detail.push(format!("text={text:?}"));
    }
    let detail = if detail.is_empty() {
        "empty response".to_string()
    } else {
        detail.join(" ")
    };
    warn!("Gemini returned no image: {}", detail);
    Err(GenerationError::NoImageReturned(detail))
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts {
            match part {
                GeminiPart::Text { .. } => text_parts += 1,
                GeminiPart::InlineData { inline_data } if inline_data.mime_type.starts_with("image/") => {
                    image_parts += 1
                }
                _ => {}
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "imageParts": image_parts,
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}
