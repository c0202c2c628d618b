//! External model collaborators: vision description, audio transcription,
//! and plain text completion.
//!
//! The pipeline never talks to a concrete provider directly — it holds
//! `Arc<dyn VisionDescriber>` / `Arc<dyn Transcriber>` injected at
//! construction time, so tests substitute deterministic doubles and the
//! production binary plugs in one [`OpenAiCompatClient`]. The client covers
//! any OpenAI-compatible endpoint (OpenAI, OpenRouter, Together, local
//! servers) because they all share the chat-completions and
//! audio-transcriptions wire shapes.
//!
//! Connection/auth state lives in the shared `reqwest::Client`, so one
//! client instance is safely reused across concurrent requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a provider call. Recoverability is the caller's decision:
/// the describe stage retries then degrades in place, transcription
/// degrades to an empty transcript, skill scoring propagates as fatal.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The API answered 2xx but the body had an unexpected shape.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },
}

/// One time-ordered unit of transcribed speech.
///
/// Concatenating segment texts in order (single-space separated) yields
/// the full transcript. No overlap or gap correction is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
}

/// Converts a single image into a natural-language description.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    /// Describe the image behind `image_data_url` following `prompt`.
    async fn describe(&self, prompt: &str, image_data_url: &str) -> Result<String, ProviderError>;
}

/// Converts an audio buffer into time-ordered transcript segments.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a self-contained WAV buffer.
    async fn transcribe(&self, audio_wav: Vec<u8>) -> Result<Vec<TranscriptSegment>, ProviderError>;
}

/// Completes a plain text prompt (skill scoring and tree building).
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Production client for any OpenAI-compatible API.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    vision_model: String,
    text_model: String,
    transcription_model: String,
}

impl OpenAiCompatClient {
    /// Build a client against `base_url` (e.g. `https://openrouter.ai/api/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            vision_model: "mistralai/mistral-small-3.2-24b-instruct:free".to_string(),
            text_model: "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free".to_string(),
            transcription_model: "whisper-1".to_string(),
        })
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    /// POST a chat-completions payload and pull out the first choice's text.
    async fn chat(&self, payload: serde_json::Value) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
                detail: format!("not JSON: {e}"),
            })?;
        extract_chat_content(&value)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn extract_chat_content(value: &serde_json::Value) -> Result<String, ProviderError> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::Malformed {
            detail: format!(
                "missing choices[0].message.content in: {}",
                snippet(&value.to_string())
            ),
        })
}

/// Truncate a response body for error messages and logs.
fn snippet(s: &str) -> String {
    const MAX: usize = 300;
    if s.len() <= MAX {
        s.to_string()
    } else {
        let mut end = MAX;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[async_trait]
impl VisionDescriber for OpenAiCompatClient {
    async fn describe(&self, prompt: &str, image_data_url: &str) -> Result<String, ProviderError> {
        debug!(model = %self.vision_model, "vision describe call");
        self.chat(json!({
            "model": self.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image_data_url } },
                ],
            }],
        }))
        .await
    }
}

#[async_trait]
impl TextCompleter for OpenAiCompatClient {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!(model = %self.text_model, "text completion call");
        self.chat(json!({
            "model": self.text_model,
            "messages": [{ "role": "user", "content": prompt }],
        }))
        .await
    }
}

#[async_trait]
impl Transcriber for OpenAiCompatClient {
    async fn transcribe(&self, audio_wav: Vec<u8>) -> Result<Vec<TranscriptSegment>, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let part = reqwest::multipart::Part::bytes(audio_wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .text("response_format", "verbose_json")
            .part("file", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
                detail: format!("not JSON: {e}"),
            })?;

        // verbose_json carries per-segment timing; plain responses carry
        // only "text". Accept both shapes.
        if let Some(segments) = value["segments"].as_array() {
            let mut out = Vec::with_capacity(segments.len());
            for seg in segments {
                let text = seg["text"].as_str().ok_or_else(|| ProviderError::Malformed {
                    detail: "segment without text field".to_string(),
                })?;
                out.push(TranscriptSegment {
                    text: text.trim().to_string(),
                });
            }
            return Ok(out);
        }
        if let Some(text) = value["text"].as_str() {
            return Ok(vec![TranscriptSegment {
                text: text.trim().to_string(),
            }]);
        }
        Err(ProviderError::Malformed {
            detail: format!("no segments or text in: {}", snippet(&body)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_content_happy_path() {
        let v = json!({
            "choices": [{ "message": { "content": "a slide about Rust" } }]
        });
        assert_eq!(extract_chat_content(&v).unwrap(), "a slide about Rust");
    }

    #[test]
    fn extract_content_rejects_missing_shape() {
        let v = json!({ "error": { "message": "quota exceeded" } });
        let err = extract_chat_content(&v).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let s = snippet(&long);
        assert!(s.len() < 1000);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let s = format!("{}é", "x".repeat(299));
        let _ = snippet(&s); // must not panic
    }
}
