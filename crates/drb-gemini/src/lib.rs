//! Gemini adapter (generateContent).
//!
//! This crate implements the `drb-core` GenerationClient over the Google
//! Generative Language API. The API key travels per call so one client can
//! serve a whole rotation of keys.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drb_core::{domain::Credential, errors::Error, model::GenerationClient, Result};

const GEMINI_API: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone, Debug)]
pub struct GeminiClient {
    model: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            model: model.into(),
            http,
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn complete(&self, credential: &Credential, prompt: &str) -> Result<String> {
        let url = format!(
            "{GEMINI_API}/v1beta/models/{}:generateContent?key={}",
            self.model, credential.0
        );

        let resp = self
            .http
            .post(&url)
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("gemini request error: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "gemini request failed: {status} {}",
                error_detail(&body)
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| Error::Transport(format!("gemini json error: {e}")))?;

        extract_text(parsed)
            .ok_or_else(|| Error::Transport("gemini returned no candidates".to_string()))
    }
}

/// Prefer the API's own error message when the body carries one.
fn error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if !parsed.error.message.is_empty() {
            return parsed.error.message;
        }
    }
    body.chars().take(200).collect()
}

fn extract_text(resp: GenerateResponse) -> Option<String> {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

impl GenerateRequest {
    fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_the_wire_format() {
        let body = serde_json::to_value(GenerateRequest::from_prompt("halo")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{ "parts": [{ "text": "halo" }] }]
            })
        );
    }

    #[test]
    fn response_text_comes_from_the_first_part_of_the_first_candidate() {
        let raw = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [{ "text": "hai juga" }, { "text": "ignored" }],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                },
                { "content": { "parts": [{ "text": "also ignored" }] } }
            ]
        }"#;

        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).as_deref(), Some("hai juga"));
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{ "candidates": [] }"#).unwrap();
        assert_eq!(extract_text(parsed), None);

        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_text(parsed), None);
    }

    #[test]
    fn candidate_without_parts_yields_no_text() {
        let raw = r#"{ "candidates": [{ "content": { "parts": [] } }] }"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed), None);
    }

    #[test]
    fn error_detail_prefers_the_api_message() {
        let body = r#"{ "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" } }"#;
        assert_eq!(error_detail(body), "API key not valid");
    }

    #[test]
    fn error_detail_falls_back_to_the_raw_body() {
        assert_eq!(error_detail("<html>bad gateway</html>"), "<html>bad gateway</html>");
        let long = "x".repeat(500);
        assert_eq!(error_detail(&long).len(), 200);
    }
}
