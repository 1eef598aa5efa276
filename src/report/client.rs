//! Generative backend for tasting reports
//!
//! The analysis tools talk to `ReportBackend` so tests can substitute a
//! canned implementation for the real Gemini endpoint.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Gemini content generation endpoint. The API key is appended as a
/// query parameter per the v1beta contract.
const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Report text used when the API answered but carried no candidate text.
pub const EMPTY_RESPONSE_FALLBACK: &str =
    "No se pudo obtener una respuesta de la IA. Inténtalo de nuevo.";

/// Report text used when the request itself failed. The result is still
/// an ordinary report body, so downstream sectioning renders placeholders
/// instead of propagating an error.
pub fn contact_failure_text(detail: &str) -> String {
    format!("Error al contactar la IA: {}.", detail)
}

/// Text-generation backend for batch analysis.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Generate raw report text for a prompt.
    ///
    /// Ok carries the model text, or [`EMPTY_RESPONSE_FALLBACK`] when the
    /// reply had no candidates. Err is reserved for transport and
    /// configuration failures and holds a short readable detail.
    async fn generate(&self, prompt: &str) -> Result<String, String>;
}

/// Client for the Gemini generateContent API.
pub struct GeminiClient {
    api_key: String,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Build a client reading the key from `GEMINI_API_KEY`.
    ///
    /// A missing key is reported per call rather than at startup, so the
    /// rest of the service stays usable without one.
    pub fn from_env() -> Self {
        Self::with_key(std::env::var("GEMINI_API_KEY").unwrap_or_default())
    }

    pub fn with_key(api_key: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
        }
    }
}

/// Pull the first candidate's text out of a generateContent response.
/// Missing intermediate fields resolve to None rather than panicking.
fn extract_candidate_text(payload: &Value) -> Option<&str> {
    payload["candidates"][0]["content"]["parts"][0]["text"].as_str()
}

#[async_trait]
impl ReportBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        if self.api_key.is_empty() {
            return Err("GEMINI_API_KEY is not set".to_string());
        }

        let url = format!("{}?key={}", GEMINI_ENDPOINT, self.api_key);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("Error en la API: {}", response.status()));
        }

        let payload: Value = response.json().await.map_err(|e| e.to_string())?;
        match extract_candidate_text(&payload) {
            Some(text) => Ok(text.to_string()),
            None => {
                debug!("generation response had no candidate text");
                Ok(EMPTY_RESPONSE_FALLBACK.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_candidate_text() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "**Análisis del Estado Actual:**\nTodo en orden." }]
                }
            }]
        });
        assert_eq!(
            extract_candidate_text(&payload),
            Some("**Análisis del Estado Actual:**\nTodo en orden.")
        );
    }

    #[test]
    fn test_extract_handles_malformed_payloads() {
        assert_eq!(extract_candidate_text(&json!({})), None);
        assert_eq!(extract_candidate_text(&json!({ "candidates": [] })), None);
        assert_eq!(
            extract_candidate_text(&json!({ "candidates": [{ "content": {} }] })),
            None
        );
        assert_eq!(
            extract_candidate_text(&json!({
                "candidates": [{ "content": { "parts": [{ "text": 42 }] } }]
            })),
            None
        );
    }

    #[test]
    fn test_contact_failure_text_shape() {
        assert_eq!(
            contact_failure_text("network timeout"),
            "Error al contactar la IA: network timeout."
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_per_call() {
        let client = GeminiClient::with_key(String::new());
        let result = client.generate("hola").await;
        assert_eq!(result, Err("GEMINI_API_KEY is not set".to_string()));
    }
}
