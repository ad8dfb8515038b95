use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub trait GenerationClient {
    /// Submit one prompt and return the model's prose.
    /// A single call is attempted; no retry.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Gemini `generateContent` client over blocking HTTP.
pub struct GeminiClient {
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self { api_key, model }
    }

    fn url(&self) -> String {
        format!("{GEMINI_API_URL}/models/{}:generateContent", self.model)
    }
}

impl GenerationClient for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        // The key travels in a header so transport errors never echo it.
        let response = ureq::post(&self.url())
            .set("x-goog-api-key", &self.api_key)
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => {
                    Error::Generation(format!("generateContent returned HTTP {code}"))
                }
                ureq::Error::Transport(t) => {
                    Error::Generation(format!("generateContent transport error: {t}"))
                }
            })?;

        let parsed: GenerateContentResponse = response.into_json().map_err(|e| {
            Error::Generation(format!("failed to parse generateContent response: {e}"))
        })?;

        let text = extract_text(parsed)?;
        debug!(model = %self.model, chars = text.len(), "generation complete");
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let text = response
        .candidates
        .into_iter()
        .flat_map(|candidate| candidate.content.map(|c| c.parts).unwrap_or_default())
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(Error::Generation(
            "model returned no text content".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_single_part() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"APPROVED: looks complete."}]}}]}"#,
        );
        assert_eq!(extract_text(response).unwrap(), "APPROVED: looks complete.");
    }

    #[test]
    fn test_extract_joins_parts() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"first"},{"text":"second"}]}}]}"#,
        );
        assert_eq!(extract_text(response).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_extract_no_candidates_is_error() {
        let response = parse(r#"{}"#);
        let err = extract_text(response).unwrap_err();
        assert!(err.to_string().contains("no text content"));
    }

    #[test]
    fn test_extract_empty_text_is_error() {
        let response = parse(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#);
        assert!(extract_text(response).is_err());
    }

    #[test]
    fn test_extract_missing_content_tolerated() {
        let response =
            parse(r#"{"candidates":[{},{"content":{"parts":[{"text":"late answer"}]}}]}"#);
        assert_eq!(extract_text(response).unwrap(), "late answer");
    }

    #[test]
    fn test_url_embeds_model() {
        let client = GeminiClient::new("key".to_string(), "gemini-2.5-flash".to_string());
        assert_eq!(
            client.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
