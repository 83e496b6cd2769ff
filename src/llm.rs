use crate::config::LlmConfig;
use crate::error::{Result, Text2SqlError};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Text-in/text-out LLM collaborator.
///
/// The pipeline only ever needs this one call, which keeps the model
/// swappable (and stubbable in tests).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn call(&self, prompt: &str, system_instruction: Option<&str>) -> Result<String>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.1,
            max_tokens: 2048,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let mut client = Self::new(config.api_key.clone(), config.model.clone(), config.base_url.clone());
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        client
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, system_instruction: Option<&str>) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = system_instruction {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        // Reasoning models only accept max_completion_tokens.
        if self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3") {
            body["max_completion_tokens"] = serde_json::json!(self.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(self.max_tokens);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for LlmClient {
    async fn call(&self, prompt: &str, system_instruction: Option<&str>) -> Result<String> {
        let body = self.request_body(prompt, system_instruction);
        debug!("Calling LLM model {} ({} prompt chars)", self.model, prompt.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Text2SqlError::LlmCall(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Text2SqlError::LlmCall(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Text2SqlError::LlmCall(format!("Failed to decode LLM response: {}", e)))?;

        extract_content(&response_json)
    }
}

/// Pulls the first choice's message content out of a chat completion.
fn extract_content(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(Text2SqlError::LlmCall(format!("LLM API error: {}", error)));
    }

    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| Text2SqlError::LlmCall(format!("No choices in LLM response: {}", response_json)))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(Text2SqlError::LlmCall(
                "LLM response was filtered by content policy".to_string(),
            ))
        }
        _ => {}
    }

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| Text2SqlError::LlmCall(format!("No content in LLM response: {}", response_json)))?;

    if content.trim().is_empty() {
        return Err(Text2SqlError::LlmCall("Empty content in LLM response".to_string()));
    }

    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_includes_system_instruction() {
        let client = LlmClient::new("key".into(), "gpt-4o-mini".into(), "https://example.test/v1/".into());
        let body = client.request_body("question", Some("be terse"));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(client.base_url, "https://example.test/v1");
    }

    #[test]
    fn test_request_body_for_reasoning_model() {
        let client = LlmClient::new("key".into(), "o1-mini".into(), "http://localhost".into());
        let body = client.request_body("q", None);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["max_completion_tokens"], 2048);
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({"choices": [{"message": {"content": "SELECT 1"}, "finish_reason": "stop"}]});
        assert_eq!(extract_content(&ok).unwrap(), "SELECT 1");

        let filtered = json!({"choices": [{"message": {"content": "x"}, "finish_reason": "content_filter"}]});
        assert!(matches!(extract_content(&filtered), Err(Text2SqlError::LlmCall(_))));

        let error = json!({"error": {"message": "quota exceeded"}});
        let err = extract_content(&error).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));

        assert!(extract_content(&json!({"choices": []})).is_err());
    }
}
