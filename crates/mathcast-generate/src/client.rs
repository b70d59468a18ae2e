//! A backend bound to one model, plus the structured/plain call helpers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;

use mathcast_llm::{CompletionRequest, Message, SharedBackend};
use mathcast_pipeline::{ImagePayload, PipelineError, Result, strip_code_fences};

/// Default completion budget for generation calls.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// An LLM backend plus the model parameters used for every call.
#[derive(Clone)]
pub struct ModelClient {
    backend: SharedBackend,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl ModelClient {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn request(&self, prompt: &str, image: Option<&ImagePayload>) -> CompletionRequest {
        let message = match image {
            Some(image) => Message::user_with_image(
                prompt,
                image.mime_type.clone(),
                STANDARD.encode(&image.bytes),
            ),
            None => Message::user(prompt),
        };
        let mut request = CompletionRequest::new(&self.model, vec![message], self.max_tokens);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    /// Ask for a JSON object and parse it as `T`.
    ///
    /// Fences around the JSON are tolerated. A response that does not parse
    /// is `MalformedOutput`, naming `what` was expected.
    pub async fn invoke_structured<T: DeserializeOwned>(
        &self,
        what: &str,
        prompt: &str,
        image: Option<&ImagePayload>,
    ) -> Result<T> {
        let request = self.request(prompt, image).with_json_mode();
        let response = self.backend.complete(request).await?;
        if response.is_truncated() {
            tracing::warn!(what, model = %self.model, "Structured response hit the token limit");
        }
        let text = strip_code_fences(&response.text());
        serde_json::from_str(&text)
            .map_err(|e| PipelineError::MalformedOutput(format!("{}: {}", what, e)))
    }

    /// Plain-text completion.
    pub async fn invoke_plain(&self, prompt: &str) -> Result<String> {
        let response = self.backend.complete(self.request(prompt, None)).await?;
        Ok(response.text())
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathcast_llm::{ContentPart, MockBackend};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: i32,
    }

    #[tokio::test]
    async fn test_invoke_structured_strips_fences() {
        let mock = Arc::new(MockBackend::with_text("```json\n{\"value\": 42}\n```"));
        let client = ModelClient::new(mock.clone(), "gpt-test").with_temperature(0.1);

        let answer: Answer = client.invoke_structured("answer", "q", None).await.unwrap();
        assert_eq!(answer, Answer { value: 42 });

        let request = &mock.requests()[0];
        assert!(request.json_mode);
        assert_eq!(request.model, "gpt-test");
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_invoke_structured_malformed() {
        let mock = Arc::new(MockBackend::with_text("not json at all"));
        let client = ModelClient::new(mock, "m");

        let err = client
            .invoke_structured::<Answer>("answer", "q", None)
            .await
            .unwrap_err();
        match err {
            PipelineError::MalformedOutput(msg) => assert!(msg.starts_with("answer:")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_image_attached_as_base64() {
        let mock = Arc::new(MockBackend::with_text("{\"value\": 1}"));
        let client = ModelClient::new(mock.clone(), "vision");
        let image = ImagePayload::new(b"abc".to_vec(), "image/png");

        let _: Answer = client
            .invoke_structured("answer", "look", Some(&image))
            .await
            .unwrap();

        let message = &mock.requests()[0].messages[0];
        assert!(message.has_image());
        assert!(message.content.iter().any(|part| matches!(
            part,
            ContentPart::Image { mime_type, data } if mime_type == "image/png" && data == "YWJj"
        )));
    }

    #[tokio::test]
    async fn test_backend_error_propagates_as_llm() {
        let mock = Arc::new(MockBackend::new(vec![]));
        let client = ModelClient::new(mock, "m");
        let err = client.invoke_plain("hi").await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }
}
