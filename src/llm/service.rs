use std::sync::Arc;
use std::time::Duration;

use super::openai_compat::OpenAiCompatProvider;
use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

/// Binds a provider to the configured chat and embedding models.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        let provider = OpenAiCompatProvider::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            Duration::from_secs(settings.timeout_secs),
        );
        Self::new(Arc::new(provider), settings.clone())
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn chat_model(&self) -> &str {
        &self.settings.chat_model
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await.unwrap_or(false)
    }

    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, ApiError> {
        let request = ChatRequest::new(messages).with_settings(&self.settings);
        self.provider.chat(request, &self.settings.chat_model).await
    }

    /// Single-turn generation from a fully rendered prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        self.chat(vec![ChatMessage::user(prompt)]).await
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .provider
            .embed(inputs, &self.settings.embedding_model)
            .await?;

        if vectors.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "Embedding count mismatch: expected {}, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        if vectors.iter().any(|v| v.is_empty()) {
            return Err(ApiError::Internal(
                "Embedding provider returned an empty vector".to_string(),
            ));
        }

        Ok(vectors)
    }

    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed(&[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Internal("Embedding provider returned nothing".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic in-process provider shared by unit tests across the crate.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Replies are popped in order; once exhausted, `fallback` is returned.
    /// Embeddings are bag-of-letters vectors so similar texts score higher.
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, String>>>,
        fallback: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<Result<String, String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback: String::new(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn with_fallback(mut self, fallback: &str) -> Self {
            self.fallback = fallback.to_string();
            self
        }

        pub fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    pub fn letter_embedding(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; 27];
        for c in text.to_lowercase().chars() {
            if c.is_ascii_lowercase() {
                vector[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        vector[26] = 0.01;
        vector
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            let prompt = request
                .messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n");
            self.prompts.lock().unwrap().push(prompt);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(err)) => Err(ApiError::Internal(err)),
                None => Ok(self.fallback.clone()),
            }
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|text| letter_embedding(text)).collect())
        }
    }

    pub fn scripted_service(replies: Vec<Result<String, String>>) -> (LlmService, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(replies));
        let service = LlmService::new(provider.clone(), LlmSettings::default());
        (service, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn generate_passes_prompt_through() {
        let (service, provider) = scripted_service(vec![Ok("42".to_string())]);
        let reply = service.generate("What is six times seven?").await.unwrap();

        assert_eq!(reply, "42");
        assert_eq!(provider.prompt_count(), 1);
    }

    #[tokio::test]
    async fn embed_returns_one_vector_per_input() {
        let (service, _) = scripted_service(vec![]);
        let vectors = service
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(service.embed(&[]).await.unwrap().is_empty());
    }
}
