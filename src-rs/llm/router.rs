use std::collections::HashMap;
use std::sync::Arc;

use super::types::{CompletionRequest, LLMResponse, ProviderAdapter, ProviderError};

pub struct LLMRouter {
    default_provider: String,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl LLMRouter {
    pub fn new(default_provider: &str) -> Self {
        Self {
            default_provider: default_provider.to_string(),
            providers: HashMap::new(),
        }
    }

    pub fn register_provider(&mut self, name: &str, adapter: Arc<dyn ProviderAdapter>) {
        self.providers.insert(name.to_string(), adapter);
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let provider = request
            .provider
            .clone()
            .unwrap_or_else(|| self.default_provider.clone());
        let adapter = self.providers.get(&provider).ok_or_else(|| {
            ProviderError::new("provider_missing", &format!("provider not registered: {}", provider), false)
        })?;
        adapter.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::llm::Message;

    struct Fixed(&'static str);

    #[async_trait]
    impl ProviderAdapter for Fixed {
        async fn complete(&self, _request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
            Ok(LLMResponse {
                content: self.0.to_string(),
                raw: None,
            })
        }
    }

    fn request(provider: Option<&str>) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("hi")],
            temperature: None,
            model: None,
            provider: provider.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn routes_to_default_provider() {
        let mut router = LLMRouter::new("fixed");
        router.register_provider("fixed", Arc::new(Fixed("hello")));
        let resp = router.complete(request(None)).await.unwrap();
        assert_eq!(resp.content, "hello");
    }

    #[tokio::test]
    async fn unknown_provider_is_an_error() {
        let router = LLMRouter::new("fixed");
        let err = router.complete(request(Some("missing"))).await.unwrap_err();
        assert_eq!(err.code, "provider_missing");
        assert!(!err.retryable);
    }
}
