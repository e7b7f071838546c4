//! Insight Synthesizer
//!
//! Second model call: the caller's system prompt plus the question and the
//! fetched data, asking for an analysis that answers the question.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{QueryError, Result};
use crate::message::Message;
use crate::provider::ModelRouter;

pub struct InsightSynthesizer {
    router: Arc<ModelRouter>,
}

impl InsightSynthesizer {
    pub const fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }

    /// Generate analysis text. The result is raw model output; callers sanitize it.
    pub async fn synthesize(
        &self,
        user_input: &str,
        data: &Value,
        system_prompt: &str,
        model: &str,
    ) -> Result<String> {
        if system_prompt.trim().is_empty() {
            return Err(QueryError::Validation("System prompt is required".into()));
        }

        let messages = [
            Message::system(system_prompt),
            Message::user(user_message(user_input, data)?),
        ];

        let completion = self
            .router
            .complete(model, &messages)
            .await
            .map_err(|e| QueryError::Synthesis(e.to_string()))?;

        if completion.content.trim().is_empty() {
            return Err(QueryError::Synthesis("model returned no analysis".into()));
        }
        Ok(completion.content)
    }
}

fn user_message(user_input: &str, data: &Value) -> Result<String> {
    Ok(format!(
        "User Question: {user_input}\n\nAvailable Data:\n{}\n\nPlease analyze this data and provide insights that directly address the user's question.",
        serde_json::to_string_pretty(data)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, GenerationOptions, LlmProvider, ModelRoute, OutputLimit, ProviderKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        reply: Result<String>,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl LlmProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            match &self.reply {
                Ok(text) => Ok(Completion {
                    content: text.clone(),
                    model: options.model.clone(),
                    usage: None,
                    finish_reason: None,
                }),
                Err(e) => Err(QueryError::Provider(e.to_string())),
            }
        }
    }

    fn synthesizer(reply: Result<String>) -> (InsightSynthesizer, Arc<Recording>) {
        let provider = Arc::new(Recording {
            reply,
            seen: Mutex::default(),
        });
        let mut router = ModelRouter::new("r");
        router.register(
            ModelRoute {
                id: "r".into(),
                kind: ProviderKind::Ollama,
                endpoint: "http://localhost:11434".into(),
                model: "llama3.2".into(),
                output_limit: OutputLimit::MaxTokens(2048),
                temperature: None,
            },
            provider.clone(),
        );
        (InsightSynthesizer::new(Arc::new(router)), provider)
    }

    #[tokio::test]
    async fn test_message_layout() {
        let (synth, provider) = synthesizer(Ok("BTC is up.".into()));
        let text = synth
            .synthesize("How is BTC?", &json!({"price": "$97500.00"}), "You are a crypto assistant.", "r")
            .await
            .unwrap();
        assert_eq!(text, "BTC is up.");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].content, "You are a crypto assistant.");
        assert!(seen[1].content.starts_with("User Question: How is BTC?\n\nAvailable Data:\n{"));
        assert!(seen[1].content.contains("\"price\": \"$97500.00\""));
        assert!(seen[1].content.ends_with("directly address the user's question."));
    }

    #[tokio::test]
    async fn test_blank_system_prompt_rejected() {
        let (synth, provider) = synthesizer(Ok("x".into()));
        let err = synth.synthesize("q", &json!({}), "   ", "r").await.unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_and_empty_reply() {
        let (synth, _) = synthesizer(Err(QueryError::Provider("502".into())));
        let err = synth.synthesize("q", &json!({}), "sys", "r").await.unwrap_err();
        assert!(matches!(err, QueryError::Synthesis(_)));

        let (synth, _) = synthesizer(Ok(String::new()));
        let err = synth.synthesize("q", &json!({}), "sys", "r").await.unwrap_err();
        assert!(matches!(err, QueryError::Synthesis(_)));
    }
}
