//! Model route table
//!
//! Three routes are exposed to callers:
//!
//! | id        | backend                    | output limit                  |
//! |-----------|----------------------------|-------------------------------|
//! | `o3-mini` | OpenAI                     | `max_completion_tokens: 4096` |
//! | `io.net`  | Groq (DeepSeek-R1 distill) | `max_tokens: 4096`            |
//! | `ollama`  | local Ollama               | `num_predict: 2048`           |

use std::sync::Arc;
use std::time::Duration;

use query_core::{
    client::RetryPolicy,
    error::Result,
    provider::{LlmProvider, ModelRoute, ModelRouter, OutputLimit, ProviderKind},
};

#[cfg(feature = "ollama")]
use crate::ollama::{OllamaConfig, OllamaProvider};
use crate::openai::{OpenAiConfig, OpenAiProvider};

pub const OPENAI_ROUTE: &str = "o3-mini";
pub const GROQ_ROUTE: &str = "io.net";
pub const OLLAMA_ROUTE: &str = "ollama";

/// One hosted OpenAI-compatible backend
#[derive(Clone, Debug)]
pub struct HostedModel {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Everything needed to build the route table
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub openai: HostedModel,
    pub groq: HostedModel,
    #[cfg(feature = "ollama")]
    pub ollama: OllamaConfig,
    pub default_model: String,
    pub retry: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            openai: HostedModel {
                base_url: "https://api.openai.com/v1".into(),
                api_key: None,
                model: OPENAI_ROUTE.into(),
            },
            groq: HostedModel {
                base_url: "https://api.groq.com/openai/v1".into(),
                api_key: None,
                model: "deepseek-r1-distill-llama-70b".into(),
            },
            #[cfg(feature = "ollama")]
            ollama: OllamaConfig::default(),
            default_model: GROQ_ROUTE.into(),
            retry: RetryPolicy {
                throttle: Duration::ZERO,
                ..RetryPolicy::default()
            },
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            openai: HostedModel {
                base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
                api_key: var("OPENAI_API_KEY"),
                model: defaults.openai.model,
            },
            groq: HostedModel {
                base_url: var("GROQ_BASE_URL").unwrap_or(defaults.groq.base_url),
                api_key: var("GROQ_API_KEY"),
                model: var("GROQ_MODEL").unwrap_or(defaults.groq.model),
            },
            #[cfg(feature = "ollama")]
            ollama: OllamaConfig::from_env(),
            default_model: var("DEFAULT_MODEL").unwrap_or(defaults.default_model),
            retry: RetryPolicy::from_env("MODEL_THROTTLE_MS", 0),
        }
    }
}

fn hosted(
    router: &mut ModelRouter,
    id: &str,
    hosted: &HostedModel,
    output_limit: OutputLimit,
    retry: RetryPolicy,
) -> Result<()> {
    if hosted.api_key.is_none() {
        tracing::warn!(route = id, "No API key configured; requests on this route will be rejected upstream");
    }

    let provider = OpenAiProvider::new(
        id,
        OpenAiConfig {
            base_url: hosted.base_url.clone(),
            api_key: hosted.api_key.clone(),
            retry,
            ..OpenAiConfig::default()
        },
    )?;

    let route = ModelRoute {
        id: id.into(),
        kind: ProviderKind::OpenAiCompatible,
        endpoint: hosted.base_url.clone(),
        model: hosted.model.clone(),
        output_limit,
        temperature: None,
    };
    router.register(route, Arc::new(provider) as Arc<dyn LlmProvider>);
    Ok(())
}

/// Build the route table. Routes are registered even without credentials so
/// `/health` can report them.
pub fn build_router(config: &RuntimeConfig) -> Result<ModelRouter> {
    let mut router = ModelRouter::new(config.default_model.clone());

    hosted(&mut router, OPENAI_ROUTE, &config.openai, OutputLimit::MaxCompletionTokens(4096), config.retry)?;
    hosted(&mut router, GROQ_ROUTE, &config.groq, OutputLimit::MaxTokens(4096), config.retry)?;

    #[cfg(feature = "ollama")]
    router.register(
        ModelRoute {
            id: OLLAMA_ROUTE.into(),
            kind: ProviderKind::Ollama,
            endpoint: config.ollama.endpoint(),
            model: config.ollama.model.clone(),
            output_limit: OutputLimit::MaxTokens(2048),
            temperature: None,
        },
        Arc::new(OllamaProvider::from_config(&config.ollama)),
    );

    if router.resolve(None).is_err() {
        tracing::warn!(default = %config.default_model, "Default model is not a registered route");
    }

    tracing::info!(routes = ?router.route_ids(), default = router.default_route(), "Model routes ready");
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        let router = build_router(&RuntimeConfig::default()).unwrap();

        let o3 = router.resolve(Some(OPENAI_ROUTE)).unwrap();
        assert_eq!(o3.route.output_limit, OutputLimit::MaxCompletionTokens(4096));
        assert_eq!(o3.route.model, "o3-mini");

        let groq = router.resolve(None).unwrap();
        assert_eq!(groq.route.id, GROQ_ROUTE);
        assert_eq!(groq.route.model, "deepseek-r1-distill-llama-70b");
        assert_eq!(groq.route.output_limit, OutputLimit::MaxTokens(4096));
        assert_eq!(groq.provider.name(), GROQ_ROUTE);

        #[cfg(feature = "ollama")]
        {
            let local = router.resolve(Some(OLLAMA_ROUTE)).unwrap();
            assert_eq!(local.route.kind, ProviderKind::Ollama);
            assert_eq!(local.route.output_limit, OutputLimit::MaxTokens(2048));
        }

        assert!(router.resolve(Some("gpt-4")).is_err());
    }

    #[test]
    fn test_model_routes_back_off_on_throttling() {
        let retry = RuntimeConfig::default().retry;
        assert_eq!(retry.throttle, Duration::ZERO);
        assert_eq!(retry.max_retries, 3);

        let waits: Vec<_> = (1..=retry.max_retries).map(|n| retry.backoff(n)).collect();
        assert_eq!(
            waits,
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_custom_default_route() {
        let config = RuntimeConfig {
            default_model: OPENAI_ROUTE.into(),
            ..RuntimeConfig::default()
        };
        let router = build_router(&config).unwrap();
        assert_eq!(router.resolve(Some("")).unwrap().route.id, OPENAI_ROUTE);
    }
}
