//! HTTP Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use query_core::{AnalysisRequest, AnalysisResult, ProviderKind, QueryError};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub default_model: String,
    pub models: Vec<ModelHealth>,
    pub capabilities: usize,
}

#[derive(Debug, Serialize)]
pub struct ModelHealth {
    pub id: String,
    pub kind: ProviderKind,
    pub model: String,
    pub healthy: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint. Probes every model route.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let router = state.pipeline.router();

    let mut models = Vec::with_capacity(router.len());
    for routed in router.routes() {
        let healthy = match routed.provider.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::debug!(route = %routed.route.id, error = %e, "Health check failed");
                false
            }
        };
        models.push(ModelHealth {
            id: routed.route.id.clone(),
            kind: routed.route.kind,
            model: routed.route.model.clone(),
            healthy,
        });
    }

    let default_healthy = models
        .iter()
        .any(|m| m.healthy && m.id == router.default_route());

    Json(HealthResponse {
        status: if default_healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        default_model: router.default_route().to_string(),
        models,
        capabilities: state.pipeline.executor().registry().len(),
    })
}

/// Resolve one natural-language question.
///
/// Malformed requests get `400`, other fatal failures `500`. Degraded runs
/// (failed data fetch, failed synthesis) are still `200` with `success: true`.
pub async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> (StatusCode, Json<AnalysisResult>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Malformed analyze request");
            let err = QueryError::Validation(rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(AnalysisResult::failure(&err)));
        }
    };

    tracing::info!(
        query = %request.query.chars().take(100).collect::<String>(),
        model = request.model.as_deref().unwrap_or(state.pipeline.router().default_route()),
        "Processing analysis request"
    );

    let result = state.pipeline.analyze(&request).await;

    let status = if result.is_success() {
        StatusCode::OK
    } else if result.is_validation_failure() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(result))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use market_data::{register_all, DataConfig, DataSources};
    use query_core::{
        provider::{Completion, GenerationOptions},
        Bindings, CapabilityRegistry, LlmProvider, Message, ModelRoute, ModelRouter, OutputLimit,
        PipelineConfig, QueryPipeline, Result,
    };

    use super::*;
    use crate::app;

    /// Replays canned replies in order
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        healthy: bool,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.healthy)
        }

        async fn complete(&self, _messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| QueryError::Provider("script exhausted".into()))?;
            Ok(Completion {
                content,
                model: options.model.clone(),
                usage: None,
                finish_reason: None,
            })
        }
    }

    fn route(id: &str, kind: ProviderKind, model: &str) -> ModelRoute {
        ModelRoute {
            id: id.into(),
            kind,
            endpoint: "http://model.test".into(),
            model: model.into(),
            output_limit: OutputLimit::MaxTokens(4096),
            temperature: None,
        }
    }

    fn state(replies: &[&str], ollama_up: bool) -> AppState {
        let mut router = ModelRouter::new("io.net");
        router.register(
            route("io.net", ProviderKind::OpenAiCompatible, "deepseek-r1-distill-llama-70b"),
            Arc::new(ScriptedProvider {
                replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
                healthy: true,
            }),
        );
        router.register(
            route("ollama", ProviderKind::Ollama, "llama3.2"),
            Arc::new(ScriptedProvider {
                replies: Mutex::default(),
                healthy: ollama_up,
            }),
        );

        // Offline: no MOBULA_API_KEY means the mock market source.
        let sources = DataSources::from_config(&DataConfig::default()).unwrap();
        let mut registry = CapabilityRegistry::new();
        register_all(&mut registry, &sources);

        AppState::new(QueryPipeline::new(
            Arc::new(router),
            Arc::new(registry),
            Arc::new(Bindings::standard(&sources.portfolio_addresses)),
            PipelineConfig::default(),
        ))
    }

    async fn post_analyze(state: AppState, body: Body) -> (StatusCode, Value) {
        let response = app(state)
            .oneshot(
                Request::post("/analyze")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_analyze_price_question() {
        let program = r#"```json
{"calls": [{"id": "btc", "capability": "price", "args": ["BTC"]}], "return": {"bitcoinPrice": {"$ref": "btc"}}}
```"#;
        let state = state(&[program, "<think>easy</think>Bitcoin trades at $97,500."], true);
        let body = json!({
            "query": "What is the current price of Bitcoin?",
            "systemPrompt": "You are a crypto market analyst."
        });

        let (status, json) = post_analyze(state, Body::from(body.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], json!(true));
        assert_eq!(json["data"]["rawData"], json!({"bitcoinPrice": "$97500.00"}));
        assert_eq!(json["data"]["analysis"], json!("Bitcoin trades at $97,500."));
        assert_eq!(json["data"]["debugInfo"]["model"], json!("io.net"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_missing_query() {
        let body = json!({"systemPrompt": "You are a crypto market analyst."});
        let (status, json) = post_analyze(state(&[], true), Body::from(body.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], json!(false));
        assert_eq!(json["error"]["details"], json!("validation"));
        assert!(json["error"]["message"].as_str().unwrap().contains("Query is required"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_malformed_body() {
        let (status, json) = post_analyze(state(&[], true), Body::from("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["details"], json!("validation"));
    }

    #[tokio::test]
    async fn test_analyze_unknown_model() {
        let body = json!({
            "query": "price of eth",
            "systemPrompt": "analyst",
            "model": "gpt-9"
        });
        let (status, json) = post_analyze(state(&[], true), Body::from(body.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]["message"].as_str().unwrap().contains("gpt-9"));
    }

    #[tokio::test]
    async fn test_analyze_compile_failure_is_server_error() {
        let state = state(&["<think>no idea</think>"], true);
        let body = json!({"query": "price of eth", "systemPrompt": "analyst"});
        let (status, json) = post_analyze(state, Body::from(body.to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["details"], json!("compile"));
    }

    #[tokio::test]
    async fn test_health_reports_routes() {
        let response = app(state(&[], false))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["status"], json!("healthy"));
        assert_eq!(json["defaultModel"], json!("io.net"));
        assert_eq!(json["capabilities"], json!(49));
        assert_eq!(
            json["models"],
            json!([
                {"id": "io.net", "kind": "open_ai_compatible", "model": "deepseek-r1-distill-llama-70b", "healthy": true},
                {"id": "ollama", "kind": "ollama", "model": "llama3.2", "healthy": false}
            ])
        );
    }
}
