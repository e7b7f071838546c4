//! Query Pipeline
//!
//! Drives one request through validate → compile → execute → synthesize.
//!
//! Only validation and compilation failures abort a request. A failed program
//! run becomes an error marker in `rawData`, and a failed synthesis becomes a
//! fixed fallback analysis, so the caller still receives a successful result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::capability::CapabilityRegistry;
use crate::compiler::{CompilerConfig, IntentCompiler};
use crate::error::{QueryError, Result};
use crate::provider::ModelRouter;
use crate::sandbox::{Bindings, SandboxConfig, SandboxExecutor};
use crate::sanitize::{sanitize, sanitize_value};
use crate::synthesizer::InsightSynthesizer;

/// Analysis used when synthesis fails or yields nothing
pub const FALLBACK_ANALYSIS: &str = "Analysis could not be generated at this time.";

/// Incoming request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Natural-language question
    #[serde(default)]
    pub query: String,

    /// Persona/instructions for the synthesis model
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Model route id; the router default when absent
    #[serde(default)]
    pub model: Option<String>,
}

impl AnalysisRequest {
    pub fn new(query: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            system_prompt: Some(system_prompt.into()),
            model: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Pipeline stage, for logs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Compile,
    Execute,
    Synthesize,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::Compile => "compile",
            Self::Execute => "execute",
            Self::Synthesize => "synthesize",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub generated_code: String,
    pub system_prompt: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    pub raw_data: Value,
    pub analysis: String,
    pub debug_info: DebugInfo,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisFailure {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Final result, serialized as `{success, data}` or `{success, error}`
#[derive(Clone, Debug)]
pub enum AnalysisResult {
    Success(AnalysisData),
    Failure(AnalysisFailure),
}

impl AnalysisResult {
    pub fn failure(err: &QueryError) -> Self {
        Self::Failure(AnalysisFailure {
            message: err.user_message(),
            timestamp: Utc::now(),
            details: Some(err.kind().to_string()),
        })
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The request itself was malformed
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Self::Failure(f) if f.details.as_deref() == Some("validation"))
    }
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Self::Success(data) => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
            }
            Self::Failure(error) => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub sandbox: SandboxConfig,
    pub compiler: CompilerConfig,
}

/// The orchestrator. Shared by all requests; holds no per-request state.
pub struct QueryPipeline {
    router: Arc<ModelRouter>,
    compiler: IntentCompiler,
    executor: SandboxExecutor,
    synthesizer: InsightSynthesizer,
}

impl QueryPipeline {
    pub fn new(
        router: Arc<ModelRouter>,
        registry: Arc<CapabilityRegistry>,
        bindings: Arc<Bindings>,
        config: PipelineConfig,
    ) -> Self {
        let compiler = IntentCompiler::new(router.clone(), &registry, &bindings, &config.compiler);
        Self {
            compiler,
            executor: SandboxExecutor::new(registry, bindings, config.sandbox),
            synthesizer: InsightSynthesizer::new(router.clone()),
            router,
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub const fn executor(&self) -> &SandboxExecutor {
        &self.executor
    }

    /// Resolve one request. Never fails; faults are reported in the result.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let request_id = Uuid::new_v4();
        self.run(request)
            .instrument(tracing::info_span!("analyze", %request_id))
            .await
    }

    async fn run(&self, request: &AnalysisRequest) -> AnalysisResult {
        let (query, system_prompt, model) = match self.validate(request) {
            Ok(parts) => parts,
            Err(err) => {
                tracing::warn!(stage = %Stage::Validate, error = %err, "Request rejected");
                return AnalysisResult::failure(&err);
            }
        };

        tracing::info!(stage = %Stage::Compile, model = %model, "Generating data fetching program");
        let program = match self.compiler.compile(query, &model).await {
            Ok(raw) => sanitize(&raw),
            Err(err) => {
                tracing::error!(stage = %Stage::Compile, error = %err, "Program generation failed");
                return AnalysisResult::failure(&err);
            }
        };
        if program.is_empty() {
            let err = QueryError::Compile("Generated program was empty after sanitization".into());
            tracing::error!(stage = %Stage::Compile, error = %err, "Program generation failed");
            return AnalysisResult::failure(&err);
        }

        tracing::info!(stage = %Stage::Execute, "Executing program");
        let execution = self.executor.execute(&program).await;
        let executed = execution.is_success();
        let raw_data = sanitize_value(&execution.into_raw_data());

        tracing::info!(stage = %Stage::Synthesize, executed, "Generating analysis");
        let analysis = match self
            .synthesizer
            .synthesize(query, &raw_data, system_prompt, &model)
            .await
        {
            Ok(text) => {
                let clean = sanitize(&text);
                if clean.is_empty() {
                    tracing::warn!(stage = %Stage::Synthesize, "Analysis empty after sanitization");
                    FALLBACK_ANALYSIS.to_string()
                } else {
                    clean
                }
            }
            Err(err) => {
                tracing::warn!(stage = %Stage::Synthesize, error = %err, "Analysis failed; using fallback");
                FALLBACK_ANALYSIS.to_string()
            }
        };

        tracing::info!(stage = %Stage::Done, "Request resolved");
        AnalysisResult::Success(AnalysisData {
            raw_data,
            analysis,
            debug_info: DebugInfo {
                generated_code: program,
                system_prompt: sanitize(system_prompt),
                model,
                timestamp: Utc::now(),
            },
        })
    }

    fn validate<'a>(&self, request: &'a AnalysisRequest) -> Result<(&'a str, &'a str, String)> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(QueryError::Validation("Query is required".into()));
        }

        let system_prompt = request
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| QueryError::Validation("System prompt is required".into()))?;

        let route = self.router.resolve(request.model.as_deref())?;
        Ok((query, system_prompt, route.route.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ArgReader, Capability, CapabilitySchema, ParameterSchema};
    use crate::message::Message;
    use crate::provider::{Completion, GenerationOptions, LlmProvider, ModelRoute, OutputLimit, ProviderKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies in order and records every prompt
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::default(),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(QueryError::Provider("script exhausted".into())))?;
            Ok(Completion {
                content: reply,
                model: options.model.clone(),
                usage: None,
                finish_reason: None,
            })
        }
    }

    /// Price lookup that can simulate an outage
    struct Price {
        outage: bool,
    }

    #[async_trait]
    impl Capability for Price {
        fn schema(&self) -> CapabilitySchema {
            CapabilitySchema {
                name: "price".into(),
                description: "Current USD price".into(),
                parameters: vec![ParameterSchema::required("token", "string", "Token name or symbol")],
                category: Some("Market Data".into()),
            }
        }

        async fn invoke(&self, args: &[Value]) -> Result<Value> {
            let token = ArgReader::new("price", args).string(0)?;
            if self.outage {
                return Err(QueryError::ExternalApi(format!("market API unreachable for {token}")));
            }
            Ok(json!({"token": token, "price": "$97500.00"}))
        }
    }

    const PRICE_PROGRAM: &str = "<think>Need the price.</think>\n```json\n{\"calls\": [{\"id\": \"btc\", \"capability\": \"price\", \"args\": [\"bitcoin\"]}], \"return\": {\"price\": {\"$ref\": \"btc.price\"}}}\n```";

    fn pipeline(provider: Arc<ScriptedProvider>, outage: bool) -> QueryPipeline {
        let mut router = ModelRouter::new("io.net");
        router.register(
            ModelRoute {
                id: "io.net".into(),
                kind: ProviderKind::OpenAiCompatible,
                endpoint: "http://groq.test".into(),
                model: "deepseek-r1-distill-llama-70b".into(),
                output_limit: OutputLimit::MaxTokens(4096),
                temperature: None,
            },
            provider,
        );
        let mut registry = CapabilityRegistry::new();
        registry.register(Price { outage });

        QueryPipeline::new(
            Arc::new(router),
            Arc::new(registry),
            Arc::new(Bindings::standard(&["0x0".into()])),
            PipelineConfig::default(),
        )
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("What is the current price of Bitcoin?", "You are a crypto assistant.")
    }

    #[tokio::test]
    async fn test_price_question_end_to_end() {
        let provider = ScriptedProvider::new(vec![
            Ok(PRICE_PROGRAM.into()),
            Ok("<think>The data says 97500.</think>\nBitcoin is trading at $97,500.".into()),
        ]);
        let result = pipeline(provider.clone(), false).analyze(&request()).await;

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], json!(true));
        assert_eq!(json["data"]["rawData"], json!({"price": "$97500.00"}));
        assert_eq!(json["data"]["analysis"], json!("Bitcoin is trading at $97,500."));
        assert_eq!(json["data"]["debugInfo"]["model"], json!("io.net"));
        assert_eq!(json["data"]["debugInfo"]["systemPrompt"], json!("You are a crypto assistant."));
        let code = json["data"]["debugInfo"]["generatedCode"].as_str().unwrap();
        assert!(code.contains("\"capability\": \"price\""));
        assert!(!code.contains("think"));

        // The synthesis prompt carries the fetched data.
        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0][0].content.contains("price(token)"));
        assert_eq!(prompts[1][0].content, "You are a crypto assistant.");
        assert!(prompts[1][1].content.contains("$97500.00"));
    }

    #[tokio::test]
    async fn test_outage_degrades_to_error_marker() {
        let provider = ScriptedProvider::new(vec![
            Ok(PRICE_PROGRAM.into()),
            Ok("Price data is currently unavailable.".into()),
        ]);
        let result = pipeline(provider, true).analyze(&request()).await;

        let AnalysisResult::Success(data) = result else {
            panic!("outage must not fail the request");
        };
        assert_eq!(data.raw_data["error"], json!(true));
        assert!(data.raw_data["message"].as_str().unwrap().contains("market API unreachable"));
        assert_eq!(data.raw_data["partialData"], json!({}));
        assert_eq!(data.analysis, "Price data is currently unavailable.");
    }

    #[tokio::test]
    async fn test_synthesis_failure_uses_fallback() {
        let provider = ScriptedProvider::new(vec![
            Ok(PRICE_PROGRAM.into()),
            Err(QueryError::ProviderUnavailable("timeout".into())),
        ]);
        let AnalysisResult::Success(data) = pipeline(provider, false).analyze(&request()).await else {
            panic!("synthesis failure must degrade");
        };
        assert_eq!(data.analysis, FALLBACK_ANALYSIS);
        assert_eq!(data.raw_data["price"], json!("$97500.00"));
    }

    #[tokio::test]
    async fn test_reasoning_only_analysis_uses_fallback() {
        let provider = ScriptedProvider::new(vec![
            Ok(PRICE_PROGRAM.into()),
            Ok("<think>I am not sure what to say</think>".into()),
        ]);
        let AnalysisResult::Success(data) = pipeline(provider, false).analyze(&request()).await else {
            panic!("expected success");
        };
        assert_eq!(data.analysis, FALLBACK_ANALYSIS);
    }

    #[tokio::test]
    async fn test_missing_inputs_fail_before_any_model_call() {
        let provider = ScriptedProvider::new(vec![]);
        let pipeline = pipeline(provider.clone(), false);

        let no_prompt = AnalysisRequest {
            query: "price?".into(),
            ..AnalysisRequest::default()
        };
        let result = pipeline.analyze(&no_prompt).await;
        assert!(result.is_validation_failure());

        let no_query = AnalysisRequest::new("   ", "sys");
        assert!(pipeline.analyze(&no_query).await.is_validation_failure());

        let bad_model = request().with_model("gpt-9");
        let json = serde_json::to_value(pipeline.analyze(&bad_model).await).unwrap();
        assert_eq!(json["success"], json!(false));
        assert_eq!(json["error"]["details"], json!("validation"));
        assert!(json["error"]["message"].as_str().unwrap().contains("gpt-9"));
        assert!(json["error"]["timestamp"].is_string());

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_program_is_fatal() {
        let provider = ScriptedProvider::new(vec![Ok("<think>no idea how to fetch this</think>".into())]);
        let result = pipeline(provider.clone(), false).analyze(&request()).await;

        let AnalysisResult::Failure(failure) = result else {
            panic!("expected compile failure");
        };
        assert_eq!(failure.details.as_deref(), Some("compile"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_compile_provider_error_is_fatal() {
        let provider = ScriptedProvider::new(vec![Err(QueryError::Provider("401 Unauthorized".into()))]);
        let result = pipeline(provider, false).analyze(&request()).await;
        assert!(!result.is_success());
        assert!(!result.is_validation_failure());
    }

    #[tokio::test]
    async fn test_invalid_program_still_succeeds() {
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"calls": [{"capability": "deleteEverything"}], "return": {}}"#.into()),
            Ok("No data could be fetched.".into()),
        ]);
        let AnalysisResult::Success(data) = pipeline(provider, false).analyze(&request()).await else {
            panic!("expected degraded success");
        };
        assert_eq!(data.raw_data["error"], json!(true));
        assert!(data.raw_data["message"].as_str().unwrap().contains("deleteEverything"));
    }
}
