//! # query-core
//!
//! Query-resolution pipeline with provider-agnostic LLM routing and a closed
//! capability registry.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          QueryPipeline                            │
//! │  ┌────────────┐   ┌───────────────┐   ┌────────────────────────┐ │
//! │  │  Intent    │──▶│   Sandbox     │──▶│   Insight Synthesizer  │ │
//! │  │  Compiler  │   │   Executor    │   │                        │ │
//! │  └─────┬──────┘   └───────┬───────┘   └───────────┬────────────┘ │
//! │        │                  │                       │              │
//! │  ┌─────▼──────┐   ┌───────▼───────┐               │              │
//! │  │ ModelRouter│   │  Capability   │◀── sanitize ──┘              │
//! │  │ (Strategy) │   │  Registry     │                              │
//! │  └────────────┘   └───────────────┘                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between OpenAI-compatible
//! endpoints, Ollama, or any other backend without changing pipeline logic.
//! Generated programs are JSON call plans that can only reach registered
//! capabilities.

pub mod capability;
pub mod client;
pub mod compiler;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod provider;
pub mod sandbox;
pub mod sanitize;
pub mod synthesizer;

pub use capability::{ArgReader, Capability, CapabilityRegistry, CapabilitySchema, ParameterSchema};
pub use client::{paginate, retry_with_backoff, RetryPolicy, Throttle};
pub use compiler::{CompilerConfig, IntentCompiler};
pub use error::{QueryError, Result};
pub use message::{Message, Role};
pub use pipeline::{AnalysisRequest, AnalysisResult, PipelineConfig, QueryPipeline, FALLBACK_ANALYSIS};
pub use provider::{LlmProvider, ModelRoute, ModelRouter, OutputLimit, ProviderKind};
pub use sandbox::{Bindings, ExecutionResult, SandboxConfig, SandboxExecutor};
pub use sanitize::{sanitize, sanitize_value};
pub use synthesizer::InsightSynthesizer;
