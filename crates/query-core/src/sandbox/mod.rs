//! Sandboxed Program Execution
//!
//! Runs a model-generated call plan against the capability registry. The
//! plan can only invoke registered capabilities and read [`Bindings`]; it
//! has no other reach. Every fault (parse error, rejected plan, capability
//! failure, timeout, even a panic inside a capability) comes back as
//! [`ExecutionResult::Failure`].

mod bindings;
mod program;

pub use bindings::{period_millis, Bindings, PERIODS, PERIODS_BINDING, PORTFOLIO_BINDING};
pub use program::{clean_program, CallPlan, PlannedCall, Reference};

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

use crate::capability::CapabilityRegistry;
use crate::error::{QueryError, Result};

/// Execution budget
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Maximum capability calls per program
    pub max_calls: usize,

    /// Wall-clock limit for the whole program
    pub timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_calls: 32,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of one program run, serialized as `{ok: true, value}` or
/// `{ok: false, errorMessage, timestamp}`
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionResult {
    Success {
        value: Value,
    },
    Failure {
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Success { value } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("value", value)?;
                map.end()
            }
            Self::Failure {
                error_message,
                timestamp,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("errorMessage", error_message)?;
                map.serialize_entry("timestamp", timestamp)?;
                map.end()
            }
        }
    }
}

impl ExecutionResult {
    fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            error_message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Data handed to synthesis: the value itself, or an error marker
    pub fn into_raw_data(self) -> Value {
        match self {
            Self::Success { value } => value,
            Self::Failure {
                error_message,
                timestamp,
            } => json!({
                "error": true,
                "message": error_message,
                "timestamp": timestamp.to_rfc3339(),
                "partialData": {},
            }),
        }
    }
}

/// Call-plan interpreter
pub struct SandboxExecutor {
    registry: Arc<CapabilityRegistry>,
    bindings: Arc<Bindings>,
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub const fn new(
        registry: Arc<CapabilityRegistry>,
        bindings: Arc<Bindings>,
        config: SandboxConfig,
    ) -> Self {
        Self {
            registry,
            bindings,
            config,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run a program. Never fails and never panics.
    pub async fn execute(&self, program: &str) -> ExecutionResult {
        let run = AssertUnwindSafe(self.run(program)).catch_unwind();

        let result = match tokio::time::timeout(self.config.timeout, run).await {
            Ok(Ok(Ok(value))) => ExecutionResult::Success { value },
            Ok(Ok(Err(err))) => ExecutionResult::failure(err.to_string()),
            Ok(Err(_)) => ExecutionResult::failure("Program aborted: a capability panicked"),
            Err(_) => ExecutionResult::failure(
                QueryError::BudgetExceeded(format!(
                    "program exceeded {}s time limit",
                    self.config.timeout.as_secs()
                ))
                .to_string(),
            ),
        };

        if let ExecutionResult::Failure { error_message, .. } = &result {
            tracing::warn!(error = %error_message, "Program execution failed");
        }
        result
    }

    async fn run(&self, program: &str) -> Result<Value> {
        let plan = CallPlan::parse(program)?;
        plan.validate(
            |name| self.registry.contains(name),
            |name| self.bindings.contains(name),
            self.config.max_calls,
        )?;

        let mut results: HashMap<&str, Value> = HashMap::with_capacity(plan.calls.len());

        for (idx, call) in plan.calls.iter().enumerate() {
            let id = plan.id(idx);
            let args = call
                .positional_args()
                .iter()
                .map(|arg| self.resolve(arg, &results))
                .collect::<Vec<_>>();

            tracing::debug!(call = id, capability = %call.capability, "Running planned call");
            let value = self.registry.invoke(&call.capability, &args).await?;
            results.insert(id, value);
        }

        let output = plan
            .output
            .as_ref()
            .ok_or_else(|| QueryError::Execution("No data returned".into()))?;
        match self.resolve(output, &results) {
            Value::Null => Err(QueryError::Execution("No data returned".into())),
            value => Ok(value),
        }
    }

    /// Substitute references; paths that miss resolve to `null`
    fn resolve(&self, value: &Value, results: &HashMap<&str, Value>) -> Value {
        match Reference::parse(value) {
            Some(Reference::Call { id, path }) => results
                .get(id)
                .map_or(Value::Null, |root| lookup(root, &path)),
            Some(Reference::Const(name)) => self.bindings.get(name).cloned().unwrap_or(Value::Null),
            None => match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|v| self.resolve(v, results)).collect())
                }
                Value::Object(map) => Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), self.resolve(v, results)))
                        .collect(),
                ),
                other => other.clone(),
            },
        }
    }
}

fn lookup(root: &Value, path: &[&str]) -> Value {
    let mut current = root;
    for segment in path {
        let next = match current {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}
