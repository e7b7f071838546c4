//! Capability Registry
//!
//! The closed set of read-only data-access operations a generated program may
//! call. Capabilities are registered once at start-up; the registry is then
//! frozen behind an `Arc` and only ever read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{QueryError, Result};

/// Parameter definition for capability schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default,
        }
    }
}

/// Capability definition schema (rendered into the compiler prompt)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapabilitySchema {
    /// Unique capability identifier
    pub name: String,

    /// Human-readable description of what is returned
    pub description: String,

    /// Positional parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping in the prompt
    #[serde(default)]
    pub category: Option<String>,
}

/// A named, read-only data-access operation
#[async_trait]
pub trait Capability: Send + Sync {
    /// Get the capability's schema
    fn schema(&self) -> CapabilitySchema;

    /// Invoke with positional arguments
    async fn invoke(&self, args: &[Value]) -> Result<Value>;

    /// Validate arguments before invocation
    fn validate(&self, args: &[Value]) -> Result<()> {
        let schema = self.schema();

        if args.len() > schema.parameters.len() {
            return Err(QueryError::InvalidArguments {
                capability: schema.name,
                message: format!(
                    "expected at most {} arguments, got {}",
                    schema.parameters.len(),
                    args.len()
                ),
            });
        }

        for (idx, param) in schema.parameters.iter().enumerate() {
            let missing = args.get(idx).is_none_or(Value::is_null);
            if param.required && missing {
                return Err(QueryError::InvalidArguments {
                    capability: schema.name.clone(),
                    message: format!("missing required parameter: {}", param.name),
                });
            }
        }

        Ok(())
    }
}

/// Positional argument accessor used by capability implementations
pub struct ArgReader<'a> {
    capability: &'a str,
    args: &'a [Value],
}

impl<'a> ArgReader<'a> {
    pub const fn new(capability: &'a str, args: &'a [Value]) -> Self {
        Self { capability, args }
    }

    fn invalid(&self, message: String) -> QueryError {
        QueryError::InvalidArguments {
            capability: self.capability.to_string(),
            message,
        }
    }

    fn present(&self, idx: usize) -> Option<&'a Value> {
        self.args.get(idx).filter(|v| !v.is_null())
    }

    /// Required string argument (numbers are accepted and stringified)
    pub fn string(&self, idx: usize) -> Result<String> {
        self.opt_string(idx)?
            .ok_or_else(|| self.invalid(format!("argument {idx} is required")))
    }

    pub fn opt_string(&self, idx: usize) -> Result<Option<String>> {
        match self.present(idx) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.invalid(format!("argument {idx} must be a string, got {other}"))),
        }
    }

    /// Optional non-negative integer (numeric strings are accepted)
    pub fn opt_u64(&self, idx: usize) -> Result<Option<u64>> {
        match self.present(idx) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(format!("argument {idx} must be a non-negative integer"))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(format!("argument {idx} must be a non-negative integer"))),
            Some(other) => Err(self.invalid(format!("argument {idx} must be a number, got {other}"))),
        }
    }

    pub fn u64_or(&self, idx: usize, default: u64) -> Result<u64> {
        Ok(self.opt_u64(idx)?.unwrap_or(default))
    }

    /// Optional filter object; absent means empty
    pub fn object(&self, idx: usize) -> Result<serde_json::Map<String, Value>> {
        match self.present(idx) {
            None => Ok(serde_json::Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(self.invalid(format!("argument {idx} must be an object, got {other}"))),
        }
    }
}

/// Registry for available capabilities
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    /// Register a new capability
    pub fn register<C: Capability + 'static>(&mut self, capability: C) {
        self.register_arc(Arc::new(capability));
    }

    /// Register a shared capability
    pub fn register_arc(&mut self, capability: Arc<dyn Capability>) {
        let schema = capability.schema();
        if self.capabilities.insert(schema.name.clone(), capability).is_some() {
            tracing::warn!(capability = %schema.name, "Capability registered twice; keeping the latest");
        }
    }

    /// Get a capability by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Validate and invoke a capability
    pub async fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        let capability = self
            .get(name)
            .ok_or_else(|| QueryError::CapabilityNotFound(name.to_string()))?;

        capability.validate(args)?;

        tracing::debug!(capability = name, args = args.len(), "Invoking capability");
        capability.invoke(args).await
    }

    /// All capability schemas, ordered by name
    pub fn schemas(&self) -> Vec<CapabilitySchema> {
        self.capabilities.values().map(|c| c.schema()).collect()
    }

    /// Number of registered capabilities
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Generate the prompt section documenting every capability, grouped by category
    pub fn generate_prompt_section(&self) -> String {
        let mut grouped: BTreeMap<String, Vec<CapabilitySchema>> = BTreeMap::new();
        for schema in self.schemas() {
            let category = schema.category.clone().unwrap_or_else(|| "General".into());
            grouped.entry(category).or_default().push(schema);
        }

        let mut prompt = String::from("Available functions:\n");
        for (category, schemas) in grouped {
            prompt.push_str(&format!("- {category}:\n"));
            for schema in schemas {
                let params: Vec<String> = schema
                    .parameters
                    .iter()
                    .map(|p| {
                        if p.required {
                            p.name.clone()
                        } else {
                            format!("{}?", p.name)
                        }
                    })
                    .collect();
                prompt.push_str(&format!(
                    "  - {}({}) - {}\n",
                    schema.name,
                    params.join(", "),
                    schema.description
                ));
                for param in &schema.parameters {
                    let default = param
                        .default
                        .as_ref()
                        .map(|d| format!(", default: {d}"))
                        .unwrap_or_default();
                    prompt.push_str(&format!(
                        "    * {} ({}{}): {}\n",
                        param.name, param.param_type, default, param.description
                    ));
                }
            }
        }

        prompt
    }
}
