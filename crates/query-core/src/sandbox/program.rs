//! Call-plan programs
//!
//! The compiler model emits a JSON call plan instead of free-form code:
//!
//! ```json
//! {
//!   "calls": [{"id": "btc", "capability": "price", "args": ["bitcoin"]}],
//!   "return": {"currentPrice": {"$ref": "btc"}}
//! }
//! ```
//!
//! `{"$ref": "id.path"}` reads an earlier call's result, `{"$const": "name"}`
//! reads a read-only binding. Nothing else in the plan is interpreted.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{QueryError, Result};

pub const REF_KEY: &str = "$ref";
pub const CONST_KEY: &str = "$const";

/// One capability invocation
#[derive(Clone, Debug, Deserialize)]
pub struct PlannedCall {
    /// Result name; generated from the position when omitted
    #[serde(default)]
    pub id: Option<String>,

    /// Registered capability name
    pub capability: String,

    /// Positional arguments; a non-array value is a single argument
    #[serde(default)]
    pub args: Value,
}

impl PlannedCall {
    pub fn positional_args(&self) -> Vec<Value> {
        match &self.args {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        }
    }
}

/// A parsed program
#[derive(Clone, Debug, Deserialize)]
pub struct CallPlan {
    #[serde(default)]
    pub calls: Vec<PlannedCall>,

    /// Template of the returned object
    #[serde(rename = "return", default)]
    pub output: Option<Value>,
}

/// A reference found inside arguments or the return template
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reference<'a> {
    /// Earlier call result, optionally followed by a dotted path
    Call { id: &'a str, path: Vec<&'a str> },
    /// Read-only constant
    Const(&'a str),
}

impl<'a> Reference<'a> {
    /// Recognize `{"$ref": "..."}` / `{"$const": "..."}` objects
    pub fn parse(value: &'a Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        if map.len() != 1 {
            return None;
        }
        if let Some(Value::String(target)) = map.get(REF_KEY) {
            let mut parts = target.split('.');
            let id = parts.next().unwrap_or_default();
            return Some(Self::Call {
                id,
                path: parts.collect(),
            });
        }
        if let Some(Value::String(name)) = map.get(CONST_KEY) {
            return Some(Self::Const(name));
        }
        None
    }
}

/// Walk every reference in `value`
pub fn visit_references<'a, F>(value: &'a Value, visit: &mut F) -> Result<()>
where
    F: FnMut(Reference<'a>) -> Result<()>,
{
    if let Some(reference) = Reference::parse(value) {
        return visit(reference);
    }
    match value {
        Value::Array(items) => items.iter().try_for_each(|v| visit_references(v, visit)),
        Value::Object(map) => map.values().try_for_each(|v| visit_references(v, visit)),
        _ => Ok(()),
    }
}

/// Strip code fences and surrounding prose, leaving the JSON object text
pub fn clean_program(text: &str) -> Result<String> {
    let without_fences = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let trimmed = without_fences.trim();
    if trimmed.is_empty() {
        return Err(QueryError::Program("Empty program after cleaning".into()));
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(trimmed[start..=end].to_string()),
        _ => Err(QueryError::Program(
            "Program does not contain a JSON call plan".into(),
        )),
    }
}

impl CallPlan {
    /// Clean and parse program text
    pub fn parse(text: &str) -> Result<Self> {
        let cleaned = clean_program(text)?;
        let mut plan: Self = serde_json::from_str(&cleaned)
            .map_err(|e| QueryError::Program(format!("Invalid call plan: {e}")))?;
        plan.assign_ids();
        Ok(plan)
    }

    fn assign_ids(&mut self) {
        for (idx, call) in self.calls.iter_mut().enumerate() {
            if call.id.as_deref().is_none_or(|id| id.trim().is_empty()) {
                call.id = Some(format!("call{idx}"));
            }
        }
    }

    /// Id of the call at `idx` (always set after parsing)
    pub fn id(&self, idx: usize) -> &str {
        self.calls
            .get(idx)
            .and_then(|c| c.id.as_deref())
            .unwrap_or_default()
    }

    /// Check structure against the allowed capabilities and constants.
    ///
    /// Every reference must name a call that runs earlier (or any call, from
    /// the return template) or a known constant.
    pub fn validate<C, K>(&self, is_capability: C, is_constant: K, max_calls: usize) -> Result<()>
    where
        C: Fn(&str) -> bool,
        K: Fn(&str) -> bool,
    {
        if self.calls.len() > max_calls {
            return Err(QueryError::BudgetExceeded(format!(
                "program makes {} calls, limit is {max_calls}",
                self.calls.len()
            )));
        }

        let mut defined: HashSet<&str> = HashSet::new();

        for (idx, call) in self.calls.iter().enumerate() {
            let id = self.id(idx);
            if id.contains('.') {
                return Err(QueryError::Program(format!(
                    "call id '{id}' must not contain '.'"
                )));
            }
            if !is_capability(&call.capability) {
                return Err(QueryError::CapabilityNotFound(call.capability.clone()));
            }
            visit_references(&call.args, &mut |r| check_reference(&defined, &is_constant, r))?;
            if !defined.insert(id) {
                return Err(QueryError::Program(format!("duplicate call id '{id}'")));
            }
        }

        match &self.output {
            None | Some(Value::Null) => Err(QueryError::Execution("No data returned".into())),
            Some(output) => {
                visit_references(output, &mut |r| check_reference(&defined, &is_constant, r))
            }
        }
    }
}

fn check_reference<K>(defined: &HashSet<&str>, is_constant: &K, reference: Reference<'_>) -> Result<()>
where
    K: Fn(&str) -> bool,
{
    match reference {
        Reference::Call { id, .. } if defined.contains(id) => Ok(()),
        Reference::Call { id, .. } => Err(QueryError::Program(format!(
            "reference to unknown or later call '{id}'"
        ))),
        Reference::Const(name) if is_constant(name) => Ok(()),
        Reference::Const(name) => Err(QueryError::Program(format!("unknown constant '{name}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known(name: &str) -> bool {
        matches!(name, "price" | "priceHistory" | "getBlock")
    }

    fn constant(name: &str) -> bool {
        name == "portfolioAddresses"
    }

    #[test]
    fn test_clean_strips_fences_and_prose() {
        let text = "Here is the plan:\n```json\n{\"calls\": [], \"return\": {}}\n```\nHope it helps!";
        assert_eq!(clean_program(text).unwrap(), "{\"calls\": [], \"return\": {}}");
    }

    #[test]
    fn test_clean_rejects_empty() {
        assert!(matches!(clean_program("```\n```"), Err(QueryError::Program(_))));
        assert!(matches!(clean_program("no braces here"), Err(QueryError::Program(_))));
    }

    #[test]
    fn test_parse_assigns_missing_ids() {
        let plan = CallPlan::parse(
            r#"{"calls": [{"capability": "price", "args": "btc"}, {"id": "h", "capability": "priceHistory", "args": ["btc", "7d"]}], "return": {"p": {"$ref": "call0"}}}"#,
        )
        .unwrap();
        assert_eq!(plan.id(0), "call0");
        assert_eq!(plan.id(1), "h");
        assert_eq!(plan.calls[0].positional_args(), vec![json!("btc")]);
        assert!(plan.validate(known, constant, 8).is_ok());
    }

    #[test]
    fn test_reference_parsing() {
        let value = json!({"$ref": "blocks.edges.0.node"});
        assert_eq!(
            Reference::parse(&value),
            Some(Reference::Call { id: "blocks", path: vec!["edges", "0", "node"] })
        );
        let value = json!({"$const": "portfolioAddresses"});
        assert_eq!(Reference::parse(&value), Some(Reference::Const("portfolioAddresses")));
        assert_eq!(Reference::parse(&json!({"$ref": "a", "extra": 1})), None);
    }

    #[test]
    fn test_validate_rejects_unknown_capability() {
        let plan = CallPlan::parse(r#"{"calls": [{"id": "x", "capability": "readFile", "args": ["/etc/passwd"]}], "return": {"x": {"$ref": "x"}}}"#).unwrap();
        let err = plan.validate(known, constant, 8).unwrap_err();
        assert!(matches!(err, QueryError::CapabilityNotFound(name) if name == "readFile"));
    }

    #[test]
    fn test_validate_rejects_forward_and_duplicate_refs() {
        let forward = CallPlan::parse(r#"{"calls": [
            {"id": "a", "capability": "getBlock", "args": [{"$ref": "b.hash"}]},
            {"id": "b", "capability": "getBlock", "args": ["h"]}
        ], "return": {"a": {"$ref": "a"}}}"#).unwrap();
        assert!(matches!(forward.validate(known, constant, 8), Err(QueryError::Program(_))));

        let duplicate = CallPlan::parse(r#"{"calls": [
            {"id": "a", "capability": "price", "args": ["btc"]},
            {"id": "a", "capability": "price", "args": ["eth"]}
        ], "return": {"a": {"$ref": "a"}}}"#).unwrap();
        assert!(matches!(duplicate.validate(known, constant, 8), Err(QueryError::Program(_))));
    }

    #[test]
    fn test_validate_constants_and_budget() {
        let plan = CallPlan::parse(r#"{"calls": [], "return": {"w": {"$const": "portfolioAddresses"}, "x": {"$const": "process"}}}"#).unwrap();
        assert!(matches!(plan.validate(known, constant, 8), Err(QueryError::Program(_))));

        let plan = CallPlan::parse(r#"{"calls": [
            {"capability": "price", "args": ["a"]},
            {"capability": "price", "args": ["b"]},
            {"capability": "price", "args": ["c"]}
        ], "return": {}}"#).unwrap();
        assert!(matches!(plan.validate(known, constant, 2), Err(QueryError::BudgetExceeded(_))));
    }

    #[test]
    fn test_missing_return_is_no_data() {
        let plan = CallPlan::parse(r#"{"calls": [{"capability": "price", "args": ["btc"]}]}"#).unwrap();
        let err = plan.validate(known, constant, 8).unwrap_err();
        assert!(err.to_string().contains("No data returned"));

        let plan = CallPlan::parse(r#"{"calls": [], "return": null}"#).unwrap();
        assert!(plan.validate(known, constant, 8).is_err());
    }
}
