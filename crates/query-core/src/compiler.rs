//! Intent Compiler
//!
//! Turns a natural-language question into a call-plan program by prompting a
//! model with the capability catalog, the portfolio wallets and the plan
//! format.

use std::sync::Arc;

use crate::capability::CapabilityRegistry;
use crate::error::{QueryError, Result};
use crate::message::Message;
use crate::provider::ModelRouter;
use crate::sandbox::Bindings;

const COMPILER_PREAMBLE: &str = "You are a crypto data fetcher. Your ONLY job is to produce a program that fetches the raw data needed to answer the user's question. Do not analyze, summarize or calculate anything.";

const PLAN_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{
  "calls": [
    {"id": "btc", "capability": "price", "args": ["bitcoin"]},
    {"id": "btcWeek", "capability": "priceHistory", "args": ["bitcoin", "7d"]},
    {"id": "wallet", "capability": "walletPortfolio", "args": [{"$const": "portfolioAddresses"}]}
  ],
  "return": {"price": {"$ref": "btc"}, "history7d": {"$ref": "btcWeek"}, "holdings": {"$ref": "wallet"}}
}

Rules:
- "capability" must be one of the functions listed above; arguments are positional.
- {"$ref": "id"} uses the result of an earlier call; append ".field" or ".0" to read inside it.
- {"$const": "portfolioAddresses"} is the list of wallet addresses; {"$const": "periods"} maps 1d, 7d, 30d and 1y to milliseconds.
- Calls run in order. A call may only reference calls listed before it.
- "return" is the data object handed to the analyst. Put every fetched value the question needs into it."#;

const INSTRUCTIONS: &str = r"Instructions:
1. Only fetch raw data. Do not perform calculations or analysis.
2. Return the fetched data as a structured object.
3. For historical data, use the periods 1d, 7d, 30d or 1y.
4. For performance questions, fetch 1d, 7d and 30d history together with current price changes and market data.
5. If the user describes a trading strategy, fetch the data that strategy depends on.
6. Prefer a few precise calls over many speculative ones.";

/// Compiler configuration
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    /// Opening line of the compiler prompt
    pub preamble: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            preamble: COMPILER_PREAMBLE.into(),
        }
    }
}

pub struct IntentCompiler {
    router: Arc<ModelRouter>,
    system_prompt: String,
}

impl IntentCompiler {
    /// The prompt is assembled once; the registry is frozen by now.
    pub fn new(
        router: Arc<ModelRouter>,
        registry: &CapabilityRegistry,
        bindings: &Bindings,
        config: &CompilerConfig,
    ) -> Self {
        Self {
            router,
            system_prompt: build_system_prompt(registry, bindings, config),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Ask the model for a program. Returns the raw completion text.
    pub async fn compile(&self, user_input: &str, model: &str) -> Result<String> {
        let messages = [
            Message::system(self.system_prompt.as_str()),
            Message::user(user_input),
        ];

        let completion = self
            .router
            .complete(model, &messages)
            .await
            .map_err(|e| match e {
                QueryError::Validation(_) => e,
                other => QueryError::Compile(format!("Failed to generate data fetching code: {other}")),
            })?;

        if completion.content.trim().is_empty() {
            return Err(QueryError::Compile("model returned no program".into()));
        }

        tracing::debug!(
            model,
            chars = completion.content.len(),
            "Program generated"
        );
        Ok(completion.content)
    }
}

fn build_system_prompt(registry: &CapabilityRegistry, bindings: &Bindings, config: &CompilerConfig) -> String {
    let addresses = bindings.portfolio_addresses();
    let wallets = if addresses.is_empty() {
        "none configured".to_string()
    } else {
        addresses.join(", ")
    };

    format!(
        "{preamble}\n\nUser's wallet addresses: {wallets}\n\n{catalog}\n{INSTRUCTIONS}\n\n{PLAN_FORMAT}",
        preamble = config.preamble,
        catalog = registry.generate_prompt_section(),
    )
}
