//! Server configuration

use std::time::Duration;

use query_core::SandboxConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3004";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub sandbox: SandboxConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `BIND_ADDR`, `SANDBOX_MAX_CALLS` and `SANDBOX_TIMEOUT_SECS`.
    /// Unparseable numbers fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("BIND_ADDR").ok(),
            std::env::var("SANDBOX_MAX_CALLS").ok(),
            std::env::var("SANDBOX_TIMEOUT_SECS").ok(),
        )
    }

    fn from_vars(
        bind_addr: Option<String>,
        max_calls: Option<String>,
        timeout_secs: Option<String>,
    ) -> Self {
        let defaults = Self::default();
        let max_calls = max_calls
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.sandbox.max_calls);
        let timeout = timeout_secs
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
            .map_or(defaults.sandbox.timeout, Duration::from_secs);

        Self {
            bind_addr: bind_addr
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.bind_addr),
            sandbox: SandboxConfig { max_calls, timeout },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_vars(None, None, None);
        assert_eq!(config.bind_addr, "0.0.0.0:3004");
        assert_eq!(config.sandbox.max_calls, 32);
        assert_eq!(config.sandbox.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = ServerConfig::from_vars(
            Some("127.0.0.1:8080".into()),
            Some("8".into()),
            Some("soon".into()),
        );
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.sandbox.max_calls, 8);
        assert_eq!(config.sandbox.timeout, Duration::from_secs(60));

        let zero = ServerConfig::from_vars(None, Some("0".into()), Some("5".into()));
        assert_eq!(zero.sandbox.max_calls, 32);
        assert_eq!(zero.sandbox.timeout, Duration::from_secs(5));
    }
}
