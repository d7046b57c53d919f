//! Environment-driven configuration

use crate::llm::DEFAULT_BASE_URL;
use crate::runtime::EngineConfig;
use crate::state_machine::MismatchPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Checkpoints and transcripts older than this are purged at startup
pub const RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub engine: EngineConfig,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub tavily_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unparseable values fall back to
    /// their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = var("HEALTHBOT_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".healthbot").join("healthbot.db")
            },
            PathBuf::from,
        );

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            max_steps: parse_nonzero_or(
                "HEALTHBOT_MAX_STEPS",
                var("HEALTHBOT_MAX_STEPS"),
                defaults.max_steps,
            ),
            mismatch_policy: parse_or(
                "HEALTHBOT_MISMATCH_POLICY",
                var("HEALTHBOT_MISMATCH_POLICY"),
                defaults.mismatch_policy,
            ),
            call_timeout: Duration::from_secs(parse_nonzero_or(
                "HEALTHBOT_CALL_TIMEOUT_SECS",
                var("HEALTHBOT_CALL_TIMEOUT_SECS"),
                defaults.call_timeout.as_secs(),
            )),
        };

        Self {
            db_path,
            port: parse_nonzero_or("HEALTHBOT_PORT", var("HEALTHBOT_PORT"), DEFAULT_PORT),
            engine,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            tavily_api_key: var("TAVILY_API_KEY"),
        }
    }
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> T {
    parse_valid_or(name, value, default, |_| true)
}

/// Numeric settings where zero would disable the service
fn parse_nonzero_or<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Default + PartialEq,
{
    parse_valid_or(name, value, default, |v| *v != T::default())
}

fn parse_valid_or<T: FromStr>(
    name: &str,
    value: Option<String>,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T {
    let Some(raw) = value else {
        return default;
    };
    match raw.parse() {
        Ok(v) if valid(&v) => v,
        _ => {
            tracing::warn!(variable = name, value = %raw, "Ignoring invalid configuration value");
            default
        }
    }
}
