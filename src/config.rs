use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::Level;

/// Completion service settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
}

/// Serper search settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: String,
    pub num_results: usize,
    pub gl: String,
    pub hl: String,
}

/// Loop parameters.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub max_iterations: u32,
    pub service_timeout: Duration,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            service_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything the process needs, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
    pub log_level: Level,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let openai_key = get("OPENAI_API_KEY");
        let serper_key = get("SERPER_API_KEY");
        let (api_key, serper_key) = match (openai_key, serper_key) {
            (Some(o), Some(s)) => (o, s),
            (o, s) => {
                let missing: Vec<&str> = [
                    o.is_none().then_some("OPENAI_API_KEY"),
                    s.is_none().then_some("SERPER_API_KEY"),
                ]
                .into_iter()
                .flatten()
                .collect();
                bail!("API keys not set ({}); check your .env file", missing.join(", "));
            }
        };

        let llm = LlmConfig {
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: get("LLM_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            api_key,
            temperature: parse_or("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), 0.0)?,
        };

        let search = SearchConfig {
            api_key: serper_key,
            num_results: parse_or("SERPER_RESULTS", get("SERPER_RESULTS"), 10)?,
            gl: get("SERPER_GL").unwrap_or_else(|| "us".to_string()),
            hl: get("SERPER_HL").unwrap_or_else(|| "en".to_string()),
        };

        let defaults = ResearchConfig::default();
        let max_iterations: u32 = parse_or(
            "RESEARCH_MAX_ITERATIONS",
            get("RESEARCH_MAX_ITERATIONS"),
            defaults.max_iterations,
        )?;
        if max_iterations == 0 {
            bail!("RESEARCH_MAX_ITERATIONS must be at least 1");
        }
        let timeout_secs: u64 = parse_or(
            "SERVICE_TIMEOUT_SECS",
            get("SERVICE_TIMEOUT_SECS"),
            defaults.service_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            bail!("SERVICE_TIMEOUT_SECS must be at least 1");
        }

        let log_level = match get("LOG_LEVEL") {
            Some(level) => Level::from_str(&level)
                .map_err(|_| anyhow!("LOG_LEVEL: unknown level '{}'", level))?,
            None => Level::INFO,
        };

        Ok(Self {
            llm,
            search,
            research: ResearchConfig {
                max_iterations,
                service_timeout: Duration::from_secs(timeout_secs),
            },
            log_level,
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{}: invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
