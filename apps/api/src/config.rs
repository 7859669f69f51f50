use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::llm_client::DEFAULT_BASE_URL;
use crate::pipeline::retry::{Backoff, RetryPolicy};
use crate::pipeline::PipelineConfig;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = PipelineConfig::default();

        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "MAX_RETRIES", defaults.retry.max_attempts)?,
            base_delay: Duration::from_millis(parse_or(
                &lookup,
                "RETRY_BASE_DELAY_MS",
                defaults.retry.base_delay.as_millis() as u64,
            )?),
            backoff: match lookup("RETRY_BACKOFF") {
                Some(raw) => Backoff::from_str(&raw)
                    .map_err(|e| anyhow!("RETRY_BACKOFF is invalid: {e}"))?,
                None => defaults.retry.backoff,
            },
        };

        let pipeline = PipelineConfig {
            tokenizer_model: lookup("TOKENIZER_MODEL").unwrap_or(defaults.tokenizer_model),
            batch_max_tokens: parse_or(&lookup, "BATCH_MAX_TOKENS", defaults.batch_max_tokens)?,
            input_max_tokens: parse_or(&lookup, "INPUT_MAX_TOKENS", defaults.input_max_tokens)?,
            max_items_per_batch: parse_or(
                &lookup,
                "MAX_ITEMS_PER_BATCH",
                defaults.max_items_per_batch,
            )?,
            retry,
            inter_batch_delay: Duration::from_millis(parse_or(
                &lookup,
                "INTER_BATCH_DELAY_MS",
                defaults.inter_batch_delay.as_millis() as u64,
            )?),
            description_char_limit: parse_or(
                &lookup,
                "DESCRIPTION_CHAR_LIMIT",
                defaults.description_char_limit,
            )?,
        };
        pipeline.validate()?;

        Ok(Config {
            anthropic_api_key: require_var(&lookup, "ANTHROPIC_API_KEY")?,
            anthropic_base_url: lookup("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            port: parse_or(&lookup, "PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            pipeline,
        })
    }
}

fn require_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
