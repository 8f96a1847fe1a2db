//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use pix_gateway::{
    AuthScheme, GatewayMode, GatewaySettings, UpstreamConfig,
    upstream::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT},
};
use pix_hex::inbound::DEFAULT_REQUESTS_PER_MINUTE;
use pix_types::{DEFAULT_VALIDITY_SECS, ValidationMode};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub gateway: GatewaySettings,
    pub validation: ValidationMode,
    pub requests_per_minute: u32,
    pub log_format: LogFormat,
    /// Browser origins allowed to call the API. Empty disables CORS.
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&var, "PORT", 3000u16)?;

        let mode = parse_or(&var, "PIX_GATEWAY_MODE", GatewayMode::default())?;
        let upstream = UpstreamConfig {
            base_url: var("PIX_UPSTREAM_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            secret: var("PIX_UPSTREAM_SECRET"),
            auth: parse_or(&var, "PIX_UPSTREAM_AUTH", AuthScheme::default())?,
            timeout: var("PIX_UPSTREAM_TIMEOUT_SECS")
                .map(|v| parse_secs("PIX_UPSTREAM_TIMEOUT_SECS", &v))
                .transpose()?
                .unwrap_or(DEFAULT_TIMEOUT),
            validity_secs: parse_or(&var, "PIX_VALIDITY_SECS", DEFAULT_VALIDITY_SECS)?,
        };
        let simulated_pay_after = var("PIX_SIMULATED_PAY_AFTER_SECS")
            .map(|v| parse_secs("PIX_SIMULATED_PAY_AFTER_SECS", &v))
            .transpose()?;

        let allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            gateway: GatewaySettings {
                mode,
                upstream,
                simulated_pay_after,
            },
            validation: parse_or(&var, "PIX_VALIDATION", ValidationMode::Strict)?,
            requests_per_minute: parse_or(
                &var,
                "RATE_LIMIT_PER_MINUTE",
                DEFAULT_REQUESTS_PER_MINUTE,
            )?,
            log_format: parse_or(&var, "LOG_FORMAT", LogFormat::default())?,
            allowed_origins,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_secs(key: &str, raw: &str) -> anyhow::Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid {}={:?}", key, raw))?;
    Ok(Duration::from_secs(secs))
}
