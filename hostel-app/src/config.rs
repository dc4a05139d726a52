//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use hostel_repo::{GatewayConfig, GatewayMode};
use hostel_types::ReminderPolicy;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("Unknown LOG_FORMAT '{other}' (expected json or pretty)"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub rate_limit_per_minute: u32,
    pub gateway: GatewayConfig,
    pub reminders: ReminderPolicy,
    /// `None` disables the periodic schedule / reminder job
    pub jobs_interval: Option<Duration>,
    pub webhook_worker_enabled: bool,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let defaults = ReminderPolicy::default();
        let jobs_secs: u64 = parse_or(get("JOBS_INTERVAL_SECS"), "JOBS_INTERVAL_SECS", 0)?;

        Ok(Self {
            port: parse_or(get("PORT"), "PORT", 3000)?,
            database_url,
            rate_limit_per_minute: parse_or(
                get("RATE_LIMIT_PER_MINUTE"),
                "RATE_LIMIT_PER_MINUTE",
                100,
            )?,
            gateway: GatewayConfig {
                mode: parse_or(get("GATEWAY_MODE"), "GATEWAY_MODE", GatewayMode::Sandbox)?,
                base_url: get("GATEWAY_BASE_URL"),
                key_id: get("GATEWAY_KEY_ID"),
                key_secret: get("GATEWAY_KEY_SECRET"),
                webhook_secret: get("GATEWAY_WEBHOOK_SECRET"),
            },
            reminders: ReminderPolicy {
                days_before: parse_or(
                    get("REMINDER_DAYS_BEFORE"),
                    "REMINDER_DAYS_BEFORE",
                    defaults.days_before,
                )?,
                overdue_repeat_days: parse_or(
                    get("OVERDUE_REMINDER_INTERVAL_DAYS"),
                    "OVERDUE_REMINDER_INTERVAL_DAYS",
                    defaults.overdue_repeat_days,
                )?,
            },
            jobs_interval: (jobs_secs > 0).then(|| Duration::from_secs(jobs_secs)),
            webhook_worker_enabled: parse_bool(get("WEBHOOK_WORKER_ENABLED"), true)?,
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", LogFormat::Pretty)?,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid value for {key}: '{value}'")),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> anyhow::Result<bool> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => anyhow::bail!("Invalid value for WEBHOOK_WORKER_ENABLED: '{v}'"),
    }
}
