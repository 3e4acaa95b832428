//! Log output setup for the bot binary.
//!
//! `RUST_LOG` picks the level (default `info`); `TOMATO_POSTER_LOG_FORMAT=json` switches
//! from plain text to one JSON object per line.

use std::{env, str::FromStr};

use tracing_subscriber::EnvFilter;

static LOG_FORMAT_VAR: &str = "TOMATO_POSTER_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{s}'. Valid options: text, json")),
        }
    }
}

/// Installs the global subscriber. Must be called once, before the first log line.
pub fn init() {
    let format = env::var(LOG_FORMAT_VAR)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .flatten_event(true)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}
