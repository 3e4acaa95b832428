use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use serde::Deserialize;
use tracing::warn;

use crate::job::TICK_SECS;
use crate::job::forum::PasswordGrant;

static CONFIG_PATH_VAR: &str = "TOMATO_POSTER_CONFIG";
static DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub user_agent: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub subreddit: String,
    /// Seconds between posting cycles; a multiple of the loop tick.
    pub check_rate: u64,
    pub post_title_format: String,
    pub post_flairs: PostFlairs,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PostFlairs {
    pub enabled: bool,
    #[serde(default)]
    pub flairs: Vec<FlairRule>,
}

/// Score range (inclusive on both ends) mapped to a subreddit flair.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlairRule {
    pub min: i32,
    pub max: i32,
    pub text: String,
    #[serde(rename = "class")]
    pub css_class: String,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Loads the config from `$TOMATO_POSTER_CONFIG`, falling back to `config.json`.
    pub fn load() -> Result<Self> {
        let _ = dotenv();
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(path)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("Could not parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_rate == 0 {
            bail!("'check_rate' must be positive");
        }
        if self.check_rate % TICK_SECS != 0 {
            warn!(
                check_rate = self.check_rate,
                "'check_rate' is not a multiple of {TICK_SECS}s, updates only run when the \
                 uptime is a multiple of both"
            );
        }
        for (key, value) in [
            ("user_agent", &self.user_agent),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
            ("subreddit", &self.subreddit),
        ] {
            if value.trim().is_empty() {
                bail!("'{key}' must not be empty");
            }
        }
        if let Some(rule) = self.post_flairs.flairs.iter().find(|rule| rule.min > rule.max) {
            bail!(
                "Flair '{}' has a minimum ({}) above its maximum ({})",
                rule.text,
                rule.min,
                rule.max
            );
        }
        Ok(())
    }

    pub fn password_grant(&self) -> PasswordGrant<'_> {
        PasswordGrant {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            username: &self.username,
            password: &self.password,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
