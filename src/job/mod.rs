use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tracing::{error, info, warn};

pub mod eligibility;
pub mod forum;
pub mod matching;
pub mod movies;
pub mod posting;
pub mod store;
pub mod token;
pub mod util;

use crate::config::Config;
use forum::ForumApi;
use movies::MovieSource;
use posting::{CycleError, post_new_movies};
use store::PostStore;
use token::TokenManager;

/// Seconds between two loop ticks.
pub const TICK_SECS: u64 = 60;

/// Everything a posting cycle works on: settings, credential, posted movies and the two
/// remote services.
pub struct Session<S, F> {
    pub config: Config,
    pub tokens: TokenManager,
    pub store: PostStore,
    pub source: S,
    pub forum: F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not a posting tick.
    Idle,
    /// Posting tick without a usable credential.
    Skipped,
    /// Cycle ended early on a request error.
    Failed,
    Posted(usize),
}

struct Job {
    run_interval: u64,
}

impl Job {
    fn should_run(&self, uptime: u64) -> bool {
        uptime % self.run_interval == 0
    }
}

pub struct Bot<S, F> {
    session: Session<S, F>,
    job: Job,
    uptime: u64,
}

impl<S: MovieSource, F: ForumApi> Bot<S, F> {
    /// Loads the post state and prepares the loop. No request is made yet.
    pub fn init(config: Config, source: S, forum: F) -> Result<Self> {
        let store = PostStore::load(config.data_file.clone())
            .with_context(|| format!("Could not initialise {}", config.data_file.display()))?;
        info!(posted = store.len(), path = %store.path().display(), "Loaded post state");

        Ok(Bot {
            job: Job {
                run_interval: config.check_rate,
            },
            session: Session {
                tokens: TokenManager::new(config.user_agent.clone()),
                config,
                store,
                source,
                forum,
            },
            uptime: 0,
        })
    }

    pub fn session(&self) -> &Session<S, F> {
        &self.session
    }

    pub fn uptime(&self) -> u64 {
        self.uptime
    }

    pub async fn refresh_token(&mut self) -> bool {
        let grant = self.session.config.password_grant();
        self.session
            .tokens
            .refresh(&self.session.forum, &grant)
            .await
    }

    /// One loop iteration: refresh the credential if it is missing or about to expire, run
    /// the posting cycle on its cadence, then advance the clock by one tick.
    ///
    /// Only a failure to record an already submitted post is returned as an error.
    pub async fn tick(&mut self, now: NaiveDateTime) -> Result<TickOutcome> {
        info!(uptime = self.uptime, "Uptime: {}s", self.uptime);

        if self.session.tokens.needs_refresh() {
            info!("Refreshing access token");
            self.refresh_token().await;
        }

        let outcome = if !self.job.should_run(self.uptime) {
            TickOutcome::Idle
        } else if !self.session.tokens.is_authenticated() {
            warn!("No access token, skipping this update");
            TickOutcome::Skipped
        } else {
            info!("Updating");
            match post_new_movies(&mut self.session, now).await {
                Ok(posted) => {
                    info!(posted, "Updated");
                    TickOutcome::Posted(posted)
                }
                Err(CycleError::Request(err)) => {
                    error!("There was an error making a post. {err}");
                    TickOutcome::Failed
                }
                Err(CycleError::Store(err)) => {
                    return Err(err).context("Post was made but could not be recorded");
                }
            }
        };

        self.uptime += TICK_SECS;
        self.session.tokens.elapse(TICK_SECS as i64);
        Ok(outcome)
    }

    /// Runs until the process is stopped or the post state can no longer be written.
    pub async fn run(mut self) -> Result<()> {
        self.refresh_token().await;
        loop {
            self.tick(Local::now().naive_local()).await?;
            tokio::time::sleep(Duration::from_secs(TICK_SECS)).await;
        }
    }
}
