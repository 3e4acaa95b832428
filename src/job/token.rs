use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{error, info};

use super::forum::{ForumApi, PasswordGrant};
use super::util::RequestError;

/// Refresh once the credential has this many seconds (or fewer) left.
pub const REFRESH_THRESHOLD_SECS: i64 = 60;

/// Bearer credential as returned by the access token endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

pub struct TokenManager {
    user_agent: String,
    credential: Option<Credential>,
}

impl TokenManager {
    pub fn new(user_agent: impl Into<String>) -> Self {
        TokenManager {
            user_agent: user_agent.into(),
            credential: None,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn needs_refresh(&self) -> bool {
        self.credential
            .as_ref()
            .is_none_or(|credential| credential.expires_in <= REFRESH_THRESHOLD_SECS)
    }

    /// Counts the credential down by the time spent in one loop tick.
    pub fn elapse(&mut self, secs: i64) {
        if let Some(credential) = self.credential.as_mut() {
            credential.expires_in -= secs;
        }
    }

    /// Requests a fresh credential. On failure the current one is dropped, so the caller
    /// sees an unauthenticated manager rather than a stale token.
    pub async fn refresh<F: ForumApi>(&mut self, forum: &F, grant: &PasswordGrant<'_>) -> bool {
        let result = match self.headers(false) {
            Ok(headers) => forum.access_token(headers, grant).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(credential) => {
                info!(expires_in = credential.expires_in, "Access token refreshed");
                self.credential = Some(credential);
                true
            }
            Err(err) => {
                self.credential = None;
                error!(
                    "Could not get access token from the Reddit API. This can be caused by \
                     Reddit not being accessible, an incorrect username or password, an \
                     incorrect 'client_id' or 'client_secret', or the application not being \
                     registered as a 'script'. Raw error: {err}"
                );
                false
            }
        }
    }

    /// Headers for an outbound call. `Authorization` is only added when asked for and a
    /// credential is held.
    pub fn headers(&self, include_auth: bool) -> Result<HeaderMap, RequestError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);
        if include_auth && let Some(credential) = &self.credential {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!(
                    "{} {}",
                    credential.token_type, credential.access_token
                ))?,
            );
        }
        Ok(headers)
    }

    #[cfg(test)]
    pub(crate) fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}
