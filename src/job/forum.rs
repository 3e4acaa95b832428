//! Reddit endpoints used by the bot.

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use super::token::Credential;
use super::util::{BasicAuth, Client, RequestError};

static TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
static OAUTH_BASE: &str = "https://oauth.reddit.com";

/// Resource owner credentials for the password grant.
pub struct PasswordGrant<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// A link flair template offered by the subreddit.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlairChoice {
    pub flair_template_id: String,
    #[serde(default)]
    pub flair_text: Option<String>,
    #[serde(default)]
    pub flair_css_class: Option<String>,
}

#[derive(Deserialize, Debug)]
struct FlairSelector {
    #[serde(default)]
    choices: Vec<FlairChoice>,
}

#[derive(Deserialize, Debug)]
struct SubmitResponse {
    json: SubmitJson,
}

#[derive(Deserialize, Debug)]
struct SubmitJson {
    data: SubmitData,
}

#[derive(Deserialize, Debug)]
struct SubmitData {
    name: String,
}

#[allow(async_fn_in_trait)]
pub trait ForumApi {
    async fn access_token(
        &self,
        headers: HeaderMap,
        grant: &PasswordGrant<'_>,
    ) -> Result<Credential, RequestError>;

    /// Submits a link post and returns its fullname (`t3_...`).
    async fn submit(
        &self,
        headers: HeaderMap,
        subreddit: &str,
        title: &str,
        url: &str,
    ) -> Result<String, RequestError>;

    async fn flair_options(
        &self,
        headers: HeaderMap,
        subreddit: &str,
        link: &str,
    ) -> Result<Vec<FlairChoice>, RequestError>;

    async fn select_flair(
        &self,
        headers: HeaderMap,
        subreddit: &str,
        link: &str,
        template_id: &str,
        text: &str,
    ) -> Result<(), RequestError>;

    async fn approve(&self, headers: HeaderMap, id: &str) -> Result<(), RequestError>;
}

pub struct Reddit {
    client: Client,
    token_url: String,
    oauth_base: String,
}

impl Reddit {
    pub fn new(client: Client) -> Self {
        Self::with_endpoints(client, TOKEN_URL, OAUTH_BASE)
    }

    /// Points the client at another token endpoint and OAuth API host.
    pub fn with_endpoints(
        client: Client,
        token_url: impl Into<String>,
        oauth_base: impl Into<String>,
    ) -> Self {
        Reddit {
            client,
            token_url: token_url.into(),
            oauth_base: oauth_base.into(),
        }
    }
}

impl ForumApi for Reddit {
    async fn access_token(
        &self,
        headers: HeaderMap,
        grant: &PasswordGrant<'_>,
    ) -> Result<Credential, RequestError> {
        let form = [
            ("grant_type", "password".to_string()),
            ("username", grant.username.to_string()),
            ("password", grant.password.to_string()),
        ];
        self.client
            .post_form_json(
                "get_token",
                self.token_url.as_str(),
                &form,
                headers,
                Some(BasicAuth {
                    username: grant.client_id,
                    password: grant.client_secret,
                }),
            )
            .await
    }

    async fn submit(
        &self,
        headers: HeaderMap,
        subreddit: &str,
        title: &str,
        url: &str,
    ) -> Result<String, RequestError> {
        let form = [
            ("api_type", "json".to_string()),
            ("kind", "link".to_string()),
            ("extension", "json".to_string()),
            ("resubmit", "true".to_string()),
            ("sendreplies", "true".to_string()),
            ("sr", subreddit.to_string()),
            ("title", title.to_string()),
            ("url", url.to_string()),
        ];
        let response: SubmitResponse = self
            .client
            .post_form_json(
                "make_post",
                format!("{}/api/submit", self.oauth_base),
                &form,
                headers,
                None,
            )
            .await?;
        Ok(response.json.data.name)
    }

    async fn flair_options(
        &self,
        headers: HeaderMap,
        subreddit: &str,
        link: &str,
    ) -> Result<Vec<FlairChoice>, RequestError> {
        let form = [("link", link.to_string())];
        let selector: FlairSelector = self
            .client
            .post_form_json(
                "get_flair_options",
                format!("{}/r/{subreddit}/api/flairselector", self.oauth_base),
                &form,
                headers,
                None,
            )
            .await?;
        Ok(selector.choices)
    }

    async fn select_flair(
        &self,
        headers: HeaderMap,
        subreddit: &str,
        link: &str,
        template_id: &str,
        text: &str,
    ) -> Result<(), RequestError> {
        let form = [
            ("api_type", "json".to_string()),
            ("flair_template_id", template_id.to_string()),
            ("link", link.to_string()),
            ("text", text.to_string()),
        ];
        let _: Value = self
            .client
            .post_form_json(
                "set_post_flair",
                format!("{}/r/{subreddit}/api/selectflair", self.oauth_base),
                &form,
                headers,
                None,
            )
            .await?;
        Ok(())
    }

    async fn approve(&self, headers: HeaderMap, id: &str) -> Result<(), RequestError> {
        let form = [("id", id.to_string())];
        let _: Value = self
            .client
            .post_form_json(
                "approve_post",
                format!("{}/api/approve", self.oauth_base),
                &form,
                headers,
                None,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::token::TokenManager;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Accepts one connection, answers it with `body` and yields the raw request.
    async fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8(raw).unwrap()
        });
        (base, handle)
    }

    fn reddit(base: &str) -> Reddit {
        Reddit::with_endpoints(Client::local(), format!("{base}/api/v1/access_token"), base)
    }

    fn signed_in() -> TokenManager {
        TokenManager::new("tomato-poster/test").with_credential(Credential {
            access_token: "tok".to_string(),
            refresh_token: None,
            token_type: "bearer".to_string(),
            expires_in: 3600,
        })
    }

    fn request_body(raw: &str) -> &str {
        raw.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
    }

    #[tokio::test]
    async fn token_request_uses_basic_auth_only() {
        let (base, server) =
            serve_once(r#"{"access_token": "tok", "token_type": "bearer", "expires_in": 3600}"#)
                .await;
        let grant = PasswordGrant {
            client_id: "id",
            client_secret: "secret",
            username: "bot",
            password: "pw",
        };
        // Holding a credential must not leak a bearer header into the token call.
        let headers = signed_in().headers(false).unwrap();

        let credential = reddit(&base).access_token(headers, &grant).await.unwrap();
        assert_eq!(credential.access_token, "tok");

        let raw = server.await.unwrap();
        let lower = raw.to_lowercase();
        assert!(raw.starts_with("POST /api/v1/access_token HTTP/1.1\r\n"));
        assert_eq!(lower.matches("authorization:").count(), 1);
        assert!(raw.contains("Basic aWQ6c2VjcmV0"));
        assert!(lower.contains("user-agent: tomato-poster/test"));
        assert_eq!(
            request_body(&raw),
            "grant_type=password&username=bot&password=pw"
        );
    }

    #[tokio::test]
    async fn submit_sends_link_form_with_bearer() {
        let (base, server) =
            serve_once(r#"{"json": {"errors": [], "data": {"name": "t3_abc"}}}"#).await;

        let name = reddit(&base)
            .submit(
                signed_in().headers(true).unwrap(),
                "movies",
                "Heat [87%]",
                "https://rottentomatoes.com/m/heat",
            )
            .await
            .unwrap();
        assert_eq!(name, "t3_abc");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/submit HTTP/1.1\r\n"));
        assert!(raw.to_lowercase().contains("authorization: bearer tok"));
        assert_eq!(
            request_body(&raw),
            "api_type=json&kind=link&extension=json&resubmit=true&sendreplies=true&sr=movies\
             &title=Heat+%5B87%25%5D&url=https%3A%2F%2Frottentomatoes.com%2Fm%2Fheat"
        );
    }

    #[tokio::test]
    async fn select_flair_targets_the_subreddit() {
        let (base, server) = serve_once(r#"{"json": {"errors": []}}"#).await;

        reddit(&base)
            .select_flair(
                signed_in().headers(true).unwrap(),
                "movies",
                "t3_abc",
                "abc-123",
                "Fresh",
            )
            .await
            .unwrap();

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /r/movies/api/selectflair HTTP/1.1\r\n"));
        assert_eq!(
            request_body(&raw),
            "api_type=json&flair_template_id=abc-123&link=t3_abc&text=Fresh"
        );
    }

    #[tokio::test]
    async fn api_errors_in_a_200_reply_are_raised() {
        let (base, server) =
            serve_once(r#"{"json": {"errors": [["RATELIMIT", "slow down", "ratelimit"]]}}"#)
                .await;

        let err = reddit(&base)
            .approve(signed_in().headers(true).unwrap(), "t3_abc")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "'approve_post' error RATELIMIT: slow down");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/approve HTTP/1.1\r\n"));
        assert_eq!(request_body(&raw), "id=t3_abc");
    }

    #[test]
    fn flair_selector_tolerates_missing_fields() {
        let selector: FlairSelector = serde_json::from_str(
            r#"{"current": {}, "choices": [
                {"flair_template_id": "a1", "flair_text": "Fresh", "flair_css_class": "fresh",
                 "flair_text_editable": false, "flair_position": "right"},
                {"flair_template_id": "b2", "flair_text": null}
            ]}"#,
        )
        .unwrap();
        assert_eq!(selector.choices.len(), 2);
        assert_eq!(selector.choices[1].flair_text, None);
        assert_eq!(selector.choices[1].flair_css_class, None);
    }

    #[test]
    fn submit_response_yields_fullname() {
        let response: SubmitResponse = serde_json::from_str(
            r#"{"json": {"errors": [], "data": {"url": "https://reddit.com/r/movies/comments/abc/",
                "id": "abc", "name": "t3_abc"}}}"#,
        )
        .unwrap();
        assert_eq!(response.json.data.name, "t3_abc");
    }
}
