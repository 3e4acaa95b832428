use std::time::Duration;

use bytes::Bytes;
use itertools::Itertools;
use reqwest::{IntoUrl, StatusCode, header::HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("'{operation}' returned a status code of {status}")]
    Http {
        operation: &'static str,
        status: StatusCode,
    },
    #[error("{message}")]
    RedditApi { message: String },
    #[error("Network error {0}")]
    Network(#[from] reqwest::Error),
    #[error("'{operation}' returned an unexpected body: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid header value {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub enum RequestType<'a> {
    Get,
    PostForm(&'a [(&'a str, String)]),
}

/// Credentials sent as HTTP basic auth instead of a bearer header.
pub struct BasicAuth<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl Client {
    pub fn new() -> Self {
        Client {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, RequestError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Client that talks to local test servers directly, ignoring proxy settings.
    #[cfg(test)]
    pub(crate) fn local() -> Self {
        Client {
            client: reqwest::Client::builder()
                .no_proxy()
                .build()
                .expect("local client"),
        }
    }

    pub async fn get_json<U: IntoUrl, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: U,
        headers: HeaderMap,
    ) -> Result<T, RequestError> {
        let (status, body) = self.send(url, RequestType::Get, headers, None).await?;
        decode(operation, classify_json(operation, status, &body)?)
    }

    pub async fn get_text<U: IntoUrl>(
        &self,
        operation: &'static str,
        url: U,
        headers: HeaderMap,
    ) -> Result<String, RequestError> {
        let (status, body) = self.send(url, RequestType::Get, headers, None).await?;
        classify_text(operation, status, &body)
    }

    pub async fn post_form_json<U: IntoUrl, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: U,
        form: &[(&str, String)],
        headers: HeaderMap,
        basic_auth: Option<BasicAuth<'_>>,
    ) -> Result<T, RequestError> {
        let (status, body) = self
            .send(url, RequestType::PostForm(form), headers, basic_auth)
            .await?;
        decode(operation, classify_json(operation, status, &body)?)
    }

    async fn send<U: IntoUrl>(
        &self,
        url: U,
        req_type: RequestType<'_>,
        headers: HeaderMap,
        basic_auth: Option<BasicAuth<'_>>,
    ) -> Result<(StatusCode, Bytes), RequestError> {
        let mut request = match req_type {
            RequestType::Get => self.client.get(url),
            RequestType::PostForm(form) => self.client.post(url).form(form),
        }
        .headers(headers);

        if let Some(auth) = basic_auth {
            request = request.basic_auth(auth.username, Some(auth.password));
        }

        let response = request.send().await?;
        let status = response.status();
        Ok((status, response.bytes().await?))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, value: Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|source| RequestError::Decode { operation, source })
}

fn check_status(operation: &'static str, status: StatusCode) -> Result<(), RequestError> {
    if status != StatusCode::OK {
        return Err(RequestError::Http { operation, status });
    }
    Ok(())
}

/// Classifies a textual response: only the status code matters.
pub fn classify_text(
    operation: &'static str,
    status: StatusCode,
    body: &[u8],
) -> Result<String, RequestError> {
    check_status(operation, status)?;
    Ok(String::from_utf8_lossy(body).into_owned())
}

/// Classifies a structured response.
///
/// Reddit reports failures with a 200 status and an `errors` list or `error` field, either at
/// the top level of the body or nested under `json`. Both envelopes are checked, top level
/// first. A body without any of them is returned as parsed.
pub fn classify_json(
    operation: &'static str,
    status: StatusCode,
    body: &[u8],
) -> Result<Value, RequestError> {
    check_status(operation, status)?;
    let data: Value =
        serde_json::from_slice(body).map_err(|source| RequestError::Decode { operation, source })?;

    check_envelope(operation, &data)?;
    if let Some(nested) = data.get("json") {
        check_envelope(operation, nested)?;
    }
    Ok(data)
}

fn check_envelope(operation: &'static str, envelope: &Value) -> Result<(), RequestError> {
    if let Some(errors) = envelope.get("errors").and_then(Value::as_array)
        && !errors.is_empty()
    {
        let message = errors
            .iter()
            .map(|error| format!("'{operation}' error {}", describe_error_entry(error)))
            .join("\n");
        return Err(RequestError::RedditApi { message });
    }

    if let Some(error) = envelope.get("error") {
        return Err(RequestError::RedditApi {
            message: format!("'{operation}' error: {}", display_value(error)),
        });
    }
    Ok(())
}

// Entries are usually `[code, message, field]`.
fn describe_error_entry(entry: &Value) -> String {
    match entry.as_array().map(Vec::as_slice) {
        Some([code, message, ..]) => format!("{}: {}", display_value(code), display_value(message)),
        Some([code]) => display_value(code),
        _ => display_value(entry),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
