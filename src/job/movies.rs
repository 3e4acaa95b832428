use chrono::{NaiveDate, NaiveDateTime};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use super::eligibility::is_eligible;
use super::store::{PostStore, PostedMovie};
use super::util::{Client, RequestError};

static RT_DATE_FORMAT: &str = "%Y-%m-%d";
static RT_BASE: &str = "https://rottentomatoes.com";
static TOP_BOX_OFFICE_URL: &str = "https://d2a5cgar23scu2.cloudfront.net/api/private/v1.0/m/list/find?page=1&limit=10&type=in-theaters&sortBy=popularity";
static PREMIERE_MARKER: &str = r#"itemprop="datePublished" content=""#;

#[derive(Debug, Deserialize)]
struct RTListing {
    results: Vec<MovieCandidate>,
}

/// A movie from the box office listing, carrying its score until it is posted.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MovieCandidate {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tomato_score: Option<i32>,
}

impl MovieCandidate {
    pub fn record(&self) -> PostedMovie {
        PostedMovie {
            id: self.id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

/// A candidate that passed dedup and the release window check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMovie {
    pub movie: PostedMovie,
    pub tomato_score: i32,
}

impl StagedMovie {
    pub fn link(&self) -> String {
        format!("{RT_BASE}{}", self.movie.url)
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[allow(async_fn_in_trait)]
pub trait MovieSource {
    /// Top ten in-theater movies by popularity.
    async fn top_box_office(&self) -> Result<Vec<MovieCandidate>, RequestError>;

    /// Raw HTML of the movie's detail page.
    async fn movie_page(&self, url: &str) -> Result<String, RequestError>;
}

pub struct RottenTomatoes {
    client: Client,
    user_agent: String,
}

impl RottenTomatoes {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        RottenTomatoes {
            client,
            user_agent: user_agent.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, RequestError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);
        Ok(headers)
    }
}

impl MovieSource for RottenTomatoes {
    async fn top_box_office(&self) -> Result<Vec<MovieCandidate>, RequestError> {
        let listing: RTListing = self
            .client
            .get_json("get_top_box_office", TOP_BOX_OFFICE_URL, self.headers()?)
            .await?;
        Ok(listing.results)
    }

    async fn movie_page(&self, url: &str) -> Result<String, RequestError> {
        self.client
            .get_text("get_movie_page", format!("{RT_BASE}{url}"), self.headers()?)
            .await
    }
}

/// Pulls the `datePublished` meta value out of a detail page.
pub fn premiere_date(html: &str) -> Option<NaiveDate> {
    let (_, rest) = html.split_once(PREMIERE_MARKER)?;
    let (raw, _) = rest.split_once('"')?;
    NaiveDate::parse_from_str(raw, RT_DATE_FORMAT).ok()
}

/// Lists the box office and keeps the movies that are new to the store and inside their
/// release window at `now`. Detail pages are only fetched for movies not yet posted.
pub async fn movies_to_post<S: MovieSource>(
    source: &S,
    store: &PostStore,
    now: NaiveDateTime,
) -> Result<Vec<StagedMovie>, RequestError> {
    let mut staged = vec![];
    for candidate in source.top_box_office().await? {
        let record = candidate.record();
        if store.contains(&record) {
            continue;
        }

        let Some(tomato_score) = candidate.tomato_score else {
            debug!(title = %candidate.title, "No tomato score yet, skipping");
            continue;
        };

        let page = source.movie_page(&candidate.url).await?;
        let Some(premiere) = premiere_date(&page) else {
            warn!(title = %candidate.title, url = %candidate.url, "No premiere date on movie page");
            continue;
        };

        if is_eligible(premiere, now) {
            staged.push(StagedMovie {
                movie: record,
                tomato_score,
            });
        } else {
            debug!(title = %candidate.title, %premiere, "Not inside its release window yet");
        }
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_premiere_date() {
        let html = r#"<div><time itemprop="datePublished" content="2024-06-07">Jun 7</time></div>"#;
        assert_eq!(
            premiere_date(html),
            Some(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap())
        );
    }

    #[test]
    fn missing_or_malformed_premiere_date() {
        assert_eq!(premiere_date("<html></html>"), None);
        assert_eq!(
            premiere_date(r#"itemprop="datePublished" content="June 7th""#),
            None
        );
        assert_eq!(premiere_date(r#"itemprop="datePublished" content="2024-06-07"#), None);
    }

    #[test]
    fn parses_listing_with_numeric_ids() {
        let listing: RTListing = serde_json::from_str(
            r#"{"counts": {}, "results": [
                {"id": 771, "title": "Heat", "url": "/m/heat_1995", "tomatoScore": 87, "popcornScore": 94},
                {"id": "m2", "title": "Unrated", "url": "/m/unrated", "tomatoScore": null}
            ]}"#,
        )
        .unwrap();
        assert_eq!(listing.results[0].id, "771");
        assert_eq!(listing.results[0].tomato_score, Some(87));
        assert_eq!(listing.results[1].tomato_score, None);
    }

    #[test]
    fn record_drops_score() {
        let candidate = MovieCandidate {
            id: "1".to_string(),
            title: "Heat".to_string(),
            url: "/m/heat".to_string(),
            tomato_score: Some(87),
        };
        let encoded = serde_json::to_value(candidate.record()).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({"id": "1", "title": "Heat", "url": "/m/heat"})
        );
    }
}
