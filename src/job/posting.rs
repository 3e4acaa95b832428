use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{info, warn};

use super::Session;
use super::forum::ForumApi;
use super::matching::{flair_for_score, template_id};
use super::movies::{MovieSource, StagedMovie, movies_to_post};
use super::store::StoreError;
use super::util::RequestError;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("There was an error making a post. {0}")]
    Request(#[from] RequestError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fills `{movie_title}` and `{tomato_score}` in the configured title template in one pass;
/// `{{` and `}}` stand for literal braces.
pub fn format_title(template: &str, title: &str, score: i32) -> String {
    let score = score.to_string();
    let mut formatted = String::with_capacity(template.len() + title.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        formatted.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let (replacement, consumed) = if tail.starts_with("{{") {
            ("{", 2)
        } else if tail.starts_with("}}") {
            ("}", 2)
        } else if tail.starts_with("{movie_title}") {
            (title, "{movie_title}".len())
        } else if tail.starts_with("{tomato_score}") {
            (score.as_str(), "{tomato_score}".len())
        } else {
            (&tail[..1], 1)
        };
        formatted.push_str(replacement);
        rest = &tail[consumed..];
    }
    formatted.push_str(rest);
    formatted
}

/// Runs one posting cycle and returns how many movies were posted.
///
/// Movies are recorded only after they have been submitted and approved. A request error
/// ends the cycle with whatever was recorded up to that point.
pub async fn post_new_movies<S: MovieSource, F: ForumApi>(
    session: &mut Session<S, F>,
    now: NaiveDateTime,
) -> Result<usize, CycleError> {
    let staged = movies_to_post(&session.source, &session.store, now).await?;
    let mut posted = 0;

    for movie in staged {
        let name = submit(session, &movie).await?;

        if session.config.post_flairs.enabled {
            apply_flair(session, &name, movie.tomato_score).await?;
        }

        session
            .forum
            .approve(session.tokens.headers(true)?, &name)
            .await?;

        session.store.append(movie.movie)?;
        posted += 1;
    }
    Ok(posted)
}

async fn submit<S: MovieSource, F: ForumApi>(
    session: &Session<S, F>,
    movie: &StagedMovie,
) -> Result<String, RequestError> {
    let title = format_title(
        &session.config.post_title_format,
        &movie.movie.title,
        movie.tomato_score,
    );
    let name = session
        .forum
        .submit(
            session.tokens.headers(true)?,
            &session.config.subreddit,
            &title,
            &movie.link(),
        )
        .await?;
    info!(%name, %title, "Submitted post");
    Ok(name)
}

async fn apply_flair<S: MovieSource, F: ForumApi>(
    session: &Session<S, F>,
    name: &str,
    score: i32,
) -> Result<(), RequestError> {
    let Some(rule) = flair_for_score(&session.config.post_flairs.flairs, score) else {
        warn!(%name, score, "No flair is configured for this tomato score");
        return Ok(());
    };

    let subreddit = &session.config.subreddit;
    let choices = session
        .forum
        .flair_options(session.tokens.headers(true)?, subreddit, name)
        .await?;

    let Some(template) = template_id(&choices, rule) else {
        warn!(
            %name,
            text = %rule.text,
            class = %rule.css_class,
            "Subreddit has no flair template with this text and class"
        );
        return Ok(());
    };

    session
        .forum
        .select_flair(
            session.tokens.headers(true)?,
            subreddit,
            name,
            template,
            &rule.text,
        )
        .await
}
