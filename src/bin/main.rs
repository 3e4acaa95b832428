use anyhow::Result;
use tomato_poster::{
    config::Config,
    job::{Bot, forum::Reddit, movies::RottenTomatoes, util::Client},
    logging,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = Config::load()?;
    let client = Client::new().with_timeout(config.request_timeout())?;
    let source = RottenTomatoes::new(client.clone(), config.user_agent.clone());
    let forum = Reddit::new(client);

    info!(subreddit = %config.subreddit, check_rate = config.check_rate, "Starting");
    Bot::init(config, source, forum)?.run().await
}
