#![deny(missing_docs)]

//! Minimal API for the parts of Twitter v2 that a relay bot needs
//!
//! Construct a `TwitterClient` with the API base url and two OAuth2 bearer tokens:
//! an app token, which may read the filtered stream and manage its rules, and a
//! user-context token, which may post tweets on behalf of the bot account.
//!
//! Posting: `post_tweet(text, in_reply_to)` returns the new tweet id, so that a
//! thread can be built by replying to the previous id each time.
//!
//! Reading: `follow(author_ids)` installs stream rules matching the given authors,
//! and `connect_stream()` opens the filtered stream as a `TweetStream`.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

mod error;
pub use error::Error;

mod messages;
use messages::{DataResponse, PostTweetRequest, PostedTweet, Reply, RulesUpdate};
pub use messages::{
    ApiError, Entities, Hashtag, Includes, NoteTweet, ReferenceKind, ReferencedTweet, StreamEvent,
    StreamRule, Tweet,
};

mod stream;
pub use stream::{TweetStream, decode_lines};

/// Stream rules may be at most this many characters long
pub const MAX_RULE_LENGTH: usize = 512;

const RULE_TAG: &str = "trusted";

const STREAM_FIELDS: &[(&str, &str)] = &[
    (
        "tweet.fields",
        "author_id,entities,note_tweet,referenced_tweets",
    ),
    ("expansions", "referenced_tweets.id"),
];

/// Client for the Twitter v2 HTTP API
#[derive(Clone)]
pub struct TwitterClient {
    client: Client,
    api_url: Url,
    app_token: String,
    user_token: String,
}

impl TwitterClient {
    /// Create a new client against the given base url, e.g. `https://api.twitter.com/`
    pub fn new(
        api_url: Url,
        app_token: impl Into<String>,
        user_token: impl Into<String>,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url,
            app_token: app_token.into(),
            user_token: user_token.into(),
        })
    }

    /// Post a tweet, optionally as a reply. Returns the id of the new tweet.
    pub async fn post_tweet(&self, text: &str, in_reply_to: Option<&str>) -> Result<String, Error> {
        let body = PostTweetRequest {
            text,
            reply: in_reply_to.map(|id| Reply {
                in_reply_to_tweet_id: id,
            }),
        };
        let req = self
            .request(Method::POST, "2/tweets", &self.user_token)?
            .json(&body);
        let posted: PostedTweet = self.send_for_data(req).await?;
        debug!("posted tweet {}", posted.id);
        Ok(posted.id)
    }

    /// List the rules currently installed on the filtered stream
    pub async fn stream_rules(&self) -> Result<Vec<StreamRule>, Error> {
        let req = self.request(Method::GET, "2/tweets/search/stream/rules", &self.app_token)?;
        match self.send_for_data::<Vec<StreamRule>>(req).await {
            Ok(rules) => Ok(rules),
            // No rules installed yields a success response without data
            Err(Error::MissingData) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Remove all existing stream rules and install the given ones
    pub async fn replace_stream_rules(&self, rules: Vec<StreamRule>) -> Result<(), Error> {
        let ids: Vec<String> = self
            .stream_rules()
            .await?
            .into_iter()
            .filter_map(|r| r.id)
            .collect();
        if !ids.is_empty() {
            self.update_rules(&RulesUpdate::Delete { ids }).await?;
        }
        if !rules.is_empty() {
            self.update_rules(&RulesUpdate::Add(rules)).await?;
        }
        Ok(())
    }

    /// Install stream rules that match any tweet from the given author ids
    pub async fn follow(&self, author_ids: &[String]) -> Result<(), Error> {
        let rules = follow_rules(author_ids);
        info!(
            "Installing {} stream rule(s) for {} author(s)",
            rules.len(),
            author_ids.len()
        );
        self.replace_stream_rules(rules).await
    }

    /// Connect to the filtered stream
    pub async fn connect_stream(&self) -> Result<TweetStream, Error> {
        let req = self
            .request(Method::GET, "2/tweets/search/stream", &self.app_token)?
            .query(STREAM_FIELDS);
        let resp = check_status(req.send().await?).await?;
        info!("Connected to filtered stream");
        Ok(stream::decode_response(resp))
    }

    async fn update_rules(&self, update: &RulesUpdate) -> Result<(), Error> {
        let req = self
            .request(
                Method::POST,
                "2/tweets/search/stream/rules",
                &self.app_token,
            )?
            .json(update);
        let resp = check_status(req.send().await?).await?;
        let body: DataResponse<serde_json::Value> = resp.json().await?;
        if let Some(err) = body.errors.first() {
            return Err(Error::Api(400, err.to_string()));
        }
        Ok(())
    }

    fn request(&self, method: Method, path: &str, token: &str) -> Result<RequestBuilder, Error> {
        let url = self.api_url.join(path)?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send_for_data<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, Error> {
        let resp = check_status(req.send().await?).await?;
        let body: DataResponse<T> = resp.json().await?;
        match body.data {
            Some(data) => Ok(data),
            None => match body.errors.first() {
                Some(err) => Err(Error::Api(200, err.to_string())),
                None => Err(Error::MissingData),
            },
        }
    }
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(Error::Api(status.as_u16(), text))
}

/// Pack `from:` clauses into as few rules as fit within `MAX_RULE_LENGTH`
pub fn follow_rules(author_ids: &[String]) -> Vec<StreamRule> {
    let mut rules = Vec::new();
    let mut current = String::new();
    for id in author_ids {
        let clause = format!("from:{id}");
        if !current.is_empty() && current.len() + " OR ".len() + clause.len() > MAX_RULE_LENGTH {
            rules.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(" OR ");
        }
        current.push_str(&clause);
    }
    if !current.is_empty() {
        rules.push(current);
    }
    rules
        .into_iter()
        .map(|value| StreamRule {
            id: None,
            value,
            tag: Some(RULE_TAG.to_owned()),
        })
        .collect()
}
