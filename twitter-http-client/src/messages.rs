//! Message types for the Twitter v2 API
//!
//! The filtered stream (`GET /2/tweets/search/stream`) yields one json object per line,
//! with empty keep-alive lines in between:
//!
//! {
//!   "data": {
//!     "id": "1712345678901234567",
//!     "text": "Heads up #SeaScanner https://t.co/abc",
//!     "author_id": "2244994945",
//!     "entities": { "hashtags": [ { "start": 9, "end": 20, "tag": "SeaScanner" } ] },
//!     "referenced_tweets": [ { "type": "quoted", "id": "1712345678900000000" } ]
//!   },
//!   "includes": { "tweets": [ { "id": "1712345678900000000", "text": "..." } ] },
//!   "matching_rules": [ { "id": "1", "tag": "trusted" } ]
//! }
//!
//! For more detail see:
//! https://developer.twitter.com/en/docs/twitter-api/tweets/filtered-stream/introduction

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tweet as returned by the v2 API, with the fields requested by this client.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Tweet {
    /// Tweet id
    pub id: String,
    /// Tweet text, truncated to 280 characters for long tweets
    pub text: String,
    /// Author user id
    #[serde(default)]
    pub author_id: Option<String>,
    /// Entities parsed from the text
    #[serde(default)]
    pub entities: Option<Entities>,
    /// Tweets this tweet retweets, quotes or replies to
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
    /// Full text of long tweets
    #[serde(default)]
    pub note_tweet: Option<NoteTweet>,
}

impl Tweet {
    /// True if this tweet is a plain retweet of another tweet.
    pub fn is_retweet(&self) -> bool {
        self.referenced_tweets
            .iter()
            .any(|r| r.kind == ReferenceKind::Retweeted)
    }

    /// Id of the quoted tweet, if this is a quote tweet.
    pub fn quoted_id(&self) -> Option<&str> {
        self.referenced_tweets
            .iter()
            .find(|r| r.kind == ReferenceKind::Quoted)
            .map(|r| r.id.as_str())
    }

    /// Hashtags in order of appearance, without the leading `#`.
    pub fn hashtags(&self) -> Vec<String> {
        self.entities
            .iter()
            .flat_map(|e| e.hashtags.iter())
            .map(|h| h.tag.clone())
            .collect()
    }

    /// The untruncated text, for tweets longer than 280 characters.
    pub fn extended_text(&self) -> Option<&str> {
        self.note_tweet.as_ref().map(|n| n.text.as_str())
    }
}

/// Entities parsed out of a tweet's text
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Entities {
    /// Hashtags in order of appearance
    #[serde(default)]
    pub hashtags: Vec<Hashtag>,
}

/// A hashtag entity
#[derive(Clone, Debug, Deserialize)]
pub struct Hashtag {
    /// The tag without the leading `#`
    pub tag: String,
}

/// The long-form text of a tweet
#[derive(Clone, Debug, Deserialize)]
pub struct NoteTweet {
    /// Full text
    pub text: String,
}

/// A reference from one tweet to another
#[derive(Clone, Debug, Deserialize)]
pub struct ReferencedTweet {
    /// How the tweet is referenced
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    /// Id of the referenced tweet
    pub id: String,
}

/// Kinds of tweet references
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Plain retweet
    Retweeted,
    /// Quote tweet
    Quoted,
    /// Reply
    RepliedTo,
    /// Anything the API adds later
    #[serde(other)]
    Other,
}

/// Expanded objects referenced by the primary tweet
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Includes {
    /// Referenced tweets
    #[serde(default)]
    pub tweets: Vec<Tweet>,
}

/// One event from the filtered stream
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StreamEvent {
    /// The matching tweet. Absent for error and system events.
    #[serde(default)]
    pub data: Option<Tweet>,
    /// Expansions requested on the stream
    #[serde(default)]
    pub includes: Includes,
    /// Errors reported in-band on the stream
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl StreamEvent {
    /// The quoted tweet of the primary tweet, if it was expanded.
    pub fn quoted_tweet(&self) -> Option<&Tweet> {
        let quoted_id = self.data.as_ref()?.quoted_id()?;
        self.includes.tweets.iter().find(|t| t.id == quoted_id)
    }
}

/// An error object in an API response body
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiError {
    /// Short error title
    #[serde(default)]
    pub title: String,
    /// Longer description
    #[serde(default)]
    pub detail: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.title, detail),
            None => write!(f, "{}", self.title),
        }
    }
}

/// Envelope for `{ "data": ..., "errors": [...] }` responses
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct DataResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

/// Body of `POST /2/tweets`
#[derive(Clone, Debug, Serialize)]
pub(crate) struct PostTweetRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Reply<'a>>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Reply<'a> {
    pub in_reply_to_tweet_id: &'a str,
}

/// A tweet id returned after posting
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PostedTweet {
    pub id: String,
}

/// A rule on the filtered stream
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StreamRule {
    /// Rule id, assigned by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Rule query, e.g. `from:12345 OR from:67890`
    pub value: String,
    /// Optional tag echoed back in `matching_rules`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Body of `POST /2/tweets/search/stream/rules`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RulesUpdate {
    Add(Vec<StreamRule>),
    Delete { ids: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_event() {
        let line = r#"{
            "data": {
                "id": "2",
                "text": "Heads up #SeaScanner",
                "author_id": "42",
                "entities": { "hashtags": [ { "start": 9, "end": 20, "tag": "SeaScanner" } ] },
                "referenced_tweets": [ { "type": "quoted", "id": "1" } ]
            },
            "includes": { "tweets": [ { "id": "1", "text": "original" } ] },
            "matching_rules": [ { "id": "7", "tag": "trusted" } ]
        }"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let tweet = event.data.as_ref().unwrap();
        assert_eq!(tweet.author_id.as_deref(), Some("42"));
        assert_eq!(tweet.hashtags(), vec!["SeaScanner"]);
        assert!(!tweet.is_retweet());
        assert_eq!(event.quoted_tweet().unwrap().text, "original");
    }

    #[test]
    fn test_parse_retweet_and_unknown_reference() {
        let line = r#"{"data":{"id":"3","text":"RT @someone: hi","referenced_tweets":[{"type":"retweeted","id":"1"},{"type":"something_new","id":"2"}]}}"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let tweet = event.data.unwrap();
        assert!(tweet.is_retweet());
        assert_eq!(tweet.referenced_tweets[1].kind, ReferenceKind::Other);
        assert!(tweet.hashtags().is_empty());
    }

    #[test]
    fn test_parse_error_event() {
        let line = r#"{"errors":[{"title":"operational-disconnect","detail":"This stream has been disconnected"}]}"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        assert!(event.data.is_none());
        assert_eq!(
            event.errors[0].to_string(),
            "operational-disconnect: This stream has been disconnected"
        );
    }

    #[test]
    fn test_serialize_reply() {
        let req = PostTweetRequest {
            text: "2/2",
            reply: Some(Reply {
                in_reply_to_tweet_id: "99",
            }),
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"text":"2/2","reply":{"in_reply_to_tweet_id":"99"}}"#
        );
        let req = PostTweetRequest {
            text: "1/2",
            reply: None,
        };
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"text":"1/2"}"#);
    }

    #[test]
    fn test_serialize_rules_update() {
        let add = RulesUpdate::Add(vec![StreamRule {
            id: None,
            value: "from:1".into(),
            tag: Some("trusted".into()),
        }]);
        assert_eq!(
            serde_json::to_string(&add).unwrap(),
            r#"{"add":[{"value":"from:1","tag":"trusted"}]}"#
        );
        let delete = RulesUpdate::Delete {
            ids: vec!["5".into()],
        };
        assert_eq!(
            serde_json::to_string(&delete).unwrap(),
            r#"{"delete":{"ids":["5"]}}"#
        );
    }
}
