//! Statuses received from the microblog stream.

use twitter_http_client::{StreamEvent, Tweet};

/// A status read from the microblog stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Platform id
    pub id: String,
    /// Text, possibly truncated
    pub text: String,
    /// Untruncated text of long statuses
    pub extended_text: Option<String>,
    /// Author id
    pub author_id: String,
    /// Set by the platform on plain retweets
    pub is_retweet: bool,
    /// Quoted status, one level deep
    pub quoted_status: Option<Box<Status>>,
    /// Hashtags without the leading `#`, in order of appearance
    pub hashtags: Vec<String>,
}

impl Status {
    /// The longest text available
    pub fn full_text(&self) -> &str {
        self.extended_text.as_deref().unwrap_or(&self.text)
    }

    /// Convert a stream event. Events without a tweet yield `None`.
    pub fn from_event(event: &StreamEvent) -> Option<Self> {
        let tweet = event.data.as_ref()?;
        let mut status = Self::from_tweet(tweet);
        status.quoted_status = event
            .quoted_tweet()
            .map(|quoted| Box::new(Self::from_tweet(quoted)));
        Some(status)
    }

    fn from_tweet(tweet: &Tweet) -> Self {
        Self {
            id: tweet.id.clone(),
            text: tweet.text.clone(),
            extended_text: tweet.extended_text().map(str::to_owned),
            author_id: tweet.author_id.clone().unwrap_or_default(),
            is_retweet: tweet.is_retweet(),
            quoted_status: None,
            hashtags: tweet.hashtags(),
        }
    }
}
