//! The seam between the relay and the microblog platform.

use crate::status::Status;
use async_trait::async_trait;
use futures_util::{StreamExt, future, stream::BoxStream};
use tracing::warn;
use twitter_http_client::TwitterClient;

/// Errors from the microblog transport
pub type MicroblogError = twitter_http_client::Error;

/// Statuses in arrival order. Ends, possibly after an error, when the connection drops.
pub type StatusStream = BoxStream<'static, Result<Status, MicroblogError>>;

/// Operations the relay needs from the microblog platform
#[async_trait]
pub trait Microblog: Send + Sync {
    /// Post a status, optionally as a reply. Returns the new status id.
    async fn post(&self, text: &str, in_reply_to: Option<&str>) -> Result<String, MicroblogError>;

    /// Connect to the stream of statuses from followed accounts
    async fn statuses(&self) -> Result<StatusStream, MicroblogError>;
}

#[async_trait]
impl Microblog for TwitterClient {
    async fn post(&self, text: &str, in_reply_to: Option<&str>) -> Result<String, MicroblogError> {
        self.post_tweet(text, in_reply_to).await
    }

    async fn statuses(&self) -> Result<StatusStream, MicroblogError> {
        let events = self.connect_stream().await?;
        Ok(events
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => {
                        for err in &event.errors {
                            warn!("Stream reported: {err}");
                        }
                        Status::from_event(&event).map(Ok)
                    }
                    // A line that does not decode is skipped, the connection is fine
                    Err(MicroblogError::Json(err)) => {
                        warn!("Skipping undecodable stream event: {err}");
                        None
                    }
                    Err(err) => Some(Err(err)),
                })
            })
            .boxed())
    }
}
