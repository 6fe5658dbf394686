use super::{Disposition, Relay, RelayError};
use crate::{filter::Verdict, format::format_status, status::Status};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

impl Relay {
    /// Consume the status stream until stopped, reconnecting when it drops
    pub async fn twitter_to_queue(&self) -> Result<(), RelayError> {
        info!("Starting Twitter Event Stream");
        while !self.is_stopping() {
            let mut statuses = match self.microblog.statuses().await {
                Ok(statuses) => statuses,
                Err(err) => {
                    warn!("Could not connect to the stream: {err}");
                    if !self.pause(self.settings.stream_retry_delay).await {
                        break;
                    }
                    continue;
                }
            };
            info!("Connected to the stream");

            loop {
                let next = tokio::select! {
                    _ = self.token.cancelled() => return Ok(()),
                    next = statuses.next() => next,
                };
                match next {
                    None => {
                        warn!("Stream closed, reconnecting");
                        break;
                    }
                    Some(Err(err)) => {
                        warn!("Stream error, reconnecting: {err}");
                        break;
                    }
                    Some(Ok(status)) => {
                        if self.state.stop_requested() {
                            return Ok(());
                        }
                        if let Err(err) = self.handle_status(status).await {
                            return Err(self.fail(err).await);
                        }
                    }
                }
            }

            if !self.pause(self.settings.stream_retry_delay).await {
                break;
            }
        }
        Ok(())
    }

    /// Gate on listening, filter, format and enqueue one status.
    ///
    /// Waiting for room in the queue ends early if the relay is stopped.
    pub async fn handle_status(&self, status: Status) -> Result<Disposition, RelayError> {
        if !self.state.is_listening() {
            debug!("Not listening, dropping status {}", status.id);
            return Ok(Disposition::NotListening);
        }
        if let Verdict::Reject(name) = self.outbound.evaluate(&status)? {
            return Ok(Disposition::Rejected(name));
        }
        info!(
            "Relaying status {} from {}",
            status.id,
            self.settings.trusted.display_name(&status.author_id)
        );
        tokio::select! {
            _ = self.token.cancelled() => {
                debug!("Stop requested while the queue is full, dropping status {}", status.id);
                Ok(Disposition::Stopped)
            }
            _ = self.queue.put(format_status(&status)) => Ok(Disposition::Enqueued),
        }
    }
}
