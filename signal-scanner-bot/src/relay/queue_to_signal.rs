use super::{Relay, RelayError};
use tracing::{debug, info};

impl Relay {
    /// Drain the queue to the listen contact, then wait a fixed interval, until stopped.
    ///
    /// A failed send is fatal and nothing further is drained.
    pub async fn queue_to_signal(&self) -> Result<(), RelayError> {
        info!("Starting queue to signal relay");
        while !self.is_stopping() {
            let mut sent = 0usize;
            while let Some(message) = self.queue.try_get().await {
                if let Err(err) = self
                    .signal_cli
                    .send(&message, &self.settings.listen_contact)
                    .await
                {
                    return Err(self.fail(err.into()).await);
                }
                sent += 1;
            }
            if sent > 0 {
                debug!("Emptied Twitter to Signal queue ({sent} sent)");
            }
            if !self.pause(self.settings.drain_interval).await {
                break;
            }
        }
        Ok(())
    }
}
