use super::{Disposition, Relay, RelayError};
use crate::{
    command,
    filter::Verdict,
    format::{post_thread, render_time},
    record::{InboundRecord, message_timestamp},
};
use futures_util::StreamExt;
use signal_cli_client::{MessageTarget, SignalCliError};
use tracing::{debug, error, info, warn};

impl Relay {
    /// Receive from signal-cli until stopped, handling each record in order.
    ///
    /// A receive that ends without traffic is normal, and is simply reissued.
    /// The signal-cli process is killed on every exit path.
    pub async fn signal_to_twitter(&self) -> Result<(), RelayError> {
        info!("Starting signal to twitter relay");
        while !self.is_stopping() {
            debug!("Listening on signal");
            let mut lines = match self.signal_cli.receive(self.settings.receive_timeout).await {
                Ok(lines) => lines,
                Err(err) => return Err(self.fail(err.into()).await),
            };

            loop {
                let next = tokio::select! {
                    _ = self.token.cancelled() => {
                        info!("Stop requested, killing signal-cli");
                        return Ok(());
                    }
                    next = lines.next() => next,
                };
                let Some(line) = next else {
                    debug!("signal-cli receive finished");
                    break;
                };
                let line = match line {
                    Ok(line) => line,
                    Err(err) => return Err(self.fail(SignalCliError::Io(err).into()).await),
                };
                if line.trim().is_empty() {
                    continue;
                }
                debug!("MESSAGE LINE: {line}");

                let Ok(record) =
                    InboundRecord::from_line(&line).inspect_err(|err| error!("{err}"))
                else {
                    continue;
                };

                if let Err(err) = self.handle_inbound(&record).await {
                    error!("Malformed message: {record:?}");
                    return Err(self.fail(err).await);
                }
                if self.state.stop_requested() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Filter one record, then post it, apply it as a command, or ignore it
    pub async fn handle_inbound(&self, record: &InboundRecord) -> Result<Disposition, RelayError> {
        if let Verdict::Reject(name) = self.inbound.evaluate(record)? {
            return Ok(Disposition::Rejected(name));
        }
        let message = record.require_message()?;

        if self.settings.headers.is_scanner_message(message) {
            let stamp = render_time(message_timestamp(record)?, self.settings.tz);
            let fragments = self.settings.formatter.format(message, Some(&stamp));
            if fragments.len() > self.settings.max_thread_length {
                warn!(
                    "Cannot tweet message, needs {} fragments (max {}): {message}",
                    fragments.len(),
                    self.settings.max_thread_length
                );
                return Ok(Disposition::TooLong(fragments.len()));
            }
            info!("Posting scanner message @ {stamp}: {message}");
            let ids = post_thread(self.microblog.as_ref(), &fragments).await?;
            return Ok(Disposition::Posted(ids));
        }

        if let Some(notice) = command::interpret(message, &self.state).await? {
            let target = reply_target(record)?;
            self.signal_cli.send(notice, &target).await?;
            return Ok(Disposition::Toggled(notice));
        }

        debug!("Ignoring message: {message}");
        Ok(Disposition::Ignored)
    }
}

/// Where to answer a record: its group, or else its sender.
///
/// These ids come from signal-cli itself, so they are not re-validated.
fn reply_target(record: &InboundRecord) -> Result<MessageTarget, SignalCliError> {
    if let Some(group_id) = &record.group_id {
        Ok(MessageTarget::Group(group_id.clone()))
    } else if let Some(sender) = &record.sender_id {
        Ok(MessageTarget::Recipient(sender.clone()))
    } else {
        Err(SignalCliError::InvalidTarget(String::new()))
    }
}
