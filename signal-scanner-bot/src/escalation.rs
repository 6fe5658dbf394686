//! Best-effort failure notice to the administrator.

use signal_cli_client::{MessageTarget, SignalCli};
use std::error::Error;
use tracing::{error, warn};

/// Render an error and its chain of sources
pub fn describe(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Sends failure notices to a fixed admin contact
#[derive(Clone, Debug)]
pub struct Escalation {
    admin: MessageTarget,
}

impl Escalation {
    /// Notices go to `admin`
    pub fn new(admin: MessageTarget) -> Self {
        Self { admin }
    }

    /// The admin contact
    pub fn admin(&self) -> &MessageTarget {
        &self.admin
    }

    /// Report an unrecoverable error. Failure to deliver the notice is logged and dropped.
    pub async fn panic(&self, signal_cli: &dyn SignalCli, err: &(dyn Error + 'static)) {
        let text = format!("BOT FAILURE: {}", describe(err));
        error!("{text}");
        if let Err(send_err) = signal_cli.send(&text, &self.admin).await {
            warn!("Could not notify admin {}: {send_err}", self.admin);
        }
    }
}
