//! Client for driving [signal-cli](https://github.com/AsamK/signal-cli) as a subprocess.
//!
//! The [`SignalCli`] trait is the seam between the relay and the messaging transport.
//! [`SignalCliProcess`] implements it by invoking the `signal-cli` binary once per
//! operation, and by streaming the JSON output of `signal-cli receive --json`.
//! Tests substitute their own implementation of the trait.

#![deny(missing_docs)]

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::time::Duration;

mod error;
mod identity;
mod messages;
mod process;
mod target;

pub use error::SignalCliError;
pub use identity::{UntrustedIdentity, parse_untrusted_identities};
pub use messages::{DataMessage, Envelope, GroupInfo, RecvMessage};
pub use process::SignalCliProcess;
pub use target::MessageTarget;

/// Raw output lines of a single `receive` invocation.
///
/// The stream ends when the companion process exits, e.g. because its receive
/// timeout elapsed without any traffic.
pub type ReceiveStream = BoxStream<'static, std::io::Result<String>>;

/// Operations the relay needs from the messaging transport.
#[async_trait]
pub trait SignalCli: Send + Sync {
    /// Send a text message to a recipient or group.
    async fn send(&self, message: &str, target: &MessageTarget) -> Result<(), SignalCliError>;

    /// Start receiving messages, waiting at most `timeout` for traffic before the stream ends.
    async fn receive(&self, timeout: Duration) -> Result<ReceiveStream, SignalCliError>;

    /// List the identities known to the account, one line per identity.
    async fn list_identities(&self) -> Result<Vec<String>, SignalCliError>;

    /// Mark the identity of `number` as verified with the given safety number.
    async fn trust_identity(&self, number: &str, safety_number: &str)
    -> Result<(), SignalCliError>;
}
