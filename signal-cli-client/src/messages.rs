//! Wire types for the JSON lines printed by `signal-cli receive --json`.
//!
//! Every field is optional at this layer. Deciding which fields a relay requires
//! happens one level up, when a [`DataMessage`] is turned into a validated record.

use serde::Deserialize;
use serde_json::Value;

/// One line of `receive --json` output.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecvMessage {
    /// The envelope, absent for some housekeeping lines.
    pub envelope: Option<Envelope>,
    /// The account that received the message.
    pub account: Option<String>,
}

/// Envelope around a received message.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Legacy sender field (phone number or uuid).
    pub source: Option<String>,
    /// Sender phone number, when known.
    pub source_number: Option<String>,
    /// Sender uuid.
    pub source_uuid: Option<String>,
    /// Envelope timestamp in epoch milliseconds.
    pub timestamp: Option<u64>,
    /// Present when the envelope carries a user-visible message.
    pub data_message: Option<DataMessage>,
}

impl Envelope {
    /// The best available identifier for the sender.
    pub fn sender(&self) -> Option<&str> {
        self.source_number
            .as_deref()
            .or(self.source_uuid.as_deref())
            .or(self.source.as_deref())
    }
}

/// The content of a data message.
///
/// `message` and `timestamp` are kept as raw json values because signal-cli
/// output is not the only producer of these records, and the relay treats
/// falsy values (`0`, `false`, `""`) as "no content" rather than as decode errors.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    /// Message body.
    pub message: Option<Value>,
    /// Send timestamp in epoch milliseconds.
    pub timestamp: Option<Value>,
    /// Group the message was sent to, if any.
    pub group_info: Option<GroupInfo>,
}

/// Group metadata attached to a data message.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    /// Base64 group id.
    pub group_id: Option<String>,
    /// Delivery type, e.g. `DELIVER`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}
