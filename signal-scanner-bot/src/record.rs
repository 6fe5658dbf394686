//! Inbound records decoded from signal-cli output.
//!
//! Decoding happens once, here. Everything past this point works with
//! [`InboundRecord`] and never with raw json.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use signal_cli_client::{DataMessage, RecvMessage};
use tracing::debug;

/// Errors produced while turning transport output into records
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The line was not a data message. Logged and skipped.
    #[error("Malformed message: {reason}: {raw}")]
    Malformed {
        /// What was wrong with it
        reason: String,
        /// The offending input
        raw: String,
    },
    /// A field required by the relay is absent. Fatal to the pipeline.
    #[error("{field} field is not present in data: {record}")]
    MissingField {
        /// Name of the wire field
        field: &'static str,
        /// Debug rendering of the record
        record: String,
    },
}

/// A message received from the messaging channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InboundRecord {
    /// Message text, `None` when absent or falsy
    pub message: Option<String>,
    /// Send time in epoch milliseconds
    pub timestamp_ms: Option<i64>,
    /// Group the message was sent to
    pub group_id: Option<String>,
    /// Phone number or uuid of the sender
    pub sender_id: Option<String>,
}

impl InboundRecord {
    /// Decode one line of `receive --json` output.
    pub fn from_line(line: &str) -> Result<Self, RecordError> {
        let msg: RecvMessage = serde_json::from_str(line).map_err(|err| RecordError::Malformed {
            reason: err.to_string(),
            raw: line.to_owned(),
        })?;
        Self::from_recv(msg, line)
    }

    /// Decode an already parsed message. `raw` is only used in error messages.
    pub fn from_recv(msg: RecvMessage, raw: &str) -> Result<Self, RecordError> {
        let malformed = |reason: &str| RecordError::Malformed {
            reason: reason.to_owned(),
            raw: raw.to_owned(),
        };
        let envelope = msg.envelope.ok_or_else(|| malformed("no envelope"))?;
        let sender_id = envelope.sender().map(str::to_owned);
        let data = envelope
            .data_message
            .ok_or_else(|| malformed("no dataMessage"))?;
        Ok(Self::from_data_message(data, sender_id))
    }

    /// Build a record from the data message part of an envelope.
    pub fn from_data_message(data: DataMessage, sender_id: Option<String>) -> Self {
        Self {
            message: data.message.as_ref().and_then(truthy_text),
            timestamp_ms: data.timestamp.as_ref().and_then(epoch_millis),
            group_id: data.group_info.and_then(|g| g.group_id),
            sender_id,
        }
    }

    /// The message text, which the relay requires once a record has passed the filters.
    pub fn require_message(&self) -> Result<&str, RecordError> {
        self.message.as_deref().ok_or_else(|| self.missing("message"))
    }

    fn missing(&self, field: &'static str) -> RecordError {
        RecordError::MissingField {
            field,
            record: format!("{self:?}"),
        }
    }
}

/// Read the send time of a record.
///
/// Absence is an error rather than a reason to drop the record.
pub fn message_timestamp(record: &InboundRecord) -> Result<DateTime<Utc>, RecordError> {
    let ms = record
        .timestamp_ms
        .ok_or_else(|| record.missing("timestamp"))?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| record.missing("timestamp"))
}

/// Falsy json values (`null`, `false`, `0`, `""`, empty containers) carry no content.
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn epoch_millis(value: &Value) -> Option<i64> {
    // Only json numbers count, a numeric string is not a timestamp
    let ms = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64));
    if ms.is_none() {
        debug!("Unusable timestamp value: {value}");
    }
    ms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(data: &str) -> String {
        format!(r#"{{"envelope":{{"sourceNumber":"+15550001111","dataMessage":{data}}}}}"#)
    }

    #[test]
    fn test_decode_group_message() {
        let record = InboundRecord::from_line(&line(
            r#"{"message":"SCANNER test call","timestamp":1700000000000,"groupInfo":{"groupId":"G"}}"#,
        ))
        .unwrap();
        assert_eq!(record.message.as_deref(), Some("SCANNER test call"));
        assert_eq!(record.timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(record.group_id.as_deref(), Some("G"));
        assert_eq!(record.sender_id.as_deref(), Some("+15550001111"));
    }

    #[test]
    fn test_falsy_messages_have_no_content() {
        for falsy in [r#""""#, "0", "false", "null", "0.0"] {
            let record = InboundRecord::from_line(&line(&format!(
                r#"{{"message":{falsy},"timestamp":1}}"#
            )))
            .unwrap();
            assert_eq!(record.message, None, "{falsy}");
        }
        let record = InboundRecord::from_line(&line(r#"{"timestamp":1}"#)).unwrap();
        assert_eq!(record.message, None);
    }

    #[test]
    fn test_truthy_non_string_message() {
        let record = InboundRecord::from_line(&line(r#"{"message":42,"timestamp":1}"#)).unwrap();
        assert_eq!(record.message.as_deref(), Some("42"));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            InboundRecord::from_line("not json"),
            Err(RecordError::Malformed { .. })
        ));
        assert!(matches!(
            InboundRecord::from_line(r#"{"account":"+15559990000"}"#),
            Err(RecordError::Malformed { .. })
        ));
        assert!(matches!(
            InboundRecord::from_line(r#"{"envelope":{"sourceNumber":"+15550001111"}}"#),
            Err(RecordError::Malformed { .. })
        ));
    }

    #[test]
    fn test_message_timestamp() {
        let record = InboundRecord {
            timestamp_ms: Some(1_700_000_000_123),
            ..Default::default()
        };
        let ts = message_timestamp(&record).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);

        let record = InboundRecord::from_line(&line(r#"{"message":"x","timestamp":1700000000000.0}"#))
            .unwrap();
        assert_eq!(record.timestamp_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn test_missing_timestamp_is_an_error() {
        let record = InboundRecord::from_line(&line(r#"{"message":"SCANNER x"}"#)).unwrap();
        let err = message_timestamp(&record).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingField {
                field: "timestamp",
                ..
            }
        ));
        assert!(err.to_string().starts_with("timestamp field is not present"));
    }

    #[test]
    fn test_string_timestamp_is_not_numeric() {
        let record = InboundRecord::from_line(&line(
            r#"{"message":"SCANNER x","timestamp":"1700000000000"}"#,
        ))
        .unwrap();
        assert_eq!(record.timestamp_ms, None);
        assert!(matches!(
            message_timestamp(&record),
            Err(RecordError::MissingField {
                field: "timestamp",
                ..
            })
        ));
    }
}
