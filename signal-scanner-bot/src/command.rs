//! Control commands and scanner-message classification.

use crate::state::{ListeningState, StateError};
use std::{fmt, str::FromStr};
use tracing::info;

/// Condensed form of the command that turns relaying on
pub const ON_TOKEN: &str = "AUTOSCANON";
/// Condensed form of the command that turns relaying off
pub const OFF_TOKEN: &str = "AUTOSCANOFF";
/// Reply sent when relaying is turned on
pub const ACTIVATED_NOTICE: &str = "==Auto Scanning Activated==";
/// Reply sent when relaying is turned off
pub const DEACTIVATED_NOTICE: &str = "==Auto Scanning Deactivated==";

/// Header tokens that mark a scanner-style message when none are configured
pub const DEFAULT_HEADERS: &[&str] = &[
    "SCANNER",
    "DISPATCH W",
    "DISPATCH E",
    "DISPATCH N",
    "DISPATCH S",
    "DISP W",
    "DISP E",
    "DISP N",
    "DISP S",
    "GROUND",
];

/// Strip everything but letters and digits, and upper-case the rest
pub fn condense(message: &str) -> String {
    message
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// A recognized control command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start relaying microblog statuses to the messaging channel
    On,
    /// Stop relaying
    Off,
}

impl Command {
    /// Recognize a command, ignoring case and punctuation
    pub fn parse(message: &str) -> Option<Self> {
        match condense(message).as_str() {
            ON_TOKEN => Some(Self::On),
            OFF_TOKEN => Some(Self::Off),
            _ => None,
        }
    }

    /// The notice reported back to the sender
    pub fn notice(self) -> &'static str {
        match self {
            Self::On => ACTIVATED_NOTICE,
            Self::Off => DEACTIVATED_NOTICE,
        }
    }
}

/// Interpret a message as a control command.
///
/// On a match the listening state is updated (including the marker file) and the
/// notice to send back is returned. Anything else is left alone.
pub async fn interpret(
    message: &str,
    state: &ListeningState,
) -> Result<Option<&'static str>, StateError> {
    let Some(command) = Command::parse(message) else {
        return Ok(None);
    };
    info!("Received command: {command:?}");
    state.set_listening(command == Command::On).await?;
    Ok(Some(command.notice()))
}

/// The set of header tokens that mark scanner-style messages
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderSet(Vec<String>);

impl HeaderSet {
    /// Build from tokens, upper-casing them and dropping blanks
    pub fn new<S: AsRef<str>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self(
            headers
                .into_iter()
                .map(|h| h.as_ref().trim().to_uppercase())
                .filter(|h| !h.is_empty())
                .collect(),
        )
    }

    /// True if the upper-cased message starts with any header
    pub fn is_scanner_message(&self, message: &str) -> bool {
        let upper = message.to_uppercase();
        self.0.iter().any(|header| upper.starts_with(header.as_str()))
    }
}

impl Default for HeaderSet {
    fn default() -> Self {
        Self::new(DEFAULT_HEADERS)
    }
}

impl FromStr for HeaderSet {
    type Err = String;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let headers = Self::new(src.split(','));
        if headers.0.is_empty() {
            return Err("at least one header is required".into());
        }
        Ok(headers)
    }
}

impl fmt::Display for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}
