use crate::SignalCliError;
use regex::Regex;
use std::{fmt, str::FromStr, sync::LazyLock};

static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("valid regex"));
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid regex")
});
static GROUP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]{16,}={0,2}$").expect("valid regex"));

/// Where a message is sent: a single recipient or a group.
///
/// Construction validates the identifier, so a `MessageTarget` always maps to a
/// well-formed signal-cli invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageTarget {
    /// A phone number (`+15551234567`) or account uuid.
    Recipient(String),
    /// A base64 group id.
    Group(String),
}

impl MessageTarget {
    /// Validate `id` as a recipient or as a group id, depending on `is_group`.
    pub fn new(id: impl Into<String>, is_group: bool) -> Result<Self, SignalCliError> {
        let id = id.into();
        if is_group {
            if GROUP_ID.is_match(&id) {
                return Ok(Self::Group(id));
            }
        } else if PHONE_NUMBER.is_match(&id) || UUID.is_match(&id) {
            return Ok(Self::Recipient(id));
        }
        Err(SignalCliError::InvalidTarget(id))
    }

    /// Infer whether `id` names a recipient or a group from its shape.
    ///
    /// Phone numbers and uuids win over group ids, since a short phone number is
    /// also valid base64.
    pub fn detect(id: impl Into<String>) -> Result<Self, SignalCliError> {
        let id = id.into();
        if PHONE_NUMBER.is_match(&id) || UUID.is_match(&id) {
            Ok(Self::Recipient(id))
        } else if GROUP_ID.is_match(&id) {
            Ok(Self::Group(id))
        } else {
            Err(SignalCliError::InvalidTarget(id))
        }
    }

    /// The raw identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Recipient(id) | Self::Group(id) => id,
        }
    }

    /// Whether this target is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub(crate) fn cli_args(&self) -> Vec<&str> {
        match self {
            Self::Recipient(id) => vec![id.as_str()],
            Self::Group(id) => vec!["-g", id.as_str()],
        }
    }
}

impl FromStr for MessageTarget {
    type Err = SignalCliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::detect(s.trim())
    }
}

impl fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipient(id) => write!(f, "{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}
