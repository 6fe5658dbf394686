//! Error types for twitter-http-client

use displaydoc::Display;
use url::ParseError;

/// Errors that can occur when talking to the Twitter API
#[derive(Debug, Display)]
pub enum Error {
    /// URL: {0}
    Url(ParseError),
    /// Reqwest: {0}
    Reqwest(reqwest::Error),
    /// Stream io: {0}
    Io(std::io::Error),
    /// Json: {0}
    Json(serde_json::Error),
    /// API ({0}): {1}
    Api(u16, String),
    /// Missing data on success response
    MissingData,
}

impl From<reqwest::Error> for Error {
    fn from(src: reqwest::Error) -> Self {
        Self::Reqwest(src)
    }
}

impl From<ParseError> for Error {
    fn from(src: ParseError) -> Self {
        Self::Url(src)
    }
}

impl From<std::io::Error> for Error {
    fn from(src: std::io::Error) -> Self {
        Self::Io(src)
    }
}

impl From<serde_json::Error> for Error {
    fn from(src: serde_json::Error) -> Self {
        Self::Json(src)
    }
}

impl std::error::Error for Error {}
