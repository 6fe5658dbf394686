/// Errors returned by [`SignalCli`](crate::SignalCli) operations.
#[derive(Debug, thiserror::Error)]
pub enum SignalCliError {
    /// The recipient is neither phone-number shaped, a uuid, nor a group id.
    #[error("invalid recipient '{0}': expected a phone number, uuid or group id")]
    InvalidTarget(String),
    /// The subprocess could not be spawned or its pipes failed.
    #[error("signal-cli io error: {0}")]
    Io(#[from] std::io::Error),
    /// The subprocess exited unsuccessfully.
    #[error("signal-cli exited with code {code:?}: {stderr}")]
    ExitStatus {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}
