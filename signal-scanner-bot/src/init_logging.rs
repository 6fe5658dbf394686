//! Logging initialization for signal-scanner-bot

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber and load the dotenv file.
///
/// `RUST_LOG` wins when set. Otherwise the level is `debug` if `DEBUG` or `TESTING`
/// is truthy in the environment or `--debug` / `-d` is on the command line, and `info` if not.
pub fn init_logging() {
    // load dotenv file first, so that DEBUG can come from it
    let dotenv_result = dotenvy::dotenv();

    let default_level = if debug_requested() { "debug" } else { "info" };

    // Build a default tracing subscriber, writing to STDERR
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match dotenv_result {
        Ok(path) => info!("Read dotenv file from: {}", path.display()),
        Err(dotenvy::Error::Io(io_error)) => {
            if matches!(io_error.kind(), std::io::ErrorKind::NotFound) {
                info!("Couldn't find a dotenv file");
            } else {
                panic!("Io error when reading dot env file: {io_error}")
            }
        }
        Err(err) => {
            panic!("Error reading dotenv file: {err}")
        }
    }
}

fn debug_requested() -> bool {
    let flag = |name: &str| {
        std::env::var(name)
            .map(|v| is_truthy(&v))
            .unwrap_or(false)
    };
    flag("DEBUG")
        || flag("TESTING")
        || std::env::args().any(|arg| arg == "--debug" || arg == "-d")
}

pub(crate) fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy(" yes "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
        assert!(!is_truthy("false"));
    }
}
