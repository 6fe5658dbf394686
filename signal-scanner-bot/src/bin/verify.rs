//! signal-scanner-verify binary - trusts every identity of the bot account that signal-cli reports as untrusted.

#![deny(missing_docs)]

use conf::Conf;
use signal_cli_client::SignalCliProcess;
use signal_scanner_bot::{init_logging::init_logging, verify::trust_everyone};
use std::path::PathBuf;
use tracing::info;

/// Configuration for signal-scanner-verify.
#[derive(Conf, Debug)]
struct VerifyConfig {
    /// Log at debug level, unless RUST_LOG says otherwise
    #[allow(dead_code)] // Read early by init_logging, kept here for --help
    #[conf(long, short = 'd')]
    debug: bool,
    /// Phone number of the bot's signal account
    #[conf(long, env)]
    bot_number: String,
    /// Path to the signal-cli binary
    #[conf(long, env, default_value = "signal-cli")]
    signal_cli_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = VerifyConfig::parse();
    info!("Config = {config:#?}");

    let signal_cli = SignalCliProcess::new(config.signal_cli_path, config.bot_number);
    let trusted = trust_everyone(&signal_cli).await?;
    for identity in &trusted {
        info!("Trusted {}", identity.phone_number);
    }
    Ok(())
}
