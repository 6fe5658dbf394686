//! signal-scanner-bot binary - relays scanner alerts from Signal to Twitter, and trusted tweets back.

#![deny(missing_docs)]

use conf::Conf;
use signal_cli_client::SignalCli;
use signal_scanner_bot::{
    Clock, Config, Escalation, ListeningState, RadioMonitor, Relay, SystemClock,
    init_logging::init_logging,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::parse();
    info!("Config = {config:#?}");
    config.validate()?;

    if config.dry_run {
        return Ok(());
    }

    let token = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let signal_cli: Arc<dyn SignalCli> = Arc::new(config.signal.signal_cli());
    let escalation = Escalation::new(config.signal.admin_contact.clone());
    let settings = config.relay_settings();
    let tz = settings.tz;

    let twitter = config.twitter.client()?;
    twitter.follow(&settings.trusted.ids()).await?;
    info!("Following {} trusted accounts", settings.trusted.len());

    let state = Arc::new(ListeningState::load(
        &config.relay.autoscan_state_file_path,
    ));
    info!(
        "Loading Autoscan state: {}",
        if state.is_listening() {
            "Enabled"
        } else {
            "Disabled"
        }
    );

    let reminder = config.reminder.as_ref().map(|r| r.reminder(tz));
    let radio_monitor = config
        .radio
        .as_ref()
        .map(|r| RadioMonitor::new(r.settings(tz)))
        .transpose()?;

    let relay = Relay::new(
        settings,
        signal_cli.clone(),
        Arc::new(twitter),
        state,
        escalation.clone(),
        clock.clone(),
        token.clone(),
    );

    // Listen for ctrl-c
    let thread_token = token.clone();
    tokio::task::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Could not listen for ctrl-c: {err}");
            return;
        }
        warn!("ctrl-c: Stop requested");
        thread_token.cancel();
    });

    let reminder_task = async {
        if let Some(reminder) = &reminder {
            if let Err(err) = reminder
                .run(signal_cli.as_ref(), &escalation, clock.as_ref(), &token)
                .await
            {
                error!("Comradely reminder stopped: {err}");
            }
        }
    };
    let radio_task = async {
        if let Some(radio_monitor) = &radio_monitor {
            if let Err(err) = radio_monitor
                .run(signal_cli.as_ref(), &escalation, clock.as_ref(), &token)
                .await
            {
                error!("Radio monitor stopped: {err}");
            }
        }
    };

    // The relay exits when the token is cancelled, or on a fatal error, which also cancels it.
    let (result, (), ()) = tokio::join!(relay.run(), reminder_task, radio_task);
    result?;
    info!("Relay stopped");
    Ok(())
}
