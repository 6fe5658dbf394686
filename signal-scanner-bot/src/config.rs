//! Configuration, read from command line flags and environment variables.
//!
//! Every setting is available as `--kebab-case` flag and as `SCREAMING_CASE` env var.

use crate::{
    command::HeaderSet,
    format::ThreadFormatter,
    radio_monitor::RadioMonitorSettings,
    relay::RelaySettings,
    reminder::ComradelyReminder,
    trusted::TrustedSenderSet,
};
use chrono::NaiveTime;
use chrono_tz::Tz;
use conf::Conf;
use signal_cli_client::{MessageTarget, SignalCliProcess};
use std::{convert::Infallible, fmt, path::PathBuf, str::FromStr, sync::Arc, time::Duration};
use tracing::warn;
use twitter_http_client::TwitterClient;
use url::Url;

/// Top-level configuration for signal-scanner-bot.
#[derive(Conf, Debug)]
pub struct Config {
    /// Log at debug level, unless RUST_LOG says otherwise
    #[conf(long, short = 'd')]
    pub debug: bool,
    /// If true, just validate config and don't start
    #[conf(long)]
    pub dry_run: bool,
    /// Signal account and transport
    #[conf(flatten)]
    pub signal: SignalConfig,
    /// Relay behavior
    #[conf(flatten)]
    pub relay: RelayConfig,
    /// Twitter api access
    #[conf(flatten)]
    pub twitter: TwitterConfig,
    /// Daily reminder, if configured
    #[conf(flatten)]
    pub reminder: Option<ReminderConfig>,
    /// Radio monitor, if configured
    #[conf(flatten)]
    pub radio: Option<RadioConfig>,
}

impl Config {
    /// Check the settings that depend on each other
    pub fn validate(&self) -> Result<(), String> {
        let relay = &self.relay;
        if relay.tweet_padding >= relay.tweet_max_length {
            return Err(format!(
                "TWEET_PADDING ({}) must be less than TWEET_MAX_LENGTH ({})",
                relay.tweet_padding, relay.tweet_max_length
            ));
        }
        if relay.max_thread_length == 0 {
            return Err("MAX_THREAD_LENGTH must be at least 1".into());
        }
        if relay.trusted_tweeters.is_empty() {
            warn!("TRUSTED_TWEETERS is empty, no statuses will be relayed to signal");
        }
        if let Some(radio) = &self.radio {
            if radio.radio_monitor_units.is_empty() {
                return Err("RADIO_MONITOR_UNITS must name at least one unit".into());
            }
        }
        Ok(())
    }

    /// Settings for the relay, built from the signal, relay and twitter sections
    pub fn relay_settings(&self) -> RelaySettings {
        let relay = &self.relay;
        RelaySettings {
            listen_scope: relay.listen_group.clone(),
            listen_contact: relay.listen_contact.clone(),
            receive_timeout: self.signal.signal_timeout,
            staleness_window: relay.staleness_window,
            headers: relay.signal_message_headers.clone().unwrap_or_default(),
            formatter: ThreadFormatter::new(
                relay.tweet_max_length,
                relay.tweet_padding,
                relay.send_hashtags.as_slice(),
            ),
            tz: relay.default_tz,
            max_thread_length: relay.max_thread_length,
            trusted: Arc::new(relay.trusted_tweeters.clone()),
            reject_retweet_flag: relay.reject_retweet_flag.unwrap_or(true),
            receive_hashtags: relay.receive_hashtags.clone(),
            queue_capacity: relay.queue_capacity,
            drain_interval: relay.queue_drain_interval,
            stream_retry_delay: self.twitter.stream_retry_delay,
        }
    }
}

/// Signal account and the signal-cli binary driving it
#[derive(Conf, Debug)]
pub struct SignalConfig {
    /// Phone number of the bot's signal account
    #[conf(long, env)]
    pub bot_number: String,
    /// Recipient or group that receives failure notices
    #[conf(long, env)]
    pub admin_contact: MessageTarget,
    /// Path to the signal-cli binary
    #[conf(long, env, default_value = "signal-cli")]
    pub signal_cli_path: PathBuf,
    /// How long one receive waits for traffic
    #[conf(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub signal_timeout: Duration,
}

impl SignalConfig {
    /// The signal-cli adapter for the bot account
    pub fn signal_cli(&self) -> SignalCliProcess {
        SignalCliProcess::new(&self.signal_cli_path, &self.bot_number)
    }
}

/// Filtering, formatting and delivery settings of the relay
#[derive(Conf, Debug)]
pub struct RelayConfig {
    /// Group id inbound messages must come from. Unset accepts any source.
    #[conf(long, env)]
    pub listen_group: Option<String>,
    /// Recipient or group that relayed statuses are sent to
    #[conf(long, env)]
    pub listen_contact: MessageTarget,
    /// Inbound messages older than this are dropped
    #[conf(long, env, default_value = "5m", value_parser = humantime::parse_duration)]
    pub staleness_window: Duration,
    /// Numeric twitter account ids whose statuses are relayed.
    /// Either a comma separated list, or json (a list, or a map of id to display name).
    #[conf(long, env)]
    pub trusted_tweeters: TrustedSenderSet,
    /// Hashtags appended to every post, comma separated
    #[conf(long, env, default_value = "", value_parser = parse_list)]
    pub send_hashtags: Vec<String>,
    /// If set, statuses need one of these hashtags to be relayed, comma separated
    #[conf(long, env, default_value = "", value_parser = parse_receive_hashtags)]
    pub receive_hashtags: Vec<String>,
    /// Headers marking scanner-style messages, comma separated
    #[conf(long, env)]
    pub signal_message_headers: Option<HeaderSet>,
    /// Marker file, present while relaying to signal is on
    #[conf(long, env)]
    pub autoscan_state_file_path: PathBuf,
    /// Zone used to render message times
    #[conf(long, env, default_value = "America/Los_Angeles")]
    pub default_tz: Tz,
    /// Maximum length of a single post
    #[conf(long, env, default_value = "280")]
    pub tweet_max_length: usize,
    /// Room left free in each post of a thread
    #[conf(long, env, default_value = "20")]
    pub tweet_padding: usize,
    /// Messages needing more posts than this are not posted
    #[conf(long, env, default_value = "10")]
    pub max_thread_length: usize,
    /// Also reject statuses flagged as retweets by the platform (default true)
    #[conf(long, env, value_parser = parse_switch)]
    pub reject_retweet_flag: Option<bool>,
    /// Capacity of the queue of statuses waiting for delivery to signal
    #[conf(long, env, default_value = "10000")]
    pub queue_capacity: usize,
    /// Pause between deliveries of queued statuses
    #[conf(long, env, default_value = "1s", value_parser = humantime::parse_duration)]
    pub queue_drain_interval: Duration,
}

/// Twitter api access
#[derive(Conf, Debug)]
pub struct TwitterConfig {
    /// Base url of the twitter api
    #[conf(long, env, default_value = "https://api.twitter.com/")]
    pub twitter_api_url: Url,
    /// App-only bearer token, used for the filtered stream and its rules
    #[conf(long, env)]
    pub twitter_bearer_token: Secret,
    /// User-context token of the bot account, used for posting
    #[conf(long, env)]
    pub twitter_user_token: Secret,
    /// Pause before reconnecting a dropped stream
    #[conf(long, env, default_value = "5s", value_parser = humantime::parse_duration)]
    pub stream_retry_delay: Duration,
}

impl TwitterConfig {
    /// The twitter api client
    pub fn client(&self) -> Result<TwitterClient, twitter_http_client::Error> {
        TwitterClient::new(
            self.twitter_api_url.clone(),
            self.twitter_bearer_token.expose(),
            self.twitter_user_token.expose(),
        )
    }
}

/// A daily message sent to a fixed contact
#[derive(Conf, Debug)]
pub struct ReminderConfig {
    /// Recipient or group of the reminder
    #[conf(long, env)]
    pub comradely_contact: MessageTarget,
    /// Text of the reminder
    #[conf(long, env)]
    pub comradely_message: String,
    /// Local time at which the reminder window opens
    #[conf(long, env, default_value = "20:00:00")]
    pub comradely_time: NaiveTime,
}

impl ReminderConfig {
    /// The reminder poller, with times in `tz`
    pub fn reminder(&self, tz: Tz) -> ComradelyReminder {
        ComradelyReminder::new(
            self.comradely_contact.clone(),
            self.comradely_message.clone(),
            self.comradely_time,
            tz,
        )
    }
}

/// Radio monitor endpoints and the units it watches
#[derive(Conf, Debug)]
pub struct RadioConfig {
    /// OpenMHz calls endpoint
    #[conf(long, env)]
    pub openmhz_url: Url,
    /// Radio lookup endpoint
    #[conf(long, env)]
    pub radio_chaser_url: Url,
    /// Unit descriptions to watch for, comma separated
    #[conf(long, env, value_parser = parse_list)]
    pub radio_monitor_units: Vec<String>,
    /// Recipient or group of the radio reports
    #[conf(long, env)]
    pub radio_monitor_contact: MessageTarget,
    /// How far back each poll looks, and how often it runs
    #[conf(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub radio_monitor_lookback: Duration,
    /// Total time allowed for retrying a failed request
    #[conf(long, env, default_value = "60s", value_parser = humantime::parse_duration)]
    pub radio_chaser_backoff: Duration,
}

impl RadioConfig {
    /// Monitor settings, with times rendered in `tz`
    pub fn settings(&self, tz: Tz) -> RadioMonitorSettings {
        RadioMonitorSettings {
            openmhz_url: self.openmhz_url.clone(),
            radio_chaser_url: self.radio_chaser_url.clone(),
            units: self.radio_monitor_units.clone(),
            contact: self.radio_monitor_contact.clone(),
            lookback: self.radio_monitor_lookback,
            backoff: self.radio_chaser_backoff,
            tz,
        }
    }
}

/// A credential, redacted in debug output
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// The credential itself
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl FromStr for Secret {
    type Err = Infallible;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        Ok(Self(src.trim().to_owned()))
    }
}

/// Split a comma separated list, dropping blank entries
fn parse_list(src: &str) -> Result<Vec<String>, String> {
    Ok(src
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Like `parse_list`, but a leading `#` is stripped with a warning
fn parse_receive_hashtags(src: &str) -> Result<Vec<String>, String> {
    Ok(parse_list(src)?
        .into_iter()
        .map(|tag| match tag.strip_prefix('#') {
            Some(stripped) => {
                warn!("Receive hashtag '{tag}' should not start with '#', using '{stripped}'");
                stripped.to_owned()
            }
            None => tag,
        })
        .filter(|tag| !tag.is_empty())
        .collect())
}

fn parse_switch(src: &str) -> Result<bool, String> {
    match src.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected true or false, found '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "aGVsbG8gd29ybGQgZ3JvdXA=";

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("BOT_NUMBER", "+15550001111"),
            ("ADMIN_CONTACT", "+15550002222"),
            ("LISTEN_CONTACT", GROUP),
            ("TRUSTED_TWEETERS", "123,456"),
            ("AUTOSCAN_STATE_FILE_PATH", "/tmp/autoscan"),
            ("TWITTER_BEARER_TOKEN", "app-token"),
            ("TWITTER_USER_TOKEN", "user-token"),
        ]
    }

    fn parse(env: Vec<(&str, &str)>) -> Result<Config, String> {
        Config::try_parse_from::<&str, &str, &str>(vec!["signal-scanner-bot"], env)
            .map_err(|err| err.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = parse(required()).unwrap();
        assert!(!config.dry_run);
        assert_eq!(config.signal.signal_cli_path, PathBuf::from("signal-cli"));
        assert_eq!(config.signal.signal_timeout, Duration::from_secs(10));
        assert_eq!(config.relay.staleness_window, Duration::from_secs(300));
        assert_eq!(config.relay.default_tz, chrono_tz::America::Los_Angeles);
        assert!(config.relay.listen_group.is_none());
        assert!(config.reminder.is_none());
        assert!(config.radio.is_none());

        let settings = config.relay_settings();
        assert!(settings.listen_contact.is_group());
        assert!(settings.reject_retweet_flag);
        assert_eq!(settings.queue_capacity, 10000);
        assert_eq!(settings.max_thread_length, 10);
        assert_eq!(settings.drain_interval, Duration::from_secs(1));
        assert_eq!(settings.stream_retry_delay, Duration::from_secs(5));
        assert!(settings.headers.is_scanner_message("SCANNER: fire on 5th"));
        assert_eq!(settings.trusted.ids(), vec!["123", "456"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required() {
        let mut env = required();
        env.retain(|(k, _)| *k != "BOT_NUMBER");
        assert!(parse(env).is_err());
    }

    #[test]
    fn test_handle_rejected() {
        let mut env = required();
        env.retain(|(k, _)| *k != "TRUSTED_TWEETERS");
        env.push(("TRUSTED_TWEETERS", "@someone"));
        assert!(parse(env).is_err());
    }

    #[test]
    fn test_invalid_contact_rejected() {
        let mut env = required();
        env.retain(|(k, _)| *k != "ADMIN_CONTACT");
        env.push(("ADMIN_CONTACT", "not a number"));
        assert!(parse(env).is_err());
    }

    #[test]
    fn test_hashtags_and_switches() {
        let mut env = required();
        env.extend([
            ("SEND_HASHTAGS", "scanner, pdx ,"),
            ("RECEIVE_HASHTAGS", "#Alert,news"),
            ("REJECT_RETWEET_FLAG", "false"),
            ("SIGNAL_MESSAGE_HEADERS", "RADIO,CALLOUT"),
            ("STALENESS_WINDOW", "90s"),
        ]);
        let config = parse(env).unwrap();
        assert_eq!(config.relay.send_hashtags, vec!["scanner", "pdx"]);
        assert_eq!(config.relay.receive_hashtags, vec!["Alert", "news"]);

        let settings = config.relay_settings();
        assert!(!settings.reject_retweet_flag);
        assert_eq!(settings.formatter.hashtag_block(), "#scanner #pdx");
        assert!(settings.headers.is_scanner_message("RADIO 12"));
        assert!(!settings.headers.is_scanner_message("SCANNER 12"));
        assert_eq!(settings.staleness_window, Duration::from_secs(90));
    }

    #[test]
    fn test_optional_sections() {
        let mut env = required();
        env.extend([
            ("COMRADELY_CONTACT", "+15550003333"),
            ("COMRADELY_MESSAGE", "drink water"),
            ("OPENMHZ_URL", "https://api.openmhz.com/kcers1b/calls"),
            ("RADIO_CHASER_URL", "https://radio.example.com/lookup"),
            ("RADIO_MONITOR_UNITS", "SWAT,CRT"),
            ("RADIO_MONITOR_CONTACT", GROUP),
        ]);
        let config = parse(env).unwrap();

        let reminder = config.reminder.as_ref().unwrap();
        assert_eq!(
            reminder.comradely_time,
            NaiveTime::from_hms_opt(20, 0, 0).unwrap()
        );

        let radio = config.radio.as_ref().unwrap();
        let settings = radio.settings(config.relay.default_tz);
        assert_eq!(settings.units, vec!["SWAT", "CRT"]);
        assert_eq!(settings.lookback, Duration::from_secs(30));
        assert_eq!(settings.backoff, Duration::from_secs(60));
        assert!(settings.contact.is_group());
    }

    #[test]
    fn test_validate_padding() {
        let mut env = required();
        env.extend([("TWEET_MAX_LENGTH", "20"), ("TWEET_PADDING", "20")]);
        let config = parse(env).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_redacted() {
        let config = parse(required()).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("app-token"));
        assert!(!debug.contains("user-token"));
        assert_eq!(config.twitter.twitter_bearer_token.expose(), "app-token");
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("On"), Ok(true));
        assert_eq!(parse_switch("0"), Ok(false));
        assert!(parse_switch("maybe").is_err());
    }
}
