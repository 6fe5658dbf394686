//! Radio monitor: watch recent calls on OpenMHz for radios belonging to monitored units.
//!
//! Every lookback interval, calls since `now - lookback` are fetched. The source radios
//! of each call are looked up in a radio-to-officer directory, and officers whose unit
//! description mentions a monitored unit are reported to a fixed contact.

use crate::{escalation::Escalation, filter::Clock};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use signal_cli_client::{MessageTarget, SignalCli, SignalCliError};
use std::{
    collections::{BTreeSet, HashMap},
    future::Future,
    time::Duration,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Errors from the radio monitor
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// An http request failed, after retries
    #[error("radio http: {0}")]
    Http(#[from] reqwest::Error),
    /// Sending the report failed
    #[error(transparent)]
    Signal(#[from] SignalCliError),
}

/// One call from the OpenMHz calls endpoint
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// ISO 8601 time of the call, in UTC
    pub time: String,
    /// Recording url
    pub url: String,
    /// Radios heard on the call
    #[serde(default)]
    pub src_list: Vec<CallSource>,
}

/// A radio heard on a call
#[derive(Clone, Debug, Deserialize)]
pub struct CallSource {
    /// Radio unit number, as a number or a string
    pub src: Value,
}

#[derive(Debug, Deserialize)]
struct CallsResponse {
    calls: Vec<Call>,
}

/// A directory entry for a radio
#[derive(Clone, Debug, Deserialize)]
pub struct Officer {
    /// Officer name
    pub full_name: String,
    /// Badge number, as a number or a string
    pub badge: Value,
    /// Unit the officer is assigned to
    pub unit_description: String,
}

/// Directory id of a radio: `7` followed by the source zero-padded to five digits
pub fn radio_id(src: &Value) -> Option<String> {
    let src = match src {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if src.is_empty() {
        return None;
    }
    Some(format!("7{src:0>5}"))
}

/// True if the unit description mentions any monitored unit, ignoring case
pub fn is_monitored(unit_description: &str, units: &[String]) -> bool {
    let description = unit_description.to_lowercase();
    units
        .iter()
        .any(|unit| description.contains(&unit.to_lowercase()))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a call time in `tz`, e.g. `2021-10-11, 02:20:02 PDT`. Unparseable times are kept as is.
pub fn render_call_time(time: &str, tz: Tz) -> String {
    match DateTime::parse_from_rfc3339(time) {
        Ok(dt) => dt
            .with_timezone(&tz)
            .format("%Y-%m-%d, %I:%M:%S %Z")
            .to_string(),
        Err(err) => {
            debug!("Could not parse call time {time}: {err}");
            time.to_owned()
        }
    }
}

/// Report lines for the monitored officers among `officers`
pub fn format_officers<'a>(
    officers: impl IntoIterator<Item = &'a Officer>,
    units: &[String],
    call_time: &str,
) -> Vec<String> {
    officers
        .into_iter()
        .filter(|officer| {
            let monitored = is_monitored(&officer.unit_description, units);
            if !monitored {
                debug!(
                    "{} ({}) is not in a monitored unit",
                    officer.full_name, officer.unit_description
                );
            }
            monitored
        })
        .map(|officer| {
            format!(
                "{}\n{}\n{}\n{}",
                officer.full_name,
                render_value(&officer.badge),
                officer.unit_description,
                call_time
            )
        })
        .collect()
}

/// Exponential backoff bounded by a total time budget
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    /// Delay before the first retry
    pub initial: Duration,
    /// Growth factor per attempt
    pub multiplier: u32,
    /// Give up once retrying would exceed this much time in total
    pub max_total: Duration,
}

impl Backoff {
    /// Delay before retry number `attempt`, starting at 1
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or the time budget is spent
    pub async fn retry<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    if started.elapsed() + delay > self.max_total {
                        warn!("Giving up after {attempt} attempt(s): {err}");
                        return Err(err);
                    }
                    warn!("Attempt {attempt} failed, retrying in {delay:?}: {err}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Settings of the radio monitor
#[derive(Clone, Debug)]
pub struct RadioMonitorSettings {
    /// OpenMHz calls endpoint
    pub openmhz_url: Url,
    /// Radio directory endpoint
    pub radio_chaser_url: Url,
    /// Unit names to report
    pub units: Vec<String>,
    /// Where reports go
    pub contact: MessageTarget,
    /// Poll interval, and how far back each poll looks
    pub lookback: Duration,
    /// Total time budget for retrying failed requests
    pub backoff: Duration,
    /// Zone for rendering call times
    pub tz: Tz,
}

/// Polls for calls involving monitored units
pub struct RadioMonitor {
    client: Client,
    settings: RadioMonitorSettings,
    backoff: Backoff,
}

impl RadioMonitor {
    /// Create a monitor
    pub fn new(settings: RadioMonitorSettings) -> Result<Self, RadioError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        let backoff = Backoff {
            initial: Duration::from_secs(1),
            multiplier: 2,
            max_total: settings.backoff,
        };
        Ok(Self {
            client,
            settings,
            backoff,
        })
    }

    async fn fetch_calls(&self, since: DateTime<Utc>) -> Result<Vec<Call>, reqwest::Error> {
        let since_ms = since.timestamp_millis().to_string();
        debug!("Lookback is currently set to: {since_ms}");
        let resp: CallsResponse = self
            .client
            .get(self.settings.openmhz_url.clone())
            .query(&[("time", since_ms.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.calls)
    }

    async fn lookup_radios(
        &self,
        radios: &BTreeSet<String>,
    ) -> Result<HashMap<String, Officer>, reqwest::Error> {
        let query: Vec<(&str, &str)> = radios.iter().map(|r| ("radio", r.as_str())).collect();
        self.client
            .get(self.settings.radio_chaser_url.clone())
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Fetch recent calls and build reports: the officer lines and the call url
    pub async fn check_radio_calls(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, RadioError> {
        let lookback = TimeDelta::from_std(self.settings.lookback).unwrap_or(TimeDelta::zero());
        let since = now - lookback;
        let calls = self.backoff.retry(|| self.fetch_calls(since)).await?;

        let mut reports = Vec::new();
        for call in calls {
            let radios: BTreeSet<String> = call
                .src_list
                .iter()
                .filter_map(|s| radio_id(&s.src))
                .collect();
            if radios.is_empty() {
                continue;
            }
            let officers = self.backoff.retry(|| self.lookup_radios(&radios)).await?;
            let call_time = render_call_time(&call.time, self.settings.tz);
            for line in format_officers(officers.values(), &self.settings.units, &call_time) {
                reports.push((line, call.url.clone()));
            }
        }
        if !reports.is_empty() {
            debug!("Interesting radios found: {reports:?}");
        }
        Ok(reports)
    }

    /// Poll every lookback interval until cancelled. A failure is escalated and ends this loop only.
    pub async fn run(
        &self,
        signal_cli: &dyn SignalCli,
        escalation: &Escalation,
        clock: &dyn Clock,
        token: &CancellationToken,
    ) -> Result<(), RadioError> {
        info!(
            "Starting radio monitor for units: {}",
            self.settings.units.join(", ")
        );
        loop {
            if let Err(err) = self.poll(signal_cli, clock).await {
                escalation.panic(signal_cli, &err).await;
                return Err(err);
            }
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.settings.lookback) => {}
            }
        }
    }

    async fn poll(&self, signal_cli: &dyn SignalCli, clock: &dyn Clock) -> Result<(), RadioError> {
        for (report, url) in self.check_radio_calls(clock.now()).await? {
            signal_cli
                .send(&format!("{report}\n{url}"), &self.settings.contact)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_radio_id() {
        assert_eq!(radio_id(&Value::from(1234)).as_deref(), Some("701234"));
        assert_eq!(radio_id(&Value::from(98765)).as_deref(), Some("798765"));
        assert_eq!(radio_id(&Value::from("42")).as_deref(), Some("700042"));
        assert_eq!(radio_id(&Value::Null), None);
    }

    #[test]
    fn test_is_monitored() {
        let units = vec!["swat".to_string(), "Gang Unit".to_string()];
        assert!(is_monitored("West Precinct SWAT", &units));
        assert!(is_monitored("GANG UNIT - NORTH", &units));
        assert!(!is_monitored("Patrol", &units));
    }

    #[test]
    fn test_parse_and_format() {
        let calls: CallsResponse = serde_json::from_str(
            r#"{"calls":[{"time":"2021-10-11T21:20:02.000Z","url":"https://example.com/a.m4a","srcList":[{"src":1234,"pos":0},{"src":"55"}]}]}"#,
        )
        .unwrap();
        let call = &calls.calls[0];
        let radios: BTreeSet<String> = call.src_list.iter().filter_map(|s| radio_id(&s.src)).collect();
        assert_eq!(
            radios.into_iter().collect::<Vec<_>>(),
            vec!["700055", "701234"]
        );

        let officers: HashMap<String, Officer> = serde_json::from_str(
            r#"{
                "701234": {"full_name": "Jane Doe", "badge": 4321, "unit_description": "SWAT Team"},
                "700055": {"full_name": "John Roe", "badge": "1111", "unit_description": "Patrol"}
            }"#,
        )
        .unwrap();
        let time = render_call_time(&call.time, chrono_tz::America::Los_Angeles);
        assert_eq!(time, "2021-10-11, 02:20:02 PDT");
        let lines = format_officers(officers.values(), &["swat".to_string()], &time);
        assert_eq!(
            lines,
            vec!["Jane Doe\n4321\nSWAT Team\n2021-10-11, 02:20:02 PDT".to_string()]
        );
    }

    #[test]
    fn test_backoff_delays() {
        let backoff = Backoff {
            initial: Duration::from_secs(1),
            multiplier: 2,
            max_total: Duration::from_secs(60),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_retry_gives_up() {
        let backoff = Backoff {
            initial: Duration::from_secs(1),
            multiplier: 2,
            max_total: Duration::from_secs(10),
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> = backoff
            .retry(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            })
            .await;
        assert_eq!(result, Err("down".to_string()));
        // Sleeps of 1, 2 and 4 seconds fit in the budget, 8 more would not
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_retry_recovers() {
        let backoff = Backoff {
            initial: Duration::from_secs(1),
            multiplier: 2,
            max_total: Duration::from_secs(10),
        };
        let attempts = AtomicU32::new(0);
        let result = backoff
            .retry(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("flaky")
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result, Ok(7));
    }
}
