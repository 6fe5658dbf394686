//! A daily reminder sent to a fixed contact.

use crate::{escalation::Escalation, filter::Clock};
use chrono::{NaiveTime, TimeDelta};
use chrono_tz::Tz;
use signal_cli_client::{MessageTarget, SignalCli, SignalCliError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How often the window is checked, and how long it stays open
const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// True if `now` falls in `[start, start + length)`, wrapping past midnight
pub fn in_window(now: NaiveTime, start: NaiveTime, length: TimeDelta) -> bool {
    let (end, _) = start.overflowing_add_signed(length);
    if start < end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

/// Sends `message` to `contact` once per day, during the hour after `start`
#[derive(Clone, Debug)]
pub struct ComradelyReminder {
    contact: MessageTarget,
    message: String,
    start: NaiveTime,
    tz: Tz,
}

impl ComradelyReminder {
    /// `start` is a wall clock time in `tz`
    pub fn new(contact: MessageTarget, message: String, start: NaiveTime, tz: Tz) -> Self {
        Self {
            contact,
            message,
            start,
            tz,
        }
    }

    /// Check once, sending if inside the window. Returns whether a reminder was sent.
    pub async fn tick(
        &self,
        signal_cli: &dyn SignalCli,
        clock: &dyn Clock,
    ) -> Result<bool, SignalCliError> {
        let now = clock.now().with_timezone(&self.tz).time();
        debug!("Now: {now} | Start: {}", self.start);
        if !in_window(now, self.start, TimeDelta::hours(1)) {
            return Ok(false);
        }
        info!("Sending comradely reminder to {}", self.contact);
        signal_cli.send(&self.message, &self.contact).await?;
        Ok(true)
    }

    /// Check every hour until cancelled. A failed send is escalated and ends this loop only.
    pub async fn run(
        &self,
        signal_cli: &dyn SignalCli,
        escalation: &Escalation,
        clock: &dyn Clock,
        token: &CancellationToken,
    ) -> Result<(), SignalCliError> {
        info!("Starting comradely reminder at {}", self.start);
        loop {
            if let Err(err) = self.tick(signal_cli, clock).await {
                escalation.panic(signal_cli, &err).await;
                return Err(err);
            }
            debug!("Waiting an hour...");
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(CHECK_INTERVAL) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FixedClock;
    use chrono::{TimeZone, Utc};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_in_window() {
        let hour = TimeDelta::hours(1);
        assert!(in_window(t(20, 0), t(20, 0), hour));
        assert!(in_window(t(20, 59), t(20, 0), hour));
        assert!(!in_window(t(21, 0), t(20, 0), hour));
        assert!(!in_window(t(19, 59), t(20, 0), hour));
    }

    #[test]
    fn test_in_window_wraps_midnight() {
        let hour = TimeDelta::hours(1);
        assert!(in_window(t(23, 45), t(23, 30), hour));
        assert!(in_window(t(0, 15), t(23, 30), hour));
        assert!(!in_window(t(0, 30), t(23, 30), hour));
        assert!(!in_window(t(12, 0), t(23, 30), hour));
    }

    #[test]
    fn test_window_uses_configured_zone() {
        let reminder = ComradelyReminder::new(
            MessageTarget::Recipient("+15550001111".into()),
            "hi".into(),
            t(20, 0),
            chrono_tz::America::Los_Angeles,
        );
        // 20:30 in Los Angeles during summer time is 03:30 UTC the next day
        let now = Utc.with_ymd_and_hms(2024, 7, 2, 3, 30, 0).unwrap();
        let local = FixedClock(now).now().with_timezone(&reminder.tz).time();
        assert!(in_window(local, reminder.start, TimeDelta::hours(1)));
    }
}
