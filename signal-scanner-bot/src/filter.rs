//! Filter chains: ordered, named predicates that decide whether a record is relayed.
//!
//! A predicate returns `true` to reject. Evaluation stops at the first rejection.
//! Predicates may fail only on genuine contract violations (e.g. a record without a
//! timestamp), never as a way to say "no match".

use crate::{
    record::{InboundRecord, RecordError, message_timestamp},
    status::Status,
    trusted::TrustedSenderSet,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// The marker that starts the text of a manual retweet
pub const RETWEET_PREFIX: &str = "RT @";

/// Source of the current time, injectable for tests
pub trait Clock: Send + Sync {
    /// The current time
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Outcome of evaluating a filter chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Every predicate passed
    Pass,
    /// Rejected by the named predicate
    Reject(&'static str),
}

impl Verdict {
    /// True if the record should be relayed
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

type Predicate<R> = Box<dyn Fn(&R) -> Result<bool, RecordError> + Send + Sync>;

/// An ordered sequence of named reject-predicates over records of type `R`
pub struct FilterChain<R> {
    predicates: Vec<(&'static str, Predicate<R>)>,
}

impl<R> Default for FilterChain<R> {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }
}

impl<R> FilterChain<R> {
    /// Append an infallible predicate
    pub fn with(
        self,
        name: &'static str,
        predicate: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with_fallible(name, move |r| Ok(predicate(r)))
    }

    /// Append a predicate that may fail on a contract violation
    pub fn with_fallible(
        mut self,
        name: &'static str,
        predicate: impl Fn(&R) -> Result<bool, RecordError> + Send + Sync + 'static,
    ) -> Self {
        self.predicates.push((name, Box::new(predicate)));
        self
    }

    /// Names of the predicates, in evaluation order
    pub fn names(&self) -> Vec<&'static str> {
        self.predicates.iter().map(|(name, _)| *name).collect()
    }

    /// Run the chain over a record, stopping at the first rejection
    pub fn evaluate(&self, record: &R) -> Result<Verdict, RecordError> {
        for (name, predicate) in &self.predicates {
            if predicate(record)? {
                debug!("Rejected by filter: {name}");
                return Ok(Verdict::Reject(name));
            }
        }
        Ok(Verdict::Pass)
    }
}

/// Reject records without message content
pub fn no_content(record: &InboundRecord) -> bool {
    record.message.as_deref().is_none_or(str::is_empty)
}

/// With a listen scope configured, reject records that carry no group
pub fn missing_scope(record: &InboundRecord, listen_scope: Option<&str>) -> bool {
    listen_scope.is_some() && record.group_id.is_none()
}

/// With a listen scope configured, reject records from any other group
pub fn wrong_scope(record: &InboundRecord, listen_scope: Option<&str>) -> bool {
    match (listen_scope, record.group_id.as_deref()) {
        (Some(scope), Some(group_id)) => scope != group_id,
        _ => false,
    }
}

/// True if `timestamp` is strictly more than `window` older than `now`
pub fn is_stale(timestamp: DateTime<Utc>, now: DateTime<Utc>, window: TimeDelta) -> bool {
    now - timestamp > window
}

/// Reject records older than the staleness window. Fails if the record has no timestamp.
pub fn not_recent(
    record: &InboundRecord,
    clock: &dyn Clock,
    window: TimeDelta,
) -> Result<bool, RecordError> {
    let timestamp = message_timestamp(record)?;
    Ok(is_stale(timestamp, clock.now(), window))
}

/// Reject statuses whose author is not trusted
pub fn untrusted_author(status: &Status, trusted: &TrustedSenderSet) -> bool {
    !trusted.contains(&status.author_id)
}

/// Reject statuses that look like a manual retweet
pub fn retweet_text(status: &Status) -> bool {
    status.text.starts_with(RETWEET_PREFIX)
}

/// Reject statuses the platform flags as retweets
pub fn retweet_flag(status: &Status) -> bool {
    status.is_retweet
}

/// With receive hashtags configured, reject statuses carrying none of them
pub fn missing_receive_hashtag(status: &Status, receive_hashtags: &[String]) -> bool {
    if receive_hashtags.is_empty() {
        return false;
    }
    !status.hashtags.iter().any(|tag| {
        receive_hashtags
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(tag))
    })
}

/// The chain applied to records from the messaging channel
pub fn inbound_chain(
    listen_scope: Option<String>,
    staleness_window: Duration,
    clock: Arc<dyn Clock>,
) -> FilterChain<InboundRecord> {
    let window = TimeDelta::from_std(staleness_window).unwrap_or(TimeDelta::MAX);
    let scope_a = listen_scope.clone();
    let scope_b = listen_scope;
    FilterChain::default()
        .with("no_content", no_content)
        .with("missing_scope", move |r| missing_scope(r, scope_a.as_deref()))
        .with("wrong_scope", move |r| wrong_scope(r, scope_b.as_deref()))
        .with_fallible("not_recent", move |r| not_recent(r, clock.as_ref(), window))
}

/// The chain applied to statuses from the microblog stream
pub fn outbound_chain(
    trusted: Arc<TrustedSenderSet>,
    reject_retweet_flag: bool,
    receive_hashtags: Vec<String>,
) -> FilterChain<Status> {
    let mut chain = FilterChain::default()
        .with("untrusted_author", move |s| untrusted_author(s, &trusted))
        .with("retweet_text", retweet_text);
    if reject_retweet_flag {
        chain = chain.with("retweet_flag", retweet_flag);
    }
    chain.with("missing_receive_hashtag", move |s| {
        missing_receive_hashtag(s, &receive_hashtags)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(message: Option<&str>, group: Option<&str>, age: TimeDelta) -> InboundRecord {
        InboundRecord {
            message: message.map(str::to_owned),
            timestamp_ms: Some((now() - age).timestamp_millis()),
            group_id: group.map(str::to_owned),
            sender_id: Some("+15550001111".into()),
        }
    }

    fn chain(scope: Option<&str>) -> FilterChain<InboundRecord> {
        inbound_chain(
            scope.map(str::to_owned),
            Duration::from_secs(300),
            Arc::new(FixedClock(now())),
        )
    }

    #[test]
    fn test_no_content() {
        assert!(no_content(&record(None, None, TimeDelta::zero())));
        assert!(no_content(&record(Some(""), None, TimeDelta::zero())));
        assert!(!no_content(&record(Some("hi"), None, TimeDelta::zero())));
    }

    #[test]
    fn test_scope_predicates() {
        let in_group = record(Some("x"), Some("G"), TimeDelta::zero());
        let other_group = record(Some("x"), Some("H"), TimeDelta::zero());
        let direct = record(Some("x"), None, TimeDelta::zero());

        assert!(!missing_scope(&in_group, Some("G")));
        assert!(missing_scope(&direct, Some("G")));
        assert!(!missing_scope(&direct, None));

        assert!(!wrong_scope(&in_group, Some("G")));
        assert!(wrong_scope(&other_group, Some("G")));
        assert!(!wrong_scope(&other_group, None));
        assert!(!wrong_scope(&direct, Some("G")));
    }

    #[test]
    fn test_staleness_boundary() {
        let window = TimeDelta::minutes(5);
        assert!(!is_stale(now() - window, now(), window));
        assert!(is_stale(
            now() - window - TimeDelta::milliseconds(1),
            now(),
            window
        ));
        assert!(!is_stale(now(), now(), window));
        // Messages from the future are never stale
        assert!(!is_stale(now() + TimeDelta::minutes(10), now(), window));
    }

    #[test]
    fn test_inbound_chain_order_and_verdicts() {
        let chain = chain(Some("G"));
        assert_eq!(
            chain.names(),
            vec!["no_content", "missing_scope", "wrong_scope", "not_recent"]
        );

        let fresh = record(Some("SCANNER test"), Some("G"), TimeDelta::seconds(10));
        assert_eq!(chain.evaluate(&fresh).unwrap(), Verdict::Pass);

        let empty = record(None, Some("G"), TimeDelta::zero());
        assert_eq!(chain.evaluate(&empty).unwrap(), Verdict::Reject("no_content"));

        let direct = record(Some("x"), None, TimeDelta::zero());
        assert_eq!(
            chain.evaluate(&direct).unwrap(),
            Verdict::Reject("missing_scope")
        );

        let elsewhere = record(Some("x"), Some("H"), TimeDelta::zero());
        assert_eq!(
            chain.evaluate(&elsewhere).unwrap(),
            Verdict::Reject("wrong_scope")
        );

        let old = record(Some("x"), Some("G"), TimeDelta::minutes(6));
        assert_eq!(chain.evaluate(&old).unwrap(), Verdict::Reject("not_recent"));
    }

    #[test]
    fn test_missing_timestamp_fails_chain() {
        let mut r = record(Some("x"), Some("G"), TimeDelta::zero());
        r.timestamp_ms = None;
        assert!(matches!(
            chain(Some("G")).evaluate(&r),
            Err(RecordError::MissingField { .. })
        ));
        // Earlier predicates still short-circuit before the timestamp is read
        r.message = None;
        assert_eq!(
            chain(Some("G")).evaluate(&r).unwrap(),
            Verdict::Reject("no_content")
        );
    }

    fn status(author: &str, text: &str, is_retweet: bool, tags: &[&str]) -> Status {
        Status {
            id: "1".into(),
            text: text.into(),
            author_id: author.into(),
            is_retweet,
            hashtags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_outbound_predicates() {
        let trusted: TrustedSenderSet = "42".parse().unwrap();
        assert!(!untrusted_author(&status("42", "x", false, &[]), &trusted));
        assert!(untrusted_author(&status("43", "x", false, &[]), &trusted));

        assert!(retweet_text(&status("42", "RT @foo: hi", false, &[])));
        assert!(!retweet_text(&status("42", "hi RT @foo", false, &[])));
        assert!(retweet_flag(&status("42", "hi", true, &[])));

        let wanted = vec!["seattleprotestcomms".to_string()];
        assert!(!missing_receive_hashtag(
            &status("42", "x", false, &["SeattleProtestComms"]),
            &wanted
        ));
        assert!(missing_receive_hashtag(
            &status("42", "x", false, &["Other"]),
            &wanted
        ));
        assert!(!missing_receive_hashtag(&status("42", "x", false, &[]), &[]));
    }

    #[test]
    fn test_outbound_chain_retweet_flag_is_configurable() {
        let trusted: Arc<TrustedSenderSet> = Arc::new("42".parse().unwrap());
        let flagged = status("42", "plain text", true, &[]);

        let strict = outbound_chain(trusted.clone(), true, vec![]);
        assert_eq!(
            strict.evaluate(&flagged).unwrap(),
            Verdict::Reject("retweet_flag")
        );

        let lenient = outbound_chain(trusted, false, vec![]);
        assert!(!lenient.names().contains(&"retweet_flag"));
        assert_eq!(lenient.evaluate(&flagged).unwrap(), Verdict::Pass);
        assert_eq!(
            lenient
                .evaluate(&status("7", "plain text", false, &[]))
                .unwrap(),
            Verdict::Reject("untrusted_author")
        );
    }
}
