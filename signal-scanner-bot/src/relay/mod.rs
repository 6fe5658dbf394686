//! The relay between signal and the microblog.
//!
//! Three loops run concurrently and share the [`ListeningState`]:
//! - signal to microblog: scanner-style messages are posted, commands toggle listening
//! - microblog to queue: statuses from trusted authors are formatted and enqueued
//! - queue to signal: the queue is drained to the listen contact
//!
//! An error escaping the handling of one record is fatal. It is escalated to the admin,
//! sets `stop_requested`, cancels the shared token, and ends the loop with `Err`.

use crate::{
    command::HeaderSet,
    escalation::Escalation,
    filter::{Clock, FilterChain, inbound_chain, outbound_chain},
    format::ThreadFormatter,
    microblog::{Microblog, MicroblogError},
    queue::DeliveryQueue,
    record::{InboundRecord, RecordError},
    state::{ListeningState, StateError},
    status::Status,
    trusted::TrustedSenderSet,
};
use chrono_tz::Tz;
use signal_cli_client::{MessageTarget, SignalCli, SignalCliError};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod queue_to_signal;
mod signal_to_twitter;
mod twitter_to_queue;

/// Errors that stop a relay loop
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A record broke the contract the relay relies on
    #[error(transparent)]
    Record(#[from] RecordError),
    /// The listening marker could not be updated
    #[error(transparent)]
    State(#[from] StateError),
    /// The messaging transport failed
    #[error(transparent)]
    Signal(#[from] SignalCliError),
    /// The microblog transport failed
    #[error("microblog: {0}")]
    Microblog(#[from] MicroblogError),
}

/// What happened to one record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Dropped by the named filter
    Rejected(&'static str),
    /// Posted as a thread, ids in order
    Posted(Vec<String>),
    /// Would need more fragments than allowed, dropped
    TooLong(usize),
    /// A command changed the listening state, and this notice was sent back
    Toggled(&'static str),
    /// Neither scanner-style nor a command
    Ignored,
    /// Relaying to signal is turned off
    NotListening,
    /// Formatted and placed on the delivery queue
    Enqueued,
    /// The relay stopped before the record could be handled
    Stopped,
}

/// Runtime settings of the relay
#[derive(Clone, Debug)]
pub struct RelaySettings {
    /// Group that inbound messages must come from, if any
    pub listen_scope: Option<String>,
    /// Destination of relayed statuses
    pub listen_contact: MessageTarget,
    /// How long one signal-cli receive waits for traffic
    pub receive_timeout: Duration,
    /// Messages older than this are dropped
    pub staleness_window: Duration,
    /// Headers marking scanner-style messages
    pub headers: HeaderSet,
    /// Thread splitting for posts
    pub formatter: ThreadFormatter,
    /// Zone used when rendering message times
    pub tz: Tz,
    /// Longest thread that will be posted
    pub max_thread_length: usize,
    /// Authors whose statuses are relayed
    pub trusted: Arc<TrustedSenderSet>,
    /// Also reject statuses the platform flags as retweets
    pub reject_retweet_flag: bool,
    /// If non-empty, statuses need one of these hashtags
    pub receive_hashtags: Vec<String>,
    /// Capacity of the delivery queue
    pub queue_capacity: usize,
    /// Pause between queue drains
    pub drain_interval: Duration,
    /// Pause before reconnecting to the stream
    pub stream_retry_delay: Duration,
}

/// The relay, shared by its three loops
pub struct Relay {
    settings: RelaySettings,
    signal_cli: Arc<dyn SignalCli>,
    microblog: Arc<dyn Microblog>,
    state: Arc<ListeningState>,
    queue: DeliveryQueue<String>,
    escalation: Escalation,
    inbound: FilterChain<InboundRecord>,
    outbound: FilterChain<Status>,
    token: CancellationToken,
}

impl Relay {
    /// Create a relay. `clock` is used by the staleness filter.
    pub fn new(
        settings: RelaySettings,
        signal_cli: Arc<dyn SignalCli>,
        microblog: Arc<dyn Microblog>,
        state: Arc<ListeningState>,
        escalation: Escalation,
        clock: Arc<dyn Clock>,
        token: CancellationToken,
    ) -> Self {
        let inbound = inbound_chain(
            settings.listen_scope.clone(),
            settings.staleness_window,
            clock,
        );
        let outbound = outbound_chain(
            settings.trusted.clone(),
            settings.reject_retweet_flag,
            settings.receive_hashtags.clone(),
        );
        let queue = DeliveryQueue::new(settings.queue_capacity);
        Self {
            settings,
            signal_cli,
            microblog,
            state,
            queue,
            escalation,
            inbound,
            outbound,
            token,
        }
    }

    /// The shared listening state
    pub fn state(&self) -> &ListeningState {
        &self.state
    }

    /// The delivery queue
    pub fn queue(&self) -> &DeliveryQueue<String> {
        &self.queue
    }

    /// Run all three loops until they stop. Returns the first fatal error, if any.
    pub async fn run(&self) -> Result<(), RelayError> {
        info!("Listening...");
        let (inbound, outbound, delivery) = tokio::join!(
            self.signal_to_twitter(),
            self.twitter_to_queue(),
            self.queue_to_signal(),
        );
        inbound.and(outbound).and(delivery)
    }

    fn is_stopping(&self) -> bool {
        self.state.stop_requested() || self.token.is_cancelled()
    }

    /// Escalate an unrecoverable error and stop every loop
    async fn fail(&self, err: RelayError) -> RelayError {
        error!("Exception occurred, halting relay: {err}");
        self.escalation.panic(self.signal_cli.as_ref(), &err).await;
        self.state.request_stop();
        self.token.cancel();
        err
    }

    /// Sleep, returning early with `false` if the token is cancelled
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
