//! Relays scanner-style alerts from a Signal group to Twitter, and statuses from
//! trusted Twitter accounts back to Signal.
//!
//! The [`Relay`] runs three loops over a shared [`ListeningState`]. Optional
//! pollers ([`ComradelyReminder`], [`RadioMonitor`]) run next to it.

#![deny(missing_docs)]

pub mod command;
pub mod config;
pub mod escalation;
pub mod filter;
pub mod format;
pub mod init_logging;
pub mod microblog;
pub mod queue;
pub mod radio_monitor;
pub mod record;
pub mod relay;
pub mod reminder;
pub mod state;
pub mod status;
pub mod trusted;
pub mod verify;

pub use command::HeaderSet;
pub use config::Config;
pub use escalation::Escalation;
pub use filter::{Clock, FixedClock, SystemClock};
pub use format::ThreadFormatter;
pub use microblog::{Microblog, MicroblogError, StatusStream};
pub use radio_monitor::{RadioMonitor, RadioMonitorSettings};
pub use record::InboundRecord;
pub use relay::{Disposition, Relay, RelayError, RelaySettings};
pub use reminder::ComradelyReminder;
pub use state::ListeningState;
pub use status::Status;
pub use trusted::TrustedSenderSet;
