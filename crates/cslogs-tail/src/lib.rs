//! cslogs tail - live, notification-driven tailing of log files
//!
//! A [`FileTailSource`] turns a growing (and possibly truncated) file into a
//! stream of byte chunks. Reads are triggered by filesystem notifications,
//! never by polling, and pause whenever the consumer stops pulling.

mod error;
mod source;
mod state;
mod watch;

pub use error::{TailEnd, TailError};
pub use source::{FileTailSource, TailStream};
