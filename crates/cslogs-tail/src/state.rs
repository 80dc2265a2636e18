//! Tailing state machine
//!
//! Pure bookkeeping for one tailed file: no I/O happens here. Each transition
//! updates the state and returns the [`Effect`] the driver has to carry out.

use tracing::debug;

use crate::error::{TailEnd, TailError};

/// Lifecycle phase of a tailed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No demand seen yet; nothing is open
    Idle,
    /// Watch open, no reader
    Watching,
    /// Watch and reader open
    Reading,
    /// Watch open, reader closed because the consumer's buffer filled up
    Paused,
    /// Watch and reader released; no further transitions
    Terminated,
}

/// Work the driver must perform after a transition
#[derive(Debug)]
pub enum Effect {
    None,
    /// Subscribe to change notifications, then run a synthetic change
    StartWatch,
    /// Replace any reader with a new one positioned at `offset`
    OpenReader { offset: u64 },
    /// Keep reading from the open reader
    Resume,
    /// Drop the open reader
    CloseReader,
    /// Release the watch and reader, then end the stream
    Terminate(TailEnd),
}

#[derive(Debug)]
pub struct TailState {
    phase: Phase,
    offset: u64,
    read_demand: bool,
}

impl Default for TailState {
    fn default() -> Self {
        Self::new()
    }
}

impl TailState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            offset: 0,
            read_demand: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn has_demand(&self) -> bool {
        self.read_demand
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Whether the driver should pull bytes from the open reader
    pub fn wants_read(&self) -> bool {
        self.phase == Phase::Reading && self.read_demand
    }

    /// The consumer is ready for more bytes
    pub fn request_more(&mut self) -> Effect {
        if self.is_terminated() {
            return Effect::None;
        }
        self.read_demand = true;

        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Watching;
                Effect::StartWatch
            }
            Phase::Reading => Effect::Resume,
            Phase::Paused => {
                self.phase = Phase::Reading;
                Effect::OpenReader {
                    offset: self.offset,
                }
            }
            Phase::Watching | Phase::Terminated => Effect::None,
        }
    }

    /// A content change was observed. `size` is the current file length, or
    /// `None` when the path no longer exists.
    ///
    /// The caller has already dropped any open reader.
    pub fn on_change(&mut self, size: Option<u64>) -> Effect {
        if self.is_terminated() {
            return Effect::None;
        }

        let Some(size) = size else {
            return self.terminate(TailEnd::SourceRemoved);
        };

        // Equal size means no new bytes; only a shrink below what was
        // delivered counts as truncation.
        if self.offset > size {
            debug!(
                offset = self.offset,
                size, "File shrank below delivered offset, restarting from 0"
            );
            self.offset = 0;
        }

        self.phase = Phase::Reading;
        Effect::OpenReader {
            offset: self.offset,
        }
    }

    /// A chunk of `len` bytes was handed to the consumer
    pub fn on_delivered(&mut self, len: u64) -> Effect {
        if self.is_terminated() {
            return Effect::None;
        }
        self.offset += len;
        Effect::Resume
    }

    /// The consumer's buffer is full; stop reading until the next pull
    pub fn on_saturated(&mut self) -> Effect {
        if self.is_terminated() {
            return Effect::None;
        }
        self.read_demand = false;
        self.phase = Phase::Paused;
        Effect::CloseReader
    }

    /// The reader caught up with the current end of file
    pub fn on_drained(&mut self) -> Effect {
        if self.phase != Phase::Reading {
            return Effect::None;
        }
        self.phase = Phase::Watching;
        Effect::CloseReader
    }

    pub fn consumer_closed(&mut self) -> Effect {
        self.terminate(TailEnd::ConsumerClosed)
    }

    pub fn source_removed(&mut self) -> Effect {
        self.terminate(TailEnd::SourceRemoved)
    }

    pub fn fail(&mut self, err: impl Into<TailError>) -> Effect {
        self.terminate(TailEnd::Failed(err.into()))
    }

    fn terminate(&mut self, end: TailEnd) -> Effect {
        if self.is_terminated() {
            return Effect::None;
        }
        self.phase = Phase::Terminated;
        self.read_demand = false;
        Effect::Terminate(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> TailState {
        let mut state = TailState::new();
        assert!(matches!(state.request_more(), Effect::StartWatch));
        state
    }

    #[test]
    fn test_first_pull_starts_watch() {
        let mut state = TailState::new();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(!state.has_demand());

        assert!(matches!(state.request_more(), Effect::StartWatch));
        assert_eq!(state.phase(), Phase::Watching);
        assert!(state.has_demand());

        // Only the first pull creates the watch
        assert!(matches!(state.request_more(), Effect::None));
    }

    #[test]
    fn test_change_opens_reader_at_offset() {
        let mut state = started();
        assert!(matches!(state.on_change(Some(6)), Effect::OpenReader { offset: 0 }));
        assert!(state.wants_read());

        state.on_delivered(6);
        assert!(matches!(state.on_drained(), Effect::CloseReader));
        assert_eq!(state.phase(), Phase::Watching);

        assert!(matches!(state.on_change(Some(12)), Effect::OpenReader { offset: 6 }));
    }

    #[test]
    fn test_truncation_resets_offset() {
        let mut state = started();
        state.on_change(Some(12));
        state.on_delivered(12);
        state.on_drained();

        assert!(matches!(state.on_change(Some(4)), Effect::OpenReader { offset: 0 }));
        assert_eq!(state.offset(), 0);

        state.on_change(Some(0));
        assert_eq!(state.offset(), 0);
    }

    #[test]
    fn test_no_growth_keeps_offset() {
        let mut state = started();
        state.on_change(Some(12));
        state.on_delivered(12);
        state.on_drained();

        assert!(matches!(state.on_change(Some(12)), Effect::OpenReader { offset: 12 }));
        assert_eq!(state.offset(), 12);
    }

    #[test]
    fn test_saturation_pauses_until_pull() {
        let mut state = started();
        state.on_change(Some(100));
        state.on_delivered(10);

        assert!(matches!(state.on_saturated(), Effect::CloseReader));
        assert_eq!(state.phase(), Phase::Paused);
        assert!(!state.has_demand());
        assert!(!state.wants_read());

        assert!(matches!(state.request_more(), Effect::OpenReader { offset: 10 }));
        assert!(state.wants_read());
    }

    #[test]
    fn test_change_while_paused_waits_for_demand() {
        let mut state = started();
        state.on_change(Some(100));
        state.on_delivered(10);
        state.on_saturated();

        // Reader reopened but stays idle without demand
        assert!(matches!(state.on_change(Some(200)), Effect::OpenReader { offset: 10 }));
        assert_eq!(state.phase(), Phase::Reading);
        assert!(!state.wants_read());

        assert!(matches!(state.request_more(), Effect::Resume));
        assert!(state.wants_read());
    }

    #[test]
    fn test_removed_source_terminates_once() {
        let mut state = started();
        assert!(matches!(
            state.on_change(None),
            Effect::Terminate(TailEnd::SourceRemoved)
        ));
        assert!(state.is_terminated());

        assert!(matches!(state.on_change(Some(10)), Effect::None));
        assert!(matches!(state.request_more(), Effect::None));
        assert!(matches!(state.consumer_closed(), Effect::None));
    }

    #[test]
    fn test_terminated_state_is_frozen() {
        let mut state = started();
        state.on_change(Some(10));
        state.on_delivered(5);
        let effect = state.fail(TailError::UnknownEvent("Other".to_string()));
        assert!(matches!(
            effect,
            Effect::Terminate(TailEnd::Failed(TailError::UnknownEvent(_)))
        ));

        assert!(matches!(state.on_delivered(5), Effect::None));
        assert!(matches!(state.on_saturated(), Effect::None));
        assert!(matches!(state.on_drained(), Effect::None));
        assert_eq!(state.offset(), 5);
        assert!(!state.has_demand());
    }
}
