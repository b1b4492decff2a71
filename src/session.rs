//! Per-connection state.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use strassen::CancelFlag;

/// Lifecycle of one request/response cycle.
///
/// ```text
/// AwaitingInput -> Computing -> SendingResult -> Closed
///       |              |             |
///       +------------> Failed <------+ ----> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Computing,
    SendingResult,
    Failed,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use self::SessionState::*;
        matches!(
            (self, next),
            (AwaitingInput, Computing)
                | (AwaitingInput, Failed)
                | (Computing, SendingResult)
                | (Computing, Failed)
                | (SendingResult, Closed)
                | (SendingResult, Failed)
                | (Failed, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingInput => "awaiting_input",
            SessionState::Computing => "computing",
            SessionState::SendingResult => "sending_result",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One client connection. Dropped once the response is sent or the
/// connection fails; nothing in it is visible to other sessions.
#[derive(Debug)]
pub struct Session {
    id: u64,
    peer: Option<SocketAddr>,
    state: SessionState,
    cancel: CancelFlag,
    started: Instant,
}

impl Session {
    pub fn new(id: u64, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer,
            state: SessionState::AwaitingInput,
            cancel: CancelFlag::new(),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Flag that aborts this session's computation when set.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Moves to `next`, ignoring transitions the state machine does not allow.
    ///
    /// Returns whether the transition happened.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::debug!(from = %self.state, to = %next, "ignored session transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "session transition");
        self.state = next;
        true
    }
}
