use std::fmt;

/// Lifecycle of one execution loop run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Streaming,
    /// Live only: an exemption matched, the loop stopped advancing
    Paused,
    Terminated,
}

impl LoopState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition(self, next: LoopState) -> bool {
        matches!(
            (self, next),
            (LoopState::Init, LoopState::Streaming)
                | (LoopState::Init, LoopState::Terminated)
                | (LoopState::Streaming, LoopState::Paused)
                | (LoopState::Streaming, LoopState::Terminated)
                | (LoopState::Paused, LoopState::Terminated)
        )
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Init => "INIT",
            LoopState::Streaming => "STREAMING",
            LoopState::Paused => "PAUSED",
            LoopState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Tracks the current state and logs every transition
#[derive(Debug)]
pub(crate) struct StateMachine {
    state: LoopState,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: LoopState::Init,
        }
    }

    pub(crate) fn state(&self) -> LoopState {
        self.state
    }

    /// Back to `Init` ahead of a new run
    pub(crate) fn reset(&mut self) {
        if self.state != LoopState::Init {
            tracing::debug!(from = %self.state, "Loop state reset");
        }
        self.state = LoopState::Init;
    }

    pub(crate) fn advance(&mut self, next: LoopState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "Loop state change");
        self.state = next;
    }
}
