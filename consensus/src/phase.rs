//! Producer-side generation phases for one target height.

/// Phases move strictly forward:
/// `Idle -> Requested -> Generating -> Proposed -> {Finalized | Rejected | Superseded}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GenerationPhase {
    Idle,
    /// A valid block request was accepted.
    Requested,
    /// Transactions are being collected into a sub-block.
    Generating,
    /// The signed block was sent to the requester.
    Proposed,
    /// Observers signed the block and it was committed. Terminal state.
    Finalized,
    /// The block failed to commit. Terminal state.
    Rejected,
    /// Observers finalized a competing block. Terminal state.
    Superseded,
}

impl GenerationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Rejected | Self::Superseded)
    }

    pub fn can_transition_to(self, next: GenerationPhase) -> bool {
        use GenerationPhase::*;
        matches!(
            (self, next),
            (Idle, Requested)
                | (Requested, Generating)
                | (Generating, Proposed)
                | (Proposed, Finalized)
                | (Proposed, Rejected)
                | (Proposed, Superseded)
        )
    }

    /// Move to `next` if allowed; returns whether the phase changed.
    pub fn advance(&mut self, next: GenerationPhase) -> bool {
        if self.can_transition_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }
}
