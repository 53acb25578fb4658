//! Session lifecycle state machine.

/// Lifecycle of a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Session is receiving and sending activities.
    #[default]
    Active,
    /// The conversation was ended; resources may still be live.
    Closing,
    /// Session has been torn down and cannot be reused.
    Closed,
}

impl LifecycleState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Active -> Closing
    /// - Active -> Closed
    /// - Closing -> Closed
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (*self, target),
            (Active, Closing) | (Active, Closed) | (Closing, Closed)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: LifecycleState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::SessionError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, LifecycleState::Closed)
    }

    /// Check if the session can still send activities.
    pub fn can_send(&self) -> bool {
        !self.is_closed()
    }
}
