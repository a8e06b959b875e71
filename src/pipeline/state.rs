//! Pipeline state management

/// Pipeline state machine
///
/// Represents the current state of the streaming pipeline. Transitions are
/// validated so lifecycle steps cannot interleave inconsistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Screen not visible, nothing held.
    Inactive,

    /// Camera and socket are being brought up.
    Initializing,

    /// Frames flow over the socket.
    Streaming,

    /// Socket lost; the camera stays alive while reconnection runs.
    Degraded,

    /// Tearing down: scheduler, then socket, then camera.
    Terminating,
}

impl PipelineState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            // From Inactive
            (Inactive, Initializing) => true,

            // From Initializing
            (Initializing, Streaming) => true,
            (Initializing, Terminating) => true, // abort before streaming began

            // From Streaming
            (Streaming, Degraded) => true,
            (Streaming, Terminating) => true,

            // From Degraded
            (Degraded, Streaming) => true,
            (Degraded, Terminating) => true,

            // From Terminating
            (Terminating, Inactive) => true,

            // Self-transitions
            (a, b) if a == b => true,

            // All other transitions invalid
            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            PipelineState::Inactive => "Inactive",
            PipelineState::Initializing => "Initializing",
            PipelineState::Streaming => "Streaming",
            PipelineState::Degraded => "Degraded",
            PipelineState::Terminating => "Terminating",
        }
    }

    /// Check if the pipeline holds any resources (camera or socket).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PipelineState::Initializing | PipelineState::Streaming | PipelineState::Degraded
        )
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, PipelineState::Streaming)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PipelineState::Degraded)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use PipelineState::*;

        assert!(Inactive.can_transition_to(&Initializing));
        assert!(Initializing.can_transition_to(&Streaming));
        assert!(Streaming.can_transition_to(&Degraded));
        assert!(Degraded.can_transition_to(&Streaming));
        assert!(Streaming.can_transition_to(&Terminating));
        assert!(Degraded.can_transition_to(&Terminating));
        assert!(Initializing.can_transition_to(&Terminating));
        assert!(Terminating.can_transition_to(&Inactive));

        // Self-transitions
        assert!(Inactive.can_transition_to(&Inactive));
        assert!(Streaming.can_transition_to(&Streaming));
    }

    #[test]
    fn test_invalid_transitions() {
        use PipelineState::*;

        assert!(!Inactive.can_transition_to(&Streaming)); // must initialize first
        assert!(!Inactive.can_transition_to(&Terminating)); // nothing to tear down
        assert!(!Degraded.can_transition_to(&Initializing));
        assert!(!Terminating.can_transition_to(&Streaming));
        assert!(!Streaming.can_transition_to(&Initializing));
    }

    #[test]
    fn test_state_checks() {
        use PipelineState::*;

        assert!(Streaming.is_active());
        assert!(Streaming.is_streaming());
        assert!(!Streaming.is_degraded());

        assert!(Degraded.is_active());
        assert!(!Degraded.is_streaming());
        assert!(Degraded.is_degraded());

        assert!(Initializing.is_active());
        assert!(!Inactive.is_active());
        assert!(!Terminating.is_active());
    }
}
