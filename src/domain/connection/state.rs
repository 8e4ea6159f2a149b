//! Connection lifecycle.
//!
//! ```text
//! Uninitialized → Created → Connecting → Connected ⇄ Reconnecting
//!                                            │             │
//!                                            ▼             ▼
//!                                        Disconnected ◄────┘
//! ```
//!
//! `Disposed` is reachable from every state and is terminal.

use crate::domain::foundation::StateMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport client yet.
    Uninitialized,
    /// Transport client instantiated, never connected.
    Created,
    /// Connect issued, waiting for confirmation.
    Connecting,
    Connected,
    /// The transport lost the session and is retrying on its own.
    Reconnecting,
    Disconnected,
    Disposed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, ConnectionState::Disposed)
    }
}

impl StateMachine for ConnectionState {
    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Uninitialized => vec![Created, Disposed],
            Created => vec![Connecting, Disposed],
            Connecting => vec![Connected, Disconnected, Disposed],
            Connected => vec![Reconnecting, Disconnected, Disposed],
            Reconnecting => vec![Reconnecting, Connected, Disconnected, Disposed],
            // The transport may restore a session without a new connect call
            Disconnected => vec![Connecting, Connected, Disposed],
            Disposed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn happy_path_is_valid() {
        let state = Uninitialized
            .transition_to(Created)
            .and_then(|s| s.transition_to(Connecting))
            .and_then(|s| s.transition_to(Connected));
        assert_eq!(state, Ok(Connected));
    }

    #[test]
    fn reconnect_cycle_is_valid() {
        assert!(Connected.can_transition_to(&Reconnecting));
        assert!(Reconnecting.can_transition_to(&Reconnecting));
        assert!(Reconnecting.can_transition_to(&Connected));
        assert!(Reconnecting.can_transition_to(&Disconnected));
    }

    #[test]
    fn cannot_connect_without_client() {
        assert!(Uninitialized.transition_to(Connecting).is_err());
    }

    #[test]
    fn every_live_state_can_be_disposed() {
        for state in [Uninitialized, Created, Connecting, Connected, Reconnecting, Disconnected] {
            assert!(state.can_transition_to(&Disposed), "{:?}", state);
        }
    }

    #[test]
    fn disposed_is_terminal() {
        assert!(Disposed.is_terminal());
        assert!(Disposed.transition_to(Connecting).is_err());
    }
}
