use std::fmt;

/// The state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow; failures are counted by the configured behavior.
    Closed = 0,
    /// Calls are rejected until the break duration elapses.
    Open = 1,
    /// One test call is in flight; its outcome decides between closed and open.
    HalfOpen = 2,
    /// Held open manually until explicitly closed.
    Isolated = 3,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
            CircuitState::Isolated => "Isolated",
        }
    }

    /// Returns true if calls are currently rejected in this state.
    ///
    /// `Open` is reported as rejecting even though the first call after the
    /// break duration is admitted as a half-open test.
    pub fn is_rejecting(&self) -> bool {
        matches!(self, CircuitState::Open | CircuitState::Isolated)
    }

    #[cfg(feature = "metrics")]
    pub(crate) const ALL: [CircuitState; 4] = [
        CircuitState::Closed,
        CircuitState::Open,
        CircuitState::HalfOpen,
        CircuitState::Isolated,
    ];
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
