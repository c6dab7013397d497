use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one capture session. Every asynchronous backend event carries
/// the generation that was current when the backend was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic generation counter.
///
/// Advancing the guard invalidates every event issued for an earlier
/// generation; those events are dropped on arrival.
#[derive(Debug, Default)]
pub struct StaleGuard {
    current: Generation,
}

impl StaleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation and return it.
    pub fn advance(&mut self) -> Generation {
        self.current = Generation(self.current.0.wrapping_add(1));
        self.current
    }

    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.current
    }
}
