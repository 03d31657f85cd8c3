//! Pre-send delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Optional pause applied right before a request reaches the transport.
///
/// Simulated responses skip the delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delay(Option<Duration>);

impl Delay {
    /// No delay.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// A delay of the given duration.
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self(Some(duration))
    }

    /// A delay in milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Returns `true` if no delay is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// The configured duration.
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.0
    }

    /// Request delay when set, connector delay otherwise.
    #[must_use]
    pub const fn merge(connector: Self, request: Self) -> Self {
        if request.is_empty() { connector } else { request }
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Self::new(duration)
    }
}
