//! Shared types for the OTP server.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier for an accepted connection.
///
/// Unique over the lifetime of the process; only used for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_connection_id() -> ConnectionId {
    ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Which front-end protocol a listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frontend {
    Dynalogin,
    Weblogin,
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frontend::Dynalogin => write!(f, "dynalogin"),
            Frontend::Weblogin => write!(f, "weblogin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontends_display_as_their_protocol_name() {
        assert_eq!(Frontend::Dynalogin.to_string(), "dynalogin");
        assert_eq!(Frontend::Weblogin.to_string(), "weblogin");
    }

    #[test]
    fn connection_ids_are_unique() {
        let a = next_connection_id();
        let b = next_connection_id();
        assert_ne!(a, b);
    }
}
