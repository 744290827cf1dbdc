//! Security-context capability used by the weblogin session.
//!
//! The session never constructs a context itself. It is handed one per
//! connection by a [`ContextFactory`], drives the token exchange through
//! [`SecurityContext::accept_step`], and then wraps/unwraps every message
//! through it. A Kerberos GSS binding implements these traits; tests use a
//! fake.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("context establishment failed: {0}")]
    Establish(String),

    #[error("wrap failed: {0}")]
    Wrap(String),

    #[error("unwrap failed: {0}")]
    Unwrap(String),

    #[error("acceptor credential unavailable: {0}")]
    Credential(String),
}

/// Services negotiated for an established context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextProperties {
    pub mutual_auth: bool,
    pub confidentiality: bool,
    pub integrity: bool,
    pub replay_detection: bool,
    pub sequence_detection: bool,
}

impl ContextProperties {
    /// Every service enabled.
    pub fn full() -> Self {
        ContextProperties {
            mutual_auth: true,
            confidentiality: true,
            integrity: true,
            replay_detection: true,
            sequence_detection: true,
        }
    }

    /// Name of the first mandatory service that is missing.
    pub fn missing_required(&self) -> Option<&'static str> {
        if !self.mutual_auth {
            Some("mutual authentication")
        } else if !self.confidentiality {
            Some("confidentiality")
        } else if !self.integrity {
            Some("integrity")
        } else {
            None
        }
    }
}

/// Result of unwrapping a data token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwrapped {
    pub data: Vec<u8>,
    /// Whether the sender applied confidentiality (not just integrity).
    pub confidential: bool,
}

/// One acceptor-side security context.
pub trait SecurityContext: Send {
    /// Feed a token from the client, returning the token to send back, if
    /// any.
    fn accept_step(&mut self, token: &[u8]) -> Result<Option<Vec<u8>>, SecurityError>;

    fn is_established(&self) -> bool;

    fn properties(&self) -> ContextProperties;

    /// Authenticated initiator name, once established.
    fn peer_name(&self) -> Option<String>;

    /// Protect an outgoing message with confidentiality and integrity.
    fn wrap(&mut self, data: &[u8]) -> Result<Vec<u8>, SecurityError>;

    fn unwrap(&mut self, token: &[u8]) -> Result<Unwrapped, SecurityError>;

    /// Release mechanism resources. Called exactly once at teardown.
    fn dispose(&mut self) {}
}

/// Produces a fresh context for each accepted weblogin connection.
pub trait ContextFactory: Send + Sync {
    fn new_context(&self) -> Result<Box<dyn SecurityContext>, SecurityError>;
}
