//! Error types for OTP computation.
//!
//! These never reach a protocol peer: the validator logs them and
//! reports a plain validation failure.

use thiserror::Error;

/// Failure while computing a one-time code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    /// Requested digit count is outside what a 31-bit truncated value can carry.
    #[error("unsupported digit count {0} (expected 1..=10)")]
    InvalidDigits(usize),

    /// The HMAC implementation rejected the key material.
    #[error("key material rejected by HMAC")]
    InvalidKey,

    /// A HOTP request was made against a record with no counter.
    #[error("HOTP record has no counter")]
    MissingCounter,
}
