//! OTP validation engine.
//!
//! The one question both protocol front-ends ask: "is this code valid
//! for this user in this mode?". Answers are plain booleans; an unknown
//! user, a mode mismatch, a wrong code and an internal computation error
//! all look the same to the caller.
//!
//! HOTP:
//! - digit count = length of the submitted code
//! - window of [`LOOK_AHEAD_WINDOW`] counters starting at the stored one
//! - a match at offset `k` stores `counter + k + 1`
//! - the counter is written back on every attempt (unchanged on a miss)
//!
//! TOTP:
//! - 30 second steps since the Unix epoch, no tolerance window
//! - nothing is written

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, warn};

use crate::error::OtpError;
use crate::mode::OtpMode;
use crate::otp::{self, LOOK_AHEAD_WINDOW};
use crate::store::CredentialStore;

/// Validates submitted codes against a shared [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct Validator {
    store: Arc<CredentialStore>,
}

impl Validator {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Validator { store }
    }

    /// The backing store (for provisioning and tests).
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Validate `code` for `user` using the system clock for TOTP.
    pub fn validate(&self, user: &str, mode: OtpMode, code: &str) -> bool {
        self.validate_at(user, mode, code, SystemTime::now())
    }

    /// Validate `code` for `user` as of `now`.
    pub fn validate_at(&self, user: &str, mode: OtpMode, code: &str, now: SystemTime) -> bool {
        let result = match mode {
            OtpMode::Hotp => self.validate_hotp(user, code),
            OtpMode::Totp => self.validate_totp(user, code, now),
        };

        match result {
            Some(Ok(valid)) => valid,
            Some(Err(e)) => {
                error!(%user, %mode, error = %e, "error during OTP validation");
                false
            }
            None => {
                debug!(%user, "user not found");
                false
            }
        }
    }

    fn validate_hotp(&self, user: &str, code: &str) -> Option<Result<bool, OtpError>> {
        // Whole read-compute-write under the entry lock: two concurrent
        // attempts with the same code cannot both match.
        self.store.update(user, |record| {
            if record.mode() != OtpMode::Hotp {
                warn!(%user, stored = %record.mode(), "HOTP requested for non-HOTP record");
                return Ok(false);
            }
            let counter = record.counter().ok_or(OtpError::MissingCounter)?;
            let outcome = otp::validate_hotp_window(record.secret(), counter, LOOK_AHEAD_WINDOW, code)?;
            record.set_counter(outcome.next_counter);
            if outcome.valid && outcome.next_counter != counter.saturating_add(1) {
                debug!(%user, from = counter, to = outcome.next_counter, "HOTP counter resynchronized");
            }
            Ok(outcome.valid)
        })
    }

    fn validate_totp(&self, user: &str, code: &str, now: SystemTime) -> Option<Result<bool, OtpError>> {
        let unix_secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        self.store.read(user, |record| {
            if record.mode() != OtpMode::Totp {
                warn!(%user, stored = %record.mode(), "TOTP requested for non-TOTP record");
                return Ok(false);
            }
            let expected = otp::totp(record.secret(), unix_secs, code.len())?;
            Ok(otp::codes_equal(&expected, code))
        })
    }
}
