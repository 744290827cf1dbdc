//! RFC 4226 (HOTP) and RFC 6238 (TOTP) code computation.
//!
//! Everything here is pure: no store access, no clock reads. The
//! [`Validator`](crate::Validator) supplies the counter or the current
//! time.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::error::OtpError;

type HmacSha1 = Hmac<Sha1>;

/// Number of consecutive counter values tried by a HOTP validation.
pub const LOOK_AHEAD_WINDOW: u64 = 8;

/// TOTP time step in seconds.
pub const TIME_STEP_SECS: u64 = 30;

/// Widest code a 31-bit dynamic-truncation value can fill.
pub const MAX_DIGITS: usize = 10;

/// Result of a windowed HOTP check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HotpOutcome {
    pub valid: bool,
    /// Counter value to store after this attempt: one past the match, or
    /// the starting counter when nothing matched.
    pub next_counter: u64,
}

/// Compute a HOTP code of `digits` decimal digits, zero-padded.
pub fn hotp(secret: &[u8], counter: u64, digits: usize) -> Result<String, OtpError> {
    if digits == 0 || digits > MAX_DIGITS {
        return Err(OtpError::InvalidDigits(digits));
    }

    let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| OtpError::InvalidKey)?;
    mac.update(&counter.to_be_bytes());
    let hs = mac.finalize().into_bytes();

    let value = u64::from(truncate(&hs));
    let modulus = 10u64.pow(digits as u32);

    Ok(format!("{:0width$}", value % modulus, width = digits))
}

/// Compute the TOTP code for the step containing `unix_secs`.
pub fn totp(secret: &[u8], unix_secs: u64, digits: usize) -> Result<String, OtpError> {
    hotp(secret, time_step(unix_secs), digits)
}

/// Number of whole time steps elapsed since the Unix epoch.
pub fn time_step(unix_secs: u64) -> u64 {
    unix_secs / TIME_STEP_SECS
}

/// Check `code` against `counter .. counter + window`.
///
/// The digit count is taken from the length of `code`.
pub fn validate_hotp_window(
    secret: &[u8],
    counter: u64,
    window: u64,
    code: &str,
) -> Result<HotpOutcome, OtpError> {
    let digits = code.len();

    for offset in 0..window {
        let Some(candidate_counter) = counter.checked_add(offset) else {
            break;
        };
        let candidate = hotp(secret, candidate_counter, digits)?;
        if codes_equal(&candidate, code) {
            return Ok(HotpOutcome {
                valid: true,
                next_counter: candidate_counter.saturating_add(1),
            });
        }
    }

    Ok(HotpOutcome {
        valid: false,
        next_counter: counter,
    })
}

/// Constant-time string comparison. Length is not secret.
pub fn codes_equal(expected: &str, submitted: &str) -> bool {
    bool::from(expected.as_bytes().ct_eq(submitted.as_bytes()))
}

// "Dynamic truncation" (RFC 4226 section 5.3)
fn truncate(hs: &[u8]) -> u32 {
    let offset = (hs[hs.len() - 1] & 0x0f) as usize;
    u32::from_be_bytes([hs[offset], hs[offset + 1], hs[offset + 2], hs[offset + 3]]) & 0x7fff_ffff
}
