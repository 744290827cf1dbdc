//! Per-user credential record.
//!
//! Records are owned by the [`CredentialStore`](crate::CredentialStore);
//! nothing outside this crate holds on to one. Only the `(user, mode,
//! code)` tuple of a request crosses the boundary.

use crate::mode::OtpMode;

/// Shared secret plus whatever moving state the mode needs.
///
/// `mode` is fixed at construction; the only mutation this crate
/// performs is advancing `counter` on a HOTP match.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    mode: OtpMode,
    secret: Vec<u8>,
    /// Next expected counter value (HOTP only).
    counter: Option<u64>,
}

impl CredentialRecord {
    /// HOTP record starting at `counter`.
    pub fn hotp(secret: impl Into<Vec<u8>>, counter: u64) -> Self {
        CredentialRecord {
            mode: OtpMode::Hotp,
            secret: secret.into(),
            counter: Some(counter),
        }
    }

    /// TOTP record. TOTP is stateless so there is no counter.
    pub fn totp(secret: impl Into<Vec<u8>>) -> Self {
        CredentialRecord {
            mode: OtpMode::Totp,
            secret: secret.into(),
            counter: None,
        }
    }

    pub fn mode(&self) -> OtpMode {
        self.mode
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn counter(&self) -> Option<u64> {
        self.counter
    }

    pub(crate) fn set_counter(&mut self, counter: u64) {
        self.counter = Some(counter);
    }
}

// Keep key material out of logs.
impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("mode", &self.mode)
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("counter", &self.counter)
            .finish()
    }
}
