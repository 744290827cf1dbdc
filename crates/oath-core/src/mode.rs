//! OTP mode (HOTP / TOTP) for credential records and requests.

use std::fmt;
use std::str::FromStr;

/// Which one-time-passcode algorithm a credential uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OtpMode {
    /// Counter based (RFC 4226).
    Hotp,
    /// Time based (RFC 6238).
    Totp,
}

impl OtpMode {
    /// Wire / config spelling (`"HOTP"` / `"TOTP"`).
    pub fn as_str(self) -> &'static str {
        match self {
            OtpMode::Hotp => "HOTP",
            OtpMode::Totp => "TOTP",
        }
    }
}

impl fmt::Display for OtpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a mode name is neither `HOTP` nor `TOTP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown OTP mode: {}", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for OtpMode {
    type Err = UnknownMode;

    /// Case-sensitive: only the upper-case spellings are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOTP" => Ok(OtpMode::Hotp),
            "TOTP" => Ok(OtpMode::Totp),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}
