//! oath-core
//!
//! One-time-passcode validation logic:
//! - OTP modes and per-user credential records
//! - a concurrent credential store
//! - RFC 4226 (HOTP) / RFC 6238 (TOTP) code computation
//! - the validation engine the protocol sessions call into

pub mod mode;
pub mod record;
pub mod store;
pub mod otp;
pub mod validator;
pub mod error;

pub use mode::OtpMode;
pub use record::CredentialRecord;
pub use store::CredentialStore;
pub use validator::Validator;
pub use error::OtpError;
