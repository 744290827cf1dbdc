//! Credential provisioning file.
//!
//! ```toml
//! [[user]]
//! name = "sam"
//! mode = "HOTP"
//! secret = "3132333435363738393031323334353637383930"
//! counter = 200
//! ```
//!
//! Secrets are hex encoded. HOTP entries start at counter 0 unless one is
//! given; TOTP entries must not carry a counter.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use oath_core::mode::UnknownMode;
use oath_core::{CredentialRecord, CredentialStore, OtpMode};

#[derive(Debug, Error)]
pub enum CredentialFileError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credentials: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("user {user}: {source}")]
    Mode {
        user: String,
        #[source]
        source: UnknownMode,
    },

    #[error("user {user}: secret is not valid hex: {source}")]
    Secret {
        user: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("user {0}: TOTP entries cannot have a counter")]
    TotpCounter(String),

    #[error("user {0} is listed more than once")]
    Duplicate(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialFile {
    #[serde(default, rename = "user")]
    users: Vec<UserEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserEntry {
    name: String,
    mode: String,
    secret: String,
    counter: Option<u64>,
}

impl UserEntry {
    fn into_record(self) -> Result<(String, CredentialRecord), CredentialFileError> {
        let mode = self
            .mode
            .parse::<OtpMode>()
            .map_err(|source| CredentialFileError::Mode {
                user: self.name.clone(),
                source,
            })?;

        let secret = hex::decode(self.secret.trim()).map_err(|source| CredentialFileError::Secret {
            user: self.name.clone(),
            source,
        })?;

        let record = match (mode, self.counter) {
            (OtpMode::Hotp, counter) => CredentialRecord::hotp(secret, counter.unwrap_or(0)),
            (OtpMode::Totp, None) => CredentialRecord::totp(secret),
            (OtpMode::Totp, Some(_)) => return Err(CredentialFileError::TotpCounter(self.name)),
        };

        Ok((self.name, record))
    }
}

/// Build a store from the text of a provisioning file.
pub fn parse_credentials(text: &str) -> Result<CredentialStore, CredentialFileError> {
    let file: CredentialFile = toml::from_str(text)?;
    let store = CredentialStore::new();

    for entry in file.users {
        let (name, record) = entry.into_record()?;
        if store.contains(&name) {
            return Err(CredentialFileError::Duplicate(name));
        }
        store.insert(name, record);
    }

    Ok(store)
}

/// Read and parse a provisioning file.
pub fn load_credentials(path: &Path) -> Result<CredentialStore, CredentialFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| CredentialFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_credentials(&text)
}
