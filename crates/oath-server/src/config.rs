//! Configuration for the OTP server.
//!
//! Defaults can be overridden through environment variables:
//!
//! - `OATH_DYNALOGIN_ADDR`        (default: "0.0.0.0:57653")
//! - `OATH_WEBLOGIN_ADDR`         (default: "0.0.0.0:4373")
//! - `OATH_MAX_CLIENTS`           (default: "10")
//! - `OATH_SHUTDOWN_TIMEOUT_SECS` (default: "5")
//! - `OATH_TLS_CERT` / `OATH_TLS_KEY` (PEM paths, both or neither)
//! - `OATH_CREDENTIALS`           (TOML provisioning file, optional)

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("OATH_TLS_CERT and OATH_TLS_KEY must both be set or neither")]
    PartialTls,

    #[error("OATH_MAX_CLIENTS must be at least 1")]
    NoClients,
}

/// PEM files for the dynalogin TLS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// dynalogin listen address.
    pub dynalogin_addr: SocketAddr,

    /// weblogin listen address.
    pub weblogin_addr: SocketAddr,

    /// Maximum number of concurrently served connections, across both
    /// listeners.
    pub max_clients: usize,

    /// Grace period for in-flight sessions after shutdown is requested.
    pub shutdown_timeout: Duration,

    /// Certificate and key; `None` serves dynalogin in plaintext.
    pub tls: Option<TlsFiles>,

    /// Credential provisioning file.
    pub credentials: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dynalogin_addr: SocketAddr::from(([0, 0, 0, 0], 57653)),
            weblogin_addr: SocketAddr::from(([0, 0, 0, 0], 4373)),
            max_clients: 10,
            shutdown_timeout: Duration::from_secs(5),
            tls: None,
            credentials: None,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let dynalogin_addr =
            read_or_default(&lookup, "OATH_DYNALOGIN_ADDR", defaults.dynalogin_addr)?;
        let weblogin_addr = read_or_default(&lookup, "OATH_WEBLOGIN_ADDR", defaults.weblogin_addr)?;

        let max_clients = read_or_default(&lookup, "OATH_MAX_CLIENTS", defaults.max_clients)?;
        if max_clients == 0 {
            return Err(ConfigError::NoClients);
        }

        let shutdown_secs = read_or_default(
            &lookup,
            "OATH_SHUTDOWN_TIMEOUT_SECS",
            defaults.shutdown_timeout.as_secs(),
        )?;

        let tls = match (lookup("OATH_TLS_CERT"), lookup("OATH_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        Ok(Config {
            dynalogin_addr,
            weblogin_addr,
            max_clients,
            shutdown_timeout: Duration::from_secs(shutdown_secs),
            tls,
            credentials: lookup("OATH_CREDENTIALS").map(PathBuf::from),
        })
    }
}

fn read_or_default<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.dynalogin_addr.port(), 57653);
        assert_eq!(config.weblogin_addr.port(), 4373);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.tls.is_none());
        assert!(config.credentials.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("OATH_DYNALOGIN_ADDR", "127.0.0.1:9000"),
            ("OATH_MAX_CLIENTS", "64"),
            ("OATH_SHUTDOWN_TIMEOUT_SECS", "1"),
            ("OATH_TLS_CERT", "cert.pem"),
            ("OATH_TLS_KEY", "key.pem"),
            ("OATH_CREDENTIALS", "users.toml"),
        ])
        .unwrap();

        assert_eq!(config.dynalogin_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_clients, 64);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(
            config.tls,
            Some(TlsFiles {
                cert: "cert.pem".into(),
                key: "key.pem".into(),
            })
        );
        assert_eq!(config.credentials, Some(PathBuf::from("users.toml")));
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = config_from(&[("OATH_MAX_CLIENTS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OATH_MAX_CLIENTS", .. }));

        let err = config_from(&[("OATH_MAX_CLIENTS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::NoClients));
    }

    #[test]
    fn tls_needs_both_files() {
        let err = config_from(&[("OATH_TLS_CERT", "cert.pem")]).unwrap_err();
        assert!(matches!(err, ConfigError::PartialTls));
    }
}
