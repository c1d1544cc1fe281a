//! # Gateway Configuration
//!
//! Read from environment variables at startup:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `SPN_PORT` | `9033` | HTTP listen port |
//! | `SPN_SIGNING_KEY` | ephemeral | hex Ed25519 seed (32 bytes) |
//! | `SPN_ENDPOINT` | `http://127.0.0.1:<port>` | endpoint advertised in approvals |
//! | `SPN_PIECE_DIR` | in-memory | directory for the piece store |
//! | `SPN_POLICY_FILE` | built-in table | YAML task policy overrides |
//! | `SPN_CHAIN_FIXTURE` | empty chain | YAML seed for the in-memory chain |
//! | `SPN_APPROVAL_TIMEOUT_HEIGHT` | `10` | blocks an approval stays valid |
//! | `SPN_CONSENSUS_TIMEOUT_MS` | `3000` | bound on chain and authorizer calls |
//! | `SPN_RECEIVE_SESSION_TTL_SECS` | `600` | idle time before an unfinished receive stream is dropped |
//! | `SPN_LOG_FORMAT` | `text` | `text` or `json` |

use std::path::PathBuf;
use std::time::Duration;

use spn_protocol::{DEFAULT_APPROVAL_TIMEOUT_HEIGHT, DEFAULT_SESSION_TTL};

pub const DEFAULT_PORT: u16 = 9033;
pub const DEFAULT_CONSENSUS_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Gateway configuration.
///
/// Custom `Debug` redacts the signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub signing_key_hex: Option<String>,
    pub endpoint: String,
    pub piece_dir: Option<PathBuf>,
    pub policy_file: Option<PathBuf>,
    pub chain_fixture: Option<PathBuf>,
    pub approval_timeout_height: u64,
    pub consensus_timeout: Duration,
    pub session_ttl: Duration,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "signing_key_hex",
                &self.signing_key_hex.as_ref().map(|_| "[REDACTED]"),
            )
            .field("endpoint", &self.endpoint)
            .field("piece_dir", &self.piece_dir)
            .field("policy_file", &self.policy_file)
            .field("chain_fixture", &self.chain_fixture)
            .field("approval_timeout_height", &self.approval_timeout_height)
            .field("consensus_timeout", &self.consensus_timeout)
            .field("session_ttl", &self.session_ttl)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            signing_key_hex: None,
            endpoint: format!("http://127.0.0.1:{DEFAULT_PORT}"),
            piece_dir: None,
            policy_file: None,
            chain_fixture: None,
            approval_timeout_height: DEFAULT_APPROVAL_TIMEOUT_HEIGHT,
            consensus_timeout: DEFAULT_CONSENSUS_TIMEOUT,
            session_ttl: DEFAULT_SESSION_TTL,
            log_format: LogFormat::Text,
        }
    }
}

fn parse_var<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let port = parse_var("SPN_PORT", non_empty("SPN_PORT"), DEFAULT_PORT)?;
        let approval_timeout_height = parse_var(
            "SPN_APPROVAL_TIMEOUT_HEIGHT",
            non_empty("SPN_APPROVAL_TIMEOUT_HEIGHT"),
            DEFAULT_APPROVAL_TIMEOUT_HEIGHT,
        )?;
        let consensus_timeout_ms = parse_var(
            "SPN_CONSENSUS_TIMEOUT_MS",
            non_empty("SPN_CONSENSUS_TIMEOUT_MS"),
            DEFAULT_CONSENSUS_TIMEOUT.as_millis() as u64,
        )?;
        let session_ttl_secs = parse_var(
            "SPN_RECEIVE_SESSION_TTL_SECS",
            non_empty("SPN_RECEIVE_SESSION_TTL_SECS"),
            DEFAULT_SESSION_TTL.as_secs(),
        )?;
        let log_format = match non_empty("SPN_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "SPN_LOG_FORMAT",
                    reason: format!("expected text or json, got {other:?}"),
                })
            }
        };

        Ok(Self {
            port,
            signing_key_hex: non_empty("SPN_SIGNING_KEY"),
            endpoint: non_empty("SPN_ENDPOINT")
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}")),
            piece_dir: non_empty("SPN_PIECE_DIR").map(PathBuf::from),
            policy_file: non_empty("SPN_POLICY_FILE").map(PathBuf::from),
            chain_fixture: non_empty("SPN_CHAIN_FIXTURE").map(PathBuf::from),
            approval_timeout_height,
            consensus_timeout: Duration::from_millis(consensus_timeout_ms),
            session_ttl: Duration::from_secs(session_ttl_secs),
            log_format,
        })
    }
}
