//! # Node Configuration
//!
//! `config.json` in the data directory. Written once by `init`, read by
//! every other command. CLI flags and `VEILPAY_*` environment variables
//! override individual fields at startup; the file itself is never
//! rewritten behind the operator's back.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use veilpay_protocol::{Identity, LedgerConfig};

use crate::logging::LogFormat;

/// File name of the config inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Sled database directory inside the data directory.
pub const LEDGER_DIR: &str = "ledger";

/// Event log inside the data directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Authority key written by `init`.
pub const AUTHORITY_KEY_FILE: &str = "authority.key";

/// Everything the node needs besides the data directory itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Default log filter when neither `--log` nor `RUST_LOG` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Ledger parameters: mint authority, vault reserve, drift tolerance.
    pub ledger: LedgerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Defaults around the given authority.
    pub fn new(authority: Identity) -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            ledger: LedgerConfig::new(authority),
        }
    }

    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("malformed config at {}", path.display()))
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write config to {}", path.display()))
    }
}

/// The config path to use: the explicit one, or the data directory default.
pub fn resolve_path(data_dir: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = NodeConfig::new(Identity::from_bytes([4u8; 32]));
        config.ledger = config.ledger.with_vault_reserve(500);
        config.log_format = LogFormat::Json;

        config.save(&path).unwrap();
        assert_eq!(NodeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let authority = Identity::from_bytes([4u8; 32]);
        let json = format!(r#"{{"ledger": {{"authority": "{authority}"}}}}"#);
        let config: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, NodeConfig::new(authority));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = NodeConfig::load(Path::new("/nonexistent/veilpay/config.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/veilpay/config.json"));
    }

    #[test]
    fn explicit_path_wins() {
        let data = Path::new("/var/lib/veilpay");
        assert_eq!(resolve_path(data, None), data.join(CONFIG_FILE));
        let explicit = Path::new("/etc/veilpay.json");
        assert_eq!(resolve_path(data, Some(explicit)), explicit);
    }
}
