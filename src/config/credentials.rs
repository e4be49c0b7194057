//! API key storage.
//!
//! The key is kept apart from `config.json` in `credentials.json`, written
//! with owner-only permissions on unix. The engine treats it as an opaque
//! string.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Credentials {
    /// Load from `path`; a missing file means no stored credentials.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file exists but is unreadable or malformed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read credentials: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse credentials: {e}")))
    }

    /// Write to `path` (temp file + rename, mode 0600).
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize credentials: {e}")))?;
        super::atomic_write(path, json.as_bytes())
            .map_err(|e| Error::Config(format!("Failed to write credentials: {e}")))
    }

    /// Key with the middle hidden, for display.
    #[must_use]
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(mask)
    }
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credentials.json");

        assert!(Credentials::load_from(&path).unwrap().api_key.is_none());

        let creds = Credentials {
            api_key: Some("hk_live_0123456789".into()),
        };
        creds.save_to(&path).unwrap();
        assert_eq!(Credentials::load_from(&path).unwrap(), creds);
        assert!(!temp.path().join("credentials.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("credentials.json");
        Credentials {
            api_key: Some("secret".into()),
        }
        .save_to(&path)
        .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "*****");
        assert_eq!(mask("hk_live_0123456789"), "hk_l...6789");
    }
}
