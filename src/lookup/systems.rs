//! Static table of known systems keyed by MAC prefix.
//!
//! The file is a flat JSON object whose keys are the first eight characters of
//! a MAC address in colon form (`"00:11:22"`) and whose values are the names to
//! report, e.g.
//!
//! ```json
//! { "b8:27:eb": "Raspberry Pi", "00:1b:63": "Apple" }
//! ```

use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error_handling::types::ConfigError;

const PREFIX_LEN: usize = 8;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SystemTable {
    systems: HashMap<String, String>,
}

impl SystemTable {
    pub fn new(systems: HashMap<String, String>) -> Self {
        Self { systems }
    }

    /// Loads the table. A missing file gives an empty table; a file that is
    /// not a JSON object of strings is an error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "System table {} not found, system lookups will be empty",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::IoError(e)),
        };
        let table = Self::from_json(&content)?;
        info!(
            "Loaded {} system prefixes from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let systems: HashMap<String, String> =
            serde_json::from_str(content).map_err(|e| ConfigError::JsonError(e.to_string()))?;
        Ok(Self::new(systems))
    }

    /// Name for the system owning `mac`, matched on its first eight characters.
    pub fn system(&self, mac: &str) -> Option<&str> {
        let prefix = mac.get(..PREFIX_LEN)?;
        self.systems.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table() -> SystemTable {
        SystemTable::from_json(r#"{"b8:27:eb": "Raspberry Pi", "00:1b:63": "Apple"}"#).unwrap()
    }

    #[test]
    fn test_lookup_uses_first_eight_characters() {
        let table = table();
        assert_eq!(table.system("b8:27:eb:12:34:56"), Some("Raspberry Pi"));
        assert_eq!(table.system("00:1b:63"), Some("Apple"));
        assert_eq!(table.system("00:1b:64:00:00:00"), None);
    }

    #[test]
    fn test_short_or_odd_input_misses() {
        let table = table();
        assert_eq!(table.system("b8:27"), None);
        assert_eq!(table.system(""), None);
        // a multi-byte character straddling the prefix boundary
        assert_eq!(table.system("b8:27:eé"), None);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"aa:bb:cc": "Printer"}}"#).unwrap();
        let table = SystemTable::from_file(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.system("aa:bb:cc:dd:ee:ff"), Some("Printer"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = SystemTable::from_file(&dir.path().join("systems.json")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"["not", "an", "object"]"#).unwrap();
        assert!(matches!(
            SystemTable::from_file(file.path()),
            Err(ConfigError::JsonError(_))
        ));
    }
}
