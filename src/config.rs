//! Declarative EXIF field configuration
//!
//! ```json
//! {
//!   "name": "exif",
//!   "source": "image",
//!   "denormalized_fields": {"camera": "exifgetter:Model", "orientation": "get_orientation"}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{FieldError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Record field holding the cached EXIF map
    #[serde(default = "default_name")]
    pub name: String,

    /// File field to read metadata from
    #[serde(default)]
    pub source: Option<String>,

    /// Extract on save; when off the cache is only denormalized
    #[serde(default = "default_sync")]
    pub sync: bool,

    /// Target field to getter spec. Kept as raw JSON so that a wrongly typed
    /// value can be reported instead of failing deserialization.
    #[serde(default)]
    pub denormalized_fields: Value,
}

fn default_name() -> String {
    "exif".to_string()
}

fn default_sync() -> bool {
    true
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source: None,
            sync: default_sync(),
            denormalized_fields: Value::Null,
        }
    }
}

impl FieldConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path)?;
        serde_json::from_slice(&raw).map_err(FieldError::ConfigFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config: FieldConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, FieldConfig::default());
        assert_eq!(config.name, "exif");
        assert!(config.sync);
        assert!(config.source.is_none());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.json");
        std::fs::write(
            &path,
            r#"{"source": "image", "sync": false, "denormalized_fields": {"camera": "exifgetter:Model"}}"#,
        )
        .unwrap();

        let config = FieldConfig::from_json_file(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some("image"));
        assert!(!config.sync);
        assert_eq!(config.denormalized_fields["camera"], json!("exifgetter:Model"));
    }
}
