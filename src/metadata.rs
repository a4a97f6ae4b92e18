//! Cached EXIF data in the shape produced by `exiftool -j -l`
//!
//! Every tag is stored as `{"desc": .., "val": .., "num": ..}`:
//!
//! ```json
//! {
//!   "Model":    {"desc": "Camera Model Name", "val": "DMC-GX7"},
//!   "FileSize": {"desc": "File Size", "val": "4.7 MB", "num": 4915200}
//! }
//! ```
//!
//! The map is what gets persisted on the owning record, so its serialized form
//! is a plain JSON object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{FieldError, Result};
use crate::getters::ExifError;

/// One measured or derived property of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExifTag {
    /// Human readable tag name, e.g. "Camera Model Name"
    #[serde(rename = "desc", default)]
    pub description: String,

    /// Display value
    #[serde(rename = "val", default)]
    pub value: Value,

    /// Raw numeric form, only when exiftool reports one that differs from `val`
    #[serde(rename = "num", default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<Value>,
}

impl ExifTag {
    pub fn new(description: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            description: description.into(),
            value: value.into(),
            numeric_value: None,
        }
    }

    pub fn with_numeric(mut self, numeric: impl Into<Value>) -> Self {
        self.numeric_value = Some(numeric.into());
        self
    }

    /// Numeric reading of the tag: `num` if reported, `val` otherwise
    pub fn as_f64(&self) -> Option<f64> {
        self.numeric_value
            .as_ref()
            .and_then(value_as_f64)
            .or_else(|| value_as_f64(&self.value))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Tag name to tag mapping; empty when nothing has been extracted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExifMap(BTreeMap<String, ExifTag>);

impl ExifMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ExifTag> {
        self.0.get(name)
    }

    /// Like [`ExifMap::get`] but a missing tag is an error
    pub fn tag(&self, name: &str) -> std::result::Result<&ExifTag, ExifError> {
        self.0
            .get(name)
            .ok_or_else(|| ExifError::KeyNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, tag: ExifTag) -> Option<ExifTag> {
        self.0.insert(name.into(), tag)
    }

    pub fn remove(&mut self, name: &str) -> Option<ExifTag> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExifTag)> {
        self.0.iter()
    }

    /// Value of the `FileName` tag, as recorded at extraction time
    pub fn file_name(&self) -> Option<&str> {
        self.get("FileName").and_then(ExifTag::as_str)
    }
}

impl FromIterator<(String, ExifTag)> for ExifMap {
    fn from_iter<I: IntoIterator<Item = (String, ExifTag)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse raw `exiftool -j -l` output.
///
/// Returns `Ok(None)` for an empty result array (unsupported or unreadable
/// file). Entries that are not `{desc, val, num}` objects, such as the bare
/// `SourceFile` string, are wrapped so the map keeps a single shape.
pub fn parse_exif_json(raw: &[u8]) -> Result<Option<ExifMap>> {
    let parsed: Vec<Map<String, Value>> =
        serde_json::from_slice(raw).map_err(FieldError::InvalidOutput)?;

    let Some(tags) = parsed.into_iter().next() else {
        return Ok(None);
    };

    let map = tags
        .into_iter()
        .map(|(name, value)| {
            let tag = normalize_tag(&name, value);
            (name, tag)
        })
        .collect();

    Ok(Some(map))
}

fn normalize_tag(name: &str, value: Value) -> ExifTag {
    let is_tag = value.as_object().is_some_and(|obj| obj.contains_key("val"));
    if is_tag {
        if let Ok(tag) = serde_json::from_value::<ExifTag>(value.clone()) {
            return tag;
        }
    }
    ExifTag::new(name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_long_format() {
        let raw = br#"[{
            "SourceFile": "-",
            "Model": {"desc": "Camera Model Name", "val": "DMC-GX7"},
            "Aperture": {"desc": "Aperture", "val": 1.7},
            "FileSize": {"desc": "File Size", "val": "4.7 MB", "num": 4915200}
        }]"#;

        let exif = parse_exif_json(raw).unwrap().unwrap();

        assert_eq!(exif.len(), 4);
        assert_eq!(
            exif.get("Model"),
            Some(&ExifTag::new("Camera Model Name", "DMC-GX7"))
        );
        assert_eq!(exif.get("Aperture").unwrap().value, json!(1.7));
        assert_eq!(exif.get("FileSize").unwrap().as_f64(), Some(4915200.0));
        // bare values are wrapped
        assert_eq!(exif.get("SourceFile"), Some(&ExifTag::new("SourceFile", "-")));
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_exif_json(b"[]").unwrap().is_none());
    }

    #[test]
    fn test_parse_garbage_is_invalid_output() {
        let err = parse_exif_json(b"Error: File not found").unwrap_err();
        assert!(matches!(err, FieldError::InvalidOutput(_)));
    }

    #[test]
    fn test_persisted_shape() {
        let mut exif = ExifMap::new();
        exif.insert("FileName", ExifTag::new("Filename", "a.jpg"));
        exif.insert(
            "Orientation",
            ExifTag::new("Orientation", "Rotate 90 CW").with_numeric(6),
        );

        let stored = serde_json::to_value(&exif).unwrap();
        assert_eq!(
            stored,
            json!({
                "FileName": {"desc": "Filename", "val": "a.jpg"},
                "Orientation": {"desc": "Orientation", "val": "Rotate 90 CW", "num": 6}
            })
        );

        let loaded: ExifMap = serde_json::from_value(stored).unwrap();
        assert_eq!(loaded, exif);
        assert_eq!(loaded.file_name(), Some("a.jpg"));
    }

    #[test]
    fn test_missing_desc_defaults_to_empty() {
        let exif: ExifMap = serde_json::from_value(json!({"MIMEType": {"val": "image/jpeg"}})).unwrap();
        assert_eq!(exif.get("MIMEType").unwrap().description, "");
    }

    #[test]
    fn test_numeric_fallbacks() {
        assert_eq!(ExifTag::new("", 300).as_f64(), Some(300.0));
        assert_eq!(ExifTag::new("", "300").as_f64(), Some(300.0));
        assert_eq!(ExifTag::new("", "Horizontal (normal)").as_f64(), None);
        assert_eq!(
            ExifTag::new("", "Horizontal (normal)").with_numeric(1).as_f64(),
            Some(1.0)
        );
    }
}
