//! Typed values derived from cached EXIF data
//!
//! All getters are pure functions over an [`ExifMap`]. Missing or malformed
//! tags are reported as [`ExifError`] unless a getter documents a default.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::metadata::ExifMap;

const DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Candidate tags for the capture moment, most trusted first
const DATETIME_TAGS: [&str; 2] = ["DateTimeOriginal", "GPSDateTime"];

#[derive(Debug, Error)]
pub enum ExifError {
    #[error("Tag not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid value for {tag}: expected {expected}")]
    InvalidValue { tag: String, expected: &'static str },

    #[error("{0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    Timelapse,
    Burst,
    Bracketing,
    Single,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        })
    }
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timelapse => "timelapse",
            Self::Burst => "burst",
            Self::Bracketing => "bracketing",
            Self::Single => "single",
        })
    }
}

type GetterFn = dyn Fn(&ExifMap) -> Result<Value, ExifError> + Send + Sync;

/// A named getter whose result can be stored in a record field
#[derive(Clone)]
pub struct Getter {
    name: String,
    func: Arc<GetterFn>,
}

impl Getter {
    pub fn new<T, F>(name: impl Into<String>, func: F) -> Self
    where
        T: Serialize,
        F: Fn(&ExifMap) -> Result<T, ExifError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |exif: &ExifMap| -> Result<Value, ExifError> {
                Ok(serde_json::to_value(func(exif)?)?)
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, exif: &ExifMap) -> Result<Value, ExifError> {
        (self.func)(exif)
    }

    /// Resolve a configuration spec.
    ///
    /// Accepts `exifgetter:<Tag>` or the name of a built-in getter.
    pub fn from_spec(spec: &str) -> Option<Self> {
        if let Some(tag) = spec.strip_prefix("exifgetter:") {
            return (!tag.is_empty()).then(|| exifgetter(tag));
        }
        let getter = match spec {
            "get_file_kind" => Self::new(spec, get_file_kind),
            "get_capture_moment" => Self::new(spec, get_capture_moment),
            "get_orientation" => Self::new(spec, get_orientation),
            "get_recording_mode" => Self::new(spec, get_recording_mode),
            "get_sequence_position" => Self::new(spec, |exif: &ExifMap| {
                Ok::<_, ExifError>(get_sequence_position(exif))
            }),
            _ => return None,
        };
        Some(getter)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Getter").field(&self.name).finish()
    }
}

/// Unmodified display value of `tag`
pub fn exifgetter(tag: &str) -> Getter {
    let tag = tag.to_string();
    Getter::new(format!("exifgetter('{tag}')"), move |exif: &ExifMap| {
        Ok::<_, ExifError>(exif.tag(&tag)?.value.clone())
    })
}

/// File kind, e.g. `image` for `image/jpeg`
pub fn get_file_kind(exif: &ExifMap) -> Result<String, ExifError> {
    let mime = exif
        .tag("MIMEType")?
        .as_str()
        .ok_or_else(|| ExifError::InvalidValue {
            tag: "MIMEType".to_string(),
            expected: "string",
        })?;
    Ok(mime.split('/').next().unwrap_or_default().to_string())
}

/// When the file was captured.
///
/// The first candidate tag present decides: an unparseable value is an error
/// even if a later candidate would parse.
pub fn get_capture_moment(exif: &ExifMap) -> Result<NaiveDateTime, ExifError> {
    for key in DATETIME_TAGS {
        let Some(tag) = exif.get(key) else {
            continue;
        };
        let raw = match &tag.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
            .map_err(|e| ExifError::Parse(format!("Could not parse {raw}: {e}")));
    }
    Err(ExifError::Parse("Could not find date".to_string()))
}

pub fn get_orientation(exif: &ExifMap) -> Result<Orientation, ExifError> {
    let orientation = numeric(exif, "Orientation")?;
    let mut width = numeric(exif, "ImageWidth")?;
    let mut height = numeric(exif, "ImageHeight")?;

    // codes 5-8 are rotated by 90 degrees
    if orientation > 4.0 {
        std::mem::swap(&mut width, &mut height);
    }

    if width < height {
        Ok(Orientation::Portrait)
    } else {
        Ok(Orientation::Landscape)
    }
}

/// Burst and bracketing take precedence over time lapse.
pub fn get_recording_mode(exif: &ExifMap) -> Result<RecordingMode, ExifError> {
    match optional_numeric(exif, "BurstMode") {
        Some(n) if n == 1.0 => return Ok(RecordingMode::Burst),
        Some(n) if n == 2.0 => return Ok(RecordingMode::Bracketing),
        _ => {}
    }
    if optional_numeric(exif, "TimerRecording") == Some(1.0) {
        return Ok(RecordingMode::Timelapse);
    }
    Ok(RecordingMode::Single)
}

/// Position within a recording sequence, 0 if unknown
pub fn get_sequence_position(exif: &ExifMap) -> u64 {
    optional_numeric(exif, "SequenceNumber")
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64)
        .map(|n| n as u64)
        .unwrap_or(0)
}

fn numeric(exif: &ExifMap, tag: &str) -> Result<f64, ExifError> {
    exif.tag(tag)?.as_f64().ok_or_else(|| ExifError::InvalidValue {
        tag: tag.to_string(),
        expected: "number",
    })
}

fn optional_numeric(exif: &ExifMap, tag: &str) -> Option<f64> {
    exif.get(tag).and_then(|t| t.as_f64())
}
