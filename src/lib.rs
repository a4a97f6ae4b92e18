//! exif_field - cached `exiftool` metadata for records with file attachments
//!
//! Extraction shells out to the system `exiftool` binary. Results are cached on
//! the owning record and only refreshed when the attached file changes; derived
//! values (camera model, orientation, capture time, ...) are copied into
//! sibling fields so they can be queried without touching the file again.

mod attachment;
pub mod config;
mod error;
mod exiftool;
pub mod field;
pub mod getters;
pub mod metadata;
mod metrics;
pub mod validation;

pub use attachment::{Attachment, ReadSeek};
pub use config::FieldConfig;
pub use error::{FieldError, Result};
pub use exiftool::{Exiftool, ExiftoolCommand, ExiftoolError, MetadataExtractor};
pub use field::{
    cache_state, CacheState, DenormalizationRule, DenormalizeReport, ExifField, ExifModel,
    UpdateOptions, UpdateOutcome,
};
pub use getters::{ExifError, Getter, Orientation, RecordingMode};
pub use metadata::{parse_exif_json, ExifMap, ExifTag};
pub use metrics::{FieldMetrics, MetricsSnapshot};
pub use validation::{validate, Diagnostic, DiagnosticCode, FieldKind, FieldSpec, RecordSchema};
