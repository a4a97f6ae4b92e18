//! EXIF field attached to a host record
//!
//! The field keeps the `exiftool` output for the record's file cached under
//! its own name and copies derived values into sibling fields. Hosts call
//! [`ExifField::on_loaded`] after constructing or loading a record and
//! [`ExifField::before_save`] right before persisting it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use exif_field::{getters, Exiftool, ExifField};
//!
//! let field = ExifField::new("exif", Arc::new(Exiftool::new()))
//!     .source("image")
//!     .denormalized_field("camera", getters::exifgetter("Model"))
//!     .denormalized_field("orientation", getters::Getter::from_spec("get_orientation").unwrap());
//! ```

use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::attachment::Attachment;
use crate::config::FieldConfig;
use crate::error::{FieldError, Result};
use crate::exiftool::MetadataExtractor;
use crate::getters::Getter;
use crate::metadata::{parse_exif_json, ExifMap, ExifTag};
use crate::metrics::FieldMetrics;
use crate::validation::{self, Diagnostic, RecordSchema};

/// Record access needed by [`ExifField`]; implemented by host record types.
pub trait ExifModel {
    /// Type name used in log messages, e.g. `Image`
    fn model_name(&self) -> &str;

    fn attachment(&self, field: &str) -> Option<&Attachment>;

    fn attachment_mut(&mut self, field: &str) -> Option<&mut Attachment>;

    fn exif(&self, field: &str) -> Option<&ExifMap>;

    fn set_exif(&mut self, field: &str, exif: ExifMap);

    fn set_value(&mut self, field: &str, value: Value);

    /// Persist the record; only used for committed updates
    fn save(&mut self) -> std::result::Result<(), Box<dyn StdError + Send + Sync>>;
}

/// Freshness of cached metadata relative to the attached file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

/// Decide whether `cached` still describes `file`.
///
/// Uncommitted uploads are always stale since their stored name is not
/// settled yet.
pub fn cache_state(cached: &ExifMap, file: &Attachment) -> CacheState {
    if cached.is_empty() {
        return CacheState::Empty;
    }
    let filename = file.file_name();
    if cached.file_name().unwrap_or_default() != filename || !file.is_committed() {
        return CacheState::Stale;
    }
    CacheState::Fresh
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Extract even if the cache is fresh
    pub force: bool,
    /// Save the record after a successful extraction
    pub commit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No file attached, cache untouched
    NoFile,
    /// Cache matches the file, extractor not called
    Fresh,
    /// Cache replaced with new metadata
    Extracted,
    /// Extractor returned nothing for this file
    NoMetadata,
    /// Extraction failed, previous cache kept
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenormalizeReport {
    pub applied: Vec<String>,
    /// Getter returned an empty value, target left as is
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DenormalizationRule {
    pub target: String,
    pub getter: Getter,
}

pub struct ExifField {
    name: String,
    source: Option<String>,
    sync: bool,
    denormalized_fields: Vec<DenormalizationRule>,
    extractor: Arc<dyn MetadataExtractor>,
    metrics: Arc<FieldMetrics>,
}

impl ExifField {
    pub fn new(name: impl Into<String>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self {
            name: name.into(),
            source: None,
            sync: true,
            denormalized_fields: Vec::new(),
            extractor,
            metrics: FieldMetrics::new(),
        }
    }

    /// Build a field from declarative configuration, rejecting any
    /// configuration that does not validate against `schema`.
    pub fn from_config(
        config: &FieldConfig,
        schema: &RecordSchema,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self> {
        let diagnostics = validation::validate(config, schema, extractor.as_ref());
        if !diagnostics.is_empty() {
            return Err(FieldError::Config(diagnostics));
        }

        let mut field = Self::new(config.name.clone(), extractor).sync(config.sync);
        field.source = config.source.clone();
        if let Some(entries) = config.denormalized_fields.as_object() {
            for (target, spec) in entries {
                // validated above
                if let Some(getter) = spec.as_str().and_then(Getter::from_spec) {
                    field = field.denormalized_field(target.clone(), getter);
                }
            }
        }
        Ok(field)
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn denormalized_field(mut self, target: impl Into<String>, getter: Getter) -> Self {
        self.denormalized_fields.push(DenormalizationRule {
            target: target.into(),
            getter,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[DenormalizationRule] {
        &self.denormalized_fields
    }

    pub fn metrics(&self) -> Arc<FieldMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Definition-time diagnostics for this field on `schema`
    pub fn check(&self, schema: &RecordSchema) -> Vec<Diagnostic> {
        if schema.is_abstract {
            return Vec::new();
        }
        let mut errors = Vec::new();
        errors.extend(validation::check_for_exiftool(self.extractor.as_ref()));
        for rule in &self.denormalized_fields {
            errors.extend(validation::check_target(&rule.target, schema));
        }
        errors.extend(validation::check_for_source(
            self.source.as_deref(),
            &self.name,
            schema,
        ));
        errors
    }

    /// Record constructed or loaded: refresh derived fields from the cache
    pub fn on_loaded<R: ExifModel + ?Sized>(&self, record: &mut R) -> DenormalizeReport {
        self.denormalize_exif(record)
    }

    /// Record about to be saved: extract if needed, then denormalize.
    ///
    /// Returns the update outcome, or `None` when extraction on save is off.
    pub fn before_save<R: ExifModel + ?Sized>(&self, record: &mut R) -> Option<UpdateOutcome> {
        let outcome = if self.sync {
            match self.update_exif(record, UpdateOptions::default()) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!("EXIF update for {} failed: {}", record.model_name(), e);
                    None
                }
            }
        } else {
            None
        };
        self.denormalize_exif(record);
        outcome
    }

    /// Load EXIF data from the attached file if the cache is stale.
    ///
    /// Extraction problems are logged and reported through the outcome; the
    /// only error returned is a failed save when `options.commit` is set.
    pub fn update_exif<R: ExifModel + ?Sized>(
        &self,
        record: &mut R,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        let Some(source) = self.source.as_deref() else {
            return Ok(UpdateOutcome::NoFile);
        };
        let Some(file) = record.attachment(source) else {
            return Ok(UpdateOutcome::NoFile);
        };

        let filename = file.file_name();
        let state = match record.exif(&self.name) {
            Some(cached) => cache_state(cached, file),
            None => CacheState::Empty,
        };

        if state == CacheState::Fresh && !options.force {
            debug!("EXIF for {} is up to date", filename);
            FieldMetrics::incr(&self.metrics.fresh_skips);
            return Ok(UpdateOutcome::Fresh);
        }

        let Some(file) = record.attachment_mut(source) else {
            return Ok(UpdateOutcome::NoFile);
        };

        let raw = match self.extractor.extract(file) {
            Ok(raw) => raw,
            Err(e) => return Ok(self.extraction_failed(&filename, e.into())),
        };

        let mut exif = match parse_exif_json(&raw) {
            Ok(Some(exif)) => exif,
            Ok(None) => {
                debug!("No metadata available for {}", filename);
                FieldMetrics::incr(&self.metrics.empty_results);
                return Ok(UpdateOutcome::NoMetadata);
            }
            Err(e) => return Ok(self.extraction_failed(&filename, e)),
        };

        if !exif.contains("FileName") {
            // Piped uploads carry no file name. Assume no other file with the
            // same name shows up later; at worst the file is extracted twice.
            exif.insert("FileName", ExifTag::new("Filename", filename.clone()));
        }

        info!("Extracted {} EXIF tags from {}", exif.len(), filename);
        record.set_exif(&self.name, exif);
        FieldMetrics::incr(&self.metrics.extractions);

        if options.commit {
            record.save().map_err(FieldError::Persist)?;
        }

        Ok(UpdateOutcome::Extracted)
    }

    fn extraction_failed(&self, filename: &str, e: FieldError) -> UpdateOutcome {
        error!("Could not read metadata from file {}: {}", filename, e);
        FieldMetrics::incr(&self.metrics.extraction_failures);
        UpdateOutcome::Failed(e.to_string())
    }

    /// Copy derived values from the cached EXIF into their target fields.
    ///
    /// A failing getter is logged and leaves its target untouched; empty
    /// values never overwrite a target.
    pub fn denormalize_exif<R: ExifModel + ?Sized>(&self, record: &mut R) -> DenormalizeReport {
        let mut report = DenormalizeReport::default();

        let updates = {
            let Some(exif) = record.exif(&self.name).filter(|e| !e.is_empty()) else {
                return report;
            };

            let mut updates = Vec::new();
            for rule in &self.denormalized_fields {
                match rule.getter.call(exif) {
                    Ok(value) if is_empty_value(&value) => report.skipped.push(rule.target.clone()),
                    Ok(value) => updates.push((rule.target.clone(), value)),
                    Err(e) => {
                        warn!(
                            "Could not execute `{}` to extract value for `{}.{}`: {}",
                            rule.getter.name(),
                            record.model_name(),
                            rule.target,
                            e
                        );
                        FieldMetrics::incr(&self.metrics.denormalize_failures);
                        report.failed.push(rule.target.clone());
                    }
                }
            }
            updates
        };

        for (target, value) in updates {
            record.set_value(&target, value);
            report.applied.push(target);
        }
        report
    }
}

impl fmt::Debug for ExifField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExifField")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("sync", &self.sync)
            .field("denormalized_fields", &self.denormalized_fields)
            .finish_non_exhaustive()
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
