//! Definition-time checks for an EXIF field against its record type

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::config::FieldConfig;
use crate::exiftool::MetadataExtractor;
use crate::getters::Getter;

/// Stable diagnostic identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    ToolNotInstalled,
    SourceUnset,
    SourceNotFound,
    SourceWrongType,
    DenormalizedFieldsWrongType,
    TargetNotFound,
    TargetEditable,
    GetterNotCallable,
}

impl DiagnosticCode {
    pub fn id(&self) -> &'static str {
        match self {
            Self::ToolNotInstalled => "exiffield.E001",
            Self::SourceUnset => "exiffield.E002",
            Self::SourceNotFound => "exiffield.E003",
            Self::SourceWrongType => "exiffield.E004",
            Self::DenormalizedFieldsWrongType => "exiffield.E005",
            Self::TargetNotFound => "exiffield.E006",
            Self::TargetEditable => "exiffield.E007",
            Self::GetterNotCallable => "exiffield.E008",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    fn new(code: DiagnosticCode, message: String) -> Self {
        Self {
            code,
            message,
            hint: None,
        }
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn id(&self) -> &'static str {
        self.code.id()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id(), self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    File,
    Image,
    Text,
    Integer,
    DateTime,
    Json,
    Other,
}

impl FieldKind {
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File | Self::Image)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default = "default_editable")]
    pub editable: bool,
}

fn default_editable() -> bool {
    true
}

/// Shape of a host record type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            editable: true,
        });
        self
    }

    /// Add a field that users cannot edit, as required for denormalized targets
    pub fn derived_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            editable: false,
        });
        self
    }

    pub fn abstract_model(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Validate a declarative field configuration against a record type
pub fn validate(
    config: &FieldConfig,
    schema: &RecordSchema,
    extractor: &dyn MetadataExtractor,
) -> Vec<Diagnostic> {
    if schema.is_abstract {
        return Vec::new();
    }

    let mut errors = Vec::new();
    errors.extend(check_for_exiftool(extractor));
    errors.extend(check_denormalized_config(&config.denormalized_fields, schema));
    errors.extend(check_for_source(config.source.as_deref(), &config.name, schema));
    errors
}

pub(crate) fn check_for_exiftool(extractor: &dyn MetadataExtractor) -> Option<Diagnostic> {
    if extractor.is_available() {
        return None;
    }
    Some(
        Diagnostic::new(DiagnosticCode::ToolNotInstalled, "`exiftool` not found.".to_string())
            .hint("Please install `exiftool`."),
    )
}

pub(crate) fn check_for_source(
    source: Option<&str>,
    field_name: &str,
    schema: &RecordSchema,
) -> Option<Diagnostic> {
    let Some(source) = source.filter(|s| !s.is_empty()) else {
        return Some(
            Diagnostic::new(
                DiagnosticCode::SourceUnset,
                format!("`source` not set on {field_name}."),
            )
            .hint("Set `source` to an existing file field."),
        );
    };

    match schema.get(source) {
        None => Some(
            Diagnostic::new(
                DiagnosticCode::SourceNotFound,
                format!("`{source}` not found on {}.", schema.name),
            )
            .hint("Check spelling or add field to model."),
        ),
        Some(field) if !field.kind.is_file() => Some(Diagnostic::new(
            DiagnosticCode::SourceWrongType,
            format!("`{source}` on {} must be a file field.", schema.name),
        )),
        Some(_) => None,
    }
}

/// Target checks shared by declarative and programmatic configuration
pub(crate) fn check_target(target: &str, schema: &RecordSchema) -> Option<Diagnostic> {
    let Some(field) = schema.get(target) else {
        return Some(
            Diagnostic::new(
                DiagnosticCode::TargetNotFound,
                format!("`{target}` not found on {}.", schema.name),
            )
            .hint("Check spelling or add field to model."),
        );
    };
    if field.editable {
        return Some(
            Diagnostic::new(
                DiagnosticCode::TargetEditable,
                format!("`{target}` on {} should not be editable.", schema.name),
            )
            .hint(format!("Mark `{target}` as not editable.")),
        );
    }
    None
}

fn check_denormalized_config(fields: &Value, schema: &RecordSchema) -> Vec<Diagnostic> {
    let entries = match fields {
        Value::Null => return Vec::new(),
        Value::Object(entries) => entries,
        _ => {
            return vec![Diagnostic::new(
                DiagnosticCode::DenormalizedFieldsWrongType,
                format!("`denormalized_fields` on {} should be a mapping.", schema.name),
            )
            .hint("Map each target field to a getter spec.")]
        }
    };

    let mut errors = Vec::new();
    for (target, spec) in entries {
        let Some(field) = schema.get(target) else {
            // nothing else to check for a field that does not exist
            errors.extend(check_target(target, schema));
            continue;
        };
        if field.editable {
            errors.extend(check_target(target, schema));
        }

        let callable = spec.as_str().and_then(Getter::from_spec).is_some();
        if !callable {
            errors.push(
                Diagnostic::new(
                    DiagnosticCode::GetterNotCallable,
                    format!("Value for `{target}` on {} should be a getter.", schema.name),
                )
                .hint("Use `exifgetter:<Tag>` or the name of a built-in getter."),
            );
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;
    use crate::exiftool::ExiftoolError;
    use serde_json::json;

    struct Tool(bool);

    impl MetadataExtractor for Tool {
        fn is_available(&self) -> bool {
            self.0
        }

        fn extract(&self, _file: &mut Attachment) -> Result<Vec<u8>, ExiftoolError> {
            Ok(b"[]".to_vec())
        }
    }

    fn schema() -> RecordSchema {
        RecordSchema::new("Image")
            .field("image", FieldKind::Image)
            .field("name", FieldKind::Integer)
            .field("camera", FieldKind::Text)
            .derived_field("datetaken", FieldKind::DateTime)
    }

    fn config(value: Value) -> FieldConfig {
        serde_json::from_value(value).unwrap()
    }

    fn ids(errors: &[Diagnostic]) -> Vec<&'static str> {
        errors.iter().map(Diagnostic::id).collect()
    }

    #[test]
    fn test_exiftool() {
        let cfg = config(json!({"source": "image"}));

        assert!(validate(&cfg, &schema(), &Tool(true)).is_empty());

        let errors = validate(&cfg, &schema(), &Tool(false));
        assert_eq!(ids(&errors), ["exiffield.E001"]);
    }

    #[test]
    fn test_source() {
        let cases = [
            (json!({}), "exiffield.E002"),
            (json!({"source": "foobar"}), "exiffield.E003"),
            (json!({"source": "name"}), "exiffield.E004"),
        ];
        for (cfg, expected) in cases {
            let errors = validate(&config(cfg), &schema(), &Tool(true));
            assert_eq!(ids(&errors), [expected]);
        }
    }

    #[test]
    fn test_fields() {
        let cases = [
            (json!([]), "exiffield.E005"),
            (json!({"model_field": "exifgetter:Model"}), "exiffield.E006"),
            (json!({"camera": "exifgetter:Model"}), "exiffield.E007"),
            (json!({"datetaken": "DateTimeOriginal"}), "exiffield.E008"),
            (json!({"datetaken": 42}), "exiffield.E008"),
        ];
        for (fields, expected) in cases {
            let cfg = config(json!({"source": "image", "denormalized_fields": fields}));
            let errors = validate(&cfg, &schema(), &Tool(true));
            assert_eq!(ids(&errors), [expected], "{fields}");
        }
    }

    #[test]
    fn test_valid_definition() {
        let cfg = config(json!({
            "source": "image",
            "denormalized_fields": {"datetaken": "get_capture_moment"}
        }));
        assert!(validate(&cfg, &schema(), &Tool(true)).is_empty());
    }

    #[test]
    fn test_abstract_schema_is_skipped() {
        let cfg = config(json!({}));
        let schema = RecordSchema::new("Base").abstract_model();
        assert!(validate(&cfg, &schema, &Tool(false)).is_empty());
    }

    #[test]
    fn test_schema_from_json() {
        let schema: RecordSchema = serde_json::from_value(json!({
            "name": "Image",
            "fields": [
                {"name": "image", "kind": "image"},
                {"name": "camera", "kind": "text", "editable": false}
            ]
        }))
        .unwrap();
        assert!(schema.get("image").unwrap().editable);
        assert!(!schema.get("camera").unwrap().editable);
        assert!(!schema.is_abstract);
    }

    #[test]
    fn test_display() {
        let diagnostic = check_for_source(None, "exif", &schema()).unwrap();
        assert_eq!(
            diagnostic.to_string(),
            "exiffield.E002: `source` not set on exif. (hint: Set `source` to an existing file field.)"
        );
    }
}
