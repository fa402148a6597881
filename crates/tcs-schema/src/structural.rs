//! # Structural Validation
//!
//! JSON Schema (Draft 2020-12) conformance of a document, one layer at a
//! time: the root against the reporting organisation schema, each report
//! against the emissions report schema it declares, and each category
//! payload against the Tech Carbon Standard schema it declares.
//!
//! ## Schema Resolution
//!
//! Schemas are loaded from `*.schema.json` files and addressed by their
//! `$id`:
//!   `https://techcarbonstandard.org/schemas/<axis>/<version>/schema.json`
//!
//! Cross-schema `$ref`s (the shared `emissions.schema.json` definitions)
//! are served from memory by [`LocalSchemaRetriever`]; validation never
//! touches the network.
//!
//! Each schema is compiled at most once per [`SchemaValidator`]; compiled
//! validators are shared across layers, reports and calls.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonschema::{Retrieve, Uri, ValidationOptions, Validator};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use tcs_core::{
    FieldPath, OrganisationVersion, ReportVersion, SchemaVersion, TcsVersion, VersionAxis,
};

/// Resolves `$ref` URIs against schemas already loaded in memory.
struct LocalSchemaRetriever {
    schemas_by_uri: HashMap<String, Value>,
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        if let Some(value) = self.schemas_by_uri.get(uri_str) {
            return Ok(value.clone());
        }
        Err(format!("schema {uri_str} is not bundled").into())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Operational failure of the structural collaborator. Schema violations
/// are not errors; they are returned as [`StructuralError`] values.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// A schema file could not be read or parsed, or is not bundled.
    #[error("schema load error for '{schema_name}': {reason}")]
    SchemaLoadError {
        schema_name: String,
        reason: String,
    },

    /// The document file could not be loaded or parsed.
    #[error("document load error for '{path}': {reason}")]
    DocumentLoadError { path: String, reason: String },

    /// A schema did not compile.
    #[error("validator build error for schema '{schema_name}': {reason}")]
    ValidatorBuildError {
        schema_name: String,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralError {
    /// Location in the document.
    #[serde(serialize_with = "serialize_path")]
    pub path: FieldPath,
    pub message: String,
}

fn serialize_path<S: serde::Serializer>(path: &FieldPath, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(path)
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

// ─── Collaborator seam ───────────────────────────────────────────────

/// A structural checker keyed by the document's root schema version.
///
/// Nested layers are checked against the versions they declare. All
/// violations are collected; checking does not stop at the first.
pub trait StructuralCheck {
    fn check(
        &self,
        document: &Value,
        organisation: OrganisationVersion,
    ) -> Result<Vec<StructuralError>, SchemaValidationError>;
}

// ─── Schema validator ────────────────────────────────────────────────

/// A [`StructuralCheck`] backed by the `jsonschema` crate and a directory
/// of bundled schema files.
pub struct SchemaValidator {
    schema_dir: PathBuf,
    /// Parsed schemas keyed by `$id`.
    schemas: HashMap<String, Value>,
    /// Compiled validators keyed by `$id`, filled on first use.
    compiled: RwLock<HashMap<String, Arc<Validator>>>,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema_dir", &self.schema_dir)
            .field("schemas", &self.schemas.len())
            .field("compiled", &self.compiled.read().len())
            .finish()
    }
}

impl SchemaValidator {
    /// Load every `*.schema.json` file in `schema_dir`.
    ///
    /// # Errors
    ///
    /// `SchemaLoadError` if the directory cannot be read, a file is not
    /// JSON, or a schema has no `$id`.
    pub fn new(schema_dir: impl AsRef<Path>) -> Result<Self, SchemaValidationError> {
        let schema_dir = schema_dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&schema_dir).map_err(|e| {
            SchemaValidationError::SchemaLoadError {
                schema_name: schema_dir.display().to_string(),
                reason: format!("cannot read schema directory: {e}"),
            }
        })?;

        let mut schemas = HashMap::new();
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".schema.json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let value: Value = serde_json::from_str(&content).map_err(|e| {
                SchemaValidationError::SchemaLoadError {
                    schema_name: name.to_string(),
                    reason: format!("invalid JSON: {e}"),
                }
            })?;
            let id = value
                .get("$id")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaValidationError::SchemaLoadError {
                    schema_name: name.to_string(),
                    reason: "schema has no $id".to_string(),
                })?
                .to_string();
            schemas.insert(id, value);
        }

        tracing::debug!(dir = %schema_dir.display(), count = schemas.len(), "schemas loaded");
        Ok(Self {
            schema_dir,
            schemas,
            compiled: RwLock::new(HashMap::new()),
        })
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// The `$id`s of all loaded schemas, sorted.
    pub fn schema_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }

    /// Whether the schema for `version` on `axis` is loaded.
    pub fn has_schema(&self, axis: VersionAxis, version: &str) -> bool {
        self.schemas.contains_key(&axis.schema_url(version))
    }

    fn build_options(&self) -> ValidationOptions {
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        opts.with_retriever(LocalSchemaRetriever {
            schemas_by_uri: self.schemas.clone(),
        });
        opts
    }

    /// The compiled validator for `version` on `axis`.
    pub fn build_validator(
        &self,
        axis: VersionAxis,
        version: &str,
    ) -> Result<Arc<Validator>, SchemaValidationError> {
        self.build_by_id(&axis.schema_url(version))
    }

    /// The compiled validator for any loaded schema by its `$id`, e.g.
    /// [`tcs_core::ROUTER_SCHEMA_URL`]. Compiles on first request and
    /// returns the cached validator afterwards.
    pub fn build_by_id(&self, id: &str) -> Result<Arc<Validator>, SchemaValidationError> {
        if let Some(validator) = self.compiled.read().get(id) {
            return Ok(Arc::clone(validator));
        }

        let schema = self.schemas.get(id).ok_or_else(|| {
            SchemaValidationError::SchemaLoadError {
                schema_name: id.to_string(),
                reason: format!("schema not found in {}", self.schema_dir.display()),
            }
        })?;
        let validator = self
            .build_options()
            .build(schema)
            .map_err(|e| SchemaValidationError::ValidatorBuildError {
                schema_name: id.to_string(),
                reason: e.to_string(),
            })?;
        tracing::trace!(schema = id, "schema compiled");

        // A concurrent caller may have compiled the same schema; keep the first.
        let mut compiled = self.compiled.write();
        let entry = compiled
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(validator));
        Ok(Arc::clone(entry))
    }

    /// Validate one layer, rooting violation paths at `prefix`.
    fn check_layer(
        &self,
        instance: &Value,
        axis: VersionAxis,
        version: &str,
        prefix: &FieldPath,
        errors: &mut Vec<StructuralError>,
    ) -> Result<(), SchemaValidationError> {
        let validator = self.build_validator(axis, version)?;
        errors.extend(validator.iter_errors(instance).map(|e| StructuralError {
            path: FieldPath::from_json_pointer(&e.instance_path.to_string()).prefixed(prefix),
            message: e.to_string(),
        }));
        Ok(())
    }

    /// Read a document from a `.json`, `.yaml` or `.yml` file.
    pub fn load_document(path: &Path) -> Result<Value, SchemaValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchemaValidationError::DocumentLoadError {
                path: path.display().to_string(),
                reason: format!("cannot read file: {e}"),
            }
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        parse_document_text(&content, ext).map_err(|reason| {
            SchemaValidationError::DocumentLoadError {
                path: path.display().to_string(),
                reason,
            }
        })
    }
}

/// Parse document text as YAML when `ext` says so, JSON otherwise.
pub fn parse_document_text(content: &str, ext: &str) -> Result<Value, String> {
    match ext {
        "yaml" | "yml" => {
            serde_yaml::from_str::<Value>(content).map_err(|e| format!("invalid YAML: {e}"))
        }
        _ => serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}")),
    }
}

/// The `schema_version` string declared by `object`, parsed on `V`'s axis.
fn declared<V: SchemaVersion>(
    object: &Value,
    at: &FieldPath,
    errors: &mut Vec<StructuralError>,
) -> Option<V> {
    let path = at.field("schema_version");
    match object.get("schema_version").and_then(Value::as_str) {
        Some(raw) => match raw.parse::<V>() {
            Ok(v) => Some(v),
            Err(e) => {
                errors.push(StructuralError {
                    path,
                    message: e.to_string(),
                });
                None
            }
        },
        None => {
            errors.push(StructuralError {
                path,
                message: format!("missing {} schema_version", V::AXIS),
            });
            None
        }
    }
}

impl StructuralCheck for SchemaValidator {
    fn check(
        &self,
        document: &Value,
        organisation: OrganisationVersion,
    ) -> Result<Vec<StructuralError>, SchemaValidationError> {
        let mut errors = Vec::new();
        self.check_layer(
            document,
            VersionAxis::Organisation,
            organisation.as_str(),
            &FieldPath::root(),
            &mut errors,
        )?;

        let reports = document
            .get("emissions_reports")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (i, report) in reports.iter().enumerate() {
            let report_path = FieldPath::of("emissions_reports").index(i);
            if !report.is_object() {
                continue;
            }
            if let Some(version) = declared::<ReportVersion>(report, &report_path, &mut errors) {
                self.check_layer(
                    report,
                    VersionAxis::Report,
                    version.as_str(),
                    &report_path,
                    &mut errors,
                )?;
            }

            let Some(payload) = report.get("tech_carbon_standard").filter(|p| p.is_object()) else {
                continue;
            };
            let payload_path = report_path.field("tech_carbon_standard");
            if let Some(version) = declared::<TcsVersion>(payload, &payload_path, &mut errors) {
                self.check_layer(
                    payload,
                    VersionAxis::TechCarbonStandard,
                    version.as_str(),
                    &payload_path,
                    &mut errors,
                )?;
            }
        }

        tracing::debug!(violations = errors.len(), "structural check finished");
        Ok(errors)
    }
}
