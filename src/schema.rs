//! Per-type resource models used to shape attribute trees and validate commits.
//!
//! A model is a JSON Schema object whose `properties` describe attributes. Properties
//! carrying a `relation` key describe relationships instead:
//!
//! ```json
//! {"properties": {
//!     "lease-id": {"type": ["string", "null"]},
//!     "user-account": {"relation": "to-one", "resource": ["user-accounts"]}
//! }}
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{JsonApiError, Result};

/// Declared arity of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// A relationship declaration extracted from a property spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub cardinality: Cardinality,
    pub allowed_types: Vec<String>,
}

impl RelationSpec {
    /// Returns `None` for plain attribute properties.
    pub fn from_property(spec: &Value) -> Option<Self> {
        let cardinality = match spec.get("relation")?.as_str()? {
            "to-one" => Cardinality::ToOne,
            "to-many" => Cardinality::ToMany,
            _ => return None,
        };
        let allowed_types = spec
            .get("resource")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            cardinality,
            allowed_types,
        })
    }
}

/// Contract for the model registry consulted by the session.
pub trait Schema: Send + Sync + 'static {
    /// The model for `resource_type`, or `None` when the type is unknown.
    fn schema_for_type(&self, resource_type: &str) -> Option<&Value>;

    /// Rejects attribute data that does not satisfy the model.
    fn validate(&self, resource_type: &str, attributes: &Value) -> Result<()>;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Looks up the property schema of a dotted attribute path, e.g. `valid-for.start-datetime`.
    /// An empty path returns the whole model; `meta` is always schemaless.
    fn find_spec(&self, resource_type: &str, path: &str) -> Option<&Value> {
        if path == "meta" || path.ends_with(".meta") {
            return None;
        }
        let mut spec = self.schema_for_type(resource_type)?;
        if path.is_empty() {
            return Some(spec);
        }
        for part in path.split('.') {
            spec = spec.get("properties")?.get(part)?;
        }
        Some(spec)
    }

    /// Relationship declarations of a type, in declaration order.
    fn relations(&self, resource_type: &str) -> Vec<(String, RelationSpec)> {
        properties(self.schema_for_type(resource_type))
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(name, spec)| {
                        RelationSpec::from_property(spec).map(|r| (name.clone(), r))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub(crate) fn properties(spec: Option<&Value>) -> Option<&Map<String, Value>> {
    spec?.get("properties")?.as_object()
}

/// The disabled schema: no shaping, no validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl Schema for NoSchema {
    fn schema_for_type(&self, _resource_type: &str) -> Option<&Value> {
        None
    }

    fn validate(&self, _resource_type: &str, _attributes: &Value) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// A registry of JSON Schema models keyed by resource type.
pub struct ModelSchema {
    models: Map<String, Value>,
    validators: HashMap<String, jsonschema::Validator>,
}

impl std::fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSchema")
            .field("types", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelSchema {
    /// Builds the registry from `{type: model, ...}`, compiling each model once.
    pub fn new(models: Value) -> Result<Self> {
        let Value::Object(models) = models else {
            return Err(JsonApiError::validation(None, "schema must be an object keyed by resource type"));
        };
        let mut validators = HashMap::with_capacity(models.len());
        for (resource_type, model) in &models {
            let validator = jsonschema::Validator::new(model).map_err(|e| {
                JsonApiError::validation(Some(resource_type), format!("invalid model: {e}"))
            })?;
            validators.insert(resource_type.clone(), validator);
        }
        debug!(types = models.len(), "Compiled resource models");
        Ok(Self { models, validators })
    }

    /// Registers one more model, replacing an existing one of the same type.
    pub fn add_model(&mut self, resource_type: impl Into<String>, model: Value) -> Result<()> {
        let resource_type = resource_type.into();
        let validator = jsonschema::Validator::new(&model).map_err(|e| {
            JsonApiError::validation(Some(&resource_type), format!("invalid model: {e}"))
        })?;
        self.validators.insert(resource_type.clone(), validator);
        self.models.insert(resource_type, model);
        Ok(())
    }
}

impl Schema for ModelSchema {
    fn schema_for_type(&self, resource_type: &str) -> Option<&Value> {
        self.models.get(resource_type)
    }

    fn validate(&self, resource_type: &str, attributes: &Value) -> Result<()> {
        let Some(validator) = self.validators.get(resource_type) else {
            return Ok(());
        };
        if validator.is_valid(attributes) {
            return Ok(());
        }
        let messages: Vec<String> = validator.iter_errors(attributes).map(|e| e.to_string()).collect();
        Err(JsonApiError::Validation {
            resource_type: Some(resource_type.to_string()),
            messages,
        })
    }

    fn is_enabled(&self) -> bool {
        !self.models.is_empty()
    }
}
