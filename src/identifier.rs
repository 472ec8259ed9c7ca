//! Resource identity and the values accepted by relationship setters.

use serde_json::{json, Value};

use crate::error::{JsonApiError, Result};
use crate::resource::Resource;

/// The `(type, id)` pair identifying a resource; the identity-map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentifier {
    pub resource_type: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Parses a resource identifier object. `id` may be a string or a number.
    pub fn from_json(value: &Value) -> Result<Self> {
        let resource_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonApiError::validation(None, format!("identifier without type: {value}")))?;
        let id = match value.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(JsonApiError::validation(
                    Some(resource_type),
                    format!("identifier without id: {value}"),
                ))
            }
        };
        Ok(Self::new(resource_type, id))
    }

    pub fn to_json(&self) -> Value {
        json!({"id": self.id, "type": self.resource_type})
    }
}

impl std::fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// One target supplied to a relationship setter.
#[derive(Debug, Clone)]
pub enum RelatedValue {
    /// A bare id. The type is taken from the relationship's single allowed type.
    Id(String),
    Identifier(ResourceIdentifier),
    Resource(Resource),
}

impl RelatedValue {
    /// Turns the value into a typed identifier, checking it against `allowed_types`.
    pub fn into_identifier(self, relationship: &str, allowed_types: &[String]) -> Result<ResourceIdentifier> {
        self.bind(relationship)?.into_identifier(relationship, allowed_types)
    }

    /// Reads the identity of a resource target now, so that later steps need no lock on it.
    pub(crate) fn bind(self, relationship: &str) -> Result<BoundTarget> {
        Ok(match self {
            RelatedValue::Id(id) => BoundTarget::Id(id),
            RelatedValue::Identifier(identifier) => BoundTarget::Identifier(identifier),
            RelatedValue::Resource(resource) => {
                let identifier = resource.identifier().ok_or_else(|| {
                    JsonApiError::Type(format!(
                        "uncommitted {} cannot be a target of '{relationship}'",
                        resource.resource_type()
                    ))
                })?;
                BoundTarget::Resource(resource, identifier)
            }
        })
    }
}

/// A relationship target whose identity is already known.
#[derive(Debug, Clone)]
pub(crate) enum BoundTarget {
    Id(String),
    Identifier(ResourceIdentifier),
    Resource(Resource, ResourceIdentifier),
}

impl BoundTarget {
    pub(crate) fn into_identifier(self, relationship: &str, allowed_types: &[String]) -> Result<ResourceIdentifier> {
        let identifier = match self {
            BoundTarget::Id(id) => match allowed_types {
                [only] => ResourceIdentifier::new(only.clone(), id),
                _ => {
                    return Err(JsonApiError::Type(format!(
                        "relationship '{relationship}' accepts {} types; give an explicit type for id '{id}'",
                        allowed_types.len()
                    )))
                }
            },
            BoundTarget::Identifier(identifier) | BoundTarget::Resource(_, identifier) => identifier,
        };
        if !allowed_types.is_empty() && !allowed_types.contains(&identifier.resource_type) {
            return Err(JsonApiError::Type(format!(
                "type '{}' not allowed in '{relationship}' (allowed: {})",
                identifier.resource_type,
                allowed_types.join(", ")
            )));
        }
        Ok(identifier)
    }

    /// The resource instance, when one was given directly.
    pub(crate) fn resource(&self) -> Option<&Resource> {
        match self {
            BoundTarget::Resource(r, _) => Some(r),
            _ => None,
        }
    }
}

impl From<&str> for RelatedValue {
    fn from(id: &str) -> Self {
        RelatedValue::Id(id.to_string())
    }
}

impl From<String> for RelatedValue {
    fn from(id: String) -> Self {
        RelatedValue::Id(id)
    }
}

impl From<ResourceIdentifier> for RelatedValue {
    fn from(identifier: ResourceIdentifier) -> Self {
        RelatedValue::Identifier(identifier)
    }
}

impl From<Resource> for RelatedValue {
    fn from(resource: Resource) -> Self {
        RelatedValue::Resource(resource)
    }
}

impl From<&Resource> for RelatedValue {
    fn from(resource: &Resource) -> Self {
        RelatedValue::Resource(resource.clone())
    }
}

/// The full value assigned to a relationship.
#[derive(Debug, Clone)]
pub enum RelationshipValue {
    None,
    One(RelatedValue),
    Many(Vec<RelatedValue>),
}

impl RelationshipValue {
    pub fn many<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RelatedValue>,
    {
        RelationshipValue::Many(items.into_iter().map(Into::into).collect())
    }

    /// Binds every target; see [`RelatedValue::bind`].
    pub(crate) fn bind(self, relationship: &str) -> Result<Vec<BoundTarget>> {
        let given = match self {
            RelationshipValue::None => Vec::new(),
            RelationshipValue::One(v) => vec![v],
            RelationshipValue::Many(vs) => vs,
        };
        given.into_iter().map(|v| v.bind(relationship)).collect()
    }

    /// Interprets a raw JSON value: `null`, an id string, an identifier object, or an array
    /// of either.
    pub fn from_json(value: &Value) -> Result<Self> {
        fn one(value: &Value) -> Result<RelatedValue> {
            match value {
                Value::String(s) => Ok(RelatedValue::Id(s.clone())),
                Value::Number(n) => Ok(RelatedValue::Id(n.to_string())),
                Value::Object(_) => Ok(RelatedValue::Identifier(ResourceIdentifier::from_json(value)?)),
                other => Err(JsonApiError::Type(format!("cannot use {other} as a relationship target"))),
            }
        }
        match value {
            Value::Null => Ok(RelationshipValue::None),
            Value::Array(items) => Ok(RelationshipValue::Many(
                items.iter().map(one).collect::<Result<Vec<_>>>()?,
            )),
            other => Ok(RelationshipValue::One(one(other)?)),
        }
    }
}

macro_rules! single_target {
    ($($ty:ty),*) => {
        $(impl From<$ty> for RelationshipValue {
            fn from(value: $ty) -> Self {
                RelationshipValue::One(value.into())
            }
        })*
    };
}

single_target!(&str, String, ResourceIdentifier, Resource, &Resource);

impl From<RelatedValue> for RelationshipValue {
    fn from(value: RelatedValue) -> Self {
        RelationshipValue::One(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_from_json_accepts_numeric_id() {
        let ident = ResourceIdentifier::from_json(&json!({"type": "leases", "id": 7})).unwrap();
        assert_eq!(ident, ResourceIdentifier::new("leases", "7"));
        assert_eq!(ident.to_string(), "leases:7");
    }

    #[test]
    fn test_identifier_without_type_is_invalid() {
        let err = ResourceIdentifier::from_json(&json!({"id": "1"})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_bare_id_needs_single_allowed_type() {
        let allowed = vec!["user-accounts".to_string()];
        let ident = RelatedValue::from("u1").into_identifier("user-account", &allowed).unwrap();
        assert_eq!(ident.resource_type, "user-accounts");

        let err = RelatedValue::from("u1").into_identifier("anything", &[]).unwrap_err();
        assert!(matches!(err, JsonApiError::Type(_)));
    }

    #[test]
    fn test_disallowed_type_rejected() {
        let allowed = vec!["lease-items".to_string()];
        let err = RelatedValue::from(ResourceIdentifier::new("users", "1"))
            .into_identifier("lease-items", &allowed)
            .unwrap_err();
        assert!(matches!(err, JsonApiError::Type(_)));
    }

    #[test]
    fn test_relationship_value_from_json() {
        assert!(matches!(RelationshipValue::from_json(&Value::Null).unwrap(), RelationshipValue::None));
        let many = RelationshipValue::from_json(&json!(["1", {"type": "t", "id": "2"}])).unwrap();
        assert!(matches!(many, RelationshipValue::Many(ref v) if v.len() == 2));
        assert!(RelationshipValue::from_json(&json!(true)).is_err());
    }
}
