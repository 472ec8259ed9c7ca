//! # Relationships
//!
//! One [`Relationship`] per `(resource, relationship-name)` pair. The variant is chosen
//! from the raw relationship object when the resource is parsed:
//!
//! | Raw relationship | Variant | Resolves through |
//! |------------------|---------|------------------|
//! | `"data": [..]` | [`Relationship::Multi`] | identity map, one lookup per identifier |
//! | `"data": {..}` or `null` | [`Relationship::Single`] | identity map |
//! | only `links` | [`Relationship::Link`] | one fetch of the `related` link |
//! | only `meta` | [`Relationship::Meta`] | never resolves |
//! | nothing, but declared by the schema | `Multi` / `Single` per cardinality | |
//!
//! ## Resolution
//!
//! ```text
//! Unresolved ──begin_fetch()──► Resolving ──finish_fetch()──► Resolved
//!      ▲                            │                            │
//!      └────────abort_fetch()───────┘◄──────── set(..) ──────────┘
//! ```
//!
//! A relationship never talks to the network itself. [`Relationship::begin_fetch`] returns
//! a [`FetchPlan`] that the owning resource executes through the session, then hands the
//! result back with [`Relationship::finish_fetch`]. No lock is held across the fetch.

use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::document::Document;
use crate::error::{JsonApiError, Result};
use crate::identifier::{BoundTarget, RelationshipValue, ResourceIdentifier};
use crate::links::{Links, Meta};
use crate::naming::jsonify_name;
use crate::resource::Resource;
use crate::schema::{Cardinality, RelationSpec, Schema};

#[derive(Debug, Clone, Default)]
pub(crate) enum Resolution {
    #[default]
    Unresolved,
    Resolving,
    Resolved {
        resources: Vec<Resource>,
        document: Option<Document>,
    },
}

/// What the owner must do to resolve a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPlan {
    /// Look each identifier up in the identity map, fetching on a miss.
    Identifiers(Vec<ResourceIdentifier>),
    /// Fetch the document at this URL and adopt its primary resources.
    Link(String),
    /// Nothing to resolve.
    Nothing,
}

/// State shared by every variant.
#[derive(Debug, Clone, Default)]
pub struct RelationshipCore {
    links: Links,
    meta: Meta,
    allowed_types: Vec<String>,
    declared: Option<Cardinality>,
    dirty: bool,
    resolution: Resolution,
}

impl RelationshipCore {
    fn parse(raw: &Map<String, Value>, relation: Option<&RelationSpec>, base: Option<&Url>) -> Self {
        Self {
            links: Links::parse(raw.get("links"), base),
            meta: Meta::parse(raw.get("meta")),
            allowed_types: relation.map(|r| r.allowed_types.clone()).unwrap_or_default(),
            declared: relation.map(|r| r.cardinality),
            dirty: false,
            resolution: Resolution::Unresolved,
        }
    }

    fn empty(relation: &RelationSpec) -> Self {
        Self {
            allowed_types: relation.allowed_types.clone(),
            declared: Some(relation.cardinality),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SingleRelationship {
    core: RelationshipCore,
    target: Option<ResourceIdentifier>,
}

#[derive(Debug, Clone)]
pub struct MultiRelationship {
    core: RelationshipCore,
    targets: Vec<ResourceIdentifier>,
}

#[derive(Debug, Clone)]
pub struct LinkRelationship {
    core: RelationshipCore,
    /// Targets assigned locally; replaces the link until the next refresh.
    assigned: Option<Vec<ResourceIdentifier>>,
}

#[derive(Debug, Clone)]
pub struct MetaRelationship {
    core: RelationshipCore,
}

#[derive(Debug, Clone)]
pub enum Relationship {
    Single(SingleRelationship),
    Multi(MultiRelationship),
    Link(LinkRelationship),
    Meta(MetaRelationship),
}

impl Relationship {
    /// Picks the variant for a raw relationship object.
    pub fn parse(
        name: &str,
        raw: &Value,
        relation: Option<&RelationSpec>,
        base: Option<&Url>,
    ) -> Result<Self> {
        let empty = Map::new();
        let obj = match raw {
            Value::Object(obj) => obj,
            Value::Null => &empty,
            other => {
                return Err(JsonApiError::validation(
                    None,
                    format!("relationship '{name}' is not an object: {other}"),
                ))
            }
        };
        let core = RelationshipCore::parse(obj, relation, base);
        let declared = relation.map(|r| r.cardinality);

        if let Some(data) = obj.get("data") {
            return match data {
                Value::Array(items) => {
                    if declared == Some(Cardinality::ToOne) {
                        warn!(relationship = name, "Conflicting information about relationship: declared to-one, got array");
                    }
                    let targets = items
                        .iter()
                        .map(ResourceIdentifier::from_json)
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Relationship::Multi(MultiRelationship { core, targets }))
                }
                Value::Object(_) | Value::Null => {
                    if declared == Some(Cardinality::ToMany) {
                        warn!(relationship = name, "Conflicting information about relationship: declared to-many, got single");
                    }
                    let target = match data {
                        Value::Null => None,
                        ident => Some(ResourceIdentifier::from_json(ident)?),
                    };
                    Ok(Relationship::Single(SingleRelationship { core, target }))
                }
                other => Err(JsonApiError::validation(
                    None,
                    format!("relationship '{name}' has invalid data: {other}"),
                )),
            };
        }
        if obj.contains_key("links") {
            return Ok(Relationship::Link(LinkRelationship {
                core,
                assigned: None,
            }));
        }
        if obj.contains_key("meta") {
            return Ok(Relationship::Meta(MetaRelationship { core }));
        }
        match relation {
            Some(spec) => Ok(Self::declared_empty(spec)),
            None => Err(JsonApiError::validation(
                None,
                format!("relationship '{name}' has neither data, links, nor meta"),
            )),
        }
    }

    /// An empty relationship of the declared cardinality.
    pub fn declared_empty(relation: &RelationSpec) -> Self {
        let core = RelationshipCore::empty(relation);
        match relation.cardinality {
            Cardinality::ToOne => Relationship::Single(SingleRelationship { core, target: None }),
            Cardinality::ToMany => Relationship::Multi(MultiRelationship {
                core,
                targets: Vec::new(),
            }),
        }
    }

    fn core(&self) -> &RelationshipCore {
        match self {
            Relationship::Single(r) => &r.core,
            Relationship::Multi(r) => &r.core,
            Relationship::Link(r) => &r.core,
            Relationship::Meta(r) => &r.core,
        }
    }

    fn core_mut(&mut self) -> &mut RelationshipCore {
        match self {
            Relationship::Single(r) => &mut r.core,
            Relationship::Multi(r) => &mut r.core,
            Relationship::Link(r) => &mut r.core,
            Relationship::Meta(r) => &mut r.core,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Relationship::Single(_) => "single",
            Relationship::Multi(_) => "multi",
            Relationship::Link(_) => "link",
            Relationship::Meta(_) => "meta",
        }
    }

    pub fn links(&self) -> &Links {
        &self.core().links
    }

    pub fn meta(&self) -> &Meta {
        &self.core().meta
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.core().allowed_types
    }

    /// Whether this relationship points at (at most) one resource.
    ///
    /// A link relationship without a declared cardinality answers from the document it
    /// was resolved with, and is treated as to-many before that.
    pub fn is_single(&self) -> bool {
        match self {
            Relationship::Single(_) => true,
            Relationship::Multi(_) | Relationship::Meta(_) => false,
            Relationship::Link(r) => match (r.core.declared, &r.core.resolution) {
                (Some(cardinality), _) => cardinality == Cardinality::ToOne,
                (None, Resolution::Resolved { document: Some(doc), .. }) => !doc.is_collection(),
                _ => false,
            },
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.core().dirty
    }

    pub fn mark_dirty(&mut self) {
        self.core_mut().dirty = true;
    }

    /// Clears the dirty flag. A link relationship also forgets the document it fetched.
    pub fn mark_clean(&mut self) {
        let core = self.core_mut();
        core.dirty = false;
        if let Relationship::Link(r) = self {
            if matches!(r.core.resolution, Resolution::Resolved { document: Some(_), .. }) {
                r.core.resolution = Resolution::Unresolved;
            }
        }
    }

    /// Whether the relationship currently names any target.
    pub fn has_value(&self) -> bool {
        match self {
            Relationship::Single(r) => r.target.is_some(),
            Relationship::Multi(r) => !r.targets.is_empty(),
            Relationship::Link(r) => r.assigned.as_ref().map_or(false, |a| !a.is_empty()),
            Relationship::Meta(_) => false,
        }
    }

    /// Identifiers known without a fetch.
    pub fn identifiers(&self) -> Vec<ResourceIdentifier> {
        match self {
            Relationship::Single(r) => r.target.iter().cloned().collect(),
            Relationship::Multi(r) => r.targets.clone(),
            Relationship::Link(r) => match (&r.assigned, &r.core.resolution) {
                (Some(assigned), _) => assigned.clone(),
                (None, Resolution::Resolved { resources, .. }) => {
                    resources.iter().filter_map(Resource::identifier).collect()
                }
                _ => Vec::new(),
            },
            Relationship::Meta(_) => Vec::new(),
        }
    }

    /// Resource linkage for a commit body: one identifier object (or `null`) for
    /// single relationships, an ordered array otherwise.
    pub fn as_identifier_payload(&self) -> Value {
        let identifiers = self.identifiers();
        if self.is_single() {
            identifiers
                .first()
                .map(ResourceIdentifier::to_json)
                .unwrap_or(Value::Null)
        } else {
            Value::Array(identifiers.iter().map(ResourceIdentifier::to_json).collect())
        }
    }

    /// The relationship object as it appears in a resource's `relationships` member.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        let has_data = !matches!(self, Relationship::Meta(_))
            && !(matches!(self, Relationship::Link(_)) && !self.has_value());
        if has_data {
            out.insert("data".into(), self.as_identifier_payload());
        }
        if !self.links().is_empty() {
            out.insert("links".into(), self.links().to_json());
        }
        if !self.meta().is_empty() {
            out.insert("meta".into(), self.meta().to_json());
        }
        Value::Object(out)
    }

    /// Replaces the targets and marks the relationship dirty.
    pub fn set(&mut self, name: &str, value: RelationshipValue) -> Result<()> {
        self.set_targets(name, value.bind(name)?)
    }

    /// [`Relationship::set`] with targets bound beforehand, callable while the owning
    /// resource is locked.
    pub(crate) fn set_targets(&mut self, name: &str, given: Vec<BoundTarget>) -> Result<()> {
        if let Relationship::Meta(_) = self {
            return Err(JsonApiError::Relationship(format!(
                "meta relationship '{name}' cannot be set"
            )));
        }
        let allowed = self.allowed_types().to_vec();
        let preresolved = preresolved(&given);
        let identifiers = given
            .into_iter()
            .map(|v| v.into_identifier(name, &allowed))
            .collect::<Result<Vec<_>>>()?;

        match self {
            Relationship::Single(r) => {
                if identifiers.len() > 1 {
                    return Err(JsonApiError::Relationship(format!(
                        "to-one relationship '{name}' takes a single target, got {}",
                        identifiers.len()
                    )));
                }
                r.target = identifiers.into_iter().next();
            }
            Relationship::Multi(r) => r.targets = identifiers,
            Relationship::Link(r) => {
                match r.core.declared {
                    Some(Cardinality::ToOne) if identifiers.len() > 1 => {
                        warn!(relationship = name, "This should contain only 1 resource, but a list of values is given");
                    }
                    _ => {}
                }
                r.assigned = Some(identifiers);
            }
            Relationship::Meta(_) => {}
        }
        let core = self.core_mut();
        core.resolution = match preresolved {
            Some(resources) => Resolution::Resolved {
                resources,
                document: None,
            },
            None => Resolution::Unresolved,
        };
        core.dirty = true;
        Ok(())
    }

    /// Appends targets to a to-many relationship.
    pub fn add(&mut self, name: &str, value: RelationshipValue) -> Result<()> {
        self.add_targets(name, value.bind(name)?)
    }

    pub(crate) fn add_targets(&mut self, name: &str, given: Vec<BoundTarget>) -> Result<()> {
        let Relationship::Multi(r) = self else {
            return Err(JsonApiError::Relationship(format!(
                "cannot add to {} relationship '{name}'",
                self.kind()
            )));
        };
        for v in given {
            let identifier = v.into_identifier(name, &r.core.allowed_types)?;
            r.targets.push(identifier);
        }
        r.core.resolution = Resolution::Unresolved;
        r.core.dirty = true;
        Ok(())
    }

    /// Removes every target of a to-many relationship.
    pub fn clear(&mut self, name: &str) -> Result<()> {
        let Relationship::Multi(r) = self else {
            return Err(JsonApiError::Relationship(format!(
                "cannot clear {} relationship '{name}'",
                self.kind()
            )));
        };
        r.targets.clear();
        r.core.resolution = Resolution::Unresolved;
        r.core.dirty = true;
        Ok(())
    }

    /// URL of the related resource(s), if the server supplied one.
    pub fn related_url(&self) -> Option<&str> {
        self.links()
            .related()
            .or_else(|| self.links().self_link())
            .map(|l| l.url.as_str())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.core().resolution, Resolution::Resolved { .. })
    }

    pub fn resolved(&self) -> Option<&[Resource]> {
        match &self.core().resolution {
            Resolution::Resolved { resources, .. } => Some(resources),
            _ => None,
        }
    }

    /// The document a link relationship was resolved from.
    pub fn document(&self) -> Option<&Document> {
        match &self.core().resolution {
            Resolution::Resolved { document, .. } => document.as_ref(),
            _ => None,
        }
    }

    /// Moves to `Resolving` and says what has to be fetched.
    pub fn begin_fetch(&mut self, name: &str) -> Result<FetchPlan> {
        let plan = match self {
            Relationship::Single(r) => FetchPlan::Identifiers(r.target.iter().cloned().collect()),
            Relationship::Multi(r) => FetchPlan::Identifiers(r.targets.clone()),
            Relationship::Link(r) => match &r.assigned {
                Some(assigned) => FetchPlan::Identifiers(assigned.clone()),
                None => match r.core.links.related() {
                    Some(link) => FetchPlan::Link(link.url.clone()),
                    None => {
                        return Err(JsonApiError::Relationship(format!(
                            "link relationship '{name}' has no related link"
                        )))
                    }
                },
            },
            Relationship::Meta(_) => FetchPlan::Nothing,
        };
        self.core_mut().resolution = Resolution::Resolving;
        Ok(plan)
    }

    pub fn finish_fetch(&mut self, resources: Vec<Resource>, document: Option<Document>) {
        self.core_mut().resolution = Resolution::Resolved { resources, document };
    }

    pub fn abort_fetch(&mut self) {
        self.core_mut().resolution = Resolution::Unresolved;
    }
}

/// When every value is a resource instance, no lookup is needed after `set`.
fn preresolved(values: &[BoundTarget]) -> Option<Vec<Resource>> {
    values.iter().map(|v| v.resource().cloned()).collect()
}

/// The relationships of one resource, in declaration order followed by undeclared ones.
#[derive(Debug, Clone, Default)]
pub struct RelationshipSet {
    entries: Vec<(String, Relationship)>,
}

impl RelationshipSet {
    /// Builds the set from the raw `relationships` member.
    ///
    /// Every relationship declared by the schema is present, empty when the raw data
    /// lacks it.
    pub fn build(
        resource_type: &str,
        raw: Option<&Value>,
        schema: &dyn Schema,
        base: Option<&Url>,
    ) -> Result<Self> {
        let mut raw = raw.and_then(Value::as_object).cloned().unwrap_or_default();
        let mut entries = Vec::new();
        for (name, spec) in schema.relations(resource_type) {
            let relationship = match raw.shift_remove(&name) {
                Some(value) => Relationship::parse(&name, &value, Some(&spec), base)?,
                None => Relationship::declared_empty(&spec),
            };
            entries.push((name, relationship));
        }
        if schema.is_enabled() && !raw.is_empty() {
            warn!(
                resource_type,
                extra = ?raw.keys().collect::<Vec<_>>(),
                "Relationships not declared in schema"
            );
        }
        for (name, value) in raw {
            let relationship = Relationship::parse(&name, &value, None, base)?;
            entries.push((name, relationship));
        }
        Ok(Self { entries })
    }

    /// Resolves a caller-supplied name: exact match first, then the JSON:API spelling.
    pub fn resolve_name(&self, name: &str) -> Option<String> {
        if self.contains(name) {
            return Some(name.to_string());
        }
        let alt = jsonify_name(name);
        self.contains(&alt).then_some(alt)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Relationship> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Relationship> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Relationship)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn is_dirty(&self) -> bool {
        self.entries.iter().any(|(_, r)| r.is_dirty())
    }

    pub fn dirty_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, r)| r.is_dirty())
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn mark_clean(&mut self) {
        for (_, r) in &mut self.entries {
            r.mark_clean();
        }
    }

    /// Every relationship that names a target, for creation bodies.
    pub fn creation_payload(&self) -> Value {
        self.payload(|r| r.has_value())
    }

    /// Only dirty relationships, for partial updates.
    pub fn dirty_payload(&self) -> Value {
        self.payload(|r| r.is_dirty())
    }

    fn payload(&self, include: impl Fn(&Relationship) -> bool) -> Value {
        Value::Object(
            self.entries
                .iter()
                .filter(|(_, r)| include(r))
                .map(|(n, r)| {
                    let mut obj = Map::new();
                    obj.insert("data".into(), r.as_identifier_payload());
                    (n.clone(), Value::Object(obj))
                })
                .collect(),
        )
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(n, r)| (n.clone(), r.to_json()))
                .collect(),
        )
    }
}
