//! # Attribute Tree
//!
//! Nested, order-preserving attribute storage with per-key dirty tracking.
//!
//! The tree is an arena: every nested map is a [`Node`] addressed by a [`NodeId`], and a
//! node refers to its parent by id. Marking a key dirty walks those parent ids upward, so
//! a change two levels deep surfaces as a dirty key at the root.
//!
//! ```text
//! root ─┬─ lease-id: "1"
//!       ├─ active-status: "pending"   (dirty)
//!       └─ valid-for ──┬─ start-datetime: null
//!                      └─ end-datetime: null
//! ```
//!
//! Construction picks one of two strategies per node:
//!
//! | Strategy | When | Behavior |
//! |----------|------|----------|
//! | Declared | the schema has `properties` for the node's path | declared keys first, in schema order; relation properties skipped; defaults applied; extras logged and adopted |
//! | Raw | no schema for the path | raw data adopted verbatim, nested objects become child nodes |

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{JsonApiError, Result};
use crate::schema::{properties, RelationSpec, Schema};

/// Index of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug, Clone)]
enum Slot {
    Value(Value),
    Map(NodeId),
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    slot: Slot,
    dirty: bool,
}

#[derive(Debug, Clone)]
struct Node {
    /// Key of this node in its parent; `None` for the root.
    name: Option<String>,
    /// Dotted path from the root, empty for the root.
    path: String,
    parent: Option<NodeId>,
    entries: Vec<Entry>,
}

impl Node {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }
}

/// Schema context consulted while building declared nodes.
#[derive(Clone, Copy)]
struct Shaping<'a> {
    schema: &'a dyn Schema,
    resource_type: &'a str,
}

impl<'a> Shaping<'a> {
    fn declared(&self, path: &str) -> Option<&'a Map<String, Value>> {
        properties(self.schema.find_spec(self.resource_type, path))
    }
}

#[derive(Debug, Clone)]
pub struct AttributeTree {
    resource_type: String,
    nodes: Vec<Node>,
}

impl AttributeTree {
    /// Builds a clean tree from the raw `attributes` member.
    pub fn build(resource_type: &str, data: Option<&Value>, schema: &dyn Schema) -> Self {
        let mut tree = Self {
            resource_type: resource_type.to_string(),
            nodes: Vec::new(),
        };
        let data = data.and_then(Value::as_object).cloned().unwrap_or_default();
        let shaping = schema.is_enabled().then_some(Shaping {
            schema,
            resource_type,
        });
        tree.build_node(None, None, String::new(), data, shaping);
        tree
    }

    /// An empty tree without schema shaping.
    pub fn empty(resource_type: &str) -> Self {
        let mut tree = Self {
            resource_type: resource_type.to_string(),
            nodes: Vec::new(),
        };
        tree.build_node(None, None, String::new(), Map::new(), None);
        tree
    }

    fn build_node(
        &mut self,
        parent: Option<NodeId>,
        name: Option<String>,
        path: String,
        mut data: Map<String, Value>,
        shaping: Option<Shaping<'_>>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            path: path.clone(),
            parent,
            entries: Vec::new(),
        });

        let mut entries = Vec::with_capacity(data.len());
        if let Some(declared) = shaping.and_then(|s| s.declared(&path)) {
            for (key, spec) in declared {
                if RelationSpec::from_property(spec).is_some() {
                    continue;
                }
                let slot = if is_object_spec(spec) {
                    let child_data = match data.shift_remove(key) {
                        Some(Value::Object(map)) => map,
                        _ => Map::new(),
                    };
                    let child_path = join_path(&path, key);
                    Slot::Map(self.build_node(Some(id), Some(key.clone()), child_path, child_data, shaping))
                } else {
                    let value = data
                        .shift_remove(key)
                        .or_else(|| spec.get("default").cloned())
                        .unwrap_or(Value::Null);
                    Slot::Value(value)
                };
                entries.push(Entry::clean(key.clone(), slot));
            }
            if !data.is_empty() {
                warn!(
                    resource_type = %self.resource_type,
                    path = %path,
                    extra = ?data.keys().collect::<Vec<_>>(),
                    "Attribute data not declared in schema"
                );
            }
        }

        for (key, value) in data {
            let slot = match value {
                Value::Object(map) => {
                    let child_path = join_path(&path, &key);
                    Slot::Map(self.build_node(Some(id), Some(key.clone()), child_path, map, None))
                }
                other => Slot::Value(other),
            };
            entries.push(Entry::clean(key, slot));
        }

        self.nodes[id.0].entries = entries;
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Follows a dotted path to the slot it names.
    fn lookup(&self, path: &str) -> Option<&Slot> {
        let mut node = NodeId::ROOT;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let n = self.node(node);
            let entry = &n.entries[n.position(segment)?];
            if segments.peek().is_none() {
                return Some(&entry.slot);
            }
            match entry.slot {
                Slot::Map(child) => node = child,
                Slot::Value(_) => return None,
            }
        }
        None
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// The value at a dotted path; nested maps are returned as JSON objects.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.lookup(path).map(|slot| self.slot_value(slot))
    }

    /// Whether the path names a nested map rather than a scalar.
    pub fn is_map(&self, path: &str) -> bool {
        matches!(self.lookup(path), Some(Slot::Map(_)))
    }

    /// Top-level attribute names in order.
    pub fn keys(&self) -> Vec<String> {
        self.node(NodeId::ROOT)
            .entries
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }

    /// Sets the value at a dotted path, creating missing intermediate maps.
    ///
    /// Nothing is marked dirty when the new value equals the current one.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };
        let mut node = NodeId::ROOT;
        for segment in parents {
            node = self.child_map(node, segment)?;
        }
        self.set_in(node, last, value);
        Ok(())
    }

    /// Creates (or resets to empty) a nested map at `path`.
    pub fn create_map(&mut self, path: &str) -> Result<()> {
        self.set(path, Value::Object(Map::new()))
    }

    fn child_map(&mut self, node: NodeId, key: &str) -> Result<NodeId> {
        match self.node(node).position(key) {
            Some(i) => match self.nodes[node.0].entries[i].slot {
                Slot::Map(child) => Ok(child),
                Slot::Value(Value::Null) => {
                    let child = self.new_child(node, key);
                    self.nodes[node.0].entries[i].slot = Slot::Map(child);
                    self.mark_dirty(node, key);
                    Ok(child)
                }
                Slot::Value(_) => Err(JsonApiError::validation(
                    Some(&self.resource_type),
                    format!("'{}' is not a map", join_path(&self.node(node).path, key)),
                )),
            },
            None => {
                let child = self.new_child(node, key);
                self.nodes[node.0]
                    .entries
                    .push(Entry::clean(key.to_string(), Slot::Map(child)));
                self.mark_dirty(node, key);
                Ok(child)
            }
        }
    }

    fn new_child(&mut self, parent: NodeId, key: &str) -> NodeId {
        let path = join_path(&self.node(parent).path, key);
        self.build_node(Some(parent), Some(key.to_string()), path, Map::new(), None)
    }

    fn set_in(&mut self, node: NodeId, key: &str, value: Value) {
        let position = self.node(node).position(key);
        if let Some(i) = position {
            let current = self.slot_value(&self.nodes[node.0].entries[i].slot);
            if current == value {
                return;
            }
        }
        let slot = match value {
            Value::Object(map) => {
                let path = join_path(&self.node(node).path, key);
                Slot::Map(self.build_node(Some(node), Some(key.to_string()), path, map, None))
            }
            other => Slot::Value(other),
        };
        let replaced = match position {
            Some(i) => std::mem::replace(&mut self.nodes[node.0].entries[i].slot, slot),
            None => {
                self.nodes[node.0]
                    .entries
                    .push(Entry::clean(key.to_string(), slot));
                Slot::Value(Value::Null)
            }
        };
        self.mark_dirty(node, key);
        if let Slot::Map(_) = replaced {
            self.compact();
        }
    }

    /// Drops nodes no longer reachable from the root and renumbers the rest.
    fn compact(&mut self) {
        let mut order = vec![NodeId::ROOT];
        let mut remap = vec![None; self.nodes.len()];
        remap[NodeId::ROOT.0] = Some(NodeId::ROOT);
        let mut next = 0;
        while let Some(&id) = order.get(next) {
            for entry in &self.nodes[id.0].entries {
                if let Slot::Map(child) = entry.slot {
                    remap[child.0] = Some(NodeId(order.len()));
                    order.push(child);
                }
            }
            next += 1;
        }
        if order.len() == self.nodes.len() {
            return;
        }

        let mut old: Vec<Option<Node>> = std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.nodes = order.iter().filter_map(|id| old[id.0].take()).collect();
        for node in &mut self.nodes {
            node.parent = node.parent.and_then(|p| remap[p.0]);
            for entry in &mut node.entries {
                if let Slot::Map(child) = &mut entry.slot {
                    if let Some(moved) = remap[child.0] {
                        *child = moved;
                    }
                }
            }
        }
    }

    /// Marks `key` in `node` dirty, then the key holding `node` in its parent, up to the root.
    fn mark_dirty(&mut self, node: NodeId, key: &str) {
        let mut current = Some((node, key.to_string()));
        while let Some((id, key)) = current.take() {
            let n = &mut self.nodes[id.0];
            if let Some(i) = n.position(&key) {
                n.entries[i].dirty = true;
            }
            if let (Some(parent), Some(name)) = (n.parent, n.name.clone()) {
                current = Some((parent, name));
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.node_dirty(NodeId::ROOT)
    }

    fn node_dirty(&self, id: NodeId) -> bool {
        self.node(id).entries.iter().any(|e| e.dirty)
    }

    /// Clears every dirty flag.
    pub fn mark_clean(&mut self) {
        for node in &mut self.nodes {
            for entry in &mut node.entries {
                entry.dirty = false;
            }
        }
    }

    /// Dotted paths of the dirty leaves (or of replaced maps).
    pub fn dirty_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_dirty(NodeId::ROOT, &mut out);
        out
    }

    fn collect_dirty(&self, id: NodeId, out: &mut Vec<String>) {
        let node = self.node(id);
        for entry in node.entries.iter().filter(|e| e.dirty) {
            match entry.slot {
                Slot::Map(child) if self.node_dirty(child) => self.collect_dirty(child, out),
                _ => out.push(join_path(&node.path, &entry.key)),
            }
        }
    }

    /// Only the dirty keys. A dirty nested map contributes its own diff when it has dirty
    /// keys of its own, and its full contents when it was replaced wholesale.
    pub fn diff(&self) -> Value {
        Value::Object(self.node_diff(NodeId::ROOT))
    }

    fn node_diff(&self, id: NodeId) -> Map<String, Value> {
        self.node(id)
            .entries
            .iter()
            .filter(|e| e.dirty)
            .map(|e| {
                let value = match e.slot {
                    Slot::Map(child) if self.node_dirty(child) => Value::Object(self.node_diff(child)),
                    ref slot => self.slot_value(slot),
                };
                (e.key.clone(), value)
            })
            .collect()
    }

    /// Full contents without null values and without empty nested maps.
    pub fn creation_payload(&self) -> Value {
        Value::Object(self.node_payload(NodeId::ROOT))
    }

    fn node_payload(&self, id: NodeId) -> Map<String, Value> {
        let mut out = Map::new();
        for entry in &self.node(id).entries {
            match &entry.slot {
                Slot::Map(child) => {
                    let nested = self.node_payload(*child);
                    if !nested.is_empty() {
                        out.insert(entry.key.clone(), Value::Object(nested));
                    }
                }
                Slot::Value(Value::Null) => {}
                Slot::Value(v) => {
                    out.insert(entry.key.clone(), v.clone());
                }
            }
        }
        out
    }

    /// The whole tree as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.node_map(NodeId::ROOT))
    }

    fn node_map(&self, id: NodeId) -> Map<String, Value> {
        self.node(id)
            .entries
            .iter()
            .map(|e| (e.key.clone(), self.slot_value(&e.slot)))
            .collect()
    }

    fn slot_value(&self, slot: &Slot) -> Value {
        match slot {
            Slot::Value(v) => v.clone(),
            Slot::Map(child) => Value::Object(self.node_map(*child)),
        }
    }
}

impl Entry {
    fn clean(key: String, slot: Slot) -> Self {
        Self {
            key,
            slot,
            dirty: false,
        }
    }
}

fn is_object_spec(spec: &Value) -> bool {
    spec.get("type").and_then(Value::as_str) == Some("object")
        || spec.get("properties").map_or(false, Value::is_object)
}

fn join_path(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}
