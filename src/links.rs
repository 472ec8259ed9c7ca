//! `links` and `meta` members.

use serde_json::{Map, Value};
use url::Url;

use crate::naming::jsonify_name;

/// One link object. `url` is `href` resolved against the server origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub href: String,
    pub url: String,
    pub meta: Option<Value>,
}

impl Link {
    /// Accepts both the string form and the `{href, meta}` object form.
    pub fn parse(value: &Value, base: Option<&Url>) -> Option<Self> {
        let (href, meta) = match value {
            Value::String(s) => (s.clone(), None),
            Value::Object(obj) => (
                obj.get("href").and_then(Value::as_str)?.to_string(),
                obj.get("meta").cloned(),
            ),
            _ => return None,
        };
        let url = resolve(&href, base);
        Some(Self { href, url, meta })
    }

    pub fn to_json(&self) -> Value {
        match &self.meta {
            None => Value::String(self.href.clone()),
            Some(meta) => serde_json::json!({"href": self.href, "meta": meta}),
        }
    }
}

fn resolve(href: &str, base: Option<&Url>) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

/// A `links` block, in document order. `null` links are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Links {
    entries: Vec<(String, Link)>,
}

impl Links {
    pub fn parse(value: Option<&Value>, base: Option<&Url>) -> Self {
        let entries = value
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(name, raw)| Link::parse(raw, base).map(|l| (name.clone(), l)))
                    .collect()
            })
            .unwrap_or_default();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Link> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| {
                let alt = jsonify_name(name);
                self.entries.iter().find(|(n, _)| *n == alt)
            })
            .map(|(_, l)| l)
    }

    pub fn self_link(&self) -> Option<&Link> {
        self.get("self")
    }

    pub fn related(&self) -> Option<&Link> {
        self.get("related")
    }

    pub fn next(&self) -> Option<&Link> {
        self.get("next")
    }

    pub fn prev(&self) -> Option<&Link> {
        self.get("prev")
    }

    pub fn first(&self) -> Option<&Link> {
        self.get("first")
    }

    pub fn last(&self) -> Option<&Link> {
        self.get("last")
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Link)> {
        self.entries.iter().map(|(n, l)| (n.as_str(), l))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(n, l)| (n.clone(), l.to_json()))
                .collect(),
        )
    }
}

/// A `meta` block. Lookups fall back to the JSON:API spelling of the name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    data: Map<String, Value>,
}

impl Meta {
    pub fn parse(value: Option<&Value>) -> Self {
        Self {
            data: value.and_then(Value::as_object).cloned().unwrap_or_default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name).or_else(|| self.data.get(&jsonify_name(name)))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.data.clone())
    }
}
