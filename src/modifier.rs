//! Query modifiers appended to collection URLs.
//!
//! Modifiers compose with `+`; the fragments are joined with `&` in the order given:
//!
//! ```
//! use jsonapi_session::modifier::{Filter, FilterOperator, Inclusion, Modifier};
//!
//! let m = Filter::new().eq("name", "Jones").op("age", FilterOperator::Gte, 18)
//!     + Inclusion::new(["lease-items"]);
//! assert_eq!(
//!     m.url_with_modifiers("http://localhost/api/people"),
//!     "http://localhost/api/people?filter[name]=Jones&filter[age][gte]=18&include=lease-items"
//! );
//! ```

use std::ops::Add;

use serde_json::Value;

/// A set of query fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifier {
    fragments: Vec<String>,
}

impl Modifier {
    /// A hand-written query string such as `page[size]=10`.
    pub fn raw(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            fragments: if query.is_empty() { Vec::new() } else { vec![query] },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn appended_query(&self) -> String {
        self.fragments.join("&")
    }

    /// Appends the query to `base_url`, extending an existing query string if present.
    pub fn url_with_modifiers(&self, base_url: &str) -> String {
        if self.is_empty() {
            return base_url.to_string();
        }
        let separator = if base_url.contains('?') { '&' } else { '?' };
        format!("{base_url}{separator}{}", self.appended_query())
    }
}

impl<T: Into<Modifier>> Add<T> for Modifier {
    type Output = Modifier;

    fn add(mut self, other: T) -> Modifier {
        self.fragments.extend(other.into().fragments);
        self
    }
}

/// Comparison applied by a filter condition. `Eq` is the server default and is not
/// written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    NotEq,
    Eql,
    NotEql,
    Prefix,
    NotPrefix,
    Suffix,
    NotSuffix,
    Match,
    NotMatch,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::NotEq => "not_eq",
            FilterOperator::Eql => "eql",
            FilterOperator::NotEql => "not_eql",
            FilterOperator::Prefix => "prefix",
            FilterOperator::NotPrefix => "not_prefix",
            FilterOperator::Suffix => "suffix",
            FilterOperator::NotSuffix => "not_suffix",
            FilterOperator::Match => "match",
            FilterOperator::NotMatch => "not_match",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
        }
    }
}

/// `filter[...]` conditions. Keys may be nested with `.` or `__`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, FilterOperator, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(key, FilterOperator::Eq, value)
    }

    pub fn op(mut self, key: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        self.conditions.push((key.into(), operator, value.into()));
        self
    }

    /// `filter[key][not_eq]=null`
    pub fn exists(self, key: impl Into<String>) -> Self {
        self.op(key, FilterOperator::NotEq, Value::Null)
    }

    /// `filter[key]=null`
    pub fn not_exists(self, key: impl Into<String>) -> Self {
        self.op(key, FilterOperator::Eq, Value::Null)
    }

    fn fragment(key: &str, operator: FilterOperator, value: &Value) -> String {
        let path: String = key
            .replace('.', "__")
            .split("__")
            .map(|part| format!("[{part}]"))
            .collect();
        let operator = match operator {
            FilterOperator::Eq => String::new(),
            other => format!("[{}]", other.as_str()),
        };
        format!("filter{path}{operator}={}", format_value(value))
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

impl From<Filter> for Modifier {
    fn from(filter: Filter) -> Self {
        Modifier {
            fragments: filter
                .conditions
                .iter()
                .map(|(k, op, v)| Filter::fragment(k, *op, v))
                .collect(),
        }
    }
}

/// `include=a,b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inclusion(Vec<String>);

impl Inclusion {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

impl From<Inclusion> for Modifier {
    fn from(inclusion: Inclusion) -> Self {
        Modifier::raw(format!("include={}", inclusion.0.join(",")))
    }
}

/// `sort=a,-b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort(Vec<String>);

impl Sort {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }
}

impl From<Sort> for Modifier {
    fn from(sort: Sort) -> Self {
        Modifier::raw(format!("sort={}", sort.0.join(",")))
    }
}

type FieldList = Vec<(String, Vec<String>)>;

fn field_list<I, T, F, S>(fields: I) -> FieldList
where
    I: IntoIterator<Item = (T, F)>,
    T: Into<String>,
    F: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields
        .into_iter()
        .map(|(t, f)| (t.into(), f.into_iter().map(Into::into).collect()))
        .collect()
}

fn fields_modifier(query_key: &str, fields: &FieldList) -> Modifier {
    Modifier {
        fragments: fields
            .iter()
            .map(|(t, f)| format!("{query_key}[{t}]={}", f.join(",")))
            .collect(),
    }
}

/// Sparse fieldsets: `fields[type]=a,b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields(FieldList);

impl Fields {
    pub fn new<I, T, F, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (T, F)>,
        T: Into<String>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(field_list(fields))
    }
}

impl From<Fields> for Modifier {
    fn from(fields: Fields) -> Self {
        fields_modifier("fields", &fields.0)
    }
}

/// Server-side computed fields: `extra_fields[type]=a,b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFields(FieldList);

impl ExtraFields {
    pub fn new<I, T, F, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (T, F)>,
        T: Into<String>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(field_list(fields))
    }
}

impl From<ExtraFields> for Modifier {
    fn from(fields: ExtraFields) -> Self {
        fields_modifier("extra_fields", &fields.0)
    }
}

macro_rules! composable {
    ($($ty:ty),*) => {
        $(impl<T: Into<Modifier>> Add<T> for $ty {
            type Output = Modifier;

            fn add(self, other: T) -> Modifier {
                Modifier::from(self) + other
            }
        })*
    };
}

composable!(Filter, Inclusion, Sort, Fields, ExtraFields);
