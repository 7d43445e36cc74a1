//! Ontograph Graph Gateway
//!
//! The ontology repository never talks to a storage engine directly. It goes
//! through the [`Graph`] trait defined here, which models a small property
//! graph:
//!
//! ```text
//!   ┌──────────────┐   label    ┌──────────────┐
//!   │ Vertex (id)  │──────────►│ Vertex (id)  │
//!   │  visibility  │   Edge     │  visibility  │
//!   │  properties  │            │  properties  │
//!   └──────────────┘            └──────────────┘
//! ```
//!
//! - Every vertex, edge and property carries a [`Visibility`]: a set of labels
//!   a reader must hold *all* of.
//! - Every read takes an [`Authorizations`] set; invisible elements simply do
//!   not exist for that reader.
//! - Deletes are soft by default (hidden, still in the store).
//!
//! [`InMemoryGraph`] is the bundled implementation. It keeps everything in
//! memory and can persist a JSON snapshot on [`Graph::flush`].

pub mod memory;

pub use memory::InMemoryGraph;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Key used for single-valued properties.
pub const DEFAULT_KEY: &str = "";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("vertex not found: {0}")]
    VertexNotFound(String),
    #[error("edge not found: {0}")]
    EdgeNotFound(String),
    #[error("snapshot I/O error at {path}: {message}")]
    Snapshot { path: String, message: String },
    #[error("snapshot encoding error: {0}")]
    Encoding(String),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

// ============================================================================
// Visibility and authorizations
// ============================================================================

/// Labels required to observe an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Visibility(BTreeSet<String>);

impl Visibility {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// Visible to everybody.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.0.insert(label.into());
        self
    }

    pub fn without_label(&self, label: &str) -> Self {
        Self(self.0.iter().filter(|l| *l != label).cloned().collect())
    }

    pub fn is_visible_to(&self, authorizations: &Authorizations) -> bool {
        self.0.iter().all(|label| authorizations.contains(label))
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.labels().collect();
        write!(f, "{}", labels.join("&"))
    }
}

/// Labels a reader holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorizations(BTreeSet<String>);

impl Authorizations {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn with(mut self, label: impl Into<String>) -> Self {
        self.0.insert(label.into());
        self
    }

    pub fn union(&self, other: &Authorizations) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Values and properties
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

pub type Metadata = BTreeMap<String, Value>;

/// A (possibly multi-valued) property. `(key, name)` identifies one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub metadata: Metadata,
    pub visibility: Visibility,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, visibility: Visibility) -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            name: name.into(),
            value: value.into(),
            metadata: Metadata::new(),
            visibility,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }
}

fn find_property<'a>(properties: &'a [Property], name: &str, key: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.name == name && p.key == key)
}

fn first_value<'a>(properties: &'a [Property], name: &str) -> Option<&'a Value> {
    find_property(properties, name, DEFAULT_KEY)
        .or_else(|| properties.iter().find(|p| p.name == name))
        .map(|p| &p.value)
}

// ============================================================================
// Vertices and edges
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: String,
    pub visibility: Visibility,
    pub properties: Vec<Property>,
}

impl Vertex {
    pub fn property(&self, name: &str, key: &str) -> Option<&Property> {
        find_property(&self.properties, name, key)
    }

    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Property> {
        self.properties.iter().filter(move |p| p.name == name)
    }

    /// Value stored under the default key, or the first value with that name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        first_value(&self.properties, name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_bool)
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(Value::as_f64)
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.value(name).and_then(Value::as_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub out_vertex_id: String,
    pub in_vertex_id: String,
    pub label: String,
    pub visibility: Visibility,
    pub properties: Vec<Property>,
}

impl Edge {
    pub fn other_vertex_id(&self, vertex_id: &str) -> &str {
        if self.out_vertex_id == vertex_id {
            &self.in_vertex_id
        } else {
            &self.out_vertex_id
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        first_value(&self.properties, name)
    }
}

/// Description of an edge to create.
#[derive(Debug, Clone)]
pub struct EdgeBuilder {
    edge: Edge,
}

impl EdgeBuilder {
    pub fn new(
        id: impl Into<String>,
        out_vertex_id: impl Into<String>,
        in_vertex_id: impl Into<String>,
        label: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            edge: Edge {
                id: id.into(),
                out_vertex_id: out_vertex_id.into(),
                in_vertex_id: in_vertex_id.into(),
                label: label.into(),
                visibility,
                properties: Vec::new(),
            },
        }
    }

    pub fn property(mut self, property: Property) -> Self {
        self.edge.properties.push(property);
        self
    }

    pub fn id(&self) -> &str {
        &self.edge.id
    }

    pub fn build(self) -> Edge {
        self.edge
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

// ============================================================================
// Property definitions (search index hints)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextIndexHint {
    FullText,
    ExactMatch,
}

impl TextIndexHint {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL_TEXT" => Some(Self::FullText),
            "EXACT_MATCH" => Some(Self::ExactMatch),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullText => "FULL_TEXT",
            Self::ExactMatch => "EXACT_MATCH",
        }
    }
}

/// How the storage engine should index a property name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    pub data_type: String,
    pub text_index_hints: BTreeSet<TextIndexHint>,
    pub sortable: bool,
    pub boost: Option<f64>,
}

impl PropertyDefinition {
    /// A definition that keeps the property out of every text index.
    pub fn unindexed(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            text_index_hints: BTreeSet::new(),
            sortable: false,
            boost: None,
        }
    }
}

// ============================================================================
// Gateway trait
// ============================================================================

/// Minimal graph-store surface consumed by the ontology repository.
///
/// Single-element mutations are atomic. Nothing spanning several vertices or
/// edges is.
pub trait Graph: Send + Sync {
    fn get_vertex(&self, id: &str, authorizations: &Authorizations) -> GraphResult<Option<Vertex>>;

    fn get_vertices(
        &self,
        ids: &[String],
        authorizations: &Authorizations,
    ) -> GraphResult<Vec<Vertex>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = self.get_vertex(id, authorizations)? {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// All visible vertices whose id starts with `prefix`, ordered by id.
    fn get_vertices_with_prefix(
        &self,
        prefix: &str,
        authorizations: &Authorizations,
    ) -> GraphResult<Vec<Vertex>>;

    /// Get-or-create a vertex by id. An existing vertex is returned unchanged.
    fn add_vertex(&self, id: &str, visibility: Visibility) -> GraphResult<Vertex>;

    /// Insert or replace the value identified by `(property.key, property.name)`.
    fn set_property(&self, vertex_id: &str, property: Property) -> GraphResult<()>;

    fn soft_delete_property(&self, vertex_id: &str, key: &str, name: &str) -> GraphResult<()>;

    fn alter_vertex_visibility(&self, vertex_id: &str, visibility: Visibility) -> GraphResult<()>;

    fn soft_delete_vertex(&self, vertex_id: &str) -> GraphResult<()>;

    fn get_edge(&self, id: &str, authorizations: &Authorizations) -> GraphResult<Option<Edge>>;

    /// Get-or-create an edge by id. Both endpoints must exist.
    fn get_or_create_edge(&self, edge: EdgeBuilder) -> GraphResult<Edge>;

    /// Physically remove an edge. Returns whether it existed.
    fn delete_edge(&self, id: &str) -> GraphResult<bool>;

    fn soft_delete_edge(&self, id: &str) -> GraphResult<()>;

    /// Visible edges touching `vertex_id` whose other endpoint is visible too.
    fn edges(
        &self,
        vertex_id: &str,
        direction: Direction,
        label: Option<&str>,
        authorizations: &Authorizations,
    ) -> GraphResult<Vec<Edge>>;

    /// Vertices on the other side of [`Graph::edges`].
    fn vertices(
        &self,
        vertex_id: &str,
        direction: Direction,
        label: Option<&str>,
        authorizations: &Authorizations,
    ) -> GraphResult<Vec<Vertex>> {
        let mut out = Vec::new();
        for edge in self.edges(vertex_id, direction, label, authorizations)? {
            if let Some(v) = self.get_vertex(edge.other_vertex_id(vertex_id), authorizations)? {
                out.push(v);
            }
        }
        Ok(out)
    }

    fn define_property(&self, definition: PropertyDefinition) -> GraphResult<()>;

    fn is_property_defined(&self, name: &str) -> bool;

    fn property_definition(&self, name: &str) -> Option<PropertyDefinition>;

    /// Make all previous writes durable and visible to later reads.
    fn flush(&self) -> GraphResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_requires_every_label() {
        let vis = Visibility::new(["ontology", "ws-1"]);
        assert!(!vis.is_visible_to(&Authorizations::new(["ontology"])));
        assert!(vis.is_visible_to(&Authorizations::new(["ontology", "ws-1", "other"])));
        assert!(Visibility::empty().is_visible_to(&Authorizations::default()));
    }

    #[test]
    fn without_label_keeps_the_rest() {
        let vis = Visibility::new(["ontology", "ws-1"]).without_label("ws-1");
        assert_eq!(vis, Visibility::new(["ontology"]));
        assert_eq!(vis.to_string(), "ontology");
    }

    #[test]
    fn vertex_value_prefers_default_key() {
        let vis = Visibility::empty();
        let vertex = Vertex {
            id: "v".to_string(),
            visibility: vis.clone(),
            properties: vec![
                Property::new("name", "keyed", vis.clone()).with_key("k"),
                Property::new("name", "default", vis),
            ],
        };
        assert_eq!(vertex.string("name"), Some("default"));
        assert_eq!(vertex.properties_named("name").count(), 2);
    }

    #[test]
    fn text_index_hint_parse() {
        assert_eq!(TextIndexHint::parse("full_text"), Some(TextIndexHint::FullText));
        assert_eq!(TextIndexHint::parse("EXACT_MATCH"), Some(TextIndexHint::ExactMatch));
        assert_eq!(TextIndexHint::parse("NONE"), None);
    }
}
