//! In-memory views of ontology elements.
//!
//! Values here are snapshots: they are built from graph vertices by an
//! [`ElementFactory`](crate::factory::ElementFactory), merged across the
//! public and workspace scopes, and cached. Mutations go through the
//! repository, never through these structs.

use crate::scope::VisibilityDescriptor;
use crate::vocab;
use ontograph_graph::TextIndexHint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Kinds and statuses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Concept,
    Relationship,
    Property,
}

impl ElementKind {
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Concept => vocab::ID_PREFIX_CONCEPT,
            Self::Relationship => vocab::ID_PREFIX_RELATIONSHIP,
            Self::Property => vocab::ID_PREFIX_PROPERTY,
        }
    }

    /// Value of the concept-type marker stored on the vertex.
    pub fn type_marker(self) -> &'static str {
        match self {
            Self::Concept => vocab::TYPE_CONCEPT,
            Self::Relationship => vocab::TYPE_RELATIONSHIP,
            Self::Property => vocab::TYPE_PROPERTY,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_marker())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxStatus {
    #[default]
    Public,
    Private,
    PublicChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "dateTime")]
    DateTime,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "geoLocation")]
    GeoLocation,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "currency")]
    Currency,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "directory/entity")]
    DirectoryEntity,
    #[serde(rename = "extendedDataTable")]
    ExtendedDataTable,
}

impl PropertyType {
    pub const ALL: [PropertyType; 12] = [
        Self::Date,
        Self::DateTime,
        Self::String,
        Self::GeoLocation,
        Self::Image,
        Self::Binary,
        Self::Currency,
        Self::Double,
        Self::Boolean,
        Self::Integer,
        Self::DirectoryEntity,
        Self::ExtendedDataTable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::String => "string",
            Self::GeoLocation => "geoLocation",
            Self::Image => "image",
            Self::Binary => "binary",
            Self::Currency => "currency",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::DirectoryEntity => "directory/entity",
            Self::ExtendedDataTable => "extendedDataTable",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown property type: {s}"))
    }
}

/// Graph vertices backing one logical element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementHandle {
    pub public_vertex_id: Option<String>,
    pub sandbox_vertex_id: Option<String>,
}

impl ElementHandle {
    /// Sandbox overlay first, then the public vertex.
    pub fn vertex_ids(&self) -> impl Iterator<Item = &str> {
        self.sandbox_vertex_id
            .iter()
            .chain(self.public_vertex_id.iter())
            .map(String::as_str)
    }

    /// The vertex a reader in the element's scope sees first.
    pub fn effective_vertex_id(&self) -> Option<&str> {
        self.vertex_ids().next()
    }
}

// ============================================================================
// Elements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OntologyProperty {
    pub iri: String,
    pub data_type: PropertyType,
    pub display_name: Option<String>,
    pub display_type: Option<String>,
    pub property_group: Option<String>,
    pub validation_formula: Option<String>,
    pub display_formula: Option<String>,
    /// Ordered; the order feeds display formulas.
    pub dependent_property_iris: Vec<String>,
    pub possible_values: Option<BTreeMap<String, String>>,
    pub text_index_hints: BTreeSet<TextIndexHint>,
    pub intents: Vec<String>,
    pub user_visible: Option<bool>,
    pub searchable: Option<bool>,
    pub addable: Option<bool>,
    pub sortable: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
    pub boost: Option<f64>,
    /// Column properties of an `extendedDataTable` property.
    pub table_property_iris: Vec<String>,
    pub sandbox_status: SandboxStatus,
    pub visibility: VisibilityDescriptor,
    pub handle: ElementHandle,
}

impl OntologyProperty {
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.iri)
    }

    pub fn is_user_visible(&self) -> bool {
        self.user_visible.unwrap_or(true)
    }

    pub fn is_searchable(&self) -> bool {
        self.searchable.unwrap_or(true)
    }

    pub fn is_addable(&self) -> bool {
        self.addable.unwrap_or(true)
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable.unwrap_or(true)
    }

    pub fn is_updateable(&self) -> bool {
        self.updateable.unwrap_or(true)
    }

    pub fn is_deleteable(&self) -> bool {
        self.deleteable.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Concept {
    pub iri: String,
    pub parent_iri: Option<String>,
    pub display_name: Option<String>,
    pub display_type: Option<String>,
    pub color: Option<String>,
    pub glyph_icon: Option<Vec<u8>>,
    pub title_formula: Option<String>,
    pub subtitle_formula: Option<String>,
    pub time_formula: Option<String>,
    pub intents: Vec<String>,
    pub user_visible: Option<bool>,
    pub searchable: Option<bool>,
    pub addable: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
    pub properties: Vec<OntologyProperty>,
    pub sandbox_status: SandboxStatus,
    pub visibility: VisibilityDescriptor,
    pub handle: ElementHandle,
}

impl Concept {
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.iri)
    }

    pub fn property_iris(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.iri.as_str())
    }

    pub fn has_intent(&self, intent: &str) -> bool {
        self.intents.iter().any(|i| i == intent)
    }

    pub fn is_user_visible(&self) -> bool {
        self.user_visible.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub iri: String,
    pub parent_iri: Option<String>,
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub title_formula: Option<String>,
    pub subtitle_formula: Option<String>,
    pub time_formula: Option<String>,
    pub intents: Vec<String>,
    pub domain_concept_iris: Vec<String>,
    pub range_concept_iris: Vec<String>,
    pub inverse_of_iris: Vec<String>,
    pub user_visible: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
    pub properties: Vec<OntologyProperty>,
    pub sandbox_status: SandboxStatus,
    pub visibility: VisibilityDescriptor,
    pub handle: ElementHandle,
}

impl Relationship {
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.iri)
    }

    pub fn property_iris(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.iri.as_str())
    }

    pub fn is_user_visible(&self) -> bool {
        self.user_visible.unwrap_or(true)
    }
}

/// A concept or relationship IRI, optionally widened to its subtypes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementTypeFilter {
    pub iri: String,
    pub include_child_nodes: bool,
}

impl ElementTypeFilter {
    pub fn new(iri: impl Into<String>, include_child_nodes: bool) -> Self {
        Self {
            iri: iri.into(),
            include_child_nodes,
        }
    }
}

// ============================================================================
// Shared element behaviour
// ============================================================================

/// Lookup surface shared by the three element kinds.
pub trait OntologyElement: Clone {
    const KIND: ElementKind;

    fn iri(&self) -> &str;
    fn intents(&self) -> &[String];
    fn handle(&self) -> &ElementHandle;

    /// Parent in the type tree. Properties have none.
    fn parent_iri(&self) -> Option<&str> {
        None
    }
}

impl OntologyElement for Concept {
    const KIND: ElementKind = ElementKind::Concept;

    fn iri(&self) -> &str {
        &self.iri
    }

    fn intents(&self) -> &[String] {
        &self.intents
    }

    fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    fn parent_iri(&self) -> Option<&str> {
        self.parent_iri.as_deref()
    }
}

impl OntologyElement for Relationship {
    const KIND: ElementKind = ElementKind::Relationship;

    fn iri(&self) -> &str {
        &self.iri
    }

    fn intents(&self) -> &[String] {
        &self.intents
    }

    fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    fn parent_iri(&self) -> Option<&str> {
        self.parent_iri.as_deref()
    }
}

impl OntologyElement for OntologyProperty {
    const KIND: ElementKind = ElementKind::Property;

    fn iri(&self) -> &str {
        &self.iri
    }

    fn intents(&self) -> &[String] {
        &self.intents
    }

    fn handle(&self) -> &ElementHandle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_type_names_round_trip() {
        for t in PropertyType::ALL {
            assert_eq!(t.as_str().parse::<PropertyType>().unwrap(), t);
        }
        assert_eq!(
            serde_json::to_string(&PropertyType::DirectoryEntity).unwrap(),
            "\"directory/entity\""
        );
        assert!("nope".parse::<PropertyType>().is_err());
    }

    #[test]
    fn handle_prefers_sandbox_vertex() {
        let handle = ElementHandle {
            public_vertex_id: Some("p".into()),
            sandbox_vertex_id: Some("s".into()),
        };
        assert_eq!(handle.effective_vertex_id(), Some("s"));
        assert_eq!(handle.vertex_ids().collect::<Vec<_>>(), vec!["s", "p"]);
        assert_eq!(ElementHandle::default().effective_vertex_id(), None);
    }

    #[test]
    fn sandbox_status_serializes_like_the_client_expects() {
        assert_eq!(
            serde_json::to_string(&SandboxStatus::PublicChanged).unwrap(),
            "\"PUBLIC_CHANGED\""
        );
    }
}
