//! Aggregated, serializable ontology snapshot handed to clients.

use crate::model::{Concept, OntologyProperty, PropertyType, Relationship, SandboxStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientApiOntology {
    pub concepts: Vec<ClientApiConcept>,
    pub relationships: Vec<ClientApiRelationship>,
    pub properties: Vec<ClientApiProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientApiConcept {
    pub id: String,
    pub title: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_concept: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub has_glyph_icon: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_formula: Option<String>,
    pub intents: Vec<String>,
    pub properties: Vec<String>,
    pub user_visible: bool,
    pub searchable: bool,
    pub addable: bool,
    pub updateable: bool,
    pub deleteable: bool,
    pub sandbox_status: SandboxStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientApiRelationship {
    pub title: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_iri: Option<String>,
    pub domain_concept_iris: Vec<String>,
    pub range_concept_iris: Vec<String>,
    pub inverse_of_iris: Vec<String>,
    pub intents: Vec<String>,
    pub properties: Vec<String>,
    pub user_visible: bool,
    pub updateable: bool,
    pub deleteable: bool,
    pub sandbox_status: SandboxStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientApiProperty {
    pub title: String,
    pub display_name: String,
    pub data_type: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_formula: Option<String>,
    pub dependent_property_iris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub possible_values: Option<BTreeMap<String, String>>,
    pub text_index_hints: Vec<String>,
    pub intents: Vec<String>,
    pub table_property_iris: Vec<String>,
    pub user_visible: bool,
    pub searchable: bool,
    pub addable: bool,
    pub sortable: bool,
    pub updateable: bool,
    pub deleteable: bool,
    pub sandbox_status: SandboxStatus,
}

impl From<&Concept> for ClientApiConcept {
    fn from(c: &Concept) -> Self {
        Self {
            id: c.iri.clone(),
            title: c.iri.clone(),
            display_name: c.display_label().to_string(),
            parent_concept: c.parent_iri.clone(),
            display_type: c.display_type.clone(),
            color: c.color.clone(),
            has_glyph_icon: c.glyph_icon.is_some(),
            title_formula: c.title_formula.clone(),
            subtitle_formula: c.subtitle_formula.clone(),
            time_formula: c.time_formula.clone(),
            intents: c.intents.clone(),
            properties: c.property_iris().map(str::to_string).collect(),
            user_visible: c.is_user_visible(),
            searchable: c.searchable.unwrap_or(true),
            addable: c.addable.unwrap_or(true),
            updateable: c.updateable.unwrap_or(true),
            deleteable: c.deleteable.unwrap_or(true),
            sandbox_status: c.sandbox_status,
        }
    }
}

impl From<&Relationship> for ClientApiRelationship {
    fn from(r: &Relationship) -> Self {
        Self {
            title: r.iri.clone(),
            display_name: r.display_label().to_string(),
            parent_iri: r.parent_iri.clone(),
            domain_concept_iris: r.domain_concept_iris.clone(),
            range_concept_iris: r.range_concept_iris.clone(),
            inverse_of_iris: r.inverse_of_iris.clone(),
            intents: r.intents.clone(),
            properties: r.property_iris().map(str::to_string).collect(),
            user_visible: r.is_user_visible(),
            updateable: r.updateable.unwrap_or(true),
            deleteable: r.deleteable.unwrap_or(true),
            sandbox_status: r.sandbox_status,
        }
    }
}

impl From<&OntologyProperty> for ClientApiProperty {
    fn from(p: &OntologyProperty) -> Self {
        Self {
            title: p.iri.clone(),
            display_name: p.display_label().to_string(),
            data_type: p.data_type,
            display_type: p.display_type.clone(),
            property_group: p.property_group.clone(),
            validation_formula: p.validation_formula.clone(),
            display_formula: p.display_formula.clone(),
            dependent_property_iris: p.dependent_property_iris.clone(),
            possible_values: p.possible_values.clone(),
            text_index_hints: p
                .text_index_hints
                .iter()
                .map(|h| h.as_str().to_string())
                .collect(),
            intents: p.intents.clone(),
            table_property_iris: p.table_property_iris.clone(),
            user_visible: p.is_user_visible(),
            searchable: p.is_searchable(),
            addable: p.is_addable(),
            sortable: p.is_sortable(),
            updateable: p.is_updateable(),
            deleteable: p.is_deleteable(),
            sandbox_status: p.sandbox_status,
        }
    }
}

impl ClientApiOntology {
    pub fn build(
        concepts: &[Concept],
        relationships: &[Relationship],
        properties: &[OntologyProperty],
    ) -> Self {
        Self {
            concepts: concepts.iter().map(ClientApiConcept::from).collect(),
            relationships: relationships.iter().map(ClientApiRelationship::from).collect(),
            properties: properties.iter().map(ClientApiProperty::from).collect(),
        }
    }

    pub fn concept(&self, iri: &str) -> Option<&ClientApiConcept> {
        self.concepts.iter().find(|c| c.title == iri)
    }

    pub fn relationship(&self, iri: &str) -> Option<&ClientApiRelationship> {
        self.relationships.iter().find(|r| r.title == iri)
    }

    pub fn property(&self, iri: &str) -> Option<&ClientApiProperty> {
        self.properties.iter().find(|p| p.title == iri)
    }
}
