//! Format-independent schema declarations and the parser seam.
//!
//! A [`SchemaParser`] turns one document (plus previously imported documents
//! as context) into a [`ParsedOntology`]. The import pipeline applies the
//! declarations; parsers never touch the graph.

use crate::definition::{
    ConceptDefinition, ConceptUpdate, OntologyPropertyDefinition, PropertyUpdate,
    RelationshipDefinition, RelationshipUpdate,
};
use crate::error::{OntologyError, Result};
use crate::model::PropertyType;
use ontograph_graph::TextIndexHint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw bytes of a schema document and the IRI it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDocument {
    pub iri: String,
    pub bytes: Vec<u8>,
}

impl SchemaDocument {
    pub fn new(iri: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            iri: iri.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConceptDeclaration {
    pub iri: String,
    pub parent_iri: Option<String>,
    pub display_name: Option<String>,
    pub display_type: Option<String>,
    pub color: Option<String>,
    /// Path relative to the imported document's directory.
    pub glyph_icon_file_name: Option<String>,
    pub title_formula: Option<String>,
    pub subtitle_formula: Option<String>,
    pub time_formula: Option<String>,
    pub intents: Vec<String>,
    pub user_visible: Option<bool>,
    pub searchable: Option<bool>,
    pub addable: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
}

impl ConceptDeclaration {
    pub fn to_definition(&self, parent_iri: Option<String>, glyph_icon: Option<Vec<u8>>) -> ConceptDefinition {
        ConceptDefinition {
            iri: self.iri.clone(),
            parent_iri,
            fields: ConceptUpdate {
                display_name: self.display_name.clone(),
                display_type: self.display_type.clone(),
                color: self.color.clone(),
                glyph_icon,
                title_formula: self.title_formula.clone(),
                subtitle_formula: self.subtitle_formula.clone(),
                time_formula: self.time_formula.clone(),
                intents: Some(self.intents.clone()),
                user_visible: self.user_visible,
                searchable: self.searchable,
                addable: self.addable,
                updateable: self.updateable,
                deleteable: self.deleteable,
            },
            redeclared: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelationshipDeclaration {
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
}

impl RelationshipDeclaration {
    pub fn to_definition(&self, parent_iri: Option<String>) -> RelationshipDefinition {
        RelationshipDefinition {
            iri: self.iri.clone(),
            parent_iri,
            domain_concept_iris: self.domain_concept_iris.clone(),
            range_concept_iris: self.range_concept_iris.clone(),
            fields: RelationshipUpdate {
                display_name: self.display_name.clone(),
                color: self.color.clone(),
                title_formula: self.title_formula.clone(),
                subtitle_formula: self.subtitle_formula.clone(),
                time_formula: self.time_formula.clone(),
                intents: Some(self.intents.clone()),
                user_visible: self.user_visible,
                updateable: self.updateable,
                deleteable: self.deleteable,
            },
            redeclared: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDeclaration {
    pub iri: String,
    pub data_type: PropertyType,
    pub display_name: Option<String>,
    /// Concept or relationship IRIs owning the property.
    #[serde(default)]
    pub domain_iris: Vec<String>,
    #[serde(default)]
    pub extended_data_table_domains: Vec<String>,
    pub possible_values: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub text_index_hints: Vec<TextIndexHint>,
    #[serde(default)]
    pub dependent_property_iris: Vec<String>,
    pub display_type: Option<String>,
    pub property_group: Option<String>,
    pub validation_formula: Option<String>,
    pub display_formula: Option<String>,
    #[serde(default)]
    pub intents: Vec<String>,
    pub user_visible: Option<bool>,
    pub searchable: Option<bool>,
    pub addable: Option<bool>,
    pub sortable: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
    pub boost: Option<f64>,
}

impl PropertyDeclaration {
    pub fn new(iri: impl Into<String>, data_type: PropertyType) -> Self {
        Self {
            iri: iri.into(),
            data_type,
            display_name: None,
            domain_iris: Vec::new(),
            extended_data_table_domains: Vec::new(),
            possible_values: None,
            text_index_hints: Vec::new(),
            dependent_property_iris: Vec::new(),
            display_type: None,
            property_group: None,
            validation_formula: None,
            display_formula: None,
            intents: Vec::new(),
            user_visible: None,
            searchable: None,
            addable: None,
            sortable: None,
            updateable: None,
            deleteable: None,
            boost: None,
        }
    }

    /// Dependents are applied in a second pass once every property exists.
    pub fn to_definition(
        &self,
        concept_iris: Vec<String>,
        relationship_iris: Vec<String>,
    ) -> OntologyPropertyDefinition {
        OntologyPropertyDefinition {
            iri: self.iri.clone(),
            data_type: self.data_type,
            concept_iris,
            relationship_iris,
            extended_data_table_domains: self.extended_data_table_domains.clone(),
            text_index_hints: self.text_index_hints.iter().copied().collect(),
            dependent_property_iris: None,
            fields: PropertyUpdate {
                display_name: self.display_name.clone(),
                display_type: self.display_type.clone(),
                property_group: self.property_group.clone(),
                validation_formula: self.validation_formula.clone(),
                display_formula: self.display_formula.clone(),
                possible_values: self.possible_values.clone(),
                intents: Some(self.intents.clone()),
                user_visible: Some(self.user_visible.unwrap_or(true)),
                searchable: Some(self.searchable.unwrap_or(true)),
                addable: Some(self.addable.unwrap_or(true)),
                sortable: Some(self.sortable.unwrap_or(true)),
                updateable: Some(self.updateable.unwrap_or(true)),
                deleteable: Some(self.deleteable.unwrap_or(true)),
                boost: self.boost,
            },
            redeclared: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnotationPropertyDeclaration {
    pub iri: String,
    pub display_name: Option<String>,
}

/// A problem the parser skipped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    pub document: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOntology {
    pub concepts: Vec<ConceptDeclaration>,
    pub relationships: Vec<RelationshipDeclaration>,
    pub properties: Vec<PropertyDeclaration>,
    pub annotation_properties: Vec<AnnotationPropertyDeclaration>,
    pub import_errors: Vec<ImportError>,
}

pub trait SchemaParser: Send + Sync {
    /// Parse `document`. `context` holds previously imported documents in
    /// import order, for cross-document references.
    fn parse(&self, document: &SchemaDocument, context: &[SchemaDocument]) -> Result<ParsedOntology>;
}

// ============================================================================
// JSON declarations
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct JsonSchemaFile {
    concepts: Vec<ConceptDeclaration>,
    relationships: Vec<RelationshipDeclaration>,
    properties: Vec<PropertyDeclaration>,
    annotation_properties: Vec<AnnotationPropertyDeclaration>,
}

/// Reads declarations serialized as JSON.
///
/// Context documents are only checked for well-formedness; a broken one is
/// reported as an import error and otherwise ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaParser;

impl SchemaParser for JsonSchemaParser {
    fn parse(&self, document: &SchemaDocument, context: &[SchemaDocument]) -> Result<ParsedOntology> {
        let file: JsonSchemaFile = serde_json::from_slice(&document.bytes)
            .map_err(|e| OntologyError::import(&document.iri, e))?;

        let import_errors = context
            .iter()
            .filter_map(|doc| {
                serde_json::from_slice::<JsonSchemaFile>(&doc.bytes)
                    .err()
                    .map(|e| ImportError {
                        document: doc.iri.clone(),
                        message: e.to_string(),
                    })
            })
            .collect();

        Ok(ParsedOntology {
            concepts: file.concepts,
            relationships: file.relationships,
            properties: file.properties,
            annotation_properties: file.annotation_properties,
            import_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_declarations_parse_with_defaults() {
        let doc = SchemaDocument::new(
            "http://x/doc",
            r#"{
                "concepts": [{ "iri": "http://x#person", "displayName": "Person", "intents": ["person"] }],
                "properties": [{ "iri": "http://x#name", "dataType": "string", "domainIris": ["http://x#person"],
                                 "textIndexHints": ["FULL_TEXT"] }]
            }"#,
        );
        let parsed = JsonSchemaParser.parse(&doc, &[]).unwrap();
        assert_eq!(parsed.concepts[0].intents, vec!["person"]);
        assert_eq!(parsed.properties[0].data_type, PropertyType::String);
        assert_eq!(parsed.properties[0].text_index_hints, vec![TextIndexHint::FullText]);
        assert!(parsed.relationships.is_empty());
        assert!(parsed.import_errors.is_empty());
    }

    #[test]
    fn broken_context_is_reported_not_fatal() {
        let doc = SchemaDocument::new("http://x/doc", "{}");
        let bad = SchemaDocument::new("http://x/old", "not json");
        let parsed = JsonSchemaParser.parse(&doc, &[bad]).unwrap();
        assert_eq!(parsed.import_errors.len(), 1);
        assert_eq!(parsed.import_errors[0].document, "http://x/old");

        let err = JsonSchemaParser.parse(&SchemaDocument::new("d", "[1"), &[]).unwrap_err();
        assert!(matches!(err, OntologyError::ImportFailure { .. }));
    }

    #[test]
    fn property_declaration_defaults_flags_on() {
        let def = PropertyDeclaration::new("p", PropertyType::Integer).to_definition(vec![], vec![]);
        assert_eq!(def.fields.addable, Some(true));
        assert!(def.redeclared);
        assert!(def.dependent_property_iris.is_none());
        assert_eq!(def.fields.intents, Some(Vec::new()));
    }
}
