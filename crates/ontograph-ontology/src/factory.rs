//! Construction of element snapshots from graph vertices.
//!
//! The repository resolves structure (edges) itself and hands the factory a
//! record holding the vertex plus whatever the edges pointed at. Swapping the
//! factory changes how elements are represented without touching traversal.

use crate::error::{OntologyError, Result};
use crate::model::{Concept, ElementHandle, OntologyProperty, PropertyType, Relationship, SandboxStatus};
use crate::scope::VisibilityDescriptor;
use crate::vocab::props;
use ontograph_graph::{TextIndexHint, Value, Vertex};
use std::collections::BTreeMap;

pub struct ConceptRecord<'a> {
    pub vertex: &'a Vertex,
    pub parent_iri: Option<String>,
    pub properties: Vec<OntologyProperty>,
}

pub struct RelationshipRecord<'a> {
    pub vertex: &'a Vertex,
    pub parent_iri: Option<String>,
    pub domain_concept_iris: Vec<String>,
    pub range_concept_iris: Vec<String>,
    pub inverse_of_iris: Vec<String>,
    pub properties: Vec<OntologyProperty>,
}

pub struct PropertyRecord<'a> {
    pub vertex: &'a Vertex,
    /// Already ordered by the stored sequence.
    pub dependent_property_iris: Vec<String>,
    pub table_property_iris: Vec<String>,
}

/// Builds element values for the repository.
pub trait ElementFactory: Send + Sync {
    fn concept(&self, record: ConceptRecord<'_>) -> Result<Concept>;
    fn relationship(&self, record: RelationshipRecord<'_>) -> Result<Relationship>;
    fn property(&self, record: PropertyRecord<'_>) -> Result<OntologyProperty>;
}

/// Reads the property names the repository writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct VertexElementFactory;

fn required_iri(vertex: &Vertex) -> Result<String> {
    vertex
        .string(props::ONTOLOGY_TITLE)
        .map(str::to_string)
        .ok_or_else(|| {
            OntologyError::Corruption(format!("vertex {} has no ontology title", vertex.id))
        })
}

fn text(vertex: &Vertex, name: &str) -> Option<String> {
    vertex.string(name).map(str::to_string)
}

fn intents(vertex: &Vertex) -> Vec<String> {
    vertex
        .properties_named(props::INTENT)
        .filter_map(|p| p.value.as_str())
        .map(str::to_string)
        .collect()
}

fn placement(vertex: &Vertex) -> (VisibilityDescriptor, ElementHandle, SandboxStatus) {
    let visibility = VisibilityDescriptor::from_visibility(&vertex.visibility);
    let (handle, status) = if visibility.is_public() {
        (
            ElementHandle {
                public_vertex_id: Some(vertex.id.clone()),
                sandbox_vertex_id: None,
            },
            SandboxStatus::Public,
        )
    } else {
        (
            ElementHandle {
                public_vertex_id: None,
                sandbox_vertex_id: Some(vertex.id.clone()),
            },
            SandboxStatus::Private,
        )
    };
    (visibility, handle, status)
}

fn possible_values(vertex: &Vertex) -> Option<BTreeMap<String, String>> {
    let raw = vertex.string(props::POSSIBLE_VALUES)?;
    match serde_json::from_str(raw) {
        Ok(values) => Some(values),
        Err(e) => {
            tracing::warn!(vertex = %vertex.id, error = %e, "ignoring malformed possible values");
            None
        }
    }
}

impl ElementFactory for VertexElementFactory {
    fn concept(&self, record: ConceptRecord<'_>) -> Result<Concept> {
        let v = record.vertex;
        let (visibility, handle, sandbox_status) = placement(v);
        Ok(Concept {
            iri: required_iri(v)?,
            parent_iri: record.parent_iri,
            display_name: text(v, props::DISPLAY_NAME),
            display_type: text(v, props::DISPLAY_TYPE),
            color: text(v, props::COLOR),
            glyph_icon: v.bytes(props::GLYPH_ICON).map(<[u8]>::to_vec),
            title_formula: text(v, props::TITLE_FORMULA),
            subtitle_formula: text(v, props::SUBTITLE_FORMULA),
            time_formula: text(v, props::TIME_FORMULA),
            intents: intents(v),
            user_visible: v.boolean(props::USER_VISIBLE),
            searchable: v.boolean(props::SEARCHABLE),
            addable: v.boolean(props::ADDABLE),
            updateable: v.boolean(props::UPDATEABLE),
            deleteable: v.boolean(props::DELETEABLE),
            properties: record.properties,
            sandbox_status,
            visibility,
            handle,
        })
    }

    fn relationship(&self, record: RelationshipRecord<'_>) -> Result<Relationship> {
        let v = record.vertex;
        let (visibility, handle, sandbox_status) = placement(v);
        Ok(Relationship {
            iri: required_iri(v)?,
            parent_iri: record.parent_iri,
            display_name: text(v, props::DISPLAY_NAME),
            color: text(v, props::COLOR),
            title_formula: text(v, props::TITLE_FORMULA),
            subtitle_formula: text(v, props::SUBTITLE_FORMULA),
            time_formula: text(v, props::TIME_FORMULA),
            intents: intents(v),
            domain_concept_iris: record.domain_concept_iris,
            range_concept_iris: record.range_concept_iris,
            inverse_of_iris: record.inverse_of_iris,
            user_visible: v.boolean(props::USER_VISIBLE),
            updateable: v.boolean(props::UPDATEABLE),
            deleteable: v.boolean(props::DELETEABLE),
            properties: record.properties,
            sandbox_status,
            visibility,
            handle,
        })
    }

    fn property(&self, record: PropertyRecord<'_>) -> Result<OntologyProperty> {
        let v = record.vertex;
        let iri = required_iri(v)?;
        let data_type = v
            .string(props::DATA_TYPE)
            .ok_or_else(|| OntologyError::Corruption(format!("property {iri} has no data type")))?
            .parse::<PropertyType>()
            .map_err(OntologyError::Corruption)?;
        let (visibility, handle, sandbox_status) = placement(v);
        Ok(OntologyProperty {
            data_type,
            display_name: text(v, props::DISPLAY_NAME),
            display_type: text(v, props::DISPLAY_TYPE),
            property_group: text(v, props::PROPERTY_GROUP),
            validation_formula: text(v, props::VALIDATION_FORMULA),
            display_formula: text(v, props::DISPLAY_FORMULA),
            dependent_property_iris: record.dependent_property_iris,
            possible_values: possible_values(v),
            text_index_hints: v
                .properties_named(props::TEXT_INDEX_HINTS)
                .filter_map(|p| p.value.as_str().and_then(TextIndexHint::parse))
                .collect(),
            intents: intents(v),
            user_visible: v.boolean(props::USER_VISIBLE),
            searchable: v.boolean(props::SEARCHABLE),
            addable: v.boolean(props::ADDABLE),
            sortable: v.boolean(props::SORTABLE),
            updateable: v.boolean(props::UPDATEABLE),
            deleteable: v.boolean(props::DELETEABLE),
            boost: v.value(props::BOOST).and_then(Value::as_f64),
            table_property_iris: record.table_property_iris,
            sandbox_status,
            visibility,
            handle,
            iri,
        })
    }
}
