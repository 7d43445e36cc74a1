//! Fixed IRIs, vertex id prefixes, stored property names and edge labels.

/// Authorization label every ontology element carries.
pub const VISIBILITY_STRING: &str = "ontology";

pub const ROOT_CONCEPT_IRI: &str = "http://ontograph.dev#root";
pub const ENTITY_CONCEPT_IRI: &str = "http://www.w3.org/2002/07/owl#Thing";
pub const USER_CONCEPT_IRI: &str = "http://ontograph.dev/user#user";
pub const TOP_OBJECT_PROPERTY_IRI: &str = "http://www.w3.org/2002/07/owl#topObjectProperty";

pub const TITLE_PROPERTY_IRI: &str = "http://ontograph.dev#title";
pub const SOURCE_PROPERTY_IRI: &str = "http://ontograph.dev#source";

pub const ID_PREFIX: &str = "ontology_";
pub const ID_PREFIX_PROPERTY: &str = "ontology_prop_";
pub const ID_PREFIX_RELATIONSHIP: &str = "ontology_rel_";
pub const ID_PREFIX_CONCEPT: &str = "ontology_concept_";

pub const TYPE_CONCEPT: &str = "concept";
pub const TYPE_RELATIONSHIP: &str = "relationship";
pub const TYPE_PROPERTY: &str = "property";

/// Metadata entry on stored documents recording ingestion order.
pub const IMPORT_INDEX_METADATA: &str = "index";

/// Names of the properties written on ontology vertices.
pub mod props {
    pub const CONCEPT_TYPE: &str = "http://ontograph.dev#conceptType";
    pub const ONTOLOGY_TITLE: &str = "http://ontograph.dev#ontologyTitle";
    pub const DISPLAY_NAME: &str = "http://ontograph.dev#displayName";
    pub const DISPLAY_TYPE: &str = "http://ontograph.dev#displayType";
    pub const PROPERTY_GROUP: &str = "http://ontograph.dev#propertyGroup";
    pub const COLOR: &str = "http://ontograph.dev#color";
    pub const GLYPH_ICON: &str = "http://ontograph.dev#glyphIcon";
    pub const TITLE_FORMULA: &str = "http://ontograph.dev#titleFormula";
    pub const SUBTITLE_FORMULA: &str = "http://ontograph.dev#subtitleFormula";
    pub const TIME_FORMULA: &str = "http://ontograph.dev#timeFormula";
    pub const VALIDATION_FORMULA: &str = "http://ontograph.dev#validationFormula";
    pub const DISPLAY_FORMULA: &str = "http://ontograph.dev#displayFormula";
    pub const POSSIBLE_VALUES: &str = "http://ontograph.dev#possibleValues";
    pub const TEXT_INDEX_HINTS: &str = "http://ontograph.dev#textIndexHints";
    pub const INTENT: &str = "http://ontograph.dev#intent";
    pub const DATA_TYPE: &str = "http://ontograph.dev#dataType";
    pub const USER_VISIBLE: &str = "http://ontograph.dev#userVisible";
    pub const SEARCHABLE: &str = "http://ontograph.dev#searchable";
    pub const SORTABLE: &str = "http://ontograph.dev#sortable";
    pub const ADDABLE: &str = "http://ontograph.dev#addable";
    pub const UPDATEABLE: &str = "http://ontograph.dev#updateable";
    pub const DELETEABLE: &str = "http://ontograph.dev#deleteable";
    pub const BOOST: &str = "http://ontograph.dev#boost";
    pub const ONTOLOGY_FILE: &str = "http://ontograph.dev#ontologyFile";
    pub const ONTOLOGY_FILE_HASH: &str = "http://ontograph.dev#ontologyFileHash";
    pub const DEPENDENT_PROPERTY_ORDER: &str = "http://ontograph.dev#order";
}

/// Edge labels.
pub mod labels {
    pub const IS_A: &str = "http://ontograph.dev#isA";
    pub const HAS_EDGE: &str = "http://ontograph.dev#hasEdge";
    pub const HAS_PROPERTY: &str = "http://ontograph.dev#hasProperty";
    pub const INVERSE_OF: &str = "http://ontograph.dev#inverseOf";
    pub const DEPENDENT_PROPERTY: &str = "http://ontograph.dev#dependentProperty";
    pub const WORKSPACE_TO_ONTOLOGY: &str = "http://ontograph.dev/workspace#toOntology";
}

/// Display metadata that a re-declaration overwrites. Structure (hierarchy,
/// domain/range, attachments) is never in this set.
pub const CHANGEABLE_PROPERTIES: &[&str] = &[
    props::DISPLAY_NAME,
    props::DISPLAY_TYPE,
    props::PROPERTY_GROUP,
    props::COLOR,
    props::GLYPH_ICON,
    props::TITLE_FORMULA,
    props::SUBTITLE_FORMULA,
    props::TIME_FORMULA,
    props::VALIDATION_FORMULA,
    props::DISPLAY_FORMULA,
    props::POSSIBLE_VALUES,
    props::INTENT,
    props::USER_VISIBLE,
    props::SEARCHABLE,
    props::SORTABLE,
    props::ADDABLE,
    props::UPDATEABLE,
    props::DELETEABLE,
    props::BOOST,
];

pub fn is_changeable(property_name: &str) -> bool {
    CHANGEABLE_PROPERTIES.contains(&property_name)
}

pub fn dependent_property_edge_id(property_vertex_id: &str, index: usize) -> String {
    format!("{property_vertex_id}-dependentProperty-{index}")
}

pub fn edge_id(from: &str, label: &str, to: &str) -> String {
    let short = label.rsplit('#').next().unwrap_or(label);
    format!("{from}-{short}-{to}")
}
