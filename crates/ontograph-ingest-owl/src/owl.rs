//! OWL declarations to repository declarations.
//!
//! Recognised vocabulary:
//!
//! - `owl:Class` with `rdfs:subClassOf` / `rdfs:label` becomes a concept
//! - `owl:ObjectProperty` with `rdfs:domain`, `rdfs:range`, `owl:inverseOf`
//!   and `rdfs:subPropertyOf` becomes a relationship
//! - `owl:DatatypeProperty` becomes a property; its `xsd:` range picks the
//!   data type unless `ontograph:dataType` names one explicitly
//! - `owl:AnnotationProperty` is reported to the annotation visitors
//!
//! Display metadata comes from `ontograph:` annotations (`intent`, `color`,
//! `textIndexHints`, `dependentPropertyIri`, ...).

use crate::rdf::{self, RdfSyntax, Term, Triple, OWL, RDF, RDFS, XSD};
use ontograph_ontology::vocab::props;
use ontograph_ontology::{
    AnnotationPropertyDeclaration, ConceptDeclaration, ImportError, OntologyError, ParsedOntology,
    PropertyDeclaration, PropertyType, RelationshipDeclaration, SchemaDocument, SchemaParser,
    TextIndexHint,
};
use std::collections::{BTreeMap, HashMap};

/// Ordered list of dependent property IRIs, one triple per entry.
pub const DEPENDENT_PROPERTY_IRI: &str = "http://ontograph.dev#dependentPropertyIri";
pub const EXTENDED_DATA_TABLE_DOMAIN: &str = "http://ontograph.dev#extendedDataTableDomain";

#[derive(Debug, thiserror::Error)]
pub enum OwlError {
    #[error("invalid {syntax}: {message}")]
    Parse { syntax: RdfSyntax, message: String },

    #[error("document is not UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("{iri}: unsupported data type {data_type}")]
    UnsupportedDataType { iri: String, data_type: String },

    #[error("{iri}: invalid {annotation}: {message}")]
    InvalidAnnotation {
        iri: String,
        annotation: String,
        message: String,
    },
}

// ============================================================================
// Subjects
// ============================================================================

/// Every statement about one IRI, in document order.
#[derive(Debug, Clone, Default)]
struct Subject {
    iri: String,
    types: Vec<String>,
    statements: Vec<(String, Term)>,
}

impl Subject {
    fn is_a(&self, owl_type: &str) -> bool {
        self.types.iter().any(|t| t == owl_type)
    }

    fn values<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.statements
            .iter()
            .filter(move |(p, _)| p == predicate)
            .map(|(_, o)| o)
    }

    fn iris(&self, predicate: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for iri in self.values(predicate).filter_map(Term::as_iri) {
            if !out.iter().any(|seen| seen == iri) {
                out.push(iri.to_string());
            }
        }
        out
    }

    fn texts(&self, predicate: &str) -> Vec<String> {
        self.values(predicate)
            .filter_map(Term::text)
            .map(str::to_string)
            .collect()
    }

    /// Last value wins, so later documents can override earlier ones.
    fn text(&self, predicate: &str) -> Option<String> {
        self.values(predicate)
            .filter_map(Term::text)
            .last()
            .map(str::to_string)
    }

    fn flag(&self, predicate: &str) -> Result<Option<bool>, OwlError> {
        let Some(value) = self.text(predicate) else {
            return Ok(None);
        };
        match value.trim() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            other => Err(self.invalid(predicate, format!("expected a boolean, got {other}"))),
        }
    }

    fn invalid(&self, annotation: &str, message: impl Into<String>) -> OwlError {
        OwlError::InvalidAnnotation {
            iri: self.iri.clone(),
            annotation: annotation.to_string(),
            message: message.into(),
        }
    }

    fn display_name(&self) -> Option<String> {
        self.text(props::DISPLAY_NAME)
            .or_else(|| self.text(&format!("{RDFS}label")))
    }

    fn is_declaration(&self) -> bool {
        [
            "Class",
            "ObjectProperty",
            "DatatypeProperty",
            "AnnotationProperty",
        ]
        .iter()
        .any(|t| self.is_a(&format!("{OWL}{t}")))
    }
}

fn group_by_subject(triples: Vec<Triple>) -> Vec<Subject> {
    let rdf_type = format!("{RDF}type");
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut subjects: Vec<Subject> = Vec::new();
    for triple in triples {
        // restrictions and other anonymous class expressions are not schema
        let Term::Iri(iri) = triple.subject else {
            tracing::debug!(predicate = %triple.predicate, "skipping blank-node statement");
            continue;
        };
        let idx = *positions.entry(iri.clone()).or_insert_with(|| {
            subjects.push(Subject {
                iri,
                ..Subject::default()
            });
            subjects.len() - 1
        });
        let subject = &mut subjects[idx];
        if triple.predicate == rdf_type {
            if let Some(t) = triple.object.as_iri() {
                if !subject.types.iter().any(|seen| seen == t) {
                    subject.types.push(t.to_string());
                }
            }
        }
        subject.statements.push((triple.predicate, triple.object));
    }
    subjects
}

fn read_subjects(document_iri: &str, bytes: &[u8]) -> Result<Vec<Subject>, OwlError> {
    let syntax = RdfSyntax::for_document(document_iri);
    Ok(group_by_subject(rdf::parse_document(bytes, syntax)?))
}

// ============================================================================
// Declarations
// ============================================================================

fn concept(subject: &Subject) -> Result<ConceptDeclaration, OwlError> {
    Ok(ConceptDeclaration {
        iri: subject.iri.clone(),
        parent_iri: subject.iris(&format!("{RDFS}subClassOf")).into_iter().next(),
        display_name: subject.display_name(),
        display_type: subject.text(props::DISPLAY_TYPE),
        color: subject.text(props::COLOR),
        glyph_icon_file_name: subject.text(props::GLYPH_ICON),
        title_formula: subject.text(props::TITLE_FORMULA),
        subtitle_formula: subject.text(props::SUBTITLE_FORMULA),
        time_formula: subject.text(props::TIME_FORMULA),
        intents: subject.texts(props::INTENT),
        user_visible: subject.flag(props::USER_VISIBLE)?,
        searchable: subject.flag(props::SEARCHABLE)?,
        addable: subject.flag(props::ADDABLE)?,
        updateable: subject.flag(props::UPDATEABLE)?,
        deleteable: subject.flag(props::DELETEABLE)?,
    })
}

fn relationship(subject: &Subject) -> Result<RelationshipDeclaration, OwlError> {
    Ok(RelationshipDeclaration {
        iri: subject.iri.clone(),
        parent_iri: subject
            .iris(&format!("{RDFS}subPropertyOf"))
            .into_iter()
            .next(),
        display_name: subject.display_name(),
        color: subject.text(props::COLOR),
        title_formula: subject.text(props::TITLE_FORMULA),
        subtitle_formula: subject.text(props::SUBTITLE_FORMULA),
        time_formula: subject.text(props::TIME_FORMULA),
        intents: subject.texts(props::INTENT),
        domain_concept_iris: subject.iris(&format!("{RDFS}domain")),
        range_concept_iris: subject.iris(&format!("{RDFS}range")),
        inverse_of_iris: subject.iris(&format!("{OWL}inverseOf")),
        user_visible: subject.flag(props::USER_VISIBLE)?,
        updateable: subject.flag(props::UPDATEABLE)?,
        deleteable: subject.flag(props::DELETEABLE)?,
    })
}

fn xsd_data_type(range: &str) -> Option<PropertyType> {
    let local = range.strip_prefix(XSD)?;
    let data_type = match local {
        "string" | "normalizedString" | "token" | "anyURI" => PropertyType::String,
        "date" => PropertyType::Date,
        "dateTime" | "dateTimeStamp" => PropertyType::DateTime,
        "boolean" => PropertyType::Boolean,
        "int" | "integer" | "long" | "short" | "nonNegativeInteger" | "positiveInteger" => {
            PropertyType::Integer
        }
        "double" | "float" | "decimal" => PropertyType::Double,
        "hexBinary" | "base64Binary" => PropertyType::Binary,
        _ => return None,
    };
    Some(data_type)
}

fn data_type(subject: &Subject) -> Result<PropertyType, OwlError> {
    if let Some(explicit) = subject.text(props::DATA_TYPE) {
        return explicit
            .parse()
            .map_err(|_| OwlError::UnsupportedDataType {
                iri: subject.iri.clone(),
                data_type: explicit,
            });
    }
    match subject.iris(&format!("{RDFS}range")).first() {
        None => Ok(PropertyType::String),
        Some(range) => xsd_data_type(range).ok_or_else(|| OwlError::UnsupportedDataType {
            iri: subject.iri.clone(),
            data_type: range.clone(),
        }),
    }
}

fn text_index_hints(subject: &Subject) -> Result<Vec<TextIndexHint>, OwlError> {
    let mut hints = Vec::new();
    for value in subject.texts(props::TEXT_INDEX_HINTS) {
        for raw in value.split(',').filter(|s| !s.trim().is_empty()) {
            let hint = TextIndexHint::parse(raw)
                .ok_or_else(|| subject.invalid(props::TEXT_INDEX_HINTS, format!("unknown hint {raw}")))?;
            if !hints.contains(&hint) {
                hints.push(hint);
            }
        }
    }
    Ok(hints)
}

fn property(subject: &Subject) -> Result<PropertyDeclaration, OwlError> {
    let mut decl = PropertyDeclaration::new(subject.iri.clone(), data_type(subject)?);
    decl.display_name = subject.display_name();
    decl.domain_iris = subject.iris(&format!("{RDFS}domain"));
    decl.extended_data_table_domains = subject.iris(EXTENDED_DATA_TABLE_DOMAIN);
    decl.text_index_hints = text_index_hints(subject)?;
    decl.dependent_property_iris = subject.iris(DEPENDENT_PROPERTY_IRI);
    decl.possible_values = subject
        .text(props::POSSIBLE_VALUES)
        .map(|json| serde_json::from_str::<BTreeMap<String, String>>(&json))
        .transpose()
        .map_err(|e| subject.invalid(props::POSSIBLE_VALUES, e.to_string()))?;
    decl.display_type = subject.text(props::DISPLAY_TYPE);
    decl.property_group = subject.text(props::PROPERTY_GROUP);
    decl.validation_formula = subject.text(props::VALIDATION_FORMULA);
    decl.display_formula = subject.text(props::DISPLAY_FORMULA);
    decl.intents = subject.texts(props::INTENT);
    decl.user_visible = subject.flag(props::USER_VISIBLE)?;
    decl.searchable = subject.flag(props::SEARCHABLE)?;
    decl.addable = subject.flag(props::ADDABLE)?;
    decl.sortable = subject.flag(props::SORTABLE)?;
    decl.updateable = subject.flag(props::UPDATEABLE)?;
    decl.deleteable = subject.flag(props::DELETEABLE)?;
    decl.boost = subject
        .text(props::BOOST)
        .map(|b| b.trim().parse::<f64>())
        .transpose()
        .map_err(|e| subject.invalid(props::BOOST, e.to_string()))?;
    Ok(decl)
}

// ============================================================================
// Parser
// ============================================================================

/// Reads OWL schema documents (N-Triples, Turtle or RDF/XML, by extension).
///
/// Context documents let a later file extend an element declared earlier:
/// an untyped subject whose type is known from context is redeclared with
/// the earlier statements followed by the new ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwlSchemaParser;

impl OwlSchemaParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_document(
        &self,
        document_iri: &str,
        content: &[u8],
        context: &[SchemaDocument],
    ) -> Result<ParsedOntology, OwlError> {
        let mut parsed = ParsedOntology::default();

        let mut known: HashMap<String, Subject> = HashMap::new();
        for doc in context {
            match read_subjects(&doc.iri, &doc.bytes) {
                Ok(subjects) => {
                    for subject in subjects {
                        let entry = known.entry(subject.iri.clone()).or_insert_with(|| Subject {
                            iri: subject.iri.clone(),
                            ..Subject::default()
                        });
                        for t in subject.types {
                            if !entry.types.contains(&t) {
                                entry.types.push(t);
                            }
                        }
                        entry.statements.extend(subject.statements);
                    }
                }
                Err(e) => parsed.import_errors.push(ImportError {
                    document: doc.iri.clone(),
                    message: e.to_string(),
                }),
            }
        }

        for subject in read_subjects(document_iri, content)? {
            let subject = if subject.is_declaration() {
                subject
            } else if let Some(earlier) = known.get(&subject.iri).filter(|s| s.is_declaration()) {
                let mut merged = earlier.clone();
                merged.statements.extend(subject.statements);
                merged
            } else {
                parsed.import_errors.push(ImportError {
                    document: document_iri.to_string(),
                    message: format!("{} has no OWL declaration; skipped", subject.iri),
                });
                continue;
            };

            if subject.is_a(&format!("{OWL}Class")) {
                parsed.concepts.push(concept(&subject)?);
            } else if subject.is_a(&format!("{OWL}ObjectProperty")) {
                parsed.relationships.push(relationship(&subject)?);
            } else if subject.is_a(&format!("{OWL}DatatypeProperty")) {
                parsed.properties.push(property(&subject)?);
            } else if subject.is_a(&format!("{OWL}AnnotationProperty")) {
                parsed.annotation_properties.push(AnnotationPropertyDeclaration {
                    iri: subject.iri.clone(),
                    display_name: subject.display_name(),
                });
            }
        }

        tracing::debug!(
            document = %document_iri,
            concepts = parsed.concepts.len(),
            relationships = parsed.relationships.len(),
            properties = parsed.properties.len(),
            "parsed OWL document"
        );
        Ok(parsed)
    }
}

impl SchemaParser for OwlSchemaParser {
    fn parse(
        &self,
        document: &SchemaDocument,
        context: &[SchemaDocument],
    ) -> ontograph_ontology::Result<ParsedOntology> {
        self.parse_document(&document.iri, &document.bytes, context)
            .map_err(|e| OntologyError::ImportFailure {
                document: document.iri.clone(),
                message: e.to_string(),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
