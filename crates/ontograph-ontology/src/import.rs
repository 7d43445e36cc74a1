//! Schema document import.
//!
//! ```text
//!   bytes ─▶ sha256 ─▶ unchanged? ──yes──▶ Unchanged
//!                          │ no
//!                          ▼
//!   SchemaParser(document, previously stored documents)
//!                          │
//!                          ▼
//!   concepts (parents first) ─▶ relationships (parents first)
//!     ─▶ properties ─▶ dependents ─▶ inverses ─▶ annotation visitors
//!                          │
//!                          ▼
//!   store bytes + hash + index on the root vertex ─▶ one flush ─▶ clear cache
//! ```
//!
//! Imports always land in the public scope.

use crate::auth::{Operation, Scope, User};
use crate::declaration::{
    AnnotationPropertyDeclaration, ConceptDeclaration, ParsedOntology, RelationshipDeclaration,
    SchemaDocument,
};
use crate::error::{OntologyError, Result};
use crate::model::ElementKind;
use crate::repository::OntologyRepository;
use crate::scope::{sha256_hex, vertex_id};
use crate::vocab::{self, props, VISIBILITY_STRING};
use ontograph_graph::{Graph, Property, PropertyDefinition, Value, Vertex, Visibility};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Hook run for every annotation property an import declares.
pub trait AnnotationPropertyVisitor: Send + Sync {
    fn visit(&self, graph: &dyn Graph, annotation: &AnnotationPropertyDeclaration) -> Result<()>;
}

/// Keeps annotation properties out of the text index.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisableIndexVisitor;

impl AnnotationPropertyVisitor for DisableIndexVisitor {
    fn visit(&self, graph: &dyn Graph, annotation: &AnnotationPropertyDeclaration) -> Result<()> {
        if graph.is_property_defined(&annotation.iri) {
            return Ok(());
        }
        tracing::debug!(iri = %annotation.iri, "disabling index for annotation property");
        graph.define_property(PropertyDefinition::unindexed(annotation.iri.as_str(), "string"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub concepts: usize,
    pub relationships: usize,
    pub properties: usize,
    pub annotation_properties: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The stored hash matched; nothing was parsed or written.
    Unchanged,
    Imported { index: i64, counts: ImportCounts },
}

fn default_concept_parent(iri: &str) -> Option<&'static str> {
    match iri {
        vocab::ROOT_CONCEPT_IRI => None,
        vocab::ENTITY_CONCEPT_IRI => Some(vocab::ROOT_CONCEPT_IRI),
        _ => Some(vocab::ENTITY_CONCEPT_IRI),
    }
}

fn default_relationship_parent(iri: &str) -> Option<&'static str> {
    (iri != vocab::TOP_OBJECT_PROPERTY_IRI).then_some(vocab::TOP_OBJECT_PROPERTY_IRI)
}

/// Order declarations so every in-document parent precedes its children.
fn parents_first<'a, T>(
    declarations: &'a [T],
    iri: impl Fn(&T) -> &str,
    parent: impl Fn(&T) -> Option<String>,
) -> Result<Vec<&'a T>> {
    let by_iri: HashMap<&str, &T> = declarations.iter().map(|d| (iri(d), d)).collect();
    let mut done: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(declarations.len());

    for start in declarations {
        let mut chain = vec![start];
        let mut on_chain: HashSet<&str> = HashSet::from([iri(start)]);
        while let Some(p) = parent(chain[chain.len() - 1]) {
            let Some(&next) = by_iri.get(p.as_str()) else {
                break;
            };
            if done.contains(iri(next)) {
                break;
            }
            if !on_chain.insert(iri(next)) {
                return Err(OntologyError::Corruption(format!(
                    "declared hierarchy cycle through {p}"
                )));
            }
            chain.push(next);
        }
        for declaration in chain.into_iter().rev() {
            if done.insert(iri(declaration)) {
                out.push(declaration);
            }
        }
    }
    Ok(out)
}

fn concept_parent(declaration: &ConceptDeclaration) -> Option<String> {
    declaration
        .parent_iri
        .clone()
        .or_else(|| default_concept_parent(&declaration.iri).map(str::to_string))
}

fn relationship_parent(declaration: &RelationshipDeclaration) -> Option<String> {
    declaration
        .parent_iri
        .clone()
        .or_else(|| default_relationship_parent(&declaration.iri).map(str::to_string))
}

fn read_glyph(in_dir: Option<&Path>, declaration: &ConceptDeclaration) -> Option<Vec<u8>> {
    let file_name = declaration.glyph_icon_file_name.as_deref()?;
    let Some(dir) = in_dir else {
        tracing::warn!(iri = %declaration.iri, file = %file_name, "no directory to resolve glyph icon against");
        return None;
    };
    let path = dir.join(file_name);
    match std::fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(iri = %declaration.iri, path = %path.display(), error = %e, "could not read glyph icon");
            None
        }
    }
}

fn file_index(property: &Property) -> Result<i64> {
    property
        .metadata
        .get(vocab::IMPORT_INDEX_METADATA)
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            OntologyError::Corruption(format!(
                "stored ontology file {} has no index",
                property.key
            ))
        })
}

impl OntologyRepository {
    /// Import a schema file. Relative references (glyph icons) resolve
    /// against the file's directory.
    pub fn import_file(&self, path: &Path, document_iri: &str, user: &User) -> Result<ImportOutcome> {
        let bytes = std::fs::read(path).map_err(|e| {
            OntologyError::import(document_iri, format!("{}: {e}", path.display()))
        })?;
        self.import_file_data(&bytes, document_iri, path.parent(), user)
    }

    pub fn import_file_data(
        &self,
        bytes: &[u8],
        document_iri: &str,
        in_dir: Option<&Path>,
        user: &User,
    ) -> Result<ImportOutcome> {
        let hash = sha256_hex(bytes);
        if !self.has_file_changed(document_iri, &hash)? {
            tracing::info!(document = %document_iri, "ontology document unchanged, skipping import");
            return Ok(ImportOutcome::Unchanged);
        }
        self.gate.authorize(Operation::Create, Scope::Public, Some(user))?;
        let parser = self.parser.clone().ok_or_else(|| {
            OntologyError::InvalidArgument("no schema parser configured".to_string())
        })?;

        let context = self.load_ontology_files(Some(document_iri))?;
        let document = SchemaDocument::new(document_iri, bytes);
        let parsed = parser.parse(&document, &context)?;
        for issue in &parsed.import_errors {
            tracing::warn!(document = %issue.document, message = %issue.message, "skipped part of referenced ontology");
        }

        let (counts, index) = self.batched(|| {
            let counts = self.apply_declarations(&parsed, in_dir, user)?;
            let index = self.store_ontology_file(&document, &hash)?;
            Ok((counts, index))
        })?;
        self.cache.invalidate_all();
        tracing::info!(
            document = %document_iri,
            index,
            concepts = counts.concepts,
            relationships = counts.relationships,
            properties = counts.properties,
            "imported ontology document"
        );
        Ok(ImportOutcome::Imported { index, counts })
    }

    /// Whether a document with this IRI has been stored.
    pub fn is_ontology_defined(&self, document_iri: &str) -> Result<bool> {
        Ok(self
            .root_vertex()?
            .property(props::ONTOLOGY_FILE, document_iri)
            .is_some())
    }

    /// Stored documents in import order, optionally leaving one out.
    pub fn load_ontology_files(&self, excluded: Option<&str>) -> Result<Vec<SchemaDocument>> {
        let root = self.root_vertex()?;
        let mut files = Vec::new();
        for property in root.properties_named(props::ONTOLOGY_FILE) {
            if excluded == Some(property.key.as_str()) {
                continue;
            }
            let Some(bytes) = property.value.as_bytes() else {
                return Err(OntologyError::Corruption(format!(
                    "stored ontology file {} is not binary",
                    property.key
                )));
            };
            files.push((file_index(property)?, SchemaDocument::new(property.key.as_str(), bytes)));
        }
        files.sort_by_key(|(index, _)| *index);
        Ok(files.into_iter().map(|(_, doc)| doc).collect())
    }

    fn root_vertex(&self) -> Result<Vertex> {
        let id = vertex_id(ElementKind::Concept, vocab::ROOT_CONCEPT_IRI, None);
        self.graph
            .get_vertex(&id, &self.read_authorizations(None)?)?
            .ok_or_else(|| OntologyError::missing(ElementKind::Concept, vocab::ROOT_CONCEPT_IRI))
    }

    fn has_file_changed(&self, document_iri: &str, hash: &str) -> Result<bool> {
        let root = self.root_vertex()?;
        let stored = root
            .property(props::ONTOLOGY_FILE_HASH, document_iri)
            .and_then(|p| p.value.as_str());
        Ok(stored != Some(hash))
    }

    /// Persist the document bytes and hash. A re-imported document keeps
    /// its original position.
    fn store_ontology_file(&self, document: &SchemaDocument, hash: &str) -> Result<i64> {
        let root = self.root_vertex()?;
        let index = match root.property(props::ONTOLOGY_FILE, &document.iri) {
            Some(existing) => file_index(existing)?,
            None => root
                .properties_named(props::ONTOLOGY_FILE)
                .map(file_index)
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .max()
                .map_or(0, |max| max + 1),
        };

        let visibility = Visibility::new([VISIBILITY_STRING]);
        self.graph.set_property(
            &root.id,
            Property::new(props::ONTOLOGY_FILE, document.bytes.clone(), visibility.clone())
                .with_key(document.iri.as_str())
                .with_metadata(vocab::IMPORT_INDEX_METADATA, index),
        )?;
        self.graph.set_property(
            &root.id,
            Property::new(props::ONTOLOGY_FILE_HASH, hash, visibility).with_key(document.iri.as_str()),
        )?;
        Ok(index)
    }

    fn apply_declarations(
        &self,
        parsed: &ParsedOntology,
        in_dir: Option<&Path>,
        user: &User,
    ) -> Result<ImportCounts> {
        let user = Some(user);
        let mut counts = ImportCounts::default();

        for declaration in parents_first(&parsed.concepts, |d| d.iri.as_str(), concept_parent)? {
            let definition =
                declaration.to_definition(concept_parent(declaration), read_glyph(in_dir, declaration));
            self.get_or_create_concept(&definition, user, None)?;
            counts.concepts += 1;
        }

        for declaration in parents_first(&parsed.relationships, |d| d.iri.as_str(), relationship_parent)? {
            let definition = declaration.to_definition(relationship_parent(declaration));
            self.get_or_create_relationship_type(&definition, user, None)?;
            counts.relationships += 1;
        }

        for declaration in &parsed.properties {
            let mut concept_iris = Vec::new();
            let mut relationship_iris = Vec::new();
            for iri in &declaration.domain_iris {
                if self.get_concept_by_iri(iri, None)?.is_some() {
                    concept_iris.push(iri.clone());
                } else if self.has_relationship_by_iri(iri, None)? {
                    relationship_iris.push(iri.clone());
                } else {
                    return Err(OntologyError::missing(ElementKind::Concept, iri.as_str()));
                }
            }
            self.get_or_create_property(
                &declaration.to_definition(concept_iris, relationship_iris),
                user,
                None,
            )?;
            counts.properties += 1;
        }

        for declaration in parsed
            .properties
            .iter()
            .filter(|d| !d.dependent_property_iris.is_empty())
        {
            let property = self.get_required_property_by_iri(&declaration.iri, None)?;
            if property.dependent_property_iris != declaration.dependent_property_iris {
                self.update_property_dependent_iris(
                    &property,
                    &declaration.dependent_property_iris,
                    user,
                    None,
                )?;
            }
        }

        for declaration in &parsed.relationships {
            for inverse_iri in &declaration.inverse_of_iris {
                let from = self.get_required_relationship_by_iri(&declaration.iri, None)?;
                if from.inverse_of_iris.contains(inverse_iri) {
                    continue;
                }
                let inverse = self.get_required_relationship_by_iri(inverse_iri, None)?;
                self.get_or_create_inverse_of_relationship(&from, &inverse, user, None)?;
            }
        }

        for annotation in &parsed.annotation_properties {
            for visitor in &self.visitors {
                visitor.visit(self.graph.as_ref(), annotation)?;
            }
            counts.annotation_properties += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_graph::InMemoryGraph;

    fn concept(iri: &str, parent: Option<&str>) -> ConceptDeclaration {
        ConceptDeclaration {
            iri: iri.to_string(),
            parent_iri: parent.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn children_are_ordered_after_parents() {
        let decls = vec![
            concept("c", Some("b")),
            concept("b", Some("a")),
            concept("a", None),
            concept("d", None),
        ];
        let order: Vec<&str> = parents_first(&decls, |d| d.iri.as_str(), concept_parent)
            .unwrap()
            .into_iter()
            .map(|d| d.iri.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn declared_cycles_are_rejected() {
        let decls = vec![concept("a", Some("b")), concept("b", Some("a"))];
        assert!(matches!(
            parents_first(&decls, |d| d.iri.as_str(), concept_parent),
            Err(OntologyError::Corruption(_))
        ));
    }

    #[test]
    fn default_parents() {
        assert_eq!(concept_parent(&concept("x", None)).as_deref(), Some(vocab::ENTITY_CONCEPT_IRI));
        assert_eq!(
            concept_parent(&concept(vocab::ENTITY_CONCEPT_IRI, None)).as_deref(),
            Some(vocab::ROOT_CONCEPT_IRI)
        );
        assert!(concept_parent(&concept(vocab::ROOT_CONCEPT_IRI, None)).is_none());
        assert_eq!(default_relationship_parent("r"), Some(vocab::TOP_OBJECT_PROPERTY_IRI));
        assert!(default_relationship_parent(vocab::TOP_OBJECT_PROPERTY_IRI).is_none());
    }

    #[test]
    fn disable_index_visitor_only_defines_once() {
        let graph = InMemoryGraph::new();
        let annotation = AnnotationPropertyDeclaration {
            iri: "http://x#note".to_string(),
            display_name: None,
        };
        DisableIndexVisitor.visit(&graph, &annotation).unwrap();
        let definition = graph.property_definition("http://x#note").unwrap();
        assert!(definition.text_index_hints.is_empty());

        graph
            .define_property(PropertyDefinition {
                sortable: true,
                ..PropertyDefinition::unindexed("http://x#other", "string")
            })
            .unwrap();
        let other = AnnotationPropertyDeclaration {
            iri: "http://x#other".to_string(),
            display_name: None,
        };
        DisableIndexVisitor.visit(&graph, &other).unwrap();
        assert!(graph.property_definition("http://x#other").unwrap().sortable);
    }

    #[test]
    fn missing_glyph_is_skipped() {
        let mut decl = concept("c", None);
        decl.glyph_icon_file_name = Some("missing.png".to_string());
        let dir = tempfile::tempdir().unwrap();
        assert!(read_glyph(Some(dir.path()), &decl).is_none());
        std::fs::write(dir.path().join("missing.png"), b"png").unwrap();
        assert_eq!(read_glyph(Some(dir.path()), &decl).as_deref(), Some(&b"png"[..]));
        assert!(read_glyph(None, &decl).is_none());
    }
}
