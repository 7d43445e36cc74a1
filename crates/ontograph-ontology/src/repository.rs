//! The ontology repository: cached, scope-merged reads plus the write entry
//! point every mutation goes through.
//!
//! ```text
//!   caller ──read──▶ OntologyCache ──miss──▶ load_* ──▶ Graph (prefix scan)
//!                                              │
//!                                              └─▶ ElementFactory ─▶ merge_*
//!
//!   caller ──write──▶ WriteContext (authorize, graph writes)
//!                         └─▶ flush ─▶ invalidate touched scopes
//! ```
//!
//! Reads are keyed by workspace only. Multi-element writes are best effort:
//! each graph call is atomic, a failing operation can leave earlier writes
//! of the same call in place.

use crate::auth::{AuthorizationGate, User};
use crate::cache::OntologyCache;
use crate::client_api::ClientApiOntology;
use crate::config::RepositoryConfig;
use crate::declaration::SchemaParser;
use crate::definition::{ConceptDefinition, RelationshipDefinition};
use crate::error::{OntologyError, Result};
use crate::factory::{
    ConceptRecord, ElementFactory, PropertyRecord, RelationshipRecord, VertexElementFactory,
};
use crate::import::{AnnotationPropertyVisitor, DisableIndexVisitor};
use crate::model::{Concept, ElementKind, OntologyElement, OntologyProperty, Relationship};
use crate::mutation::WriteContext;
use crate::scope::{merge_concept, merge_property, merge_relationship};
use crate::vocab::{self, labels, props};
use ontograph_graph::{Authorizations, Direction, Graph, PropertyDefinition, Value, Vertex};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct OntologyRepository {
    pub(crate) graph: Arc<dyn Graph>,
    pub(crate) gate: AuthorizationGate,
    pub(crate) factory: Arc<dyn ElementFactory>,
    pub(crate) parser: Option<Arc<dyn SchemaParser>>,
    pub(crate) visitors: Vec<Arc<dyn AnnotationPropertyVisitor>>,
    pub(crate) config: RepositoryConfig,
    pub(crate) cache: OntologyCache,
    deferred_flushes: AtomicUsize,
}

pub struct OntologyRepositoryBuilder {
    graph: Arc<dyn Graph>,
    gate: AuthorizationGate,
    factory: Arc<dyn ElementFactory>,
    parser: Option<Arc<dyn SchemaParser>>,
    visitors: Vec<Arc<dyn AnnotationPropertyVisitor>>,
    config: RepositoryConfig,
}

impl OntologyRepositoryBuilder {
    pub fn parser(mut self, parser: Arc<dyn SchemaParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn factory(mut self, factory: Arc<dyn ElementFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the default annotation-property visitor on first call.
    pub fn annotation_visitor(mut self, visitor: Arc<dyn AnnotationPropertyVisitor>) -> Self {
        self.visitors.push(visitor);
        self
    }

    /// Define the stored property names and make sure the fixed hierarchy
    /// (ROOT → ENTITY → USER, top object property) exists.
    pub fn build(self) -> Result<OntologyRepository> {
        let visitors = if self.visitors.is_empty() {
            vec![Arc::new(DisableIndexVisitor) as Arc<dyn AnnotationPropertyVisitor>]
        } else {
            self.visitors
        };
        let repo = OntologyRepository {
            cache: OntologyCache::new(&self.config),
            graph: self.graph,
            gate: self.gate,
            factory: self.factory,
            parser: self.parser,
            visitors,
            config: self.config,
            deferred_flushes: AtomicUsize::new(0),
        };
        repo.define_required_properties()?;
        repo.bootstrap()?;
        Ok(repo)
    }
}

const REQUIRED_PROPERTIES: &[(&str, &str)] = &[
    (props::CONCEPT_TYPE, "string"),
    (props::ONTOLOGY_TITLE, "string"),
    (props::DISPLAY_NAME, "string"),
    (props::DISPLAY_TYPE, "string"),
    (props::PROPERTY_GROUP, "string"),
    (props::COLOR, "string"),
    (props::GLYPH_ICON, "binary"),
    (props::TITLE_FORMULA, "string"),
    (props::SUBTITLE_FORMULA, "string"),
    (props::TIME_FORMULA, "string"),
    (props::VALIDATION_FORMULA, "string"),
    (props::DISPLAY_FORMULA, "string"),
    (props::POSSIBLE_VALUES, "string"),
    (props::TEXT_INDEX_HINTS, "string"),
    (props::INTENT, "string"),
    (props::DATA_TYPE, "string"),
    (props::USER_VISIBLE, "boolean"),
    (props::SEARCHABLE, "boolean"),
    (props::SORTABLE, "boolean"),
    (props::ADDABLE, "boolean"),
    (props::UPDATEABLE, "boolean"),
    (props::DELETEABLE, "boolean"),
    (props::BOOST, "double"),
    (props::ONTOLOGY_FILE, "binary"),
    (props::ONTOLOGY_FILE_HASH, "string"),
    (props::DEPENDENT_PROPERTY_ORDER, "integer"),
];

/// Group scoped elements by IRI and merge public with overlay.
fn merge_by_iri<T: OntologyElement>(
    elements: Vec<T>,
    workspace: Option<&str>,
    merge: fn(Option<T>, Option<T>, Option<&str>) -> Option<T>,
) -> Vec<T> {
    let mut grouped: BTreeMap<String, (Option<T>, Option<T>)> = BTreeMap::new();
    for element in elements {
        let slot = grouped.entry(element.iri().to_string()).or_default();
        let target = if element.handle().public_vertex_id.is_some() {
            &mut slot.0
        } else {
            &mut slot.1
        };
        if target.is_some() {
            tracing::warn!(iri = %element.iri(), kind = %T::KIND, "duplicate element vertex ignored");
            continue;
        }
        *target = Some(element);
    }
    grouped
        .into_values()
        .filter_map(|(public, overlay)| merge(public, overlay, workspace))
        .collect()
}

fn find<T: OntologyElement>(elements: &[T], iri: &str) -> Option<T> {
    elements.iter().find(|e| e.iri() == iri).cloned()
}

fn find_all<T: OntologyElement>(elements: &[T], iris: &[String]) -> Vec<T> {
    iris.iter().filter_map(|iri| find(elements, iri)).collect()
}

impl OntologyRepository {
    pub fn builder(graph: Arc<dyn Graph>, gate: AuthorizationGate) -> OntologyRepositoryBuilder {
        OntologyRepositoryBuilder {
            graph,
            gate,
            factory: Arc::new(VertexElementFactory),
            parser: None,
            visitors: Vec::new(),
            config: RepositoryConfig::default(),
        }
    }

    pub fn graph(&self) -> &Arc<dyn Graph> {
        &self.graph
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Read authorizations for `(user, workspace)`, for callers that query
    /// the graph directly.
    pub fn authorizations_for(
        &self,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<Authorizations> {
        self.gate.authorizations_for(user, workspace)
    }

    fn define_required_properties(&self) -> Result<()> {
        for (name, data_type) in REQUIRED_PROPERTIES {
            if !self.graph.is_property_defined(name) {
                self.graph
                    .define_property(PropertyDefinition::unindexed(*name, *data_type))?;
            }
        }
        Ok(())
    }

    fn bootstrap(&self) -> Result<()> {
        let system = User::system();
        let concepts = [
            ConceptDefinition::new(vocab::ROOT_CONCEPT_IRI, "root"),
            ConceptDefinition::new(vocab::ENTITY_CONCEPT_IRI, "thing")
                .parent_iri(vocab::ROOT_CONCEPT_IRI),
            ConceptDefinition::new(vocab::USER_CONCEPT_IRI, "user")
                .parent_iri(vocab::ENTITY_CONCEPT_IRI),
        ];
        for definition in &concepts {
            if self.get_concept_by_iri(&definition.iri, None)?.is_none() {
                self.get_or_create_concept(definition, Some(&system), None)?;
            }
        }
        if !self.has_relationship_by_iri(vocab::TOP_OBJECT_PROPERTY_IRI, None)? {
            self.get_or_create_relationship_type(
                &RelationshipDefinition::new(vocab::TOP_OBJECT_PROPERTY_IRI)
                    .display_name("topObjectProperty"),
                Some(&system),
                None,
            )?;
        }
        tracing::debug!("ontology bootstrap complete");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Write entry point
    // ------------------------------------------------------------------------

    /// Run a mutation, then flush and invalidate every scope it touched.
    /// Invalidation happens even when the mutation fails part way.
    pub(crate) fn write<T>(
        &self,
        user: Option<&User>,
        workspace: Option<&str>,
        op: impl FnOnce(&mut WriteContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut ctx = WriteContext::new(self, user, workspace)?;
        let result = op(&mut ctx);
        let flushed = if self.deferred_flushes.load(Ordering::Acquire) == 0 {
            self.graph.flush()
        } else {
            Ok(())
        };
        ctx.invalidate_touched();
        let value = result?;
        flushed?;
        Ok(value)
    }

    /// Run several writes under one flush at the end, failed or not. Writes
    /// from other threads meanwhile are flushed with the batch.
    pub(crate) fn batched<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        self.deferred_flushes.fetch_add(1, Ordering::AcqRel);
        let result = op();
        let outermost = self.deferred_flushes.fetch_sub(1, Ordering::AcqRel) == 1;
        let flushed = if outermost { self.graph.flush() } else { Ok(()) };
        let value = result?;
        flushed?;
        Ok(value)
    }

    /// Flush pending writes, then drop every cached view.
    pub fn clear_cache(&self) -> Result<()> {
        self.graph.flush()?;
        self.cache.invalidate_all();
        tracing::debug!("ontology cache cleared");
        Ok(())
    }

    pub fn clear_workspace_cache(&self, workspace: &str) -> Result<()> {
        if workspace.is_empty() {
            return Err(OntologyError::InvalidArgument(
                "workspace id is required".to_string(),
            ));
        }
        self.graph.flush()?;
        self.cache.invalidate(workspace);
        tracing::debug!(workspace = %workspace, "workspace ontology cache cleared");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    pub(crate) fn read_authorizations(&self, workspace: Option<&str>) -> Result<Authorizations> {
        self.gate.authorizations_for(None, workspace)
    }

    fn typed_vertices(&self, kind: ElementKind, auths: &Authorizations) -> Result<Vec<Vertex>> {
        Ok(self
            .graph
            .get_vertices_with_prefix(kind.id_prefix(), auths)?
            .into_iter()
            .filter(|v| v.string(props::CONCEPT_TYPE) == Some(kind.type_marker()))
            .collect())
    }

    /// IRIs of the vertices linked to `vertex_id`, in edge order, deduplicated.
    fn linked_iris(
        &self,
        vertex_id: &str,
        direction: Direction,
        label: &str,
        auths: &Authorizations,
    ) -> Result<Vec<String>> {
        let mut iris: Vec<String> = Vec::new();
        for vertex in self.graph.vertices(vertex_id, direction, Some(label), auths)? {
            if let Some(iri) = vertex.string(props::ONTOLOGY_TITLE) {
                if !iris.iter().any(|i| i == iri) {
                    iris.push(iri.to_string());
                }
            }
        }
        Ok(iris)
    }

    fn parent_iri(&self, vertex: &Vertex, auths: &Authorizations) -> Result<Option<String>> {
        let mut parents = self.linked_iris(&vertex.id, Direction::Out, labels::IS_A, auths)?;
        match parents.len() {
            0 | 1 => Ok(parents.pop()),
            n => Err(OntologyError::Corruption(format!(
                "unexpected number of parents ({n}) for {}",
                vertex.string(props::ONTOLOGY_TITLE).unwrap_or(&vertex.id)
            ))),
        }
    }

    fn dependent_property_iris(&self, vertex_id: &str, auths: &Authorizations) -> Result<Vec<String>> {
        let mut ordered = Vec::new();
        for edge in self
            .graph
            .edges(vertex_id, Direction::Out, Some(labels::DEPENDENT_PROPERTY), auths)?
        {
            let order = edge
                .value(props::DEPENDENT_PROPERTY_ORDER)
                .and_then(Value::as_i64)
                .unwrap_or(i64::MAX);
            if let Some(target) = self.graph.get_vertex(&edge.in_vertex_id, auths)? {
                if let Some(iri) = target.string(props::ONTOLOGY_TITLE) {
                    ordered.push((order, iri.to_string()));
                }
            }
        }
        ordered.sort();
        Ok(ordered.into_iter().map(|(_, iri)| iri).collect())
    }

    pub(crate) fn load_properties(
        &self,
        workspace: Option<&str>,
        auths: &Authorizations,
    ) -> Result<Vec<OntologyProperty>> {
        let vertices = self.typed_vertices(ElementKind::Property, auths)?;
        let mut elements = Vec::with_capacity(vertices.len());
        for vertex in &vertices {
            elements.push(self.factory.property(PropertyRecord {
                vertex,
                dependent_property_iris: self.dependent_property_iris(&vertex.id, auths)?,
                table_property_iris: self.linked_iris(
                    &vertex.id,
                    Direction::Out,
                    labels::HAS_PROPERTY,
                    auths,
                )?,
            })?);
        }
        Ok(merge_by_iri(elements, workspace, merge_property))
    }

    fn attached_properties(
        &self,
        vertex_id: &str,
        by_iri: &HashMap<&str, &OntologyProperty>,
        auths: &Authorizations,
    ) -> Result<Vec<OntologyProperty>> {
        Ok(self
            .linked_iris(vertex_id, Direction::Out, labels::HAS_PROPERTY, auths)?
            .iter()
            .filter_map(|iri| by_iri.get(iri.as_str()).map(|p| (*p).clone()))
            .collect())
    }

    pub(crate) fn load_concepts(
        &self,
        workspace: Option<&str>,
        auths: &Authorizations,
        properties: &[OntologyProperty],
    ) -> Result<Vec<Concept>> {
        let by_iri: HashMap<&str, &OntologyProperty> =
            properties.iter().map(|p| (p.iri.as_str(), p)).collect();
        let vertices = self.typed_vertices(ElementKind::Concept, auths)?;
        let mut elements = Vec::with_capacity(vertices.len());
        for vertex in &vertices {
            elements.push(self.factory.concept(ConceptRecord {
                vertex,
                parent_iri: self.parent_iri(vertex, auths)?,
                properties: self.attached_properties(&vertex.id, &by_iri, auths)?,
            })?);
        }
        Ok(merge_by_iri(elements, workspace, merge_concept))
    }

    pub(crate) fn load_relationships(
        &self,
        workspace: Option<&str>,
        auths: &Authorizations,
        properties: &[OntologyProperty],
    ) -> Result<Vec<Relationship>> {
        let by_iri: HashMap<&str, &OntologyProperty> =
            properties.iter().map(|p| (p.iri.as_str(), p)).collect();
        let vertices = self.typed_vertices(ElementKind::Relationship, auths)?;
        let mut elements = Vec::with_capacity(vertices.len());
        for vertex in &vertices {
            elements.push(self.factory.relationship(RelationshipRecord {
                vertex,
                parent_iri: self.parent_iri(vertex, auths)?,
                domain_concept_iris: self.linked_iris(
                    &vertex.id,
                    Direction::In,
                    labels::HAS_EDGE,
                    auths,
                )?,
                range_concept_iris: self.linked_iris(
                    &vertex.id,
                    Direction::Out,
                    labels::HAS_EDGE,
                    auths,
                )?,
                inverse_of_iris: self.linked_iris(
                    &vertex.id,
                    Direction::Both,
                    labels::INVERSE_OF,
                    auths,
                )?,
                properties: self.attached_properties(&vertex.id, &by_iri, auths)?,
            })?);
        }
        Ok(merge_by_iri(elements, workspace, merge_relationship))
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn get_properties(&self, workspace: Option<&str>) -> Result<Arc<Vec<OntologyProperty>>> {
        self.cache
            .properties(workspace, || {
                self.load_properties(workspace, &self.read_authorizations(workspace)?)
            })
    }

    pub fn get_concepts_with_properties(
        &self,
        workspace: Option<&str>,
    ) -> Result<Arc<Vec<Concept>>> {
        self.cache
            .concepts(workspace, || {
                let properties = self.get_properties(workspace)?;
                self.load_concepts(workspace, &self.read_authorizations(workspace)?, &properties)
            })
    }

    pub fn get_relationships(&self, workspace: Option<&str>) -> Result<Arc<Vec<Relationship>>> {
        self.cache
            .relationships(workspace, || {
                let properties = self.get_properties(workspace)?;
                self.load_relationships(workspace, &self.read_authorizations(workspace)?, &properties)
            })
    }

    pub fn get_client_api_object(
        &self,
        workspace: Option<&str>,
    ) -> Result<Arc<ClientApiOntology>> {
        self.cache.client_api(workspace, || {
            let concepts = self.get_concepts_with_properties(workspace)?;
            let relationships = self.get_relationships(workspace)?;
            let properties = self.get_properties(workspace)?;
            Ok(ClientApiOntology::build(&concepts, &relationships, &properties))
        })
    }

    pub fn get_concept_by_iri(&self, iri: &str, workspace: Option<&str>) -> Result<Option<Concept>> {
        Ok(find(&self.get_concepts_with_properties(workspace)?, iri))
    }

    pub fn get_concepts_by_iri(&self, iris: &[String], workspace: Option<&str>) -> Result<Vec<Concept>> {
        Ok(find_all(&self.get_concepts_with_properties(workspace)?, iris))
    }

    pub fn get_required_concept_by_iri(&self, iri: &str, workspace: Option<&str>) -> Result<Concept> {
        self.get_concept_by_iri(iri, workspace)?
            .ok_or_else(|| OntologyError::missing(ElementKind::Concept, iri))
    }

    pub fn get_relationship_by_iri(
        &self,
        iri: &str,
        workspace: Option<&str>,
    ) -> Result<Option<Relationship>> {
        Ok(find(&self.get_relationships(workspace)?, iri))
    }

    pub fn get_relationships_by_iri(
        &self,
        iris: &[String],
        workspace: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        Ok(find_all(&self.get_relationships(workspace)?, iris))
    }

    pub fn get_required_relationship_by_iri(
        &self,
        iri: &str,
        workspace: Option<&str>,
    ) -> Result<Relationship> {
        self.get_relationship_by_iri(iri, workspace)?
            .ok_or_else(|| OntologyError::missing(ElementKind::Relationship, iri))
    }

    pub fn has_relationship_by_iri(&self, iri: &str, workspace: Option<&str>) -> Result<bool> {
        Ok(self.get_relationship_by_iri(iri, workspace)?.is_some())
    }

    pub fn get_property_by_iri(
        &self,
        iri: &str,
        workspace: Option<&str>,
    ) -> Result<Option<OntologyProperty>> {
        Ok(find(&self.get_properties(workspace)?, iri))
    }

    pub fn get_properties_by_iri(
        &self,
        iris: &[String],
        workspace: Option<&str>,
    ) -> Result<Vec<OntologyProperty>> {
        Ok(find_all(&self.get_properties(workspace)?, iris))
    }

    pub fn get_required_property_by_iri(
        &self,
        iri: &str,
        workspace: Option<&str>,
    ) -> Result<OntologyProperty> {
        self.get_property_by_iri(iri, workspace)?
            .ok_or_else(|| OntologyError::missing(ElementKind::Property, iri))
    }

    /// Display name of a relationship, falling back to its IRI.
    pub fn get_display_name_for_label(
        &self,
        relationship_iri: &str,
        workspace: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(self
            .get_relationship_by_iri(relationship_iri, workspace)?
            .map(|r| r.display_label().to_string()))
    }

    /// The first property listing `iri` among its dependents.
    pub fn get_dependent_property_parent(
        &self,
        iri: &str,
        workspace: Option<&str>,
    ) -> Result<Option<OntologyProperty>> {
        Ok(self
            .get_properties(workspace)?
            .iter()
            .find(|p| p.dependent_property_iris.iter().any(|d| d == iri))
            .cloned())
    }

    pub fn get_root_concept(&self, workspace: Option<&str>) -> Result<Concept> {
        self.get_required_concept_by_iri(vocab::ROOT_CONCEPT_IRI, workspace)
    }

    pub fn get_entity_concept(&self, workspace: Option<&str>) -> Result<Concept> {
        self.get_required_concept_by_iri(vocab::ENTITY_CONCEPT_IRI, workspace)
    }
}
