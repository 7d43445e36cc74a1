//! Get-or-create, update, structural edits and publish.
//!
//! Every public operation here runs inside [`OntologyRepository::write`],
//! which hands it a [`WriteContext`]. The context authorizes through the
//! gate, performs the graph writes, and records which scopes were touched
//! so exactly those caches are invalidated afterwards.
//!
//! Structural edges always carry the bare `ontology` label: an edge is
//! visible exactly when both endpoints are. Consequently an edge between two
//! public elements is a public change, whatever workspace requested it.

use crate::auth::{Operation, Scope, User};
use crate::definition::{
    ConceptDefinition, ConceptUpdate, FieldWrite, OntologyPropertyDefinition, PropertyUpdate,
    RelationshipDefinition, RelationshipUpdate,
};
use crate::error::{OntologyError, Result};
use crate::model::{
    Concept, ElementHandle, ElementKind, OntologyElement, OntologyProperty, PropertyType,
    Relationship, SandboxStatus,
};
use crate::repository::OntologyRepository;
use crate::scope::{overlay_vertex_id, sha256_hex, vertex_id, VisibilityDescriptor};
use crate::vocab::{self, labels, props, VISIBILITY_STRING};
use ontograph_graph::{
    Authorizations, Direction, EdgeBuilder, Property, PropertyDefinition, TextIndexHint,
    Visibility,
};
use std::collections::BTreeSet;

const ENTITY_TITLE_FORMULA: &str = "prop('http://ontograph.dev#title') || ''";
const ENTITY_SUBTITLE_FORMULA: &str = "prop('http://ontograph.dev#source') || ''";
const ENTITY_TIME_FORMULA: &str = "''";

fn ontology_visibility() -> Visibility {
    Visibility::new([VISIBILITY_STRING])
}

/// Vertex that structural edges attach to: the public one when it exists.
fn anchor(handle: &ElementHandle) -> Result<&str> {
    handle
        .public_vertex_id
        .as_deref()
        .or(handle.sandbox_vertex_id.as_deref())
        .ok_or_else(|| OntologyError::Corruption("element has no backing vertex".to_string()))
}

/// Extended data tables are never searchable; strings only with an index.
pub(crate) fn determine_searchable(
    data_type: PropertyType,
    text_index_hints: &BTreeSet<TextIndexHint>,
    searchable: bool,
) -> bool {
    match data_type {
        PropertyType::ExtendedDataTable => false,
        PropertyType::String => searchable && !text_index_hints.is_empty(),
        _ => searchable,
    }
}

fn with_entity_defaults(definition: &ConceptDefinition) -> ConceptUpdate {
    let mut fields = definition.fields.clone();
    if definition.iri == vocab::ENTITY_CONCEPT_IRI {
        fields
            .title_formula
            .get_or_insert_with(|| ENTITY_TITLE_FORMULA.to_string());
        fields
            .subtitle_formula
            .get_or_insert_with(|| ENTITY_SUBTITLE_FORMULA.to_string());
        fields
            .time_formula
            .get_or_insert_with(|| ENTITY_TIME_FORMULA.to_string());
    }
    fields
}

fn property_fields(definition: &OntologyPropertyDefinition) -> PropertyUpdate {
    let mut fields = definition.fields.clone();
    fields.searchable = fields.searchable.map(|s| {
        determine_searchable(definition.data_type, &definition.text_index_hints, s)
    });
    fields
}

pub struct WriteContext<'r> {
    repo: &'r OntologyRepository,
    user: Option<&'r User>,
    workspace: Option<&'r str>,
    auths: Authorizations,
    authorized: Vec<(Operation, Option<String>)>,
    touched_public: bool,
    touched_workspaces: BTreeSet<String>,
}

impl<'r> WriteContext<'r> {
    pub(crate) fn new(
        repo: &'r OntologyRepository,
        user: Option<&'r User>,
        workspace: Option<&'r str>,
    ) -> Result<Self> {
        Ok(Self {
            auths: repo.gate.authorizations_for(user, workspace)?,
            repo,
            user,
            workspace,
            authorized: Vec::new(),
            touched_public: false,
            touched_workspaces: BTreeSet::new(),
        })
    }

    fn requested_scope(&self) -> Scope<'r> {
        Scope::of(self.workspace)
    }

    fn element_scope(&self, handle: &ElementHandle) -> Scope<'r> {
        if handle.public_vertex_id.is_some() {
            Scope::Public
        } else {
            self.requested_scope()
        }
    }

    /// Narrowest scope that can observe an edge between the two elements.
    fn edge_scope(&self, a: &ElementHandle, b: &ElementHandle) -> Scope<'r> {
        match (self.element_scope(a), self.element_scope(b)) {
            (Scope::Public, Scope::Public) => Scope::Public,
            _ => self.requested_scope(),
        }
    }

    fn touch(&mut self, scope: Scope<'_>) {
        match scope {
            Scope::Public => self.touched_public = true,
            Scope::Workspace(ws) => {
                self.touched_workspaces.insert(ws.to_string());
            }
        }
    }

    fn authorize(&mut self, operation: Operation, scope: Scope<'_>) -> Result<()> {
        let key = (operation, scope.workspace().map(str::to_string));
        if !self.authorized.contains(&key) {
            self.repo.gate.authorize(operation, scope, self.user)?;
            self.authorized.push(key);
        }
        self.touch(scope);
        Ok(())
    }

    pub(crate) fn invalidate_touched(&self) {
        if self.touched_public {
            self.repo.cache.invalidate_all();
            return;
        }
        for ws in &self.touched_workspaces {
            self.repo.cache.invalidate(ws);
        }
    }

    // ------------------------------------------------------------------------
    // Graph primitives
    // ------------------------------------------------------------------------

    fn link(&self, from: &str, label: &str, to: &str) -> Result<()> {
        self.repo.graph.get_or_create_edge(EdgeBuilder::new(
            vocab::edge_id(from, label, to),
            from,
            to,
            label,
            ontology_visibility(),
        ))?;
        Ok(())
    }

    fn link_workspace(&self, workspace: &str, vertex_id: &str) -> Result<()> {
        self.repo.graph.add_vertex(
            workspace,
            VisibilityDescriptor::for_scope(Some(workspace)).to_visibility(),
        )?;
        self.link(workspace, labels::WORKSPACE_TO_ONTOLOGY, vertex_id)
    }

    /// Id for a new vertex in the requested scope. A workspace id already
    /// taken by a vertex that escaped the workspace (it was published) falls
    /// back to the overlay id.
    fn fresh_vertex_id(&self, kind: ElementKind, iri: &str) -> Result<String> {
        let Some(ws) = self.workspace else {
            return Ok(vertex_id(kind, iri, None));
        };
        for id in [vertex_id(kind, iri, Some(ws)), overlay_vertex_id(kind, iri, ws)] {
            match self.repo.graph.get_vertex(&id, &self.auths)? {
                Some(existing)
                    if !VisibilityDescriptor::from_visibility(&existing.visibility)
                        .is_confined_to(ws) => {}
                _ => return Ok(id),
            }
        }
        Err(OntologyError::Corruption(format!(
            "no free workspace vertex for {kind} {iri} in {ws}"
        )))
    }

    /// A fresh vertex in the requested scope with its identifying fields.
    fn create_vertex(
        &self,
        kind: ElementKind,
        iri: &str,
        data_type: Option<PropertyType>,
    ) -> Result<String> {
        let id = self.fresh_vertex_id(kind, iri)?;
        let graph = &self.repo.graph;
        graph.add_vertex(
            &id,
            VisibilityDescriptor::for_scope(self.workspace).to_visibility(),
        )?;
        graph.set_property(
            &id,
            Property::new(props::CONCEPT_TYPE, kind.type_marker(), ontology_visibility()),
        )?;
        graph.set_property(
            &id,
            Property::new(props::ONTOLOGY_TITLE, iri, ontology_visibility()),
        )?;
        if let Some(data_type) = data_type {
            graph.set_property(
                &id,
                Property::new(props::DATA_TYPE, data_type.as_str(), ontology_visibility()),
            )?;
        }
        if let Some(ws) = self.workspace {
            self.link_workspace(ws, &id)?;
        }
        Ok(id)
    }

    /// The vertex changeable fields go to. A workspace edit of a public
    /// element gets its own overlay vertex.
    fn writable_vertex(
        &self,
        kind: ElementKind,
        iri: &str,
        handle: &ElementHandle,
        data_type: Option<PropertyType>,
    ) -> Result<String> {
        match (self.workspace, &handle.sandbox_vertex_id, &handle.public_vertex_id) {
            (Some(_), Some(sandbox), _) => Ok(sandbox.clone()),
            (Some(ws), None, Some(_)) => {
                tracing::debug!(iri = %iri, workspace = %ws, "creating sandbox overlay");
                self.create_vertex(kind, iri, data_type)
            }
            (None, _, Some(public)) => Ok(public.clone()),
            _ => Err(OntologyError::Corruption(format!(
                "no writable vertex for {kind} {iri}"
            ))),
        }
    }

    fn apply(&self, vertex_id: &str, writes: Vec<FieldWrite>) -> Result<()> {
        for write in writes {
            match write {
                FieldWrite::Set(property) => self.repo.graph.set_property(vertex_id, property)?,
                FieldWrite::Clear(name) => self.clear_named(vertex_id, |n| n == name)?,
            }
        }
        Ok(())
    }

    fn clear_named(&self, vertex_id: &str, matches: impl Fn(&str) -> bool) -> Result<()> {
        let Some(vertex) = self.repo.graph.get_vertex(vertex_id, &self.auths)? else {
            return Err(ontograph_graph::GraphError::VertexNotFound(vertex_id.to_string()).into());
        };
        for property in vertex.properties.iter().filter(|p| matches(&p.name)) {
            self.repo
                .graph
                .soft_delete_property(vertex_id, &property.key, &property.name)?;
        }
        Ok(())
    }

    fn clear_changeable(&self, vertex_id: &str) -> Result<()> {
        self.clear_named(vertex_id, vocab::is_changeable)
    }

    /// Rewrite the ordered dependent edges of a property: delete the dense
    /// `0..n` run, then recreate it.
    fn save_dependents(&self, property_vertex_id: &str, dependent_vertex_ids: &[String]) -> Result<()> {
        let graph = &self.repo.graph;
        let mut index = 0;
        while graph.delete_edge(&vocab::dependent_property_edge_id(property_vertex_id, index))? {
            index += 1;
        }
        for (i, dependent) in dependent_vertex_ids.iter().enumerate() {
            graph.get_or_create_edge(
                EdgeBuilder::new(
                    vocab::dependent_property_edge_id(property_vertex_id, i),
                    property_vertex_id,
                    dependent.as_str(),
                    labels::DEPENDENT_PROPERTY,
                    ontology_visibility(),
                )
                .property(Property::new(
                    props::DEPENDENT_PROPERTY_ORDER,
                    i as i64,
                    ontology_visibility(),
                )),
            )?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Element writes
    // ------------------------------------------------------------------------

    fn upsert_concept(&mut self, definition: &ConceptDefinition) -> Result<()> {
        let fields = with_entity_defaults(definition);
        if let Some(existing) = self.repo.get_concept_by_iri(&definition.iri, self.workspace)? {
            if !definition.redeclared && fields.is_noop_for(&existing) {
                return Ok(());
            }
            self.authorize(Operation::Create, self.requested_scope())?;
            let vertex =
                self.writable_vertex(ElementKind::Concept, &definition.iri, &existing.handle, None)?;
            if definition.redeclared {
                self.clear_changeable(&vertex)?;
            }
            return self.apply(&vertex, fields.writes());
        }

        let parent = definition
            .parent_iri
            .as_deref()
            .map(|iri| self.repo.get_required_concept_by_iri(iri, self.workspace))
            .transpose()?;
        self.authorize(Operation::Create, self.requested_scope())?;
        let vertex = self.create_vertex(ElementKind::Concept, &definition.iri, None)?;
        self.apply(&vertex, fields.writes())?;
        if let Some(parent) = &parent {
            self.link(&vertex, labels::IS_A, anchor(&parent.handle)?)?;
        }
        tracing::debug!(iri = %definition.iri, workspace = ?self.workspace, "created concept");
        Ok(())
    }

    fn upsert_relationship(&mut self, definition: &RelationshipDefinition) -> Result<()> {
        let fields = &definition.fields;
        if let Some(existing) = self
            .repo
            .get_relationship_by_iri(&definition.iri, self.workspace)?
        {
            if !definition.redeclared && fields.is_noop_for(&existing) {
                return Ok(());
            }
            self.authorize(Operation::Create, self.requested_scope())?;
            let vertex = self.writable_vertex(
                ElementKind::Relationship,
                &definition.iri,
                &existing.handle,
                None,
            )?;
            if definition.redeclared {
                self.clear_changeable(&vertex)?;
            }
            return self.apply(&vertex, fields.writes());
        }

        let parent = definition
            .parent_iri
            .as_deref()
            .map(|iri| self.repo.get_required_relationship_by_iri(iri, self.workspace))
            .transpose()?;
        let required_concepts = |iris: &[String]| -> Result<Vec<Concept>> {
            iris.iter()
                .map(|iri| self.repo.get_required_concept_by_iri(iri, self.workspace))
                .collect()
        };
        let domain = required_concepts(&definition.domain_concept_iris)?;
        let range = required_concepts(&definition.range_concept_iris)?;

        self.authorize(Operation::Create, self.requested_scope())?;
        let vertex = self.create_vertex(ElementKind::Relationship, &definition.iri, None)?;
        self.apply(&vertex, fields.writes())?;
        for concept in &domain {
            self.link(anchor(&concept.handle)?, labels::HAS_EDGE, &vertex)?;
        }
        for concept in &range {
            self.link(&vertex, labels::HAS_EDGE, anchor(&concept.handle)?)?;
        }
        if let Some(parent) = &parent {
            self.link(&vertex, labels::IS_A, anchor(&parent.handle)?)?;
        }
        tracing::debug!(iri = %definition.iri, workspace = ?self.workspace, "created relationship");
        Ok(())
    }

    fn property_owners(
        &self,
        definition: &OntologyPropertyDefinition,
    ) -> Result<Vec<(String, ElementHandle)>> {
        let mut owners = Vec::new();
        for iri in &definition.concept_iris {
            let concept = self.repo.get_required_concept_by_iri(iri, self.workspace)?;
            owners.push((concept.iri, concept.handle));
        }
        for iri in &definition.relationship_iris {
            let relationship = self.repo.get_required_relationship_by_iri(iri, self.workspace)?;
            owners.push((relationship.iri, relationship.handle));
        }
        for iri in &definition.extended_data_table_domains {
            let table = self.repo.get_required_property_by_iri(iri, self.workspace)?;
            owners.push((table.iri, table.handle));
        }
        Ok(owners)
    }

    fn dependent_handles(&self, iris: &[String]) -> Result<Vec<ElementHandle>> {
        iris.iter()
            .map(|iri| {
                self.repo
                    .get_required_property_by_iri(iri, self.workspace)
                    .map(|p| p.handle)
            })
            .collect()
    }

    fn write_dependents(&mut self, property: &ElementHandle, iris: &[String]) -> Result<()> {
        let dependents = self.dependent_handles(iris)?;
        self.authorize(Operation::Create, self.element_scope(property))?;
        for dependent in &dependents {
            self.authorize(Operation::Create, self.edge_scope(property, dependent))?;
        }
        let targets = dependents
            .iter()
            .map(|h| anchor(h).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        self.save_dependents(anchor(property)?, &targets)
    }

    fn is_owned_by(&self, property_iri: &str, owner_iri: &str) -> Result<bool> {
        if let Some(concept) = self.repo.get_concept_by_iri(owner_iri, self.workspace)? {
            return Ok(concept.property_iris().any(|p| p == property_iri));
        }
        if let Some(relationship) = self.repo.get_relationship_by_iri(owner_iri, self.workspace)? {
            return Ok(relationship.property_iris().any(|p| p == property_iri));
        }
        Ok(self
            .repo
            .get_property_by_iri(owner_iri, self.workspace)?
            .is_some_and(|t| t.table_property_iris.iter().any(|p| p == property_iri)))
    }

    fn upsert_property(&mut self, definition: &OntologyPropertyDefinition) -> Result<()> {
        let fields = property_fields(definition);
        let owners = self.property_owners(definition)?;

        if let Some(existing) = self.repo.get_property_by_iri(&definition.iri, self.workspace)? {
            if definition.redeclared || !fields.is_noop_for(&existing) {
                self.authorize(Operation::Create, self.requested_scope())?;
                let vertex = self.writable_vertex(
                    ElementKind::Property,
                    &definition.iri,
                    &existing.handle,
                    Some(existing.data_type),
                )?;
                if definition.redeclared {
                    self.clear_changeable(&vertex)?;
                }
                self.apply(&vertex, fields.writes())?;
            }
            for (owner_iri, owner) in &owners {
                if !self.is_owned_by(&definition.iri, owner_iri)? {
                    self.authorize(Operation::Create, self.edge_scope(owner, &existing.handle))?;
                    self.link(anchor(owner)?, labels::HAS_PROPERTY, anchor(&existing.handle)?)?;
                }
            }
            if let Some(dependents) = &definition.dependent_property_iris {
                if *dependents != existing.dependent_property_iris {
                    self.write_dependents(&existing.handle, dependents)?;
                }
            }
            return Ok(());
        }

        let dependents = definition
            .dependent_property_iris
            .as_deref()
            .map(|iris| self.dependent_handles(iris))
            .transpose()?;
        self.authorize(Operation::Create, self.requested_scope())?;

        let graph = &self.repo.graph;
        if !graph.is_property_defined(&definition.iri) {
            graph.define_property(PropertyDefinition {
                name: definition.iri.clone(),
                data_type: definition.data_type.as_str().to_string(),
                text_index_hints: definition.text_index_hints.clone(),
                sortable: fields.sortable.unwrap_or(true),
                boost: fields.boost,
            })?;
        }

        let vertex = self.create_vertex(
            ElementKind::Property,
            &definition.iri,
            Some(definition.data_type),
        )?;
        for hint in &definition.text_index_hints {
            graph.set_property(
                &vertex,
                Property::new(props::TEXT_INDEX_HINTS, hint.as_str(), ontology_visibility())
                    .with_key(hint.as_str()),
            )?;
        }
        self.apply(&vertex, fields.writes())?;
        for (_, owner) in &owners {
            self.link(anchor(owner)?, labels::HAS_PROPERTY, &vertex)?;
        }
        if let Some(dependents) = dependents {
            let targets = dependents
                .iter()
                .map(|h| anchor(h).map(str::to_string))
                .collect::<Result<Vec<_>>>()?;
            self.save_dependents(&vertex, &targets)?;
        }
        tracing::debug!(
            iri = %definition.iri,
            data_type = %definition.data_type,
            workspace = ?self.workspace,
            "created property"
        );
        Ok(())
    }

    fn update_fields(
        &mut self,
        kind: ElementKind,
        iri: &str,
        handle: &ElementHandle,
        data_type: Option<PropertyType>,
        writes: Vec<FieldWrite>,
    ) -> Result<()> {
        self.authorize(Operation::Create, self.requested_scope())?;
        let vertex = self.writable_vertex(kind, iri, handle, data_type)?;
        self.apply(&vertex, writes)
    }

    fn attach_property(&mut self, property: &ElementHandle, owner: &ElementHandle) -> Result<()> {
        self.authorize(Operation::Create, self.edge_scope(owner, property))?;
        self.link(anchor(owner)?, labels::HAS_PROPERTY, anchor(property)?)
    }

    fn replace_domain(&mut self, property: &OntologyProperty, domain_iris: &BTreeSet<String>) -> Result<()> {
        let mut owners = Vec::new();
        for iri in domain_iris {
            let handle = match self.repo.get_concept_by_iri(iri, self.workspace)? {
                Some(concept) => concept.handle,
                None => self
                    .repo
                    .get_relationship_by_iri(iri, self.workspace)?
                    .map(|r| r.handle)
                    .ok_or_else(|| OntologyError::missing(ElementKind::Concept, iri.as_str()))?,
            };
            owners.push((iri.clone(), handle));
        }

        let mut remaining: BTreeSet<&str> = domain_iris.iter().map(String::as_str).collect();
        let graph = self.repo.graph.clone();
        for property_vertex in property.handle.vertex_ids() {
            let edges = graph.edges(property_vertex, Direction::In, Some(labels::HAS_PROPERTY), &self.auths)?;
            for edge in edges {
                let Some(source) = graph.get_vertex(&edge.out_vertex_id, &self.auths)? else {
                    continue;
                };
                if source.string(props::CONCEPT_TYPE) == Some(vocab::TYPE_PROPERTY) {
                    continue;
                }
                let source_iri = source.string(props::ONTOLOGY_TITLE).unwrap_or_default();
                if !remaining.remove(source_iri) {
                    let scope = if source.visibility.contains(self.workspace.unwrap_or_default())
                        || property.handle.public_vertex_id.is_none()
                    {
                        self.requested_scope()
                    } else {
                        Scope::Public
                    };
                    self.authorize(Operation::Create, scope)?;
                    graph.soft_delete_edge(&edge.id)?;
                }
            }
        }
        for (iri, owner) in &owners {
            if remaining.contains(iri.as_str()) {
                self.attach_property(&property.handle, owner)?;
            }
        }
        Ok(())
    }

    fn link_inverse(&mut self, from: &Relationship, inverse: &Relationship) -> Result<()> {
        self.authorize(Operation::Create, self.edge_scope(&from.handle, &inverse.handle))?;
        let a = anchor(&from.handle)?;
        let b = anchor(&inverse.handle)?;
        self.link(a, labels::INVERSE_OF, b)?;
        self.link(b, labels::INVERSE_OF, a)
    }

    /// Promote a sandboxed element. Re-publishing is a no-op.
    fn publish(&mut self, kind: ElementKind, iri: &str, handle: &ElementHandle, status: SandboxStatus) -> Result<()> {
        if status == SandboxStatus::Public {
            return Ok(());
        }
        self.authorize(Operation::Publish, self.requested_scope())?;
        let Some(ws) = self.workspace else {
            return Ok(());
        };
        let Some(sandbox_id) = handle.sandbox_vertex_id.as_deref() else {
            return Ok(());
        };
        let graph = self.repo.graph.clone();
        let Some(vertex) = graph.get_vertex(sandbox_id, &self.auths)? else {
            return Ok(());
        };
        let visibility = VisibilityDescriptor::from_visibility(&vertex.visibility);
        if !visibility.is_confined_to(ws) {
            tracing::debug!(iri = %iri, workspace = %ws, "element not confined to workspace, nothing to publish");
            return Ok(());
        }
        self.touch(Scope::Public);

        match handle.public_vertex_id.as_deref() {
            Some(public_id) => {
                let overrides: BTreeSet<&str> = vertex
                    .properties
                    .iter()
                    .map(|p| p.name.as_str())
                    .filter(|name| vocab::is_changeable(name))
                    .collect();
                if overrides.contains(props::INTENT) {
                    self.clear_named(public_id, |n| n == props::INTENT)?;
                }
                for property in vertex
                    .properties
                    .iter()
                    .filter(|p| vocab::is_changeable(&p.name))
                {
                    graph.set_property(public_id, property.clone())?;
                }
                graph.soft_delete_vertex(sandbox_id)?;
                tracing::info!(%kind, iri = %iri, workspace = %ws, "published sandbox changes");
            }
            None => {
                graph.alter_vertex_visibility(
                    sandbox_id,
                    visibility.without_workspace(ws).to_visibility(),
                )?;
                graph.delete_edge(&vocab::edge_id(ws, labels::WORKSPACE_TO_ONTOLOGY, sandbox_id))?;
                tracing::info!(%kind, iri = %iri, workspace = %ws, "published sandboxed element");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Public operations
// ============================================================================

impl OntologyRepository {
    /// Get-or-create a concept in the given scope.
    ///
    /// An existing element only has its changeable fields rewritten; a
    /// redeclared definition first drops them. Structure is never touched.
    pub fn get_or_create_concept(
        &self,
        definition: &ConceptDefinition,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<Concept> {
        self.write(user, workspace, |ctx| ctx.upsert_concept(definition))?;
        self.get_required_concept_by_iri(&definition.iri, workspace)
    }

    /// Get-or-create a relationship. Domain and range are only linked on
    /// creation.
    pub fn get_or_create_relationship_type(
        &self,
        definition: &RelationshipDefinition,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<Relationship> {
        self.write(user, workspace, |ctx| ctx.upsert_relationship(definition))?;
        self.get_required_relationship_by_iri(&definition.iri, workspace)
    }

    /// Get-or-create a property and attach it to its owners.
    ///
    /// Owners are added but never removed here, see
    /// [`update_property_domain_iris`](Self::update_property_domain_iris).
    pub fn get_or_create_property(
        &self,
        definition: &OntologyPropertyDefinition,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<OntologyProperty> {
        self.write(user, workspace, |ctx| ctx.upsert_property(definition))?;
        self.get_required_property_by_iri(&definition.iri, workspace)
    }

    pub fn update_concept(
        &self,
        concept: &Concept,
        update: &ConceptUpdate,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<Concept> {
        if !update.is_noop_for(concept) {
            self.write(user, workspace, |ctx| {
                ctx.update_fields(ElementKind::Concept, &concept.iri, &concept.handle, None, update.writes())
            })?;
        }
        self.get_required_concept_by_iri(&concept.iri, workspace)
    }

    pub fn update_relationship(
        &self,
        relationship: &Relationship,
        update: &RelationshipUpdate,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<Relationship> {
        if !update.is_noop_for(relationship) {
            self.write(user, workspace, |ctx| {
                ctx.update_fields(
                    ElementKind::Relationship,
                    &relationship.iri,
                    &relationship.handle,
                    None,
                    update.writes(),
                )
            })?;
        }
        self.get_required_relationship_by_iri(&relationship.iri, workspace)
    }

    pub fn update_property(
        &self,
        property: &OntologyProperty,
        update: &PropertyUpdate,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<OntologyProperty> {
        if !update.is_noop_for(property) {
            self.write(user, workspace, |ctx| {
                ctx.update_fields(
                    ElementKind::Property,
                    &property.iri,
                    &property.handle,
                    Some(property.data_type),
                    update.writes(),
                )
            })?;
        }
        self.get_required_property_by_iri(&property.iri, workspace)
    }

    pub fn add_property_to_concepts(
        &self,
        property: &OntologyProperty,
        concepts: &[Concept],
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.write(user, workspace, |ctx| {
            concepts
                .iter()
                .try_for_each(|c| ctx.attach_property(&property.handle, &c.handle))
        })
    }

    pub fn add_property_to_relationships(
        &self,
        property: &OntologyProperty,
        relationships: &[Relationship],
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.write(user, workspace, |ctx| {
            relationships
                .iter()
                .try_for_each(|r| ctx.attach_property(&property.handle, &r.handle))
        })
    }

    /// Replace the ordered dependents of `property`.
    pub fn update_property_dependent_iris(
        &self,
        property: &OntologyProperty,
        dependent_property_iris: &[String],
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.write(user, workspace, |ctx| {
            ctx.write_dependents(&property.handle, dependent_property_iris)
        })
    }

    /// Make `domain_iris` the exact set of concepts/relationships owning
    /// `property`. Unknown IRIs fail before anything is written.
    pub fn update_property_domain_iris(
        &self,
        property: &OntologyProperty,
        domain_iris: &BTreeSet<String>,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.write(user, workspace, |ctx| ctx.replace_domain(property, domain_iris))
    }

    /// Link two relationships as inverses of each other (both directions).
    pub fn get_or_create_inverse_of_relationship(
        &self,
        from: &Relationship,
        inverse: &Relationship,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.write(user, workspace, |ctx| ctx.link_inverse(from, inverse))
    }

    pub fn publish_concept(&self, concept: &Concept, user: Option<&User>, workspace: Option<&str>) -> Result<()> {
        self.publish_element(concept, concept.sandbox_status, user, workspace)
    }

    pub fn publish_relationship(
        &self,
        relationship: &Relationship,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.publish_element(relationship, relationship.sandbox_status, user, workspace)
    }

    pub fn publish_property(
        &self,
        property: &OntologyProperty,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.publish_element(property, property.sandbox_status, user, workspace)
    }

    fn publish_element<T: OntologyElement>(
        &self,
        element: &T,
        status: SandboxStatus,
        user: Option<&User>,
        workspace: Option<&str>,
    ) -> Result<()> {
        self.write(user, workspace, |ctx| {
            ctx.publish(T::KIND, element.iri(), element.handle(), status)
        })
    }

    /// Deterministic IRI for an element created from a display name.
    pub fn generate_dynamic_iri(
        &self,
        kind: ElementKind,
        display_name: &str,
        workspace: Option<&str>,
        extended: &[&str],
    ) -> String {
        let seed = format!(
            "{display_name}{}{}",
            workspace.unwrap_or_default(),
            extended.concat()
        );
        format!(
            "{}{}#{}",
            self.config.dynamic_iri_base,
            kind.type_marker(),
            sha256_hex(seed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searchable_rules() {
        let none = BTreeSet::new();
        let full: BTreeSet<_> = [TextIndexHint::FullText].into();
        assert!(!determine_searchable(PropertyType::ExtendedDataTable, &full, true));
        assert!(!determine_searchable(PropertyType::String, &none, true));
        assert!(determine_searchable(PropertyType::String, &full, true));
        assert!(!determine_searchable(PropertyType::String, &full, false));
        assert!(determine_searchable(PropertyType::Date, &none, true));
    }

    #[test]
    fn entity_gets_default_formulas_unless_given() {
        let defaults = with_entity_defaults(&ConceptDefinition::new(vocab::ENTITY_CONCEPT_IRI, "thing"));
        assert_eq!(defaults.time_formula.as_deref(), Some(ENTITY_TIME_FORMULA));

        let mut custom = ConceptDefinition::new(vocab::ENTITY_CONCEPT_IRI, "thing");
        custom.fields.title_formula = Some("custom".into());
        assert_eq!(with_entity_defaults(&custom).title_formula.as_deref(), Some("custom"));

        let other = with_entity_defaults(&ConceptDefinition::new("http://x#c", "c"));
        assert!(other.title_formula.is_none());
    }

    #[test]
    fn anchor_prefers_public_vertex() {
        let handle = ElementHandle {
            public_vertex_id: Some("p".into()),
            sandbox_vertex_id: Some("s".into()),
        };
        assert_eq!(anchor(&handle).unwrap(), "p");
        assert!(anchor(&ElementHandle::default()).is_err());
    }
}
