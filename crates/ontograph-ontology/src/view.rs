//! Reads on behalf of a user.
//!
//! The plain `get_*` reads are keyed by workspace and assume the caller has
//! already been admitted. [`OntologyRepository::view_for`] resolves the
//! user's graph authorizations through the gate first, so a user without
//! `ONTOLOGY_ADD` cannot read the public scope on its own. When the provider
//! grants exactly the workspace's standard labels the cached views are
//! shared; extra labels get a dedicated, uncached load.

use crate::auth::User;
use crate::client_api::ClientApiOntology;
use crate::error::{OntologyError, Result};
use crate::model::{Concept, ElementKind, OntologyProperty, Relationship};
use crate::repository::OntologyRepository;
use std::sync::Arc;

/// A snapshot of the merged ontology as one user sees it in one scope.
#[derive(Debug, Clone)]
pub struct OntologyView {
    workspace: Option<String>,
    concepts: Arc<Vec<Concept>>,
    relationships: Arc<Vec<Relationship>>,
    properties: Arc<Vec<OntologyProperty>>,
}

impl OntologyView {
    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn properties(&self) -> &[OntologyProperty] {
        &self.properties
    }

    pub fn concept(&self, iri: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.iri == iri)
    }

    pub fn relationship(&self, iri: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.iri == iri)
    }

    pub fn property(&self, iri: &str) -> Option<&OntologyProperty> {
        self.properties.iter().find(|p| p.iri == iri)
    }

    pub fn required_concept(&self, iri: &str) -> Result<&Concept> {
        self.concept(iri)
            .ok_or_else(|| OntologyError::missing(ElementKind::Concept, iri))
    }

    pub fn client_api(&self) -> ClientApiOntology {
        ClientApiOntology::build(&self.concepts, &self.relationships, &self.properties)
    }
}

impl OntologyRepository {
    /// The ontology as `user` sees it in `workspace`.
    ///
    /// Fails with `AccessDenied` when the user may not read the scope.
    pub fn view_for(&self, user: &User, workspace: Option<&str>) -> Result<OntologyView> {
        let auths = self.gate.authorizations_for(Some(user), workspace)?;
        if auths == self.read_authorizations(workspace)? {
            return Ok(OntologyView {
                workspace: workspace.map(str::to_string),
                concepts: self.get_concepts_with_properties(workspace)?,
                relationships: self.get_relationships(workspace)?,
                properties: self.get_properties(workspace)?,
            });
        }

        tracing::debug!(user = %user.id(), workspace = ?workspace, "loading ontology with user labels");
        let properties = self.load_properties(workspace, &auths)?;
        let concepts = self.load_concepts(workspace, &auths, &properties)?;
        let relationships = self.load_relationships(workspace, &auths, &properties)?;
        Ok(OntologyView {
            workspace: workspace.map(str::to_string),
            concepts: Arc::new(concepts),
            relationships: Arc::new(relationships),
            properties: Arc::new(properties),
        })
    }
}
