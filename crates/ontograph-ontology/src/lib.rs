//! Ontograph Ontology Repository
//!
//! A versioned, multi-tenant schema store kept on a property graph:
//!
//! - **Concepts** (entity types) form a tree under a fixed root.
//! - **Relationships** (edge types) link domain concepts to range concepts.
//! - **Properties** carry a data type, search hints and display metadata.
//!
//! Every element lives either in the *public* scope or in one workspace's
//! sandbox. A workspace reader sees public elements merged with its own
//! overlays; nobody else sees the sandbox until it is published.
//!
//! ## Module Organization
//!
//! - `repository`: cached reads and the single write entry point
//! - `mutation`: get-or-create, update, structural edits, publish
//! - `scope`: vertex identity and the public/overlay merge
//! - `auth`: authorization labels and the mutation policy
//! - `import`: schema document ingestion and storage
//! - `hierarchy`, `intent`: lookups over the cached views
//! - `view`: reads admitted through the authorization gate

pub mod auth;
mod cache;
pub mod client_api;
pub mod config;
pub mod declaration;
pub mod definition;
pub mod error;
pub mod factory;
mod hierarchy;
pub mod import;
mod intent;
pub mod model;
mod mutation;
pub mod repository;
pub mod scope;
mod view;
pub mod vocab;

pub use auth::{
    AuthorizationGate, AuthorizationProvider, InMemoryAuthorizationRepository, Operation, Privilege,
    PrivilegeRepository, Scope, User,
};
pub use cache::{cache_key, PUBLIC_CACHE_KEY};
pub use client_api::ClientApiOntology;
pub use config::RepositoryConfig;
pub use declaration::{
    AnnotationPropertyDeclaration, ConceptDeclaration, ImportError, JsonSchemaParser,
    ParsedOntology, PropertyDeclaration, RelationshipDeclaration, SchemaDocument, SchemaParser,
};
pub use definition::{
    ConceptDefinition, ConceptUpdate, OntologyPropertyDefinition, PropertyUpdate,
    RelationshipDefinition, RelationshipUpdate,
};
pub use error::{OntologyError, Result};
pub use factory::{ElementFactory, VertexElementFactory};
pub use import::{AnnotationPropertyVisitor, DisableIndexVisitor, ImportCounts, ImportOutcome};
pub use model::{
    Concept, ElementHandle, ElementKind, ElementTypeFilter, OntologyElement, OntologyProperty,
    PropertyType, Relationship, SandboxStatus,
};
pub use repository::{OntologyRepository, OntologyRepositoryBuilder};
pub use scope::VisibilityDescriptor;
pub use view::OntologyView;

pub use ontograph_graph::TextIndexHint;
