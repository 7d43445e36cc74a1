//! OWL schema documents for the Ontograph ontology repository.
//!
//! This crate is a boundary adapter: it reads OWL documents with `sophia`
//! and hands format-independent declarations to the repository's import
//! pipeline. It never writes to the graph itself.
//!
//! ```text
//! .nt / .ttl / .owl bytes --sophia--> triples --owl--> ParsedOntology
//! ```

pub mod owl;
pub mod rdf;

pub use owl::{OwlError, OwlSchemaParser};
pub use rdf::RdfSyntax;

/// File extensions this parser claims.
pub const EXTENSIONS: [&str; 6] = ["nt", "ttl", "turtle", "owl", "rdf", "xml"];

pub fn handles_extension(extension: &str) -> bool {
    EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}
