//! RDF statements read with `sophia`.
//!
//! The serialization is picked from the document IRI's extension; anything
//! unrecognised is read as Turtle, which also accepts plain N-Triples.

use crate::owl::OwlError;
use sophia::api::source::TripleSource;
use sophia::api::term::{Term as RdfTerm, TermKind};
use sophia::api::triple::Triple as _;
use std::convert::Infallible;
use std::fmt;
use std::io::{BufReader, Cursor};

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const ONTOGRAPH: &str = "http://ontograph.dev#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfSyntax {
    NTriples,
    Turtle,
    RdfXml,
}

impl RdfSyntax {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "nt" => Some(Self::NTriples),
            "ttl" | "turtle" => Some(Self::Turtle),
            "owl" | "rdf" | "xml" => Some(Self::RdfXml),
            _ => None,
        }
    }

    pub fn for_document(document_iri: &str) -> Self {
        document_iri
            .rsplit(['/', '\\'])
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| Self::from_extension(ext))
            .unwrap_or(Self::Turtle)
    }
}

impl fmt::Display for RdfSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NTriples => "N-Triples",
            Self::Turtle => "Turtle",
            Self::RdfXml => "RDF/XML",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        lexical: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl Term {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Lexical form of a literal, or the IRI itself.
    pub fn text(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Literal { lexical, .. } => Some(lexical),
            Term::Blank(_) => None,
        }
    }

    fn from_rdf<T: RdfTerm>(term: T) -> Option<Self> {
        match term.kind() {
            TermKind::Iri => term.iri().map(|iri| Term::Iri(iri.as_str().to_string())),
            TermKind::BlankNode => term.bnode_id().map(|id| Term::Blank(id.as_str().to_string())),
            TermKind::Literal => Some(Term::Literal {
                lexical: term.lexical_form()?.to_string(),
                datatype: term.datatype().map(|dt| dt.as_str().to_string()),
                language: term.language_tag().map(|tag| tag.as_str().to_string()),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

fn collect<S: TripleSource>(mut source: S, syntax: RdfSyntax) -> Result<Vec<Triple>, OwlError> {
    let mut triples = Vec::new();
    source
        .try_for_each_triple(|t| -> Result<(), Infallible> {
            let subject = Term::from_rdf(t.s());
            let predicate = t.p().iri().map(|iri| iri.as_str().to_string());
            let object = Term::from_rdf(t.o());
            match (subject, predicate, object) {
                (Some(subject), Some(predicate), Some(object)) => triples.push(Triple {
                    subject,
                    predicate,
                    object,
                }),
                _ => tracing::debug!("skipping statement with a quoted triple or variable"),
            }
            Ok(())
        })
        .map_err(|e| OwlError::Parse {
            syntax,
            message: e.to_string(),
        })?;
    Ok(triples)
}

pub fn parse_document(content: &[u8], syntax: RdfSyntax) -> Result<Vec<Triple>, OwlError> {
    std::str::from_utf8(content)?;
    let reader = BufReader::new(Cursor::new(content));
    match syntax {
        RdfSyntax::NTriples => collect(sophia::turtle::parser::nt::parse_bufread(reader), syntax),
        RdfSyntax::Turtle => collect(sophia::turtle::parser::turtle::parse_bufread(reader), syntax),
        RdfSyntax::RdfXml => collect(sophia::xml::parser::parse_bufread(reader), syntax),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_follows_the_extension() {
        assert_eq!(RdfSyntax::for_document("file:///tmp/a.nt"), RdfSyntax::NTriples);
        assert_eq!(RdfSyntax::for_document("file:///tmp/a.TTL"), RdfSyntax::Turtle);
        assert_eq!(RdfSyntax::for_document("http://x/onto.owl"), RdfSyntax::RdfXml);
        assert_eq!(RdfSyntax::for_document("http://x.org/doc"), RdfSyntax::Turtle);
    }

    #[test]
    fn ntriples_escapes_and_literals() {
        let triples = parse_document(
            br#"# comment
<http://x#a> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/2002/07/owl#Class> .
<http://x#a> <http://www.w3.org/2000/01/rdf-schema#label> "Caf\u00E9 \"noir\""@fr .
<http://x#p> <http://ontograph.dev#boost> "2.5"^^<http://www.w3.org/2001/XMLSchema#double> .
"#,
            RdfSyntax::NTriples,
        )
        .unwrap();
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].predicate, format!("{RDF}type"));
        assert_eq!(triples[0].object, Term::Iri(format!("{OWL}Class")));
        match &triples[1].object {
            Term::Literal { lexical, language, .. } => {
                assert_eq!(lexical, "Café \"noir\"");
                assert_eq!(language.as_deref(), Some("fr"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &triples[2].object {
            Term::Literal { lexical, datatype, .. } => {
                assert_eq!(lexical, "2.5");
                assert_eq!(datatype.as_deref(), Some(format!("{XSD}double").as_str()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn turtle_prefixes_and_blank_nodes() {
        let triples = parse_document(
            br#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
<http://x#a> a owl:Class ; rdfs:label "A" .
_:b0 rdfs:label "anon" .
"#,
            RdfSyntax::Turtle,
        )
        .unwrap();
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].object.as_iri(), Some(format!("{OWL}Class").as_str()));
        assert_eq!(triples[1].object.text(), Some("A"));
        assert!(matches!(triples[2].subject, Term::Blank(_)));
    }

    #[test]
    fn rdf_xml_documents() {
        let triples = parse_document(
            br#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
         xmlns:owl="http://www.w3.org/2002/07/owl#">
  <owl:Class rdf:about="http://x#Thing">
    <rdfs:label>Thing</rdfs:label>
  </owl:Class>
</rdf:RDF>
"#,
            RdfSyntax::RdfXml,
        )
        .unwrap();
        assert!(triples
            .iter()
            .any(|t| t.predicate == format!("{RDF}type") && t.object.as_iri() == Some(format!("{OWL}Class").as_str())));
        assert!(triples.iter().any(|t| t.object.text() == Some("Thing")));
    }

    #[test]
    fn malformed_documents_are_parse_errors() {
        let err = parse_document(b"<http://x#a> <http://x#p> \"open .\n", RdfSyntax::NTriples).unwrap_err();
        assert!(matches!(err, OwlError::Parse { syntax: RdfSyntax::NTriples, .. }));
        // prefixed names are Turtle, not N-Triples
        assert!(parse_document(b"<http://x#a> a <http://x#B> .", RdfSyntax::NTriples).is_err());
        assert!(parse_document(b"<http://x#a> a foo:Bar .", RdfSyntax::Turtle).is_err());
        assert!(matches!(
            parse_document(b"\xff\xfe", RdfSyntax::Turtle),
            Err(OwlError::Encoding(_))
        ));
    }
}
