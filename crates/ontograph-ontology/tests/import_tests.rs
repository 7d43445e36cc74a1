use ontograph_graph::{
    Authorizations, Direction, Edge, EdgeBuilder, Graph, GraphResult, InMemoryGraph, Property,
    PropertyDefinition, Vertex, Visibility,
};
use ontograph_ontology::vocab;
use ontograph_ontology::{
    AuthorizationGate, ImportCounts, ImportOutcome, InMemoryAuthorizationRepository,
    JsonSchemaParser, OntologyError, OntologyRepository, Privilege, User,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

const DOC: &str = "http://junit/test.json";

const SCHEMA: &str = r#"{
  "concepts": [
    { "iri": "http://junit#employee", "parentIri": "http://junit#person", "displayName": "Employee" },
    { "iri": "http://junit#person", "displayName": "Person", "intents": ["person"], "color": "rgb(0, 0, 255)" }
  ],
  "relationships": [
    { "iri": "http://junit#worksFor", "displayName": "Works For",
      "domainConceptIris": ["http://junit#employee"], "rangeConceptIris": ["http://junit#person"],
      "inverseOfIris": ["http://junit#employs"] },
    { "iri": "http://junit#employs",
      "domainConceptIris": ["http://junit#person"], "rangeConceptIris": ["http://junit#employee"] }
  ],
  "properties": [
    { "iri": "http://junit#name", "dataType": "string", "displayName": "Name",
      "domainIris": ["http://junit#person"], "textIndexHints": ["FULL_TEXT"],
      "dependentPropertyIris": ["http://junit#firstName", "http://junit#lastName"] },
    { "iri": "http://junit#firstName", "dataType": "string", "domainIris": ["http://junit#person"] },
    { "iri": "http://junit#lastName", "dataType": "string", "domainIris": ["http://junit#person"] },
    { "iri": "http://junit#since", "dataType": "date", "domainIris": ["http://junit#worksFor"] }
  ],
  "annotationProperties": [ { "iri": "http://junit#comment" } ]
}"#;

fn repository(with_parser: bool) -> (OntologyRepository, Arc<InMemoryGraph>, Arc<InMemoryAuthorizationRepository>) {
    let graph = Arc::new(InMemoryGraph::new());
    let auth = Arc::new(InMemoryAuthorizationRepository::new());
    let mut builder = OntologyRepository::builder(graph.clone(), AuthorizationGate::new(auth.clone(), auth.clone()));
    if with_parser {
        builder = builder.parser(Arc::new(JsonSchemaParser));
    }
    (builder.build().expect("bootstrap"), graph, auth)
}

#[test]
fn import_applies_every_declaration() {
    let (repo, graph, _) = repository(true);
    let outcome = repo
        .import_file_data(SCHEMA.as_bytes(), DOC, None, &User::system())
        .unwrap();
    assert_eq!(
        outcome,
        ImportOutcome::Imported {
            index: 0,
            counts: ImportCounts {
                concepts: 2,
                relationships: 2,
                properties: 4,
                annotation_properties: 1,
            },
        }
    );

    let person = repo.get_required_concept_by_iri("http://junit#person", None).unwrap();
    assert_eq!(person.parent_iri.as_deref(), Some(vocab::ENTITY_CONCEPT_IRI));
    assert_eq!(person.color.as_deref(), Some("rgb(0, 0, 255)"));
    let props: BTreeSet<&str> = person.property_iris().collect();
    assert_eq!(
        props,
        BTreeSet::from(["http://junit#firstName", "http://junit#lastName", "http://junit#name"])
    );
    let employee = repo.get_required_concept_by_iri("http://junit#employee", None).unwrap();
    assert_eq!(employee.parent_iri.as_deref(), Some("http://junit#person"));

    let works_for = repo.get_required_relationship_by_iri("http://junit#worksFor", None).unwrap();
    assert_eq!(works_for.parent_iri.as_deref(), Some(vocab::TOP_OBJECT_PROPERTY_IRI));
    assert_eq!(works_for.domain_concept_iris, vec!["http://junit#employee"]);
    assert_eq!(works_for.range_concept_iris, vec!["http://junit#person"]);
    assert_eq!(works_for.inverse_of_iris, vec!["http://junit#employs"]);
    assert!(works_for.property_iris().any(|p| p == "http://junit#since"));
    let employs = repo.get_required_relationship_by_iri("http://junit#employs", None).unwrap();
    assert_eq!(employs.inverse_of_iris, vec!["http://junit#worksFor"]);

    let name = repo.get_required_property_by_iri("http://junit#name", None).unwrap();
    assert_eq!(
        name.dependent_property_iris,
        vec!["http://junit#firstName", "http://junit#lastName"]
    );
    assert!(name.is_searchable());
    let first = repo.get_required_property_by_iri("http://junit#firstName", None).unwrap();
    assert!(!first.is_searchable(), "strings without index hints are not searchable");
    assert_eq!(first.display_label(), "http://junit#firstName");
    let since = repo.get_required_property_by_iri("http://junit#since", None).unwrap();
    assert!(since.is_searchable());

    let comment = graph.property_definition("http://junit#comment").unwrap();
    assert!(comment.text_index_hints.is_empty());

    assert_eq!(
        repo.get_required_concept_iri_by_intent("person", None).unwrap(),
        "http://junit#person"
    );
    assert!(repo.is_ontology_defined(DOC).unwrap());
    assert!(!repo.is_ontology_defined("http://junit/other.json").unwrap());
}

#[test]
fn reimporting_identical_bytes_is_a_noop() {
    let (repo, _, _) = repository(true);
    repo.import_file_data(SCHEMA.as_bytes(), DOC, None, &User::system())
        .unwrap();
    let before = repo.get_concepts_with_properties(None).unwrap();

    let again = repo
        .import_file_data(SCHEMA.as_bytes(), DOC, None, &User::system())
        .unwrap();
    assert_eq!(again, ImportOutcome::Unchanged);
    assert!(Arc::ptr_eq(&before, &repo.get_concepts_with_properties(None).unwrap()));
}

#[test]
fn changed_document_redeclares_display_fields() {
    let (repo, _, _) = repository(true);
    repo.import_file_data(SCHEMA.as_bytes(), DOC, None, &User::system())
        .unwrap();

    let renamed = SCHEMA
        .replace("\"displayName\": \"Person\"", "\"displayName\": \"Human\"")
        .replace(", \"color\": \"rgb(0, 0, 255)\"", "");
    let outcome = repo
        .import_file_data(renamed.as_bytes(), DOC, None, &User::system())
        .unwrap();
    assert!(matches!(outcome, ImportOutcome::Imported { index: 0, .. }));

    let person = repo.get_required_concept_by_iri("http://junit#person", None).unwrap();
    assert_eq!(person.display_name.as_deref(), Some("Human"));
    assert!(person.color.is_none(), "redeclaration drops fields no longer declared");
    assert_eq!(person.intents, vec!["person"]);
    // structure survives redeclaration
    assert_eq!(person.property_iris().count(), 3);
    assert_eq!(repo.load_ontology_files(None).unwrap().len(), 1);
}

#[test]
fn documents_are_kept_in_import_order() {
    let (repo, _, _) = repository(true);
    let system = User::system();
    repo.import_file_data(SCHEMA.as_bytes(), DOC, None, &system).unwrap();
    let second = r#"{ "concepts": [ { "iri": "http://junit#manager", "parentIri": "http://junit#employee" } ] }"#;
    let outcome = repo
        .import_file_data(second.as_bytes(), "http://junit/second.json", None, &system)
        .unwrap();
    assert!(matches!(outcome, ImportOutcome::Imported { index: 1, .. }));

    let iris: Vec<String> = repo
        .load_ontology_files(None)
        .unwrap()
        .into_iter()
        .map(|d| d.iri)
        .collect();
    assert_eq!(iris, vec![DOC, "http://junit/second.json"]);
    let without_first = repo.load_ontology_files(Some(DOC)).unwrap();
    assert_eq!(without_first.len(), 1);
    assert_eq!(without_first[0].bytes, second.as_bytes());

    let manager = repo.get_required_concept_by_iri("http://junit#manager", None).unwrap();
    assert_eq!(manager.parent_iri.as_deref(), Some("http://junit#employee"));
}

#[test]
fn import_requires_public_privileges() {
    let (repo, _, auth) = repository(true);
    let adder = User::new("adder");
    auth.set_privileges(&adder, [Privilege::OntologyAdd]);
    let err = repo
        .import_file_data(SCHEMA.as_bytes(), DOC, None, &adder)
        .unwrap_err();
    assert!(matches!(err, OntologyError::AccessDenied { .. }));
    assert!(!repo.is_ontology_defined(DOC).unwrap());

    auth.set_privileges(&adder, [Privilege::OntologyAdd, Privilege::OntologyPublish]);
    assert!(repo.import_file_data(SCHEMA.as_bytes(), DOC, None, &adder).is_ok());
}

#[test]
fn import_failures_store_nothing() {
    let (repo, _, _) = repository(true);
    let err = repo
        .import_file_data(b"{ not json", DOC, None, &User::system())
        .unwrap_err();
    assert!(matches!(err, OntologyError::ImportFailure { .. }));
    assert!(!repo.is_ontology_defined(DOC).unwrap());

    let (no_parser, _, _) = repository(false);
    assert!(matches!(
        no_parser.import_file_data(SCHEMA.as_bytes(), DOC, None, &User::system()),
        Err(OntologyError::InvalidArgument(_))
    ));

    let unknown_domain = r#"{ "properties": [ { "iri": "http://junit#p", "dataType": "string", "domainIris": ["http://junit#nowhere"] } ] }"#;
    assert!(matches!(
        repo.import_file_data(unknown_domain.as_bytes(), DOC, None, &User::system()),
        Err(OntologyError::RequiredElementMissing { .. })
    ));
    assert!(!repo.is_ontology_defined(DOC).unwrap());
}

#[test]
fn import_file_reads_glyphs_next_to_the_document() {
    let (repo, _, _) = repository(true);
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("robot.png"), b"\x89PNG-robot").unwrap();
    let path = dir.path().join("robots.json");
    std::fs::write(
        &path,
        r#"{ "concepts": [
              { "iri": "http://junit#robot", "glyphIconFileName": "robot.png" },
              { "iri": "http://junit#drone", "glyphIconFileName": "missing.png" } ] }"#,
    )
    .unwrap();

    repo.import_file(&path, "http://junit/robots.json", &User::system())
        .unwrap();
    let robot = repo.get_required_concept_by_iri("http://junit#robot", None).unwrap();
    assert_eq!(robot.glyph_icon.as_deref(), Some(&b"\x89PNG-robot"[..]));
    let drone = repo.get_required_concept_by_iri("http://junit#drone", None).unwrap();
    assert!(drone.glyph_icon.is_none());

    let missing = repo.import_file(&dir.path().join("absent.json"), "http://junit/absent.json", &User::system());
    assert!(matches!(missing, Err(OntologyError::ImportFailure { .. })));
}

/// Counts flushes on top of an in-memory graph.
#[derive(Default)]
struct CountingGraph {
    inner: InMemoryGraph,
    flushes: AtomicUsize,
}

impl Graph for CountingGraph {
    fn get_vertex(&self, id: &str, authorizations: &Authorizations) -> GraphResult<Option<Vertex>> {
        self.inner.get_vertex(id, authorizations)
    }

    fn get_vertices_with_prefix(&self, prefix: &str, authorizations: &Authorizations) -> GraphResult<Vec<Vertex>> {
        self.inner.get_vertices_with_prefix(prefix, authorizations)
    }

    fn add_vertex(&self, id: &str, visibility: Visibility) -> GraphResult<Vertex> {
        self.inner.add_vertex(id, visibility)
    }

    fn set_property(&self, vertex_id: &str, property: Property) -> GraphResult<()> {
        self.inner.set_property(vertex_id, property)
    }

    fn soft_delete_property(&self, vertex_id: &str, key: &str, name: &str) -> GraphResult<()> {
        self.inner.soft_delete_property(vertex_id, key, name)
    }

    fn alter_vertex_visibility(&self, vertex_id: &str, visibility: Visibility) -> GraphResult<()> {
        self.inner.alter_vertex_visibility(vertex_id, visibility)
    }

    fn soft_delete_vertex(&self, vertex_id: &str) -> GraphResult<()> {
        self.inner.soft_delete_vertex(vertex_id)
    }

    fn get_edge(&self, id: &str, authorizations: &Authorizations) -> GraphResult<Option<Edge>> {
        self.inner.get_edge(id, authorizations)
    }

    fn get_or_create_edge(&self, edge: EdgeBuilder) -> GraphResult<Edge> {
        self.inner.get_or_create_edge(edge)
    }

    fn delete_edge(&self, id: &str) -> GraphResult<bool> {
        self.inner.delete_edge(id)
    }

    fn soft_delete_edge(&self, id: &str) -> GraphResult<()> {
        self.inner.soft_delete_edge(id)
    }

    fn edges(
        &self,
        vertex_id: &str,
        direction: Direction,
        label: Option<&str>,
        authorizations: &Authorizations,
    ) -> GraphResult<Vec<Edge>> {
        self.inner.edges(vertex_id, direction, label, authorizations)
    }

    fn define_property(&self, definition: PropertyDefinition) -> GraphResult<()> {
        self.inner.define_property(definition)
    }

    fn is_property_defined(&self, name: &str) -> bool {
        self.inner.is_property_defined(name)
    }

    fn property_definition(&self, name: &str) -> Option<PropertyDefinition> {
        self.inner.property_definition(name)
    }

    fn flush(&self) -> GraphResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.flush()
    }
}

#[test]
fn import_flushes_the_graph_once() {
    let graph = Arc::new(CountingGraph::default());
    let auth = Arc::new(InMemoryAuthorizationRepository::new());
    let repo = OntologyRepository::builder(graph.clone(), AuthorizationGate::new(auth.clone(), auth))
        .parser(Arc::new(JsonSchemaParser))
        .build()
        .expect("bootstrap");

    let before = graph.flushes.load(Ordering::SeqCst);
    repo.import_file_data(SCHEMA.as_bytes(), DOC, None, &User::system())
        .unwrap();
    assert_eq!(graph.flushes.load(Ordering::SeqCst), before + 1);
    assert!(repo.get_concept_by_iri("http://junit#employee", None).unwrap().is_some());

    // a single write outside an import still flushes on its own
    let person = repo.get_required_concept_by_iri("http://junit#person", None).unwrap();
    repo.update_concept(
        &person,
        &ontograph_ontology::ConceptUpdate {
            display_name: Some("Human".into()),
            ..Default::default()
        },
        Some(&User::system()),
        None,
    )
    .unwrap();
    assert_eq!(graph.flushes.load(Ordering::SeqCst), before + 2);
}
