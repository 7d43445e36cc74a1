use ontograph_graph::{Authorizations, Graph, InMemoryGraph};
use ontograph_ontology::vocab::{self, VISIBILITY_STRING};
use ontograph_ontology::{
    AuthorizationGate, InMemoryAuthorizationRepository, OntologyPropertyDefinition,
    OntologyRepository, PropertyType, User,
};
use proptest::prelude::*;
use std::sync::Arc;

const PARENT: &str = "http://junit#fullName";
const PARTS: [&str; 5] = [
    "http://junit#first",
    "http://junit#middle",
    "http://junit#last",
    "http://junit#suffix",
    "http://junit#title",
];

fn repository_with_parts() -> (OntologyRepository, Arc<InMemoryGraph>) {
    let graph = Arc::new(InMemoryGraph::new());
    let auth = Arc::new(InMemoryAuthorizationRepository::new());
    let repo = OntologyRepository::builder(graph.clone(), AuthorizationGate::new(auth.clone(), auth))
        .build()
        .expect("bootstrap");
    let system = User::system();
    for iri in PARTS {
        repo.get_or_create_property(
            &OntologyPropertyDefinition::new(iri, iri, PropertyType::String),
            Some(&system),
            None,
        )
        .expect("create part");
    }
    (repo, graph)
}

fn owned(iris: &[&str]) -> Vec<String> {
    iris.iter().map(|s| s.to_string()).collect()
}

#[test]
fn dependents_keep_declared_order() {
    let (repo, _) = repository_with_parts();
    let system = User::system();
    let parent = repo
        .get_or_create_property(
            &OntologyPropertyDefinition::new(PARENT, "Full name", PropertyType::String)
                .dependent_property_iris([PARTS[2], PARTS[0], PARTS[1]]),
            Some(&system),
            None,
        )
        .unwrap();
    assert_eq!(
        parent.dependent_property_iris,
        owned(&[PARTS[2], PARTS[0], PARTS[1]])
    );
    assert_eq!(
        repo.get_dependent_property_parent(PARTS[0], None).unwrap().map(|p| p.iri),
        Some(PARENT.to_string())
    );
    assert!(repo.get_dependent_property_parent(PARTS[3], None).unwrap().is_none());
}

#[test]
fn shrinking_the_list_removes_trailing_edges() {
    let (repo, graph) = repository_with_parts();
    let system = User::system();
    let parent = repo
        .get_or_create_property(
            &OntologyPropertyDefinition::new(PARENT, "Full name", PropertyType::String)
                .dependent_property_iris(PARTS),
            Some(&system),
            None,
        )
        .unwrap();

    repo.update_property_dependent_iris(&parent, &owned(&[PARTS[4], PARTS[0]]), Some(&system), None)
        .unwrap();
    let updated = repo.get_required_property_by_iri(PARENT, None).unwrap();
    assert_eq!(updated.dependent_property_iris, owned(&[PARTS[4], PARTS[0]]));
    assert!(repo.get_dependent_property_parent(PARTS[2], None).unwrap().is_none());

    let parent_vertex = updated.handle.public_vertex_id.clone().unwrap();
    let auths = Authorizations::new([VISIBILITY_STRING]);
    assert!(graph
        .get_edge(&vocab::dependent_property_edge_id(&parent_vertex, 1), &auths)
        .unwrap()
        .is_some());
    for stale in 2..PARTS.len() {
        assert!(graph
            .get_edge(&vocab::dependent_property_edge_id(&parent_vertex, stale), &auths)
            .unwrap()
            .is_none());
    }
}

#[test]
fn unknown_dependent_fails_without_writing() {
    let (repo, _) = repository_with_parts();
    let system = User::system();
    let parent = repo
        .get_or_create_property(
            &OntologyPropertyDefinition::new(PARENT, "Full name", PropertyType::String)
                .dependent_property_iris([PARTS[0]]),
            Some(&system),
            None,
        )
        .unwrap();
    let result = repo.update_property_dependent_iris(
        &parent,
        &owned(&[PARTS[1], "http://junit#missing"]),
        Some(&system),
        None,
    );
    assert!(result.is_err());
    assert_eq!(
        repo.get_required_property_by_iri(PARENT, None)
            .unwrap()
            .dependent_property_iris,
        owned(&[PARTS[0]])
    );
}

#[test]
fn redeclaring_with_new_dependents_replaces_them() {
    let (repo, _) = repository_with_parts();
    let system = User::system();
    let def = OntologyPropertyDefinition::new(PARENT, "Full name", PropertyType::String);
    repo.get_or_create_property(
        &def.clone().dependent_property_iris([PARTS[0], PARTS[1]]),
        Some(&system),
        None,
    )
    .unwrap();
    let again = repo
        .get_or_create_property(&def.clone().dependent_property_iris([PARTS[3]]), Some(&system), None)
        .unwrap();
    assert_eq!(again.dependent_property_iris, owned(&[PARTS[3]]));

    // no dependents on the definition leaves the stored ones alone
    let untouched = repo.get_or_create_property(&def, Some(&system), None).unwrap();
    assert_eq!(untouched.dependent_property_iris, owned(&[PARTS[3]]));
}

fn dependent_lists() -> impl Strategy<Value = Vec<Vec<&'static str>>> {
    prop::collection::vec(
        prop::sample::subsequence(PARTS.to_vec(), 0..=PARTS.len()).prop_shuffle(),
        1..4,
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn last_written_order_wins(lists in dependent_lists()) {
        let (repo, _) = repository_with_parts();
        let system = User::system();
        let parent = repo
            .get_or_create_property(
                &OntologyPropertyDefinition::new(PARENT, "Full name", PropertyType::String),
                Some(&system),
                None,
            )
            .unwrap();

        for list in &lists {
            repo.update_property_dependent_iris(&parent, &owned(list), Some(&system), None)
                .unwrap();
        }

        let expected = owned(lists.last().unwrap());
        let stored = repo.get_required_property_by_iri(PARENT, None).unwrap();
        prop_assert_eq!(&stored.dependent_property_iris, &expected);
        for part in PARTS {
            let parent_of = repo.get_dependent_property_parent(part, None).unwrap();
            prop_assert_eq!(parent_of.is_some(), expected.iter().any(|e| e == part));
        }
    }
}
