//! Parent / ancestor / descendant traversal over the cached element lists,
//! and subtype expansion of type filters.

use crate::error::{OntologyError, Result};
use crate::model::{Concept, ElementTypeFilter, OntologyElement, Relationship};
use crate::repository::OntologyRepository;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

fn parent_of<T: OntologyElement>(elements: &[T], element: &T) -> Option<T> {
    let parent = element.parent_iri()?;
    elements.iter().find(|e| e.iri() == parent).cloned()
}

/// Walk parents until the root; a revisited IRI is a cycle.
fn ancestors<T: OntologyElement>(elements: &[T], start: &T) -> Result<Vec<T>> {
    let mut seen = HashSet::from([start.iri().to_string()]);
    let mut out = Vec::new();
    let mut current = parent_of(elements, start);
    while let Some(parent) = current {
        if !seen.insert(parent.iri().to_string()) {
            return Err(OntologyError::Corruption(format!(
                "{} hierarchy cycle through {}",
                T::KIND,
                parent.iri()
            )));
        }
        current = parent_of(elements, &parent);
        out.push(parent);
    }
    Ok(out)
}

/// `start` followed by every descendant, breadth first.
fn and_all_children<T: OntologyElement>(elements: &[T], start: &T) -> Vec<T> {
    let mut children: HashMap<&str, Vec<&T>> = HashMap::new();
    for element in elements {
        if let Some(parent) = element.parent_iri() {
            children.entry(parent).or_default().push(element);
        }
    }

    let mut seen = HashSet::from([start.iri()]);
    let mut out = vec![start.clone()];
    let mut queue = VecDeque::from([start.iri()]);
    while let Some(iri) = queue.pop_front() {
        for child in children.get(iri).into_iter().flatten() {
            if seen.insert(child.iri()) {
                out.push((*child).clone());
                queue.push_back(child.iri());
            }
        }
    }
    out
}

fn child_list<T: OntologyElement>(elements: &[T], parent: &T) -> Vec<T> {
    elements
        .iter()
        .filter(|e| e.parent_iri() == Some(parent.iri()))
        .cloned()
        .collect()
}

impl OntologyRepository {
    pub fn get_parent_concept(&self, concept: &Concept, workspace: Option<&str>) -> Result<Option<Concept>> {
        Ok(parent_of(&self.get_concepts_with_properties(workspace)?, concept))
    }

    pub fn get_child_concepts(&self, concept: &Concept, workspace: Option<&str>) -> Result<Vec<Concept>> {
        Ok(child_list(&self.get_concepts_with_properties(workspace)?, concept))
    }

    /// Ancestors of `concept`, nearest first, without the concept itself.
    pub fn get_ancestor_concepts(&self, concept: &Concept, workspace: Option<&str>) -> Result<Vec<Concept>> {
        ancestors(&self.get_concepts_with_properties(workspace)?, concept)
    }

    pub fn get_concept_and_ancestors(&self, concept: &Concept, workspace: Option<&str>) -> Result<Vec<Concept>> {
        let mut out = vec![concept.clone()];
        out.extend(self.get_ancestor_concepts(concept, workspace)?);
        Ok(out)
    }

    pub fn get_concept_and_all_children(&self, concept: &Concept, workspace: Option<&str>) -> Result<Vec<Concept>> {
        Ok(and_all_children(&self.get_concepts_with_properties(workspace)?, concept))
    }

    pub fn get_concept_and_all_children_by_iri(&self, iri: &str, workspace: Option<&str>) -> Result<Vec<Concept>> {
        let concept = self.get_required_concept_by_iri(iri, workspace)?;
        self.get_concept_and_all_children(&concept, workspace)
    }

    pub fn get_parent_relationship(
        &self,
        relationship: &Relationship,
        workspace: Option<&str>,
    ) -> Result<Option<Relationship>> {
        Ok(parent_of(&self.get_relationships(workspace)?, relationship))
    }

    pub fn get_child_relationships(
        &self,
        relationship: &Relationship,
        workspace: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        Ok(child_list(&self.get_relationships(workspace)?, relationship))
    }

    pub fn get_ancestor_relationships(
        &self,
        relationship: &Relationship,
        workspace: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        ancestors(&self.get_relationships(workspace)?, relationship)
    }

    pub fn get_relationship_and_ancestors(
        &self,
        relationship: &Relationship,
        workspace: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        let mut out = vec![relationship.clone()];
        out.extend(self.get_ancestor_relationships(relationship, workspace)?);
        Ok(out)
    }

    pub fn get_relationship_and_all_children(
        &self,
        relationship: &Relationship,
        workspace: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        Ok(and_all_children(&self.get_relationships(workspace)?, relationship))
    }

    pub fn get_relationship_and_all_children_by_iri(
        &self,
        iri: &str,
        workspace: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        let relationship = self.get_required_relationship_by_iri(iri, workspace)?;
        self.get_relationship_and_all_children(&relationship, workspace)
    }

    /// Concept IRIs matched by `filters`, widened to subtypes where asked.
    pub fn expand_concept_type_filters(
        &self,
        filters: &[ElementTypeFilter],
        workspace: Option<&str>,
    ) -> Result<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        for filter in filters {
            if filter.include_child_nodes {
                out.extend(
                    self.get_concept_and_all_children_by_iri(&filter.iri, workspace)?
                        .into_iter()
                        .map(|c| c.iri),
                );
            } else {
                out.insert(self.get_required_concept_by_iri(&filter.iri, workspace)?.iri);
            }
        }
        Ok(out)
    }

    /// Relationship IRIs matched by `filters`, widened to subtypes where asked.
    pub fn expand_edge_label_filters(
        &self,
        filters: &[ElementTypeFilter],
        workspace: Option<&str>,
    ) -> Result<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        for filter in filters {
            if filter.include_child_nodes {
                out.extend(
                    self.get_relationship_and_all_children_by_iri(&filter.iri, workspace)?
                        .into_iter()
                        .map(|r| r.iri),
                );
            } else {
                out.insert(
                    self.get_required_relationship_by_iri(&filter.iri, workspace)?
                        .iri,
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementHandle, SandboxStatus};
    use crate::scope::VisibilityDescriptor;

    fn relationship(iri: &str, parent: Option<&str>) -> Relationship {
        Relationship {
            iri: iri.to_string(),
            parent_iri: parent.map(str::to_string),
            display_name: None,
            color: None,
            title_formula: None,
            subtitle_formula: None,
            time_formula: None,
            intents: Vec::new(),
            domain_concept_iris: Vec::new(),
            range_concept_iris: Vec::new(),
            inverse_of_iris: Vec::new(),
            user_visible: None,
            updateable: None,
            deleteable: None,
            properties: Vec::new(),
            sandbox_status: SandboxStatus::Public,
            visibility: VisibilityDescriptor::public(),
            handle: ElementHandle::default(),
        }
    }

    #[test]
    fn ancestors_nearest_first() {
        let list = vec![
            relationship("top", None),
            relationship("a", Some("top")),
            relationship("b", Some("a")),
        ];
        let iris: Vec<_> = ancestors(&list, &list[2])
            .unwrap()
            .into_iter()
            .map(|r| r.iri)
            .collect();
        assert_eq!(iris, vec!["a", "top"]);
        assert!(ancestors(&list, &list[0]).unwrap().is_empty());
    }

    #[test]
    fn cycles_fail_fast() {
        let list = vec![relationship("a", Some("b")), relationship("b", Some("a"))];
        assert!(matches!(
            ancestors(&list, &list[0]),
            Err(OntologyError::Corruption(_))
        ));
        // descendant walk terminates on the same data
        let all = and_all_children(&list, &list[0]);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn children_include_start_and_all_levels() {
        let list = vec![
            relationship("top", None),
            relationship("a", Some("top")),
            relationship("b", Some("a")),
            relationship("c", Some("top")),
            relationship("x", None),
        ];
        let iris: BTreeSet<_> = and_all_children(&list, &list[0])
            .into_iter()
            .map(|r| r.iri)
            .collect();
        assert_eq!(iris, ["a", "b", "c", "top"].map(String::from).into());
        assert_eq!(child_list(&list, &list[0]).len(), 2);
    }
}
