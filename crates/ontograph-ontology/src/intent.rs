//! Intent lookups: "the concept that plays role X".
//!
//! A configured override wins; otherwise the element carrying the intent is
//! searched for, and more than one match is an error.

use crate::error::{OntologyError, Result};
use crate::model::{Concept, OntologyElement, OntologyProperty, Relationship};
use crate::repository::OntologyRepository;
use std::collections::BTreeMap;

fn by_intent<T: OntologyElement>(
    elements: &[T],
    intent: &str,
    overrides: &BTreeMap<String, String>,
) -> Result<Option<T>> {
    if let Some(iri) = overrides.get(intent) {
        return Ok(elements.iter().find(|e| e.iri() == iri).cloned());
    }
    let mut matches = elements
        .iter()
        .filter(|e| e.intents().iter().any(|i| i == intent));
    let first = matches.next();
    if matches.next().is_some() {
        return Err(OntologyError::Corruption(format!(
            "multiple {} elements have intent {intent}",
            T::KIND
        )));
    }
    Ok(first.cloned())
}

fn required<T: OntologyElement>(found: Option<T>, intent: &str) -> Result<T> {
    found.ok_or_else(|| OntologyError::missing(T::KIND, format!("intent:{intent}")))
}

impl OntologyRepository {
    pub fn get_concept_by_intent(&self, intent: &str, workspace: Option<&str>) -> Result<Option<Concept>> {
        by_intent(
            &self.get_concepts_with_properties(workspace)?,
            intent,
            &self.config.intents.concept,
        )
    }

    pub fn get_concept_iri_by_intent(&self, intent: &str, workspace: Option<&str>) -> Result<Option<String>> {
        Ok(self.get_concept_by_intent(intent, workspace)?.map(|c| c.iri))
    }

    pub fn get_required_concept_by_intent(&self, intent: &str, workspace: Option<&str>) -> Result<Concept> {
        required(self.get_concept_by_intent(intent, workspace)?, intent)
    }

    pub fn get_required_concept_iri_by_intent(&self, intent: &str, workspace: Option<&str>) -> Result<String> {
        Ok(self.get_required_concept_by_intent(intent, workspace)?.iri)
    }

    pub fn get_relationship_by_intent(
        &self,
        intent: &str,
        workspace: Option<&str>,
    ) -> Result<Option<Relationship>> {
        by_intent(
            &self.get_relationships(workspace)?,
            intent,
            &self.config.intents.relationship,
        )
    }

    pub fn get_relationship_iri_by_intent(
        &self,
        intent: &str,
        workspace: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(self.get_relationship_by_intent(intent, workspace)?.map(|r| r.iri))
    }

    pub fn get_required_relationship_by_intent(
        &self,
        intent: &str,
        workspace: Option<&str>,
    ) -> Result<Relationship> {
        required(self.get_relationship_by_intent(intent, workspace)?, intent)
    }

    pub fn get_required_relationship_iri_by_intent(
        &self,
        intent: &str,
        workspace: Option<&str>,
    ) -> Result<String> {
        Ok(self.get_required_relationship_by_intent(intent, workspace)?.iri)
    }

    pub fn get_property_by_intent(
        &self,
        intent: &str,
        workspace: Option<&str>,
    ) -> Result<Option<OntologyProperty>> {
        by_intent(
            &self.get_properties(workspace)?,
            intent,
            &self.config.intents.property,
        )
    }

    pub fn get_property_iri_by_intent(&self, intent: &str, workspace: Option<&str>) -> Result<Option<String>> {
        Ok(self.get_property_by_intent(intent, workspace)?.map(|p| p.iri))
    }

    pub fn get_required_property_by_intent(
        &self,
        intent: &str,
        workspace: Option<&str>,
    ) -> Result<OntologyProperty> {
        required(self.get_property_by_intent(intent, workspace)?, intent)
    }

    pub fn get_required_property_iri_by_intent(&self, intent: &str, workspace: Option<&str>) -> Result<String> {
        Ok(self.get_required_property_by_intent(intent, workspace)?.iri)
    }

    /// Every property carrying `intent`; no uniqueness requirement.
    pub fn get_properties_by_intent(
        &self,
        intent: &str,
        workspace: Option<&str>,
    ) -> Result<Vec<OntologyProperty>> {
        Ok(self
            .get_properties(workspace)?
            .iter()
            .filter(|p| p.intents.iter().any(|i| i == intent))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementHandle, SandboxStatus};
    use crate::scope::VisibilityDescriptor;

    fn concept(iri: &str, intents: &[&str]) -> Concept {
        Concept {
            iri: iri.to_string(),
            parent_iri: None,
            display_name: None,
            display_type: None,
            color: None,
            glyph_icon: None,
            title_formula: None,
            subtitle_formula: None,
            time_formula: None,
            intents: intents.iter().map(|s| s.to_string()).collect(),
            user_visible: None,
            searchable: None,
            addable: None,
            updateable: None,
            deleteable: None,
            properties: Vec::new(),
            sandbox_status: SandboxStatus::Public,
            visibility: VisibilityDescriptor::public(),
            handle: ElementHandle::default(),
        }
    }

    #[test]
    fn override_wins_over_search() {
        let list = vec![concept("a", &["person"]), concept("b", &[])];
        let overrides = BTreeMap::from([("person".to_string(), "b".to_string())]);
        assert_eq!(by_intent(&list, "person", &overrides).unwrap().unwrap().iri, "b");
        assert_eq!(
            by_intent(&list, "person", &BTreeMap::new()).unwrap().unwrap().iri,
            "a"
        );
    }

    #[test]
    fn ambiguous_intent_is_corruption() {
        let list = vec![concept("a", &["person"]), concept("b", &["person"])];
        let err = by_intent(&list, "person", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, OntologyError::Corruption(_)));
        assert_eq!(err.status_code(), 500);
        assert!(by_intent(&list, "place", &BTreeMap::new()).unwrap().is_none());
        assert!(required::<Concept>(None, "place").is_err());
    }
}
