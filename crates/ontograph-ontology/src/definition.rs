//! Inputs to get-or-create and update operations.
//!
//! Every `*Update` holds only changeable fields: `Some` overwrites, `None`
//! leaves the stored value alone. Structural inputs (parent, domain/range,
//! owners, dependents) live on the `*Definition` types and are only applied
//! when an element is first created, or through the dedicated repository
//! operations.

use crate::model::{Concept, OntologyProperty, PropertyType, Relationship};
use crate::vocab::{props, VISIBILITY_STRING};
use ontograph_graph::{Property, TextIndexHint, Value, Visibility};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Field writes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldWrite {
    Set(Property),
    /// Remove every value stored under this name.
    Clear(&'static str),
}

fn ontology_visibility() -> Visibility {
    Visibility::new([VISIBILITY_STRING])
}

#[derive(Default)]
struct Writes(Vec<FieldWrite>);

impl Writes {
    fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        self.0.push(FieldWrite::Set(Property::new(
            name,
            value,
            ontology_visibility(),
        )));
    }

    fn text(&mut self, name: &'static str, value: &Option<String>) {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            self.set(name, v);
        }
    }

    fn flag(&mut self, name: &'static str, value: Option<bool>) {
        if let Some(v) = value {
            self.set(name, v);
        }
    }

    fn bytes(&mut self, name: &'static str, value: &Option<Vec<u8>>) {
        if let Some(v) = value {
            self.set(name, v.clone());
        }
    }

    fn intents(&mut self, value: &Option<Vec<String>>) {
        if let Some(intents) = value {
            self.0.push(FieldWrite::Clear(props::INTENT));
            for intent in intents {
                self.0.push(FieldWrite::Set(
                    Property::new(props::INTENT, intent.as_str(), ontology_visibility())
                        .with_key(intent.as_str()),
                ));
            }
        }
    }
}

fn unchanged<T: PartialEq + ?Sized>(new: Option<&T>, current: Option<&T>) -> bool {
    new.map_or(true, |n| Some(n) == current)
}

fn unchanged_text(new: &Option<String>, current: &Option<String>) -> bool {
    let new = new.as_deref().map(str::trim).filter(|v| !v.is_empty());
    unchanged(new, current.as_deref())
}

fn unchanged_intents(new: &Option<Vec<String>>, current: &[String]) -> bool {
    new.as_ref().map_or(true, |n| {
        n.iter().collect::<BTreeSet<_>>() == current.iter().collect::<BTreeSet<_>>()
    })
}

// ============================================================================
// Updates
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConceptUpdate {
    pub display_name: Option<String>,
    pub display_type: Option<String>,
    pub color: Option<String>,
    pub glyph_icon: Option<Vec<u8>>,
    pub title_formula: Option<String>,
    pub subtitle_formula: Option<String>,
    pub time_formula: Option<String>,
    pub intents: Option<Vec<String>>,
    pub user_visible: Option<bool>,
    pub searchable: Option<bool>,
    pub addable: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
}

impl ConceptUpdate {
    pub(crate) fn writes(&self) -> Vec<FieldWrite> {
        let mut w = Writes::default();
        w.text(props::DISPLAY_NAME, &self.display_name);
        w.text(props::DISPLAY_TYPE, &self.display_type);
        w.text(props::COLOR, &self.color);
        w.bytes(props::GLYPH_ICON, &self.glyph_icon);
        w.text(props::TITLE_FORMULA, &self.title_formula);
        w.text(props::SUBTITLE_FORMULA, &self.subtitle_formula);
        w.text(props::TIME_FORMULA, &self.time_formula);
        w.intents(&self.intents);
        w.flag(props::USER_VISIBLE, self.user_visible);
        w.flag(props::SEARCHABLE, self.searchable);
        w.flag(props::ADDABLE, self.addable);
        w.flag(props::UPDATEABLE, self.updateable);
        w.flag(props::DELETEABLE, self.deleteable);
        w.0
    }

    pub(crate) fn is_noop_for(&self, current: &Concept) -> bool {
        unchanged_text(&self.display_name, &current.display_name)
            && unchanged_text(&self.display_type, &current.display_type)
            && unchanged_text(&self.color, &current.color)
            && unchanged(self.glyph_icon.as_ref(), current.glyph_icon.as_ref())
            && unchanged_text(&self.title_formula, &current.title_formula)
            && unchanged_text(&self.subtitle_formula, &current.subtitle_formula)
            && unchanged_text(&self.time_formula, &current.time_formula)
            && unchanged_intents(&self.intents, &current.intents)
            && unchanged(self.user_visible.as_ref(), current.user_visible.as_ref())
            && unchanged(self.searchable.as_ref(), current.searchable.as_ref())
            && unchanged(self.addable.as_ref(), current.addable.as_ref())
            && unchanged(self.updateable.as_ref(), current.updateable.as_ref())
            && unchanged(self.deleteable.as_ref(), current.deleteable.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipUpdate {
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub title_formula: Option<String>,
    pub subtitle_formula: Option<String>,
    pub time_formula: Option<String>,
    pub intents: Option<Vec<String>>,
    pub user_visible: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
}

impl RelationshipUpdate {
    pub(crate) fn writes(&self) -> Vec<FieldWrite> {
        let mut w = Writes::default();
        w.text(props::DISPLAY_NAME, &self.display_name);
        w.text(props::COLOR, &self.color);
        w.text(props::TITLE_FORMULA, &self.title_formula);
        w.text(props::SUBTITLE_FORMULA, &self.subtitle_formula);
        w.text(props::TIME_FORMULA, &self.time_formula);
        w.intents(&self.intents);
        w.flag(props::USER_VISIBLE, self.user_visible);
        w.flag(props::UPDATEABLE, self.updateable);
        w.flag(props::DELETEABLE, self.deleteable);
        w.0
    }

    pub(crate) fn is_noop_for(&self, current: &Relationship) -> bool {
        unchanged_text(&self.display_name, &current.display_name)
            && unchanged_text(&self.color, &current.color)
            && unchanged_text(&self.title_formula, &current.title_formula)
            && unchanged_text(&self.subtitle_formula, &current.subtitle_formula)
            && unchanged_text(&self.time_formula, &current.time_formula)
            && unchanged_intents(&self.intents, &current.intents)
            && unchanged(self.user_visible.as_ref(), current.user_visible.as_ref())
            && unchanged(self.updateable.as_ref(), current.updateable.as_ref())
            && unchanged(self.deleteable.as_ref(), current.deleteable.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyUpdate {
    pub display_name: Option<String>,
    pub display_type: Option<String>,
    pub property_group: Option<String>,
    pub validation_formula: Option<String>,
    pub display_formula: Option<String>,
    pub possible_values: Option<BTreeMap<String, String>>,
    pub intents: Option<Vec<String>>,
    pub user_visible: Option<bool>,
    pub searchable: Option<bool>,
    pub addable: Option<bool>,
    pub sortable: Option<bool>,
    pub updateable: Option<bool>,
    pub deleteable: Option<bool>,
    pub boost: Option<f64>,
}

impl PropertyUpdate {
    pub(crate) fn writes(&self) -> Vec<FieldWrite> {
        let mut w = Writes::default();
        w.text(props::DISPLAY_NAME, &self.display_name);
        w.text(props::DISPLAY_TYPE, &self.display_type);
        w.text(props::PROPERTY_GROUP, &self.property_group);
        w.text(props::VALIDATION_FORMULA, &self.validation_formula);
        w.text(props::DISPLAY_FORMULA, &self.display_formula);
        if let Some(values) = &self.possible_values {
            // A map of strings always encodes.
            let json = serde_json::to_string(values).unwrap_or_default();
            w.set(props::POSSIBLE_VALUES, json);
        }
        w.intents(&self.intents);
        w.flag(props::USER_VISIBLE, self.user_visible);
        w.flag(props::SEARCHABLE, self.searchable);
        w.flag(props::ADDABLE, self.addable);
        w.flag(props::SORTABLE, self.sortable);
        w.flag(props::UPDATEABLE, self.updateable);
        w.flag(props::DELETEABLE, self.deleteable);
        if let Some(boost) = self.boost {
            w.set(props::BOOST, boost);
        }
        w.0
    }

    pub(crate) fn is_noop_for(&self, current: &OntologyProperty) -> bool {
        unchanged_text(&self.display_name, &current.display_name)
            && unchanged_text(&self.display_type, &current.display_type)
            && unchanged_text(&self.property_group, &current.property_group)
            && unchanged_text(&self.validation_formula, &current.validation_formula)
            && unchanged_text(&self.display_formula, &current.display_formula)
            && unchanged(self.possible_values.as_ref(), current.possible_values.as_ref())
            && unchanged_intents(&self.intents, &current.intents)
            && unchanged(self.user_visible.as_ref(), current.user_visible.as_ref())
            && unchanged(self.searchable.as_ref(), current.searchable.as_ref())
            && unchanged(self.addable.as_ref(), current.addable.as_ref())
            && unchanged(self.sortable.as_ref(), current.sortable.as_ref())
            && unchanged(self.updateable.as_ref(), current.updateable.as_ref())
            && unchanged(self.deleteable.as_ref(), current.deleteable.as_ref())
            && unchanged(self.boost.as_ref(), current.boost.as_ref())
    }
}

// ============================================================================
// Definitions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ConceptDefinition {
    pub iri: String,
    pub parent_iri: Option<String>,
    pub fields: ConceptUpdate,
    /// Set by declarative (re-)imports: existing changeable fields are
    /// dropped before `fields` is written.
    pub redeclared: bool,
}

impl ConceptDefinition {
    pub fn new(iri: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            iri: iri.into(),
            parent_iri: None,
            fields: ConceptUpdate {
                display_name: Some(display_name.into()),
                ..ConceptUpdate::default()
            },
            redeclared: false,
        }
    }

    pub fn parent(mut self, parent: &Concept) -> Self {
        self.parent_iri = Some(parent.iri.clone());
        self
    }

    pub fn parent_iri(mut self, parent_iri: impl Into<String>) -> Self {
        self.parent_iri = Some(parent_iri.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.fields.color = Some(color.into());
        self
    }

    pub fn glyph_icon(mut self, icon: Vec<u8>) -> Self {
        self.fields.glyph_icon = Some(icon);
        self
    }

    pub fn fields(mut self, fields: ConceptUpdate) -> Self {
        self.fields = fields;
        self
    }

    pub fn redeclared(mut self) -> Self {
        self.redeclared = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDefinition {
    pub iri: String,
    pub parent_iri: Option<String>,
    pub domain_concept_iris: Vec<String>,
    pub range_concept_iris: Vec<String>,
    pub fields: RelationshipUpdate,
    pub redeclared: bool,
}

impl RelationshipDefinition {
    pub fn new(iri: impl Into<String>) -> Self {
        Self {
            iri: iri.into(),
            parent_iri: None,
            domain_concept_iris: Vec::new(),
            range_concept_iris: Vec::new(),
            fields: RelationshipUpdate::default(),
            redeclared: false,
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.fields.display_name = Some(display_name.into());
        self
    }

    pub fn parent(mut self, parent: &Relationship) -> Self {
        self.parent_iri = Some(parent.iri.clone());
        self
    }

    pub fn parent_iri(mut self, parent_iri: impl Into<String>) -> Self {
        self.parent_iri = Some(parent_iri.into());
        self
    }

    pub fn domain<'a>(mut self, concepts: impl IntoIterator<Item = &'a Concept>) -> Self {
        self.domain_concept_iris
            .extend(concepts.into_iter().map(|c| c.iri.clone()));
        self
    }

    pub fn range<'a>(mut self, concepts: impl IntoIterator<Item = &'a Concept>) -> Self {
        self.range_concept_iris
            .extend(concepts.into_iter().map(|c| c.iri.clone()));
        self
    }

    pub fn domain_iris<S: Into<String>>(mut self, iris: impl IntoIterator<Item = S>) -> Self {
        self.domain_concept_iris.extend(iris.into_iter().map(Into::into));
        self
    }

    pub fn range_iris<S: Into<String>>(mut self, iris: impl IntoIterator<Item = S>) -> Self {
        self.range_concept_iris.extend(iris.into_iter().map(Into::into));
        self
    }

    pub fn fields(mut self, fields: RelationshipUpdate) -> Self {
        self.fields = fields;
        self
    }

    pub fn redeclared(mut self) -> Self {
        self.redeclared = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OntologyPropertyDefinition {
    pub iri: String,
    pub data_type: PropertyType,
    pub concept_iris: Vec<String>,
    pub relationship_iris: Vec<String>,
    /// Table properties that own this property as a column.
    pub extended_data_table_domains: Vec<String>,
    pub text_index_hints: BTreeSet<TextIndexHint>,
    /// `None` leaves existing dependents untouched.
    pub dependent_property_iris: Option<Vec<String>>,
    pub fields: PropertyUpdate,
    pub redeclared: bool,
}

impl OntologyPropertyDefinition {
    /// A definition with every flag enabled, matching declarative defaults.
    pub fn new(
        iri: impl Into<String>,
        display_name: impl Into<String>,
        data_type: PropertyType,
    ) -> Self {
        Self {
            iri: iri.into(),
            data_type,
            concept_iris: Vec::new(),
            relationship_iris: Vec::new(),
            extended_data_table_domains: Vec::new(),
            text_index_hints: BTreeSet::new(),
            dependent_property_iris: None,
            fields: PropertyUpdate {
                display_name: Some(display_name.into()),
                user_visible: Some(true),
                searchable: Some(true),
                addable: Some(true),
                sortable: Some(true),
                updateable: Some(true),
                deleteable: Some(true),
                ..PropertyUpdate::default()
            },
            redeclared: false,
        }
    }

    pub fn concepts<'a>(mut self, concepts: impl IntoIterator<Item = &'a Concept>) -> Self {
        self.concept_iris
            .extend(concepts.into_iter().map(|c| c.iri.clone()));
        self
    }

    pub fn relationships<'a>(
        mut self,
        relationships: impl IntoIterator<Item = &'a Relationship>,
    ) -> Self {
        self.relationship_iris
            .extend(relationships.into_iter().map(|r| r.iri.clone()));
        self
    }

    pub fn text_index_hints(mut self, hints: impl IntoIterator<Item = TextIndexHint>) -> Self {
        self.text_index_hints.extend(hints);
        self
    }

    pub fn dependent_property_iris<S: Into<String>>(
        mut self,
        iris: impl IntoIterator<Item = S>,
    ) -> Self {
        self.dependent_property_iris = Some(iris.into_iter().map(Into::into).collect());
        self
    }

    pub fn user_visible(mut self, visible: bool) -> Self {
        self.fields.user_visible = Some(visible);
        self
    }

    pub fn fields(mut self, fields: PropertyUpdate) -> Self {
        self.fields = fields;
        self
    }

    pub fn redeclared(mut self) -> Self {
        self.redeclared = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_not_written() {
        let update = ConceptUpdate {
            display_name: Some("  ".into()),
            color: Some(" red ".into()),
            ..ConceptUpdate::default()
        };
        let writes = update.writes();
        assert_eq!(writes.len(), 1);
        match &writes[0] {
            FieldWrite::Set(p) => {
                assert_eq!(p.name, props::COLOR);
                assert_eq!(p.value.as_str(), Some("red"));
            }
            other => panic!("unexpected write {other:?}"),
        }
    }

    #[test]
    fn intents_replace_the_whole_set() {
        let update = RelationshipUpdate {
            intents: Some(vec!["a".into(), "b".into()]),
            ..RelationshipUpdate::default()
        };
        let writes = update.writes();
        assert_eq!(writes[0], FieldWrite::Clear(props::INTENT));
        let keys: Vec<_> = writes[1..]
            .iter()
            .filter_map(|w| match w {
                FieldWrite::Set(p) => Some(p.key.clone()),
                FieldWrite::Clear(_) => None,
            })
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn property_definition_defaults_enable_flags() {
        let def = OntologyPropertyDefinition::new("p", "P", PropertyType::Date);
        assert_eq!(def.fields.addable, Some(true));
        assert_eq!(def.fields.deleteable, Some(true));
        assert!(def.dependent_property_iris.is_none());
        let writes = def.fields.writes();
        assert!(writes
            .iter()
            .any(|w| matches!(w, FieldWrite::Set(p) if p.name == props::SEARCHABLE)));
    }
}
