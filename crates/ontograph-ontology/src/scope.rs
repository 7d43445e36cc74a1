//! Public vs. workspace scope: vertex identity, visibility translation,
//! sandbox status and the public/overlay merge.
//!
//! An IRI maps to at most one public vertex (`prefix + iri`) and, per
//! workspace, one overlay vertex (`prefix + sha256(workspace + iri)`). Reads
//! group both by IRI and combine them with the pure `merge_*` functions below.

use crate::model::{Concept, ElementKind, OntologyProperty, Relationship, SandboxStatus};
use crate::vocab::VISIBILITY_STRING;
use ontograph_graph::Visibility;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Deterministic vertex id for an element in a scope.
pub fn vertex_id(kind: ElementKind, iri: &str, workspace: Option<&str>) -> String {
    match workspace {
        None => format!("{}{}", kind.id_prefix(), iri),
        Some(ws) => format!("{}{}", kind.id_prefix(), sha256_hex(format!("{ws}{iri}"))),
    }
}

/// Overlay id used once a workspace element has been published: its
/// original vertex is public now and must not receive workspace edits.
pub fn overlay_vertex_id(kind: ElementKind, iri: &str, workspace: &str) -> String {
    format!(
        "{}{}",
        kind.id_prefix(),
        sha256_hex(format!("overlay:{workspace}{iri}"))
    )
}

/// Structured form of an element's visibility: the ontology source label
/// plus the workspaces confining it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityDescriptor {
    pub source: String,
    pub workspaces: BTreeSet<String>,
}

impl Default for VisibilityDescriptor {
    fn default() -> Self {
        Self::public()
    }
}

impl VisibilityDescriptor {
    pub fn public() -> Self {
        Self {
            source: VISIBILITY_STRING.to_string(),
            workspaces: BTreeSet::new(),
        }
    }

    pub fn for_scope(workspace: Option<&str>) -> Self {
        let mut descriptor = Self::public();
        if let Some(ws) = workspace {
            descriptor.workspaces.insert(ws.to_string());
        }
        descriptor
    }

    pub fn from_visibility(visibility: &Visibility) -> Self {
        Self {
            source: VISIBILITY_STRING.to_string(),
            workspaces: visibility
                .labels()
                .filter(|l| *l != VISIBILITY_STRING)
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn to_visibility(&self) -> Visibility {
        Visibility::new(std::iter::once(self.source.clone()).chain(self.workspaces.iter().cloned()))
    }

    pub fn is_public(&self) -> bool {
        self.workspaces.is_empty()
    }

    pub fn is_confined_to(&self, workspace: &str) -> bool {
        self.workspaces.contains(workspace)
    }

    pub fn without_workspace(&self, workspace: &str) -> Self {
        let mut out = self.clone();
        out.workspaces.remove(workspace);
        out
    }
}

pub fn resolve_sandbox_status(
    visibility: &VisibilityDescriptor,
    workspace: Option<&str>,
    has_public_counterpart: bool,
) -> SandboxStatus {
    if visibility.is_public() {
        return SandboxStatus::Public;
    }
    if has_public_counterpart {
        return SandboxStatus::PublicChanged;
    }
    match workspace {
        Some(ws) if visibility.is_confined_to(ws) => SandboxStatus::Private,
        _ => {
            tracing::debug!(?visibility, ?workspace, "element confined to a foreign workspace");
            SandboxStatus::Private
        }
    }
}

// ============================================================================
// Merge
// ============================================================================

fn pick<T: Clone>(overlay: &Option<T>, public: &Option<T>) -> Option<T> {
    overlay.clone().or_else(|| public.clone())
}

fn pick_list<T: Clone>(overlay: &[T], public: &[T]) -> Vec<T> {
    if overlay.is_empty() {
        public.to_vec()
    } else {
        overlay.to_vec()
    }
}

/// Combine the public element and the workspace overlay for one IRI.
///
/// Overlay display fields win field by field; structure (parent, attachments)
/// comes from the public element unless the overlay defines its own.
pub fn merge_concept(
    public: Option<Concept>,
    overlay: Option<Concept>,
    workspace: Option<&str>,
) -> Option<Concept> {
    match (public, overlay) {
        (None, None) => None,
        (Some(mut p), None) => {
            p.sandbox_status = resolve_sandbox_status(&p.visibility, workspace, false);
            Some(p)
        }
        (None, Some(mut o)) => {
            o.sandbox_status = resolve_sandbox_status(&o.visibility, workspace, false);
            Some(o)
        }
        (Some(p), Some(o)) => Some(Concept {
            iri: o.iri.clone(),
            parent_iri: pick(&o.parent_iri, &p.parent_iri),
            display_name: pick(&o.display_name, &p.display_name),
            display_type: pick(&o.display_type, &p.display_type),
            color: pick(&o.color, &p.color),
            glyph_icon: pick(&o.glyph_icon, &p.glyph_icon),
            title_formula: pick(&o.title_formula, &p.title_formula),
            subtitle_formula: pick(&o.subtitle_formula, &p.subtitle_formula),
            time_formula: pick(&o.time_formula, &p.time_formula),
            intents: pick_list(&o.intents, &p.intents),
            user_visible: o.user_visible.or(p.user_visible),
            searchable: o.searchable.or(p.searchable),
            addable: o.addable.or(p.addable),
            updateable: o.updateable.or(p.updateable),
            deleteable: o.deleteable.or(p.deleteable),
            properties: pick_list(&o.properties, &p.properties),
            sandbox_status: resolve_sandbox_status(&o.visibility, workspace, true),
            handle: crate::model::ElementHandle {
                public_vertex_id: p.handle.public_vertex_id.clone(),
                sandbox_vertex_id: o.handle.sandbox_vertex_id.clone(),
            },
            visibility: o.visibility,
        }),
    }
}

pub fn merge_relationship(
    public: Option<Relationship>,
    overlay: Option<Relationship>,
    workspace: Option<&str>,
) -> Option<Relationship> {
    match (public, overlay) {
        (None, None) => None,
        (Some(mut p), None) => {
            p.sandbox_status = resolve_sandbox_status(&p.visibility, workspace, false);
            Some(p)
        }
        (None, Some(mut o)) => {
            o.sandbox_status = resolve_sandbox_status(&o.visibility, workspace, false);
            Some(o)
        }
        (Some(p), Some(o)) => Some(Relationship {
            iri: o.iri.clone(),
            parent_iri: pick(&o.parent_iri, &p.parent_iri),
            display_name: pick(&o.display_name, &p.display_name),
            color: pick(&o.color, &p.color),
            title_formula: pick(&o.title_formula, &p.title_formula),
            subtitle_formula: pick(&o.subtitle_formula, &p.subtitle_formula),
            time_formula: pick(&o.time_formula, &p.time_formula),
            intents: pick_list(&o.intents, &p.intents),
            domain_concept_iris: pick_list(&o.domain_concept_iris, &p.domain_concept_iris),
            range_concept_iris: pick_list(&o.range_concept_iris, &p.range_concept_iris),
            inverse_of_iris: pick_list(&o.inverse_of_iris, &p.inverse_of_iris),
            user_visible: o.user_visible.or(p.user_visible),
            updateable: o.updateable.or(p.updateable),
            deleteable: o.deleteable.or(p.deleteable),
            properties: pick_list(&o.properties, &p.properties),
            sandbox_status: resolve_sandbox_status(&o.visibility, workspace, true),
            handle: crate::model::ElementHandle {
                public_vertex_id: p.handle.public_vertex_id.clone(),
                sandbox_vertex_id: o.handle.sandbox_vertex_id.clone(),
            },
            visibility: o.visibility,
        }),
    }
}

pub fn merge_property(
    public: Option<OntologyProperty>,
    overlay: Option<OntologyProperty>,
    workspace: Option<&str>,
) -> Option<OntologyProperty> {
    match (public, overlay) {
        (None, None) => None,
        (Some(mut p), None) => {
            p.sandbox_status = resolve_sandbox_status(&p.visibility, workspace, false);
            Some(p)
        }
        (None, Some(mut o)) => {
            o.sandbox_status = resolve_sandbox_status(&o.visibility, workspace, false);
            Some(o)
        }
        (Some(p), Some(o)) => Some(OntologyProperty {
            iri: o.iri.clone(),
            // The data type is fixed by whichever vertex was created first.
            data_type: p.data_type,
            display_name: pick(&o.display_name, &p.display_name),
            display_type: pick(&o.display_type, &p.display_type),
            property_group: pick(&o.property_group, &p.property_group),
            validation_formula: pick(&o.validation_formula, &p.validation_formula),
            display_formula: pick(&o.display_formula, &p.display_formula),
            dependent_property_iris: pick_list(
                &o.dependent_property_iris,
                &p.dependent_property_iris,
            ),
            possible_values: pick(&o.possible_values, &p.possible_values),
            text_index_hints: if o.text_index_hints.is_empty() {
                p.text_index_hints.clone()
            } else {
                o.text_index_hints.clone()
            },
            intents: pick_list(&o.intents, &p.intents),
            user_visible: o.user_visible.or(p.user_visible),
            searchable: o.searchable.or(p.searchable),
            addable: o.addable.or(p.addable),
            sortable: o.sortable.or(p.sortable),
            updateable: o.updateable.or(p.updateable),
            deleteable: o.deleteable.or(p.deleteable),
            boost: o.boost.or(p.boost),
            table_property_iris: pick_list(&o.table_property_iris, &p.table_property_iris),
            sandbox_status: resolve_sandbox_status(&o.visibility, workspace, true),
            handle: crate::model::ElementHandle {
                public_vertex_id: p.handle.public_vertex_id.clone(),
                sandbox_vertex_id: o.handle.sandbox_vertex_id.clone(),
            },
            visibility: o.visibility,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementHandle;

    fn concept(iri: &str, workspace: Option<&str>) -> Concept {
        let vertex = vertex_id(ElementKind::Concept, iri, workspace);
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
            intents: Vec::new(),
            user_visible: None,
            searchable: None,
            addable: None,
            updateable: None,
            deleteable: None,
            properties: Vec::new(),
            sandbox_status: SandboxStatus::Public,
            visibility: VisibilityDescriptor::for_scope(workspace),
            handle: ElementHandle {
                public_vertex_id: workspace.is_none().then(|| vertex.clone()),
                sandbox_vertex_id: workspace.map(|_| vertex),
            },
        }
    }

    #[test]
    fn vertex_ids_are_deterministic_and_scoped() {
        let public = vertex_id(ElementKind::Concept, "iri", None);
        assert_eq!(public, "ontology_concept_iri");
        let a = vertex_id(ElementKind::Concept, "iri", Some("ws1"));
        let b = vertex_id(ElementKind::Concept, "iri", Some("ws1"));
        let c = vertex_id(ElementKind::Concept, "iri", Some("ws2"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, public);
        assert!(a.starts_with("ontology_concept_"));

        let overlay = overlay_vertex_id(ElementKind::Concept, "iri", "ws1");
        assert_ne!(overlay, a);
        assert_ne!(overlay, overlay_vertex_id(ElementKind::Concept, "iri", "ws2"));
        assert!(overlay.starts_with("ontology_concept_"));
    }

    #[test]
    fn descriptor_round_trips_through_visibility() {
        let d = VisibilityDescriptor::for_scope(Some("ws"));
        let v = d.to_visibility();
        assert!(v.contains("ontology") && v.contains("ws"));
        assert_eq!(VisibilityDescriptor::from_visibility(&v), d);
        assert!(d.without_workspace("ws").is_public());
    }

    #[test]
    fn sandbox_status_resolution() {
        let public = VisibilityDescriptor::public();
        let private = VisibilityDescriptor::for_scope(Some("ws"));
        assert_eq!(resolve_sandbox_status(&public, Some("ws"), false), SandboxStatus::Public);
        assert_eq!(resolve_sandbox_status(&private, Some("ws"), false), SandboxStatus::Private);
        assert_eq!(
            resolve_sandbox_status(&private, Some("ws"), true),
            SandboxStatus::PublicChanged
        );
    }

    #[test]
    fn overlay_display_fields_win_and_structure_falls_back() {
        let mut public = concept("c", None);
        public.display_name = Some("Public".into());
        public.color = Some("red".into());
        public.parent_iri = Some("parent".into());
        let mut overlay = concept("c", Some("ws"));
        overlay.display_name = Some("Sandbox".into());

        let merged = merge_concept(Some(public), Some(overlay), Some("ws")).unwrap();
        assert_eq!(merged.display_name.as_deref(), Some("Sandbox"));
        assert_eq!(merged.color.as_deref(), Some("red"));
        assert_eq!(merged.parent_iri.as_deref(), Some("parent"));
        assert_eq!(merged.sandbox_status, SandboxStatus::PublicChanged);
        assert!(merged.handle.public_vertex_id.is_some());
        assert!(merged.handle.sandbox_vertex_id.is_some());
    }

    #[test]
    fn single_sided_merge_sets_status() {
        let private = merge_concept(None, Some(concept("c", Some("ws"))), Some("ws")).unwrap();
        assert_eq!(private.sandbox_status, SandboxStatus::Private);
        let public = merge_concept(Some(concept("c", None)), None, Some("ws")).unwrap();
        assert_eq!(public.sandbox_status, SandboxStatus::Public);
        assert!(merge_concept(None, None, None).is_none());
    }
}
