//! In-memory property graph with optional JSON snapshot persistence.
//!
//! All state sits behind one `parking_lot::RwLock`, so every single-element
//! mutation is atomic. Property definitions live in a `DashMap` because they
//! are read on hot paths without touching the element lock.

use crate::{
    Authorizations, Direction, Edge, EdgeBuilder, Graph, GraphError, GraphResult, Property,
    PropertyDefinition, Vertex, Visibility,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

// ============================================================================
// Stored state
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVertex {
    vertex: Vertex,
    #[serde(default)]
    soft_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEdge {
    edge: Edge,
    #[serde(default)]
    soft_deleted: bool,
}

#[derive(Debug, Default)]
struct GraphData {
    vertices: BTreeMap<String, StoredVertex>,
    edges: BTreeMap<String, StoredEdge>,
    out_edges: HashMap<String, BTreeSet<String>>,
    in_edges: HashMap<String, BTreeSet<String>>,
}

impl GraphData {
    fn live_vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices
            .get(id)
            .filter(|s| !s.soft_deleted)
            .map(|s| &s.vertex)
    }

    fn visible_vertex(&self, id: &str, authorizations: &Authorizations) -> Option<Vertex> {
        self.live_vertex(id)
            .filter(|v| v.visibility.is_visible_to(authorizations))
            .map(|v| visible_copy(v, authorizations))
    }

    fn live_vertex_mut(&mut self, id: &str) -> GraphResult<&mut Vertex> {
        self.vertices
            .get_mut(id)
            .filter(|s| !s.soft_deleted)
            .map(|s| &mut s.vertex)
            .ok_or_else(|| GraphError::VertexNotFound(id.to_string()))
    }

    fn index_edge(&mut self, edge: &Edge) {
        self.out_edges
            .entry(edge.out_vertex_id.clone())
            .or_default()
            .insert(edge.id.clone());
        self.in_edges
            .entry(edge.in_vertex_id.clone())
            .or_default()
            .insert(edge.id.clone());
    }

    fn unindex_edge(&mut self, edge: &Edge) {
        if let Some(ids) = self.out_edges.get_mut(&edge.out_vertex_id) {
            ids.remove(&edge.id);
        }
        if let Some(ids) = self.in_edges.get_mut(&edge.in_vertex_id) {
            ids.remove(&edge.id);
        }
    }
}

/// Copy of a vertex with the properties the reader cannot see removed.
fn visible_copy(vertex: &Vertex, authorizations: &Authorizations) -> Vertex {
    Vertex {
        id: vertex.id.clone(),
        visibility: vertex.visibility.clone(),
        properties: vertex
            .properties
            .iter()
            .filter(|p| p.visibility.is_visible_to(authorizations))
            .cloned()
            .collect(),
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphSnapshot {
    vertices: Vec<StoredVertex>,
    edges: Vec<StoredEdge>,
    property_definitions: Vec<PropertyDefinition>,
}

// ============================================================================
// InMemoryGraph
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryGraph {
    data: RwLock<GraphData>,
    definitions: DashMap<String, PropertyDefinition>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryGraph {
    /// A graph that never touches the filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph backed by a JSON snapshot at `path`.
    ///
    /// An existing snapshot is loaded; a missing one starts empty and is
    /// created on the first [`Graph::flush`].
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref().to_path_buf();
        let graph = Self {
            snapshot_path: Some(path.clone()),
            ..Self::default()
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no graph snapshot, starting empty");
            return Ok(graph);
        }

        let raw = std::fs::read(&path).map_err(|e| GraphError::Snapshot {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let snapshot: GraphSnapshot =
            serde_json::from_slice(&raw).map_err(|e| GraphError::Encoding(e.to_string()))?;

        {
            let mut data = graph.data.write();
            for stored in snapshot.vertices {
                data.vertices.insert(stored.vertex.id.clone(), stored);
            }
            for stored in snapshot.edges {
                data.index_edge(&stored.edge);
                data.edges.insert(stored.edge.id.clone(), stored);
            }
            tracing::info!(
                path = %path.display(),
                vertices = data.vertices.len(),
                edges = data.edges.len(),
                "loaded graph snapshot"
            );
        }
        for definition in snapshot.property_definitions {
            graph.definitions.insert(definition.name.clone(), definition);
        }

        Ok(graph)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Number of live (not soft-deleted) vertices, regardless of visibility.
    pub fn vertex_count(&self) -> usize {
        self.data
            .read()
            .vertices
            .values()
            .filter(|s| !s.soft_deleted)
            .count()
    }

    /// Number of live edges, regardless of visibility.
    pub fn edge_count(&self) -> usize {
        self.data
            .read()
            .edges
            .values()
            .filter(|s| !s.soft_deleted)
            .count()
    }

    fn write_snapshot(&self, path: &Path) -> GraphResult<()> {
        let snapshot = {
            let data = self.data.read();
            GraphSnapshot {
                vertices: data.vertices.values().cloned().collect(),
                edges: data.edges.values().cloned().collect(),
                property_definitions: self
                    .definitions
                    .iter()
                    .map(|entry| entry.value().clone())
                    .collect(),
            }
        };
        let encoded =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| GraphError::Encoding(e.to_string()))?;

        let io_err = |e: std::io::Error| GraphError::Snapshot {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write-then-rename so a crash never leaves a truncated snapshot.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, encoded).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

impl Graph for InMemoryGraph {
    fn get_vertex(&self, id: &str, authorizations: &Authorizations) -> GraphResult<Option<Vertex>> {
        Ok(self.data.read().visible_vertex(id, authorizations))
    }

    fn get_vertices_with_prefix(
        &self,
        prefix: &str,
        authorizations: &Authorizations,
    ) -> GraphResult<Vec<Vertex>> {
        let data = self.data.read();
        Ok(data
            .vertices
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .filter(|(_, s)| !s.soft_deleted && s.vertex.visibility.is_visible_to(authorizations))
            .map(|(_, s)| visible_copy(&s.vertex, authorizations))
            .collect())
    }

    fn add_vertex(&self, id: &str, visibility: Visibility) -> GraphResult<Vertex> {
        let mut data = self.data.write();
        match data.vertices.get_mut(id) {
            Some(stored) if !stored.soft_deleted => Ok(stored.vertex.clone()),
            Some(stored) => {
                // Revive with a clean slate; ids are deterministic so a
                // soft-deleted vertex can be asked for again.
                stored.soft_deleted = false;
                stored.vertex.visibility = visibility;
                stored.vertex.properties.clear();
                Ok(stored.vertex.clone())
            }
            None => {
                let vertex = Vertex {
                    id: id.to_string(),
                    visibility,
                    properties: Vec::new(),
                };
                data.vertices.insert(
                    id.to_string(),
                    StoredVertex {
                        vertex: vertex.clone(),
                        soft_deleted: false,
                    },
                );
                Ok(vertex)
            }
        }
    }

    fn set_property(&self, vertex_id: &str, property: Property) -> GraphResult<()> {
        let mut data = self.data.write();
        let vertex = data.live_vertex_mut(vertex_id)?;
        match vertex
            .properties
            .iter_mut()
            .find(|p| p.key == property.key && p.name == property.name)
        {
            Some(existing) => *existing = property,
            None => vertex.properties.push(property),
        }
        Ok(())
    }

    fn soft_delete_property(&self, vertex_id: &str, key: &str, name: &str) -> GraphResult<()> {
        let mut data = self.data.write();
        let vertex = data.live_vertex_mut(vertex_id)?;
        vertex.properties.retain(|p| !(p.key == key && p.name == name));
        Ok(())
    }

    fn alter_vertex_visibility(&self, vertex_id: &str, visibility: Visibility) -> GraphResult<()> {
        let mut data = self.data.write();
        data.live_vertex_mut(vertex_id)?.visibility = visibility;
        Ok(())
    }

    fn soft_delete_vertex(&self, vertex_id: &str) -> GraphResult<()> {
        let mut data = self.data.write();
        let stored = data
            .vertices
            .get_mut(vertex_id)
            .ok_or_else(|| GraphError::VertexNotFound(vertex_id.to_string()))?;
        stored.soft_deleted = true;

        let incident: Vec<String> = data
            .out_edges
            .get(vertex_id)
            .into_iter()
            .chain(data.in_edges.get(vertex_id))
            .flatten()
            .cloned()
            .collect();
        for edge_id in incident {
            if let Some(edge) = data.edges.get_mut(&edge_id) {
                edge.soft_deleted = true;
            }
        }
        Ok(())
    }

    fn get_edge(&self, id: &str, authorizations: &Authorizations) -> GraphResult<Option<Edge>> {
        let data = self.data.read();
        Ok(data
            .edges
            .get(id)
            .filter(|s| !s.soft_deleted && s.edge.visibility.is_visible_to(authorizations))
            .map(|s| s.edge.clone()))
    }

    fn get_or_create_edge(&self, builder: EdgeBuilder) -> GraphResult<Edge> {
        let edge = builder.build();
        let mut data = self.data.write();

        for endpoint in [&edge.out_vertex_id, &edge.in_vertex_id] {
            if data.live_vertex(endpoint).is_none() {
                return Err(GraphError::VertexNotFound(endpoint.clone()));
            }
        }

        if let Some(stored) = data.edges.get_mut(&edge.id) {
            if !stored.soft_deleted {
                return Ok(stored.edge.clone());
            }
            let previous = std::mem::replace(&mut stored.edge, edge.clone());
            stored.soft_deleted = false;
            data.unindex_edge(&previous);
            data.index_edge(&edge);
            return Ok(edge);
        }

        data.index_edge(&edge);
        data.edges.insert(
            edge.id.clone(),
            StoredEdge {
                edge: edge.clone(),
                soft_deleted: false,
            },
        );
        Ok(edge)
    }

    fn delete_edge(&self, id: &str) -> GraphResult<bool> {
        let mut data = self.data.write();
        match data.edges.remove(id) {
            Some(stored) => {
                data.unindex_edge(&stored.edge);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn soft_delete_edge(&self, id: &str) -> GraphResult<()> {
        let mut data = self.data.write();
        let stored = data
            .edges
            .get_mut(id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        stored.soft_deleted = true;
        Ok(())
    }

    fn edges(
        &self,
        vertex_id: &str,
        direction: Direction,
        label: Option<&str>,
        authorizations: &Authorizations,
    ) -> GraphResult<Vec<Edge>> {
        let data = self.data.read();
        let empty = BTreeSet::new();
        let outgoing = data.out_edges.get(vertex_id).unwrap_or(&empty);
        let incoming = data.in_edges.get(vertex_id).unwrap_or(&empty);
        let ids: Box<dyn Iterator<Item = &String>> = match direction {
            Direction::Out => Box::new(outgoing.iter()),
            Direction::In => Box::new(incoming.iter()),
            Direction::Both => Box::new(outgoing.union(incoming)),
        };

        let mut out = Vec::new();
        for id in ids {
            let Some(stored) = data.edges.get(id) else {
                continue;
            };
            let edge = &stored.edge;
            if stored.soft_deleted
                || !edge.visibility.is_visible_to(authorizations)
                || label.is_some_and(|l| l != edge.label)
            {
                continue;
            }
            let endpoints_visible = [&edge.out_vertex_id, &edge.in_vertex_id]
                .into_iter()
                .all(|v| data.visible_vertex(v, authorizations).is_some());
            if endpoints_visible {
                out.push(edge.clone());
            }
        }
        Ok(out)
    }

    fn define_property(&self, definition: PropertyDefinition) -> GraphResult<()> {
        tracing::debug!(
            property = %definition.name,
            data_type = %definition.data_type,
            hints = definition.text_index_hints.len(),
            "defining graph property"
        );
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    fn is_property_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn property_definition(&self, name: &str) -> Option<PropertyDefinition> {
        self.definitions.get(name).map(|d| d.value().clone())
    }

    fn flush(&self) -> GraphResult<()> {
        match &self.snapshot_path {
            Some(path) => self.write_snapshot(path),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Value, DEFAULT_KEY};
    use tempfile::tempdir;

    fn auths(labels: &[&str]) -> Authorizations {
        Authorizations::new(labels.iter().copied())
    }

    #[test]
    fn test_add_vertex_is_get_or_create() {
        let graph = InMemoryGraph::new();
        graph.add_vertex("v1", Visibility::new(["ontology"])).unwrap();
        graph
            .set_property("v1", Property::new("name", "first", Visibility::empty()))
            .unwrap();

        let again = graph.add_vertex("v1", Visibility::empty()).unwrap();
        assert_eq!(again.visibility, Visibility::new(["ontology"]));
        assert_eq!(again.string("name"), Some("first"));
        assert_eq!(graph.vertex_count(), 1);
    }

    #[test]
    fn test_visibility_filters_reads() {
        let graph = InMemoryGraph::new();
        graph.add_vertex("p_a", Visibility::new(["ontology"])).unwrap();
        graph
            .add_vertex("p_b", Visibility::new(["ontology", "ws"]))
            .unwrap();
        graph.add_vertex("q_c", Visibility::new(["ontology"])).unwrap();

        let public = graph.get_vertices_with_prefix("p_", &auths(&["ontology"])).unwrap();
        assert_eq!(public.len(), 1);
        let scoped = graph
            .get_vertices_with_prefix("p_", &auths(&["ontology", "ws"]))
            .unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(graph.get_vertex("p_b", &auths(&["ontology"])).unwrap().is_none());
    }

    #[test]
    fn test_edges_require_visible_endpoints() {
        let graph = InMemoryGraph::new();
        graph.add_vertex("a", Visibility::new(["ontology"])).unwrap();
        graph.add_vertex("b", Visibility::new(["ontology", "ws"])).unwrap();
        graph
            .get_or_create_edge(EdgeBuilder::new("a-rel-b", "a", "b", "rel", Visibility::empty()))
            .unwrap();

        let hidden = graph
            .edges("a", Direction::Out, Some("rel"), &auths(&["ontology"]))
            .unwrap();
        assert!(hidden.is_empty());
        let shown = graph
            .edges("a", Direction::Both, None, &auths(&["ontology", "ws"]))
            .unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].other_vertex_id("a"), "b");
    }

    #[test]
    fn test_edge_to_missing_vertex_fails() {
        let graph = InMemoryGraph::new();
        graph.add_vertex("a", Visibility::empty()).unwrap();
        let err = graph
            .get_or_create_edge(EdgeBuilder::new("e", "a", "missing", "rel", Visibility::empty()))
            .unwrap_err();
        assert_eq!(err, GraphError::VertexNotFound("missing".to_string()));
    }

    #[test]
    fn test_soft_deleted_edge_is_revived() {
        let graph = InMemoryGraph::new();
        graph.add_vertex("a", Visibility::empty()).unwrap();
        graph.add_vertex("b", Visibility::empty()).unwrap();
        let builder = EdgeBuilder::new("e", "a", "b", "rel", Visibility::empty());
        graph.get_or_create_edge(builder.clone()).unwrap();
        graph.soft_delete_edge("e").unwrap();
        assert!(graph.get_edge("e", &Authorizations::default()).unwrap().is_none());

        graph
            .get_or_create_edge(builder.property(Property::new("order", 3i64, Visibility::empty())))
            .unwrap();
        let edge = graph.get_edge("e", &Authorizations::default()).unwrap().unwrap();
        assert_eq!(edge.value("order"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_soft_delete_property_and_vertex() {
        let graph = InMemoryGraph::new();
        graph.add_vertex("a", Visibility::empty()).unwrap();
        graph.add_vertex("b", Visibility::empty()).unwrap();
        graph
            .set_property("a", Property::new("name", "x", Visibility::empty()))
            .unwrap();
        graph.soft_delete_property("a", DEFAULT_KEY, "name").unwrap();
        let a = graph.get_vertex("a", &Authorizations::default()).unwrap().unwrap();
        assert!(a.value("name").is_none());

        graph
            .get_or_create_edge(EdgeBuilder::new("e", "a", "b", "rel", Visibility::empty()))
            .unwrap();
        graph.soft_delete_vertex("b").unwrap();
        assert!(graph.get_vertex("b", &Authorizations::default()).unwrap().is_none());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        {
            let graph = InMemoryGraph::open(&path).unwrap();
            graph.add_vertex("a", Visibility::new(["ontology"])).unwrap();
            graph
                .set_property(
                    "a",
                    Property::new("hash", "abc", Visibility::empty()).with_key("doc"),
                )
                .unwrap();
            graph
                .define_property(PropertyDefinition::unindexed("hash", "string"))
                .unwrap();
            graph.flush().unwrap();
        }

        let reopened = InMemoryGraph::open(&path).unwrap();
        let a = reopened
            .get_vertex("a", &auths(&["ontology"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            a.property("hash", "doc").map(|p| p.value.clone()),
            Some(Value::String("abc".to_string()))
        );
        assert!(reopened.is_property_defined("hash"));
    }
}
