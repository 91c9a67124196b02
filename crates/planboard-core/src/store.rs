//! The authoritative node and edge collections.
//!
//! Nodes are held as `Arc<Vec<Arc<Node>>>` so a caller can keep a snapshot
//! and detect "nothing changed" with a pointer comparison. Mutation goes
//! through `Arc::make_mut`: a snapshot held elsewhere is never modified, and
//! untouched nodes keep their identity.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::model::{Edge, EdgeKind, Node, NodePayload, Owner, Position, Size, StageId};

pub type Nodes = Arc<Vec<Arc<Node>>>;

/// Partial update for [`GraphStore::update_node`]. `None` fields are left
/// alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub payload: Option<NodePayload>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

impl NodeUpdate {
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn size(size: Size) -> Self {
        Self {
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn payload(payload: NodePayload) -> Self {
        Self {
            payload: Some(payload),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Nodes,
    edges: Vec<Edge>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from restored collections. Duplicate node ids keep the
    /// first occurrence; invalid edges are dropped.
    pub fn from_parts(nodes: impl IntoIterator<Item = Node>, edges: Vec<Edge>) -> Self {
        let mut store = Self::new();
        store.replace_nodes(Arc::new(nodes.into_iter().map(Arc::new).collect()));
        store.replace_edges(edges);
        store
    }

    // --- Reads ---

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Neighbour ids of `id`, empty for unknown nodes.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.node(id)
            .map(|n| n.adjacency.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether an edge of `kind` between `from` and `to` already exists.
    pub fn has_edge(&self, from: &str, to: &str, kind: EdgeKind) -> bool {
        self.edges.iter().any(|e| e.duplicates(from, to, kind))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // --- Node mutations ---

    /// Insert a node. Rejected when the id is already taken.
    pub fn add_node(&mut self, mut node: Node) -> bool {
        if self.contains(&node.id) {
            tracing::debug!(id = %node.id, "add_node: id already present");
            return false;
        }
        node.adjacency.clear();
        Arc::make_mut(&mut self.nodes).push(Arc::new(node));
        true
    }

    /// Apply a partial update. Returns whether the node changed. A payload
    /// of a different kind and non-finite geometry are rejected.
    pub fn update_node(&mut self, id: &str, update: NodeUpdate) -> bool {
        let Some(index) = self.nodes.iter().position(|n| n.id == id) else {
            tracing::debug!(%id, "update_node: unknown node");
            return false;
        };
        let current = &self.nodes[index];
        if let Some(payload) = &update.payload {
            if payload.kind() != current.kind() {
                tracing::debug!(%id, from = %current.kind(), to = %payload.kind(), "update_node: kind change rejected");
                return false;
            }
        }
        let position_ok = update.position.map_or(true, |p| p.x.is_finite() && p.y.is_finite());
        let size_ok = update
            .size
            .map_or(true, |s| s.width.is_finite() && s.height.is_finite() && s.width >= 0.0 && s.height >= 0.0);
        if !position_ok || !size_ok {
            tracing::debug!(%id, "update_node: invalid geometry rejected");
            return false;
        }

        let changes_payload = update.payload.as_ref().is_some_and(|p| *p != current.payload);
        let changes_position = update.position.is_some_and(|p| p != current.position);
        let changes_size = update.size.is_some_and(|s| s != current.size);
        if !(changes_payload || changes_position || changes_size) {
            return false;
        }

        let node = Arc::make_mut(&mut Arc::make_mut(&mut self.nodes)[index]);
        if let Some(payload) = update.payload {
            node.payload = payload;
        }
        if let Some(position) = update.position {
            node.position = position;
        }
        if let Some(size) = update.size {
            node.size = size;
        }
        true
    }

    /// Remove a node and every edge touching it. Unknown ids are a no-op.
    pub fn remove_node(&mut self, id: &str) -> Option<Arc<Node>> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        let removed = Arc::make_mut(&mut self.nodes).remove(index);
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        if self.edges.len() != before {
            tracing::debug!(%id, edges = before - self.edges.len(), "removed edges with node");
            self.rebuild_adjacency();
        }
        Some(removed)
    }

    /// Replace the whole node collection. Duplicate ids keep the first
    /// occurrence and edges left dangling are pruned.
    pub fn replace_nodes(&mut self, nodes: Nodes) {
        if Arc::ptr_eq(&self.nodes, &nodes) {
            return;
        }
        let mut seen = HashSet::new();
        let unique = nodes.iter().all(|n| seen.insert(n.id.as_str()));
        self.nodes = if unique {
            nodes
        } else {
            let mut seen = HashSet::new();
            let deduped: Vec<Arc<Node>> = nodes
                .iter()
                .filter(|n| seen.insert(n.id.clone()))
                .cloned()
                .collect();
            tracing::debug!(dropped = nodes.len() - deduped.len(), "replace_nodes: duplicate ids dropped");
            Arc::new(deduped)
        };
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .retain(|e| ids.contains(e.from.as_str()) && ids.contains(e.to.as_str()));
        self.rebuild_adjacency();
    }

    /// Move nodes to new positions. Returns how many nodes moved.
    pub fn apply_positions(&mut self, positions: &BTreeMap<String, Position>) -> usize {
        let moved: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                positions
                    .get(&n.id)
                    .is_some_and(|p| p.x.is_finite() && p.y.is_finite() && *p != n.position)
            })
            .map(|(i, _)| i)
            .collect();
        if moved.is_empty() {
            return 0;
        }
        let nodes = Arc::make_mut(&mut self.nodes);
        for &i in &moved {
            let node = Arc::make_mut(&mut nodes[i]);
            if let Some(p) = positions.get(&node.id) {
                node.position = *p;
            }
        }
        moved.len()
    }

    // --- Edge mutations ---

    /// Connect two nodes with a user-owned edge. Returns the new edge id, or
    /// `None` when the edge would be dangling, a self loop or a duplicate.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Option<String> {
        self.add_edge_with(Edge::new(from, to, kind, Owner::User))
    }

    pub fn add_edge_with(&mut self, edge: Edge) -> Option<String> {
        if !self.accepts(&edge) {
            return None;
        }
        let id = self.push_edge(edge);
        self.rebuild_adjacency();
        Some(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> bool {
        let Some(index) = self.edges.iter().position(|e| e.id == id) else {
            tracing::debug!(%id, "remove_edge: unknown edge");
            return false;
        };
        self.edges.remove(index);
        self.rebuild_adjacency();
        true
    }

    /// Replace every edge. Invalid and duplicate edges are dropped, first
    /// wins.
    pub fn replace_edges(&mut self, edges: Vec<Edge>) {
        self.edges.clear();
        for edge in edges {
            if self.accepts(&edge) {
                self.push_edge(edge);
            }
        }
        self.rebuild_adjacency();
    }

    /// Swap the edges owned by `stage` for `edges`, leaving every other edge
    /// alone. Returns whether the edge set changed.
    pub fn replace_stage_edges(&mut self, stage: StageId, edges: Vec<Edge>) -> bool {
        let owner = Owner::Stage(stage);
        let previous: Vec<Edge> = self.edges.iter().filter(|e| e.owner == owner).cloned().collect();
        self.edges.retain(|e| e.owner != owner);
        for mut edge in edges {
            edge.owner = owner;
            if self.accepts(&edge) {
                self.push_edge(edge);
            }
        }
        let current: Vec<&Edge> = self.edges.iter().filter(|e| e.owner == owner).collect();
        let changed = previous.len() != current.len() || previous.iter().zip(&current).any(|(a, b)| a != *b);
        if changed {
            self.rebuild_adjacency();
        }
        changed
    }

    fn accepts(&self, edge: &Edge) -> bool {
        if edge.from == edge.to {
            tracing::debug!(id = %edge.id, "edge rejected: self loop");
            return false;
        }
        if !self.contains(&edge.from) || !self.contains(&edge.to) {
            tracing::debug!(id = %edge.id, "edge rejected: unknown endpoint");
            return false;
        }
        if self.has_edge(&edge.from, &edge.to, edge.kind) {
            tracing::debug!(id = %edge.id, "edge rejected: duplicate");
            return false;
        }
        true
    }

    /// Append an accepted edge. Distinct endpoint pairs can format to the
    /// same id (`a-b`+`c` and `a`+`b-c`), so a taken id gets a `#n` suffix.
    fn push_edge(&mut self, mut edge: Edge) -> String {
        let base = edge.id.clone();
        let mut n = 2;
        while self.edge(&edge.id).is_some() {
            edge.id = format!("{}#{}", base, n);
            n += 1;
        }
        let id = edge.id.clone();
        self.edges.push(edge);
        id
    }

    /// Recompute every node's neighbour set from the edges, touching only
    /// the nodes whose set actually changed.
    fn rebuild_adjacency(&mut self) {
        let mut adjacency: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from.as_str()).or_default().insert(edge.to.clone());
            adjacency.entry(edge.to.as_str()).or_default().insert(edge.from.clone());
        }
        let empty = BTreeSet::new();
        let stale: Vec<(usize, BTreeSet<String>)> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| {
                let expected = adjacency.get(n.id.as_str()).unwrap_or(&empty);
                (n.adjacency != *expected).then(|| (i, expected.clone()))
            })
            .collect();
        if stale.is_empty() {
            return;
        }
        let nodes = Arc::make_mut(&mut self.nodes);
        for (i, expected) in stale {
            Arc::make_mut(&mut nodes[i]).adjacency = expected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::NodeFactory;
    use crate::model::{NotePayload, PersonaPayload, TextPayload};
    use pretty_assertions::assert_eq;

    fn note_at(x: f64, y: f64) -> Node {
        NodeFactory::default().note(NotePayload::default(), Some(Position::new(x, y)), &[])
    }

    fn store_with(n: usize) -> (GraphStore, Vec<String>) {
        let mut store = GraphStore::new();
        let ids = (0..n)
            .map(|i| {
                let node = note_at(i as f64 * 300.0, 0.0);
                let id = node.id.clone();
                assert!(store.add_node(node));
                id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn add_node_rejects_duplicate_ids() {
        let mut store = GraphStore::new();
        let node = note_at(0.0, 0.0);
        assert!(store.add_node(node.clone()));
        assert!(!store.add_node(node));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_node_cascades_edges_and_adjacency() {
        let (mut store, ids) = store_with(3);
        store.add_edge(&ids[0], &ids[1], EdgeKind::Link).unwrap();
        store.add_edge(&ids[1], &ids[2], EdgeKind::Flow).unwrap();
        assert_eq!(store.neighbors(&ids[1]), {
            let mut v = vec![ids[0].as_str(), ids[2].as_str()];
            v.sort();
            v
        });

        assert!(store.remove_node(&ids[0]).is_some());
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.neighbors(&ids[1]), vec![ids[2].as_str()]);
        assert!(store.remove_node(&ids[0]).is_none());
    }

    #[test]
    fn add_edge_rejects_invalid_edges() {
        let (mut store, ids) = store_with(2);
        assert!(store.add_edge(&ids[0], &ids[0], EdgeKind::Link).is_none());
        assert!(store.add_edge(&ids[0], "ghost", EdgeKind::Link).is_none());
        assert!(store.add_edge(&ids[0], &ids[1], EdgeKind::Link).is_some());
        assert!(store.add_edge(&ids[1], &ids[0], EdgeKind::Link).is_none());
        assert_eq!(store.edges().len(), 1);
    }

    #[test]
    fn colliding_edge_ids_stay_distinct() {
        let mut store = GraphStore::new();
        for (i, id) in ["a-b", "c", "a", "b-c"].into_iter().enumerate() {
            let mut node = note_at(i as f64 * 300.0, 0.0);
            node.id = id.to_string();
            assert!(store.add_node(node));
        }
        let first = store.add_edge("a-b", "c", EdgeKind::Link).unwrap();
        let second = store.add_edge("a", "b-c", EdgeKind::Link).unwrap();
        assert_eq!(first, "edge-a-b-c");
        assert_eq!(second, "edge-a-b-c#2");
        assert_eq!(store.edges().len(), 2);

        assert!(store.remove_edge(&second));
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].from, "a-b");
        assert!(store.neighbors("a").is_empty());
    }

    #[test]
    fn directed_edges_may_run_both_ways() {
        let (mut store, ids) = store_with(2);
        assert!(store.add_edge(&ids[0], &ids[1], EdgeKind::Dependency).is_some());
        assert!(store.add_edge(&ids[0], &ids[1], EdgeKind::Flow).is_none());
        assert!(store.add_edge(&ids[1], &ids[0], EdgeKind::Flow).is_some());
    }

    #[test]
    fn update_node_rejects_kind_change() {
        let (mut store, ids) = store_with(1);
        let changed = store.update_node(
            &ids[0],
            NodeUpdate::payload(NodePayload::AppName(TextPayload { text: "x".into() })),
        );
        assert!(!changed);
        assert!(!store.update_node("ghost", NodeUpdate::position(Position::new(1.0, 1.0))));
        assert!(store.update_node(&ids[0], NodeUpdate::position(Position::new(5.0, 5.0))));
        assert!(!store.update_node(&ids[0], NodeUpdate::position(Position::new(5.0, 5.0))));
        assert!(!store.update_node(&ids[0], NodeUpdate::size(Size::new(f64::NAN, 1.0))));
    }

    #[test]
    fn snapshots_are_not_mutated() {
        let (mut store, ids) = store_with(2);
        let snapshot = Arc::clone(store.nodes());
        store.update_node(&ids[0], NodeUpdate::position(Position::new(900.0, 900.0)));
        assert_eq!(snapshot[0].position, Position::new(0.0, 0.0));
        assert!(Arc::ptr_eq(&snapshot[1], &store.nodes()[1]));
    }

    #[test]
    fn replace_nodes_prunes_dangling_edges() {
        let (mut store, ids) = store_with(3);
        store.add_edge(&ids[0], &ids[1], EdgeKind::Link);
        store.add_edge(&ids[1], &ids[2], EdgeKind::Link);
        let kept: Vec<Arc<Node>> = store.nodes().iter().skip(1).cloned().collect();
        store.replace_nodes(Arc::new(kept));
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.neighbors(&ids[1]), vec![ids[2].as_str()]);
    }

    #[test]
    fn replace_nodes_with_same_collection_is_a_noop() {
        let (mut store, _) = store_with(2);
        let snapshot = Arc::clone(store.nodes());
        store.replace_nodes(Arc::clone(&snapshot));
        assert!(Arc::ptr_eq(&snapshot, store.nodes()));
    }

    #[test]
    fn stage_edges_leave_user_edges_alone() {
        let factory = NodeFactory::default();
        let mut store = GraphStore::new();
        for (i, name) in ["a", "b"].iter().enumerate() {
            store.add_node(factory.persona(
                PersonaPayload {
                    name: name.to_string(),
                    ..Default::default()
                },
                name,
                i,
                &[],
            ));
        }
        store.add_edge("persona:a", "persona:b", EdgeKind::Link).unwrap();
        let stage_edge = Edge::new("persona:b", "persona:a", EdgeKind::Flow, Owner::User);
        // The user link already covers the unordered pair.
        assert!(!store.replace_stage_edges(StageId::Ideation, vec![stage_edge]));
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].owner, Owner::User);
    }

    #[test]
    fn apply_positions_counts_moves() {
        let (mut store, ids) = store_with(2);
        let mut positions = BTreeMap::new();
        positions.insert(ids[0].clone(), Position::new(0.0, 0.0));
        positions.insert(ids[1].clone(), Position::new(10.0, 10.0));
        positions.insert("ghost".to_string(), Position::new(1.0, 1.0));
        assert_eq!(store.apply_positions(&positions), 1);
        assert_eq!(store.node(&ids[1]).unwrap().position, Position::new(10.0, 10.0));
    }

    #[test]
    fn from_parts_drops_duplicates_and_dangling_edges() {
        let a = note_at(0.0, 0.0);
        let mut b = note_at(500.0, 0.0);
        b.id = a.id.clone();
        let edges = vec![Edge::new(a.id.clone(), "ghost", EdgeKind::Link, Owner::User)];
        let store = GraphStore::from_parts(vec![a.clone(), b], edges);
        assert_eq!(store.len(), 1);
        assert_eq!(store.nodes()[0].position, a.position);
        assert!(store.edges().is_empty());
    }
}
