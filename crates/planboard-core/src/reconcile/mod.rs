//! Stage reconciliation: merge one stage's latest data into the node graph
//! without disturbing nodes the stage does not own.
//!
//! Each stage module only knows how to read its record into [`Entity`]s and
//! [`Link`]s (and how to write an edited node back). The matching, update,
//! creation and removal rules live once, in [`reconcile`].

mod auth;
mod design;
mod features;
mod ideation;
mod schema;
mod screens;

pub use auth::AuthReconciler;
pub use design::DesignReconciler;
pub use features::FeaturesReconciler;
pub use ideation::IdeationReconciler;
pub use schema::SchemaReconciler;
pub use screens::ScreensReconciler;

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::change::GraphChange;
use crate::extract;
use crate::factory::{Entity, Identity, NodeFactory};
use crate::model::{Edge, EdgeKind, Node, Owner, StageId};
use crate::store::Nodes;

/// A connection a stage derives between two of its own nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub label: Option<String>,
}

impl Link {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Everything one stage record asks for.
#[derive(Debug, Clone, Default)]
pub struct StageEntities {
    pub entities: Vec<Entity>,
    pub links: Vec<Link>,
}

pub trait StageReconciler: Send + Sync {
    fn stage(&self) -> StageId;

    /// Read the stage record. Malformed or missing fields are treated as
    /// absent; this never fails.
    fn entities(&self, data: &Value) -> StageEntities;

    /// Write an edited node's payload back into the stage record it came
    /// from. Returns false when the node has no counterpart in `data`.
    fn project(&self, node: &Node, data: &mut Value) -> bool;
}

/// All built-in reconcilers, in stage order.
pub fn builtin() -> Vec<Box<dyn StageReconciler>> {
    StageId::ALL.into_iter().map(for_stage).collect()
}

pub fn for_stage(stage: StageId) -> Box<dyn StageReconciler> {
    match stage {
        StageId::Ideation => Box::new(IdeationReconciler),
        StageId::Features => Box::new(FeaturesReconciler),
        StageId::Screens => Box::new(ScreensReconciler),
        StageId::Schema => Box::new(SchemaReconciler),
        StageId::Auth => Box::new(AuthReconciler),
        StageId::Design => Box::new(DesignReconciler),
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The full node collection after the pass. Pointer-equal to the input
    /// when nothing changed.
    pub nodes: Nodes,
    /// The complete set of edges this stage now derives; `None` when the
    /// stage data was unchanged and its edges must be left alone.
    pub edges: Option<Vec<Edge>>,
    pub change: GraphChange,
}

impl ReconcileOutcome {
    fn unchanged(current: &Nodes) -> Self {
        Self {
            nodes: Arc::clone(current),
            edges: None,
            change: GraphChange::default(),
        }
    }
}

enum Slot {
    Kept(Arc<Node>),
    Pending(Entity),
}

/// Run one reconciliation pass for `reconciler`'s stage.
pub fn reconcile(
    reconciler: &dyn StageReconciler,
    factory: &NodeFactory,
    current: &Nodes,
    new_data: &Value,
    last_data: Option<&Value>,
) -> ReconcileOutcome {
    let stage = reconciler.stage();
    let unchanged = match last_data {
        Some(last) => last == new_data,
        None => new_data.is_null(),
    };
    if unchanged {
        tracing::debug!(%stage, "stage data unchanged, skipping pass");
        return ReconcileOutcome::unchanged(current);
    }

    let owner = Owner::Stage(stage);
    let (owned, others): (Vec<Arc<Node>>, Vec<Arc<Node>>) = current
        .iter()
        .cloned()
        .partition(|n| n.provenance.owner == owner);
    let foreign_ids: HashSet<&str> = others.iter().map(|n| n.id.as_str()).collect();

    let StageEntities { entities, links } = reconciler.entities(new_data);

    let mut change = GraphChange::default();
    let mut claimed = vec![false; owned.len()];
    let mut seen: HashSet<String> = HashSet::new();
    let mut slots: Vec<Slot> = Vec::with_capacity(entities.len());

    for entity in entities {
        let id = entity.node_id();
        if !seen.insert(id.clone()) {
            tracing::debug!(%stage, %id, "duplicate entity in stage data, keeping first");
            continue;
        }
        if foreign_ids.contains(id.as_str()) {
            tracing::debug!(%stage, %id, "id held by a node this stage does not own, skipping");
            continue;
        }

        let found = owned
            .iter()
            .enumerate()
            .position(|(i, node)| !claimed[i] && same_identity(node, &entity, &id));

        match found {
            Some(i) => {
                claimed[i] = true;
                let existing = &owned[i];
                if existing.kind() == entity.kind() && existing.payload == entity.payload {
                    slots.push(Slot::Kept(Arc::clone(existing)));
                } else {
                    let mut updated = Node::clone(existing);
                    updated.payload = entity.payload;
                    change.updated.push(id);
                    slots.push(Slot::Kept(Arc::new(updated)));
                }
            }
            None => slots.push(Slot::Pending(entity)),
        }
    }

    for (node, _) in owned.iter().zip(&claimed).filter(|(_, claimed)| !**claimed) {
        change.removed.push(node.id.clone());
    }

    // Place new nodes against everything that survives the pass, plus the
    // nodes placed before them.
    let mut placed: Vec<Arc<Node>> = others.clone();
    placed.extend(slots.iter().filter_map(|slot| match slot {
        Slot::Kept(node) => Some(Arc::clone(node)),
        Slot::Pending(_) => None,
    }));

    let mut processed: Vec<Arc<Node>> = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            Slot::Kept(node) => processed.push(node),
            Slot::Pending(entity) => {
                let node = Arc::new(factory.create(&entity, &placed));
                change.added.push(node.id.clone());
                placed.push(Arc::clone(&node));
                processed.push(node);
            }
        }
    }

    let mut result = others;
    result.extend(processed);

    let edges = derive_edges(owner, &links, &result);

    let nodes = if change.is_empty() && same_sequence(current, &result) {
        Arc::clone(current)
    } else {
        Arc::new(result)
    };

    if !change.is_empty() {
        tracing::info!(
            %stage,
            added = change.added.len(),
            updated = change.updated.len(),
            removed = change.removed.len(),
            "reconciled stage"
        );
    }

    ReconcileOutcome {
        nodes,
        edges: Some(edges),
        change,
    }
}

fn same_identity(node: &Node, entity: &Entity, id: &str) -> bool {
    match &entity.identity {
        Identity::Singleton => node.id == id,
        Identity::Sourced { source_id, .. } => {
            node.id == id
                || (node.kind() == entity.kind()
                    && node.provenance.source_id.as_deref() == Some(source_id.as_str()))
        }
    }
}

fn same_sequence(current: &[Arc<Node>], result: &[Arc<Node>]) -> bool {
    current.len() == result.len() && current.iter().zip(result).all(|(a, b)| Arc::ptr_eq(a, b))
}

/// Edges for the stage's links whose endpoints both exist, first link per
/// pair wins.
fn derive_edges(owner: Owner, links: &[Link], nodes: &[Arc<Node>]) -> Vec<Edge> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut edges: Vec<Edge> = Vec::new();
    for link in links {
        if link.from == link.to || !ids.contains(link.from.as_str()) || !ids.contains(link.to.as_str()) {
            continue;
        }
        if edges.iter().any(|e| e.duplicates(&link.from, &link.to, link.kind)) {
            continue;
        }
        let mut edge = Edge::new(link.from.clone(), link.to.clone(), link.kind, owner);
        edge.label = link.label.clone();
        edges.push(edge);
    }
    edges
}

// --- Shared helpers for stage modules ---

/// Index from every way a collection item may be referred to (its source id
/// and the slug of its name) to its node id.
pub(crate) fn reference_index(entities: &[Entity], name_of: impl Fn(&Entity) -> Option<&str>) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for entity in entities {
        let node_id = entity.node_id();
        if let Some(source_id) = entity.source_id() {
            index.entry(source_id.to_string()).or_insert_with(|| node_id.clone());
        }
        if let Some(name) = name_of(entity) {
            index.entry(extract::slug(name)).or_insert_with(|| node_id.clone());
        }
    }
    index
}

pub(crate) fn resolve_reference<'a>(index: &'a HashMap<String, String>, raw: &str) -> Option<&'a String> {
    index.get(raw.trim()).or_else(|| index.get(&extract::slug(raw)))
}

/// Write a singleton's text back under `key`.
pub(crate) fn project_text(data: &mut Value, key: &str, text: &str) -> bool {
    extract::ensure_object(data).insert(key.to_string(), Value::String(text.to_string()));
    true
}

/// Replace the payload-owned keys of a collection node's originating item,
/// pinning the item's `id` so a renamed item keeps its identity.
pub(crate) fn project_item(
    node: &Node,
    data: &mut Value,
    collections: &[&str],
    natural_keys: &[&str],
    owned_keys: &[&str],
) -> bool {
    let Some(source_id) = node.provenance.source_id.as_deref() else {
        return false;
    };
    let Some(item) = extract::find_item_mut(data, collections, natural_keys, source_id) else {
        return false;
    };
    if !item.contains_key("id") {
        item.insert("id".to_string(), Value::String(source_id.to_string()));
    }
    for key in owned_keys {
        extract::remove_field(item, key);
    }
    extract::merge_into(item, node.payload.data_value());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, NodePayload, TextPayload};
    use serde_json::json;

    fn empty() -> Nodes {
        Arc::new(Vec::new())
    }

    #[test]
    fn unchanged_data_returns_same_collection() {
        let factory = NodeFactory::default();
        let data = json!({"appName": "Foo"});
        let first = reconcile(&IdeationReconciler, &factory, &empty(), &data, None);
        let again = reconcile(&IdeationReconciler, &factory, &first.nodes, &data, Some(&data));
        assert!(Arc::ptr_eq(&first.nodes, &again.nodes));
        assert!(again.edges.is_none());
        assert!(again.change.is_empty());
    }

    #[test]
    fn null_data_with_no_history_is_a_noop() {
        let factory = NodeFactory::default();
        let nodes = empty();
        let out = reconcile(&FeaturesReconciler, &factory, &nodes, &Value::Null, None);
        assert!(Arc::ptr_eq(&nodes, &out.nodes));
    }

    #[test]
    fn other_owners_are_untouched() {
        let factory = NodeFactory::default();
        let note = Arc::new(factory.note(Default::default(), None, &[]));
        let nodes: Nodes = Arc::new(vec![Arc::clone(&note)]);
        let out = reconcile(
            &IdeationReconciler,
            &factory,
            &nodes,
            &json!({"appName": "Foo"}),
            None,
        );
        assert_eq!(out.nodes.len(), 2);
        assert!(Arc::ptr_eq(&out.nodes[0], &note));
    }

    #[test]
    fn foreign_node_with_colliding_id_is_left_alone() {
        let factory = NodeFactory::default();
        let mut squatter = factory.app_name(TextPayload { text: "Mine".into() }, &[]);
        squatter.provenance = crate::model::Provenance::user();
        let nodes: Nodes = Arc::new(vec![Arc::new(squatter)]);
        let out = reconcile(
            &IdeationReconciler,
            &factory,
            &nodes,
            &json!({"appName": "Theirs"}),
            None,
        );
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(
            out.nodes[0].payload,
            NodePayload::AppName(TextPayload { text: "Mine".into() })
        );
    }

    #[test]
    fn changed_data_without_node_changes_keeps_collection() {
        let factory = NodeFactory::default();
        let v1 = json!({"appName": "Foo", "unrelated": 1});
        let v2 = json!({"appName": "Foo", "unrelated": 2});
        let first = reconcile(&IdeationReconciler, &factory, &empty(), &v1, None);
        let second = reconcile(&IdeationReconciler, &factory, &first.nodes, &v2, Some(&v1));
        assert!(Arc::ptr_eq(&first.nodes, &second.nodes));
        assert_eq!(second.edges, Some(Vec::new()));
    }

    #[test]
    fn derive_edges_skips_dangling_and_duplicate_links() {
        let factory = NodeFactory::default();
        let a = Arc::new(factory.app_name(TextPayload::default(), &[]));
        let b = Arc::new(factory.tagline(TextPayload::default(), &[Arc::clone(&a)]));
        let links = vec![
            Link::new(a.id.clone(), b.id.clone(), EdgeKind::Flow),
            Link::new(a.id.clone(), b.id.clone(), EdgeKind::Flow),
            Link::new(a.id.clone(), "ghost", EdgeKind::Flow),
            Link::new(a.id.clone(), a.id.clone(), EdgeKind::Flow),
        ];
        let edges = derive_edges(Owner::Stage(StageId::Ideation), &links, &[a, b]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].owner, Owner::Stage(StageId::Ideation));
    }

    #[test]
    fn builtin_covers_every_stage_once() {
        let stages: Vec<StageId> = builtin().iter().map(|r| r.stage()).collect();
        assert_eq!(stages, StageId::ALL.to_vec());
        assert_eq!(NodeKind::AppName.stage(), Some(StageId::Ideation));
    }
}
