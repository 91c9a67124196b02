//! The board: one graph store plus everything that writes to it.
//!
//! All mutation goes through `&mut Board`, so reconciliation passes,
//! gestures and layout commits are serialized by construction.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::change::GraphChange;
use crate::config::CanvasConfig;
use crate::factory::NodeFactory;
use crate::interaction::{InteractionEffect, InteractionMachine, Key, PointerEvent};
use crate::layout::{self, CancelToken, LayoutAlgorithm, PositionMap};
use crate::model::{Edge, EdgeKind, Node, NotePayload, Position, StageId};
use crate::reconcile::{self, StageReconciler};
use crate::storage::BoardFile;
use crate::store::{GraphStore, NodeUpdate, Nodes};

/// Stage data as supplied by the producer, keyed by stage id.
pub type StageData = BTreeMap<String, Value>;

/// Receives a stage record after a user edit was projected back into it.
pub trait WritebackHook: Send {
    fn on_writeback(&mut self, stage: StageId, data: &Value);
}

impl<F> WritebackHook for F
where
    F: FnMut(StageId, &Value) + Send,
{
    fn on_writeback(&mut self, stage: StageId, data: &Value) {
        self(stage, data)
    }
}

/// Raw input, for callers that forward events from a single queue.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown(PointerEvent),
    PointerMove(Position),
    PointerUp,
    KeyDown(Key),
    KeyUp(Key),
    Wheel { delta: f64, anchor: Position },
    StartConnection(String),
    EndConnection(String),
    CancelConnection,
}

pub struct Board {
    store: GraphStore,
    factory: NodeFactory,
    reconcilers: Vec<Box<dyn StageReconciler>>,
    /// Last stage record each reconciler processed.
    last: BTreeMap<StageId, Value>,
    inbox: BTreeMap<StageId, Value>,
    interaction: InteractionMachine,
    config: CanvasConfig,
    layout_token: Option<CancelToken>,
    writeback: Option<Box<dyn WritebackHook>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(CanvasConfig::default())
    }
}

impl Board {
    pub fn new(config: CanvasConfig) -> Self {
        Self {
            store: GraphStore::new(),
            factory: NodeFactory::new(config.placement),
            reconcilers: reconcile::builtin(),
            last: BTreeMap::new(),
            inbox: BTreeMap::new(),
            interaction: InteractionMachine::new(config.interaction),
            config,
            layout_token: None,
            writeback: None,
        }
    }

    /// Rebuild a board from a stored file.
    pub fn restore(file: BoardFile, config: CanvasConfig) -> Self {
        let mut board = Self::new(config);
        board.store = GraphStore::from_parts(file.nodes, file.edges);
        board.last = file.stages;
        board
    }

    pub fn to_file(&self) -> BoardFile {
        BoardFile {
            nodes: self.store.nodes().iter().map(|n| Node::clone(n)).collect(),
            edges: self.store.edges().to_vec(),
            stages: self.last.clone(),
        }
    }

    pub fn set_writeback(&mut self, hook: impl WritebackHook + 'static) {
        self.writeback = Some(Box::new(hook));
    }

    // --- Reads ---

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn nodes(&self) -> &Nodes {
        self.store.nodes()
    }

    pub fn edges(&self) -> &[Edge] {
        self.store.edges()
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.interaction
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn last_stage(&self, stage: StageId) -> Option<&Value> {
        self.last.get(&stage)
    }

    // --- Reconciliation ---

    /// Run one reconciliation pass for `stage` and commit its result.
    pub fn sync_stage(&mut self, stage: StageId, data: Value) -> GraphChange {
        let Some(reconciler) = self.reconcilers.iter().find(|r| r.stage() == stage) else {
            tracing::warn!(%stage, "no reconciler registered");
            return GraphChange::default();
        };
        let outcome = reconcile::reconcile(
            reconciler.as_ref(),
            &self.factory,
            self.store.nodes(),
            &data,
            self.last.get(&stage),
        );

        if let Some(edges) = outcome.edges {
            self.store.replace_nodes(outcome.nodes);
            let edges_changed = self.store.replace_stage_edges(stage, edges);
            if !outcome.change.is_empty() || edges_changed {
                // A layout computed against the old graph is stale now.
                self.cancel_layout();
            }
            self.interaction.sync_with_store(&self.store);
        }
        self.last.insert(stage, data);
        outcome.change
    }

    /// Reconcile every known stage present in `data`, in stage order.
    /// Unknown keys are ignored.
    pub fn sync(&mut self, data: &StageData) -> GraphChange {
        self.submit_all(data);
        self.flush()
    }

    /// Queue stage data; the latest submission per stage wins.
    pub fn submit(&mut self, stage: StageId, data: Value) {
        self.inbox.insert(stage, data);
    }

    pub fn submit_all(&mut self, data: &StageData) {
        for (key, value) in data {
            match key.parse::<StageId>() {
                Ok(stage) => self.submit(stage, value.clone()),
                Err(_) => tracing::warn!(%key, "ignoring unknown stage"),
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Process queued stage data in stage order until the inbox is empty.
    pub fn flush(&mut self) -> GraphChange {
        let mut change = GraphChange::default();
        while let Some((stage, data)) = self.inbox.pop_first() {
            change.merge(self.sync_stage(stage, data));
        }
        change
    }

    // --- Direct edits ---

    /// Create a user note. Without `at` it is smart-placed.
    pub fn add_note(&mut self, payload: NotePayload, at: Option<Position>) -> Option<String> {
        let node = self.factory.note(payload, at, self.store.nodes());
        let id = node.id.clone();
        self.store.add_node(node).then_some(id)
    }

    /// Apply a user edit. A payload change on a stage-owned node is also
    /// projected into that stage's last record and handed to the write-back
    /// hook.
    pub fn edit_node(&mut self, id: &str, update: NodeUpdate) -> bool {
        let touches_payload = update.payload.is_some();
        if !self.store.update_node(id, update) {
            return false;
        }
        if touches_payload {
            self.project(id);
        }
        true
    }

    fn project(&mut self, id: &str) {
        let Some(node) = self.store.node(id).cloned() else {
            return;
        };
        let Some(stage) = node.owner().stage() else {
            return;
        };
        let Some(reconciler) = self.reconcilers.iter().find(|r| r.stage() == stage) else {
            return;
        };
        let mut data = self.last.get(&stage).cloned().unwrap_or(Value::Null);
        if !reconciler.project(&node, &mut data) {
            tracing::debug!(%id, %stage, "edited node has no record to project into");
            return;
        }
        if let Some(hook) = self.writeback.as_mut() {
            hook.on_writeback(stage, &data);
        }
        self.last.insert(stage, data);
    }

    pub fn remove_node(&mut self, id: &str) -> Option<Arc<Node>> {
        let removed = self.store.remove_node(id);
        if removed.is_some() {
            self.interaction.sync_with_store(&self.store);
        }
        removed
    }

    pub fn connect(&mut self, from: &str, to: &str, kind: EdgeKind) -> Option<String> {
        self.store.add_edge(from, to, kind)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> bool {
        self.store.remove_edge(edge_id)
    }

    /// Replace the graph wholesale, e.g. after an external restore.
    pub fn replace_graph(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        self.store = GraphStore::from_parts(nodes, edges);
        self.cancel_layout();
        self.interaction.sync_with_store(&self.store);
    }

    // --- Layout ---

    /// Start a new layout run, superseding any run still in flight.
    pub fn begin_layout(&mut self) -> CancelToken {
        self.cancel_layout();
        let token = CancelToken::new();
        self.layout_token = Some(token.clone());
        token
    }

    fn cancel_layout(&mut self) {
        if let Some(token) = self.layout_token.take() {
            token.cancel();
        }
    }

    /// Compute and apply a layout on the calling thread. Returns how many
    /// nodes moved.
    pub fn auto_layout(&mut self, algorithm: LayoutAlgorithm) -> usize {
        let token = self.begin_layout();
        let positions = layout::compute_positions(
            self.store.nodes(),
            self.store.edges(),
            algorithm,
            &self.config.layout,
            &token,
        );
        self.apply_layout(&token, positions)
    }

    /// Commit positions computed elsewhere. Results of cancelled or
    /// superseded runs are discarded.
    pub fn apply_layout(&mut self, token: &CancelToken, positions: Option<PositionMap>) -> usize {
        let current = self.layout_token.as_ref().is_some_and(|t| t.same_as(token));
        let Some(positions) = positions.filter(|_| current && !token.is_cancelled()) else {
            tracing::debug!("discarding stale layout");
            return 0;
        };
        self.layout_token = None;
        self.store.apply_positions(&positions)
    }

    // --- Interaction ---

    pub fn handle(&mut self, event: InputEvent) -> InteractionEffect {
        let store = &mut self.store;
        let machine = &mut self.interaction;
        match event {
            InputEvent::PointerDown(e) => machine.pointer_down(store, e),
            InputEvent::PointerMove(p) => machine.pointer_move(store, p),
            InputEvent::PointerUp => machine.pointer_up(),
            InputEvent::KeyDown(key) => machine.key_down(store, key),
            InputEvent::KeyUp(key) => machine.key_up(key),
            InputEvent::Wheel { delta, anchor } => machine.wheel(delta, anchor),
            InputEvent::StartConnection(id) => machine.start_connection(store, &id),
            InputEvent::EndConnection(id) => machine.end_connection(store, &id),
            InputEvent::CancelConnection => machine.cancel_connection(),
        }
    }

    pub fn select(&mut self, id: Option<&str>) -> InteractionEffect {
        self.interaction.select(&self.store, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutOptions;
    use crate::model::{NodeKind, NodePayload, PersonaPayload, ScreenPayload};
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn inbox_keeps_latest_and_flushes_in_stage_order() {
        let mut board = Board::default();
        board.submit(StageId::Design, json!({"colors": {"primary": "#000"}}));
        board.submit(StageId::Ideation, json!({"appName": "Old"}));
        board.submit(StageId::Ideation, json!({"appName": "New"}));
        assert_eq!(board.pending(), 2);

        let change = board.flush();
        assert_eq!(change.added, vec!["ideation:app-name", "design:color-palette"]);
        assert_eq!(board.pending(), 0);
        assert_eq!(board.last_stage(StageId::Ideation), Some(&json!({"appName": "New"})));
    }

    #[test]
    fn unknown_stage_keys_are_ignored() {
        let mut board = Board::default();
        let mut data = StageData::new();
        data.insert("marketing".into(), json!({"appName": "X"}));
        assert!(board.sync(&data).is_empty());
        assert!(board.nodes().is_empty());
    }

    #[test]
    fn edit_projects_into_stage_record_and_hook() {
        let seen: Arc<Mutex<Vec<(StageId, Value)>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let mut board = Board::default();
        board.set_writeback(move |stage: StageId, data: &Value| {
            if let Ok(mut v) = sink.lock() {
                v.push((stage, data.clone()));
            }
        });
        board.sync_stage(StageId::Ideation, json!({"personas": [{"id": "p1", "name": "A"}]}));

        let edited = NodePayload::Persona(PersonaPayload {
            name: "Ana".into(),
            ..Default::default()
        });
        assert!(board.edit_node("persona:p1", NodeUpdate::payload(edited)));

        let record = board.last_stage(StageId::Ideation).unwrap().clone();
        assert_eq!(record["personas"][0]["name"], "Ana");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, StageId::Ideation);

        // The producer echoing the projected record back is a no-op.
        drop(seen);
        let before = Arc::clone(board.nodes());
        board.sync_stage(StageId::Ideation, record);
        assert!(Arc::ptr_eq(&before, board.nodes()));
    }

    #[test]
    fn edit_projects_into_aliased_collection() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        let mut board = Board::default();
        board.set_writeback(move |stage: StageId, _: &Value| {
            assert_eq!(stage, StageId::Screens);
            if let Ok(mut n) = counter.lock() {
                *n += 1;
            }
        });
        board.sync_stage(StageId::Screens, json!({"pages": [{"name": "Home"}]}));
        assert!(board.store().contains("screen:home"));

        let edited = NodePayload::Screen(ScreenPayload {
            name: "Landing".into(),
            ..Default::default()
        });
        assert!(board.edit_node("screen:home", NodeUpdate::payload(edited)));
        assert_eq!(*calls.lock().unwrap(), 1);
        let record = board.last_stage(StageId::Screens).unwrap();
        assert_eq!(record["pages"][0]["name"], "Landing");
        assert_eq!(record["pages"][0]["id"], "home");
        assert!(record.get("screens").is_none());
    }

    #[test]
    fn disconnect_removes_user_edge() {
        let mut board = Board::default();
        let a = board.add_note(NotePayload::default(), Some(Position::new(0.0, 0.0))).unwrap();
        let b = board.add_note(NotePayload::default(), Some(Position::new(400.0, 0.0))).unwrap();
        let edge = board.connect(&a, &b, EdgeKind::Link).unwrap();
        assert!(board.connect(&b, &a, EdgeKind::Link).is_none());

        assert!(board.disconnect(&edge));
        assert!(board.edges().is_empty());
        assert!(board.nodes().iter().all(|n| n.adjacency.is_empty()));
        assert!(!board.disconnect(&edge));
    }

    #[test]
    fn geometry_edits_do_not_project() {
        let mut board = Board::default();
        board.sync_stage(StageId::Ideation, json!({"appName": "Foo"}));
        let before = board.last_stage(StageId::Ideation).cloned();
        assert!(board.edit_node("ideation:app-name", NodeUpdate::position(Position::new(5.0, 5.0))));
        assert_eq!(board.last_stage(StageId::Ideation).cloned(), before);
    }

    #[test]
    fn superseded_layout_is_discarded() {
        let mut board = Board::default();
        board.add_note(NotePayload::default(), Some(Position::new(900.0, 900.0)));
        let stale = board.begin_layout();
        let positions = layout::compute_positions(
            board.nodes(),
            board.edges(),
            LayoutAlgorithm::StageGrouped,
            &LayoutOptions::default(),
            &stale,
        );
        let _fresh = board.begin_layout();
        assert!(stale.is_cancelled());
        assert_eq!(board.apply_layout(&stale, positions), 0);
        assert_eq!(board.nodes()[0].position, Position::new(900.0, 900.0));
    }

    #[test]
    fn reconciliation_cancels_running_layout() {
        let mut board = Board::default();
        let token = board.begin_layout();
        board.sync_stage(StageId::Ideation, json!({"appName": "Foo"}));
        assert!(token.is_cancelled());
    }

    #[test]
    fn auto_layout_moves_nodes() {
        let mut board = Board::default();
        board.add_note(NotePayload::default(), Some(Position::new(900.0, 900.0)));
        assert_eq!(board.auto_layout(LayoutAlgorithm::StageGrouped), 1);
        assert_eq!(board.nodes()[0].position, Position::new(0.0, 0.0));
    }

    #[test]
    fn file_round_trip_keeps_snapshots() {
        let mut board = Board::default();
        board.sync_stage(StageId::Ideation, json!({"appName": "Foo"}));
        let restored = Board::restore(board.to_file(), CanvasConfig::default());
        assert_eq!(restored.nodes().len(), 1);
        assert_eq!(restored.nodes()[0].kind(), NodeKind::AppName);
        assert_eq!(restored.last_stage(StageId::Ideation), board.last_stage(StageId::Ideation));
    }
}
