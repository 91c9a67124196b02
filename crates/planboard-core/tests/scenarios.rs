use planboard_core::interaction::{Gesture, InteractionEffect, Key, PointerEvent};
use planboard_core::model::NotePayload;
use planboard_core::{
    Board, EdgeKind, GraphStore, InputEvent, LayoutAlgorithm, NodeKind, NodeUpdate, Owner, Position, Size, StageData,
    StageId,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn ids(board: &Board) -> Vec<String> {
    board.nodes().iter().map(|n| n.id.clone()).collect()
}

#[test]
fn app_name_then_tagline() {
    let mut board = Board::default();

    let change = board.sync_stage(StageId::Ideation, json!({"appName": "Foo"}));
    assert_eq!(change.added, vec!["ideation:app-name"]);
    assert_eq!(board.nodes().len(), 1);
    let app = Arc::clone(&board.nodes()[0]);
    assert_eq!(app.kind(), NodeKind::AppName);
    assert_eq!(app.payload.label(), "Foo");

    let change = board.sync_stage(StageId::Ideation, json!({"appName": "Foo", "tagline": "Bar"}));
    assert_eq!(change.added, vec!["ideation:tagline"]);
    assert!(change.updated.is_empty());
    let kept = board.store().node("ideation:app-name").unwrap();
    assert!(Arc::ptr_eq(&app, kept));
    assert_eq!(board.store().node("ideation:tagline").unwrap().payload.label(), "Bar");
}

#[test]
fn persona_collection_updates_and_removes() {
    let mut board = Board::default();
    board.sync_stage(
        StageId::Ideation,
        json!({"personas": [{"id": "p1", "name": "A"}, {"id": "p2", "name": "B"}]}),
    );
    assert_eq!(ids(&board), vec!["persona:p1", "persona:p2"]);
    let p1_position = board.store().node("persona:p1").unwrap().position;

    let change = board.sync_stage(StageId::Ideation, json!({"personas": [{"id": "p1", "name": "A2"}]}));
    assert_eq!(change.updated, vec!["persona:p1"]);
    assert_eq!(change.removed, vec!["persona:p2"]);
    assert_eq!(ids(&board), vec!["persona:p1"]);
    let p1 = board.store().node("persona:p1").unwrap();
    assert_eq!(p1.payload.label(), "A2");
    assert_eq!(p1.position, p1_position);
}

#[test]
fn deleting_connected_source_drops_edge() {
    let mut board = Board::default();
    let a = board.add_note(NotePayload::default(), Some(Position::new(0.0, 0.0))).unwrap();
    let b = board.add_note(NotePayload::default(), Some(Position::new(90.0, 0.0))).unwrap();
    for id in [&a, &b] {
        assert!(board.edit_node(id, NodeUpdate::size(Size::new(50.0, 50.0))));
    }

    board.handle(InputEvent::StartConnection(a.clone()));
    assert_eq!(board.interaction().gesture(), &Gesture::Connecting { from: a.clone() });
    let effect = board.handle(InputEvent::EndConnection(b.clone()));
    assert!(matches!(effect, InteractionEffect::EdgeCreated { .. }));
    assert!(board.interaction().is_idle());
    assert_eq!(board.edges().len(), 1);
    assert!(board.store().node(&b).unwrap().adjacency.contains(&a));

    board.select(Some(a.as_str()));
    let effect = board.handle(InputEvent::KeyDown(Key::Delete));
    assert_eq!(effect, InteractionEffect::NodeRemoved { id: a.clone() });
    assert!(board.edges().is_empty());
    let target = board.store().node(&b).unwrap();
    assert!(target.adjacency.is_empty());
}

#[test]
fn pointer_drag_moves_node_in_canvas_space() {
    let mut board = Board::default();
    let id = board.add_note(NotePayload::default(), Some(Position::new(100.0, 100.0))).unwrap();

    board.handle(InputEvent::PointerDown(PointerEvent::primary(110.0, 110.0)));
    assert!(matches!(board.interaction().gesture(), Gesture::DraggingNode { .. }));
    board.handle(InputEvent::PointerMove(Position::new(130.0, 90.0)));
    board.handle(InputEvent::PointerUp);

    assert!(board.interaction().is_idle());
    assert_eq!(board.store().node(&id).unwrap().position, Position::new(120.0, 80.0));
}

#[test]
fn same_data_twice_is_idempotent() {
    let data: StageData = serde_json::from_value(json!({
        "ideation": {"appName": "Foo", "personas": [{"name": "Ana"}]},
        "features": {"features": [{"name": "Login"}, {"name": "Search", "dependsOn": ["Login"]}]},
        "schema": {"tables": [{"name": "users", "columns": [{"name": "id"}]}]}
    }))
    .unwrap();

    let mut board = Board::default();
    let first = board.sync(&data);
    assert!(!first.added.is_empty());
    let nodes = Arc::clone(board.nodes());
    let edges = board.edges().to_vec();

    // A fresh board restored from disk must short-circuit too.
    let mut restored = Board::restore(board.to_file(), Default::default());
    assert!(board.sync(&data).is_empty());
    assert!(Arc::ptr_eq(&nodes, board.nodes()));
    assert_eq!(board.edges(), edges.as_slice());
    assert!(restored.sync(&data).is_empty());
}

#[test]
fn moved_nodes_keep_position_across_updates() {
    let mut board = Board::default();
    board.sync_stage(StageId::Features, json!({"features": [{"id": "f1", "name": "Login"}]}));
    board.edit_node("feature:f1", NodeUpdate::position(Position::new(777.0, 333.0)));

    board.sync_stage(
        StageId::Features,
        json!({"features": [{"id": "f1", "name": "Login", "priority": "must"}]}),
    );
    let node = board.store().node("feature:f1").unwrap();
    assert_eq!(node.position, Position::new(777.0, 333.0));
}

#[test]
fn stages_only_touch_their_own_nodes() {
    let mut board = Board::default();
    board.sync_stage(StageId::Ideation, json!({"appName": "Foo"}));
    let note = board.add_note(NotePayload::default(), None).unwrap();
    board.sync_stage(StageId::Features, json!({"features": [{"name": "Login"}]}));
    let user_edge = board.connect(&note, "ideation:app-name", EdgeKind::Link).unwrap();

    // Drag the ideation node by hand before the features passes.
    let start = board.store().node("ideation:app-name").unwrap().position;
    board.handle(InputEvent::PointerDown(PointerEvent::primary(start.x + 10.0, start.y + 10.0)));
    board.handle(InputEvent::PointerMove(Position::new(start.x + 50.0, start.y + 35.0)));
    board.handle(InputEvent::PointerUp);

    let app = Arc::clone(board.store().node("ideation:app-name").unwrap());
    let note_node = Arc::clone(board.store().node(&note).unwrap());
    let dragged = app.position;
    assert!((dragged.x - start.x - 40.0).abs() < 1e-9 && (dragged.y - start.y - 25.0).abs() < 1e-9);

    let passes = [
        json!({"features": [{"name": "Login", "priority": "must"}, {"name": "Search"}]}),
        json!({"features": []}),
    ];
    for data in passes {
        board.sync_stage(StageId::Features, data);
        let kept_app = board.store().node("ideation:app-name").unwrap();
        let kept_note = board.store().node(&note).unwrap();
        assert!(Arc::ptr_eq(&app, kept_app));
        assert!(Arc::ptr_eq(&note_node, kept_note));
        assert_eq!(kept_app.position, dragged);
    }
    assert!(board.store().edge(&user_edge).is_some());
    assert!(board.nodes().iter().all(|n| n.kind() != NodeKind::Feature));
    assert_eq!(board.last_stage(StageId::Ideation), Some(&json!({"appName": "Foo"})));
}

#[test]
fn replace_graph_prunes_edges_and_resets_gesture() {
    let mut board = Board::default();
    let a = board.add_note(NotePayload::default(), Some(Position::new(0.0, 0.0))).unwrap();
    let b = board.add_note(NotePayload::default(), Some(Position::new(400.0, 0.0))).unwrap();
    board.connect(&a, &b, EdgeKind::Link).unwrap();

    board.handle(InputEvent::PointerDown(PointerEvent::primary(10.0, 10.0)));
    assert!(matches!(board.interaction().gesture(), Gesture::DraggingNode { id, .. } if *id == a));
    assert_eq!(board.interaction().selection(), Some(a.as_str()));
    let token = board.begin_layout();

    let mut file = board.to_file();
    file.nodes.retain(|n| n.id != a);
    board.replace_graph(file.nodes, file.edges);

    assert_eq!(ids(&board), vec![b.clone()]);
    assert!(board.edges().is_empty());
    assert!(board.store().node(&b).unwrap().adjacency.is_empty());
    assert!(board.interaction().is_idle());
    assert_eq!(board.interaction().selection(), None);
    assert!(token.is_cancelled());
    assert_eq!(board.handle(InputEvent::PointerUp), InteractionEffect::None);
}

#[test]
fn stage_edges_follow_stage_data() {
    let mut board = Board::default();
    board.sync_stage(
        StageId::Features,
        json!({"features": [{"id": "a", "name": "A"}, {"id": "b", "name": "B", "dependsOn": ["A"]}]}),
    );
    assert_eq!(board.edges().len(), 1);
    let edge = &board.edges()[0];
    assert_eq!(edge.owner, Owner::Stage(StageId::Features));
    assert_eq!(edge.kind, EdgeKind::Dependency);

    board.sync_stage(
        StageId::Features,
        json!({"features": [{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]}),
    );
    assert!(board.edges().is_empty());
    assert!(board.nodes().iter().all(|n| n.adjacency.is_empty()));
}

#[test]
fn new_nodes_do_not_overlap() {
    let personas: Vec<serde_json::Value> = (0..12).map(|i| json!({"name": format!("P{i}")})).collect();
    let mut board = Board::default();
    board.sync_stage(StageId::Ideation, json!({ "personas": personas }));
    let nodes = board.nodes();
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            assert!(!a.rect().intersects(&b.rect()), "{} overlaps {}", a.id, b.id);
        }
    }
}

#[test]
fn every_layout_commits_finite_positions() {
    let mut board = Board::default();
    board.sync_stage(
        StageId::Screens,
        json!({
            "screens": [{"name": "Home"}, {"name": "Login"}, {"name": "Settings"}],
            "userFlows": [{"name": "onboarding", "steps": ["Home", "Login", "Settings"]}]
        }),
    );
    board.add_note(NotePayload::default(), None);

    for algorithm in LayoutAlgorithm::NAMES.iter().map(|name| name.parse::<LayoutAlgorithm>().unwrap()) {
        board.auto_layout(algorithm);
        assert!(
            board
                .nodes()
                .iter()
                .all(|n| n.position.x.is_finite() && n.position.y.is_finite()),
            "{algorithm}"
        );
    }
}

#[test]
fn restore_prunes_dangling_edges() {
    let mut board = Board::default();
    let a = board.add_note(NotePayload::default(), None).unwrap();
    let b = board.add_note(NotePayload::default(), None).unwrap();
    board.connect(&a, &b, EdgeKind::Link);
    let mut file = board.to_file();
    file.nodes.retain(|n| n.id != b);

    let store = GraphStore::from_parts(file.nodes, file.edges);
    assert!(store.edges().is_empty());
    assert!(store.node(&a).unwrap().adjacency.is_empty());
}
