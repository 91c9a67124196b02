use serde_json::Value;

use super::{project_item, reference_index, resolve_reference, Link, StageEntities, StageReconciler};
use crate::extract;
use crate::factory::Entity;
use crate::model::{EdgeKind, Node, NodePayload, ScreenPayload, StageId};

/// Screens, plus user flows that chain screens together with flow edges.
pub struct ScreensReconciler;

const SCREEN_COLLECTIONS: [&str; 2] = ["screens", "pages"];

const SCREEN_KEYS: &[&str] = &[
    "name",
    "title",
    "route",
    "path",
    "purpose",
    "description",
    "components",
];

fn screen_name(entity: &Entity) -> Option<&str> {
    match &entity.payload {
        NodePayload::Screen(s) => Some(&s.name),
        _ => None,
    }
}

/// A flow step is either a bare screen reference or an object naming one.
fn step_reference(step: &Value) -> Option<String> {
    match step {
        Value::Object(_) => extract::text(step, &["screenId", "screen", "id", "name"]),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

impl StageReconciler for ScreensReconciler {
    fn stage(&self) -> StageId {
        StageId::Screens
    }

    fn entities(&self, data: &Value) -> StageEntities {
        let mut out = StageEntities::default();

        for (index, item) in extract::items(data, &SCREEN_COLLECTIONS) {
            let payload = ScreenPayload {
                name: extract::text(item, &["name", "title"])
                    .unwrap_or_else(|| format!("Screen {}", index + 1)),
                route: extract::text(item, &["route", "path"]),
                purpose: extract::text(item, &["purpose", "description"]).unwrap_or_default(),
                components: extract::strings(item, &["components"]),
            };
            let source_id = extract::source_key(item, &["name", "title"], index);
            out.entities
                .push(Entity::sourced(NodePayload::Screen(payload), source_id, index));
        }

        let mut index = reference_index(&out.entities, screen_name);
        // Flows may also point at a screen by its route.
        for entity in &out.entities {
            if let NodePayload::Screen(ScreenPayload { route: Some(route), .. }) = &entity.payload {
                index.entry(route.clone()).or_insert_with(|| entity.node_id());
            }
        }

        for (flow_index, flow) in extract::items(data, &["userFlows", "flows"]) {
            let name = extract::text(flow, &["name", "title"])
                .unwrap_or_else(|| format!("Flow {}", flow_index + 1));
            let steps: Vec<String> = match extract::field(flow, "steps") {
                Some(Value::Array(steps)) => steps
                    .iter()
                    .filter_map(step_reference)
                    .filter_map(|raw| match resolve_reference(&index, &raw) {
                        Some(id) => Some(id.clone()),
                        None => {
                            tracing::debug!(flow = %name, step = %raw, "flow step names no screen");
                            None
                        }
                    })
                    .collect(),
                _ => Vec::new(),
            };
            for pair in steps.windows(2) {
                if pair[0] != pair[1] {
                    out.links
                        .push(Link::new(pair[0].clone(), pair[1].clone(), EdgeKind::Flow).labelled(name.clone()));
                }
            }
        }

        out
    }

    fn project(&self, node: &Node, data: &mut Value) -> bool {
        match &node.payload {
            NodePayload::Screen(_) => project_item(node, data, &SCREEN_COLLECTIONS, &["name", "title"], SCREEN_KEYS),
            _ => false,
        }
    }
}
