use serde_json::Value;

use super::{project_item, project_text, StageEntities, StageReconciler};
use crate::extract;
use crate::factory::Entity;
use crate::model::{Node, NodePayload, PersonaPayload, StageId, TextPayload};

/// App identity (name, tagline, problem, audience) and personas.
pub struct IdeationReconciler;

const PERSONA_COLLECTIONS: [&str; 2] = ["personas", "userPersonas"];

const TEXT_FIELDS: [(&str, fn(TextPayload) -> NodePayload); 4] = [
    ("appName", NodePayload::AppName),
    ("tagline", NodePayload::Tagline),
    ("problemStatement", NodePayload::ProblemStatement),
    ("targetAudience", NodePayload::TargetAudience),
];

const PERSONA_KEYS: &[&str] = &["name", "role", "occupation", "goals", "painPoints", "frustrations"];

impl StageReconciler for IdeationReconciler {
    fn stage(&self) -> StageId {
        StageId::Ideation
    }

    fn entities(&self, data: &Value) -> StageEntities {
        let mut out = StageEntities::default();

        for (key, wrap) in TEXT_FIELDS {
            if let Some(text) = extract::text(data, &[key]) {
                out.entities.push(Entity::singleton(wrap(TextPayload { text })));
            }
        }

        for (index, item) in extract::items(data, &PERSONA_COLLECTIONS) {
            let payload = PersonaPayload {
                name: extract::text(item, &["name"]).unwrap_or_else(|| format!("Persona {}", index + 1)),
                role: extract::text(item, &["role", "occupation"]),
                goals: extract::strings(item, &["goals"]),
                pain_points: extract::strings(item, &["painPoints", "frustrations"]),
            };
            let source_id = extract::source_key(item, &["name"], index);
            out.entities
                .push(Entity::sourced(NodePayload::Persona(payload), source_id, index));
        }

        out
    }

    fn project(&self, node: &Node, data: &mut Value) -> bool {
        match &node.payload {
            NodePayload::AppName(t) => project_text(data, "appName", &t.text),
            NodePayload::Tagline(t) => project_text(data, "tagline", &t.text),
            NodePayload::ProblemStatement(t) => project_text(data, "problemStatement", &t.text),
            NodePayload::TargetAudience(t) => project_text(data, "targetAudience", &t.text),
            NodePayload::Persona(_) => project_item(node, data, &PERSONA_COLLECTIONS, &["name"], PERSONA_KEYS),
            _ => false,
        }
    }
}
