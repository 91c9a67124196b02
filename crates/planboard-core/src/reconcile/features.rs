use serde_json::Value;

use super::{project_item, reference_index, resolve_reference, Link, StageEntities, StageReconciler};
use crate::extract;
use crate::factory::Entity;
use crate::model::{EdgeKind, FeaturePayload, Node, NodePayload, Priority, StageId};

/// Feature list; `dependsOn` becomes dependency edges between features.
pub struct FeaturesReconciler;

const FEATURE_COLLECTIONS: [&str; 2] = ["features", "coreFeatures"];

const FEATURE_KEYS: &[&str] = &[
    "name",
    "title",
    "description",
    "priority",
    "complexity",
    "effort",
    "dependsOn",
    "dependencies",
];

fn feature_name(entity: &Entity) -> Option<&str> {
    match &entity.payload {
        NodePayload::Feature(f) => Some(&f.name),
        _ => None,
    }
}

impl StageReconciler for FeaturesReconciler {
    fn stage(&self) -> StageId {
        StageId::Features
    }

    fn entities(&self, data: &Value) -> StageEntities {
        let mut out = StageEntities::default();

        for (index, item) in extract::items(data, &FEATURE_COLLECTIONS) {
            let payload = FeaturePayload {
                name: extract::text(item, &["name", "title"])
                    .unwrap_or_else(|| format!("Feature {}", index + 1)),
                description: extract::text(item, &["description"]).unwrap_or_default(),
                priority: extract::text(item, &["priority"])
                    .and_then(|p| Priority::parse_lenient(&p))
                    .unwrap_or_default(),
                complexity: extract::text(item, &["complexity", "effort"]),
                depends_on: extract::strings(item, &["dependsOn", "dependencies"]),
            };
            let source_id = extract::source_key(item, &["name", "title"], index);
            out.entities
                .push(Entity::sourced(NodePayload::Feature(payload), source_id, index));
        }

        let index = reference_index(&out.entities, feature_name);
        for entity in &out.entities {
            let NodePayload::Feature(feature) = &entity.payload else {
                continue;
            };
            let from = entity.node_id();
            for dependency in &feature.depends_on {
                match resolve_reference(&index, dependency) {
                    Some(to) => out.links.push(Link::new(from.clone(), to.clone(), EdgeKind::Dependency)),
                    None => tracing::debug!(feature = %from, %dependency, "unresolved feature dependency"),
                }
            }
        }

        out
    }

    fn project(&self, node: &Node, data: &mut Value) -> bool {
        match &node.payload {
            NodePayload::Feature(_) => {
                project_item(node, data, &FEATURE_COLLECTIONS, &["name", "title"], FEATURE_KEYS)
            }
            _ => false,
        }
    }
}
