use serde_json::Value;

use super::{project_item, StageEntities, StageReconciler};
use crate::extract;
use crate::factory::Entity;
use crate::model::{AuthPayload, Node, NodePayload, RolePayload, StageId};

/// The auth strategy singleton and the role collection.
pub struct AuthReconciler;

const ROLE_COLLECTIONS: [&str; 2] = ["roles", "userRoles"];

const STRATEGY_KEYS: &[&str] = &["strategy", "type", "methods", "providers", "mfa"];
const ROLE_KEYS: &[&str] = &["name", "permissions"];

impl StageReconciler for AuthReconciler {
    fn stage(&self) -> StageId {
        StageId::Auth
    }

    fn entities(&self, data: &Value) -> StageEntities {
        let mut out = StageEntities::default();

        let strategy = extract::text(data, &["strategy", "type"]);
        let methods = extract::strings(data, &["methods", "authMethods"]);
        let providers = extract::strings(data, &["providers", "oauthProviders"]);
        let mfa = extract::flag(data, &["mfa", "mfaEnabled"]);
        if strategy.is_some() || !methods.is_empty() || !providers.is_empty() || mfa.is_some() {
            out.entities.push(Entity::singleton(NodePayload::AuthStrategy(AuthPayload {
                strategy,
                methods,
                providers,
                mfa: mfa.unwrap_or(false),
            })));
        }

        for (index, item) in extract::items(data, &ROLE_COLLECTIONS) {
            let payload = RolePayload {
                name: extract::text(item, &["name"]).unwrap_or_else(|| format!("Role {}", index + 1)),
                permissions: extract::strings(item, &["permissions"]),
            };
            let source_id = extract::source_key(item, &["name"], index);
            out.entities
                .push(Entity::sourced(NodePayload::Role(payload), source_id, index));
        }

        out
    }

    fn project(&self, node: &Node, data: &mut Value) -> bool {
        match &node.payload {
            NodePayload::AuthStrategy(_) => {
                let map = extract::ensure_object(data);
                for key in STRATEGY_KEYS {
                    extract::remove_field(map, key);
                }
                extract::merge_into(map, node.payload.data_value());
                true
            }
            NodePayload::Role(_) => project_item(node, data, &ROLE_COLLECTIONS, &["name"], ROLE_KEYS),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use serde_json::json;

    #[test]
    fn strategy_only_when_some_field_present() {
        let out = AuthReconciler.entities(&json!({"roles": [{"name": "Admin", "permissions": ["*"]}]}));
        let kinds: Vec<NodeKind> = out.entities.iter().map(Entity::kind).collect();
        assert_eq!(kinds, vec![NodeKind::Role]);
        assert_eq!(out.entities[0].node_id(), "role:admin");

        let out = AuthReconciler.entities(&json!({"mfa": "required"}));
        match &out.entities[0].payload {
            NodePayload::AuthStrategy(a) => {
                assert!(a.mfa);
                assert_eq!(a.strategy, None);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn project_replaces_strategy_fields() {
        let factory = crate::factory::NodeFactory::default();
        let mut data = json!({"type": "session", "methods": ["email"], "roles": []});
        let node = factory.auth_strategy(
            AuthPayload {
                strategy: Some("jwt".into()),
                ..Default::default()
            },
            &[],
        );
        assert!(AuthReconciler.project(&node, &mut data));
        assert_eq!(data["strategy"], "jwt");
        assert!(data.get("type").is_none());
        assert!(data.get("methods").is_none());
        assert_eq!(data["roles"], json!([]));
    }

    #[test]
    fn project_finds_roles_under_alias() {
        let factory = crate::factory::NodeFactory::default();
        let mut data = json!({"user_roles": [{"name": "Admin"}]});
        let node = factory.role(
            RolePayload {
                name: "Owner".into(),
                permissions: vec!["*".into()],
            },
            "admin",
            0,
            &[],
        );
        assert!(AuthReconciler.project(&node, &mut data));
        assert_eq!(data["user_roles"][0]["name"], "Owner");
        assert_eq!(data["user_roles"][0]["permissions"], json!(["*"]));
    }
}
