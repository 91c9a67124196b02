use serde_json::Value;

use super::{project_item, reference_index, resolve_reference, Link, StageEntities, StageReconciler};
use crate::extract;
use crate::factory::Entity;
use crate::model::{ColumnPayload, EdgeKind, Node, NodePayload, StageId, TablePayload};

/// Database tables; foreign-key columns become reference edges.
pub struct SchemaReconciler;

const TABLE_COLLECTIONS: [&str; 2] = ["tables", "entities"];

const TABLE_KEYS: &[&str] = &["name", "tableName", "columns", "fields"];

fn table_name(entity: &Entity) -> Option<&str> {
    match &entity.payload {
        NodePayload::DataTable(t) => Some(&t.name),
        _ => None,
    }
}

fn column(item: &Value, index: usize) -> ColumnPayload {
    ColumnPayload {
        name: extract::text(item, &["name"]).unwrap_or_else(|| format!("column{}", index + 1)),
        data_type: extract::text(item, &["type", "dataType"])
            .unwrap_or_else(crate::model::default_column_type),
        primary_key: extract::flag(item, &["primaryKey", "pk"]).unwrap_or(false),
        nullable: extract::flag(item, &["nullable"]).unwrap_or(true),
        references: extract::text(item, &["references", "foreignKey"]),
    }
}

/// The table part of a `table` or `table.column` reference.
fn referenced_table(raw: &str) -> &str {
    raw.split_once('.').map_or(raw, |(table, _)| table)
}

impl StageReconciler for SchemaReconciler {
    fn stage(&self) -> StageId {
        StageId::Schema
    }

    fn entities(&self, data: &Value) -> StageEntities {
        let mut out = StageEntities::default();

        for (index, item) in extract::items(data, &TABLE_COLLECTIONS) {
            let columns = extract::items(item, &["columns", "fields"])
                .into_iter()
                .map(|(i, c)| column(c, i))
                .collect();
            let payload = TablePayload {
                name: extract::text(item, &["name", "tableName"])
                    .unwrap_or_else(|| format!("table{}", index + 1)),
                columns,
            };
            let source_id = extract::source_key(item, &["name", "tableName"], index);
            out.entities
                .push(Entity::sourced(NodePayload::DataTable(payload), source_id, index));
        }

        let index = reference_index(&out.entities, table_name);
        for entity in &out.entities {
            let NodePayload::DataTable(table) = &entity.payload else {
                continue;
            };
            let from = entity.node_id();
            for col in &table.columns {
                let Some(raw) = col.references.as_deref() else {
                    continue;
                };
                match resolve_reference(&index, referenced_table(raw)) {
                    Some(to) if *to != from => out
                        .links
                        .push(Link::new(from.clone(), to.clone(), EdgeKind::Reference).labelled(col.name.clone())),
                    Some(_) => {}
                    None => tracing::debug!(table = %from, reference = %raw, "foreign key names no table"),
                }
            }
        }

        out
    }

    fn project(&self, node: &Node, data: &mut Value) -> bool {
        match &node.payload {
            NodePayload::DataTable(_) => {
                project_item(node, data, &TABLE_COLLECTIONS, &["name", "tableName"], TABLE_KEYS)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn columns_default_and_references_link_tables() {
        let out = SchemaReconciler.entities(&json!({
            "tables": [
                {"name": "users", "columns": [{"name": "id", "pk": true, "nullable": "no"}]},
                {"name": "orders", "columns": [
                    {"name": "user_id", "references": "users.id"},
                    {"name": "parent_id", "references": "orders"},
                    {"name": "ghost_id", "foreignKey": "ghosts.id"},
                    {}
                ]}
            ]
        }));
        assert_eq!(out.entities.len(), 2);
        match &out.entities[1].payload {
            NodePayload::DataTable(t) => {
                assert_eq!(t.columns.len(), 4);
                assert_eq!(t.columns[3].name, "column4");
                assert_eq!(t.columns[3].data_type, "text");
                assert!(t.columns[3].nullable);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        match &out.entities[0].payload {
            NodePayload::DataTable(t) => {
                assert!(t.columns[0].primary_key);
                assert!(!t.columns[0].nullable);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].from, "table:orders");
        assert_eq!(out.links[0].to, "table:users");
        assert_eq!(out.links[0].label.as_deref(), Some("user_id"));
    }

    #[test]
    fn accepts_entities_alias() {
        let out = SchemaReconciler.entities(&json!({"entities": [{"tableName": "posts"}]}));
        assert_eq!(out.entities[0].node_id(), "table:posts");
    }

    #[test]
    fn project_finds_tables_under_alias() {
        let factory = crate::factory::NodeFactory::default();
        let mut data = json!({"entities": [{"tableName": "posts"}]});
        let node = factory.data_table(
            TablePayload {
                name: "articles".into(),
                columns: Vec::new(),
            },
            "posts",
            0,
            &[],
        );
        assert!(SchemaReconciler.project(&node, &mut data));
        assert_eq!(data["entities"][0]["name"], "articles");
        assert_eq!(data["entities"][0]["id"], "posts");
        assert!(data["entities"][0].get("tableName").is_none());
    }
}
