//! React-Flow shaped view of the graph for renderers that expect
//! `{id, type, position, data}` nodes and `{id, source, target}` edges.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::model::{Edge, Node, Position};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowDocument {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl From<&Node> for FlowNode {
    fn from(node: &Node) -> Self {
        let mut data = match node.payload.data_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        data.insert("label".to_string(), Value::String(node.payload.label().to_string()));
        data.insert("owner".to_string(), Value::String(node.owner().to_string()));
        if let Some(source_id) = &node.provenance.source_id {
            data.insert("sourceId".to_string(), Value::String(source_id.clone()));
        }
        FlowNode {
            id: node.id.clone(),
            node_type: node.kind().to_string(),
            position: node.position,
            width: node.size.width,
            height: node.size.height,
            data: Value::Object(data),
        }
    }
}

impl From<&Edge> for FlowEdge {
    fn from(edge: &Edge) -> Self {
        let edge_type = serde_json::to_value(edge.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        FlowEdge {
            id: edge.id.clone(),
            source: edge.from.clone(),
            target: edge.to.clone(),
            edge_type,
            label: edge.label.clone(),
        }
    }
}

impl FlowDocument {
    pub fn from_graph(nodes: &[Arc<Node>], edges: &[Edge]) -> Self {
        Self {
            nodes: nodes.iter().map(|n| FlowNode::from(n.as_ref())).collect(),
            edges: edges.iter().map(FlowEdge::from).collect(),
        }
    }
}
