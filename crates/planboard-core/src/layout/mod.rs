//! Whole-graph auto-layout.
//!
//! Every algorithm works on an immutable snapshot and only produces
//! positions; node identity, kind and payload never change. Results are
//! deterministic for a given graph: nodes are always visited in id order.

mod force;
mod hierarchical;
mod radial;
mod staged;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::PlanboardError;
use crate::model::{Edge, Node, Position};

pub type PositionMap = BTreeMap<String, Position>;

/// What the hierarchical layout ranks nodes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankKey {
    /// Each kind's fixed rank (identity, personas, features, ...).
    #[default]
    Kind,
    /// Longest directed path reaching the node.
    EdgeDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutAlgorithm {
    Hierarchical(RankKey),
    ForceDirected,
    Radial,
    StageGrouped,
}

impl LayoutAlgorithm {
    pub const NAMES: [&'static str; 5] = ["hierarchical", "depth", "force", "radial", "staged"];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutAlgorithm::Hierarchical(RankKey::Kind) => "hierarchical",
            LayoutAlgorithm::Hierarchical(RankKey::EdgeDepth) => "depth",
            LayoutAlgorithm::ForceDirected => "force",
            LayoutAlgorithm::Radial => "radial",
            LayoutAlgorithm::StageGrouped => "staged",
        }
    }
}

impl fmt::Display for LayoutAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutAlgorithm {
    type Err = PlanboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hierarchical" | "tree" => Ok(LayoutAlgorithm::Hierarchical(RankKey::Kind)),
            "depth" => Ok(LayoutAlgorithm::Hierarchical(RankKey::EdgeDepth)),
            "force" | "force-directed" => Ok(LayoutAlgorithm::ForceDirected),
            "radial" => Ok(LayoutAlgorithm::Radial),
            "staged" | "stage" | "grouped" => Ok(LayoutAlgorithm::StageGrouped),
            other => Err(PlanboardError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Tunables shared by the layout algorithms. None of the defaults are
/// load-bearing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    /// Top-left corner of the laid-out graph.
    pub origin: Position,
    pub column_gap: f64,
    pub row_gap: f64,
    /// Force-directed iteration budget.
    pub iterations: usize,
    /// Force-directed convergence threshold on the largest displacement.
    pub epsilon: f64,
    pub ideal_edge_length: f64,
    pub ring_gap: f64,
    pub component_gap: f64,
    /// Radial components wrap onto a new row past this width.
    pub row_width: f64,
    pub group_gap: f64,
    pub cell_gap: f64,
    /// Radial roots; components without one fall back to their
    /// highest-degree node.
    pub roots: Vec<String>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            origin: Position::new(0.0, 0.0),
            column_gap: 120.0,
            row_gap: 48.0,
            iterations: 300,
            epsilon: 0.5,
            ideal_edge_length: 320.0,
            ring_gap: 360.0,
            component_gap: 200.0,
            row_width: 4000.0,
            group_gap: 240.0,
            cell_gap: 40.0,
            roots: Vec::new(),
        }
    }
}

/// Cooperative cancellation flag, checked by every algorithm between
/// iterations. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// True when both tokens are clones of the same run.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Compute new top-left positions for every node, or `None` if `cancel`
/// fired before the run finished.
pub fn compute_positions(
    nodes: &[Arc<Node>],
    edges: &[Edge],
    algorithm: LayoutAlgorithm,
    options: &LayoutOptions,
    cancel: &CancelToken,
) -> Option<PositionMap> {
    let graph = LayoutGraph::new(nodes, edges);
    let positions = match algorithm {
        LayoutAlgorithm::Hierarchical(key) => hierarchical::run(&graph, key, options, cancel),
        LayoutAlgorithm::ForceDirected => force::run(&graph, options, cancel),
        LayoutAlgorithm::Radial => radial::run(&graph, options, cancel),
        LayoutAlgorithm::StageGrouped => staged::run(&graph, options, cancel),
    };
    match &positions {
        Some(p) => tracing::info!(%algorithm, nodes = p.len(), "layout computed"),
        None => tracing::debug!(%algorithm, "layout cancelled"),
    }
    positions
}

/// The same nodes, in the same order, with new positions. Nodes that did
/// not move keep their `Arc`.
pub fn layout(
    nodes: &[Arc<Node>],
    edges: &[Edge],
    algorithm: LayoutAlgorithm,
    options: &LayoutOptions,
    cancel: &CancelToken,
) -> Option<Vec<Arc<Node>>> {
    let positions = compute_positions(nodes, edges, algorithm, options, cancel)?;
    Some(
        nodes
            .iter()
            .map(|node| match positions.get(&node.id) {
                Some(p) if *p != node.position => {
                    let mut moved = Node::clone(node);
                    moved.position = *p;
                    Arc::new(moved)
                }
                _ => Arc::clone(node),
            })
            .collect(),
    )
}

/// Nodes in id order plus the edges whose endpoints both exist, as index
/// pairs.
pub(crate) struct LayoutGraph<'a> {
    pub nodes: Vec<&'a Node>,
    pub edges: Vec<(usize, usize, bool)>,
}

impl<'a> LayoutGraph<'a> {
    fn new(nodes: &'a [Arc<Node>], edges: &[Edge]) -> Self {
        let mut sorted: Vec<&Node> = nodes.iter().map(|n| n.as_ref()).collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted.dedup_by(|a, b| a.id == b.id);
        let index: HashMap<&str, usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let edges = edges
            .iter()
            .filter_map(|e| {
                let from = *index.get(e.from.as_str())?;
                let to = *index.get(e.to.as_str())?;
                (from != to).then_some((from, to, e.kind.is_directed()))
            })
            .collect();
        Self { nodes: sorted, edges }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Undirected neighbour lists, each sorted and deduplicated.
    pub fn neighbours(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.nodes.len()];
        for &(a, b, _) in &self.edges {
            out[a].push(b);
            out[b].push(a);
        }
        for list in &mut out {
            list.sort_unstable();
            list.dedup();
        }
        out
    }

    /// Map per-index top-left positions back to node ids.
    pub fn into_map(&self, positions: Vec<Position>) -> PositionMap {
        self.nodes
            .iter()
            .zip(positions)
            .map(|(n, p)| (n.id.clone(), p))
            .collect()
    }
}
