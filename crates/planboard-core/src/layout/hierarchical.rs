use std::collections::BTreeMap;

use super::{CancelToken, LayoutGraph, LayoutOptions, PositionMap, RankKey};
use crate::model::Position;

/// Ranked columns, left to right; members of a column stacked top to bottom
/// in id order.
pub(super) fn run(
    graph: &LayoutGraph<'_>,
    key: RankKey,
    options: &LayoutOptions,
    cancel: &CancelToken,
) -> Option<PositionMap> {
    if cancel.is_cancelled() {
        return None;
    }
    let ranks = match key {
        RankKey::Kind => graph.nodes.iter().map(|n| n.kind().rank() as usize).collect(),
        RankKey::EdgeDepth => edge_depth(graph, cancel)?,
    };

    let mut columns: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, rank) in ranks.into_iter().enumerate() {
        columns.entry(rank).or_default().push(i);
    }

    let mut positions = vec![options.origin; graph.len()];
    let mut x = options.origin.x;
    for members in columns.values() {
        let mut y = options.origin.y;
        let mut width: f64 = 0.0;
        for &i in members {
            let size = graph.nodes[i].size;
            positions[i] = Position::new(x, y);
            y += size.height + options.row_gap;
            width = width.max(size.width);
        }
        x += width + options.column_gap;
    }
    Some(graph.into_map(positions))
}

/// Longest directed path reaching each node. Relaxation is bounded to `n`
/// sweeps, so cycles stop growing instead of looping.
fn edge_depth(graph: &LayoutGraph<'_>, cancel: &CancelToken) -> Option<Vec<usize>> {
    let n = graph.len();
    let mut depth = vec![0usize; n];
    for _ in 0..n {
        if cancel.is_cancelled() {
            return None;
        }
        let mut changed = false;
        for &(from, to, directed) in &graph.edges {
            if directed && depth[to] < depth[from] + 1 && depth[from] + 1 < n {
                depth[to] = depth[from] + 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    Some(depth)
}
