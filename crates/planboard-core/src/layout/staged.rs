use super::{CancelToken, LayoutGraph, LayoutOptions, PositionMap};
use crate::model::{Owner, Position, StageId};

/// One square-ish grid per owner, in stage order with user nodes last.
/// Edges are ignored.
pub(super) fn run(graph: &LayoutGraph<'_>, options: &LayoutOptions, cancel: &CancelToken) -> Option<PositionMap> {
    if cancel.is_cancelled() {
        return None;
    }
    let owners = StageId::ALL
        .into_iter()
        .map(Owner::Stage)
        .chain(std::iter::once(Owner::User));

    let mut positions = vec![options.origin; graph.len()];
    let mut x = options.origin.x;

    for owner in owners {
        if cancel.is_cancelled() {
            return None;
        }
        let mut members: Vec<usize> = (0..graph.len())
            .filter(|&i| graph.nodes[i].provenance.owner == owner)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by_key(|&i| graph.nodes[i].kind().rank());

        let columns = (members.len() as f64).sqrt().ceil() as usize;
        let cell_width = members
            .iter()
            .map(|&i| graph.nodes[i].size.width)
            .fold(0.0, f64::max)
            + options.cell_gap;
        let cell_height = members
            .iter()
            .map(|&i| graph.nodes[i].size.height)
            .fold(0.0, f64::max)
            + options.cell_gap;

        for (slot, &i) in members.iter().enumerate() {
            positions[i] = Position::new(
                x + (slot % columns) as f64 * cell_width,
                options.origin.y + (slot / columns) as f64 * cell_height,
            );
        }
        tracing::debug!(%owner, nodes = members.len(), "stage group placed");
        x += columns as f64 * cell_width - options.cell_gap + options.group_gap;
    }

    Some(graph.into_map(positions))
}
