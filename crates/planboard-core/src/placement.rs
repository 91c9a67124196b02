//! Smart placement: find a spot for a new node that does not overlap the
//! nodes already on the canvas.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{Cardinality, Node, NodeKind, Position, Rect, Size};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementConfig {
    /// Spacing added between probe candidates.
    pub gap: f64,
    /// Candidates farther than this from the anchor are never probed.
    pub max_radius: f64,
    /// Width, in cells, of the grid collections fill before wrapping.
    pub grid_columns: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            gap: 24.0,
            max_radius: 2400.0,
            grid_columns: 4,
        }
    }
}

/// Resolve a non-overlapping position for a node of `desired` size near
/// `anchor`. Returns the anchor itself when it is free, and also when the
/// search radius is exhausted.
pub fn resolve(
    existing: &[Arc<Node>],
    desired: Size,
    kind: NodeKind,
    anchor: Position,
    config: &PlacementConfig,
) -> Position {
    let obstacles: Vec<Rect> = existing.iter().map(|n| n.rect()).collect();
    resolve_among(&obstacles, desired, kind, anchor, config)
}

pub fn resolve_among(
    obstacles: &[Rect],
    desired: Size,
    kind: NodeKind,
    anchor: Position,
    config: &PlacementConfig,
) -> Position {
    if is_free(obstacles, anchor, desired) {
        return anchor;
    }

    let step_x = (desired.width + config.gap).max(1.0);
    let step_y = (desired.height + config.gap).max(1.0);

    let grid = match kind.cardinality() {
        Cardinality::Collection => grid_offsets(step_x, step_y, config),
        Cardinality::Singleton | Cardinality::Freeform => Vec::new(),
    };

    let found = grid
        .into_iter()
        .chain(ring_offsets(step_x, step_y, config))
        .map(|(dx, dy)| anchor.offset(dx, dy))
        .filter(|candidate| candidate.distance(anchor) <= config.max_radius)
        .find(|candidate| is_free(obstacles, *candidate, desired));

    match found {
        Some(position) => position,
        None => {
            tracing::debug!(
                kind = %kind,
                x = anchor.x,
                y = anchor.y,
                "placement search exhausted, overlapping at anchor"
            );
            anchor
        }
    }
}

fn is_free(obstacles: &[Rect], at: Position, size: Size) -> bool {
    let candidate = Rect::new(at, size);
    !obstacles.iter().any(|o| o.intersects(&candidate))
}

/// Row-major cells right of and below the anchor, excluding the anchor cell.
fn grid_offsets(step_x: f64, step_y: f64, config: &PlacementConfig) -> Vec<(f64, f64)> {
    let columns = config.grid_columns.max(1);
    let rows = (config.max_radius / step_y).floor() as usize + 1;
    (1..columns * rows)
        .map(|i| ((i % columns) as f64 * step_x, (i / columns) as f64 * step_y))
        .collect()
}

/// Square rings around the anchor, nearest cells first; within a ring the
/// order is by distance then angle, so the sequence is fully determined.
fn ring_offsets(step_x: f64, step_y: f64, config: &PlacementConfig) -> Vec<(f64, f64)> {
    let max_ring = (config.max_radius / step_x.min(step_y)).ceil() as i64;
    let mut out = Vec::new();
    for ring in 1..=max_ring {
        let mut cells: Vec<(f64, f64)> = Vec::with_capacity((8 * ring) as usize);
        for dy in -ring..=ring {
            for dx in -ring..=ring {
                if dx.abs().max(dy.abs()) != ring {
                    continue;
                }
                cells.push((dx as f64 * step_x, dy as f64 * step_y));
            }
        }
        cells.sort_by(|a, b| {
            let da = a.0.hypot(a.1);
            let db = b.0.hypot(b.1);
            da.total_cmp(&db)
                .then_with(|| a.1.atan2(a.0).total_cmp(&b.1.atan2(b.0)))
        });
        out.extend(cells);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect::new(Position::new(x, y), Size::new(w, h))
    }

    #[test]
    fn free_anchor_is_returned_unchanged() {
        let obstacles = [rect(500.0, 500.0, 100.0, 100.0)];
        let anchor = Position::new(0.0, 0.0);
        let at = resolve_among(
            &obstacles,
            Size::new(100.0, 100.0),
            NodeKind::AppName,
            anchor,
            &PlacementConfig::default(),
        );
        assert_eq!(at, anchor);
    }

    #[test]
    fn collections_fill_a_grid_to_the_right() {
        let obstacles = [rect(0.0, 0.0, 100.0, 100.0)];
        let at = resolve_among(
            &obstacles,
            Size::new(100.0, 100.0),
            NodeKind::Persona,
            Position::new(0.0, 0.0),
            &PlacementConfig::default(),
        );
        assert_eq!(at, Position::new(124.0, 0.0));
    }

    #[test]
    fn singletons_spiral_to_nearest_free_cell() {
        let obstacles = [rect(0.0, 0.0, 100.0, 100.0)];
        let size = Size::new(100.0, 100.0);
        let at = resolve_among(
            &obstacles,
            size,
            NodeKind::Tagline,
            Position::new(0.0, 0.0),
            &PlacementConfig::default(),
        );
        assert_ne!(at, Position::new(0.0, 0.0));
        assert!(!Rect::new(at, size).intersects(&obstacles[0]));
        assert!((at.distance(Position::new(0.0, 0.0)) - 124.0).abs() < 1e-9);
    }

    #[test]
    fn exhausted_search_falls_back_to_anchor() {
        let obstacles = [rect(-10_000.0, -10_000.0, 20_000.0, 20_000.0)];
        let config = PlacementConfig {
            max_radius: 500.0,
            ..Default::default()
        };
        let anchor = Position::new(10.0, 10.0);
        let at = resolve_among(&obstacles, Size::new(50.0, 50.0), NodeKind::Note, anchor, &config);
        assert_eq!(at, anchor);
    }

    #[test]
    fn resolution_is_deterministic() {
        let obstacles = [rect(0.0, 0.0, 100.0, 100.0), rect(124.0, 0.0, 100.0, 100.0)];
        let run = || {
            resolve_among(
                &obstacles,
                Size::new(100.0, 100.0),
                NodeKind::Feature,
                Position::new(0.0, 0.0),
                &PlacementConfig::default(),
            )
        };
        assert_eq!(run(), run());
        assert_eq!(run(), Position::new(248.0, 0.0));
    }
}
