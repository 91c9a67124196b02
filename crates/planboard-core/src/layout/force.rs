use super::{CancelToken, LayoutGraph, LayoutOptions, PositionMap};
use crate::model::Position;

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
const MIN_DISTANCE: f64 = 0.01;

/// Fruchterman-Reingold. Nodes start on a golden-angle spiral in id order,
/// so the run is seedless and reproducible; the temperature cools linearly
/// over the iteration budget.
pub(super) fn run(graph: &LayoutGraph<'_>, options: &LayoutOptions, cancel: &CancelToken) -> Option<PositionMap> {
    if cancel.is_cancelled() {
        return None;
    }
    let n = graph.len();
    let k = options.ideal_edge_length.max(1.0);

    // Centres, not top-left corners.
    let mut pos: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let r = k * ((i as f64) + 0.5).sqrt();
            let a = i as f64 * GOLDEN_ANGLE;
            (r * a.cos(), r * a.sin())
        })
        .collect();

    let iterations = options.iterations.max(1);
    let start_temperature = k * (n as f64).sqrt().max(1.0);
    let mut disp = vec![(0.0f64, 0.0f64); n];

    for iteration in 0..iterations {
        if cancel.is_cancelled() {
            return None;
        }
        disp.iter_mut().for_each(|d| *d = (0.0, 0.0));

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy, d) = separation(pos[i], pos[j], i, j);
                let force = k * k / d;
                let (fx, fy) = (dx / d * force, dy / d * force);
                disp[i].0 += fx;
                disp[i].1 += fy;
                disp[j].0 -= fx;
                disp[j].1 -= fy;
            }
        }

        for &(a, b, _) in &graph.edges {
            let (dx, dy, d) = separation(pos[a], pos[b], a, b);
            let force = d * d / k;
            let (fx, fy) = (dx / d * force, dy / d * force);
            disp[a].0 -= fx;
            disp[a].1 -= fy;
            disp[b].0 += fx;
            disp[b].1 += fy;
        }

        let temperature = start_temperature * (1.0 - iteration as f64 / iterations as f64);
        let mut max_move: f64 = 0.0;
        for (p, d) in pos.iter_mut().zip(&disp) {
            let len = (d.0 * d.0 + d.1 * d.1).sqrt();
            if len < f64::EPSILON {
                continue;
            }
            let step = len.min(temperature);
            p.0 += d.0 / len * step;
            p.1 += d.1 / len * step;
            max_move = max_move.max(step);
        }

        if max_move < options.epsilon {
            tracing::debug!(iteration, "force layout converged");
            break;
        }
    }

    let top_left: Vec<Position> = pos
        .iter()
        .zip(&graph.nodes)
        .map(|(c, node)| Position::new(c.0 - node.size.width / 2.0, c.1 - node.size.height / 2.0))
        .collect();
    Some(graph.into_map(normalize(top_left, options.origin)))
}

/// Vector from `b` to `a` and its length. Coincident points are pushed
/// apart along a direction derived from their indices.
fn separation(a: (f64, f64), b: (f64, f64), i: usize, j: usize) -> (f64, f64, f64) {
    let (dx, dy) = (a.0 - b.0, a.1 - b.1);
    let d = (dx * dx + dy * dy).sqrt();
    if d >= MIN_DISTANCE {
        return (dx, dy, d);
    }
    let angle = (i * 31 + j) as f64 * GOLDEN_ANGLE;
    (angle.cos() * MIN_DISTANCE, angle.sin() * MIN_DISTANCE, MIN_DISTANCE)
}

/// Shift so the top-left-most corner lands on `origin`.
fn normalize(mut positions: Vec<Position>, origin: Position) -> Vec<Position> {
    let min_x = positions.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = positions.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    if min_x.is_finite() && min_y.is_finite() {
        for p in &mut positions {
            *p = Position::new(p.x - min_x + origin.x, p.y - min_y + origin.y);
        }
    }
    positions
}
