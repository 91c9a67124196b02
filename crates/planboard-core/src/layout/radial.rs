use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};
use std::f64::consts::TAU;

use super::{CancelToken, LayoutGraph, LayoutOptions, PositionMap};
use crate::model::Position;

/// Concentric rings around one or more roots per connected component;
/// components are placed left to right and wrap at `row_width`.
pub(super) fn run(graph: &LayoutGraph<'_>, options: &LayoutOptions, cancel: &CancelToken) -> Option<PositionMap> {
    if cancel.is_cancelled() {
        return None;
    }
    let neighbours = graph.neighbours();
    let configured: HashSet<&str> = options.roots.iter().map(String::as_str).collect();

    let mut positions = vec![options.origin; graph.len()];
    let mut visited = vec![false; graph.len()];
    let mut cursor_x = options.origin.x;
    let mut row_y = options.origin.y;
    let mut row_height: f64 = 0.0;

    for start in 0..graph.len() {
        if visited[start] {
            continue;
        }
        if cancel.is_cancelled() {
            return None;
        }
        let component = collect_component(start, &neighbours, &mut visited);

        let roots = pick_roots(graph, &component, &neighbours, &configured);
        let centres = rings(&component, &roots, &neighbours, options.ring_gap);

        // Bounding box of the component's rectangles relative to its centre.
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(i, (cx, cy)) in &centres {
            let size = graph.nodes[i].size;
            min_x = min_x.min(cx - size.width / 2.0);
            min_y = min_y.min(cy - size.height / 2.0);
            max_x = max_x.max(cx + size.width / 2.0);
            max_y = max_y.max(cy + size.height / 2.0);
        }
        let (width, height) = (max_x - min_x, max_y - min_y);

        if cursor_x > options.origin.x && cursor_x + width > options.origin.x + options.row_width {
            cursor_x = options.origin.x;
            row_y += row_height + options.component_gap;
            row_height = 0.0;
        }

        for &(i, (cx, cy)) in &centres {
            let size = graph.nodes[i].size;
            positions[i] = Position::new(
                cursor_x + (cx - size.width / 2.0 - min_x),
                row_y + (cy - size.height / 2.0 - min_y),
            );
        }
        cursor_x += width + options.component_gap;
        row_height = row_height.max(height);
    }

    Some(graph.into_map(positions))
}

/// Configured roots inside the component, else its highest-degree node
/// (ties go to the lowest id, which is the lowest index).
fn pick_roots(
    graph: &LayoutGraph<'_>,
    component: &[usize],
    neighbours: &[Vec<usize>],
    configured: &HashSet<&str>,
) -> Vec<usize> {
    let roots: Vec<usize> = component
        .iter()
        .copied()
        .filter(|&i| configured.contains(graph.nodes[i].id.as_str()))
        .collect();
    if !roots.is_empty() {
        return roots;
    }
    component
        .iter()
        .copied()
        .max_by_key(|&i| (neighbours[i].len(), Reverse(i)))
        .into_iter()
        .collect()
}

fn collect_component(start: usize, neighbours: &[Vec<usize>], visited: &mut [bool]) -> Vec<usize> {
    let mut component = vec![start];
    visited[start] = true;
    let mut queue = VecDeque::from([start]);
    while let Some(i) = queue.pop_front() {
        for &j in &neighbours[i] {
            if !visited[j] {
                visited[j] = true;
                component.push(j);
                queue.push_back(j);
            }
        }
    }
    component.sort_unstable();
    component
}

/// Ring centres: breadth-first depth from the nearest root, nodes on a ring
/// ordered by their parent's angle so subtrees stay together.
fn rings(component: &[usize], roots: &[usize], neighbours: &[Vec<usize>], ring_gap: f64) -> Vec<(usize, (f64, f64))> {
    let mut depth: Vec<Option<usize>> = vec![None; neighbours.len()];
    let mut parent: Vec<Option<usize>> = vec![None; neighbours.len()];
    let mut queue = VecDeque::new();
    for &r in roots {
        depth[r] = Some(0);
        queue.push_back(r);
    }
    while let Some(i) = queue.pop_front() {
        let next = depth[i].map_or(0, |d| d + 1);
        for &j in &neighbours[i] {
            if depth[j].is_none() {
                depth[j] = Some(next);
                parent[j] = Some(i);
                queue.push_back(j);
            }
        }
    }

    let max_depth = component.iter().filter_map(|&i| depth[i]).max().unwrap_or(0);
    let mut angle = vec![0.0f64; neighbours.len()];
    let mut out = Vec::with_capacity(component.len());

    for d in 0..=max_depth {
        let mut ring: Vec<usize> = component.iter().copied().filter(|&i| depth[i] == Some(d)).collect();
        ring.sort_by(|&a, &b| {
            let pa = parent[a].map_or(0.0, |p| angle[p]);
            let pb = parent[b].map_or(0.0, |p| angle[p]);
            pa.total_cmp(&pb).then(a.cmp(&b))
        });
        // A single root sits in the centre; several roots share a small ring.
        let radius = match (d, ring.len()) {
            (0, 1) => 0.0,
            (0, _) => ring_gap / 2.0,
            _ => ring_gap * d as f64,
        };
        let count = ring.len().max(1) as f64;
        for (slot, &i) in ring.iter().enumerate() {
            let a = TAU * slot as f64 / count;
            angle[i] = a;
            out.push((i, (radius * a.cos(), radius * a.sin())));
        }
    }
    out
}
