//! Orthogonal routing of partner connectors.
//!
//! The canvas is tiled with horizontal and vertical grid lines: a regular
//! grid whose pitch is the slot size divided by the subdivision count, plus
//! guide lines through every node center and one ledge out from every node
//! side. Unit segments between neighbouring intersections are free unless a
//! node box or a direct-edge corridor covers them. Each connector is found by
//! best-first search over (vertex, heading) states and its segments are then
//! consumed, so no two connectors share a segment.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::Cancellation;
use super::edges::{EdgeRequest, Obstacle};
use super::error::{LayoutError, Result};
use super::types::Point;
use crate::config::{DimensionConfig, RoutingConfig};

const STEP_SCALE: u64 = 2;
/// Heading for the start state when the ledge has no length.
const NO_DIR: u8 = 4;

fn opposite(dir: u8) -> u8 {
    match dir {
        0 => 1,
        1 => 0,
        2 => 3,
        3 => 2,
        _ => NO_DIR,
    }
}

fn heading(from: Point, to: Point) -> u8 {
    if from.0 == to.0 && to.1 < from.1 {
        0
    } else if from.0 == to.0 && to.1 > from.1 {
        1
    } else if from.1 == to.1 && to.0 < from.0 {
        2
    } else if from.1 == to.1 && to.0 > from.0 {
        3
    } else {
        NO_DIR
    }
}

#[derive(Debug, Clone)]
pub struct VisibilityGraph {
    xs: Vec<i32>,
    ys: Vec<i32>,
    /// `(xs.len() - 1) * ys.len()` horizontal unit segments, row-major.
    h_free: Vec<bool>,
    /// `xs.len() * (ys.len() - 1)` vertical unit segments, row-major.
    v_free: Vec<bool>,
    used: Vec<bool>,
}

impl VisibilityGraph {
    pub fn build(
        obstacles: &[Obstacle],
        canvas: (i32, i32),
        dims: &DimensionConfig,
        subdivisions: usize,
        anchors: &[Point],
    ) -> Self {
        let (width, height) = canvas;
        let subdivisions = subdivisions.max(1) as i32;
        let step_x = (dims.slot_width() / subdivisions).max(1);
        let step_y = (dims.row_height() / subdivisions).max(1);

        let mut xs: Vec<i32> = (0..=width).step_by(step_x as usize).collect();
        let mut ys: Vec<i32> = (0..=height).step_by(step_y as usize).collect();
        xs.push(width);
        ys.push(height);
        for obstacle in obstacles.iter().filter(|o| o.node_box) {
            xs.extend([
                obstacle.x0 - dims.ledge,
                (obstacle.x0 + obstacle.x1) / 2,
                obstacle.x1 + dims.ledge,
            ]);
            ys.extend([
                obstacle.y0 - dims.ledge,
                (obstacle.y0 + obstacle.y1) / 2,
                obstacle.y1 + dims.ledge,
            ]);
        }
        for &(x, y) in anchors {
            xs.push(x);
            ys.push(y);
        }
        xs.retain(|&x| (0..=width).contains(&x));
        ys.retain(|&y| (0..=height).contains(&y));
        xs.sort_unstable();
        xs.dedup();
        ys.sort_unstable();
        ys.dedup();

        let nx = xs.len();
        let ny = ys.len();
        let mut graph = Self {
            h_free: vec![true; nx.saturating_sub(1) * ny],
            v_free: vec![true; nx * ny.saturating_sub(1)],
            used: vec![false; nx * ny],
            xs,
            ys,
        };
        for obstacle in obstacles {
            graph.carve(obstacle);
        }
        graph
    }

    fn carve(&mut self, obstacle: &Obstacle) {
        let nx = self.xs.len();
        let ny = self.ys.len();
        if nx < 2 || ny < 2 {
            return;
        }

        let row_lo = self.ys.partition_point(|&y| y < obstacle.y0);
        let row_hi = self.ys.partition_point(|&y| y <= obstacle.y1);
        let col_start = self.xs.partition_point(|&x| x <= obstacle.x0).saturating_sub(1);
        for j in row_lo..row_hi {
            for i in col_start..nx - 1 {
                if self.xs[i] >= obstacle.x1 {
                    break;
                }
                if obstacle.blocks_horizontal(self.ys[j], self.xs[i], self.xs[i + 1]) {
                    self.h_free[j * (nx - 1) + i] = false;
                }
            }
        }

        let col_lo = self.xs.partition_point(|&x| x < obstacle.x0);
        let col_hi = self.xs.partition_point(|&x| x <= obstacle.x1);
        let row_start = self.ys.partition_point(|&y| y <= obstacle.y0).saturating_sub(1);
        for i in col_lo..col_hi {
            for j in row_start..ny - 1 {
                if self.ys[j] >= obstacle.y1 {
                    break;
                }
                if obstacle.blocks_vertical(self.xs[i], self.ys[j], self.ys[j + 1]) {
                    self.v_free[j * nx + i] = false;
                }
            }
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.xs.len() * self.ys.len()
    }

    pub fn vertex(&self, point: Point) -> Option<usize> {
        let i = self.xs.binary_search(&point.0).ok()?;
        let j = self.ys.binary_search(&point.1).ok()?;
        Some(j * self.xs.len() + i)
    }

    pub fn point(&self, vertex: usize) -> Point {
        let nx = self.xs.len();
        (self.xs[vertex % nx], self.ys[vertex / nx])
    }

    /// Segment slot leaving `vertex` in `dir`, with the vertex it reaches.
    fn step(&self, vertex: usize, dir: u8) -> Option<(Segment, usize)> {
        let nx = self.xs.len();
        let ny = self.ys.len();
        let (i, j) = (vertex % nx, vertex / nx);
        let (segment, next) = match dir {
            0 if j > 0 => (Segment::Vertical((j - 1) * nx + i), vertex - nx),
            1 if j + 1 < ny => (Segment::Vertical(j * nx + i), vertex + nx),
            2 if i > 0 => (Segment::Horizontal(j * (nx - 1) + i - 1), vertex - 1),
            3 if i + 1 < nx => (Segment::Horizontal(j * (nx - 1) + i), vertex + 1),
            _ => return None,
        };
        self.is_free(segment).then_some((segment, next))
    }

    fn is_free(&self, segment: Segment) -> bool {
        match segment {
            Segment::Horizontal(idx) => self.h_free[idx],
            Segment::Vertical(idx) => self.v_free[idx],
        }
    }

    fn consume(&mut self, path: &[usize]) {
        for pair in path.windows(2) {
            let (a, b) = (pair[0].min(pair[1]), pair[0].max(pair[1]));
            let nx = self.xs.len();
            if b == a + 1 {
                let row = a / nx;
                self.h_free[row * (nx - 1) + a % nx] = false;
            } else if b == a + nx {
                self.v_free[a] = false;
            }
        }
        for &vertex in path {
            self.used[vertex] = true;
        }
    }

    /// Cheapest path of vertices from `start` to `end`, or `None` when the
    /// free segments do not connect them.
    fn search(
        &self,
        start: usize,
        start_dir: u8,
        end: usize,
        routing: &RoutingConfig,
        cancel: &Cancellation<'_>,
    ) -> Result<Option<Vec<usize>>> {
        if start == end {
            return Ok(Some(vec![start]));
        }
        let turn_multiplier = routing.turn_multiplier.max(1);
        let overlap_percent = routing.overlap_multiplier_percent.max(100);
        let target = self.point(end);

        let states = self.vertex_count() * 5;
        let state_index = |state: GridState| state.vertex * 5 + state.dir as usize;
        let mut best_cost = vec![u64::MAX; states];
        let mut prev: Vec<Option<GridState>> = vec![None; states];
        let mut heap = BinaryHeap::new();

        let origin = GridState {
            vertex: start,
            dir: start_dir,
        };
        best_cost[state_index(origin)] = 0;
        heap.push(GridEntry {
            est: 0,
            cost: 0,
            state: origin,
        });

        let mut end_state = None;
        while let Some(GridEntry { cost, state, .. }) = heap.pop() {
            cancel.check()?;
            if cost != best_cost[state_index(state)] {
                continue;
            }
            if state.vertex == end {
                end_state = Some(state);
                break;
            }
            let here = self.point(state.vertex);
            for dir in 0..4u8 {
                if dir == opposite(state.dir) {
                    continue;
                }
                let Some((_, next)) = self.step(state.vertex, dir) else {
                    continue;
                };
                let there = self.point(next);
                let length = (there.0 - here.0).unsigned_abs() + (there.1 - here.1).unsigned_abs();
                let mut step_cost = length as u64 * STEP_SCALE;
                if state.dir != NO_DIR && state.dir != dir {
                    step_cost *= turn_multiplier;
                }
                if self.used[next] {
                    step_cost = step_cost * overlap_percent / 100;
                }
                let next_state = GridState { vertex: next, dir };
                let next_cost = cost.saturating_add(step_cost);
                if next_cost >= best_cost[state_index(next_state)] {
                    continue;
                }
                best_cost[state_index(next_state)] = next_cost;
                prev[state_index(next_state)] = Some(state);
                let manhattan = (target.0 - there.0).unsigned_abs() as u64
                    + (target.1 - there.1).unsigned_abs() as u64;
                heap.push(GridEntry {
                    est: next_cost.saturating_add(manhattan * STEP_SCALE),
                    cost: next_cost,
                    state: next_state,
                });
            }
        }

        let Some(mut cur) = end_state else {
            return Ok(None);
        };
        let mut path = vec![cur.vertex];
        while let Some(before) = prev[state_index(cur)] {
            path.push(before.vertex);
            cur = before;
        }
        path.reverse();
        Ok(Some(path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Horizontal(usize),
    Vertical(usize),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridState {
    vertex: usize,
    dir: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridEntry {
    est: u64,
    cost: u64,
    state: GridState,
}

impl Ord for GridEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .cmp(&self.est)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| other.state.vertex.cmp(&self.state.vertex))
            .then_with(|| other.state.dir.cmp(&self.state.dir))
    }
}

impl PartialOrd for GridEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

enum Attempt {
    Routed(Vec<Vec<Point>>),
    Failed(usize),
}

/// Routes every request between its ledge points. Polylines are returned in
/// request order and run from `start_ledge` to `end_ledge`.
///
/// When some request has no free path, the whole batch is retried on a
/// finer grid; past `max_subdivisions` the layout fails with
/// [`LayoutError::UnroutableGraph`].
pub fn route_adjustable_edges(
    requests: &[EdgeRequest],
    obstacles: &[Obstacle],
    canvas: (i32, i32),
    dims: &DimensionConfig,
    routing: &RoutingConfig,
    cancel: &Cancellation<'_>,
) -> Result<Vec<Vec<Point>>> {
    let anchors: Vec<Point> = requests
        .iter()
        .flat_map(|req| [req.start_ledge, req.end_ledge])
        .collect();
    let mut order: Vec<usize> = (0..requests.len()).collect();
    order.sort_by_key(|&idx| (requests[idx].manhattan(), idx));

    let mut subdivisions = routing.initial_subdivisions.max(1);
    let mut attempts = 0usize;
    loop {
        attempts += 1;
        let mut graph = VisibilityGraph::build(obstacles, canvas, dims, subdivisions, &anchors);
        match route_batch(&mut graph, requests, &order, routing, cancel)? {
            Attempt::Routed(paths) => {
                log::debug!(
                    "routed {} connectors with {subdivisions} subdivisions",
                    requests.len()
                );
                return Ok(paths);
            }
            Attempt::Failed(idx) => {
                if subdivisions >= routing.max_subdivisions {
                    return Err(LayoutError::UnroutableGraph {
                        edge: requests[idx].label.clone(),
                        attempts,
                    });
                }
                log::warn!(
                    "no route for {} with {subdivisions} subdivisions, refining grid",
                    requests[idx].label
                );
                subdivisions += 1;
            }
        }
    }
}

fn route_batch(
    graph: &mut VisibilityGraph,
    requests: &[EdgeRequest],
    order: &[usize],
    routing: &RoutingConfig,
    cancel: &Cancellation<'_>,
) -> Result<Attempt> {
    let mut paths = vec![Vec::new(); requests.len()];
    for &idx in order {
        let req = &requests[idx];
        let (Some(start), Some(end)) = (graph.vertex(req.start_ledge), graph.vertex(req.end_ledge))
        else {
            return Ok(Attempt::Failed(idx));
        };
        let start_dir = heading(req.start, req.start_ledge);
        let Some(vertices) = graph.search(start, start_dir, end, routing, cancel)? else {
            return Ok(Attempt::Failed(idx));
        };
        graph.consume(&vertices);
        let points: Vec<Point> = vertices.iter().map(|&v| graph.point(v)).collect();
        paths[idx] = compress_path(&points);
    }
    Ok(Attempt::Routed(paths))
}

/// Drops repeated points and interior points that continue a straight run.
pub fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for (idx, &curr) in points.iter().enumerate() {
        if out.last() == Some(&curr) {
            continue;
        }
        let next = points[idx + 1..].iter().copied().find(|&p| p != curr);
        if let (Some(&prev), Some(next)) = (out.last(), next) {
            let vertical_run = prev.0 == curr.0 && curr.0 == next.0;
            let horizontal_run = prev.1 == curr.1 && curr.1 == next.1;
            if vertical_run || horizontal_run {
                continue;
            }
        }
        out.push(curr);
    }
    out
}
