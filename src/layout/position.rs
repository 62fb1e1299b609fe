use super::Cancellation;
use super::error::Result;
use super::graph::PedigreeGraph;
use super::ordering::rows_by_order;
use super::types::{DrawingTable, NodeRef};
use crate::config::DimensionConfig;

/// Canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Canvas {
    pub width: i32,
    pub height: i32,
}

/// Turns row orders into pixel centers.
///
/// Rows are visited bottom-up so every relationship can be centered over
/// children that already have coordinates. Each node starts at its order
/// times the slot width and never closer than one slot to its left
/// neighbour. A relationship left of its children's median moves right onto
/// it; one right of the median pushes its children, and everything right of
/// and below them, over by the difference.
pub(super) fn assign_coordinates(
    graph: &PedigreeGraph,
    drawing: &mut DrawingTable,
    max_height: usize,
    dims: &DimensionConfig,
    cancel: &Cancellation<'_>,
) -> Result<Canvas> {
    let rows = rows_by_order(graph, drawing, max_height);
    let slot = dims.slot_width();

    for height in 0..=max_height {
        cancel.check()?;
        let row = &rows[height];
        let mut prev_x: Option<i32> = None;
        for (col, &node) in row.iter().enumerate() {
            let mut x = col as i32 * slot;
            if let Some(prev) = prev_x {
                x = x.max(prev + slot);
            }
            if let NodeRef::Relationship(rel) = node
                && let Some(median) = children_median(graph, drawing, rel)
            {
                if x < median {
                    x = median;
                    if col > 0 {
                        pull_lone_partner(graph, drawing, rel, row[col - 1], x - slot);
                    }
                } else if x > median {
                    shift_descendants(graph, drawing, &rows, rel, x - median);
                }
            }
            drawing.get_mut(node).x = x;
            prev_x = Some(x);
        }
    }

    let top = dims.padding + dims.individual_height / 2;
    let row_height = dims.row_height();
    for node in graph.nodes() {
        let height = drawing.height(node);
        drawing.get_mut(node).y = top + (max_height - height) as i32 * row_height;
    }

    let half_width = dims.individual_width / 2;
    let min_x = graph.nodes().map(|n| drawing.get(n).x).min().unwrap_or(0);
    let shift = dims.padding + half_width - min_x;
    if shift != 0 {
        for node in graph.nodes() {
            drawing.get_mut(node).x += shift;
        }
    }
    let max_x = graph.nodes().map(|n| drawing.get(n).x).max().unwrap_or(0);

    let canvas = Canvas {
        width: max_x + half_width + dims.padding,
        height: (max_height as i32 + 1) * row_height + 2 * dims.padding,
    };
    log::debug!("positions: canvas {}x{}", canvas.width, canvas.height);
    Ok(canvas)
}

fn children_median(graph: &PedigreeGraph, drawing: &DrawingTable, rel: usize) -> Option<i32> {
    let mut xs: Vec<i32> = graph.relationships[rel]
        .children
        .iter()
        .map(|&c| drawing.individuals[c].x)
        .collect();
    if xs.is_empty() {
        return None;
    }
    xs.sort_unstable();
    let mid = xs.len() / 2;
    if xs.len() % 2 == 1 {
        Some(xs[mid])
    } else {
        Some((xs[mid - 1] + xs[mid]) / 2)
    }
}

/// Slides a founder partner that sits directly left of `rel` along with it,
/// provided `rel` is the only relationship that partner already has placed.
fn pull_lone_partner(
    graph: &PedigreeGraph,
    drawing: &mut DrawingTable,
    rel: usize,
    left: NodeRef,
    target_x: i32,
) {
    let NodeRef::Individual(partner) = left else {
        return;
    };
    let ind = &graph.individuals[partner];
    if ind.parental_relationship.is_some() || !graph.relationships[rel].partners.contains(&partner)
    {
        return;
    }
    let row = drawing.relationships[rel].height_index;
    let own_order = drawing.relationships[rel].order;
    let has_other_placed = ind.marital_relationships.iter().any(|&other| {
        let other_drawing = drawing.relationships[other];
        other != rel
            && (other_drawing.height_index < row
                || (other_drawing.height_index == row && other_drawing.order < own_order))
    });
    if has_other_placed {
        return;
    }
    let current = &mut drawing.individuals[partner].x;
    *current = (*current).max(target_x);
}

/// Shifts `rel`'s children and everything right of them in their row by
/// `delta`, then repeats for the rows below under every shifted relationship.
fn shift_descendants(
    graph: &PedigreeGraph,
    drawing: &mut DrawingTable,
    rows: &[Vec<NodeRef>],
    rel: usize,
    delta: i32,
) {
    let mut parents = vec![rel];
    let mut row = drawing.relationships[rel].height_index;
    while row > 0 && !parents.is_empty() {
        row -= 1;
        let first = parents
            .iter()
            .flat_map(|&r| graph.relationships[r].children.iter())
            .filter(|&&c| drawing.individuals[c].height_index == row)
            .map(|&c| drawing.individuals[c].order)
            .min();
        let Some(first) = first else {
            break;
        };
        parents.clear();
        for &node in &rows[row][first..] {
            drawing.get_mut(node).x += delta;
            if let NodeRef::Relationship(idx) = node
                && !graph.relationships[idx].children.is_empty()
            {
                parents.push(idx);
            }
        }
    }
}
