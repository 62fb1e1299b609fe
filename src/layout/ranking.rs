use std::collections::VecDeque;

use super::Cancellation;
use super::error::{LayoutError, Result};
use super::graph::PedigreeGraph;
use super::types::{DrawingTable, NodeRef};

/// Assigns every node a generation index and returns the highest one.
///
/// A breadth-first walk from the root gives a locally consistent guess:
/// relationships reached from a partner share that partner's height, reached
/// from a child they sit one above it, and children sit one below their
/// parents' relationship. Components the walk never reaches are seeded at 0
/// in dataset order. The guess is then repaired so that every relationship
/// sits at its lowest partner and every child exactly one row below it, and
/// finally shifted so the lowest row is 0.
pub(super) fn assign_heights(
    graph: &PedigreeGraph,
    drawing: &mut DrawingTable,
    cancel: &Cancellation<'_>,
) -> Result<usize> {
    let mut ind_heights: Vec<Option<i64>> = vec![None; graph.individuals.len()];
    let mut rel_heights: Vec<Option<i64>> = vec![None; graph.relationships.len()];

    let seeds = std::iter::once(graph.root).chain(0..graph.individuals.len());
    let mut queue: VecDeque<NodeRef> = VecDeque::new();
    for seed in seeds {
        if ind_heights[seed].is_some() {
            continue;
        }
        ind_heights[seed] = Some(0);
        queue.push_back(NodeRef::Individual(seed));
        while let Some(node) = queue.pop_front() {
            cancel.check()?;
            match node {
                NodeRef::Individual(idx) => {
                    let height = ind_heights[idx].unwrap_or(0);
                    let ind = &graph.individuals[idx];
                    if let Some(rel) = ind.parental_relationship
                        && rel_heights[rel].is_none()
                    {
                        rel_heights[rel] = Some(height + 1);
                        queue.push_back(NodeRef::Relationship(rel));
                    }
                    for &rel in &ind.marital_relationships {
                        if rel_heights[rel].is_none() {
                            rel_heights[rel] = Some(height);
                            queue.push_back(NodeRef::Relationship(rel));
                        }
                    }
                }
                NodeRef::Relationship(idx) => {
                    let height = rel_heights[idx].unwrap_or(0);
                    let rel = &graph.relationships[idx];
                    for &partner in &rel.partners {
                        if ind_heights[partner].is_none() {
                            ind_heights[partner] = Some(height);
                            queue.push_back(NodeRef::Individual(partner));
                        }
                    }
                    for &child in &rel.children {
                        if ind_heights[child].is_none() {
                            ind_heights[child] = Some(height - 1);
                            queue.push_back(NodeRef::Individual(child));
                        }
                    }
                }
            }
        }
    }

    let mut ind_heights: Vec<i64> = ind_heights.into_iter().map(|h| h.unwrap_or(0)).collect();
    let mut rel_heights: Vec<i64> = rel_heights.into_iter().map(|h| h.unwrap_or(0)).collect();
    repair_heights(graph, &mut ind_heights, &mut rel_heights, cancel)?;

    let min_height = ind_heights
        .iter()
        .chain(rel_heights.iter())
        .copied()
        .min()
        .unwrap_or(0);
    let mut max_height = 0usize;
    for (idx, height) in ind_heights.iter().enumerate() {
        let shifted = (height - min_height) as usize;
        drawing.individuals[idx].height_index = shifted;
        max_height = max_height.max(shifted);
    }
    for (idx, height) in rel_heights.iter().enumerate() {
        let shifted = (height - min_height) as usize;
        drawing.relationships[idx].height_index = shifted;
        max_height = max_height.max(shifted);
    }
    log::debug!("height assignment: {} rows", max_height + 1);
    Ok(max_height)
}

/// Visits relationships once all of their partners have final heights, so
/// parents are always settled before their children. Individuals without a
/// parental relationship keep the walk's guess.
fn repair_heights(
    graph: &PedigreeGraph,
    ind_heights: &mut [i64],
    rel_heights: &mut [i64],
    cancel: &Cancellation<'_>,
) -> Result<()> {
    let mut unsettled_partners: Vec<usize> = graph
        .relationships
        .iter()
        .map(|rel| {
            rel.partners
                .iter()
                .filter(|&&p| graph.individuals[p].parental_relationship.is_some())
                .count()
        })
        .collect();
    let mut ready: VecDeque<usize> = unsettled_partners
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| idx)
        .collect();

    let mut processed = 0usize;
    while let Some(rel_idx) = ready.pop_front() {
        cancel.check()?;
        processed += 1;
        let rel = &graph.relationships[rel_idx];
        let height = rel
            .partners
            .iter()
            .map(|&p| ind_heights[p])
            .min()
            .unwrap_or(rel_heights[rel_idx]);
        if height != rel_heights[rel_idx] {
            log::trace!(
                "moving {} from row {} to {}",
                rel.id,
                rel_heights[rel_idx],
                height
            );
        }
        rel_heights[rel_idx] = height;
        for &child in &rel.children {
            ind_heights[child] = height - 1;
            for &marital in &graph.individuals[child].marital_relationships {
                unsettled_partners[marital] -= 1;
                if unsettled_partners[marital] == 0 {
                    ready.push_back(marital);
                }
            }
        }
    }

    if processed < graph.relationships.len() {
        let stuck = unsettled_partners
            .iter()
            .position(|count| *count > 0)
            .map(|idx| graph.relationships[idx].id.as_str())
            .unwrap_or("?");
        return Err(LayoutError::disconnected(format!(
            "ancestry cycle through {stuck}"
        )));
    }
    Ok(())
}
