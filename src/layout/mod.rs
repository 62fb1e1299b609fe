mod edges;
mod error;
mod graph;
mod legend;
mod ordering;
mod position;
mod ranking;
mod routing;
mod types;

pub use edges::{EdgeRequest, Obstacle};
pub use error::{LayoutError, Result};
pub use graph::{
    BuiltGraph, IndividualNode, PedigreeGraph, RelationshipNode, build_graph, relationship_id,
};
pub use routing::{VisibilityGraph, compress_path, route_adjustable_edges};
pub use types::*;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::LayoutConfig;
use crate::dataset::normalize_records;
use crate::ir::Individual;

/// Cooperative cancellation, polled between units of work. A layout that
/// observes the flag returns [`LayoutError::Cancelled`] and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cancellation<'a> {
    flag: Option<&'a AtomicBool>,
}

impl<'a> Cancellation<'a> {
    pub fn none() -> Self {
        Self { flag: None }
    }

    pub fn new(flag: &'a AtomicBool) -> Self {
        Self { flag: Some(flag) }
    }

    pub fn check(&self) -> Result<()> {
        match self.flag {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(LayoutError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Lays out raw person records.
pub fn compute_layout(records: &[serde_json::Value], config: &LayoutConfig) -> Result<Layout> {
    layout_records(records, config, &Cancellation::none())
}

/// Like [`compute_layout`], giving up with [`LayoutError::Cancelled`] once
/// `cancel` is set.
pub fn compute_layout_with_cancel(
    records: &[serde_json::Value],
    config: &LayoutConfig,
    cancel: &AtomicBool,
) -> Result<Layout> {
    layout_records(records, config, &Cancellation::new(cancel))
}

fn layout_records(
    records: &[serde_json::Value],
    config: &LayoutConfig,
    cancel: &Cancellation<'_>,
) -> Result<Layout> {
    for problem in config.dimensions.check_units() {
        log::warn!("dimension config: {problem}");
    }
    let dataset = normalize_records(records, config.skip_malformed_records)?;
    let mut layout = layout_individuals(dataset.individuals, config, cancel)?;
    layout.rejected = dataset.rejected;
    Ok(layout)
}

/// Lays out already normalized individuals. The first one is the root unless
/// `config.root_id` names another.
pub fn layout_individuals(
    individuals: Vec<Individual>,
    config: &LayoutConfig,
    cancel: &Cancellation<'_>,
) -> Result<Layout> {
    cancel.check()?;
    let dims = &config.dimensions;
    let BuiltGraph { graph, detached } = build_graph(individuals, config)?;
    let mut drawing = DrawingTable::for_graph(&graph);

    let max_height_index = ranking::assign_heights(&graph, &mut drawing, cancel)?;
    let order_based_names = ordering::order_graph(&graph, &mut drawing, max_height_index, cancel)?;
    let canvas =
        position::assign_coordinates(&graph, &mut drawing, max_height_index, dims, cancel)?;

    let mut edges = edges::direct_edges(&graph, &drawing, dims);
    let obstacles = edges::obstacles(&graph, &drawing, dims, &edges);
    let requests = edges::partner_requests(&graph, &drawing, dims);
    let routes = route_adjustable_edges(
        &requests,
        &obstacles,
        (canvas.width, canvas.height),
        dims,
        &config.routing,
        cancel,
    )?;
    for (request, points) in requests.into_iter().zip(routes) {
        if request.start != request.start_ledge {
            edges.push(EdgeLayout::direct(
                EdgeKind::PartnerStub,
                request.from,
                request.from,
                vec![request.start, request.start_ledge],
            ));
        }
        if request.end_ledge != request.end {
            edges.push(EdgeLayout::direct(
                EdgeKind::PartnerStub,
                request.to,
                request.to,
                vec![request.end_ledge, request.end],
            ));
        }
        edges.push(EdgeLayout {
            kind: EdgeKind::Partner,
            from: request.from,
            to: request.to,
            points,
            adjustable: true,
            direct: false,
        });
    }

    let disease_index = legend::disease_index(&graph, config.visible_diseases.as_deref());
    log::info!(
        "laid out {} individuals and {} relationships on a {}x{} canvas",
        graph.individuals.len(),
        graph.relationships.len(),
        canvas.width,
        canvas.height
    );

    Ok(Layout {
        graph,
        drawing,
        order_based_names,
        edges,
        width: canvas.width,
        height: canvas.height,
        max_height_index,
        disease_index,
        detached,
        rejected: Vec::new(),
    })
}
