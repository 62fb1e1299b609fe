use indexmap::IndexMap;

use crate::dataset::RejectedRecord;
use crate::ir::Individual;

use super::graph::PedigreeGraph;

/// Integer pixel point.
pub type Point = (i32, i32);

/// Arena address of a node in a [`PedigreeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    Individual(usize),
    Relationship(usize),
}

impl NodeRef {
    pub fn is_individual(self) -> bool {
        matches!(self, NodeRef::Individual(_))
    }
}

/// Per-node layout result. Lives in a [`DrawingTable`] beside the graph so
/// the graph itself stays free of run-specific state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drawing {
    pub height_index: usize,
    pub order: usize,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawingTable {
    pub individuals: Vec<Drawing>,
    pub relationships: Vec<Drawing>,
}

impl DrawingTable {
    pub fn for_graph(graph: &PedigreeGraph) -> Self {
        Self {
            individuals: vec![Drawing::default(); graph.individuals.len()],
            relationships: vec![Drawing::default(); graph.relationships.len()],
        }
    }

    pub fn get(&self, node: NodeRef) -> &Drawing {
        match node {
            NodeRef::Individual(idx) => &self.individuals[idx],
            NodeRef::Relationship(idx) => &self.relationships[idx],
        }
    }

    pub fn get_mut(&mut self, node: NodeRef) -> &mut Drawing {
        match node {
            NodeRef::Individual(idx) => &mut self.individuals[idx],
            NodeRef::Relationship(idx) => &mut self.relationships[idx],
        }
    }

    pub fn height(&self, node: NodeRef) -> usize {
        self.get(node).height_index
    }

    pub fn point(&self, node: NodeRef) -> Point {
        let drawing = self.get(node);
        (drawing.x, drawing.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    /// Partner to relationship connector, routed around obstacles.
    Partner,
    /// Straight piece between a node side and its ledge point.
    PartnerStub,
    /// Vertical drop from a relationship to its children's bar.
    Descent,
    /// Horizontal bar spanning a relationship's children.
    SiblingBar,
    /// Vertical drop from the children's bar to one child.
    ChildDrop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLayout {
    pub kind: EdgeKind,
    pub from: NodeRef,
    pub to: NodeRef,
    pub points: Vec<Point>,
    pub adjustable: bool,
    pub direct: bool,
}

impl EdgeLayout {
    pub fn direct(kind: EdgeKind, from: NodeRef, to: NodeRef, points: Vec<Point>) -> Self {
        Self {
            kind,
            from,
            to,
            points,
            adjustable: false,
            direct: true,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// SVG path data with corners rounded by `radius`. The radius is clamped
    /// to half of each adjacent run so short jogs stay orthogonal.
    pub fn svg_path(&self, radius: i32) -> String {
        let points = &self.points;
        let Some(&(sx, sy)) = points.first() else {
            return String::new();
        };
        let mut out = format!("M{sx} {sy}");
        for idx in 1..points.len() {
            let (cx, cy) = points[idx];
            if idx + 1 == points.len() || radius <= 0 {
                out.push_str(&format!(" L{cx} {cy}"));
                continue;
            }
            let (px, py) = points[idx - 1];
            let (nx, ny) = points[idx + 1];
            let in_len = (cx - px).abs() + (cy - py).abs();
            let out_len = (nx - cx).abs() + (ny - cy).abs();
            let r = radius.min(in_len / 2).min(out_len / 2);
            let before = (cx - (cx - px).signum() * r, cy - (cy - py).signum() * r);
            let after = (cx + (nx - cx).signum() * r, cy + (ny - cy).signum() * r);
            out.push_str(&format!(
                " L{} {} Q{cx} {cy} {} {}",
                before.0, before.1, after.0, after.1
            ));
        }
        out
    }
}

/// A fully positioned pedigree.
#[derive(Debug, Clone)]
pub struct Layout {
    pub graph: PedigreeGraph,
    pub drawing: DrawingTable,
    /// Generation/sequence label per individual, e.g. `II-3p`.
    pub order_based_names: Vec<String>,
    pub edges: Vec<EdgeLayout>,
    pub width: i32,
    pub height: i32,
    pub max_height_index: usize,
    pub disease_index: IndexMap<String, usize>,
    pub detached: Vec<Individual>,
    pub rejected: Vec<RejectedRecord>,
}

impl Layout {
    pub fn individual_index(&self, id: &str) -> Option<usize> {
        self.graph.individual_index(id)
    }

    pub fn individual_drawing(&self, id: &str) -> Option<&Drawing> {
        self.individual_index(id)
            .map(|idx| &self.drawing.individuals[idx])
    }

    pub fn relationship_drawing(&self, id: &str) -> Option<&Drawing> {
        self.graph
            .relationships
            .iter()
            .position(|rel| rel.id == id)
            .map(|idx| &self.drawing.relationships[idx])
    }

    pub fn node_id(&self, node: NodeRef) -> &str {
        self.graph.node_id(node)
    }

    pub fn adjustable_edges(&self) -> impl Iterator<Item = &EdgeLayout> {
        self.edges.iter().filter(|edge| edge.adjustable)
    }
}
