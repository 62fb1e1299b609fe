use super::graph::PedigreeGraph;
use super::types::{DrawingTable, EdgeKind, EdgeLayout, NodeRef, Point};
use crate::config::DimensionConfig;

/// An axis-aligned box the router must not cut through. Node boxes also
/// block their outline so connectors never run along a node's border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obstacle {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    /// Node boxes contribute grid lines at their center and one ledge out
    /// from each side; edge corridors do not.
    pub node_box: bool,
}

impl Obstacle {
    pub fn around(center: Point, width: i32, height: i32) -> Self {
        Self {
            x0: center.0 - width / 2,
            y0: center.1 - height / 2,
            x1: center.0 + width / 2,
            y1: center.1 + height / 2,
            node_box: true,
        }
    }

    /// Thin corridor around an axis-aligned segment.
    fn corridor(a: Point, b: Point) -> Self {
        Self {
            x0: a.0.min(b.0) - CORRIDOR_HALF_WIDTH,
            y0: a.1.min(b.1) - CORRIDOR_HALF_WIDTH,
            x1: a.0.max(b.0) + CORRIDOR_HALF_WIDTH,
            y1: a.1.max(b.1) + CORRIDOR_HALF_WIDTH,
            node_box: false,
        }
    }

    pub fn blocks_horizontal(&self, y: i32, xa: i32, xb: i32) -> bool {
        let (lo, hi) = (xa.min(xb), xa.max(xb));
        self.spans(y, self.y0, self.y1) && lo < self.x1 && hi > self.x0
    }

    pub fn blocks_vertical(&self, x: i32, ya: i32, yb: i32) -> bool {
        let (lo, hi) = (ya.min(yb), ya.max(yb));
        self.spans(x, self.x0, self.x1) && lo < self.y1 && hi > self.y0
    }

    fn spans(&self, value: i32, lo: i32, hi: i32) -> bool {
        if self.node_box {
            lo <= value && value <= hi
        } else {
            lo < value && value < hi
        }
    }
}

const CORRIDOR_HALF_WIDTH: i32 = 1;

/// A partner connector waiting for a route. The side points touch the node
/// boxes; the ledge points are where the routed middle starts and ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    pub label: String,
    pub from: NodeRef,
    pub to: NodeRef,
    pub start: Point,
    pub start_ledge: Point,
    pub end_ledge: Point,
    pub end: Point,
}

impl EdgeRequest {
    pub fn manhattan(&self) -> i32 {
        (self.start_ledge.0 - self.end_ledge.0).abs() + (self.start_ledge.1 - self.end_ledge.1).abs()
    }
}

/// Descent, sibling bar and child drops for every relationship with
/// children. The bar runs halfway between the relationship's row and the
/// children's row.
pub(super) fn direct_edges(
    graph: &PedigreeGraph,
    drawing: &DrawingTable,
    dims: &DimensionConfig,
) -> Vec<EdgeLayout> {
    let mut edges = Vec::new();
    for (idx, rel) in graph.relationships.iter().enumerate() {
        let Some(&first_child) = rel.children.first() else {
            continue;
        };
        let rel_node = NodeRef::Relationship(idx);
        let (rx, ry) = drawing.point(rel_node);
        let child_y = drawing.individuals[first_child].y;
        let child_top = child_y - dims.individual_height / 2;
        let bar_y = child_top - dims.vertical_spacing / 2;

        edges.push(EdgeLayout::direct(
            EdgeKind::Descent,
            rel_node,
            rel_node,
            vec![(rx, ry + dims.relationship_size / 2), (rx, bar_y)],
        ));

        let xs = rel
            .children
            .iter()
            .map(|&c| drawing.individuals[c].x)
            .chain(std::iter::once(rx));
        let (min_x, max_x) = xs.fold((rx, rx), |(lo, hi), x| (lo.min(x), hi.max(x)));
        if min_x < max_x {
            edges.push(EdgeLayout::direct(
                EdgeKind::SiblingBar,
                rel_node,
                rel_node,
                vec![(min_x, bar_y), (max_x, bar_y)],
            ));
        }

        for &child in &rel.children {
            let cx = drawing.individuals[child].x;
            edges.push(EdgeLayout::direct(
                EdgeKind::ChildDrop,
                rel_node,
                NodeRef::Individual(child),
                vec![(cx, bar_y), (cx, child_top)],
            ));
        }
    }
    edges
}

/// Side of a relationship box a partner connector enters through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Left,
    Right,
    Top,
    Bottom,
}

impl Entry {
    /// Ledge point and box point for a relationship centered at `(rx, ry)`.
    fn points(self, (rx, ry): Point, half_rel: i32, ledge: i32) -> (Point, Point) {
        match self {
            Entry::Left => ((rx - half_rel - ledge, ry), (rx - half_rel, ry)),
            Entry::Right => ((rx + half_rel + ledge, ry), (rx + half_rel, ry)),
            Entry::Top => ((rx, ry - half_rel - ledge), (rx, ry - half_rel)),
            Entry::Bottom => ((rx, ry + half_rel + ledge), (rx, ry + half_rel)),
        }
    }
}

/// First of `wanted` still in `free`, or the first wanted side once every
/// side is taken.
fn take_entry(free: &mut Vec<Entry>, wanted: &[Entry]) -> Entry {
    for entry in wanted {
        if let Some(pos) = free.iter().position(|e| e == entry) {
            return free.remove(pos);
        }
    }
    wanted[0]
}

/// One request per partner of every relationship. The nearest partner on
/// each side of the relationship's row enters from that side and partners
/// above enter from the top. Further partners in the row take the top, or
/// the bottom of a childless relationship, so no two share an end ledge
/// while a side is free.
pub(super) fn partner_requests(
    graph: &PedigreeGraph,
    drawing: &DrawingTable,
    dims: &DimensionConfig,
) -> Vec<EdgeRequest> {
    let half_w = dims.individual_width / 2;
    let half_h = dims.individual_height / 2;
    let half_rel = dims.relationship_size / 2;
    let ledge = dims.ledge;

    let mut requests = Vec::new();
    for (idx, rel) in graph.relationships.iter().enumerate() {
        let rel_node = NodeRef::Relationship(idx);
        let center = drawing.point(rel_node);
        let rx = center.0;
        let same_row = |partner: usize| {
            drawing.height(NodeRef::Individual(partner)) == drawing.height(rel_node)
        };

        let mut free = vec![Entry::Left, Entry::Right, Entry::Top];
        if rel.children.is_empty() {
            free.push(Entry::Bottom);
        }
        let mut entries: Vec<Option<Entry>> = vec![None; rel.partners.len()];
        let mut beside: Vec<usize> = (0..rel.partners.len())
            .filter(|&i| same_row(rel.partners[i]))
            .collect();
        beside.sort_by_key(|&i| (drawing.individuals[rel.partners[i]].x - rx).abs());
        let mut extra = Vec::new();
        for i in beside {
            let facing = if drawing.individuals[rel.partners[i]].x < rx {
                Entry::Left
            } else {
                Entry::Right
            };
            if free.contains(&facing) {
                entries[i] = Some(take_entry(&mut free, &[facing]));
            } else {
                extra.push((i, facing));
            }
        }
        for i in 0..rel.partners.len() {
            if !same_row(rel.partners[i]) {
                entries[i] = Some(take_entry(
                    &mut free,
                    &[Entry::Top, Entry::Left, Entry::Right, Entry::Bottom],
                ));
            }
        }
        for (i, facing) in extra {
            entries[i] = Some(take_entry(&mut free, &[Entry::Top, Entry::Bottom, facing]));
        }

        for (i, &partner) in rel.partners.iter().enumerate() {
            let partner_node = NodeRef::Individual(partner);
            let (px, py) = drawing.point(partner_node);
            let label = format!("{} -> {}", graph.individuals[partner].id(), rel.id);
            let (start, start_ledge) = if same_row(partner) {
                let dir = if px < rx { 1 } else { -1 };
                ((px + dir * half_w, py), (px + dir * (half_w + ledge), py))
            } else {
                ((px, py + half_h), (px, py + half_h + ledge))
            };
            let entry = entries[i].unwrap_or(Entry::Top);
            let (end_ledge, end) = entry.points(center, half_rel, ledge);
            requests.push(EdgeRequest {
                label,
                from: partner_node,
                to: rel_node,
                start,
                start_ledge,
                end_ledge,
                end,
            });
        }
    }
    requests
}

/// Node boxes plus corridors around every direct edge segment.
pub(super) fn obstacles(
    graph: &PedigreeGraph,
    drawing: &DrawingTable,
    dims: &DimensionConfig,
    direct: &[EdgeLayout],
) -> Vec<Obstacle> {
    let mut out: Vec<Obstacle> = graph
        .nodes()
        .map(|node| {
            let center = drawing.point(node);
            if node.is_individual() {
                Obstacle::around(center, dims.individual_width, dims.individual_height)
            } else {
                Obstacle::around(center, dims.relationship_size, dims.relationship_size)
            }
        })
        .collect();
    for edge in direct {
        for pair in edge.points.windows(2) {
            out.push(Obstacle::corridor(pair[0], pair[1]));
        }
    }
    out
}
