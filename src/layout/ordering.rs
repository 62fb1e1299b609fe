//! Left-to-right ordering of every generation row.
//!
//! Nodes first receive provisional positions in fixed point. Every placed
//! individual owns a band, an open interval around its position, and
//! everything the walk places on its behalf lands inside that band: its
//! marriages, spouses and children, its parents and siblings. Bands handed
//! on to relatives are disjoint cells of the band that reached them, so
//! families nested under different people never interleave. Marriages of
//! married-in partners are deferred, laid out as separate subtrees and
//! scaled into the block reserved beside the partner. Unreached fragments
//! are appended to the right, and relationships joining two already placed
//! families are positioned by trial against a crossing count. The dense
//! per-row order is the sort of these positions.

use std::cmp::Ordering;
use std::collections::VecDeque;

use super::Cancellation;
use super::error::{LayoutError, Result};
use super::graph::PedigreeGraph;
use super::types::{DrawingTable, NodeRef};
use crate::ir::Gender;

/// Fixed-point provisional position.
type Pos = i128;

/// Band of a walk's seed. Products of two bands stay inside `i128`.
const UNIT: Pos = 1 << 60;
/// Gap left between the placed graph and an appended fragment.
const FRAGMENT_GAP: Pos = UNIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    pos: Pos,
    seq: u64,
    /// Half-width of the interval this node's relatives are placed in.
    band: Pos,
}

#[derive(Debug, Clone)]
struct Placement {
    individuals: Vec<Option<Slot>>,
    relationships: Vec<Option<Slot>>,
    next_seq: u64,
}

impl Placement {
    fn new(graph: &PedigreeGraph) -> Self {
        Self {
            individuals: vec![None; graph.individuals.len()],
            relationships: vec![None; graph.relationships.len()],
            next_seq: 0,
        }
    }

    fn slot(&self, node: NodeRef) -> Option<Slot> {
        match node {
            NodeRef::Individual(idx) => self.individuals[idx],
            NodeRef::Relationship(idx) => self.relationships[idx],
        }
    }

    fn slot_mut(&mut self, node: NodeRef) -> &mut Option<Slot> {
        match node {
            NodeRef::Individual(idx) => &mut self.individuals[idx],
            NodeRef::Relationship(idx) => &mut self.relationships[idx],
        }
    }

    fn pos(&self, node: NodeRef) -> Option<Pos> {
        self.slot(node).map(|slot| slot.pos)
    }

    fn is_placed(&self, node: NodeRef) -> bool {
        self.slot(node).is_some()
    }

    fn place(&mut self, node: NodeRef, pos: Pos, band: Pos) {
        let seq = self.next_seq;
        self.next_seq += 1;
        *self.slot_mut(node) = Some(Slot { pos, seq, band });
    }

    fn move_to(&mut self, node: NodeRef, pos: Pos) {
        if let Some(slot) = self.slot_mut(node) {
            slot.pos = pos;
        }
    }

    fn narrow(&mut self, node: NodeRef, band: Pos) {
        if let Some(slot) = self.slot_mut(node) {
            slot.band = band;
        }
    }

    fn placed(&self) -> impl Iterator<Item = (NodeRef, Slot)> + '_ {
        let individuals = self
            .individuals
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.map(|s| (NodeRef::Individual(idx), s)));
        let relationships = self
            .relationships
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.map(|s| (NodeRef::Relationship(idx), s)));
        individuals.chain(relationships)
    }

    fn max_pos(&self) -> Option<Pos> {
        self.placed().map(|(_, slot)| slot.pos).max()
    }
}

/// The interval `origin .. origin + dir * extent`, filled with marriages
/// from `origin` outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    origin: Pos,
    extent: Pos,
    dir: Pos,
}

/// Marriages of a married-in partner, laid out after the main walk inside
/// the block reserved for them.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Deferred {
    anchor: usize,
    relationships: Vec<usize>,
    block: Block,
}

/// One cell of the row laid out when a walk reaches someone's parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Person(usize),
    Marriages,
}

/// One breadth-first placement pass. `outside` holds nodes placed by earlier
/// passes; they count as taken but are never moved, and their positions are
/// in another frame so side decisions ignore them.
struct Walker<'a> {
    graph: &'a PedigreeGraph,
    outside: Option<&'a Placement>,
    placement: Placement,
    married_in: Vec<bool>,
    queue: VecDeque<usize>,
    deferred: Vec<Deferred>,
    unresolved: Vec<usize>,
}

impl<'a> Walker<'a> {
    fn new(graph: &'a PedigreeGraph, outside: Option<&'a Placement>, placement: Placement) -> Self {
        Self {
            graph,
            outside,
            placement,
            married_in: vec![false; graph.individuals.len()],
            queue: VecDeque::new(),
            deferred: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    fn finish(self) -> (Placement, Vec<Deferred>, Vec<usize>) {
        (self.placement, self.deferred, self.unresolved)
    }

    fn taken(&self, node: NodeRef) -> bool {
        self.placement.is_placed(node) || self.outside.is_some_and(|p| p.is_placed(node))
    }

    fn seed(&mut self, idx: usize, pos: Pos) {
        self.placement.place(NodeRef::Individual(idx), pos, UNIT);
        self.queue.push_back(idx);
    }

    fn run(&mut self, cancel: &Cancellation<'_>) -> Result<()> {
        while let Some(idx) = self.queue.pop_front() {
            cancel.check()?;
            self.expand(idx);
        }
        Ok(())
    }

    /// Direction from `slot` to an already placed node of this pass.
    fn direction_to(&self, slot: Slot, node: NodeRef) -> Option<Pos> {
        self.placement
            .pos(node)
            .map(|pos| (pos - slot.pos).signum())
            .filter(|&dir| dir != 0)
    }

    fn has_open_partner(&self, rel: usize, anchor: usize) -> bool {
        let partners = &self.graph.relationships[rel].partners;
        partners.len() < 2
            || partners
                .iter()
                .any(|&p| p != anchor && !self.taken(NodeRef::Individual(p)))
    }

    fn expand(&mut self, idx: usize) {
        let graph = self.graph;
        let Some(slot) = self.placement.slot(NodeRef::Individual(idx)) else {
            return;
        };
        let ind = &graph.individuals[idx];

        let mut marriages = Vec::new();
        for &rel in &ind.marital_relationships {
            if self.taken(NodeRef::Relationship(rel)) {
                continue;
            }
            if !self.has_open_partner(rel, idx) {
                self.unresolved.push(rel);
                continue;
            }
            marriages.push(rel);
        }

        // New marriages go away from one already placed, otherwise where the
        // spouse's siblings leave room, otherwise away from this person's
        // own siblings, otherwise by partner rank.
        let toward = ind
            .marital_relationships
            .iter()
            .find_map(|&rel| self.direction_to(slot, NodeRef::Relationship(rel)));
        let (side, alternate) = match toward {
            Some(dir) => (-dir, false),
            None => {
                let side = marriages
                    .first()
                    .and_then(|&rel| self.spouse_preference(idx, rel))
                    .or_else(|| {
                        ind.parental_relationship
                            .and_then(|rel| self.direction_to(slot, NodeRef::Relationship(rel)))
                            .map(|dir| -dir)
                    })
                    .unwrap_or_else(|| rank_side(graph, idx, marriages.first().copied()));
                (side, true)
            }
        };
        let married_in = self.married_in[idx];
        let (mut primary, mut opposite) = (Vec::new(), Vec::new());
        for (nth, rel) in marriages.into_iter().enumerate() {
            if alternate && !married_in && nth % 2 == 1 {
                opposite.push(rel);
            } else {
                primary.push(rel);
            }
        }

        let trigger = toward.or((!primary.is_empty()).then_some(side));
        let mut band = slot.band;
        let mut reserved = None;
        if let Some(rel) = ind.parental_relationship
            && !self.taken(NodeRef::Relationship(rel))
            && let Some((own, block)) =
                self.place_parents(idx, slot, rel, trigger, side, !primary.is_empty())
        {
            band = own;
            reserved = block;
        }
        let block = reserved.unwrap_or(Block {
            origin: slot.pos,
            extent: band,
            dir: side,
        });

        if married_in {
            if !primary.is_empty() {
                self.deferred.push(Deferred {
                    anchor: idx,
                    relationships: primary,
                    block,
                });
            }
            return;
        }
        self.place_marriages(idx, &primary, block);
        self.place_marriages(
            idx,
            &opposite,
            Block {
                origin: slot.pos,
                extent: band,
                dir: -side,
            },
        );
    }

    /// Side a first marriage of `anchor` should take so that its spouse,
    /// once the spouse's siblings are sorted by age, ends up next to it.
    fn spouse_preference(&self, anchor: usize, rel: usize) -> Option<Pos> {
        let spouse = partner_order(self.graph, rel)
            .into_iter()
            .find(|&p| p != anchor && !self.taken(NodeRef::Individual(p)))?;
        let parents = self.graph.individuals[spouse].parental_relationship?;
        if self.taken(NodeRef::Relationship(parents)) {
            return None;
        }
        let by_age = age_order(self.graph, parents)?;
        if by_age.len() < 2 {
            None
        } else if by_age.first() == Some(&spouse) {
            Some(1)
        } else if by_age.last() == Some(&spouse) {
            Some(-1)
        } else {
            None
        }
    }

    /// A parent with no parents and no other partner adds nothing to the
    /// child's row, so it may sit between the child and the child's spouse.
    fn is_lonely(&self, partner: usize, rel: usize) -> bool {
        let ind = &self.graph.individuals[partner];
        ind.parental_relationship.is_none() && ind.marital_relationships.iter().all(|&r| r == rel)
    }

    /// Splits `child`'s band into equal cells: parents at the ends, siblings
    /// in between, and a block for the child's new marriages next to it on
    /// `side`. Returns the child's narrowed band and that block, or `None`
    /// when both parents are already placed elsewhere.
    fn place_parents(
        &mut self,
        child: usize,
        child_slot: Slot,
        rel: usize,
        trigger: Option<Pos>,
        side: Pos,
        wants_block: bool,
    ) -> Option<(Pos, Option<Block>)> {
        let open: Vec<usize> = partner_order(self.graph, rel)
            .into_iter()
            .filter(|&p| !self.taken(NodeRef::Individual(p)))
            .collect();
        if open.is_empty() {
            self.unresolved.push(rel);
            return None;
        }
        let siblings: Vec<usize> = self
            .sibling_order(rel, trigger.map(|dir| (child, dir)))
            .into_iter()
            .filter(|&c| c == child || !self.taken(NodeRef::Individual(c)))
            .collect();
        let (left, right) = self.parent_sides(child, child_slot, rel, open, trigger);

        let at_end = if side > 0 {
            siblings.last()
        } else {
            siblings.first()
        } == Some(&child);
        let near = if side > 0 { &right } else { &left };
        let inner = match near.as_slice() {
            [parent] if wants_block && at_end && self.is_lonely(*parent, rel) => Some(*parent),
            _ => None,
        };

        let mut cells: Vec<Cell> = left
            .iter()
            .filter(|&&p| Some(p) != inner)
            .map(|&p| Cell::Person(p))
            .collect();
        for &sibling in &siblings {
            if sibling == child && wants_block && side < 0 {
                cells.push(Cell::Marriages);
                cells.extend(inner.map(Cell::Person));
            }
            cells.push(Cell::Person(sibling));
            if sibling == child && wants_block && side > 0 {
                cells.extend(inner.map(Cell::Person));
                cells.push(Cell::Marriages);
            }
        }
        cells.extend(
            right
                .iter()
                .filter(|&&p| Some(p) != inner)
                .map(|&p| Cell::Person(p)),
        );

        let own = cells
            .iter()
            .position(|&cell| cell == Cell::Person(child))
            .unwrap_or(0);
        let reach = own.max(cells.len() - 1 - own) as Pos;
        let width = 2 * child_slot.band / (2 * reach + 1);
        let half = width / 2;
        let at = |cell: usize| child_slot.pos + (cell as Pos - own as Pos) * width;

        let sibling_cells: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| matches!(cell, Cell::Person(p) if siblings.contains(p)))
            .map(|(i, _)| i)
            .collect();
        let first = sibling_cells.first().copied().unwrap_or(own);
        let last = sibling_cells.last().copied().unwrap_or(own);
        self.placement.place(
            NodeRef::Relationship(rel),
            (at(first) + at(last)) / 2,
            (at(last) - at(first)) / 2 + half,
        );

        let mut block = None;
        for (i, &cell) in cells.iter().enumerate() {
            match cell {
                Cell::Person(person) if person != child => {
                    self.placement
                        .place(NodeRef::Individual(person), at(i), half);
                    self.queue.push_back(person);
                }
                Cell::Person(_) => {}
                Cell::Marriages => {
                    block = Some(Block {
                        origin: at(i) - side * half,
                        extent: width,
                        dir: side,
                    });
                }
            }
        }
        self.placement.narrow(NodeRef::Individual(child), half);
        Some((half, block))
    }

    /// Open parents split into a left and a right group, male first. When
    /// the child marries toward one side, a parent whose family reaches
    /// further is swapped to the other side.
    fn parent_sides(
        &self,
        child: usize,
        child_slot: Slot,
        rel: usize,
        open: Vec<usize>,
        trigger: Option<Pos>,
    ) -> (Vec<usize>, Vec<usize>) {
        if let [partner] = open.as_slice() {
            let other = self.graph.relationships[rel]
                .partners
                .iter()
                .filter(|&&p| p != *partner)
                .find_map(|&p| self.placement.pos(NodeRef::Individual(p)));
            let goes_right = match other {
                Some(pos) => pos < child_slot.pos,
                None => trigger == Some(-1),
            };
            return if goes_right {
                (Vec::new(), open)
            } else {
                (open, Vec::new())
            };
        }
        let split = open.len().div_ceil(2);
        let mut left = open[..split].to_vec();
        let mut right = open[split..].to_vec();
        let swap = match (trigger, left.as_slice(), right.as_slice()) {
            (Some(dir), &[l], &[r]) => {
                let (near, far) = if dir > 0 { (r, l) } else { (l, r) };
                !self.is_lonely(near, rel) && self.is_lonely(far, rel)
            }
            _ => false,
        };
        if swap {
            std::mem::swap(&mut left, &mut right);
        }
        log::trace!(
            "parents of {} split {}/{}",
            self.graph.individuals[child].id(),
            left.len(),
            right.len()
        );
        (left, right)
    }

    /// Places `rels` one after another inside `block`, each in an equal
    /// share of it.
    fn place_marriages(&mut self, anchor: usize, rels: &[usize], block: Block) {
        if rels.is_empty() {
            return;
        }
        let length = block.extent / rels.len() as Pos;
        for (nth, &rel) in rels.iter().enumerate() {
            let near = block.origin + block.dir * length * nth as Pos;
            self.place_marriage(anchor, rel, near, length, block.dir);
        }
    }

    /// One marriage inside `near .. near + dir * length`. The relationship
    /// and its children take the inner third and the spouses share the rest.
    fn place_marriage(&mut self, anchor: usize, rel: usize, near: Pos, length: Pos, dir: Pos) {
        let half = length / 6;
        let center = near + dir * half;
        self.placement
            .place(NodeRef::Relationship(rel), center, half);

        let spouses: Vec<usize> = partner_order(self.graph, rel)
            .into_iter()
            .filter(|&p| p != anchor && !self.taken(NodeRef::Individual(p)))
            .collect();
        if !spouses.is_empty() {
            let cell = 2 * length / (3 * spouses.len() as Pos);
            for (i, &spouse) in spouses.iter().enumerate() {
                let pos = near + dir * (length / 3 + cell * i as Pos + cell / 2);
                self.placement
                    .place(NodeRef::Individual(spouse), pos, cell / 2);
                self.married_in[spouse] = true;
                self.queue.push_back(spouse);
            }
        }
        self.place_children(rel, center, half);
    }

    /// Children spread over `center ± half`, one equal cell each.
    fn place_children(&mut self, rel: usize, center: Pos, half: Pos) {
        let children = self.sibling_order(rel, None);
        let band = half / children.len().max(1) as Pos;
        for (i, &child) in children.iter().enumerate() {
            if self.taken(NodeRef::Individual(child)) {
                continue;
            }
            let pos = center - half + (2 * i as Pos + 1) * band;
            self.placement
                .place(NodeRef::Individual(child), pos, band);
            self.queue.push_back(child);
        }
    }

    /// Children by descending age when every age is known. Otherwise dataset
    /// order, with the triggering child moved to the end on its marriage
    /// side so its siblings fill the far side.
    fn sibling_order(&self, rel: usize, trigger: Option<(usize, Pos)>) -> Vec<usize> {
        if let Some(by_age) = age_order(self.graph, rel) {
            return by_age;
        }
        let mut children = self.graph.relationships[rel].children.clone();
        if let Some((child, dir)) = trigger {
            children.retain(|&c| c != child);
            if dir > 0 {
                children.push(child);
            } else {
                children.insert(0, child);
            }
        }
        children
    }
}

/// Children oldest first, or `None` when some age is missing.
fn age_order(graph: &PedigreeGraph, rel: usize) -> Option<Vec<usize>> {
    let mut children = graph.relationships[rel].children.clone();
    let age = |idx: usize| graph.individuals[idx].record.age;
    if !children.iter().all(|&c| age(c).is_some()) {
        return None;
    }
    children.sort_by(|&a, &b| age(b).partial_cmp(&age(a)).unwrap_or(Ordering::Equal));
    Some(children)
}

/// Male partners first, then dataset order.
fn partner_order(graph: &PedigreeGraph, rel: usize) -> Vec<usize> {
    let mut partners = graph.relationships[rel].partners.clone();
    partners.sort_by_key(|&p| (graph.individuals[p].gender() != Gender::Male, p));
    partners
}

/// Right for the first partner in [`partner_order`], left for the others.
fn rank_side(graph: &PedigreeGraph, idx: usize, rel: Option<usize>) -> Pos {
    match rel {
        Some(rel) if partner_order(graph, rel).first() != Some(&idx) => -1,
        _ => 1,
    }
}

/// Orders every row, writes `order` into `drawing`, and returns each
/// individual's generation/sequence name.
pub(super) fn order_graph(
    graph: &PedigreeGraph,
    drawing: &mut DrawingTable,
    max_height: usize,
    cancel: &Cancellation<'_>,
) -> Result<Vec<String>> {
    let mut walker = Walker::new(graph, None, Placement::new(graph));
    walker.seed(graph.root, 0);
    walker.run(cancel)?;
    let (mut placement, deferred, unresolved) = walker.finish();
    let mut deferred: VecDeque<Deferred> = deferred.into();
    let mut unresolved: VecDeque<usize> = unresolved.into();

    loop {
        while let Some(item) = deferred.pop_front() {
            cancel.check()?;
            splice_auxiliary(
                graph,
                &mut placement,
                item,
                &mut deferred,
                &mut unresolved,
                cancel,
            )?;
        }

        if let Some(rel) = unresolved.pop_front() {
            cancel.check()?;
            if placement.is_placed(NodeRef::Relationship(rel)) {
                continue;
            }
            let (center, half) = resolve_by_trial(graph, drawing, &mut placement, rel);
            let mut walker = Walker::new(graph, None, placement);
            walker.place_children(rel, center, half);
            walker.run(cancel)?;
            let (next, more_deferred, more_unresolved) = walker.finish();
            placement = next;
            deferred.extend(more_deferred);
            unresolved.extend(more_unresolved);
            continue;
        }

        if let Some(idx) = placement.individuals.iter().position(Option::is_none) {
            cancel.check()?;
            append_fragment(
                graph,
                &mut placement,
                idx,
                &mut deferred,
                &mut unresolved,
                cancel,
            )?;
            continue;
        }

        if let Some(rel) = placement.relationships.iter().position(Option::is_none) {
            unresolved.push_back(rel);
            continue;
        }
        break;
    }

    write_orders(graph, &placement, drawing)?;
    log::debug!("ordering: {} rows ordered", max_height + 1);
    Ok(order_based_names(graph, drawing, max_height))
}

/// Lays out the subtree hanging off deferred marriages on its own, in a
/// fresh frame, and scales it into the block reserved next to the partner.
fn splice_auxiliary(
    graph: &PedigreeGraph,
    placement: &mut Placement,
    item: Deferred,
    deferred: &mut VecDeque<Deferred>,
    unresolved: &mut VecDeque<usize>,
    cancel: &Cancellation<'_>,
) -> Result<()> {
    let anchor_node = NodeRef::Individual(item.anchor);
    if !placement.is_placed(anchor_node) {
        return Ok(());
    }
    let mut open = Vec::new();
    for &rel in &item.relationships {
        if placement.is_placed(NodeRef::Relationship(rel)) {
            continue;
        }
        let partners = &graph.relationships[rel].partners;
        let open_partner = partners
            .iter()
            .any(|&p| p != item.anchor && !placement.is_placed(NodeRef::Individual(p)));
        if partners.len() > 1 && !open_partner {
            unresolved.push_back(rel);
            continue;
        }
        open.push(rel);
    }
    if open.is_empty() {
        return Ok(());
    }

    let (local, more_deferred, more_unresolved) = {
        let mut walker = Walker::new(graph, Some(&*placement), Placement::new(graph));
        walker.placement.place(anchor_node, 0, UNIT);
        walker.place_marriages(
            item.anchor,
            &open,
            Block {
                origin: 0,
                extent: UNIT,
                dir: item.block.dir,
            },
        );
        walker.run(cancel)?;
        walker.finish()
    };

    let block = item.block;
    let scale = |value: Pos| value * block.extent / UNIT;
    let mut spliced: Vec<(NodeRef, Slot)> = local
        .placed()
        .filter(|(node, _)| *node != anchor_node)
        .collect();
    spliced.sort_by_key(|(_, slot)| slot.seq);
    log::trace!(
        "splicing {} nodes beside {}",
        spliced.len(),
        graph.individuals[item.anchor].id()
    );
    for (node, slot) in spliced {
        placement.place(node, block.origin + scale(slot.pos), scale(slot.band));
    }
    deferred.extend(more_deferred.into_iter().map(|mut nested| {
        nested.block.origin = block.origin + scale(nested.block.origin);
        nested.block.extent = scale(nested.block.extent);
        nested
    }));
    unresolved.extend(more_unresolved);
    Ok(())
}

fn fragment_overflow() -> LayoutError {
    LayoutError::disconnected("too many fragments to keep apart")
}

/// Walks an unreached fragment on its own and appends it to the right.
fn append_fragment(
    graph: &PedigreeGraph,
    placement: &mut Placement,
    root: usize,
    deferred: &mut VecDeque<Deferred>,
    unresolved: &mut VecDeque<usize>,
    cancel: &Cancellation<'_>,
) -> Result<()> {
    let (local, more_deferred, more_unresolved) = {
        let mut walker = Walker::new(graph, Some(&*placement), Placement::new(graph));
        walker.seed(root, 0);
        walker.run(cancel)?;
        walker.finish()
    };
    let mut nodes: Vec<(NodeRef, Slot)> = local.placed().collect();
    nodes.sort_by_key(|(_, slot)| slot.seq);
    let local_min = nodes.iter().map(|(_, slot)| slot.pos).min().unwrap_or(0);
    let offset = placement
        .max_pos()
        .unwrap_or(0)
        .checked_add(FRAGMENT_GAP)
        .and_then(|edge| edge.checked_sub(local_min))
        .ok_or_else(fragment_overflow)?;
    log::debug!(
        "appending fragment of {} nodes rooted at {}",
        nodes.len(),
        graph.individuals[root].id()
    );
    for (node, slot) in nodes {
        let pos = slot.pos.checked_add(offset).ok_or_else(fragment_overflow)?;
        placement.place(node, pos, slot.band);
    }
    for mut nested in more_deferred {
        nested.block.origin = nested
            .block
            .origin
            .checked_add(offset)
            .ok_or_else(fragment_overflow)?;
        deferred.push_back(nested);
    }
    unresolved.extend(more_unresolved);
    Ok(())
}

/// Positions a relationship whose partners already sit in separate families.
/// Starts at the partners' midpoint, then tries a short offset beside each
/// partner and keeps a candidate only if the crossing cost does not grow.
/// Returns the chosen position and the half-width left for its children.
fn resolve_by_trial(
    graph: &PedigreeGraph,
    drawing: &DrawingTable,
    placement: &mut Placement,
    rel: usize,
) -> (Pos, Pos) {
    let node = NodeRef::Relationship(rel);
    let partner_slots: Vec<Slot> = partner_order(graph, rel)
        .into_iter()
        .filter_map(|p| placement.slot(NodeRef::Individual(p)))
        .collect();
    let half = (partner_slots.iter().map(|s| s.band).min().unwrap_or(UNIT) / 3).max(1);
    let min = partner_slots.iter().map(|s| s.pos).min().unwrap_or(0);
    let max = partner_slots.iter().map(|s| s.pos).max().unwrap_or(0);
    let mut chosen = min + (max - min) / 2;

    placement.place(node, chosen, half);
    let mut best = crossing_cost(graph, drawing, placement);
    for slot in &partner_slots {
        for candidate in [slot.pos + slot.band / 2, slot.pos - slot.band / 2] {
            if candidate == chosen {
                continue;
            }
            placement.move_to(node, candidate);
            let cost = crossing_cost(graph, drawing, placement);
            if cost <= best {
                best = cost;
                chosen = candidate;
            } else {
                placement.move_to(node, chosen);
            }
        }
    }
    log::trace!(
        "{} placed by trial with crossing cost {best}",
        graph.relationships[rel].id
    );
    (chosen, half)
}

/// Rank of every placed node within its row, by position then placement
/// sequence.
fn row_ranks(
    graph: &PedigreeGraph,
    drawing: &DrawingTable,
    placement: &Placement,
) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let mut rows: Vec<Vec<(Pos, u64, NodeRef)>> = Vec::new();
    for (node, slot) in placement.placed() {
        let row = drawing.height(node);
        if rows.len() <= row {
            rows.resize_with(row + 1, Vec::new);
        }
        rows[row].push((slot.pos, slot.seq, node));
    }
    let mut ind_rank = vec![None; graph.individuals.len()];
    let mut rel_rank = vec![None; graph.relationships.len()];
    for row in &mut rows {
        row.sort_unstable();
        for (rank, &(_, _, node)) in row.iter().enumerate() {
            match node {
                NodeRef::Individual(idx) => ind_rank[idx] = Some(rank),
                NodeRef::Relationship(idx) => rel_rank[idx] = Some(rank),
            }
        }
    }
    (ind_rank, rel_rank)
}

/// Crossings between relationship-to-child lines of adjacent rows, plus the
/// number of foreign nodes each same-row partner line passes over.
fn crossing_cost(graph: &PedigreeGraph, drawing: &DrawingTable, placement: &Placement) -> usize {
    let (ind_rank, rel_rank) = row_ranks(graph, drawing, placement);
    let mut cost = 0usize;
    let mut descent_edges: Vec<Vec<(usize, usize)>> = Vec::new();

    for (idx, rel) in graph.relationships.iter().enumerate() {
        let Some(rank) = rel_rank[idx] else {
            continue;
        };
        let row = drawing.relationships[idx].height_index;
        for &partner in &rel.partners {
            if drawing.individuals[partner].height_index != row {
                continue;
            }
            if let Some(partner_rank) = ind_rank[partner] {
                cost += rank.abs_diff(partner_rank).saturating_sub(1);
            }
        }
        if descent_edges.len() <= row {
            descent_edges.resize_with(row + 1, Vec::new);
        }
        for &child in &rel.children {
            if let Some(child_rank) = ind_rank[child] {
                descent_edges[row].push((rank, child_rank));
            }
        }
    }

    for edges in &descent_edges {
        for (i, a) in edges.iter().enumerate() {
            for b in &edges[i + 1..] {
                if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                    cost += 1;
                }
            }
        }
    }
    cost
}

fn write_orders(
    graph: &PedigreeGraph,
    placement: &Placement,
    drawing: &mut DrawingTable,
) -> Result<()> {
    let placed_individuals = placement.individuals.iter().flatten().count();
    let placed_relationships = placement.relationships.iter().flatten().count();
    if placed_individuals != graph.individuals.len()
        || placed_relationships != graph.relationships.len()
    {
        return Err(LayoutError::disconnected(format!(
            "ordered {placed_individuals} of {} individuals and {placed_relationships} of {} relationships",
            graph.individuals.len(),
            graph.relationships.len()
        )));
    }
    let (ind_rank, rel_rank) = row_ranks(graph, drawing, placement);
    for (idx, rank) in ind_rank.into_iter().enumerate() {
        drawing.individuals[idx].order = rank.unwrap_or(0);
    }
    for (idx, rank) in rel_rank.into_iter().enumerate() {
        drawing.relationships[idx].order = rank.unwrap_or(0);
    }
    Ok(())
}

/// Every row's nodes, left to right, indexed by height.
pub(super) fn rows_by_order(
    graph: &PedigreeGraph,
    drawing: &DrawingTable,
    max_height: usize,
) -> Vec<Vec<NodeRef>> {
    let mut rows: Vec<Vec<NodeRef>> = vec![Vec::new(); max_height + 1];
    for node in graph.nodes() {
        rows[drawing.height(node)].push(node);
    }
    for row in &mut rows {
        row.sort_by_key(|&node| drawing.get(node).order);
    }
    rows
}

/// `II-3` style labels: roman generation counted from the top row, then the
/// 1-based position among the individuals of that row; probands get a `p`.
fn order_based_names(graph: &PedigreeGraph, drawing: &DrawingTable, max_height: usize) -> Vec<String> {
    let mut names = vec![String::new(); graph.individuals.len()];
    for (height, row) in rows_by_order(graph, drawing, max_height).iter().enumerate() {
        let generation = roman_numeral(max_height - height + 1);
        let individuals = row.iter().filter_map(|node| match node {
            NodeRef::Individual(idx) => Some(*idx),
            NodeRef::Relationship(_) => None,
        });
        for (seq, idx) in individuals.enumerate() {
            let suffix = if graph.individuals[idx].record.is_proband {
                "p"
            } else {
                ""
            };
            names[idx] = format!("{generation}-{}{suffix}", seq + 1);
        }
    }
    names
}

pub(crate) fn roman_numeral(mut value: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for &(amount, glyph) in &TABLE {
        while value >= amount {
            out.push_str(glyph);
            value -= amount;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{Gender, Individual};
    use crate::layout::graph::build_graph;
    use crate::layout::graph::tests::{family, person};
    use crate::layout::ranking::assign_heights;

    fn ordered(people: Vec<Individual>) -> (PedigreeGraph, DrawingTable, Vec<String>) {
        ordered_with(people, &LayoutConfig::default())
    }

    fn ordered_with(
        people: Vec<Individual>,
        config: &LayoutConfig,
    ) -> (PedigreeGraph, DrawingTable, Vec<String>) {
        let graph = build_graph(people, config).unwrap().graph;
        let mut drawing = DrawingTable::for_graph(&graph);
        let cancel = Cancellation::none();
        let max = assign_heights(&graph, &mut drawing, &cancel).unwrap();
        let names = order_graph(&graph, &mut drawing, max, &cancel).unwrap();
        (graph, drawing, names)
    }

    fn order_of(graph: &PedigreeGraph, drawing: &DrawingTable, id: &str) -> usize {
        drawing.individuals[graph.individual_index(id).unwrap()].order
    }

    fn married(mut ind: Individual, partner: &str) -> Individual {
        ind.partners.push(partner.to_string());
        ind
    }

    /// Every partner on its relationship's row sits right next to it.
    fn assert_partners_adjacent(graph: &PedigreeGraph, drawing: &DrawingTable) {
        for (idx, rel) in graph.relationships.iter().enumerate() {
            let rel_drawing = drawing.relationships[idx];
            for &partner in &rel.partners {
                let partner_drawing = drawing.individuals[partner];
                if partner_drawing.height_index != rel_drawing.height_index {
                    continue;
                }
                assert_eq!(
                    partner_drawing.order.abs_diff(rel_drawing.order),
                    1,
                    "{} is separated from {}",
                    graph.individuals[partner].id(),
                    rel.id
                );
            }
        }
    }

    /// One founding couple; every child marries someone from outside and
    /// has `children` children, for `generations` generations.
    fn descendants(generations: usize, children: usize) -> Vec<Individual> {
        let mut people = vec![person("f0", Gender::Male, &[]), person("m0", Gender::Female, &[])];
        let mut couples = vec![("f0".to_string(), "m0".to_string())];
        let mut next = 1usize;
        for _ in 0..generations {
            let mut next_couples = Vec::new();
            for (father, mother) in &couples {
                for i in 0..children {
                    let id = format!("d{next}");
                    let spouse = format!("s{next}");
                    next += 1;
                    let (gender, spouse_gender) = if i % 2 == 0 {
                        (Gender::Male, Gender::Female)
                    } else {
                        (Gender::Female, Gender::Male)
                    };
                    let mut child = person(&id, gender, &[father.as_str(), mother.as_str()]);
                    child.age = Some(60.0 - i as f64);
                    people.push(child);
                    people.push(married(person(&spouse, spouse_gender, &[]), &id));
                    if gender == Gender::Male {
                        next_couples.push((id, spouse));
                    } else {
                        next_couples.push((spouse, id));
                    }
                }
            }
            couples = next_couples;
        }
        people
    }

    #[test]
    fn roman_numerals() {
        assert_eq!(roman_numeral(1), "I");
        assert_eq!(roman_numeral(4), "IV");
        assert_eq!(roman_numeral(9), "IX");
        assert_eq!(roman_numeral(14), "XIV");
    }

    #[test]
    fn parents_flank_their_relationship_male_first() {
        let (graph, drawing, names) = ordered(vec![
            person("p", Gender::Female, &["m", "f"]),
            person("m", Gender::Female, &[]),
            person("f", Gender::Male, &[]),
        ]);
        assert_eq!(order_of(&graph, &drawing, "f"), 0);
        assert_eq!(drawing.relationships[0].order, 1);
        assert_eq!(order_of(&graph, &drawing, "m"), 2);
        assert_eq!(names[0], "II-1");
        assert_eq!(names[graph.individual_index("f").unwrap()], "I-1");
    }

    #[test]
    fn siblings_are_adjacent_and_ordered_by_age() {
        let mut younger = person("a", Gender::Male, &["f"]);
        younger.age = Some(3.0);
        let mut older = person("b", Gender::Female, &["f"]);
        older.age = Some(9.0);
        let (graph, drawing, _) = ordered(vec![younger, older, person("f", Gender::Male, &[])]);
        assert_eq!(order_of(&graph, &drawing, "b"), 0);
        assert_eq!(order_of(&graph, &drawing, "a"), 1);
    }

    #[test]
    fn rows_form_dense_permutations() {
        let (graph, drawing, _) = ordered(family());
        let max = graph
            .nodes()
            .map(|node| drawing.height(node))
            .max()
            .unwrap();
        for row in rows_by_order(&graph, &drawing, max) {
            let mut orders: Vec<usize> = row.iter().map(|&n| drawing.get(n).order).collect();
            orders.sort_unstable();
            assert_eq!(orders, (0..row.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn relationships_sit_between_same_row_partners() {
        let (graph, drawing, _) = ordered(family());
        for (idx, rel) in graph.relationships.iter().enumerate() {
            let rel_drawing = drawing.relationships[idx];
            let same_row: Vec<usize> = rel
                .partners
                .iter()
                .filter(|&&p| drawing.individuals[p].height_index == rel_drawing.height_index)
                .map(|&p| drawing.individuals[p].order)
                .collect();
            if same_row.len() == 2 {
                let (lo, hi) = (same_row[0].min(same_row[1]), same_row[0].max(same_row[1]));
                assert!(
                    lo < rel_drawing.order && rel_drawing.order < hi,
                    "{} should sit between its partners",
                    rel.id
                );
            }
        }
    }

    #[test]
    fn married_in_spouse_sits_beside_proband_and_siblings_take_far_side() {
        let (graph, drawing, _) = ordered(family());
        let p = order_of(&graph, &drawing, "p");
        let w = order_of(&graph, &drawing, "w");
        let s = order_of(&graph, &drawing, "s");
        assert!(w > p, "male proband has his wife to the right");
        assert!(s < p, "sister is kept away from the marriage");
    }

    #[test]
    fn auxiliary_marriage_subtree_is_placed() {
        let (graph, drawing, names) = ordered(family());
        let xc = graph.individual_index("xc").unwrap();
        let c1 = graph.individual_index("c1").unwrap();
        assert_eq!(
            drawing.individuals[xc].height_index,
            drawing.individuals[c1].height_index
        );
        assert!(!names[xc].is_empty());
    }

    #[test]
    fn unrelated_fragment_is_appended_right() {
        let (graph, drawing, _) = ordered(vec![
            person("p", Gender::Male, &["f"]),
            person("f", Gender::Male, &[]),
            person("stranger", Gender::Female, &[]),
        ]);
        assert!(order_of(&graph, &drawing, "stranger") > order_of(&graph, &drawing, "p"));
    }

    #[test]
    fn cousin_marriage_is_resolved() {
        let mut people = vec![
            person("gf", Gender::Male, &[]),
            person("gm", Gender::Female, &[]),
            person("a", Gender::Male, &["gf", "gm"]),
            person("b", Gender::Female, &["gf", "gm"]),
            person("aw", Gender::Female, &[]),
            person("bh", Gender::Male, &[]),
            person("ca", Gender::Male, &["a", "aw"]),
            person("cb", Gender::Female, &["bh", "b"]),
            person("kid", Gender::Female, &["ca", "cb"]),
        ];
        people[8].is_proband = true;
        let (graph, drawing, names) = ordered(people);
        let kid = graph.individual_index("kid").unwrap();
        assert_eq!(drawing.individuals[kid].height_index, 0);
        assert!(names[kid].ends_with('p'));
        assert_eq!(graph.relationships.len(), 4);
    }

    #[test]
    fn crossing_cost_counts_inverted_descents() {
        let (graph, mut drawing, _) = ordered(vec![
            person("a", Gender::Male, &["f"]),
            person("b", Gender::Male, &["g"]),
            person("f", Gender::Male, &[]),
            person("g", Gender::Male, &[]),
        ]);
        let mut placement = Placement::new(&graph);
        let f_rel = graph.individuals[0].parental_relationship.unwrap();
        let g_rel = graph.individuals[1].parental_relationship.unwrap();
        drawing.individuals[0].height_index = 0;
        drawing.individuals[1].height_index = 0;
        placement.place(NodeRef::Individual(0), 10, 1);
        placement.place(NodeRef::Individual(1), 0, 1);
        placement.place(NodeRef::Relationship(f_rel), 0, 1);
        placement.place(NodeRef::Relationship(g_rel), 10, 1);
        assert_eq!(crossing_cost(&graph, &drawing, &placement), 1);
        placement.move_to(NodeRef::Individual(0), -10);
        assert_eq!(crossing_cost(&graph, &drawing, &placement), 0);
    }

    #[test]
    fn married_siblings_keep_spouses_beside_them_from_the_founder() {
        let mut founder = person("f", Gender::Male, &[]);
        founder.is_proband = true;
        let (graph, drawing, _) = ordered(vec![
            founder,
            person("m", Gender::Female, &[]),
            person("a", Gender::Male, &["f", "m"]),
            person("b", Gender::Female, &["f", "m"]),
            married(person("wa", Gender::Female, &[]), "a"),
            married(person("hb", Gender::Male, &[]), "b"),
        ]);
        assert_partners_adjacent(&graph, &drawing);
        let row: Vec<usize> = ["wa", "a", "b", "hb"]
            .iter()
            .map(|id| order_of(&graph, &drawing, id))
            .collect();
        assert!(row.windows(2).all(|pair| pair[0] < pair[1]), "{row:?}");
    }

    #[test]
    fn descendant_pedigree_keeps_every_couple_together() {
        let people = descendants(4, 3);
        let (graph, drawing, _) = ordered(people.clone());
        assert_partners_adjacent(&graph, &drawing);

        let config = LayoutConfig {
            root_id: people.last().map(|ind| ind.id.clone()),
            ..LayoutConfig::default()
        };
        let (graph, drawing, _) = ordered_with(people, &config);
        assert_partners_adjacent(&graph, &drawing);
    }

    #[test]
    fn many_unrelated_individuals_line_up_in_dataset_order() {
        let people: Vec<Individual> = (0..200)
            .map(|i| person(&format!("u{i}"), Gender::Female, &[]))
            .collect();
        let (graph, drawing, names) = ordered(people);
        for idx in 0..graph.individuals.len() {
            assert_eq!(drawing.individuals[idx].order, idx);
        }
        assert_eq!(names[199], "I-200");
    }

    #[test]
    fn fragment_offset_overflow_is_an_error() {
        let graph = build_graph(
            vec![person("a", Gender::Male, &[]), person("b", Gender::Male, &[])],
            &LayoutConfig::default(),
        )
        .unwrap()
        .graph;
        let mut placement = Placement::new(&graph);
        placement.place(NodeRef::Individual(0), Pos::MAX - 5, 1);
        let (mut deferred, mut unresolved) = (VecDeque::new(), VecDeque::new());
        let err = append_fragment(
            &graph,
            &mut placement,
            1,
            &mut deferred,
            &mut unresolved,
            &Cancellation::none(),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::DisconnectedGraph { .. }));
    }
}
