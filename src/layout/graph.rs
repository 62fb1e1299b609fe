use std::collections::{HashMap, VecDeque};

use crate::config::LayoutConfig;
use crate::ir::{Gender, Individual};

use super::error::{LayoutError, Result};
use super::types::NodeRef;

#[derive(Debug, Clone, PartialEq)]
pub struct IndividualNode {
    pub record: Individual,
    /// The relationship this individual is a child of.
    pub parental_relationship: Option<usize>,
    /// Relationships in which this individual is a partner.
    pub marital_relationships: Vec<usize>,
}

impl IndividualNode {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn gender(&self) -> Gender {
        self.record.gender
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipNode {
    pub id: String,
    /// Partner indices, ascending.
    pub partners: Vec<usize>,
    /// Child indices in dataset order.
    pub children: Vec<usize>,
}

/// Arena of individuals and synthesized relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct PedigreeGraph {
    pub individuals: Vec<IndividualNode>,
    pub relationships: Vec<RelationshipNode>,
    pub root: usize,
    index: HashMap<String, usize>,
}

impl PedigreeGraph {
    pub fn individual_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node_id(&self, node: NodeRef) -> &str {
        match node {
            NodeRef::Individual(idx) => self.individuals[idx].id(),
            NodeRef::Relationship(idx) => &self.relationships[idx].id,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        (0..self.individuals.len())
            .map(NodeRef::Individual)
            .chain((0..self.relationships.len()).map(NodeRef::Relationship))
    }
}

#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: PedigreeGraph,
    /// Individuals with no path to the root, when filtering is enabled.
    pub detached: Vec<Individual>,
}

pub fn relationship_id(partner_ids: &[&str]) -> String {
    let mut ids: Vec<&str> = partner_ids.to_vec();
    ids.sort_unstable();
    format!("rel:{}", ids.join("&"))
}

pub fn build_graph(individuals: Vec<Individual>, config: &LayoutConfig) -> Result<BuiltGraph> {
    if individuals.is_empty() {
        return Err(LayoutError::disconnected("dataset has no individuals"));
    }
    let root_pos = match config.root_id.as_deref() {
        Some(root_id) => individuals
            .iter()
            .position(|ind| ind.id == root_id)
            .ok_or_else(|| {
                LayoutError::disconnected(format!("root {root_id} is not in the dataset"))
            })?,
        None => 0,
    };

    let reachable = reachable_from(&individuals, root_pos);
    let (kept, detached): (Vec<(usize, Individual)>, Vec<(usize, Individual)>) = individuals
        .into_iter()
        .enumerate()
        .partition(|(pos, _)| reachable[*pos] || !config.filter_unrelated_individuals);
    let unrelated = reachable.iter().filter(|r| !**r).count();
    if unrelated > 0 {
        log::debug!(
            "{unrelated} individuals are unrelated to the root (filtered: {})",
            config.filter_unrelated_individuals
        );
    }

    let root = kept
        .iter()
        .position(|(pos, _)| *pos == root_pos)
        .ok_or_else(|| LayoutError::disconnected("root was filtered out"))?;
    let records: Vec<Individual> = kept.into_iter().map(|(_, ind)| ind).collect();
    let detached = detached.into_iter().map(|(_, ind)| ind).collect();

    let index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, ind)| (ind.id.clone(), idx))
        .collect();

    let mut individuals: Vec<IndividualNode> = records
        .into_iter()
        .map(|record| IndividualNode {
            record,
            parental_relationship: None,
            marital_relationships: Vec::new(),
        })
        .collect();
    let mut relationships: Vec<RelationshipNode> = Vec::new();
    let mut by_partners: HashMap<Vec<usize>, usize> = HashMap::new();

    let mut intern = |partners: Vec<usize>,
                      individuals: &[IndividualNode],
                      relationships: &mut Vec<RelationshipNode>|
     -> usize {
        if let Some(&existing) = by_partners.get(&partners) {
            return existing;
        }
        let ids: Vec<&str> = partners.iter().map(|&p| individuals[p].id()).collect();
        let rel_idx = relationships.len();
        relationships.push(RelationshipNode {
            id: relationship_id(&ids),
            partners: partners.clone(),
            children: Vec::new(),
        });
        by_partners.insert(partners, rel_idx);
        rel_idx
    };

    for child in 0..individuals.len() {
        let mut parents: Vec<usize> = individuals[child]
            .record
            .parents
            .iter()
            .filter_map(|id| index.get(id).copied())
            .collect();
        if parents.is_empty() {
            continue;
        }
        parents.sort_unstable();
        parents.dedup();
        let rel = intern(parents, &individuals, &mut relationships);
        relationships[rel].children.push(child);
        individuals[child].parental_relationship = Some(rel);
    }

    for idx in 0..individuals.len() {
        let partner_ids = individuals[idx].record.partners.clone();
        for partner_id in partner_ids {
            let Some(&other) = index.get(&partner_id) else {
                continue;
            };
            let already_linked = relationships
                .iter()
                .any(|rel| rel.partners.contains(&idx) && rel.partners.contains(&other));
            if already_linked {
                continue;
            }
            let mut pair = vec![idx, other];
            pair.sort_unstable();
            intern(pair, &individuals, &mut relationships);
        }
    }

    for (rel_idx, rel) in relationships.iter().enumerate() {
        for &partner in &rel.partners {
            individuals[partner].marital_relationships.push(rel_idx);
        }
    }

    log::debug!(
        "pedigree graph: {} individuals, {} relationships",
        individuals.len(),
        relationships.len()
    );

    Ok(BuiltGraph {
        graph: PedigreeGraph {
            individuals,
            relationships,
            root,
            index,
        },
        detached,
    })
}

/// Marks records connected to `root` through parent, child or partner links.
fn reachable_from(individuals: &[Individual], root: usize) -> Vec<bool> {
    let position: HashMap<&str, usize> = individuals
        .iter()
        .enumerate()
        .map(|(idx, ind)| (ind.id.as_str(), idx))
        .collect();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); individuals.len()];
    for (idx, ind) in individuals.iter().enumerate() {
        for other in ind.parents.iter().chain(ind.partners.iter()) {
            if let Some(&other) = position.get(other.as_str()) {
                adjacency[idx].push(other);
                adjacency[other].push(idx);
            }
        }
    }

    let mut seen = vec![false; individuals.len()];
    let mut queue = VecDeque::from([root]);
    seen[root] = true;
    while let Some(idx) = queue.pop_front() {
        for &next in &adjacency[idx] {
            if !seen[next] {
                seen[next] = true;
                queue.push_back(next);
            }
        }
    }
    seen
}
