use indexmap::IndexMap;

use super::graph::PedigreeGraph;

/// Maps disease names to 1-based color indices.
///
/// Without an allow-list the index covers every condition in first-seen
/// order: individuals in graph order, and for each one its diseases, then
/// carrier states, then asymptomatic conditions. An allow-list fixes both
/// the membership and the order, whether or not anyone is affected.
pub(super) fn disease_index(
    graph: &PedigreeGraph,
    visible: Option<&[String]>,
) -> IndexMap<String, usize> {
    let mut index: IndexMap<String, usize> = IndexMap::new();
    match visible {
        Some(allowed) => {
            for name in allowed {
                let next = index.len() + 1;
                index.entry(name.clone()).or_insert(next);
            }
        }
        None => {
            for ind in &graph.individuals {
                for name in ind.record.conditions() {
                    if !index.contains_key(name) {
                        index.insert(name.to_string(), index.len() + 1);
                    }
                }
            }
        }
    }
    index
}
