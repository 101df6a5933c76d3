use crate::entry::{EntryId, ProgrammeEntry, Relationship};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceIssue {
    /// The entry names itself as predecessor.
    SelfReference,
    /// The predecessor exists but is processed at or after the dependent.
    Forward,
    /// No entry holds the referenced sequence order.
    Missing,
}

impl fmt::Display for ReferenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReferenceIssue::SelfReference => "self reference",
            ReferenceIssue::Forward => "forward reference",
            ReferenceIssue::Missing => "missing predecessor",
        };
        f.write_str(text)
    }
}

/// A predecessor reference that cannot be resolved in a single forward pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub entry_id: EntryId,
    pub sequence_order: i32,
    pub predecessor_sequence_order: i32,
    pub issue: ReferenceIssue,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry at sequence order {} -> predecessor {}: {}",
            self.sequence_order, self.predecessor_sequence_order, self.issue
        )
    }
}

/// Predecessor links of one owner as a directed graph (predecessor ->
/// dependent), keyed by sequence order.
pub struct DependencyGraph {
    pub graph: DiGraph<i32, Relationship>,
    pub order_to_index: HashMap<i32, NodeIndex>,
    unresolved: Vec<UnresolvedReference>,
}

impl DependencyGraph {
    pub fn build(entries: &[ProgrammeEntry]) -> Self {
        let mut graph: DiGraph<i32, Relationship> = DiGraph::new();
        let mut order_to_index: HashMap<i32, NodeIndex> = HashMap::new();

        for entry in entries {
            let node_ix = graph.add_node(entry.sequence_order);
            order_to_index.insert(entry.sequence_order, node_ix);
        }

        let mut unresolved = Vec::new();
        for entry in entries {
            let Some(predecessor) = entry.predecessor_sequence_order else {
                continue;
            };
            let issue = if predecessor == entry.sequence_order {
                Some(ReferenceIssue::SelfReference)
            } else if !order_to_index.contains_key(&predecessor) {
                Some(ReferenceIssue::Missing)
            } else if predecessor > entry.sequence_order {
                Some(ReferenceIssue::Forward)
            } else {
                None
            };
            if let Some(issue) = issue {
                unresolved.push(UnresolvedReference {
                    entry_id: entry.id,
                    sequence_order: entry.sequence_order,
                    predecessor_sequence_order: predecessor,
                    issue,
                });
            }
            if let (Some(&u), Some(&v)) = (
                order_to_index.get(&predecessor),
                order_to_index.get(&entry.sequence_order),
            ) {
                graph.add_edge(u, v, entry.effective_relationship().unwrap_or_default());
            }
        }

        Self {
            graph,
            order_to_index,
            unresolved,
        }
    }

    /// References the resolver would have to fall back on.
    pub fn unresolved_references(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// Groups of sequence orders that depend on each other in a loop.
    pub fn cycles(&self) -> Vec<Vec<i32>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self
                        .graph
                        .find_edge(component[0], component[0])
                        .is_some()
            })
            .map(|component| {
                let mut orders: Vec<i32> = component.into_iter().map(|ix| self.graph[ix]).collect();
                orders.sort_unstable();
                orders
            })
            .collect()
    }
}
