//! Generic iterative graph walker with node coloring and edge classification.
//!
//! The walker is node-type agnostic: anything cloneable and hashable can be a
//! node, and the graph itself never has to be materialized -- adjacency is
//! supplied by the visitor. Traversal uses an explicit frontier container (a
//! stack for DFS, a queue for BFS), so depth is bounded by memory rather than
//! by the call stack.
//!
//! Edge classification follows classic graph coloring: an edge whose target
//! is still Gray at the moment of traversal is a back edge, which is the sole
//! mechanism downstream cycle detection relies on.
//!
//! Finish ordering differs between the two orders. DFS registers the finish
//! marker for a node *before* its children on the stack, so it pops only once
//! every descendant has drained -- strict post-order. BFS enqueues the marker
//! after the children, which only guarantees finish times non-decreasing by
//! distance; a same-distance sibling may finish before a deeper descendant.
//! Callers that need strict post-order must walk with [`WalkOrder::Dfs`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Walk configuration
// ---------------------------------------------------------------------------

/// Frontier discipline: depth-first (stack) or breadth-first (queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    Dfs,
    Bfs,
}

/// Which way to walk a production graph: toward the formulas producing a
/// node's inputs, or toward the formulas consuming its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDirection {
    Source,
    Target,
}

/// Node processing state during one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeColor {
    /// Discovered and queued, not yet examined.
    White,
    /// Currently being processed (on the active path under DFS).
    Gray,
    /// Finished.
    Black,
}

// ---------------------------------------------------------------------------
// Visitor
// ---------------------------------------------------------------------------

/// Callbacks invoked by [`walk_graph`]. Every method defaults to a no-op, so
/// visitors implement only what they care about.
///
/// `tree_edge` is reported for an edge whose target is already discovered but
/// not yet examined (White); under BFS this includes edges a textbook would
/// call cross edges. `back_edge` fires iff the target is Gray -- an ancestor
/// still in progress. `fwd_or_cross_edge` fires for Black targets.
pub trait NodeVisitor<N> {
    /// Nodes adjacent to `node` in the given walk direction.
    fn get_adjacent(&mut self, _node: &N, _direction: WalkDirection, _distance: u32) -> Vec<N> {
        Vec::new()
    }

    /// `node` was seen for the first time and queued.
    fn discover_node(&mut self, _node: &N, _distance: u32) {}

    /// `node` was popped from the frontier and is now being processed.
    fn examine_node(&mut self, _node: &N, _distance: u32) {}

    /// `node` and (under DFS) all of its descendants are done.
    fn finish_node(&mut self, _node: &N, _distance: u32) {}

    fn tree_edge(&mut self, _source: &N, _target: &N) {}

    fn back_edge(&mut self, _source: &N, _target: &N) {}

    fn fwd_or_cross_edge(&mut self, _source: &N, _target: &N) {}
}

// ---------------------------------------------------------------------------
// Frontier
// ---------------------------------------------------------------------------

enum Entry<N> {
    Visit { node: N, distance: u32 },
    Finish { node: N, distance: u32 },
}

struct Frontier<N> {
    order: WalkOrder,
    entries: VecDeque<Entry<N>>,
    colors: HashMap<N, NodeColor>,
}

impl<N> Frontier<N>
where
    N: Clone + Eq + Hash + fmt::Debug,
{
    fn new(order: WalkOrder) -> Self {
        Self {
            order,
            entries: VecDeque::new(),
            colors: HashMap::new(),
        }
    }

    fn pop(&mut self) -> Option<Entry<N>> {
        match self.order {
            WalkOrder::Dfs => self.entries.pop_back(),
            WalkOrder::Bfs => self.entries.pop_front(),
        }
    }

    /// Register the adjacency of `source` (or the seed set when `source` is
    /// `None`). Fresh nodes are discovered and queued; already-seen nodes are
    /// classified by their current color.
    fn extend<V: NodeVisitor<N>>(
        &mut self,
        targets: Vec<N>,
        visitor: &mut V,
        distance: u32,
        source: Option<&N>,
    ) {
        if self.order == WalkOrder::Dfs {
            self.push_finish_marker(source, distance);
        }
        for target in targets {
            match self.colors.get(&target).copied() {
                None => {
                    visitor.discover_node(&target, distance);
                    self.colors.insert(target.clone(), NodeColor::White);
                    self.entries.push_back(Entry::Visit {
                        node: target,
                        distance,
                    });
                }
                Some(NodeColor::White) => {
                    trace!(to = ?target, "tree edge");
                    // An already-queued but unexamined target; under BFS this
                    // also covers what a textbook would call a cross edge.
                    if let Some(source) = source {
                        visitor.tree_edge(source, &target);
                    }
                }
                Some(NodeColor::Gray) => {
                    trace!(to = ?target, "back edge");
                    if let Some(source) = source {
                        visitor.back_edge(source, &target);
                    }
                }
                Some(NodeColor::Black) => {
                    trace!(to = ?target, "forward or cross edge");
                    if let Some(source) = source {
                        visitor.fwd_or_cross_edge(source, &target);
                    }
                }
            }
        }
        if self.order == WalkOrder::Bfs {
            self.push_finish_marker(source, distance);
        }
    }

    fn push_finish_marker(&mut self, source: Option<&N>, distance: u32) {
        if let Some(source) = source {
            self.entries.push_back(Entry::Finish {
                node: source.clone(),
                distance: distance - 1,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

/// Walk a graph from `start` nodes, reporting discovery, examination, finish
/// and edge classification to `visitor`. Distances are hop counts from the
/// nearest start node along the discovery edge.
///
/// Every reachable node transitions White -> Gray -> Black exactly once. A
/// frontier entry whose node is no longer White when popped (possible in
/// malformed or duplicate-edge graphs) is logged and skipped rather than
/// re-processed.
pub fn walk_graph<N, V>(
    start: impl IntoIterator<Item = N>,
    visitor: &mut V,
    order: WalkOrder,
    direction: WalkDirection,
) where
    N: Clone + Eq + Hash + fmt::Debug,
    V: NodeVisitor<N>,
{
    let mut frontier = Frontier::new(order);
    frontier.extend(start.into_iter().collect(), visitor, 0, None);

    while let Some(entry) = frontier.pop() {
        match entry {
            Entry::Finish { node, distance } => {
                frontier.colors.insert(node.clone(), NodeColor::Black);
                visitor.finish_node(&node, distance);
            }
            Entry::Visit { node, distance } => {
                if frontier.colors.get(&node) != Some(&NodeColor::White) {
                    debug!(node = ?node, "node is not white, skipping re-visit");
                    continue;
                }
                frontier.colors.insert(node.clone(), NodeColor::Gray);
                visitor.examine_node(&node, distance);
                let adjacent = visitor.get_adjacent(&node, direction, distance);
                frontier.extend(adjacent, visitor, distance + 1, Some(&node));
            }
        }
    }
}
