//! The quotient graph the ordering optimizers run on.
//!
//! Maximal chains of degree-2 nodes whose line sets agree are collapsed
//! into single edges, so a permutation choice covers the whole corridor at
//! once. Every collapsed edge remembers the underlying edge trip geoms it
//! stands for, so a chosen ordering can be written back hierarchically.
//!
//! ```svgbob
//!  line graph:   A o---o---o---o B      opt graph:   A o=========o B
//!                   e1  e2  e3                           {e1,e2,e3}
//! ```

use crate::geometry::Point;
use crate::graph::{EdgeId, LineDir, LineGraph, LineId, NodeId};
use derive_more::Display;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct OptNodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct OptEdgeId(pub(crate) usize);

/// One line on an opt edge. `relatives` lists the original lines this
/// occurrence stands for after merging; it always contains the line
/// itself.
#[derive(Debug, Clone)]
pub struct OptLineOcc {
    pub line: LineId,
    pub dir: LineDir,
    pub relatives: Vec<LineId>,
}

/// Reference to one underlying edge trip geom of a collapsed chain.
#[derive(Debug, Clone, Copy)]
pub struct EtgRef {
    pub edge: EdgeId,
    pub geom: usize,
    /// Layer index inside the hierarchical ordering.
    pub order: usize,
    /// `true` if the underlying edge's `from -> to` agrees with the opt
    /// edge's canonical direction.
    pub dir: bool,
    /// Subdivision points suppressed from rewriting.
    pub was_cut: bool,
}

#[derive(Debug, Clone)]
pub struct OptEdge {
    pub from: OptNodeId,
    pub to: OptNodeId,
    pub lines: Vec<OptLineOcc>,
    pub etgs: Vec<EtgRef>,
}

impl OptEdge {
    pub fn cardinality(&self) -> usize {
        self.lines.len()
    }

    pub fn other(&self, n: OptNodeId) -> OptNodeId {
        if n == self.to {
            self.from
        } else {
            self.to
        }
    }

    /// The underlying line-graph edge meeting the given endpoint.
    pub fn lg_edge_at(&self, n: OptNodeId) -> EdgeId {
        let etg = if n == self.from {
            self.etgs.first()
        } else {
            self.etgs.last()
        };
        match etg {
            Some(r) => r.edge,
            None => panic!("[BUG] opt edge without underlying geoms"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptNode {
    /// The line-graph node this one stands for.
    pub node: NodeId,
    pub pos: Point,
    pub(crate) adj: Vec<OptEdgeId>,
}

/// Quotient of a [`LineGraph`]; immutable once built. The line graph
/// remains the source of truth for geometry and connection witnesses.
#[derive(Debug)]
pub struct OptGraph<'a> {
    lg: &'a LineGraph,
    nodes: Vec<OptNode>,
    edges: Vec<OptEdge>,
}

impl<'a> OptGraph<'a> {
    /// Builds the quotient. With `collapse` unset every line-graph edge
    /// becomes its own opt edge (used when the degree-2 heuristic is
    /// disabled).
    pub fn build(lg: &'a LineGraph, collapse: bool) -> Self {
        let mut og = Self {
            lg,
            nodes: Vec::new(),
            edges: Vec::new(),
        };

        let mut node_map: HashMap<NodeId, OptNodeId> = HashMap::new();
        let mut keep: Vec<NodeId> = lg
            .node_ids()
            .filter(|&n| !collapse || !Self::interior(lg, n))
            .collect();
        keep.sort();

        for n in &keep {
            let id = OptNodeId(og.nodes.len());
            og.nodes.push(OptNode {
                node: *n,
                pos: lg.node(*n).pos(),
                adj: Vec::new(),
            });
            node_map.insert(*n, id);
        }

        // walk chains out of every kept node; each line-graph edge is
        // consumed exactly once
        let mut consumed: HashMap<EdgeId, bool> = HashMap::new();
        let keep_ids: Vec<OptNodeId> = (0..og.nodes.len()).map(OptNodeId).collect();
        for u in keep_ids {
            let start = og.nodes[u.0].node;
            for e in lg.incident_edges(start) {
                if consumed.contains_key(&e) {
                    continue;
                }
                og.walk_chain(u, start, e, &mut node_map, &mut consumed);
            }
        }

        // a component of only interior nodes is a pure cycle; promote its
        // smallest node and walk the cycle from there
        loop {
            let mut leftover: Vec<EdgeId> = lg
                .edge_ids()
                .filter(|e| !consumed.contains_key(e))
                .collect();
            leftover.sort();
            let Some(&e) = leftover.first() else { break };

            let (from, _) = lg.edge_endpoints(e);
            let id = match node_map.get(&from) {
                Some(&id) => id,
                None => {
                    let id = OptNodeId(og.nodes.len());
                    og.nodes.push(OptNode {
                        node: from,
                        pos: lg.node(from).pos(),
                        adj: Vec::new(),
                    });
                    node_map.insert(from, id);
                    id
                }
            };
            og.walk_chain(id, from, e, &mut node_map, &mut consumed);
        }

        og
    }

    /// A node that vanishes in the quotient: degree 2, no stop, line sets
    /// agreeing across it.
    fn interior(lg: &LineGraph, n: NodeId) -> bool {
        !lg.node(n).is_stop() && lg.deg2_sets_agree(n)
    }

    fn walk_chain(
        &mut self,
        u: OptNodeId,
        start: NodeId,
        first: EdgeId,
        node_map: &mut HashMap<NodeId, OptNodeId>,
        consumed: &mut HashMap<EdgeId, bool>,
    ) {
        let lg = self.lg;
        let mut etgs: Vec<EtgRef> = Vec::new();
        let mut cur_node = start;
        let mut cur_edge = first;

        loop {
            consumed.insert(cur_edge, true);

            let (from, _) = lg.edge_endpoints(cur_edge);
            let travels_canonically = from == cur_node;
            for (i, _) in lg.edge(cur_edge).geoms().iter().enumerate() {
                etgs.push(EtgRef {
                    edge: cur_edge,
                    geom: i,
                    order: i,
                    dir: travels_canonically,
                    was_cut: false,
                });
            }

            let next_node = lg.other_node(cur_edge, cur_node);
            if node_map.contains_key(&next_node) {
                let v = node_map[&next_node];
                let lines = self.chain_lines(first, start);
                let id = OptEdgeId(self.edges.len());
                self.edges.push(OptEdge {
                    from: u,
                    to: v,
                    lines,
                    etgs,
                });
                self.nodes[u.0].adj.push(id);
                self.nodes[v.0].adj.push(id);
                return;
            }

            let next_edge = lg
                .incident_edges(next_node)
                .into_iter()
                .find(|&e| e != cur_edge);
            match next_edge {
                Some(e) => {
                    cur_node = next_node;
                    cur_edge = e;
                }
                None => panic!("[BUG] chain interrupted at node {}", next_node),
            }
        }
    }

    /// Line occurrences of a chain, read off its first edge and oriented
    /// along the chain's travel direction.
    fn chain_lines(&self, first: EdgeId, start: NodeId) -> Vec<OptLineOcc> {
        let lg = self.lg;
        let (from, _) = lg.edge_endpoints(first);
        let forward_travel = from == start;

        let mut out: Vec<OptLineOcc> = Vec::new();
        for g in lg.edge(first).geoms() {
            for occ in g.lines() {
                let dir = match (occ.dir, forward_travel) {
                    (LineDir::Undirected, _) => LineDir::Undirected,
                    (LineDir::Forward, true) | (LineDir::Backward, false) => LineDir::Forward,
                    (LineDir::Forward, false) | (LineDir::Backward, true) => LineDir::Backward,
                };
                if !out.iter().any(|o| o.line == occ.line && o.dir == dir) {
                    out.push(OptLineOcc {
                        line: occ.line,
                        dir,
                        relatives: vec![occ.line],
                    });
                }
            }
        }
        out
    }

    pub fn line_graph(&self) -> &LineGraph {
        self.lg
    }

    pub fn node(&self, id: OptNodeId) -> &OptNode {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: OptEdgeId) -> &OptEdge {
        &self.edges[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl ExactSizeIterator<Item = OptNodeId> {
        (0..self.nodes.len()).map(OptNodeId)
    }

    pub fn edge_ids(&self) -> impl ExactSizeIterator<Item = OptEdgeId> {
        (0..self.edges.len()).map(OptEdgeId)
    }

    /// Incident opt edges, ascending, without the duplicate a self-loop
    /// would contribute.
    pub fn incident(&self, n: OptNodeId) -> Vec<OptEdgeId> {
        let mut adj = self.nodes[n.0].adj.clone();
        adj.sort();
        adj.dedup();
        adj
    }

    /// Weakly-connected components, each sorted, in deterministic order.
    pub fn components(&self) -> Vec<Vec<OptNodeId>> {
        let mut seen = vec![false; self.nodes.len()];
        let mut comps = Vec::new();

        for start in self.node_ids() {
            if seen[start.0] {
                continue;
            }

            let mut comp = Vec::new();
            let mut stack = vec![start];
            seen[start.0] = true;
            while let Some(n) = stack.pop() {
                comp.push(n);
                for e in self.incident(n) {
                    let m = self.edge(e).other(n);
                    if !seen[m.0] {
                        seen[m.0] = true;
                        stack.push(m);
                    }
                }
            }

            comp.sort();
            comps.push(comp);
        }

        comps
    }
}
