//! The combinatorial graph handed to the octilinearizer: one node per
//! line-graph node, one edge per line-graph edge, annotated with the
//! reference polyline and the final ribbon order. Read-only during
//! drawing.

use crate::geometry::{Point, Polyline, Rect};
use crate::graph::{EdgeId, LineGraph, LineId, NodeId};
use derive_more::Display;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct CombNodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct CombEdgeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct CombNode {
    pub node: NodeId,
    pub pos: Point,
    pub(crate) adj: SmallVec<[CombEdgeId; 8]>,
}

#[derive(Debug, Clone)]
pub struct CombEdge {
    pub from: CombNodeId,
    pub to: CombNodeId,
    pub edge: EdgeId,
    /// Reference geometry, oriented `from -> to`.
    pub geom: Polyline,
    /// Lines in their final ribbon order.
    pub lines: Vec<LineId>,
}

/// Aggregate geometry statistics, used to sanity-check the grid size
/// against the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphMeasures {
    pub max_node_dist: f64,
    pub min_node_dist: f64,
    pub avg_node_dist: f64,
    pub max_edge_length: f64,
    pub min_edge_length: f64,
    pub avg_edge_length: f64,
    pub max_deg: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CombGraph {
    nodes: Vec<CombNode>,
    edges: Vec<CombEdge>,
}

impl CombGraph {
    pub fn build(lg: &LineGraph) -> Self {
        let mut cg = CombGraph::default();

        let mut lg_nodes: Vec<NodeId> = lg.node_ids().collect();
        lg_nodes.sort();
        let index = |n: NodeId| -> CombNodeId {
            CombNodeId(lg_nodes.binary_search(&n).unwrap_or_else(|_| {
                panic!("[BUG] node {} vanished during comb graph build", n)
            }))
        };

        for &n in &lg_nodes {
            cg.nodes.push(CombNode {
                node: n,
                pos: lg.node(n).pos(),
                adj: SmallVec::new(),
            });
        }

        let mut lg_edges: Vec<EdgeId> = lg.edge_ids().collect();
        lg_edges.sort();
        for e in lg_edges {
            let (from, to) = lg.edge_endpoints(e);
            let (geom, lines) = match lg.edge(e).geoms().first() {
                Some(etg) => {
                    let mut ordered: Vec<LineId> = Vec::with_capacity(etg.cardinality());
                    if etg.ordering().is_empty() {
                        ordered.extend(etg.lines().iter().map(|o| o.line));
                    } else {
                        ordered.extend(etg.ordering().iter().map(|&i| etg.lines()[i].line));
                    }
                    (etg.geom().clone(), ordered)
                }
                None => (
                    Polyline::straight(lg.node(from).pos(), lg.node(to).pos()),
                    Vec::new(),
                ),
            };

            let id = CombEdgeId(cg.edges.len());
            let (cf, ct) = (index(from), index(to));
            cg.edges.push(CombEdge {
                from: cf,
                to: ct,
                edge: e,
                geom,
                lines,
            });
            cg.nodes[cf.0].adj.push(id);
            cg.nodes[ct.0].adj.push(id);
        }

        cg
    }

    pub fn node(&self, id: CombNodeId) -> &CombNode {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: CombEdgeId) -> &CombEdge {
        &self.edges[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl ExactSizeIterator<Item = CombNodeId> {
        (0..self.nodes.len()).map(CombNodeId)
    }

    pub fn edge_ids(&self) -> impl ExactSizeIterator<Item = CombEdgeId> {
        (0..self.edges.len()).map(CombEdgeId)
    }

    pub fn degree(&self, n: CombNodeId) -> usize {
        self.nodes[n.0].adj.len()
    }

    /// Bounding box of all node positions.
    pub fn bbox(&self) -> Option<Rect> {
        Rect::bounding(self.nodes.iter().map(|n| n.pos))
    }

    pub fn measures(&self) -> GraphMeasures {
        let mut m = GraphMeasures {
            min_node_dist: f64::INFINITY,
            min_edge_length: f64::INFINITY,
            ..Default::default()
        };

        for e in &self.edges {
            let d = self.nodes[e.from.0].pos.distance(&self.nodes[e.to.0].pos);
            let len = e.geom.length();
            m.max_node_dist = m.max_node_dist.max(d);
            m.min_node_dist = m.min_node_dist.min(d);
            m.avg_node_dist += d;
            m.max_edge_length = m.max_edge_length.max(len);
            m.min_edge_length = m.min_edge_length.min(len);
            m.avg_edge_length += len;
        }
        if !self.edges.is_empty() {
            m.avg_node_dist /= self.edges.len() as f64;
            m.avg_edge_length /= self.edges.len() as f64;
        } else {
            m.min_node_dist = 0.0;
            m.min_edge_length = 0.0;
        }

        m.max_deg = self
            .nodes
            .iter()
            .map(|n| n.adj.len())
            .max()
            .unwrap_or(0);
        m
    }
}
