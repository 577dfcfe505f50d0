//! Crossing and splitting scores for a candidate ordering.
//!
//! A pair of lines shared by two edges at a node crosses when its relative
//! order, as seen from the node, differs between the edges. A crossing
//! whose continuation is witnessed in the node's occurring connections
//! weighs `crossing_penalty_same_seg`, any other one
//! `crossing_penalty_diff_seg`.
//!
//! ```svgbob
//!   e1 [L1,L2]  \   / [L2,L1]  e2
//!                \ /
//!                 X      <- one counted crossing
//!                / \
//! ```
//!
//! Scoring is pure: the same graph and ordering always produce the same
//! value.

use super::optgraph::{OptEdgeId, OptGraph, OptNodeId};
use super::OrderCfg;
use crate::config::Config;
use crate::graph::LineId;

#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    w_same: f64,
    w_diff: f64,
    w_split: f64,
    splitting: bool,
}

impl Scorer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            w_same: cfg.crossing_penalty_same_seg,
            w_diff: cfg.crossing_penalty_diff_seg,
            w_split: cfg.splitting_penalty,
            splitting: cfg.splitting_opt,
        }
    }

    /// Total score of a component: crossing plus (if enabled) splitting.
    pub fn score(&self, og: &OptGraph, comp: &[OptNodeId], c: &OrderCfg) -> f64 {
        comp.iter().map(|&n| self.node_score(og, n, c)).sum()
    }

    pub fn crossing_score(&self, og: &OptGraph, comp: &[OptNodeId], c: &OrderCfg) -> f64 {
        comp.iter().map(|&n| self.crossing_at(og, n, c)).sum()
    }

    pub fn splitting_score(&self, og: &OptGraph, comp: &[OptNodeId], c: &OrderCfg) -> f64 {
        comp.iter().map(|&n| self.splitting_at(og, n, c)).sum()
    }

    /// Score contribution of a single node. A permutation change on edge
    /// `e` only moves the scores of `e`'s endpoints, which is what the
    /// local-search optimizers exploit.
    pub fn node_score(&self, og: &OptGraph, n: OptNodeId, c: &OrderCfg) -> f64 {
        let mut s = self.crossing_at(og, n, c);
        if self.splitting {
            s += self.splitting_at(og, n, c);
        }
        s
    }

    fn crossing_at(&self, og: &OptGraph, n: OptNodeId, c: &OrderCfg) -> f64 {
        let edges = og.incident(n);
        let mut score = 0.0;

        for (i, &a) in edges.iter().enumerate() {
            for &b in &edges[i + 1..] {
                if !self.pair_counts_at(og, n, a, b) {
                    continue;
                }

                let pa = c.perm_seen_from(og, a, n);
                let pb = c.perm_seen_from(og, b, n);
                let shared = shared_lines(&pa, &pb);

                for (x, &l1) in shared.iter().enumerate() {
                    for &l2 in &shared[x + 1..] {
                        let ra = pos(&pa, l1) < pos(&pa, l2);
                        let rb = pos(&pb, l1) < pos(&pb, l2);
                        if ra != rb {
                            score += self.pair_weight(og, n, a, b, l1, l2);
                        }
                    }
                }
            }
        }

        score
    }

    /// A pair of parallel edges shares both endpoints; scoring it at both
    /// would count one physical swap twice, so only the smaller endpoint
    /// counts. The ILP translation applies the same rule.
    pub(crate) fn pair_counts_at(
        &self,
        og: &OptGraph,
        n: OptNodeId,
        a: OptEdgeId,
        b: OptEdgeId,
    ) -> bool {
        let (ea, eb) = (og.edge(a), og.edge(b));
        let parallel = (ea.from == eb.from && ea.to == eb.to)
            || (ea.from == eb.to && ea.to == eb.from);
        if parallel && ea.from != ea.to {
            return n == ea.from.min(ea.to);
        }
        true
    }

    /// Weight of one counted crossing: `crossing_penalty_same_seg` when
    /// both lines' continuation is witnessed, else
    /// `crossing_penalty_diff_seg`.
    pub(crate) fn pair_weight(
        &self,
        og: &OptGraph,
        n: OptNodeId,
        a: OptEdgeId,
        b: OptEdgeId,
        l1: LineId,
        l2: LineId,
    ) -> f64 {
        let lg = og.line_graph();
        let node = og.node(n).node;
        let lg_a = og.edge(a).lg_edge_at(n);
        let lg_b = og.edge(b).lg_edge_at(n);

        let legal = lg.is_conn_occuring(node, l1, lg_a, lg_b)
            && lg.is_conn_occuring(node, l2, lg_a, lg_b);
        if legal {
            self.w_same
        } else {
            self.w_diff
        }
    }

    fn splitting_at(&self, og: &OptGraph, n: OptNodeId, c: &OrderCfg) -> f64 {
        let edges = og.incident(n);
        let mut score = 0.0;

        // ordered pairs: adjacency on the incoming edge, separation on
        // the outgoing one
        for &a in &edges {
            for &b in &edges {
                if a == b {
                    continue;
                }

                let pa = c.perm_seen_from(og, a, n);
                let pb = c.perm_seen_from(og, b, n);
                let shared = shared_lines(&pa, &pb);
                if shared.len() < 3 {
                    continue;
                }

                for (x, &l1) in shared.iter().enumerate() {
                    for &l2 in &shared[x + 1..] {
                        let da = pos(&pa, l1).abs_diff(pos(&pa, l2));
                        let db = pos(&pb, l1).abs_diff(pos(&pb, l2));
                        if da == 1 && db > 1 {
                            score += self.w_split;
                        }
                    }
                }
            }
        }

        score
    }
}

fn shared_lines(pa: &[LineId], pb: &[LineId]) -> Vec<LineId> {
    let mut shared: Vec<LineId> = pa.iter().copied().filter(|l| pb.contains(l)).collect();
    shared.sort();
    shared
}

fn pos(perm: &[LineId], l: LineId) -> usize {
    match perm.iter().position(|&x| x == l) {
        Some(p) => p,
        None => panic!("[BUG] line {} not in permutation", l),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WebColor;
    use crate::config::ConfigBuilder;
    use crate::geometry::Point;
    use crate::graph::{LineDir, LineGraph};
    use crate::optim::component_edges;

    /// Two nodes joined by two parallel edges, both carrying {L1, L2}.
    fn parallel_graph() -> (LineGraph, LineId, LineId) {
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", WebColor::default());
        let l2 = g.add_line("u2", "U2", WebColor::default());
        let a = g.add_node(Point::zero());
        let b = g.add_node(Point::new(100.0, 0.0));
        for _ in 0..2 {
            let e = g.add_edge(a, b).unwrap();
            g.add_line_on_edge(e, l1, LineDir::Undirected).unwrap();
            g.add_line_on_edge(e, l2, LineDir::Undirected).unwrap();
        }
        (g, l1, l2)
    }

    fn unit_weights() -> Scorer {
        let cfg = ConfigBuilder::default()
            .crossing_penalty_same_seg(1.0)
            .crossing_penalty_diff_seg(1.0)
            .build()
            .unwrap();
        Scorer::new(&cfg)
    }

    #[test]
    fn single_x_crossing_scores_one() {
        let (g, l1, l2) = parallel_graph();
        let og = OptGraph::build(&g, true);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let edges = component_edges(&og, &comp);
        assert_eq!(edges.len(), 2);

        let mut c = OrderCfg::new(og.edge_count());
        c.set(edges[0], vec![l1, l2]);
        c.set(edges[1], vec![l2, l1]);

        assert_eq!(unit_weights().crossing_score(&og, &comp, &c), 1.0);
    }

    #[test]
    fn aligned_orderings_score_zero() {
        let (g, l1, l2) = parallel_graph();
        let og = OptGraph::build(&g, true);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let edges = component_edges(&og, &comp);

        let mut c = OrderCfg::new(og.edge_count());
        c.set(edges[0], vec![l1, l2]);
        c.set(edges[1], vec![l1, l2]);

        assert_eq!(unit_weights().crossing_score(&og, &comp, &c), 0.0);
    }

    #[test]
    fn witnessed_continuation_uses_same_seg_weight() {
        let (mut g, l1, l2) = parallel_graph();
        let edges: Vec<_> = g.edge_ids().collect();
        for l in [l1, l2] {
            g.conn_occurs(l, edges[0], edges[1]);
        }

        let og = OptGraph::build(&g, true);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let oedges = component_edges(&og, &comp);

        let mut c = OrderCfg::new(og.edge_count());
        c.set(oedges[0], vec![l1, l2]);
        c.set(oedges[1], vec![l2, l1]);

        let cfg = ConfigBuilder::default()
            .crossing_penalty_same_seg(0.5)
            .crossing_penalty_diff_seg(3.0)
            .build()
            .unwrap();
        let scorer = Scorer::new(&cfg);

        // the witness is registered at the shared endpoint, which is
        // exactly where the parallel pair is scored
        assert_eq!(scorer.crossing_score(&og, &comp, &c), 0.5);
    }

    #[test]
    fn splitting_detects_separation() {
        // one node, two edges sharing three lines
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", WebColor::default());
        let l2 = g.add_line("u2", "U2", WebColor::default());
        let l3 = g.add_line("u3", "U3", WebColor::default());
        let a = g.add_node(Point::zero());
        let n = g.add_node(Point::new(100.0, 0.0));
        let b = g.add_node(Point::new(200.0, 0.0));
        let e1 = g.add_edge(a, n).unwrap();
        let e2 = g.add_edge(n, b).unwrap();
        for e in [e1, e2] {
            for l in [l1, l2, l3] {
                g.add_line_on_edge(e, l, LineDir::Undirected).unwrap();
            }
        }
        let og = OptGraph::build(&g, false);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let oedges = component_edges(&og, &comp);

        let cfg = ConfigBuilder::default()
            .splitting_opt(true)
            .splitting_penalty(1.0)
            .crossing_penalty_same_seg(0.0)
            .crossing_penalty_diff_seg(0.0)
            .build()
            .unwrap();
        let scorer = Scorer::new(&cfg);

        // aligned: no pair separated
        let mut c = OrderCfg::new(og.edge_count());
        c.set(oedges[0], vec![l1, l2, l3]);
        c.set(oedges[1], vec![l1, l2, l3]);
        assert_eq!(scorer.splitting_score(&og, &comp, &c), 0.0);

        // l2 moved to the outside on the second edge separates (l1, l2)
        // and (l2, l3) depending on viewing direction
        let mut c = OrderCfg::new(og.edge_count());
        c.set(oedges[0], vec![l1, l2, l3]);
        c.set(oedges[1], vec![l2, l1, l3]);
        assert!(scorer.splitting_score(&og, &comp, &c) > 0.0);
    }

    #[test]
    fn scorer_is_deterministic() {
        let (g, l1, l2) = parallel_graph();
        let og = OptGraph::build(&g, true);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let edges = component_edges(&og, &comp);

        let mut c = OrderCfg::new(og.edge_count());
        c.set(edges[0], vec![l1, l2]);
        c.set(edges[1], vec![l2, l1]);

        let scorer = unit_weights();
        let first = scorer.score(&og, &comp, &c);
        for _ in 0..10 {
            assert_eq!(scorer.score(&og, &comp, &c), first);
        }
    }
}
