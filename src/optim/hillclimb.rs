//! Strict-improvement local search.
//!
//! Moves are single-edge transpositions: swap two slots in one edge's
//! permutation. A change on edge `e` only affects the scores of `e`'s two
//! endpoints, so a move is evaluated from those node scores alone.
//! Terminates when a full sweep over all edges yields no improvement, so
//! the sequence of accepted scores is non-increasing by construction.

use super::optgraph::{OptGraph, OptNodeId};
use super::scorer::Scorer;
use super::{
    component_edges, initial_config, write_hierarch, CancelFlag, HierarOrderCfg, OptRunStats,
    Optimizer,
};
use crate::config::Config;
use crate::error::Error;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

pub struct HillClimbOptimizer {
    scorer: Scorer,
    seed: u64,
    cancel: CancelFlag,
}

impl HillClimbOptimizer {
    pub fn new(cfg: &Config, cancel: CancelFlag) -> Self {
        Self {
            scorer: Scorer::new(cfg),
            seed: cfg.seed,
            cancel,
        }
    }

    /// Score of the two nodes a move on `e` can affect.
    fn local_score(
        &self,
        og: &OptGraph,
        e: super::optgraph::OptEdgeId,
        cur: &super::OrderCfg,
    ) -> f64 {
        let edge = og.edge(e);
        let mut s = self.scorer.node_score(og, edge.from, cur);
        if edge.to != edge.from {
            s += self.scorer.node_score(og, edge.to, cur);
        }
        s
    }
}

impl Optimizer for HillClimbOptimizer {
    fn optimize_component(
        &self,
        og: &OptGraph,
        comp: &[OptNodeId],
        hc: &mut HierarOrderCfg,
        depth: usize,
    ) -> Result<OptRunStats, Error> {
        debug!(depth, nodes = comp.len(), "(hillclimb) optimizing component");

        let edges = component_edges(og, comp);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut cur = initial_config(og, comp, true, &mut rng);
        let mut cur_score = self.scorer.score(og, comp, &cur);

        let mut iters: usize = 0;
        let mut cancelled = false;

        loop {
            if self.cancel.stop_requested() {
                cancelled = true;
                break;
            }

            let mut improved = false;
            for &e in &edges {
                let card = cur.perm(e).len();
                if card < 2 {
                    continue;
                }

                for i in 0..card - 1 {
                    for j in i + 1..card {
                        let before = self.local_score(og, e, &cur);
                        cur.perm_mut(e).swap(i, j);
                        let after = self.local_score(og, e, &cur);
                        iters += 1;

                        if after < before {
                            cur_score = cur_score - before + after;
                            improved = true;
                        } else {
                            // not strictly improving; undo
                            cur.perm_mut(e).swap(i, j);
                        }
                    }
                }
            }

            if !improved {
                break;
            }
        }

        debug!(depth, iters, score = cur_score, "local search finished");
        write_hierarch(og, &cur, hc);

        Ok(OptRunStats {
            iterations: iters,
            score: cur_score,
            cancelled,
        })
    }
}
