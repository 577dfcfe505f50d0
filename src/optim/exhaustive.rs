//! Odometer enumeration over all permutation tuples.
//!
//! Edge 0's permutation advances every step; on roll-over the next edge
//! advances and edge 0 resets, like a mileage counter. Enumeration starts
//! from the sorted configuration and visits every tuple exactly once, so
//! the first minimum found is also the lexicographically smallest one.

use super::optgraph::{OptGraph, OptNodeId};
use super::scorer::Scorer;
use super::{
    component_edges, initial_config, next_permutation, write_hierarch, CancelFlag, HierarOrderCfg,
    OptRunStats, Optimizer,
};
use crate::config::Config;
use crate::error::Error;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

pub struct ExhaustiveOptimizer {
    scorer: Scorer,
    seed: u64,
    cancel: CancelFlag,
}

impl ExhaustiveOptimizer {
    pub fn new(cfg: &Config, cancel: CancelFlag) -> Self {
        Self {
            scorer: Scorer::new(cfg),
            seed: cfg.seed,
            cancel,
        }
    }
}

impl Optimizer for ExhaustiveOptimizer {
    fn optimize_component(
        &self,
        og: &OptGraph,
        comp: &[OptNodeId],
        hc: &mut HierarOrderCfg,
        depth: usize,
    ) -> Result<OptRunStats, Error> {
        debug!(
            depth,
            nodes = comp.len(),
            "(exhaustive) optimizing component"
        );

        let edges = component_edges(og, comp);
        let mut rng = StdRng::seed_from_u64(self.seed);

        // sorted start guarantees full enumeration
        let null = initial_config(og, comp, true, &mut rng);
        let mut cur = null.clone();

        let mut best = cur.clone();
        let mut best_score = self.scorer.score(og, comp, &cur);

        let mut iters: usize = 0;
        let mut last: usize = 0;

        loop {
            if best_score == 0.0 {
                debug!(depth, iters, "found optimal score 0 prematurely");
                break;
            }
            if self.cancel.stop_requested() {
                debug!(depth, iters, "cancelled");
                write_hierarch(og, &best, hc);
                return Ok(OptRunStats {
                    iterations: iters,
                    score: best_score,
                    cancelled: true,
                });
            }

            iters += 1;
            if iters - last == 10_000 {
                debug!(depth, iters, "still enumerating");
                last = iters;
            }

            let mut running = false;
            for (i, &e) in edges.iter().enumerate() {
                if next_permutation(cur.perm_mut(e)) {
                    running = true;
                    break;
                } else if i + 1 < edges.len() {
                    // reset and carry into the next edge
                    cur.set(e, null.perm(e).to_vec());
                }
            }
            if !running {
                break;
            }

            let cur_score = self.scorer.score(og, comp, &cur);
            if cur_score < best_score {
                best_score = cur_score;
                best = cur.clone();
            }
        }

        debug!(depth, iters, score = best_score, "enumeration finished");
        write_hierarch(og, &best, hc);

        Ok(OptRunStats {
            iterations: iters,
            score: best_score,
            cancelled: false,
        })
    }
}
