//! Simulated annealing over the hill-climb move set.
//!
//! Worsening transpositions are accepted with probability
//! `exp(-delta / T)`; the temperature follows the geometric schedule
//! `T <- alpha * T`. The run stops when the temperature falls below the
//! configured floor or the acceptance rate collapses. The best
//! configuration ever seen is written back, not the final one.

use super::optgraph::{OptEdgeId, OptGraph, OptNodeId};
use super::scorer::Scorer;
use super::{
    component_edges, initial_config, write_hierarch, CancelFlag, HierarOrderCfg, OptRunStats,
    Optimizer, OrderCfg,
};
use crate::config::Config;
use crate::error::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// The run ends early when the acceptance rate over a full measurement
/// window falls below this fraction.
const MIN_ACCEPT_RATE: f64 = 0.01;

/// Proposals per acceptance-rate measurement; small components need
/// several sweeps before the rate means anything.
const ACCEPT_WINDOW: usize = 100;

pub struct SimulatedAnnealingOptimizer {
    scorer: Scorer,
    start: f64,
    alpha: f64,
    floor: f64,
    seed: u64,
    cancel: CancelFlag,
}

impl SimulatedAnnealingOptimizer {
    pub fn new(cfg: &Config, cancel: CancelFlag) -> Self {
        Self {
            scorer: Scorer::new(cfg),
            start: cfg.annealing_start,
            alpha: cfg.annealing_alpha,
            floor: cfg.annealing_t_floor,
            seed: cfg.seed,
            cancel,
        }
    }

    fn local_score(&self, og: &OptGraph, e: OptEdgeId, cur: &OrderCfg) -> f64 {
        let edge = og.edge(e);
        let mut s = self.scorer.node_score(og, edge.from, cur);
        if edge.to != edge.from {
            s += self.scorer.node_score(og, edge.to, cur);
        }
        s
    }
}

impl Optimizer for SimulatedAnnealingOptimizer {
    fn optimize_component(
        &self,
        og: &OptGraph,
        comp: &[OptNodeId],
        hc: &mut HierarOrderCfg,
        depth: usize,
    ) -> Result<OptRunStats, Error> {
        debug!(depth, nodes = comp.len(), "(annealing) optimizing component");

        let edges = component_edges(og, comp);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut cur = initial_config(og, comp, false, &mut rng);
        let mut cur_score = self.scorer.score(og, comp, &cur);
        let mut best = cur.clone();
        let mut best_score = cur_score;

        let mut temp = self.start;
        let mut iters: usize = 0;
        let mut cancelled = false;
        let mut proposals: usize = 0;
        let mut accepted: usize = 0;

        while temp > self.floor {
            if self.cancel.stop_requested() {
                cancelled = true;
                break;
            }

            for &e in &edges {
                let card = cur.perm(e).len();
                if card < 2 {
                    continue;
                }

                let i = rng.gen_range(0..card);
                let mut j = rng.gen_range(0..card - 1);
                if j >= i {
                    j += 1;
                }

                let before = self.local_score(og, e, &cur);
                cur.perm_mut(e).swap(i, j);
                let delta = self.local_score(og, e, &cur) - before;
                iters += 1;
                proposals += 1;

                let accept = delta < 0.0 || rng.gen::<f64>() < (-delta / temp).exp();
                if accept {
                    accepted += 1;
                    cur_score += delta;
                    if cur_score < best_score {
                        best_score = cur_score;
                        best = cur.clone();
                    }
                } else {
                    cur.perm_mut(e).swap(i, j);
                }
            }

            if proposals >= ACCEPT_WINDOW {
                if (accepted as f64) / (proposals as f64) < MIN_ACCEPT_RATE {
                    debug!(depth, temp, "acceptance rate collapsed");
                    break;
                }
                proposals = 0;
                accepted = 0;
            }
            temp *= self.alpha;
        }

        debug!(depth, iters, score = best_score, "annealing finished");
        write_hierarch(og, &best, hc);

        Ok(OptRunStats {
            iterations: iters,
            score: best_score,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WebColor;
    use crate::config::ConfigBuilder;
    use crate::geometry::Point;
    use crate::graph::{LineDir, LineGraph};

    fn annealing_cfg(seed: u64) -> Config {
        ConfigBuilder::default()
            .crossing_penalty_same_seg(1.0)
            .crossing_penalty_diff_seg(1.0)
            .annealing_start(5.0)
            .annealing_alpha(0.9)
            .annealing_t_floor(1e-3)
            .seed(seed)
            .build()
            .unwrap()
    }

    fn path_graph() -> LineGraph {
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", WebColor::default());
        let l2 = g.add_line("u2", "U2", WebColor::default());
        let l3 = g.add_line("u3", "U3", WebColor::default());
        let a = g.add_node(Point::zero());
        let x = g.add_node(Point::new(100.0, 0.0));
        let b = g.add_node(Point::new(200.0, 0.0));
        for (u, v) in [(a, x), (x, b)] {
            let e = g.add_edge(u, v).unwrap();
            for l in [l1, l2, l3] {
                g.add_line_on_edge(e, l, LineDir::Undirected).unwrap();
            }
        }
        g
    }

    #[test]
    fn reaches_zero_on_small_component() {
        let g = path_graph();
        let og = OptGraph::build(&g, false);
        let cfg = annealing_cfg(1);

        let mut hc = HierarOrderCfg::default();
        let opt = SimulatedAnnealingOptimizer::new(&cfg, CancelFlag::default());
        let stats = opt.optimize(&og, &mut hc).unwrap();

        assert_eq!(stats.score, 0.0);
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let g = path_graph();
        let og = OptGraph::build(&g, false);
        let cfg = annealing_cfg(99);

        let run = || {
            let mut hc = HierarOrderCfg::default();
            let opt = SimulatedAnnealingOptimizer::new(&cfg, CancelFlag::default());
            let stats = opt.optimize(&og, &mut hc).unwrap();
            (hc, stats.iterations)
        };

        let (hc1, it1) = run();
        let (hc2, it2) = run();

        assert_eq!(hc1, hc2);
        assert_eq!(it1, it2);
    }

    #[test]
    fn different_seeds_still_valid_permutations() {
        let mut g = path_graph();
        let cfg = ConfigBuilder::default()
            .optim(crate::config::OptimMethod::Annealing)
            .seed(7)
            .build()
            .unwrap();

        crate::optim::optimize_lines(&mut g, &cfg).unwrap();

        for e in g.edge_ids().collect::<Vec<_>>() {
            let etg = &g.edge(e).geoms()[0];
            let mut ordering = etg.ordering().to_vec();
            ordering.sort();
            let expect: Vec<usize> = (0..etg.cardinality()).collect();
            assert_eq!(ordering, expect);
        }
    }
}
