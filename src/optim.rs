//! Line-ordering optimization.
//!
//! Every optimizer answers the same question: given a component of the
//! quotient graph, which permutation of the lines on each edge minimizes
//! the total crossing (and optionally splitting) score? The variants trade
//! optimality for running time:
//!
//! - [`exhaustive::ExhaustiveOptimizer`] enumerates every permutation
//!   tuple and is provably optimal,
//! - [`hillclimb::HillClimbOptimizer`] accepts strictly improving
//!   single-edge transpositions,
//! - [`annealing::SimulatedAnnealingOptimizer`] additionally accepts
//!   worsening moves under a geometric cooling schedule,
//! - [`ilp::IlpOptimizer`] translates to an integer linear program,
//! - [`NullOptimizer`] writes the sorted initial configuration unchanged.
//!
//! Components are independent work units: each writes a disjoint slice of
//! the shared hierarchical ordering, so results join trivially.

pub mod annealing;
pub mod exhaustive;
pub mod hillclimb;
pub mod ilp;
pub mod optgraph;
pub mod scorer;

use crate::config::{Config, OptimMethod};
use crate::error::Error;
use crate::graph::{EdgeId, LineGraph, LineId};
use optgraph::{OptEdgeId, OptGraph, OptNodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use scorer::Scorer;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cooperative stop signal, polled once per outer optimizer iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-edge line permutations, indexed by opt edge id. Edges outside the
/// component under optimization stay empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCfg {
    perms: Vec<Vec<LineId>>,
}

impl OrderCfg {
    pub fn new(edge_count: usize) -> Self {
        Self {
            perms: vec![Vec::new(); edge_count],
        }
    }

    pub fn perm(&self, e: OptEdgeId) -> &[LineId] {
        &self.perms[e.0]
    }

    pub fn perm_mut(&mut self, e: OptEdgeId) -> &mut Vec<LineId> {
        &mut self.perms[e.0]
    }

    pub fn set(&mut self, e: OptEdgeId, perm: Vec<LineId>) {
        self.perms[e.0] = perm;
    }

    /// The permutation as laid out when standing at `n` and looking into
    /// the edge. Stored permutations look from the canonical `from`
    /// endpoint; from the other side the layout mirrors.
    pub fn perm_seen_from(&self, og: &OptGraph, e: OptEdgeId, n: OptNodeId) -> Vec<LineId> {
        let perm = &self.perms[e.0];
        if og.edge(e).from == n {
            perm.clone()
        } else {
            perm.iter().rev().copied().collect()
        }
    }
}

/// The concrete ribbon order written back to the underlying edge trip
/// geoms: per `(edge, geom)` and per order layer, a list of line
/// positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarOrderCfg {
    entries: BTreeMap<(EdgeId, usize), Vec<Vec<usize>>>,
}

impl HierarOrderCfg {
    fn layer(&mut self, edge: EdgeId, geom: usize, order: usize) -> &mut Vec<usize> {
        let orders = self.entries.entry((edge, geom)).or_default();
        if orders.len() <= order {
            orders.resize(order + 1, Vec::new());
        }
        &mut orders[order]
    }

    pub fn insert_front(&mut self, edge: EdgeId, geom: usize, order: usize, pos: usize) {
        self.layer(edge, geom, order).insert(0, pos);
    }

    pub fn push_back(&mut self, edge: EdgeId, geom: usize, order: usize, pos: usize) {
        self.layer(edge, geom, order).push(pos);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&(EdgeId, usize), &Vec<Vec<usize>>)> {
        self.entries.iter()
    }

    /// Writes the finalized orderings into the line graph.
    pub fn apply(&self, g: &mut LineGraph) -> Result<(), Error> {
        for (&(edge, geom), orders) in &self.entries {
            let flat: Vec<usize> = orders.iter().flatten().copied().collect();
            g.set_etg_ordering(edge, geom, flat)?;
        }
        Ok(())
    }
}

/// Outcome of one optimizer run. On cancellation the best configuration
/// found so far is written and `cancelled` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptRunStats {
    pub iterations: usize,
    pub score: f64,
    pub cancelled: bool,
}

impl OptRunStats {
    pub(crate) fn absorb(&mut self, other: OptRunStats) {
        self.iterations += other.iterations;
        self.score += other.score;
        self.cancelled |= other.cancelled;
    }
}

/// Common contract of the optimizer family.
pub trait Optimizer {
    fn optimize_component(
        &self,
        og: &OptGraph,
        comp: &[OptNodeId],
        hc: &mut HierarOrderCfg,
        depth: usize,
    ) -> Result<OptRunStats, Error>;

    /// Runs every weakly-connected component and joins the results.
    fn optimize(&self, og: &OptGraph, hc: &mut HierarOrderCfg) -> Result<OptRunStats, Error> {
        let mut total = OptRunStats::default();
        for comp in og.components() {
            total.absorb(self.optimize_component(og, &comp, hc, 0)?);
            if total.cancelled {
                break;
            }
        }
        Ok(total)
    }
}

/// Edges of a component, each exactly once, ascending.
pub(crate) fn component_edges(og: &OptGraph, comp: &[OptNodeId]) -> Vec<OptEdgeId> {
    let mut edges: Vec<OptEdgeId> = comp.iter().flat_map(|&n| og.incident(n)).collect();
    edges.sort();
    edges.dedup();
    edges
}

/// Starting permutations for a component: sorted for deterministic
/// exhaustive enumeration, otherwise a uniform shuffle from the seeded
/// generator.
pub(crate) fn initial_config(
    og: &OptGraph,
    comp: &[OptNodeId],
    sorted: bool,
    rng: &mut StdRng,
) -> OrderCfg {
    let mut cfg = OrderCfg::new(og.edge_count());
    for e in component_edges(og, comp) {
        let mut perm: Vec<LineId> = og.edge(e).lines.iter().map(|o| o.line).collect();
        if sorted {
            perm.sort();
        } else {
            perm.shuffle(rng);
        }
        cfg.set(e, perm);
    }
    cfg
}

/// Advances `arr` to its lexicographic successor; returns `false` and
/// leaves the slice sorted when it was the last permutation.
pub(crate) fn next_permutation<T: Ord>(arr: &mut [T]) -> bool {
    if arr.len() < 2 {
        return false;
    }

    let mut i = arr.len() - 1;
    while i > 0 && arr[i - 1] >= arr[i] {
        i -= 1;
    }
    if i == 0 {
        arr.reverse();
        return false;
    }

    let mut j = arr.len() - 1;
    while arr[j] <= arr[i - 1] {
        j -= 1;
    }
    arr.swap(i - 1, j);
    arr[i..].reverse();
    true
}

/// Resolves a chosen configuration into per-geom position lists. Each
/// line is expanded into its relatives; geoms whose travel direction
/// disagrees with the first geom's are appended in reverse.
pub(crate) fn write_hierarch(og: &OptGraph, cfg: &OrderCfg, hc: &mut HierarOrderCfg) {
    let lg = og.line_graph();

    for e in og.edge_ids() {
        let edge = og.edge(e);
        if cfg.perm(e).is_empty() && !edge.lines.is_empty() {
            continue;
        }
        let Some(first) = edge.etgs.first() else {
            continue;
        };

        for etgp in &edge.etgs {
            if etgp.was_cut {
                continue;
            }

            for &line in cfg.perm(e) {
                let occ = edge
                    .lines
                    .iter()
                    .find(|o| o.line == line)
                    .unwrap_or_else(|| panic!("[BUG] line {} missing on opt edge", line));

                for &rel in &occ.relatives {
                    let pos = lg.edge(etgp.edge).geoms()[etgp.geom]
                        .line_pos(rel)
                        .unwrap_or_else(|| {
                            panic!("[BUG] relative {} missing on edge {}", rel, etgp.edge)
                        });

                    if etgp.dir == first.dir {
                        hc.insert_front(etgp.edge, etgp.geom, etgp.order, pos);
                    } else {
                        hc.push_back(etgp.edge, etgp.geom, etgp.order, pos);
                    }
                }
            }
        }
    }
}

/// Writes the sorted initial configuration unchanged; the baseline
/// optimizer.
#[derive(Debug)]
pub struct NullOptimizer {
    scorer: Scorer,
}

impl NullOptimizer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            scorer: Scorer::new(cfg),
        }
    }
}

impl Optimizer for NullOptimizer {
    fn optimize_component(
        &self,
        og: &OptGraph,
        comp: &[OptNodeId],
        hc: &mut HierarOrderCfg,
        _depth: usize,
    ) -> Result<OptRunStats, Error> {
        let mut rng = StdRng::seed_from_u64(0);
        let cfg = initial_config(og, comp, true, &mut rng);
        let score = self.scorer.score(og, comp, &cfg);
        write_hierarch(og, &cfg, hc);

        Ok(OptRunStats {
            iterations: 0,
            score,
            cancelled: false,
        })
    }
}

fn optimizer_for(cfg: &Config, cancel: CancelFlag) -> Box<dyn Optimizer> {
    match cfg.optim {
        OptimMethod::Exhaustive => Box::new(exhaustive::ExhaustiveOptimizer::new(cfg, cancel)),
        OptimMethod::Hillclimb => Box::new(hillclimb::HillClimbOptimizer::new(cfg, cancel)),
        OptimMethod::Annealing => {
            Box::new(annealing::SimulatedAnnealingOptimizer::new(cfg, cancel))
        }
        OptimMethod::Ilp => Box::new(ilp::IlpOptimizer::new(cfg, cancel)),
        OptimMethod::Null => Box::new(NullOptimizer::new(cfg)),
    }
}

/// Runs the configured optimizer over the whole graph and writes the
/// resulting ribbon orderings back into it.
pub fn optimize_lines(g: &mut LineGraph, cfg: &Config) -> Result<OptRunStats, Error> {
    optimize_lines_with(g, cfg, CancelFlag::default())
}

pub fn optimize_lines_with(
    g: &mut LineGraph,
    cfg: &Config,
    cancel: CancelFlag,
) -> Result<OptRunStats, Error> {
    g.check_consistency()?;

    let (hc, stats) = {
        let og = OptGraph::build(g, cfg.deg2_heur);
        debug!(
            nodes = og.node_count(),
            edges = og.edge_count(),
            optim = %cfg.optim,
            "optimizing line orderings"
        );

        let optimizer = optimizer_for(cfg, cancel.clone());
        let mut hc = HierarOrderCfg::default();
        let stats = match optimizer.optimize(&og, &mut hc) {
            Err(Error::SolverBackend { backend, reason }) => {
                warn!(
                    "ILP backend `{}` failed ({}), falling back to hill climbing",
                    backend, reason
                );
                hc = HierarOrderCfg::default();
                hillclimb::HillClimbOptimizer::new(cfg, cancel).optimize(&og, &mut hc)?
            }
            r => r?,
        };
        (hc, stats)
    };

    hc.apply(g)?;
    debug!(score = stats.score, iterations = stats.iterations, "ordering written");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WebColor;
    use crate::geometry::Point;
    use crate::graph::LineDir;

    #[test]
    fn next_permutation_cycles_lexicographically() {
        let mut v = vec![1, 2, 3];
        let mut seen = vec![v.clone()];
        while next_permutation(&mut v) {
            seen.push(v.clone());
        }

        assert_eq!(seen.len(), 6);
        assert_eq!(seen.first().unwrap(), &vec![1, 2, 3]);
        assert_eq!(seen.last().unwrap(), &vec![3, 2, 1]);
        // rolled over back to sorted
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn hierar_cfg_round_trips_through_graph() {
        // A - M - B chain carrying two lines; the null optimizer's output
        // must be a permutation of every underlying geom's line set
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", WebColor::default());
        let l2 = g.add_line("u2", "U2", WebColor::default());
        let a = g.add_node(Point::zero());
        let m = g.add_node(Point::new(100.0, 0.0));
        let b = g.add_node(Point::new(200.0, 0.0));
        let e1 = g.add_edge(a, m).unwrap();
        let e2 = g.add_edge(m, b).unwrap();
        for e in [e1, e2] {
            g.add_line_on_edge(e, l1, LineDir::Undirected).unwrap();
            g.add_line_on_edge(e, l2, LineDir::Undirected).unwrap();
        }

        let cfg = crate::config::ConfigBuilder::default()
            .optim(OptimMethod::Null)
            .build()
            .unwrap();
        optimize_lines(&mut g, &cfg).unwrap();

        for e in [e1, e2] {
            let etg = &g.edge(e).geoms()[0];
            let mut ordering = etg.ordering().to_vec();
            ordering.sort();
            assert_eq!(ordering, vec![0, 1]);
        }
    }

    #[test]
    fn serialized_hierar_cfg_preserves_equality() {
        let mut hc = HierarOrderCfg::default();
        let mut g = LineGraph::new(20.0, 10.0);
        let a = g.add_node(Point::zero());
        let b = g.add_node(Point::new(1.0, 0.0));
        let e = g.add_edge(a, b).unwrap();

        hc.push_back(e, 0, 0, 1);
        hc.push_back(e, 0, 0, 0);
        hc.insert_front(e, 0, 1, 2);

        let copied: Vec<_> = hc.iter().map(|(k, v)| (*k, v.clone())).collect();
        let mut rebuilt = HierarOrderCfg::default();
        for (k, orders) in copied {
            for (order, positions) in orders.iter().enumerate() {
                for &p in positions {
                    rebuilt.push_back(k.0, k.1, order, p);
                }
            }
        }

        assert_eq!(hc, rebuilt);
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::default();
        let clone = flag.clone();
        assert!(!clone.stop_requested());
        flag.request_stop();
        assert!(clone.stop_requested());
    }
}
