//! Integer-linear-programming translation of the ordering problem.
//!
//! For every unordered pair of lines sharing an edge, a binary variable
//! states which one precedes the other (looking from the canonical
//! endpoint). Antisymmetry and transitivity rows force a total order per
//! edge; per node and edge pair, a crossing indicator is linearized from
//! the two order variables and summed in the objective.
//!
//! The back-end is pluggable. The built-in `bb` back-end solves exactly by
//! branch and bound over per-edge permutations; any other name reports
//! `SolverBackend` so the pipeline can fall back. The program can also be
//! written out in CPLEX LP format for external solvers.

use super::optgraph::{OptEdgeId, OptGraph, OptNodeId};
use super::scorer::Scorer;
use super::{
    component_edges, initial_config, next_permutation, write_hierarch, CancelFlag, HierarOrderCfg,
    OptRunStats, Optimizer, OrderCfg,
};
use crate::config::Config;
use crate::error::Error;
use crate::graph::LineId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

#[derive(Debug, Clone)]
pub struct IlpVar {
    pub name: String,
    pub objective: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Eq,
}

#[derive(Debug, Clone)]
pub struct IlpConstraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

/// The order variables of one edge: `x(e, a, b) = 1` iff `a` precedes `b`.
#[derive(Debug, Clone)]
pub struct OrderGroup {
    pub edge: OptEdgeId,
    pub lines: Vec<LineId>,
}

/// One linearized crossing indicator and the group positions it couples.
#[derive(Debug, Clone)]
struct CrossTerm {
    y: VarId,
    weight: f64,
    a_group: usize,
    a_flip: bool,
    b_group: usize,
    b_flip: bool,
    l1: LineId,
    l2: LineId,
}

#[derive(Debug, Default)]
pub struct IlpProblem {
    vars: Vec<IlpVar>,
    constraints: Vec<IlpConstraint>,
    groups: Vec<OrderGroup>,
    x_index: HashMap<(OptEdgeId, LineId, LineId), VarId>,
    cross: Vec<CrossTerm>,
}

impl IlpProblem {
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn groups(&self) -> &[OrderGroup] {
        &self.groups
    }

    fn add_var(&mut self, name: String, objective: f64) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(IlpVar { name, objective });
        id
    }

    fn x(&self, e: OptEdgeId, a: LineId, b: LineId) -> VarId {
        match self.x_index.get(&(e, a, b)) {
            Some(&v) => v,
            None => panic!("[BUG] missing order variable x_{}_{}_{}", e, a, b),
        }
    }

    /// Builds the program for one component, mirroring the scorer's
    /// crossing rules exactly.
    pub fn build(og: &OptGraph, comp: &[OptNodeId], scorer_cfg: &Config) -> Self {
        let mut p = IlpProblem::default();
        let edges = component_edges(og, comp);

        // order variables, antisymmetry and transitivity per edge
        for &e in &edges {
            let mut lines: Vec<LineId> = og.edge(e).lines.iter().map(|o| o.line).collect();
            lines.sort();

            p.groups.push(OrderGroup {
                edge: e,
                lines: lines.clone(),
            });

            for (i, &a) in lines.iter().enumerate() {
                for &b in &lines[i + 1..] {
                    let xab = p.add_var(format!("x_{}_{}_{}", e, a, b), 0.0);
                    let xba = p.add_var(format!("x_{}_{}_{}", e, b, a), 0.0);
                    p.x_index.insert((e, a, b), xab);
                    p.x_index.insert((e, b, a), xba);

                    p.constraints.push(IlpConstraint {
                        name: format!("antisym_{}_{}_{}", e, a, b),
                        terms: vec![(xab, 1.0), (xba, 1.0)],
                        sense: Sense::Eq,
                        rhs: 1.0,
                    });
                }
            }

            for &a in &lines {
                for &b in &lines {
                    for &c in &lines {
                        if a == b || b == c || a == c {
                            continue;
                        }
                        let terms = vec![
                            (p.x(e, a, b), 1.0),
                            (p.x(e, b, c), 1.0),
                            (p.x(e, a, c), -1.0),
                        ];
                        p.constraints.push(IlpConstraint {
                            name: format!("trans_{}_{}_{}_{}", e, a, b, c),
                            terms,
                            sense: Sense::Le,
                            rhs: 1.0,
                        });
                    }
                }
            }
        }

        // crossing oracle
        let scorer = Scorer::new(scorer_cfg);
        let group_of: HashMap<OptEdgeId, usize> = p
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.edge, i))
            .collect();

        for &n in comp {
            let incident = og.incident(n);
            for (i, &a) in incident.iter().enumerate() {
                for &b in &incident[i + 1..] {
                    if !scorer.pair_counts_at(og, n, a, b) {
                        continue;
                    }

                    let la: Vec<LineId> = og.edge(a).lines.iter().map(|o| o.line).collect();
                    let lb: Vec<LineId> = og.edge(b).lines.iter().map(|o| o.line).collect();
                    let mut shared: Vec<LineId> =
                        la.iter().copied().filter(|l| lb.contains(l)).collect();
                    shared.sort();

                    for (x, &l1) in shared.iter().enumerate() {
                        for &l2 in &shared[x + 1..] {
                            let weight = scorer.pair_weight(og, n, a, b, l1, l2);
                            let y =
                                p.add_var(format!("y_{}_{}_{}_{}_{}", n, a, b, l1, l2), weight);

                            let a_flip = og.edge(a).from != n;
                            let b_flip = og.edge(b).from != n;
                            let xa = if a_flip { p.x(a, l2, l1) } else { p.x(a, l1, l2) };
                            let xb = if b_flip { p.x(b, l2, l1) } else { p.x(b, l1, l2) };

                            // y >= xa - xb and y >= xb - xa
                            p.constraints.push(IlpConstraint {
                                name: format!("cross_a_{}_{}_{}_{}_{}", n, a, b, l1, l2),
                                terms: vec![(xa, 1.0), (xb, -1.0), (y, -1.0)],
                                sense: Sense::Le,
                                rhs: 0.0,
                            });
                            p.constraints.push(IlpConstraint {
                                name: format!("cross_b_{}_{}_{}_{}_{}", n, a, b, l1, l2),
                                terms: vec![(xb, 1.0), (xa, -1.0), (y, -1.0)],
                                sense: Sense::Le,
                                rhs: 0.0,
                            });

                            p.cross.push(CrossTerm {
                                y,
                                weight,
                                a_group: group_of[&a],
                                a_flip,
                                b_group: group_of[&b],
                                b_flip,
                                l1,
                                l2,
                            });
                        }
                    }
                }
            }
        }

        p
    }

    /// Writes the program in CPLEX LP format.
    pub fn write_lp(&self, path: &Path) -> Result<(), Error> {
        let mut out = String::new();
        out.push_str("\\ line-ordering ILP\n");
        out.push_str("Minimize\n obj:");
        let mut any = false;
        for v in &self.vars {
            if v.objective != 0.0 {
                let _ = write!(out, " + {} {}", v.objective, v.name);
                any = true;
            }
        }
        if !any {
            out.push_str(" 0");
        }
        out.push('\n');

        out.push_str("Subject To\n");
        for c in &self.constraints {
            let _ = write!(out, " {}:", c.name);
            for (v, coef) in &c.terms {
                let sign = if *coef >= 0.0 { '+' } else { '-' };
                let _ = write!(out, " {} {} {}", sign, coef.abs(), self.vars[v.0].name);
            }
            let sense = match c.sense {
                Sense::Le => "<=",
                Sense::Eq => "=",
            };
            let _ = writeln!(out, " {} {}", sense, c.rhs);
        }

        out.push_str("Binary\n");
        for v in &self.vars {
            let _ = writeln!(out, " {}", v.name);
        }
        out.push_str("End\n");

        std::fs::write(path, out)?;
        Ok(())
    }

    /// Objective value of concrete per-group permutations, summed over the
    /// crossing terms whose groups are both decided.
    fn partial_objective(&self, perms: &[Option<Vec<LineId>>]) -> f64 {
        let mut total = 0.0;
        for t in &self.cross {
            let (Some(pa), Some(pb)) = (&perms[t.a_group], &perms[t.b_group]) else {
                continue;
            };
            if crossing(pa, t.a_flip, pb, t.b_flip, t.l1, t.l2) {
                total += t.weight;
            }
        }
        total
    }
}

fn crossing(pa: &[LineId], a_flip: bool, pb: &[LineId], b_flip: bool, l1: LineId, l2: LineId) -> bool {
    let precedes = |perm: &[LineId], flip: bool| {
        let p1 = perm.iter().position(|&l| l == l1);
        let p2 = perm.iter().position(|&l| l == l2);
        match (p1, p2) {
            (Some(p1), Some(p2)) => (p1 < p2) != flip,
            _ => panic!("[BUG] crossing term over lines missing from the group"),
        }
    };
    precedes(pa, a_flip) != precedes(pb, b_flip)
}

#[derive(Debug, Clone)]
pub struct IlpSolution {
    pub values: Vec<f64>,
    pub objective: f64,
    pub optimal: bool,
}

/// A back-end in the shape of the usual solver bindings: it receives the
/// whole program and returns an assignment.
pub trait IlpBackend {
    fn name(&self) -> &str;

    fn solve(&self, prob: &IlpProblem, time_limit: Option<Duration>)
        -> Result<IlpSolution, Error>;
}

/// Exact branch and bound over per-edge permutations. Enumerating
/// permutations instead of raw 0/1 vectors keeps antisymmetry and
/// transitivity satisfied by construction; the bound is the objective
/// over the crossing terms already decided.
pub struct BranchBoundBackend {
    cancel: CancelFlag,
}

impl BranchBoundBackend {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }

    fn dfs(
        &self,
        prob: &IlpProblem,
        perms: &mut Vec<Option<Vec<LineId>>>,
        group: usize,
        incumbent: &mut Option<(f64, Vec<Vec<LineId>>)>,
        deadline: Option<Instant>,
    ) -> bool {
        if self.cancel.stop_requested() {
            return false;
        }
        if let Some(d) = deadline {
            if Instant::now() > d {
                return false;
            }
        }

        if group == prob.groups.len() {
            let cost = prob.partial_objective(perms);
            let better = match incumbent {
                Some((best, _)) => cost < *best,
                None => true,
            };
            if better {
                let solution: Vec<Vec<LineId>> =
                    perms.iter().map(|p| p.clone().unwrap_or_default()).collect();
                *incumbent = Some((cost, solution));
            }
            return true;
        }

        let mut perm = prob.groups[group].lines.clone();
        perm.sort();

        let mut complete = true;
        loop {
            perms[group] = Some(perm.clone());

            let bound = prob.partial_objective(perms);
            let prune = matches!(incumbent, Some((best, _)) if bound >= *best);
            if !prune && !self.dfs(prob, perms, group + 1, incumbent, deadline) {
                complete = false;
                // unwind quickly once the run is out of time
                break;
            }

            if !next_permutation(&mut perm) {
                break;
            }
        }

        perms[group] = None;
        complete
    }
}

impl IlpBackend for BranchBoundBackend {
    fn name(&self) -> &str {
        "bb"
    }

    fn solve(
        &self,
        prob: &IlpProblem,
        time_limit: Option<Duration>,
    ) -> Result<IlpSolution, Error> {
        let deadline = time_limit.map(|d| Instant::now() + d);
        let mut perms: Vec<Option<Vec<LineId>>> = vec![None; prob.groups.len()];
        let mut incumbent: Option<(f64, Vec<Vec<LineId>>)> = None;

        let complete = self.dfs(prob, &mut perms, 0, &mut incumbent, deadline);

        let Some((objective, solution)) = incumbent else {
            return Err(Error::SolverBackend {
                backend: self.name().to_string(),
                reason: "time limit reached without a feasible solution".to_string(),
            });
        };

        // encode the winning permutations as variable values
        let mut values = vec![0.0; prob.vars.len()];
        for (gi, group) in prob.groups.iter().enumerate() {
            let perm = &solution[gi];
            for (i, &a) in group.lines.iter().enumerate() {
                for &b in &group.lines[i + 1..] {
                    let pa = perm.iter().position(|&l| l == a);
                    let pb = perm.iter().position(|&l| l == b);
                    let a_first = pa < pb;
                    values[prob.x(group.edge, a, b).0] = if a_first { 1.0 } else { 0.0 };
                    values[prob.x(group.edge, b, a).0] = if a_first { 0.0 } else { 1.0 };
                }
            }
        }
        for t in &prob.cross {
            let crossed = crossing(
                &solution[t.a_group],
                t.a_flip,
                &solution[t.b_group],
                t.b_flip,
                t.l1,
                t.l2,
            );
            values[t.y.0] = if crossed { 1.0 } else { 0.0 };
        }

        Ok(IlpSolution {
            values,
            objective,
            optimal: complete,
        })
    }
}

pub struct IlpOptimizer {
    scorer: Scorer,
    scorer_cfg: Config,
    solver: String,
    time_limit: Option<Duration>,
    no_solve: bool,
    lp_path: Option<PathBuf>,
    seed: u64,
    cancel: CancelFlag,
}

impl IlpOptimizer {
    pub fn new(cfg: &Config, cancel: CancelFlag) -> Self {
        if cfg.splitting_opt {
            warn!("splitting term is not part of the ILP translation; ignoring it");
        }
        Self {
            scorer: Scorer::new(cfg),
            scorer_cfg: cfg.clone(),
            solver: cfg.ilp_solver.clone(),
            time_limit: (cfg.ilp_time_limit_sec > 0)
                .then(|| Duration::from_secs(cfg.ilp_time_limit_sec)),
            no_solve: cfg.ilp_no_solve,
            lp_path: cfg.ilp_path.clone(),
            seed: cfg.seed,
            cancel,
        }
    }

    fn backend(&self) -> Result<Box<dyn IlpBackend>, Error> {
        match self.solver.as_str() {
            "bb" => Ok(Box::new(BranchBoundBackend::new(self.cancel.clone()))),
            other => Err(Error::SolverBackend {
                backend: other.to_string(),
                reason: "backend not available in this build".to_string(),
            }),
        }
    }

    /// Reads the per-edge permutation back from the assignment by
    /// topologically sorting each edge's order matrix: a line's position
    /// is fixed by how many lines it precedes.
    fn configuration_from_solution(
        &self,
        prob: &IlpProblem,
        sol: &IlpSolution,
        og: &OptGraph,
    ) -> OrderCfg {
        let mut cfg = OrderCfg::new(og.edge_count());

        for group in prob.groups() {
            let mut keyed: Vec<(usize, LineId)> = group
                .lines
                .iter()
                .map(|&a| {
                    let wins = group
                        .lines
                        .iter()
                        .filter(|&&b| b != a && sol.values[prob.x(group.edge, a, b).0] >= 0.5)
                        .count();
                    (wins, a)
                })
                .collect();
            // most wins first; line id breaks ties deterministically
            keyed.sort_by(|x, y| y.0.cmp(&x.0).then(x.1.cmp(&y.1)));
            cfg.set(group.edge, keyed.into_iter().map(|(_, l)| l).collect());
        }

        cfg
    }
}

impl Optimizer for IlpOptimizer {
    fn optimize_component(
        &self,
        og: &OptGraph,
        comp: &[OptNodeId],
        hc: &mut HierarOrderCfg,
        depth: usize,
    ) -> Result<OptRunStats, Error> {
        let prob = IlpProblem::build(og, comp, &self.scorer_cfg);
        debug!(
            depth,
            vars = prob.var_count(),
            constraints = prob.constraint_count(),
            "(ilp) built program"
        );

        if let Some(path) = &self.lp_path {
            prob.write_lp(path)?;
        }

        if self.no_solve {
            let mut rng = StdRng::seed_from_u64(self.seed);
            let cfg = initial_config(og, comp, true, &mut rng);
            let score = self.scorer.score(og, comp, &cfg);
            write_hierarch(og, &cfg, hc);
            return Ok(OptRunStats {
                iterations: 0,
                score,
                cancelled: false,
            });
        }

        let backend = self.backend()?;
        let sol = backend.solve(&prob, self.time_limit)?;
        debug!(depth, objective = sol.objective, optimal = sol.optimal, "(ilp) solved");

        let cfg = self.configuration_from_solution(&prob, &sol, og);
        let score = self.scorer.score(og, comp, &cfg);
        write_hierarch(og, &cfg, hc);

        Ok(OptRunStats {
            iterations: 0,
            score,
            cancelled: !sol.optimal && self.cancel.stop_requested(),
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

    fn unit_cfg() -> Config {
        ConfigBuilder::default()
            .crossing_penalty_same_seg(1.0)
            .crossing_penalty_diff_seg(1.0)
            .build()
            .unwrap()
    }

    fn parallel_graph() -> LineGraph {
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
        g
    }

    #[test]
    fn formulation_size() {
        let g = parallel_graph();
        let og = OptGraph::build(&g, true);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let prob = IlpProblem::build(&og, &comp, &unit_cfg());

        // two edges with one line pair each: 4 order vars, 1 crossing
        // indicator; 2 antisymmetry rows, 2 linearization rows
        assert_eq!(prob.var_count(), 5);
        assert_eq!(prob.constraint_count(), 4);
        assert_eq!(prob.groups().len(), 2);
    }

    #[test]
    fn builtin_backend_finds_zero() {
        let g = parallel_graph();
        let og = OptGraph::build(&g, true);
        let cfg = unit_cfg();

        let mut hc = HierarOrderCfg::default();
        let opt = IlpOptimizer::new(&cfg, CancelFlag::default());
        let stats = opt.optimize(&og, &mut hc).unwrap();

        assert_eq!(stats.score, 0.0);
        assert!(!hc.is_empty());
    }

    #[test]
    fn recovers_order_by_topological_sort() {
        let g = parallel_graph();
        let og = OptGraph::build(&g, true);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let cfg = unit_cfg();
        let prob = IlpProblem::build(&og, &comp, &cfg);

        let backend = BranchBoundBackend::new(CancelFlag::default());
        let sol = backend.solve(&prob, None).unwrap();
        assert!(sol.optimal);
        assert_eq!(sol.objective, 0.0);

        let opt = IlpOptimizer::new(&cfg, CancelFlag::default());
        let order = opt.configuration_from_solution(&prob, &sol, &og);
        for group in prob.groups() {
            let mut perm = order.perm(group.edge).to_vec();
            let mut lines = group.lines.clone();
            perm.sort();
            lines.sort();
            assert_eq!(perm, lines);
        }
    }

    #[test]
    fn writes_lp_file() {
        let g = parallel_graph();
        let dir = std::env::temp_dir().join("rosen-ilp-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("order.lp");

        let og = OptGraph::build(&g, true);
        let comp: Vec<OptNodeId> = og.node_ids().collect();
        let prob = IlpProblem::build(&og, &comp, &unit_cfg());
        prob.write_lp(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("\\ line-ordering ILP"));
        assert!(text.contains("Minimize"));
        assert!(text.contains("Subject To"));
        assert!(text.contains("Binary"));
        assert!(text.trim_end().ends_with("End"));
    }

    #[test]
    fn unknown_backend_is_reported() {
        let g = parallel_graph();
        let og = OptGraph::build(&g, true);
        let cfg = ConfigBuilder::default().ilp_solver("cbc".to_string()).build().unwrap();

        let mut hc = HierarOrderCfg::default();
        let opt = IlpOptimizer::new(&cfg, CancelFlag::default());
        let err = opt.optimize(&og, &mut hc);

        assert!(matches!(err, Err(Error::SolverBackend { .. })));
    }

    #[test]
    fn no_solve_writes_initial_config() {
        let g = parallel_graph();
        let og = OptGraph::build(&g, true);
        let cfg = ConfigBuilder::default().ilp_no_solve(true).build().unwrap();

        let mut hc = HierarOrderCfg::default();
        let opt = IlpOptimizer::new(&cfg, CancelFlag::default());
        let stats = opt.optimize(&og, &mut hc).unwrap();

        assert_eq!(stats.iterations, 0);
        assert!(!hc.is_empty());
    }
}
