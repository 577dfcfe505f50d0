//! Multi-source, multi-sink shortest path on the base grid graph.
//!
//! Plain Dijkstra plus an admissible octile heuristic: the estimate is the
//! cheapest octile move cost to the fringe of the target cell set, plus
//! the cheapest sink edge among the targets. Octile distance lower-bounds
//! the true grid distance because turn costs are non-negative, and the
//! sink is traversed exactly once.

use super::gridgraph::{GridEdgeId, GridEdgeKind, GridGraph, GridNodeId, PORTS};
use crate::config::BaseGraphKind;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Search cost; total order via IEEE total ordering so the frontier can
/// live in a heap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone)]
pub struct PathResult {
    pub cost: f64,
    /// Visited grid nodes, source parent first.
    pub nodes: Vec<GridNodeId>,
    pub edges: Vec<GridEdgeId>,
}

/// Heuristic state for one query.
pub struct BaseGraphHeur {
    kind: BaseGraphKind,
    targets: HashSet<(usize, usize)>,
    /// Target cells with at least one neighbor outside the target set.
    fringe: Vec<(usize, usize)>,
    min_sink: f64,
}

impl BaseGraphHeur {
    pub fn new(g: &GridGraph, sinks: &[GridNodeId], kind: BaseGraphKind) -> Self {
        let targets: HashSet<(usize, usize)> = sinks
            .iter()
            .map(|&s| {
                let n = g.node(s);
                (n.x, n.y)
            })
            .collect();

        let fringe: Vec<(usize, usize)> = {
            let mut f: Vec<(usize, usize)> = targets
                .iter()
                .copied()
                .filter(|&(x, y)| {
                    (0..PORTS as u8).any(|dir| match g.neighbor(x, y, dir) {
                        Some(c) => !targets.contains(&c),
                        None => true,
                    })
                })
                .collect();
            f.sort();
            f
        };

        let min_sink = targets
            .iter()
            .flat_map(|&(x, y)| {
                g.adjacent(g.parent(x, y))
                    .iter()
                    .filter(|&&e| matches!(g.edge(e).kind, GridEdgeKind::Sink { .. }))
                    .map(|&e| g.edge(e).cost)
                    .collect::<Vec<_>>()
            })
            .fold(f64::INFINITY, f64::min);

        Self {
            kind,
            targets,
            fringe,
            min_sink,
        }
    }

    pub fn estimate(&self, g: &GridGraph, n: GridNodeId) -> f64 {
        let node = g.node(n);
        let cell = (node.x, node.y);
        if self.targets.contains(&cell) {
            return 0.0;
        }

        let travel = self
            .fringe
            .iter()
            .map(|&t| g.heur_cost(cell, t, self.kind))
            .fold(f64::INFINITY, f64::min);
        if travel.is_finite() {
            travel + self.min_sink
        } else {
            0.0
        }
    }
}

/// Runs the search. `sources` carry an initial cost (the displacement
/// penalty of starting there), `sinks` a terminal cost added on arrival.
/// `blocked` closes nodes for this query only; globally closed nodes are
/// skipped unless they are a source or sink of the query.
pub fn shortest_path(
    g: &GridGraph,
    sources: &[(GridNodeId, f64)],
    sinks: &[(GridNodeId, f64)],
    geo_pens: Option<&[f64]>,
    blocked: &HashSet<GridNodeId>,
    kind: BaseGraphKind,
) -> Option<PathResult> {
    let sink_ids: Vec<GridNodeId> = sinks.iter().map(|&(s, _)| s).collect();
    let heur = BaseGraphHeur::new(g, &sink_ids, kind);
    search(g, sources, sinks, geo_pens, blocked, Some(&heur))
}

fn search(
    g: &GridGraph,
    sources: &[(GridNodeId, f64)],
    sinks: &[(GridNodeId, f64)],
    geo_pens: Option<&[f64]>,
    blocked: &HashSet<GridNodeId>,
    heur: Option<&BaseGraphHeur>,
) -> Option<PathResult> {
    let sink_extra: HashMap<GridNodeId, f64> = sinks.iter().copied().collect();

    let mut dist: Vec<f64> = vec![f64::INFINITY; g.node_count()];
    let mut prev: Vec<Option<(GridNodeId, GridEdgeId)>> = vec![None; g.node_count()];
    let mut done: Vec<bool> = vec![false; g.node_count()];
    let mut heap: BinaryHeap<Reverse<(Cost, GridNodeId)>> = BinaryHeap::new();

    let h = |n: GridNodeId| heur.map(|h| h.estimate(g, n)).unwrap_or(0.0);

    for &(s, init) in sources {
        if blocked.contains(&s) {
            continue;
        }
        if init < dist[s.0] {
            dist[s.0] = init;
            heap.push(Reverse((Cost(init + h(s)), s)));
        }
    }

    while let Some(Reverse((_, n))) = heap.pop() {
        if done[n.0] {
            continue;
        }
        done[n.0] = true;

        if sink_extra.contains_key(&n) {
            return Some(reconstruct(n, &dist, &prev, sources));
        }

        for &e in g.adjacent(n) {
            let edge = g.edge(e);
            let mut step = edge.cost;
            if let Some(pens) = geo_pens {
                step += pens[e.0];
            }
            if !step.is_finite() {
                continue;
            }

            let m = g.other_end(e, n);
            if done[m.0] || blocked.contains(&m) {
                continue;
            }
            if g.node(m).closed && !sink_extra.contains_key(&m) {
                continue;
            }

            let mut alt = dist[n.0] + step;
            if let Some(&extra) = sink_extra.get(&m) {
                alt += extra;
            }
            if alt < dist[m.0] {
                dist[m.0] = alt;
                prev[m.0] = Some((n, e));
                heap.push(Reverse((Cost(alt + h(m)), m)));
            }
        }
    }

    None
}

fn reconstruct(
    end: GridNodeId,
    dist: &[f64],
    prev: &[Option<(GridNodeId, GridEdgeId)>],
    sources: &[(GridNodeId, f64)],
) -> PathResult {
    let mut nodes = vec![end];
    let mut edges = Vec::new();
    let mut cur = end;

    while let Some((p, e)) = prev[cur.0] {
        nodes.push(p);
        edges.push(e);
        cur = p;
    }
    debug_assert!(
        sources.iter().any(|&(s, _)| s == cur),
        "[BUG] path does not start at a source"
    );

    nodes.reverse();
    edges.reverse();
    PathResult {
        cost: dist[end.0],
        nodes,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect, Size};
    use crate::octi::gridgraph::Penalties;
    use proptest::prelude::*;

    fn grid(cols_span: f64, rows_span: f64) -> GridGraph {
        let bbox = Rect::new(Point::zero(), Size::new(cols_span, rows_span));
        GridGraph::new(bbox, 1.0, BaseGraphKind::Octigrid, Penalties::default())
    }

    #[test]
    fn straight_route_costs_two_sinks_plus_hops() {
        let g = grid(4.0, 2.0);
        let pens = *g.penalties();

        let src = g.parent(0, 1);
        let dst = g.parent(3, 1);
        let res = shortest_path(
            &g,
            &[(src, 0.0)],
            &[(dst, 0.0)],
            None,
            &HashSet::new(),
            BaseGraphKind::Octigrid,
        )
        .unwrap();

        // parent -> port, 3 hops with free straight bends, port -> parent
        assert_eq!(res.cost, 2.0 * pens.sink + 3.0 * pens.hop);
        assert_eq!(*res.nodes.first().unwrap(), src);
        assert_eq!(*res.nodes.last().unwrap(), dst);
    }

    #[test]
    fn multi_source_picks_the_cheaper_start() {
        let g = grid(4.0, 2.0);
        let dst = g.parent(3, 1);

        let near = g.parent(2, 1);
        let far = g.parent(0, 1);
        let res = shortest_path(
            &g,
            &[(far, 0.0), (near, 0.0)],
            &[(dst, 0.0)],
            None,
            &HashSet::new(),
            BaseGraphKind::Octigrid,
        )
        .unwrap();

        assert_eq!(*res.nodes.first().unwrap(), near);
    }

    #[test]
    fn initial_and_terminal_costs_shift_the_choice() {
        let g = grid(4.0, 2.0);
        let dst = g.parent(3, 1);

        let near = g.parent(2, 1);
        let far = g.parent(0, 1);
        // the near start is made expensive enough to lose
        let res = shortest_path(
            &g,
            &[(far, 0.0), (near, 100.0)],
            &[(dst, 0.0)],
            None,
            &HashSet::new(),
            BaseGraphKind::Octigrid,
        )
        .unwrap();

        assert_eq!(*res.nodes.first().unwrap(), far);
    }

    #[test]
    fn blocked_nodes_are_avoided() {
        let g = grid(2.0, 0.0);
        let src = g.parent(0, 0);
        let dst = g.parent(2, 0);

        // block the straight pass-through ports of the middle cell
        let blocked: HashSet<GridNodeId> =
            [g.port(1, 0, 6), g.port(1, 0, 2)].into_iter().collect();
        let res = shortest_path(
            &g,
            &[(src, 0.0)],
            &[(dst, 0.0)],
            None,
            &blocked,
            BaseGraphKind::Octigrid,
        );

        // single-row grid: no way around
        assert!(res.is_none());
    }

    proptest! {
        /// §8.7: the heuristic never exceeds the true shortest-path cost.
        #[test]
        fn heuristic_is_admissible(
            cols in 2usize..7,
            rows in 2usize..7,
            sx in 0usize..7,
            sy in 0usize..7,
            tx in 0usize..7,
            ty in 0usize..7,
        ) {
            let g = grid(cols as f64, rows as f64);
            let (sx, sy) = (sx % g.cols(), sy % g.rows());
            let (tx, ty) = (tx % g.cols(), ty % g.rows());

            let src = g.parent(sx, sy);
            let dst = g.parent(tx, ty);
            prop_assume!(src != dst);

            let truth = search(
                &g,
                &[(src, 0.0)],
                &[(dst, 0.0)],
                None,
                &HashSet::new(),
                None,
            )
            .unwrap();

            let heur = BaseGraphHeur::new(&g, &[dst], BaseGraphKind::Octigrid);
            prop_assert!(heur.estimate(&g, src) <= truth.cost + 1e-9);

            // every node on the optimal path is bounded by the remaining
            // cost, which the total cost bounds from above
            for &n in &truth.nodes {
                prop_assert!(heur.estimate(&g, n) <= truth.cost + 1e-9);
            }
        }
    }
}
