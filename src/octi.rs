//! Octilinearization: embedding the combinatorial graph on a grid whose
//! edges only use the eight compass directions.
//!
//! The drawing loop routes one comb edge at a time through the base grid
//! graph. Endpoints settle on the first route that reaches them; their
//! cell's ports are then reserved per incident edge following the cyclic
//! (angular) edge ordering, and later routes must enter through their
//! reserved port or fail. A failed route fails the whole ordering; the
//! outer loop retries with the next candidate ordering and a freshly
//! built grid. After a complete draw, a local search perturbs each
//! settled cell to its neighbors and accepts strict cost improvements.

pub mod combgraph;
pub mod dijkstra;
pub mod gridgraph;

use crate::config::{BaseGraphKind, Config};
use crate::error::Error;
use crate::geometry::{Point, Polyline};
use crate::graph::LineGraph;
use crate::optim::CancelFlag;
use combgraph::{CombEdgeId, CombGraph, CombNodeId};
use dijkstra::{shortest_path, PathResult};
use gridgraph::{GridEdgeKind, GridGraph, GridNodeId, Penalties, DIR_OFFSETS, PORTS};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Candidate orderings tried before giving up.
const MAX_DRAW_ATTEMPTS: usize = 10;

/// One routed comb edge.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnEdge {
    pub edge: CombEdgeId,
    pub nodes: Vec<GridNodeId>,
    /// World geometry of the route, duplicate boundary points removed.
    pub geom: Polyline,
    pub cost: f64,
    pub hops: usize,
    pub bends45: usize,
    pub bends90: usize,
    pub bends135: usize,
}

impl DrawnEdge {
    pub fn bends(&self) -> usize {
        self.bends45 + self.bends90 + self.bends135
    }
}

/// A complete embedding: the routed edges in drawing order plus the
/// settled node positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drawing {
    pub edges: Vec<DrawnEdge>,
    pub cost: f64,
    pub cells: BTreeMap<CombNodeId, (usize, usize)>,
    pub positions: BTreeMap<CombNodeId, Point>,
}

impl Drawing {
    pub fn bends(&self) -> usize {
        self.edges.iter().map(|e| e.bends()).sum()
    }
}

struct DrawState {
    grid: GridGraph,
    settled: HashMap<CombNodeId, (usize, usize)>,
    /// Reserved port direction per settled node and incident edge.
    ports: HashMap<CombNodeId, HashMap<CombEdgeId, u8>>,
}

pub struct Octilinearizer {
    grid_size: f64,
    border_rad: f64,
    max_grid_dist: f64,
    enf_geo_course: f64,
    base_graph: BaseGraphKind,
    restr_loc_search: bool,
    seed: u64,
    cancel: CancelFlag,
}

impl Octilinearizer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            grid_size: cfg.grid_size,
            border_rad: cfg.border_rad,
            max_grid_dist: cfg.max_grid_dist,
            enf_geo_course: cfg.enf_geo_course,
            base_graph: cfg.base_graph,
            restr_loc_search: cfg.restr_loc_search,
            seed: cfg.seed,
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Draws the whole graph, retrying with alternative edge orderings on
    /// failure.
    pub fn draw(&self, cg: &CombGraph, obstacles: &[Vec<Point>]) -> Result<Drawing, Error> {
        if cg.edge_count() == 0 {
            return Ok(Drawing::default());
        }

        let m = cg.measures();
        debug!(
            nodes = cg.node_count(),
            edges = cg.edge_count(),
            avg_node_dist = m.avg_node_dist,
            max_deg = m.max_deg,
            grid_size = self.grid_size,
            "octilinearizing"
        );

        for attempt in 0..MAX_DRAW_ATTEMPTS {
            if self.cancel.stop_requested() {
                break;
            }

            let ordering = self.ordering(cg, attempt);
            if let Some(drawing) = self.try_draw(cg, &ordering, obstacles, None) {
                debug!(attempt, cost = drawing.cost, "embedding found");
                return Ok(self.local_search(cg, &ordering, obstacles, drawing));
            }
        }

        Err(Error::NoEmbeddingFound {
            attempts: MAX_DRAW_ATTEMPTS,
        })
    }

    /// Drawing order: endpoints of larger degree first, longer edges
    /// before shorter ones. Later attempts use deterministic shuffles.
    fn ordering(&self, cg: &CombGraph, attempt: usize) -> Vec<CombEdgeId> {
        let mut edges: Vec<CombEdgeId> = cg.edge_ids().collect();

        if attempt == 0 {
            edges.sort_by(|&a, &b| {
                let key = |e: CombEdgeId| {
                    let ce = cg.edge(e);
                    let deg = cg.degree(ce.from).max(cg.degree(ce.to));
                    (deg, ce.geom.length())
                };
                let (da, la) = key(a);
                let (db, lb) = key(b);
                db.cmp(&da).then(lb.total_cmp(&la)).then(a.cmp(&b))
            });
        } else {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(attempt as u64));
            edges.shuffle(&mut rng);
        }

        edges
    }

    fn try_draw(
        &self,
        cg: &CombGraph,
        ordering: &[CombEdgeId],
        obstacles: &[Vec<Point>],
        forced: Option<&HashMap<CombNodeId, (usize, usize)>>,
    ) -> Option<Drawing> {
        let bbox = cg.bbox()?;
        let mut grid = GridGraph::new(
            bbox.inset_by(-self.border_rad, -self.border_rad),
            self.grid_size,
            self.base_graph,
            Penalties::default(),
        );
        grid.close_obstacles(obstacles);

        let mut st = DrawState {
            grid,
            settled: HashMap::new(),
            ports: HashMap::new(),
        };
        let mut drawn: Vec<DrawnEdge> = Vec::with_capacity(ordering.len());

        for &ce_id in ordering {
            let ce = cg.edge(ce_id);

            let mut sources = self.cands(cg, &st, ce.from, forced)?;
            let mut sinks = self.cands(cg, &st, ce.to, forced)?;

            // distinct endpoints need distinct cells; a cell in both
            // candidate sets goes to the endpoint it is cheaper for
            let src_cost: HashMap<GridNodeId, f64> = sources.iter().copied().collect();
            sinks.retain(|&(n, c)| match src_cost.get(&n) {
                Some(&sc) => c < sc,
                None => true,
            });
            let sink_ids: HashSet<GridNodeId> = sinks.iter().map(|&(n, _)| n).collect();
            sources.retain(|&(n, _)| !sink_ids.contains(&n));
            if sources.is_empty() || sinks.is_empty() {
                return None;
            }

            let blocked = self.blocked_ports(&st, ce_id, ce.from, ce.to);
            let geo = (self.enf_geo_course > 0.0)
                .then(|| self.geo_penalties(&st.grid, &ce.geom));

            let res = shortest_path(
                &st.grid,
                &sources,
                &sinks,
                geo.as_deref(),
                &blocked,
                self.base_graph,
            )?;
            if res.nodes.len() < 3 {
                return None;
            }

            self.settle_endpoints(cg, &mut st, ce_id, &res);
            self.close_route(&mut st, &res);
            drawn.push(self.record(&st.grid, ce_id, res));
        }

        let cost = drawn.iter().map(|d| d.cost).sum();
        let cells: BTreeMap<CombNodeId, (usize, usize)> =
            st.settled.iter().map(|(&n, &c)| (n, c)).collect();
        let positions = cells
            .iter()
            .map(|(&n, &(x, y))| (n, st.grid.node_pos(st.grid.parent(x, y))))
            .collect();

        Some(Drawing {
            edges: drawn,
            cost,
            cells,
            positions,
        })
    }

    /// Candidate source or sink cells for an endpoint: the settled (or
    /// forced) cell, or every free cell within `max_grid_dist` of the
    /// desired position, charged by displacement.
    fn cands(
        &self,
        cg: &CombGraph,
        st: &DrawState,
        n: CombNodeId,
        forced: Option<&HashMap<CombNodeId, (usize, usize)>>,
    ) -> Option<Vec<(GridNodeId, f64)>> {
        if let Some(&(x, y)) = st.settled.get(&n) {
            return Some(vec![(st.grid.parent(x, y), 0.0)]);
        }

        let desired = st.grid.cell_at(&cg.node(n).pos)?;
        let move_pen = st.grid.penalties().displacement;

        if let Some(&(x, y)) = forced.and_then(|f| f.get(&n)) {
            if x >= st.grid.cols() || y >= st.grid.rows() || st.grid.occupant(x, y).is_some() {
                return None;
            }
            // forced cells still pay for leaving the desired position
            let dx = x.abs_diff(desired.0) as f64;
            let dy = y.abs_diff(desired.1) as f64;
            return Some(vec![(
                st.grid.parent(x, y),
                (dx * dx + dy * dy).sqrt() * move_pen,
            )]);
        }
        let r = self.max_grid_dist.ceil() as isize;

        let mut out = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let x = desired.0 as isize + dx;
                let y = desired.1 as isize + dy;
                if x < 0 || y < 0 {
                    continue;
                }
                let (x, y) = (x as usize, y as usize);
                if x >= st.grid.cols() || y >= st.grid.rows() {
                    continue;
                }

                let dist = ((dx * dx + dy * dy) as f64).sqrt();
                if dist > self.max_grid_dist {
                    continue;
                }
                if st.grid.occupant(x, y).is_some() {
                    continue;
                }

                out.push((st.grid.parent(x, y), dist * move_pen));
            }
        }

        (!out.is_empty()).then_some(out)
    }

    /// For settled endpoints, every port except the one reserved for this
    /// edge is off limits.
    fn blocked_ports(
        &self,
        st: &DrawState,
        ce: CombEdgeId,
        from: CombNodeId,
        to: CombNodeId,
    ) -> HashSet<GridNodeId> {
        let mut blocked = HashSet::new();

        for n in [from, to] {
            let (Some(&(x, y)), Some(pmap)) = (st.settled.get(&n), st.ports.get(&n)) else {
                continue;
            };
            let Some(&reserved) = pmap.get(&ce) else {
                continue;
            };
            for dir in 0..PORTS as u8 {
                if dir != reserved {
                    blocked.insert(st.grid.port(x, y, dir));
                }
            }
        }

        blocked
    }

    /// Marks both endpoints settled and reserves one port per incident
    /// comb edge: the routed edge keeps the port its path used, the
    /// remaining edges are laid out around the cell following their
    /// angular order.
    fn settle_endpoints(
        &self,
        cg: &CombGraph,
        st: &mut DrawState,
        ce: CombEdgeId,
        res: &PathResult,
    ) {
        let ends = [
            (cg.edge(ce).from, res.nodes[0], res.nodes[1]),
            (
                cg.edge(ce).to,
                res.nodes[res.nodes.len() - 1],
                res.nodes[res.nodes.len() - 2],
            ),
        ];

        for (n, parent, first_port) in ends {
            if st.settled.contains_key(&n) {
                continue;
            }

            let cell = {
                let node = st.grid.node(parent);
                (node.x, node.y)
            };
            let used = match st.grid.node(first_port).port {
                Some(p) => p,
                None => panic!("[BUG] route does not leave through a port"),
            };

            st.settled.insert(n, cell);
            st.grid.settle(cell.0, cell.1, n);

            let mut assigned: HashMap<CombEdgeId, u8> = HashMap::new();
            assigned.insert(ce, used);
            let mut taken: HashSet<u8> = [used].into_iter().collect();

            let mut others: Vec<(f64, CombEdgeId)> = cg
                .node(n)
                .adj
                .iter()
                .filter(|&&e| e != ce)
                .map(|&e| {
                    let other = if cg.edge(e).from == n {
                        cg.edge(e).to
                    } else {
                        cg.edge(e).from
                    };
                    let angle = cg.node(n).pos.angle_to(&cg.node(other).pos);
                    (angle, e)
                })
                .collect();
            others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            for (angle, e) in others {
                let want = dir_from_angle(angle);
                let dir = (0..PORTS as u8)
                    .map(|k| (want + k) % PORTS as u8)
                    .find(|d| !taken.contains(d))
                    .unwrap_or(want);
                taken.insert(dir);
                assigned.insert(e, dir);
            }

            st.ports.insert(n, assigned);
        }
    }

    /// Closes the route's interior nodes and raises congestion around
    /// every traversed cell.
    fn close_route(&self, st: &mut DrawState, res: &PathResult) {
        for &n in &res.nodes[1..res.nodes.len() - 1] {
            st.grid.close_node(n);
        }

        let mut cells: Vec<(usize, usize)> = res
            .nodes
            .iter()
            .map(|&n| {
                let node = st.grid.node(n);
                (node.x, node.y)
            })
            .collect();
        cells.sort();
        cells.dedup();
        for (x, y) in cells {
            st.grid.raise_congestion(x, y);
        }
    }

    fn record(&self, grid: &GridGraph, ce: CombEdgeId, res: PathResult) -> DrawnEdge {
        let mut points: Vec<Point> = res.nodes.iter().map(|&n| grid.node_pos(n)).collect();
        points.dedup();

        let (mut hops, mut b45, mut b90, mut b135) = (0, 0, 0, 0);
        for &e in &res.edges {
            match grid.edge(e).kind {
                GridEdgeKind::Hop { .. } => hops += 1,
                GridEdgeKind::Bend { turn: 1 } => b45 += 1,
                GridEdgeKind::Bend { turn: 2 } => b90 += 1,
                GridEdgeKind::Bend { turn: 3 } => b135 += 1,
                _ => {}
            }
        }

        DrawnEdge {
            edge: ce,
            nodes: res.nodes,
            geom: Polyline::new(points),
            cost: res.cost,
            hops,
            bends45: b45,
            bends90: b90,
            bends135: b135,
        }
    }

    /// Per-grid-edge bias against hops whose direction deviates from the
    /// input geometry's local course.
    fn geo_penalties(&self, grid: &GridGraph, geom: &Polyline) -> Vec<f64> {
        let mut pens = vec![0.0; grid.edge_count()];

        for i in 0..grid.edge_count() {
            let e = grid.edge(gridgraph::GridEdgeId(i));
            let GridEdgeKind::Hop { dir } = e.kind else {
                continue;
            };

            let (pa, pb) = (grid.node_pos(e.a), grid.node_pos(e.b));
            let mid = Point::new((pa.x + pb.x) / 2.0, (pa.y + pb.y) / 2.0);
            let along = geom.closest_dist_along(&mid);
            let course = geom.tangent_at(along);

            let (dx, dy) = DIR_OFFSETS[dir as usize];
            let hop_angle = (dy as f64).atan2(dx as f64);

            // direction-insensitive deviation, folded into [0, pi/2]
            let mut dev = (hop_angle - course).abs() % std::f64::consts::PI;
            if dev > std::f64::consts::FRAC_PI_2 {
                dev = std::f64::consts::PI - dev;
            }
            pens[i] = self.enf_geo_course * dev;
        }

        pens
    }

    /// Perturbs each settled node to its neighbor cells and re-routes;
    /// accepts strict total-cost improvements until a fixpoint.
    fn local_search(
        &self,
        cg: &CombGraph,
        ordering: &[CombEdgeId],
        obstacles: &[Vec<Point>],
        mut best: Drawing,
    ) -> Drawing {
        loop {
            let mut improved = false;

            for n in cg.node_ids() {
                if self.cancel.stop_requested() {
                    return best;
                }
                if self.restr_loc_search {
                    let bent = cg.node(n).adj.iter().any(|&e| {
                        best.edges
                            .iter()
                            .any(|d| d.edge == e && d.bends() > 0)
                    });
                    if !bent {
                        continue;
                    }
                }
                let Some(&cell) = best.cells.get(&n) else {
                    continue;
                };

                for dir in 0..PORTS as u8 {
                    let (dx, dy) = DIR_OFFSETS[dir as usize];
                    let x = cell.0 as isize + dx;
                    let y = cell.1 as isize + dy;
                    if x < 0 || y < 0 {
                        continue;
                    }
                    let nc = (x as usize, y as usize);
                    if best.cells.iter().any(|(&m, &c)| m != n && c == nc) {
                        continue;
                    }

                    let mut forced: HashMap<CombNodeId, (usize, usize)> =
                        best.cells.iter().map(|(&m, &c)| (m, c)).collect();
                    forced.insert(n, nc);

                    if let Some(cand) = self.try_draw(cg, ordering, obstacles, Some(&forced)) {
                        if cand.cost < best.cost {
                            debug!(node = %n, cost = cand.cost, "local search improvement");
                            best = cand;
                            improved = true;
                            break;
                        }
                    }
                }
            }

            if !improved {
                return best;
            }
        }
    }
}

/// Octilinearizes a line graph in place: node positions and edge
/// geometries are replaced by their grid embedding.
pub fn octilinearize(
    g: &mut LineGraph,
    cfg: &Config,
    obstacles: &[Vec<Point>],
) -> Result<Drawing, Error> {
    let (drawing, updates, geoms) = {
        let cg = CombGraph::build(g);
        let drawing = Octilinearizer::new(cfg).draw(&cg, obstacles)?;

        let updates: Vec<_> = drawing
            .positions
            .iter()
            .map(|(&n, &pos)| (cg.node(n).node, pos))
            .collect();
        let geoms: Vec<_> = drawing
            .edges
            .iter()
            .map(|d| (cg.edge(d.edge).edge, d.geom.clone()))
            .collect();
        (drawing, updates, geoms)
    };
    for (n, pos) in updates {
        g.set_node_pos(n, pos);
    }
    for (e, geom) in geoms {
        g.replace_edge_geom(e, geom);
    }

    Ok(drawing)
}

fn dir_from_angle(angle: f64) -> u8 {
    let sector =
        ((std::f64::consts::FRAC_PI_2 - angle) / std::f64::consts::FRAC_PI_4).round() as isize;
    (sector.rem_euclid(PORTS as isize)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WebColor;
    use crate::config::ConfigBuilder;
    use crate::graph::LineDir;

    fn four_cycle() -> (LineGraph, CombGraph) {
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", WebColor::default());
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let nodes: Vec<_> = corners.iter().map(|&p| g.add_node(p)).collect();
        for i in 0..4 {
            let e = g.add_edge(nodes[i], nodes[(i + 1) % 4]).unwrap();
            g.add_line_on_edge(e, l1, LineDir::Undirected).unwrap();
        }
        let cg = CombGraph::build(&g);
        (g, cg)
    }

    fn cycle_cfg() -> Config {
        ConfigBuilder::default()
            .grid_size(0.5)
            .border_rad(0.5)
            .max_grid_dist(3.0)
            .build()
            .unwrap()
    }

    #[test]
    fn four_cycle_routes_straight() {
        let (_, cg) = four_cycle();
        let cfg = cycle_cfg();

        let drawing = Octilinearizer::new(&cfg).draw(&cg, &[]).unwrap();

        assert_eq!(drawing.edges.len(), 4);
        for d in &drawing.edges {
            assert_eq!(d.hops, 2);
            assert_eq!(d.bends(), 0);
        }
        // four distinct settled cells
        let cells: HashSet<_> = drawing.cells.values().collect();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn every_route_is_octilinear() {
        let (_, cg) = four_cycle();
        let cfg = cycle_cfg();

        let drawing = Octilinearizer::new(&cfg).draw(&cg, &[]).unwrap();

        // every leg of every drawn geometry runs along one of the eight
        // compass directions
        for d in &drawing.edges {
            for w in d.geom.points().windows(2) {
                let dx = w[1].x - w[0].x;
                let dy = w[1].y - w[0].y;
                let axis = dx == 0.0 || dy == 0.0;
                let diagonal = (dx.abs() - dy.abs()).abs() < 1e-9;
                assert!(axis || diagonal, "non-octilinear leg {:?} -> {:?}", w[0], w[1]);
            }
        }
    }

    #[test]
    fn grid_mode_stays_rectilinear() {
        let (_, cg) = four_cycle();
        let cfg = ConfigBuilder::default()
            .grid_size(0.5)
            .border_rad(0.5)
            .base_graph(crate::config::BaseGraphKind::Grid)
            .build()
            .unwrap();

        let drawing = Octilinearizer::new(&cfg).draw(&cg, &[]).unwrap();

        for d in &drawing.edges {
            for w in d.geom.points().windows(2) {
                let dx = w[1].x - w[0].x;
                let dy = w[1].y - w[0].y;
                assert!(dx == 0.0 || dy == 0.0);
            }
        }
    }

    #[test]
    fn obstacle_forces_a_detour() {
        let (_, cg) = four_cycle();
        let cfg = cycle_cfg();

        let free = Octilinearizer::new(&cfg).draw(&cg, &[]).unwrap();

        // straddles the bottom edge's straight path
        let obstacle = vec![
            Point::new(0.4, -0.1),
            Point::new(0.6, -0.1),
            Point::new(0.6, 0.1),
            Point::new(0.4, 0.1),
        ];
        let detoured = Octilinearizer::new(&cfg).draw(&cg, &[obstacle]).unwrap();

        assert_eq!(detoured.edges.len(), 4);
        // the blocked edge turns: either one 90 degree bend or two 45s
        assert!(detoured
            .edges
            .iter()
            .any(|d| d.bends90 >= 1 || d.bends45 >= 2));
        assert!(detoured.cost > free.cost);
    }

    #[test]
    fn drawing_is_deterministic_under_seed() {
        let (_, cg) = four_cycle();
        let cfg = ConfigBuilder::default()
            .grid_size(0.5)
            .border_rad(0.5)
            .seed(17)
            .build()
            .unwrap();

        let a = Octilinearizer::new(&cfg).draw(&cg, &[]).unwrap();
        let b = Octilinearizer::new(&cfg).draw(&cg, &[]).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn octilinearize_writes_back_positions() {
        let (mut g, _) = four_cycle();
        let cfg = cycle_cfg();

        let drawing = octilinearize(&mut g, &cfg, &[]).unwrap();
        assert_eq!(drawing.edges.len(), 4);

        // every node now sits on a grid cell center: coordinates are
        // multiples of half the grid size from the inflated origin
        for n in g.node_ids().collect::<Vec<_>>() {
            let p = g.node(n).pos();
            let fx = (p.x + 0.5) / 0.5;
            let fy = (p.y + 0.5) / 0.5;
            assert!((fx - fx.round()).abs() < 1e-9);
            assert!((fy - fy.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn geo_penalties_prefer_the_input_course() {
        let (_, cg) = four_cycle();
        let cfg = ConfigBuilder::default()
            .grid_size(0.5)
            .border_rad(0.5)
            .enf_geo_course(1.0)
            .build()
            .unwrap();

        let octi = Octilinearizer::new(&cfg);
        let grid = GridGraph::new(
            cg.bbox().unwrap().inset_by(-0.5, -0.5),
            0.5,
            BaseGraphKind::Octigrid,
            Penalties::default(),
        );

        // an east-west course penalizes north-south hops more
        let course = Polyline::straight(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        let pens = octi.geo_penalties(&grid, &course);

        let mut ew = None;
        let mut ns = None;
        for i in 0..grid.edge_count() {
            let e = grid.edge(gridgraph::GridEdgeId(i));
            match e.kind {
                GridEdgeKind::Hop { dir: 2 } if ew.is_none() => ew = Some(pens[i]),
                GridEdgeKind::Hop { dir: 0 } if ns.is_none() => ns = Some(pens[i]),
                _ => {}
            }
        }
        assert!(ew.unwrap() < ns.unwrap());
    }

    #[test]
    fn dir_sectors() {
        use std::f64::consts::{FRAC_PI_2, PI};

        assert_eq!(dir_from_angle(FRAC_PI_2), 0); // north
        assert_eq!(dir_from_angle(0.0), 2); // east
        assert_eq!(dir_from_angle(-FRAC_PI_2), 4); // south
        assert_eq!(dir_from_angle(PI), 6); // west
        assert_eq!(dir_from_angle(FRAC_PI_2 / 2.0), 1); // north-east
    }
}
