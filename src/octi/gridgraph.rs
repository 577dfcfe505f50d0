//! The base grid graph the octilinearizer routes on.
//!
//! The inflated bounding box is subdivided into square cells. Each cell
//! holds a parent node and eight port nodes, one per compass direction:
//!
//! ```svgbob
//!      7   0   1
//!       o--o--o
//!       |     |
//!     6 o  *  o 2      * parent, o ports
//!       |     |
//!       o--o--o
//!      5   4   3
//! ```
//!
//! Three edge families:
//! - *hop* edges join a port to the opposite port of the neighbor cell in
//!   its direction (diagonals are infinite in `Grid` mode),
//! - *bend* edges join two ports of the same cell; the cost follows the
//!   turn a path makes crossing the cell (straight through opposite ports
//!   is free, a U-turn is impossible),
//! - *sink* edges join the parent to each of its ports; their cost grows
//!   as settled routes come near (congestion), and never shrinks within a
//!   drawing attempt.

use super::combgraph::CombNodeId;
use crate::config::BaseGraphKind;
use crate::geometry::{segment_crosses_polygon, Point, Rect};
use derive_more::Display;
use smallvec::SmallVec;

pub const PORTS: usize = 8;

/// Cell offsets per direction, clockwise from north, y up.
pub(crate) const DIR_OFFSETS: [(isize, isize); PORTS] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct GridNodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct GridEdgeId(pub(crate) usize);

/// Cost scheme of the §3 edge families.
#[derive(Debug, Clone, Copy)]
pub struct Penalties {
    pub hop: f64,
    pub diag_hop: f64,
    /// 45 degree turn (adjacent-but-one ports).
    pub bend45: f64,
    /// 90 degree turn.
    pub bend90: f64,
    /// 135 degree turn, the sharpest allowed.
    pub bend135: f64,
    pub sink: f64,
    /// Added to sink edges near settled routes.
    pub congestion: f64,
    /// Per-cell cost of settling a node away from its desired position.
    pub displacement: f64,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            hop: 1.0,
            diag_hop: 1.5,
            bend45: 0.5,
            bend90: 1.5,
            bend135: 3.0,
            sink: 1.0,
            congestion: 0.5,
            displacement: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GridNode {
    pub x: usize,
    pub y: usize,
    /// `None` for the cell parent.
    pub port: Option<u8>,
    /// Claimed by a routed path or a settled node; skipped by the search
    /// unless it is an endpoint of the query.
    pub closed: bool,
    /// The comb node occupying this cell, if any. Only set on parents.
    pub occupant: Option<CombNodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEdgeKind {
    Hop { dir: u8 },
    /// `turn` counts 45 degree quanta: 0 = straight through, 1..=3 the
    /// turn sharpness.
    Bend { turn: u8 },
    Sink { dir: u8 },
}

#[derive(Debug, Clone, Copy)]
pub struct GridEdge {
    pub a: GridNodeId,
    pub b: GridNodeId,
    pub cost: f64,
    pub kind: GridEdgeKind,
}

#[derive(Debug, Clone)]
pub struct GridGraph {
    cols: usize,
    rows: usize,
    cell_size: f64,
    /// World position of cell (0, 0)'s center.
    origin: Point,
    pens: Penalties,
    nodes: Vec<GridNode>,
    edges: Vec<GridEdge>,
    adj: Vec<SmallVec<[GridEdgeId; 10]>>,
}

impl GridGraph {
    /// Builds the lattice over an already-inflated bounding box.
    pub fn new(bbox: Rect, cell_size: f64, kind: BaseGraphKind, pens: Penalties) -> Self {
        let cols = (bbox.size.width / cell_size).ceil() as usize + 1;
        let rows = (bbox.size.height / cell_size).ceil() as usize + 1;

        let mut g = Self {
            cols,
            rows,
            cell_size,
            origin: bbox.origin,
            pens,
            nodes: Vec::with_capacity(cols * rows * 9),
            edges: Vec::new(),
            adj: Vec::new(),
        };

        for y in 0..rows {
            for x in 0..cols {
                g.nodes.push(GridNode {
                    x,
                    y,
                    port: None,
                    closed: false,
                    occupant: None,
                });
                for p in 0..PORTS as u8 {
                    g.nodes.push(GridNode {
                        x,
                        y,
                        port: Some(p),
                        closed: false,
                        occupant: None,
                    });
                }
            }
        }
        g.adj = vec![SmallVec::new(); g.nodes.len()];

        for y in 0..rows {
            for x in 0..cols {
                // sink edges
                for p in 0..PORTS as u8 {
                    g.push_edge(
                        g.parent(x, y),
                        g.port(x, y, p),
                        pens.sink,
                        GridEdgeKind::Sink { dir: p },
                    );
                }

                // bend edges between distinct ports
                for i in 0..PORTS as u8 {
                    for j in i + 1..PORTS as u8 {
                        let d = (j - i).min(PORTS as u8 - (j - i));
                        let (cost, turn) = match d {
                            4 => (0.0, 0),
                            3 => (pens.bend45, 1),
                            2 => (pens.bend90, 2),
                            1 => (pens.bend135, 3),
                            _ => continue,
                        };
                        g.push_edge(
                            g.port(x, y, i),
                            g.port(x, y, j),
                            cost,
                            GridEdgeKind::Bend { turn },
                        );
                    }
                }

                // hop edges toward N, NE, E, SE; the rest are covered by
                // the neighbors
                for dir in 0..4u8 {
                    let Some((nx, ny)) = g.neighbor(x, y, dir) else {
                        continue;
                    };
                    let diagonal = dir % 2 == 1;
                    let cost = match (diagonal, kind) {
                        (false, _) => pens.hop,
                        (true, BaseGraphKind::Octigrid) => pens.diag_hop,
                        (true, BaseGraphKind::Grid) => f64::INFINITY,
                    };
                    g.push_edge(
                        g.port(x, y, dir),
                        g.port(nx, ny, (dir + 4) % PORTS as u8),
                        cost,
                        GridEdgeKind::Hop { dir },
                    );
                }
            }
        }

        g
    }

    fn push_edge(&mut self, a: GridNodeId, b: GridNodeId, cost: f64, kind: GridEdgeKind) {
        let id = GridEdgeId(self.edges.len());
        self.edges.push(GridEdge { a, b, cost, kind });
        self.adj[a.0].push(id);
        self.adj[b.0].push(id);
    }

    // --- Addressing

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn parent(&self, x: usize, y: usize) -> GridNodeId {
        GridNodeId((y * self.cols + x) * 9)
    }

    pub fn port(&self, x: usize, y: usize, dir: u8) -> GridNodeId {
        GridNodeId((y * self.cols + x) * 9 + 1 + dir as usize)
    }

    pub fn node(&self, id: GridNodeId) -> &GridNode {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: GridEdgeId) -> &GridEdge {
        &self.edges[id.0]
    }

    pub fn adjacent(&self, id: GridNodeId) -> &[GridEdgeId] {
        &self.adj[id.0]
    }

    pub fn other_end(&self, e: GridEdgeId, n: GridNodeId) -> GridNodeId {
        let edge = &self.edges[e.0];
        if edge.a == n {
            edge.b
        } else {
            edge.a
        }
    }

    pub fn neighbor(&self, x: usize, y: usize, dir: u8) -> Option<(usize, usize)> {
        let (dx, dy) = DIR_OFFSETS[dir as usize];
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        (nx >= 0 && ny >= 0 && (nx as usize) < self.cols && (ny as usize) < self.rows)
            .then_some((nx as usize, ny as usize))
    }

    /// World position of a node: cell center, or the port's point on the
    /// cell boundary.
    pub fn node_pos(&self, id: GridNodeId) -> Point {
        let n = &self.nodes[id.0];
        let cx = self.origin.x + n.x as f64 * self.cell_size;
        let cy = self.origin.y + n.y as f64 * self.cell_size;
        match n.port {
            None => Point::new(cx, cy),
            Some(p) => {
                let (dx, dy) = DIR_OFFSETS[p as usize];
                Point::new(
                    cx + dx as f64 * self.cell_size / 2.0,
                    cy + dy as f64 * self.cell_size / 2.0,
                )
            }
        }
    }

    /// The cell whose center is nearest to `p`, if inside the lattice.
    pub fn cell_at(&self, p: &Point) -> Option<(usize, usize)> {
        let x = ((p.x - self.origin.x) / self.cell_size).round();
        let y = ((p.y - self.origin.y) / self.cell_size).round();
        (x >= 0.0 && y >= 0.0 && (x as usize) < self.cols && (y as usize) < self.rows)
            .then_some((x as usize, y as usize))
    }

    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.rows).flat_map(move |y| (0..self.cols).map(move |x| (x, y)))
    }

    pub fn penalties(&self) -> &Penalties {
        &self.pens
    }

    // --- State transitions (monotone within an attempt)

    /// Sets every edge whose segment crosses an obstacle polygon to
    /// infinite cost.
    pub fn close_obstacles(&mut self, obstacles: &[Vec<Point>]) {
        if obstacles.is_empty() {
            return;
        }
        for i in 0..self.edges.len() {
            let (a, b) = (self.edges[i].a, self.edges[i].b);
            let (pa, pb) = (self.node_pos(a), self.node_pos(b));
            if obstacles
                .iter()
                .any(|poly| segment_crosses_polygon(&pa, &pb, poly))
            {
                self.edges[i].cost = f64::INFINITY;
            }
        }
    }

    /// Claims a cell for a comb node.
    pub fn settle(&mut self, x: usize, y: usize, occupant: CombNodeId) {
        let id = self.parent(x, y);
        self.nodes[id.0].occupant = Some(occupant);
        self.nodes[id.0].closed = true;
    }

    pub fn occupant(&self, x: usize, y: usize) -> Option<CombNodeId> {
        self.nodes[self.parent(x, y).0].occupant
    }

    pub fn close_node(&mut self, id: GridNodeId) {
        self.nodes[id.0].closed = true;
    }

    /// Raises the sink costs of every cell within one cell of `(x, y)`.
    /// Penalties only ever accumulate.
    pub fn raise_congestion(&mut self, x: usize, y: usize) {
        let amount = self.pens.congestion;
        let mut cells = vec![(x, y)];
        for dir in 0..PORTS as u8 {
            if let Some(c) = self.neighbor(x, y, dir) {
                cells.push(c);
            }
        }

        for (cx, cy) in cells {
            let parent = self.parent(cx, cy);
            for &e in self.adj[parent.0].clone().iter() {
                if matches!(self.edges[e.0].kind, GridEdgeKind::Sink { .. }) {
                    self.edges[e.0].cost += amount;
                }
            }
        }
    }

    /// Octile (or Manhattan, in `Grid` mode) lower bound on the cost of
    /// travelling between two cells. Ignores bends and sinks, which are
    /// non-negative, so the bound is admissible.
    pub fn heur_cost(&self, from: (usize, usize), to: (usize, usize), kind: BaseGraphKind) -> f64 {
        let dx = from.0.abs_diff(to.0) as f64;
        let dy = from.1.abs_diff(to.1) as f64;
        match kind {
            BaseGraphKind::Octigrid => {
                let diag = self.pens.diag_hop.min(2.0 * self.pens.hop);
                (dx - dy).abs() * self.pens.hop + dx.min(dy) * diag
            }
            BaseGraphKind::Grid => (dx + dy) * self.pens.hop,
        }
    }
}
