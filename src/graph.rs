//! The line graph: an undirected multigraph of transit topology.
//!
//! Nodes are stations or synthetic junctions, edges are corridors. Every
//! edge carries one or more *edge trip geoms*: a reference polyline plus
//! the bag of lines observed travelling it. Per node, *fronts* bundle the
//! incident edges arriving from roughly the same direction, and the
//! *occurring connections* table records which line continuations between
//! edge pairs were actually observed in the feed.
//!
//! ```svgbob
//!        e1 {L1,L2}         e2 {L1,L2}
//!   A o================o M o================o B
//!                      ^
//!                      '-- degree-2, no stop: contracted away
//! ```

use crate::color::WebColor;
use crate::error::Error;
use crate::geometry::{buffered_hull, Point, Polyline};
use derive_more::Display;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Interned line handle; lines are compared by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{}", _0)]
pub struct LineId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) NodeIndex<u32>);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub(crate) EdgeIndex<u32>);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.index())
    }
}

/// A transit service identity, drawn as one ribbon.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: String,
    pub label: String,
    pub color: WebColor,
}

/// A stop attached to a node. Nodes without stops are synthetic junctions.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub pos: Point,
}

/// Travel direction of a line on an edge, relative to the edge's `to`
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LineDir {
    /// Points toward `to`.
    #[display(fmt = "->")]
    Forward,
    /// Points toward `from`.
    #[display(fmt = "<-")]
    Backward,
    /// Serves both directions.
    #[display(fmt = "--")]
    Undirected,
}

/// One line occurrence inside an edge trip geom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOcc {
    pub line: LineId,
    pub dir: LineDir,
}

/// One geometry variant of the bundle drawn on an edge.
#[derive(Debug, Clone)]
pub struct EdgeTripGeom {
    geom: Polyline,
    /// Endpoint the polyline points toward. Canonicalized to the edge's
    /// `to` on insertion.
    geom_dir: NodeId,
    lines: Vec<LineOcc>,
    /// Ribbon draw order: `ordering[slot]` is an index into `lines`.
    /// Empty until an optimizer ran.
    ordering: Vec<usize>,
}

impl EdgeTripGeom {
    fn new(geom: Polyline, geom_dir: NodeId) -> Self {
        Self {
            geom,
            geom_dir,
            lines: Vec::new(),
            ordering: Vec::new(),
        }
    }

    pub fn geom(&self) -> &Polyline {
        &self.geom
    }

    pub fn geom_dir(&self) -> NodeId {
        self.geom_dir
    }

    pub fn lines(&self) -> &[LineOcc] {
        &self.lines
    }

    pub fn cardinality(&self) -> usize {
        self.lines.len()
    }

    pub fn line_pos(&self, line: LineId) -> Option<usize> {
        self.lines.iter().position(|o| o.line == line)
    }

    pub fn has_line(&self, line: LineId) -> bool {
        self.line_pos(line).is_some()
    }

    pub fn ordering(&self) -> &[usize] {
        &self.ordering
    }

    /// The slot a line is drawn at, under the current ordering (identity
    /// if none was written yet).
    pub fn slot_of(&self, line: LineId) -> Option<usize> {
        let idx = self.line_pos(line)?;
        if self.ordering.is_empty() {
            return Some(idx);
        }
        self.ordering.iter().position(|&i| i == idx)
    }
}

/// A contiguous arc of a node's boundary on which a subset of the incident
/// edges terminates.
#[derive(Debug, Clone)]
pub struct NodeFront {
    pub edges: SmallVec<[EdgeId; 4]>,
    /// The arc the ribbons are laid out along.
    pub geom: Polyline,
}

#[derive(Debug, Clone, Default)]
pub struct LineNode {
    pos: Point,
    stops: Vec<Stop>,
    fronts: Vec<NodeFront>,
    /// Witnesses that a line legally continues between two incident
    /// edges. Must be maintained through every topology rewrite.
    occ_conns: HashMap<LineId, Vec<(EdgeId, EdgeId)>>,
}

impl LineNode {
    pub fn pos(&self) -> Point {
        self.pos
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn is_stop(&self) -> bool {
        !self.stops.is_empty()
    }

    pub fn fronts(&self) -> &[NodeFront] {
        &self.fronts
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineEdge {
    geoms: Vec<EdgeTripGeom>,
}

impl LineEdge {
    pub fn geoms(&self) -> &[EdgeTripGeom] {
        &self.geoms
    }

    /// Number of distinct lines across all geoms.
    pub fn cardinality(&self) -> usize {
        let mut seen: Vec<LineId> = Vec::new();
        for g in &self.geoms {
            for o in &g.lines {
                if !seen.contains(&o.line) {
                    seen.push(o.line);
                }
            }
        }
        seen.len()
    }

    pub fn has_line(&self, line: LineId) -> bool {
        self.geoms.iter().any(|g| g.has_line(line))
    }
}

/// Drop geoms whose trip usage falls below a tenth of the edge average.
/// Recorded but disabled until product intent is confirmed.
const LOW_USE_FILTER: bool = false;

/// Angular gap below which two incident edges share a node front.
const FRONT_CLUSTER_ANGLE: f64 = std::f64::consts::FRAC_PI_4;

/// Sample count for front arcs.
const FRONT_ARC_SAMPLES: usize = 9;

type Graph = StableUnGraph<LineNode, LineEdge>;

/// Undirected multigraph of transit topology; see the module docs.
#[derive(Debug, Clone, Default)]
pub struct LineGraph {
    graph: Graph,
    lines: Vec<Line>,
    line_index: HashMap<String, LineId>,
    def_line_width: f64,
    def_line_spacing: f64,
}

impl LineGraph {
    pub fn new(def_line_width: f64, def_line_spacing: f64) -> Self {
        Self {
            graph: Graph::default(),
            lines: Vec::new(),
            line_index: HashMap::new(),
            def_line_width,
            def_line_spacing,
        }
    }

    // --- Lines

    /// Interns a line; a repeated id returns the existing handle.
    pub fn add_line(&mut self, id: &str, label: &str, color: WebColor) -> LineId {
        if let Some(&lid) = self.line_index.get(id) {
            return lid;
        }

        let lid = LineId(self.lines.len());
        self.lines.push(Line {
            id: id.to_string(),
            label: label.to_string(),
            color,
        });
        self.line_index.insert(id.to_string(), lid);
        lid
    }

    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.0]
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    // --- Nodes

    pub fn add_node(&mut self, pos: Point) -> NodeId {
        NodeId(self.graph.add_node(LineNode {
            pos,
            ..Default::default()
        }))
    }

    pub fn add_stop_node(&mut self, pos: Point, stop: Stop) -> NodeId {
        NodeId(self.graph.add_node(LineNode {
            pos,
            stops: vec![stop],
            ..Default::default()
        }))
    }

    pub fn node(&self, id: NodeId) -> &LineNode {
        &self.graph[id.0]
    }

    pub fn set_node_pos(&mut self, id: NodeId, pos: Point) {
        self.graph[id.0].pos = pos;
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(NodeId)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    // --- Edges

    /// Adds an edge between two distinct nodes. A self-loop is rejected
    /// silently by returning no edge.
    pub fn add_edge(&mut self, u: NodeId, v: NodeId) -> Option<EdgeId> {
        if u == v {
            return None;
        }
        Some(EdgeId(self.graph.add_edge(u.0, v.0, LineEdge::default())))
    }

    pub fn edge(&self, id: EdgeId) -> &LineEdge {
        &self.graph[id.0]
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_indices().map(EdgeId)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// `(from, to)` as the edge was created.
    pub fn edge_endpoints(&self, e: EdgeId) -> (NodeId, NodeId) {
        match self.graph.edge_endpoints(e.0) {
            Some((a, b)) => (NodeId(a), NodeId(b)),
            None => panic!("[BUG] edge {} is not in the graph", e),
        }
    }

    pub fn other_node(&self, e: EdgeId, n: NodeId) -> NodeId {
        let (from, to) = self.edge_endpoints(e);
        if n == to {
            from
        } else {
            to
        }
    }

    /// Incident edges in ascending id order.
    pub fn incident_edges(&self, n: NodeId) -> Vec<EdgeId> {
        let mut out: Vec<EdgeId> = self.graph.edges(n.0).map(|r| EdgeId(r.id())).collect();
        out.sort();
        out
    }

    pub fn degree(&self, n: NodeId) -> usize {
        self.graph.edges(n.0).count()
    }

    // --- Line occurrences and geoms

    /// Records a geometry variant on an edge. The polyline is
    /// canonicalized so that it points toward the edge's `to` endpoint;
    /// `geom_dir` names the endpoint the supplied polyline points toward.
    pub fn add_geom(&mut self, e: EdgeId, geom: Polyline, geom_dir: NodeId) -> Result<(), Error> {
        let (from, to) = self.edge_endpoints(e);
        if geom_dir != from && geom_dir != to {
            return Err(Error::BadInput {
                id: e.to_string(),
                reason: format!("geom direction node {} is not an endpoint", geom_dir),
            });
        }

        let mut etg = EdgeTripGeom::new(geom, geom_dir);
        if etg.geom_dir != to {
            etg.geom.reverse();
            etg.geom_dir = to;
        }
        self.graph[e.0].geoms.push(etg);
        Ok(())
    }

    /// Records that a line traverses an edge. Creates a straight default
    /// geom if the edge has none yet. A line may appear at most once per
    /// edge per direction.
    pub fn add_line_on_edge(&mut self, e: EdgeId, line: LineId, dir: LineDir) -> Result<(), Error> {
        let (from, to) = self.edge_endpoints(e);
        if self.graph[e.0].geoms.is_empty() {
            let geom = Polyline::straight(self.node(from).pos, self.node(to).pos);
            self.add_geom(e, geom, to)?;
        }

        let etg = match self.graph[e.0].geoms.last_mut() {
            Some(g) => g,
            None => panic!("[BUG] edge {} lost its geoms", e),
        };
        if etg.lines.iter().any(|o| o.line == line && o.dir == dir) {
            return Err(Error::BadInput {
                id: self.lines[line.0].id.clone(),
                reason: format!("line recorded twice on edge {} with direction {}", e, dir),
            });
        }

        etg.lines.push(LineOcc { line, dir });
        Ok(())
    }

    /// Writes a ribbon ordering onto one geom. `ordering` must be a
    /// permutation of `0..cardinality`.
    pub fn set_etg_ordering(
        &mut self,
        e: EdgeId,
        geom: usize,
        ordering: Vec<usize>,
    ) -> Result<(), Error> {
        let etg = self.graph[e.0].geoms.get_mut(geom).ok_or(Error::BadInput {
            id: e.to_string(),
            reason: format!("edge has no geom {}", geom),
        })?;

        let card = etg.lines.len();
        let mut seen = vec![false; card];
        for &p in &ordering {
            if p >= card || seen[p] {
                return Err(Error::BadInput {
                    id: e.to_string(),
                    reason: format!("ordering is not a permutation of 0..{}", card),
                });
            }
            seen[p] = true;
        }
        if ordering.len() != card {
            return Err(Error::BadInput {
                id: e.to_string(),
                reason: format!("ordering has {} slots for {} lines", ordering.len(), card),
            });
        }

        etg.ordering = ordering;
        Ok(())
    }

    /// Replaces the reference geometry of every geom on an edge with a
    /// drawn polyline oriented `from -> to`.
    pub fn replace_edge_geom(&mut self, e: EdgeId, geom: Polyline) {
        let (_, to) = self.edge_endpoints(e);
        for g in &mut self.graph[e.0].geoms {
            g.geom = geom.clone();
            g.geom_dir = to;
        }
    }

    // --- Occurring connections

    /// Registers a witness that `line` continues between `from_e` and
    /// `to_e` at their shared node.
    pub fn conn_occurs(&mut self, line: LineId, from_e: EdgeId, to_e: EdgeId) {
        let Some(n) = self.shared_node(from_e, to_e) else {
            return;
        };
        let conns = self.graph[n.0].occ_conns.entry(line).or_default();
        if !conns.contains(&(from_e, to_e)) {
            conns.push((from_e, to_e));
        }
    }

    /// `true` if a continuation of `line` between `a` and `b` (either
    /// orientation) was registered at `n`.
    pub fn is_conn_occuring(&self, n: NodeId, line: LineId, a: EdgeId, b: EdgeId) -> bool {
        self.graph[n.0]
            .occ_conns
            .get(&line)
            .map(|v| v.contains(&(a, b)) || v.contains(&(b, a)))
            .unwrap_or(false)
    }

    fn shared_node(&self, a: EdgeId, b: EdgeId) -> Option<NodeId> {
        let (af, at) = self.edge_endpoints(a);
        let (bf, bt) = self.edge_endpoints(b);
        if af == bf || af == bt {
            Some(af)
        } else if at == bf || at == bt {
            Some(at)
        } else {
            None
        }
    }

    /// Rewrites every connection witness at `n` that references `old` to
    /// reference `new`.
    fn replace_edge_in_connections(&mut self, n: NodeId, old: EdgeId, new: EdgeId) {
        for conns in self.graph[n.0].occ_conns.values_mut() {
            for c in conns.iter_mut() {
                if c.0 == old {
                    c.0 = new;
                }
                if c.1 == old {
                    c.1 = new;
                }
            }
        }
    }

    // --- Geometry simplification

    /// Merges an edge's geometry variants: geoms covered by a longer geom
    /// within `eps` are folded into it, then the survivors are averaged
    /// into a single geom.
    pub fn simplify_edges(&mut self, eps: f64) {
        let edges: Vec<EdgeId> = self.edge_ids().collect();
        for e in edges {
            self.combine_included_geoms(e, eps);
            self.average_combine_geom(e);

            if LOW_USE_FILTER {
                let avg = {
                    let geoms = &self.graph[e.0].geoms;
                    geoms.iter().map(|g| g.cardinality()).sum::<usize>() as f64
                        / geoms.len() as f64
                };
                self.graph[e.0]
                    .geoms
                    .retain(|g| g.cardinality() as f64 >= avg * 0.1);
            }
        }
    }

    fn combine_included_geoms(&mut self, e: EdgeId, eps: f64) {
        let geoms = &mut self.graph[e.0].geoms;
        if geoms.len() < 2 {
            return;
        }

        let mut i = 0;
        while i < geoms.len() {
            let mut absorbed = false;
            for j in 0..geoms.len() {
                if i == j {
                    continue;
                }
                let covers = geoms[j].geom.length() > geoms[i].geom.length()
                    && geoms[j].geom.contains(&geoms[i].geom, eps)
                    && !geoms[i].geom.contains(&geoms[j].geom, eps);
                if covers {
                    let moved = geoms[i].lines.clone();
                    for occ in moved {
                        if !geoms[j].lines.contains(&occ) {
                            geoms[j].lines.push(occ);
                        }
                    }
                    absorbed = true;
                    break;
                }
            }
            if absorbed {
                geoms.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn average_combine_geom(&mut self, e: EdgeId) {
        let geoms = &mut self.graph[e.0].geoms;
        if geoms.len() < 2 {
            return;
        }

        let samples = geoms
            .iter()
            .map(|g| g.geom.points().len())
            .max()
            .unwrap_or(2);
        let refs: Vec<&Polyline> = geoms.iter().map(|g| &g.geom).collect();
        let avg = Polyline::average(&refs, samples);

        let geom_dir = geoms[0].geom_dir;
        let mut combined = EdgeTripGeom::new(avg, geom_dir);
        for g in geoms.iter() {
            for occ in &g.lines {
                if !combined.lines.contains(occ) {
                    combined.lines.push(*occ);
                }
            }
        }

        geoms.clear();
        geoms.push(combined);
    }

    // --- Degree-2 contraction

    /// Contracts every non-stop node with exactly two incident edges whose
    /// line sets agree (matched up to direction) into a single edge with
    /// the concatenated polyline. Connection witnesses at the far
    /// endpoints are rewritten to the merged edge.
    pub fn contract_degree2_nodes(&mut self) {
        loop {
            let candidate = self.node_ids().find(|&n| self.contractible(n));
            let Some(n) = candidate else { break };

            let edges = self.incident_edges(n);
            let (e1, e2) = (edges[0], edges[1]);
            let a = self.other_node(e1, n);
            let b = self.other_node(e2, n);

            let geom = self.chain_geom(e1, e2, n);
            let lines = self.merged_line_occs(e1, n);

            let _ = self.graph.remove_edge(e1.0);
            let _ = self.graph.remove_edge(e2.0);
            let _ = self.graph.remove_node(n.0);

            let merged = EdgeId(self.graph.add_edge(a.0, b.0, LineEdge::default()));
            let mut etg = EdgeTripGeom::new(geom, b);
            etg.lines = lines;
            self.graph[merged.0].geoms.push(etg);

            self.replace_edge_in_connections(a, e1, merged);
            self.replace_edge_in_connections(b, e2, merged);
        }
    }

    fn contractible(&self, n: NodeId) -> bool {
        !self.node(n).is_stop() && self.deg2_sets_agree(n)
    }

    /// `true` if `n` has exactly two incident, non-parallel edges whose
    /// line sets agree when travelling through `n` (matched up to
    /// direction). Parallel edges are excluded: merging them would
    /// collapse a cycle into a self-loop.
    pub(crate) fn deg2_sets_agree(&self, n: NodeId) -> bool {
        let edges = self.incident_edges(n);
        edges.len() == 2
            && edges[0] != edges[1]
            && self.other_node(edges[0], n) != self.other_node(edges[1], n)
            && self.travel_line_set(edges[0], n, true) == self.travel_line_set(edges[1], n, false)
    }

    /// The line set of an edge as seen when travelling through `n`:
    /// `arriving` edges are oriented toward `n`, departing ones away.
    /// Directions are normalized to the travel orientation so that sets
    /// from both sides compare equal exactly when every line continues.
    fn travel_line_set(&self, e: EdgeId, n: NodeId, arriving: bool) -> Vec<(LineId, i8)> {
        let (_, to) = self.edge_endpoints(e);
        let toward_n_is_forward = to == n;

        let mut set: Vec<(LineId, i8)> = Vec::new();
        for g in self.edge(e).geoms() {
            for occ in g.lines() {
                let rel = match occ.dir {
                    LineDir::Undirected => 0,
                    LineDir::Forward => {
                        if toward_n_is_forward == arriving {
                            1
                        } else {
                            -1
                        }
                    }
                    LineDir::Backward => {
                        if toward_n_is_forward == arriving {
                            -1
                        } else {
                            1
                        }
                    }
                };
                if !set.contains(&(occ.line, rel)) {
                    set.push((occ.line, rel));
                }
            }
        }
        set.sort();
        set
    }

    /// Polyline of the chain `a - e1 - n - e2 - b`, oriented `a -> b`.
    fn chain_geom(&self, e1: EdgeId, e2: EdgeId, n: NodeId) -> Polyline {
        let part = |e: EdgeId, toward_n: bool| -> Polyline {
            let (_, to) = self.edge_endpoints(e);
            let g = match self.edge(e).geoms().first() {
                Some(g) => g.geom().clone(),
                None => {
                    let (f, t) = self.edge_endpoints(e);
                    Polyline::straight(self.node(f).pos, self.node(t).pos)
                }
            };
            // canonical geoms point toward `to`
            let points_toward_n = to == n;
            if points_toward_n == toward_n {
                g
            } else {
                g.reversed()
            }
        };

        let mut geom = part(e1, true);
        geom.extend_with(&part(e2, false));
        geom
    }

    /// Line occurrences for the merged edge `a -> b`, directions remapped
    /// to the new orientation. Both chain edges agree on the set, so the
    /// first edge is authoritative.
    fn merged_line_occs(&self, e1: EdgeId, n: NodeId) -> Vec<LineOcc> {
        let (_, to1) = self.edge_endpoints(e1);
        let toward_n_on_e1 = |d: LineDir| match d {
            LineDir::Undirected => None,
            LineDir::Forward => Some(to1 == n),
            LineDir::Backward => Some(to1 != n),
        };

        let mut out: Vec<LineOcc> = Vec::new();
        for g in self.edge(e1).geoms() {
            for occ in g.lines() {
                let dir = match toward_n_on_e1(occ.dir) {
                    // travelling a -> n continues toward b
                    Some(true) => LineDir::Forward,
                    Some(false) => LineDir::Backward,
                    None => LineDir::Undirected,
                };
                let mapped = LineOcc {
                    line: occ.line,
                    dir,
                };
                if !out.contains(&mapped) {
                    out.push(mapped);
                }
            }
        }
        out
    }

    // --- Widths

    pub fn width(&self, _e: EdgeId) -> f64 {
        self.def_line_width
    }

    pub fn spacing(&self, _e: EdgeId) -> f64 {
        self.def_line_spacing
    }

    /// Render width of the full bundle on an edge.
    pub fn total_width(&self, e: EdgeId) -> f64 {
        let card = self.edge(e).cardinality();
        if card == 0 {
            return 0.0;
        }
        card as f64 * self.width(e) + (card - 1) as f64 * self.spacing(e)
    }

    // --- Node fronts

    /// Outward direction of an edge at one of its endpoints, from the
    /// reference geometry.
    pub fn edge_dir_at(&self, e: EdgeId, n: NodeId) -> f64 {
        let (_, to) = self.edge_endpoints(e);
        let g = match self.edge(e).geoms().first() {
            Some(g) => g.geom().clone(),
            None => {
                let (f, t) = self.edge_endpoints(e);
                Polyline::straight(self.node(f).pos, self.node(t).pos)
            }
        };
        // canonical geoms point toward `to`
        if to == n {
            let len = g.length();
            g.tangent_at(len) + std::f64::consts::PI
        } else {
            g.tangent_at(0.0)
        }
    }

    /// Rebuilds every node's fronts by clustering incident edges on their
    /// arrival tangents. The front arc is a circle segment whose radius
    /// follows the widest bundle in the front.
    pub fn build_node_fronts(&mut self) {
        let nodes: Vec<NodeId> = self.node_ids().collect();
        for n in nodes {
            let fronts = self.fronts_for(n);
            self.graph[n.0].fronts = fronts;
        }
    }

    fn fronts_for(&self, n: NodeId) -> Vec<NodeFront> {
        let edges = self.incident_edges(n);
        if edges.is_empty() {
            return Vec::new();
        }

        let mut angled: Vec<(f64, EdgeId)> = edges
            .iter()
            .map(|&e| (normalize_angle(self.edge_dir_at(e, n)), e))
            .collect();
        angled.sort_by(|a, b| a.0.total_cmp(&b.0));

        // split the circle at the widest angular gap, then cluster
        // consecutive edges closer than the threshold
        let k = angled.len();
        let mut start = 0;
        if k > 1 {
            let mut widest = 0.0;
            for i in 0..k {
                let next = (i + 1) % k;
                let mut gap = angled[next].0 - angled[i].0;
                if gap < 0.0 {
                    gap += std::f64::consts::TAU;
                }
                if gap > widest {
                    widest = gap;
                    start = next;
                }
            }
        }

        let mut groups: Vec<Vec<(f64, EdgeId)>> = Vec::new();
        for i in 0..k {
            let cur = angled[(start + i) % k];
            match groups.last_mut() {
                Some(g) => {
                    let prev = g.last().map(|x| x.0).unwrap_or(cur.0);
                    let mut gap = cur.0 - prev;
                    if gap < 0.0 {
                        gap += std::f64::consts::TAU;
                    }
                    if gap <= FRONT_CLUSTER_ANGLE {
                        g.push(cur);
                    } else {
                        groups.push(vec![cur]);
                    }
                }
                None => groups.push(vec![cur]),
            }
        }

        let pos = self.node(n).pos;
        groups
            .into_iter()
            .map(|group| {
                let width = group
                    .iter()
                    .map(|&(_, e)| self.total_width(e))
                    .fold(0.0, f64::max);
                let radius = (width / 2.0).max(self.def_line_width) + self.def_line_spacing;

                let lo = group.first().map(|x| x.0).unwrap_or(0.0);
                let hi_raw = group.last().map(|x| x.0).unwrap_or(0.0);
                let mut span = hi_raw - lo;
                if span < 0.0 {
                    span += std::f64::consts::TAU;
                }
                // pad by the half-width each outermost bundle occupies
                let pad = (width / 2.0 / radius).atan().max(0.2);
                let (lo, span) = (lo - pad, span + 2.0 * pad);

                let mut arc = Vec::with_capacity(FRONT_ARC_SAMPLES);
                for i in 0..FRONT_ARC_SAMPLES {
                    let t = lo + span * i as f64 / (FRONT_ARC_SAMPLES - 1) as f64;
                    arc.push(Point::new(
                        pos.x + radius * t.cos(),
                        pos.y + radius * t.sin(),
                    ));
                }

                NodeFront {
                    edges: group.into_iter().map(|(_, e)| e).collect(),
                    geom: Polyline::new(arc),
                }
            })
            .collect()
    }

    /// The point on a front arc where a line's ribbon crosses it. Callers
    /// must have verified that the line occurs on one of the front's
    /// edges.
    pub fn line_pos_on_front(&self, n: NodeId, front: usize, line: LineId) -> Point {
        let nf = &self.node(n).fronts()[front];
        for &e in &nf.edges {
            for g in self.edge(e).geoms() {
                if let Some(slot) = g.slot_of(line) {
                    let w = self.width(e);
                    let s = self.spacing(e);
                    let p = (w + s) * (g.cardinality() - 1 - slot) as f64 + w / 2.0;
                    let frac = (p / nf.geom.length()).clamp(0.0, 1.0);
                    return nf.geom.point_at(frac);
                }
            }
        }
        panic!("[BUG] line {} does not occur on front {} of node {}", line, front, n);
    }

    // --- Meta nodes

    /// `true` if some line ends at `n`: it occurs on exactly one incident
    /// edge.
    pub fn is_terminus(&self, n: NodeId) -> bool {
        let edges = self.incident_edges(n);
        for &e in &edges {
            for g in self.edge(e).geoms() {
                for occ in g.lines() {
                    let elsewhere = edges
                        .iter()
                        .any(|&o| o != e && self.edge(o).has_line(occ.line));
                    if !elsewhere {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// `true` if every pair of nodes in `s` shares an edge.
    pub fn is_clique(&self, s: &[NodeId]) -> bool {
        for (i, &a) in s.iter().enumerate() {
            for &b in &s[i + 1..] {
                let connected = self
                    .incident_edges(a)
                    .iter()
                    .any(|&e| self.other_node(e, a) == b);
                if !connected {
                    return false;
                }
            }
        }
        true
    }

    /// Merges cliques of terminus nodes lying within `d` of each other
    /// into single meta nodes; the merged node's front geometry is the
    /// buffered convex hull of the constituents' fronts.
    pub fn create_meta_nodes(&mut self, d: f64) {
        loop {
            let Some(clique) = self.next_meta_node_cand(d) else {
                break;
            };
            self.merge_clique(&clique, d);
        }
    }

    fn next_meta_node_cand(&self, d: f64) -> Option<Vec<NodeId>> {
        for n in self.node_ids() {
            if !self.is_terminus(n) {
                continue;
            }

            let mut clique = vec![n];
            for &e in &self.incident_edges(n) {
                let m = self.other_node(e, n);
                if !self.is_terminus(m) {
                    continue;
                }
                if self.node(n).pos.distance(&self.node(m).pos) > d {
                    continue;
                }
                let mut probe = clique.clone();
                probe.push(m);
                if self.is_clique(&probe) {
                    clique.push(m);
                }
            }

            if clique.len() >= 2 {
                return Some(clique);
            }
        }
        None
    }

    fn merge_clique(&mut self, clique: &[NodeId], d: f64) {
        let cx = clique.iter().map(|&n| self.node(n).pos.x).sum::<f64>() / clique.len() as f64;
        let cy = clique.iter().map(|&n| self.node(n).pos.y).sum::<f64>() / clique.len() as f64;

        let mut stops = Vec::new();
        let mut front_points = Vec::new();
        for &n in clique {
            stops.extend(self.node(n).stops.iter().cloned());
            for f in self.node(n).fronts() {
                front_points.extend_from_slice(f.geom.points());
            }
            front_points.push(self.node(n).pos);
        }

        let meta = NodeId(self.graph.add_node(LineNode {
            pos: Point::new(cx, cy),
            stops,
            ..Default::default()
        }));

        // re-point external edges, drop clique-internal ones
        for &n in clique {
            for e in self.incident_edges(n) {
                let far = self.other_node(e, n);
                if clique.contains(&far) {
                    let _ = self.graph.remove_edge(e.0);
                    continue;
                }

                let payload = match self.graph.remove_edge(e.0) {
                    Some(p) => p,
                    None => continue,
                };
                let new_e = EdgeId(self.graph.add_edge(far.0, meta.0, payload));
                self.retarget_geoms(new_e, n, meta);
                self.replace_edge_in_connections(far, e, new_e);
            }
        }
        for &n in clique {
            let _ = self.graph.remove_node(n.0);
        }

        let hull = buffered_hull(&front_points, d);
        if hull.len() >= 2 {
            let mut closed = hull;
            closed.push(closed[0]);
            let edges: SmallVec<[EdgeId; 4]> = self.incident_edges(meta).into_iter().collect();
            self.graph[meta.0].fronts = vec![NodeFront {
                edges,
                geom: Polyline::new(closed),
            }];
        }
    }

    /// After re-pointing an edge endpoint, geom direction markers that
    /// named the old endpoint must name the new one.
    fn retarget_geoms(&mut self, e: EdgeId, old: NodeId, new: NodeId) {
        let (_, to) = self.edge_endpoints(e);
        for g in &mut self.graph[e.0].geoms {
            if g.geom_dir == old {
                g.geom_dir = new;
            }
            if g.geom_dir != to {
                g.geom.reverse();
                g.geom_dir = to;
            }
        }
    }

    // --- Consistency

    /// Validates the load-time invariants: no duplicated (line, direction)
    /// on a geom, no front without edges.
    pub fn check_consistency(&self) -> Result<(), Error> {
        for e in self.edge_ids() {
            for g in self.edge(e).geoms() {
                for (i, a) in g.lines().iter().enumerate() {
                    for b in &g.lines()[i + 1..] {
                        if a == b {
                            return Err(Error::BadInput {
                                id: self.line(a.line).id.clone(),
                                reason: format!("line duplicated on edge {}", e),
                            });
                        }
                    }
                }
            }
        }

        for n in self.node_ids() {
            for f in self.node(n).fronts() {
                if f.edges.is_empty() {
                    return Err(Error::BadInput {
                        id: n.to_string(),
                        reason: "node front without edges".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn normalize_angle(a: f64) -> f64 {
    let mut a = a % std::f64::consts::TAU;
    if a < 0.0 {
        a += std::f64::consts::TAU;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_line_graph() -> (LineGraph, LineId, LineId) {
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", WebColor::default());
        let l2 = g.add_line("u2", "U2", WebColor::default());
        (g, l1, l2)
    }

    #[test]
    fn self_loop_is_rejected_silently() {
        let (mut g, _, _) = two_line_graph();
        let a = g.add_node(Point::zero());

        assert!(g.add_edge(a, a).is_none());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn line_interning_is_by_identity() {
        let (mut g, l1, _) = two_line_graph();
        let again = g.add_line("u1", "U1 duplicate", WebColor::default());

        assert_eq!(l1, again);
        assert_eq!(g.line_count(), 2);
    }

    #[test]
    fn duplicate_line_on_edge_is_bad_input() {
        let (mut g, l1, _) = two_line_graph();
        let a = g.add_node(Point::zero());
        let b = g.add_node(Point::new(100.0, 0.0));
        let e = g.add_edge(a, b).unwrap();

        g.add_line_on_edge(e, l1, LineDir::Forward).unwrap();
        let err = g.add_line_on_edge(e, l1, LineDir::Forward);
        assert!(matches!(err, Err(Error::BadInput { .. })));

        // a second direction is a distinct occurrence
        g.add_line_on_edge(e, l1, LineDir::Backward).unwrap();
    }

    #[test]
    fn total_width_follows_cardinality() {
        let (mut g, l1, l2) = two_line_graph();
        let a = g.add_node(Point::zero());
        let b = g.add_node(Point::new(100.0, 0.0));
        let e = g.add_edge(a, b).unwrap();

        g.add_line_on_edge(e, l1, LineDir::Undirected).unwrap();
        g.add_line_on_edge(e, l2, LineDir::Undirected).unwrap();

        assert_eq!(g.total_width(e), 2.0 * 20.0 + 10.0);
    }

    #[test]
    fn contracts_matching_degree2_chain() {
        let (mut g, l1, l2) = two_line_graph();
        let a = g.add_node(Point::zero());
        let m = g.add_node(Point::new(100.0, 0.0));
        let b = g.add_node(Point::new(200.0, 0.0));
        let e1 = g.add_edge(a, m).unwrap();
        let e2 = g.add_edge(m, b).unwrap();

        for e in [e1, e2] {
            g.add_line_on_edge(e, l1, LineDir::Forward).unwrap();
            g.add_line_on_edge(e, l2, LineDir::Undirected).unwrap();
        }

        g.contract_degree2_nodes();

        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);

        let e = g.edge_ids().next().unwrap();
        let etg = &g.edge(e).geoms()[0];
        assert_eq!(etg.cardinality(), 2);
        assert_eq!(*etg.geom().first(), Point::zero());
        assert_eq!(*etg.geom().last(), Point::new(200.0, 0.0));
    }

    #[test]
    fn stop_nodes_are_not_contracted() {
        let (mut g, l1, _) = two_line_graph();
        let a = g.add_node(Point::zero());
        let m = g.add_stop_node(
            Point::new(100.0, 0.0),
            Stop {
                id: "s1".into(),
                name: "Mid".into(),
                pos: Point::new(100.0, 0.0),
            },
        );
        let b = g.add_node(Point::new(200.0, 0.0));
        let e1 = g.add_edge(a, m).unwrap();
        let e2 = g.add_edge(m, b).unwrap();
        g.add_line_on_edge(e1, l1, LineDir::Undirected).unwrap();
        g.add_line_on_edge(e2, l1, LineDir::Undirected).unwrap();

        g.contract_degree2_nodes();
        assert_eq!(g.node_count(), 3);
    }

    #[test]
    fn mismatched_line_sets_are_not_contracted() {
        let (mut g, l1, l2) = two_line_graph();
        let a = g.add_node(Point::zero());
        let m = g.add_node(Point::new(100.0, 0.0));
        let b = g.add_node(Point::new(200.0, 0.0));
        let e1 = g.add_edge(a, m).unwrap();
        let e2 = g.add_edge(m, b).unwrap();
        g.add_line_on_edge(e1, l1, LineDir::Undirected).unwrap();
        g.add_line_on_edge(e2, l2, LineDir::Undirected).unwrap();

        g.contract_degree2_nodes();
        assert_eq!(g.node_count(), 3);
    }

    #[test]
    fn contraction_rewrites_connection_witnesses() {
        let (mut g, l1, _) = two_line_graph();
        let x = g.add_node(Point::new(-100.0, 0.0));
        // a carries a stop so only m is contracted
        let a = g.add_stop_node(
            Point::zero(),
            Stop {
                id: "s0".into(),
                name: "A".into(),
                pos: Point::zero(),
            },
        );
        let m = g.add_node(Point::new(100.0, 0.0));
        let b = g.add_node(Point::new(200.0, 0.0));
        let e0 = g.add_edge(x, a).unwrap();
        let e1 = g.add_edge(a, m).unwrap();
        let e2 = g.add_edge(m, b).unwrap();

        for e in [e0, e1, e2] {
            g.add_line_on_edge(e, l1, LineDir::Undirected).unwrap();
        }
        g.conn_occurs(l1, e0, e1);

        g.contract_degree2_nodes();

        // a kept its witness, now naming the merged edge
        let merged = g
            .incident_edges(a)
            .into_iter()
            .find(|&e| e != e0)
            .unwrap();
        assert!(g.is_conn_occuring(a, l1, e0, merged));
    }

    #[test]
    fn fronts_cluster_by_direction() {
        let (mut g, l1, _) = two_line_graph();
        let c = g.add_node(Point::zero());
        let east1 = g.add_node(Point::new(200.0, 10.0));
        let east2 = g.add_node(Point::new(200.0, -10.0));
        let west = g.add_node(Point::new(-200.0, 0.0));

        for n in [east1, east2, west] {
            let e = g.add_edge(c, n).unwrap();
            g.add_line_on_edge(e, l1, LineDir::Undirected).unwrap();
        }

        g.build_node_fronts();

        // two eastbound edges share a front, the westbound one is alone
        let fronts = g.node(c).fronts();
        assert_eq!(fronts.len(), 2);
        let sizes: Vec<usize> = {
            let mut v: Vec<usize> = fronts.iter().map(|f| f.edges.len()).collect();
            v.sort();
            v
        };
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn terminus_and_clique() {
        let (mut g, l1, l2) = two_line_graph();
        let a = g.add_node(Point::zero());
        let b = g.add_node(Point::new(50.0, 0.0));
        let c = g.add_node(Point::new(500.0, 0.0));
        let ab = g.add_edge(a, b).unwrap();
        let bc = g.add_edge(b, c).unwrap();

        g.add_line_on_edge(ab, l1, LineDir::Undirected).unwrap();
        g.add_line_on_edge(bc, l1, LineDir::Undirected).unwrap();
        g.add_line_on_edge(bc, l2, LineDir::Undirected).unwrap();

        // l2 ends at b and c; l1 ends at a
        assert!(g.is_terminus(a));
        assert!(g.is_terminus(b));
        assert!(g.is_terminus(c));
        assert!(g.is_clique(&[a, b]));
        assert!(!g.is_clique(&[a, c]));
    }

    #[test]
    fn meta_node_merge() {
        let (mut g, l1, l2) = two_line_graph();
        let a = g.add_node(Point::zero());
        let b = g.add_node(Point::new(30.0, 0.0));
        let far = g.add_node(Point::new(500.0, 0.0));
        let ab = g.add_edge(a, b).unwrap();
        let bfar = g.add_edge(b, far).unwrap();

        g.add_line_on_edge(ab, l1, LineDir::Undirected).unwrap();
        g.add_line_on_edge(bfar, l2, LineDir::Undirected).unwrap();
        g.build_node_fronts();

        g.create_meta_nodes(50.0);

        // a and b merged; far keeps a single edge to the meta node
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.degree(far), 1);
        let meta = g.node_ids().find(|&n| n != far).unwrap();
        assert!(!g.node(meta).fronts().is_empty());
    }

    #[test]
    fn consistency_flags_empty_front() {
        let (mut g, _, _) = two_line_graph();
        let n = g.add_node(Point::zero());
        g.graph[n.0].fronts.push(NodeFront {
            edges: SmallVec::new(),
            geom: Polyline::straight(Point::zero(), Point::new(1.0, 0.0)),
        });

        assert!(matches!(
            g.check_consistency(),
            Err(Error::BadInput { .. })
        ));
    }
}
