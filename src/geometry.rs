//! Planar primitives used by the line graph and the octilinearizer.
//!
//! Coordinate system: whatever the upstream feed lowering produced, usually
//! a metric projection. All operations are pure.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Returns the distance from this `Point` to a specified point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Angle of the vector from this point to `other`, in `(-pi, pi]`.
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Corners and centers in a rectangle.
///
/// ```svgbob
///           minX    midX    maxX
///   (origin) *----------*----------*
///            |                     |
///            |                     |
///            * (center) *          * midY
///            |                     |
///            |                     |
///            *----------*----------* maxY
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// The smallest rectangle containing every point, or `None` for an
    /// empty slice.
    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(Self::new(
            Point::new(min_x, min_y),
            Size::new(max_x - min_x, max_y - min_y),
        ))
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    /// Returns a rectangle that is smaller or larger than the source
    /// rectangle, with the same center point. Negative values grow the
    /// rectangle.
    pub fn inset_by(&self, dx: f64, dy: f64) -> Self {
        let origin = Point::new(self.origin.x + dx, self.origin.y + dy);
        let size = Size::new(
            (self.size.width - (dx * 2.0)).max(0.0),
            (self.size.height - (dy * 2.0)).max(0.0),
        );

        Self::new(origin, size)
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.min_x()
            && point.x <= self.max_x()
            && point.y >= self.min_y()
            && point.y <= self.max_y()
    }
}

/// A piecewise-linear curve with at least two anchor points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// The straight segment between two points.
    pub fn straight(from: Point, to: Point) -> Self {
        Self {
            points: vec![from, to],
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn first(&self) -> &Point {
        match self.points.first() {
            Some(p) => p,
            None => panic!("[BUG] empty polyline"),
        }
    }

    pub fn last(&self) -> &Point {
        match self.points.last() {
            Some(p) => p,
            None => panic!("[BUG] empty polyline"),
        }
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }

    /// The point at `frac * length()` along the curve, `frac` clamped to
    /// `[0, 1]`.
    pub fn point_at(&self, frac: f64) -> Point {
        let frac = frac.clamp(0.0, 1.0);
        let target = self.length() * frac;
        self.point_at_dist(target)
    }

    fn point_at_dist(&self, dist: f64) -> Point {
        let mut walked = 0.0;

        for w in self.points.windows(2) {
            let seg = w[0].distance(&w[1]);
            if walked + seg >= dist && seg > 0.0 {
                let t = (dist - walked) / seg;
                return Point::new(
                    w[0].x + (w[1].x - w[0].x) * t,
                    w[0].y + (w[1].y - w[0].y) * t,
                );
            }
            walked += seg;
        }

        *self.last()
    }

    /// Tangent angle at distance `dist` along the curve, in `(-pi, pi]`.
    pub fn tangent_at(&self, dist: f64) -> f64 {
        let mut walked = 0.0;

        for w in self.points.windows(2) {
            let seg = w[0].distance(&w[1]);
            if walked + seg >= dist && seg > 0.0 {
                return w[0].angle_to(&w[1]);
            }
            walked += seg;
        }

        let n = self.points.len();
        self.points[n - 2].angle_to(&self.points[n - 1])
    }

    /// Pointwise average of several curves, sampled at `samples` equal
    /// fractions. Input curves must be consistently oriented.
    pub fn average(lines: &[&Polyline], samples: usize) -> Polyline {
        let samples = samples.max(2);
        let mut points = Vec::with_capacity(samples);

        for i in 0..samples {
            let frac = i as f64 / (samples - 1) as f64;
            let (mut x, mut y) = (0.0, 0.0);
            for l in lines {
                let p = l.point_at(frac);
                x += p.x;
                y += p.y;
            }
            points.push(Point::new(x / lines.len() as f64, y / lines.len() as f64));
        }

        Polyline::new(points)
    }

    /// Smallest distance from `p` to any segment of the curve.
    pub fn dist_to(&self, p: &Point) -> f64 {
        self.points
            .windows(2)
            .map(|w| dist_point_segment(p, &w[0], &w[1]))
            .fold(f64::INFINITY, f64::min)
    }

    /// Arc length of the point on the curve closest to `p`.
    pub fn closest_dist_along(&self, p: &Point) -> f64 {
        let mut best = (f64::INFINITY, 0.0);
        let mut walked = 0.0;

        for w in self.points.windows(2) {
            let seg = w[0].distance(&w[1]);
            let (d, t) = project_point_segment(p, &w[0], &w[1]);
            if d < best.0 {
                best = (d, walked + t * seg);
            }
            walked += seg;
        }

        best.1
    }

    /// `true` if every anchor of `other` lies within `eps` of this curve
    /// (this curve covers the other).
    pub fn contains(&self, other: &Polyline, eps: f64) -> bool {
        other.points.iter().all(|p| self.dist_to(p) <= eps)
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub fn reversed(&self) -> Polyline {
        let mut points = self.points.clone();
        points.reverse();
        Polyline::new(points)
    }

    /// Append `other` to the end of this curve. A duplicated joint anchor
    /// is dropped.
    pub fn extend_with(&mut self, other: &Polyline) {
        let skip_joint = self.points.last() == other.points.first();
        let tail = if skip_joint { 1 } else { 0 };
        self.points.extend_from_slice(&other.points[tail..]);
    }
}

/// Convex hull by Andrew's monotone chain, counter-clockwise, without the
/// repeated first point.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: &Point, a: &Point, b: &Point| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };
    let chain = |iter: &mut dyn Iterator<Item = &Point>| {
        let mut c: Vec<Point> = Vec::new();
        for p in iter {
            while c.len() >= 2 && cross(&c[c.len() - 2], &c[c.len() - 1], p) <= 0.0 {
                c.pop();
            }
            c.push(*p);
        }
        // the chain's last point starts the other chain
        c.pop();
        c
    };

    let mut hull = chain(&mut pts.iter());
    hull.extend(chain(&mut pts.iter().rev()));
    hull
}

/// Convex hull outset by `d`: every input point is replaced by the eight
/// compass offsets at radius `d` before hulling. An octagonal
/// approximation of the true buffered hull, which is all the node front
/// construction needs.
pub fn buffered_hull(points: &[Point], d: f64) -> Vec<Point> {
    let mut outset = Vec::with_capacity(points.len() * 8);
    let diag = d * std::f64::consts::FRAC_1_SQRT_2;

    for p in points {
        for (dx, dy) in [
            (0.0, d),
            (diag, diag),
            (d, 0.0),
            (diag, -diag),
            (0.0, -d),
            (-diag, -diag),
            (-d, 0.0),
            (-diag, diag),
        ] {
            outset.push(Point::new(p.x + dx, p.y + dy));
        }
    }

    convex_hull(&outset)
}

/// `true` if `p` lies inside or on the boundary of the polygon (even-odd
/// rule, boundary checked explicitly).
pub fn polygon_contains(polygon: &[Point], p: &Point) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    for i in 0..n {
        let (a, b) = (&polygon[i], &polygon[(i + 1) % n]);
        if dist_point_segment(p, a, b) < 1e-9 {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.y > p.y) != (b.y > p.y)
            && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// `true` if segment `a1-a2` intersects segment `b1-b2`, endpoints
/// included.
pub fn segments_intersect(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> bool {
    let orient = |p: &Point, q: &Point, r: &Point| {
        let v = (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
        if v.abs() < 1e-12 {
            0
        } else if v > 0.0 {
            1
        } else {
            -1
        }
    };
    let on_segment = |p: &Point, q: &Point, r: &Point| {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    };

    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(a1, a2, b1))
        || (o2 == 0 && on_segment(a1, a2, b2))
        || (o3 == 0 && on_segment(b1, b2, a1))
        || (o4 == 0 && on_segment(b1, b2, a2))
}

/// `true` if the segment crosses into the polygon: an endpoint inside, or
/// any boundary edge intersected.
pub fn segment_crosses_polygon(a: &Point, b: &Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    if polygon_contains(polygon, a) || polygon_contains(polygon, b) {
        return true;
    }

    let n = polygon.len();
    (0..n).any(|i| segments_intersect(a, b, &polygon[i], &polygon[(i + 1) % n]))
}

fn dist_point_segment(p: &Point, a: &Point, b: &Point) -> f64 {
    project_point_segment(p, a, b).0
}

/// Distance to the segment and the clamped projection parameter.
fn project_point_segment(p: &Point, a: &Point, b: &Point) -> (f64, f64) {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (p.distance(a), 0.0);
    }

    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    let d = p.distance(&Point::new(a.x + t * dx, a.y + t * dy));
    (d, t)
}
