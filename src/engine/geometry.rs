// Geometry kernel: pure functions over rectangles, lines, points, circles.
//
// Rectangles are (x, y, width, height) in y-down screen space. Negative
// dimensions are legal input and are normalised with `Rect::abs()` before
// most tests. Angles are radians; a positive angle rotates counter-clockwise
// in the rotated-coordinate convention (clockwise on screen).

use glam::Vec2;
use std::f32::consts::{PI, TAU};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Tolerance for segment endpoint inclusion. Absorbs float error where two
/// nav-mesh borders meet.
pub const LINE_TOLERANCE: f32 = 0.03;
/// Below this a length or determinant is treated as zero.
pub const EPSILON: f32 = 1e-5;
/// Minimum overlap for two rectangles to count as sharing area (or an edge).
pub const OVERLAP_EPSILON: f32 = 1e-3;

// ============================================================================
// RECT / LINE
// ============================================================================

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning two opposite corners, in any order.
    pub fn from_corners(p: Vec2, q: Vec2) -> Self {
        let min = p.min(q);
        let max = p.max(q);
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        Self::new(center.x - size.x * 0.5, center.y - size.y * 0.5, size.x, size.y)
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.right(), self.bottom())
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn area(&self) -> f32 {
        (self.width * self.height).abs()
    }

    /// Same rectangle with non-negative width and height.
    pub fn abs(&self) -> Rect {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Rect::new(x, y, width, height)
    }

    /// Closed containment: points on the border are inside.
    pub fn contains_point(&self, p: Vec2) -> bool {
        let r = self.abs();
        p.x >= r.x && p.x <= r.right() && p.y >= r.y && p.y <= r.bottom()
    }

    pub fn translate(&self, d: Vec2) -> Rect {
        Rect::new(self.x + d.x, self.y + d.y, self.width, self.height)
    }

    /// Grow (or shrink, for negative `amount`) every side by `amount`.
    pub fn expand(&self, amount: f32) -> Rect {
        let r = self.abs();
        Rect::new(
            r.x - amount,
            r.y - amount,
            (r.width + 2.0 * amount).max(0.0),
            (r.height + 2.0 * amount).max(0.0),
        )
    }

    /// True when the rectangle has no area.
    pub fn is_degenerate(&self) -> bool {
        self.width.abs() <= EPSILON || self.height.abs() <= EPSILON
    }
}

/// Line segment. Constructed with the leftmost endpoint first (ties: topmost),
/// so two nodes that compute the same border store the same value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Line {
    pub a: Vec2,
    pub b: Vec2,
}

impl Line {
    pub fn new(p: Vec2, q: Vec2) -> Self {
        if p.x < q.x || (p.x == q.x && p.y <= q.y) {
            Self { a: p, b: q }
        } else {
            Self { a: q, b: p }
        }
    }

    pub fn length(&self) -> f32 {
        self.a.distance(self.b)
    }

    pub fn midpoint(&self) -> Vec2 {
        (self.a + self.b) * 0.5
    }

    /// Unit vector from `a` to `b`, zero for a degenerate segment.
    pub fn direction(&self) -> Vec2 {
        (self.b - self.a).normalize_or_zero()
    }

    /// Segment shortened by `amount` at both ends. `None` if nothing remains.
    pub fn inset(&self, amount: f32) -> Option<Line> {
        if amount <= 0.0 {
            return Some(*self);
        }
        if self.length() < 2.0 * amount {
            return None;
        }
        let dir = self.direction();
        Some(Line::new(self.a + dir * amount, self.b - dir * amount))
    }
}

// ============================================================================
// RECTANGLE TESTS
// ============================================================================

/// Normalise negative width/height.
pub fn abs_rect(r: &Rect) -> Rect {
    r.abs()
}

/// True if the rectangles overlap or touch (closed intervals on both axes).
pub fn vec_intersect(r1: &Rect, r2: &Rect) -> bool {
    if r1.width < 0.0 || r1.height < 0.0 || r2.width < 0.0 || r2.height < 0.0 {
        return vec_intersect(&r1.abs(), &r2.abs());
    }
    r1.x <= r2.right() && r2.x <= r1.right() && r1.y <= r2.bottom() && r2.y <= r1.bottom()
}

/// True if the rectangles share a positive area. Touching edges do not count.
pub fn vec_overlap(r1: &Rect, r2: &Rect) -> bool {
    let a = r1.abs();
    let b = r2.abs();
    a.x < b.right() - OVERLAP_EPSILON
        && b.x < a.right() - OVERLAP_EPSILON
        && a.y < b.bottom() - OVERLAP_EPSILON
        && b.y < a.bottom() - OVERLAP_EPSILON
}

/// Rotated rectangle intersection. `r2` is rotated about its own center by
/// `angle2` and each of its edges is tested against `r1` rotated by `angle1`.
pub fn vec_intersect_rotated(r1: &Rect, r2: &Rect, angle1: f32, angle2: f32) -> bool {
    if angle1 == 0.0 && angle2 == 0.0 {
        return vec_intersect(r1, r2);
    }
    let corners = rect_corners(r2, angle2);
    if (0..4).any(|i| line_in_vec(corners[i], corners[(i + 1) % 4], r1, angle1)) {
        return true;
    }
    // No edge crossing: either disjoint or r1 sits entirely inside r2.
    point_in_vec(r2, r1.abs().center(), angle2)
}

/// Overlap rectangle. A dimension is 0 when the inputs do not overlap on that axis.
pub fn vec_intersect_region(r1: &Rect, r2: &Rect) -> Rect {
    let a = r1.abs();
    let b = r2.abs();
    let x0 = a.x.max(b.x);
    let x1 = a.right().min(b.right());
    let y0 = a.y.max(b.y);
    let y1 = a.bottom().min(b.bottom());
    Rect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
}

/// True if `inner` lies entirely within `outer` (borders inclusive).
pub fn vec_contains(outer: &Rect, inner: &Rect) -> bool {
    let o = outer.abs();
    let i = inner.abs();
    i.x >= o.x && i.right() <= o.right() && i.y >= o.y && i.bottom() <= o.bottom()
}

/// Point inside a rectangle rotated by `angle` about its center.
pub fn point_in_vec(rect: &Rect, p: Vec2, angle: f32) -> bool {
    let r = rect.abs();
    let local = if angle == 0.0 { p } else { rotate_point(p, r.center(), -angle) };
    r.contains_point(local)
}

/// The four corners (top-left, top-right, bottom-right, bottom-left) rotated
/// about the rectangle's center.
pub fn rect_corners(rect: &Rect, angle: f32) -> [Vec2; 4] {
    let r = rect.abs();
    let corners = [
        r.pos(),
        Vec2::new(r.right(), r.y),
        r.max(),
        Vec2::new(r.x, r.bottom()),
    ];
    if angle == 0.0 {
        return corners;
    }
    let c = r.center();
    corners.map(|p| rotate_point(p, c, angle))
}

/// Axis-aligned rectangle enclosing `rect` rotated by `angle`.
pub fn rotated_bounding_rect(rect: &Rect, angle: f32) -> Rect {
    if angle == 0.0 {
        return rect.abs();
    }
    let corners = rect_corners(rect, angle);
    let (min, max) = corners[1..]
        .iter()
        .fold((corners[0], corners[0]), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    Rect::from_corners(min, max)
}

/// Closest point of an axis-aligned rectangle to `p` (p itself when inside).
pub fn closest_point_in_rect(rect: &Rect, p: Vec2) -> Vec2 {
    let r = rect.abs();
    Vec2::new(p.x.clamp(r.x, r.right()), p.y.clamp(r.y, r.bottom()))
}

/// Distance from `p` to an axis-aligned rectangle, 0 inside.
pub fn point_rect_distance(rect: &Rect, p: Vec2) -> f32 {
    p.distance(closest_point_in_rect(rect, p))
}

// ============================================================================
// POINTS / LINES
// ============================================================================

/// Standard 2D rotation of `p` about `pivot`.
pub fn rotate_point(p: Vec2, pivot: Vec2, angle: f32) -> Vec2 {
    pivot + Vec2::from_angle(angle).rotate(p - pivot)
}

/// Wrap an angle into (-π, π].
pub fn clamp_tilt(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Distance from `p` to a segment, via the law of cosines: if the angle at
/// either endpoint is obtuse the closest point is that endpoint, otherwise the
/// perpendicular foot lies on the segment.
pub fn point_line_distance(line: &Line, p: Vec2) -> f32 {
    let a = p.distance(line.a);
    let b = p.distance(line.b);
    let c = line.length();
    if c < EPSILON || a < EPSILON || b < EPSILON {
        return a.min(b);
    }
    let cos_a = ((a * a + c * c - b * b) / (2.0 * a * c)).clamp(-1.0, 1.0);
    let cos_b = ((b * b + c * c - a * a) / (2.0 * b * c)).clamp(-1.0, 1.0);
    if cos_a < 0.0 {
        return a;
    }
    if cos_b < 0.0 {
        return b;
    }
    cos_a.acos().sin() * a
}

#[inline]
fn within(v: f32, lo: f32, hi: f32) -> bool {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    v >= lo - LINE_TOLERANCE && v <= hi + LINE_TOLERANCE
}

#[inline]
fn ranges_overlap(a0: f32, a1: f32, b0: f32, b1: f32) -> bool {
    a0.min(a1) <= b0.max(b1) + LINE_TOLERANCE && b0.min(b1) <= a0.max(a1) + LINE_TOLERANCE
}

/// Segment/segment intersection test. Endpoint inclusion is tolerant by
/// `LINE_TOLERANCE`; collinear overlapping segments intersect.
pub fn line_in_line(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let dxa = a2.x - a1.x;
    let dxb = b2.x - b1.x;
    let a_vertical = dxa.abs() < EPSILON;
    let b_vertical = dxb.abs() < EPSILON;

    if a_vertical && b_vertical {
        return (a1.x - b1.x).abs() <= LINE_TOLERANCE && ranges_overlap(a1.y, a2.y, b1.y, b2.y);
    }
    if a_vertical {
        let slope = (b2.y - b1.y) / dxb;
        let y = slope * (a1.x - b1.x) + b1.y;
        return within(a1.x, b1.x, b2.x) && within(y, a1.y, a2.y) && within(y, b1.y, b2.y);
    }
    if b_vertical {
        let slope = (a2.y - a1.y) / dxa;
        let y = slope * (b1.x - a1.x) + a1.y;
        return within(b1.x, a1.x, a2.x) && within(y, b1.y, b2.y) && within(y, a1.y, a2.y);
    }

    let ma = (a2.y - a1.y) / dxa;
    let mb = (b2.y - b1.y) / dxb;
    let ca = a1.y - ma * a1.x;
    let cb = b1.y - mb * b1.x;
    if (ma - mb).abs() < EPSILON {
        return (ca - cb).abs() <= LINE_TOLERANCE && ranges_overlap(a1.x, a2.x, b1.x, b2.x);
    }
    let x = (cb - ca) / (ma - mb);
    within(x, a1.x, a2.x) && within(x, b1.x, b2.x)
}

/// Intersection point of two segments, if they cross.
pub fn line_line_intersect(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.perp_dot(s);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = (b1 - a1).perp_dot(s) / denom;
    let u = (b1 - a1).perp_dot(r) / denom;
    let tol = EPSILON * 10.0;
    if (-tol..=1.0 + tol).contains(&t) && (-tol..=1.0 + tol).contains(&u) {
        Some(a1 + r * t)
    } else {
        None
    }
}

/// Intersection of the infinite lines through both segments. `None` when the
/// lines are parallel (or a segment has zero length).
pub fn line_line_intersect_extend(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.perp_dot(s);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = (b1 - a1).perp_dot(s) / denom;
    Some(a1 + r * t)
}

/// True if the segment touches the rectangle rotated by `angle`. The segment
/// is rotated by `-angle` into the rectangle's local frame first.
pub fn line_in_vec(a: Vec2, b: Vec2, rect: &Rect, angle: f32) -> bool {
    let r = rect.abs();
    let (a, b) = if angle == 0.0 {
        (a, b)
    } else {
        let c = r.center();
        (rotate_point(a, c, -angle), rotate_point(b, c, -angle))
    };
    if r.contains_point(a) || r.contains_point(b) {
        return true;
    }
    let corners = rect_corners(&r, 0.0);
    (0..4).any(|i| line_in_line(a, b, corners[i], corners[(i + 1) % 4]))
}

/// True if a positive length of the segment lies strictly inside `rect`.
/// Segments that only run along an edge or touch a corner do not count.
pub fn segment_enters_rect(a: Vec2, b: Vec2, rect: &Rect) -> bool {
    let r = rect.abs();
    let d = b - a;
    // Slab clipping: shrink [t0, t1] to the part of the segment between
    // each pair of parallel sides.
    let slabs = [
        (-d.x, a.x - r.x),
        (d.x, r.right() - a.x),
        (-d.y, a.y - r.y),
        (d.y, r.bottom() - a.y),
    ];
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in slabs {
        if p == 0.0 {
            if q <= 0.0 {
                return false;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 >= t1 {
            return false;
        }
    }
    true
}

/// Point in triangle, edges inclusive, either winding.
pub fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

// ============================================================================
// COLLISION RESPONSE
// ============================================================================

/// Clamp a 1D move of `[start, start + extent]` by `delta` so it stops at the
/// obstacle interval `[lo, hi]`.
fn clamp_axis(start: f32, extent: f32, delta: f32, lo: f32, hi: f32) -> f32 {
    let end = start + extent;
    if delta > 0.0 && end <= lo + OVERLAP_EPSILON {
        (lo - end).clamp(0.0, delta)
    } else if delta < 0.0 && start >= hi - OVERLAP_EPSILON {
        (hi - start).clamp(delta, 0.0)
    } else {
        0.0
    }
}

/// Resolve `mv` for `rect` against one wall, axis by axis. Horizontal-only and
/// vertical-only moves are tested independently and the colliding axis is
/// clamped to contact (or zeroed when either shape is rotated), which makes a
/// blocked rect slide along the wall.
///
/// Axis-aligned moves test the whole swept interval, so a move longer than
/// the wall is thick still stops at it.
pub fn move_rect(rect: &Rect, wall: &Rect, mv: Vec2, rotation: f32, wall_rotation: f32) -> Vec2 {
    let rect = rect.abs();
    let wall = wall.abs();
    let rotated = rotation != 0.0 || wall_rotation != 0.0;
    let blocked = |from: &Rect, d: Vec2| {
        let to = from.translate(d);
        if rotated {
            vec_intersect_rotated(&wall, &to, wall_rotation, rotation)
        } else {
            let swept = Rect::from_corners(from.pos().min(to.pos()), from.max().max(to.max()));
            vec_overlap(&swept, &wall)
        }
    };

    let mut dx = mv.x;
    if dx != 0.0 && blocked(&rect, Vec2::new(dx, 0.0)) {
        dx = if rotated { 0.0 } else { clamp_axis(rect.x, rect.width, dx, wall.x, wall.right()) };
    }
    let mut dy = mv.y;
    if dy != 0.0 && blocked(&rect, Vec2::new(0.0, dy)) {
        dy = if rotated { 0.0 } else { clamp_axis(rect.y, rect.height, dy, wall.y, wall.bottom()) };
    }

    // Diagonal approach onto a corner: both axes clear alone, blocked once
    // the x move has been made.
    let moved = rect.translate(Vec2::new(dx, 0.0));
    if dy != 0.0 && blocked(&moved, Vec2::new(0.0, dy)) {
        dy = if rotated { 0.0 } else { clamp_axis(moved.y, moved.height, dy, wall.y, wall.bottom()) };
    }
    Vec2::new(dx, dy)
}
