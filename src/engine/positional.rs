// Positional: the shape an entity or obstacle occupies.
//
// A closed set of variants (point, rectangle, circle) with an optional tilt.
// The quadtree and nav mesh only ever see shapes through this type or the
// `Spatial` trait built on top of it.

use glam::Vec2;

use super::geometry::{
    LINE_TOLERANCE, Line, Rect, clamp_tilt, line_in_vec, point_in_vec, point_line_distance,
    point_rect_distance, rotate_point, rotated_bounding_rect, vec_intersect_rotated,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Point(Vec2),
    Rect(Rect),
    Circle { center: Vec2, radius: f32 },
}

/// A shape with a position and a tilt in (-π, π].
///
/// Tilt only affects rectangles; points and circles are rotation invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Positional {
    shape: Shape,
    tilt: f32,
}

impl Positional {
    pub fn point(p: Vec2) -> Self {
        Self { shape: Shape::Point(p), tilt: 0.0 }
    }

    pub fn rect(rect: Rect) -> Self {
        Self { shape: Shape::Rect(rect.abs()), tilt: 0.0 }
    }

    pub fn rotated_rect(rect: Rect, tilt: f32) -> Self {
        Self { shape: Shape::Rect(rect.abs()), tilt: clamp_tilt(tilt) }
    }

    pub fn circle(center: Vec2, radius: f32) -> Self {
        Self {
            shape: Shape::Circle { center, radius: radius.abs() },
            tilt: 0.0,
        }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn tilt(&self) -> f32 {
        self.tilt
    }

    pub fn set_tilt(&mut self, tilt: f32) {
        self.tilt = clamp_tilt(tilt);
    }

    /// Anchor position: the point itself, a rectangle's top-left corner, a
    /// circle's center.
    pub fn pos(&self) -> Vec2 {
        match self.shape {
            Shape::Point(p) => p,
            Shape::Rect(r) => r.pos(),
            Shape::Circle { center, .. } => center,
        }
    }

    pub fn center(&self) -> Vec2 {
        match self.shape {
            Shape::Point(p) => p,
            Shape::Rect(r) => r.center(),
            Shape::Circle { center, .. } => center,
        }
    }

    /// Move the anchor (see `pos`) to `p`.
    pub fn set_pos(&mut self, p: Vec2) {
        match &mut self.shape {
            Shape::Point(pt) => *pt = p,
            Shape::Rect(r) => {
                r.x = p.x;
                r.y = p.y;
            }
            Shape::Circle { center, .. } => *center = p,
        }
    }

    pub fn set_center(&mut self, p: Vec2) {
        let offset = p - self.center();
        self.translate(offset);
    }

    pub fn translate(&mut self, d: Vec2) {
        let p = self.pos() + d;
        self.set_pos(p);
    }

    /// Axis-aligned rectangle enclosing the (possibly rotated) shape.
    pub fn bounding_rect(&self) -> Rect {
        match self.shape {
            Shape::Point(p) => Rect::new(p.x, p.y, 0.0, 0.0),
            Shape::Rect(r) => rotated_bounding_rect(&r, self.tilt),
            Shape::Circle { center, radius } => {
                Rect::from_center(center, Vec2::splat(radius * 2.0))
            }
        }
    }

    pub fn collides(&self, rect: &Rect) -> bool {
        match self.shape {
            Shape::Point(p) => rect.contains_point(p),
            Shape::Rect(r) => vec_intersect_rotated(rect, &r, 0.0, self.tilt),
            Shape::Circle { center, radius } => point_rect_distance(rect, center) <= radius,
        }
    }

    pub fn collides_line(&self, a: Vec2, b: Vec2) -> bool {
        let line = Line::new(a, b);
        match self.shape {
            Shape::Point(p) => point_line_distance(&line, p) <= LINE_TOLERANCE,
            Shape::Rect(r) => line_in_vec(a, b, &r, self.tilt),
            Shape::Circle { center, radius } => point_line_distance(&line, center) <= radius,
        }
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        match self.shape {
            Shape::Point(q) => q.distance(p) <= LINE_TOLERANCE,
            Shape::Rect(r) => point_in_vec(&r, p, self.tilt),
            Shape::Circle { center, radius } => center.distance(p) <= radius,
        }
    }

    pub fn collides_positional(&self, other: &Positional) -> bool {
        match (self.shape, other.shape) {
            (Shape::Point(p), _) => other.contains_point(p),
            (_, Shape::Point(p)) => self.contains_point(p),
            (Shape::Rect(a), Shape::Rect(b)) => vec_intersect_rotated(&a, &b, self.tilt, other.tilt),
            (Shape::Circle { center: c1, radius: r1 }, Shape::Circle { center: c2, radius: r2 }) => {
                c1.distance(c2) <= r1 + r2
            }
            (Shape::Circle { center, radius }, Shape::Rect(_)) => other.distance(center) <= radius,
            (Shape::Rect(_), Shape::Circle { center, radius }) => self.distance(center) <= radius,
        }
    }

    /// Distance from `p` to the shape.
    ///
    /// Rectangles report 0 inside. Circles report `max(d - radius, d)` where
    /// `d` is the distance to the center, i.e. always the center distance.
    pub fn distance(&self, p: Vec2) -> f32 {
        match self.shape {
            Shape::Point(q) => q.distance(p),
            Shape::Rect(r) => {
                let local = if self.tilt == 0.0 {
                    p
                } else {
                    rotate_point(p, r.center(), -self.tilt)
                };
                point_rect_distance(&r, local)
            }
            Shape::Circle { center, radius } => {
                let d = center.distance(p);
                (d - radius).max(d)
            }
        }
    }
}
