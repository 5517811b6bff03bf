//! Collision shapes, bounding boxes and transform helpers.

use glam::Vec2;

/// Half thickness given to [`Line`] shapes in the narrow phase.
pub const LINE_WIDTH: f32 = 0.02;

/// Axis-aligned bounding box. `min` is the top-left, `max` the bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    #[inline]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y, "inverted aabb {min} {max}");
        Self { min, max }
    }

    /// Box spanning two arbitrary corners.
    #[inline]
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Whether `other` lies entirely inside `self`.
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Smallest box containing both boxes.
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow the box by `amount` in total per axis, half on each side.
    #[inline]
    pub fn extend(&self, amount: Vec2) -> Aabb {
        let half = amount * 0.5;
        Aabb {
            min: self.min - half,
            max: self.max + half,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

/// An infinitely thin segment. Collides as a capsule of radius [`LINE_WIDTH`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Vec2,
    pub end: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub start: Vec2,
    pub end: Vec2,
    pub radius: f32,
}

/// A segment inflated by a radius, the common form of lines and capsules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Vec2,
    pub end: Vec2,
    pub radius: f32,
}

impl Segment {
    /// Closest point on the segment to `point`.
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        let ab = self.end - self.start;
        let len_sq = ab.length_squared();
        if len_sq <= f32::EPSILON {
            return self.start;
        }
        let t = ((point - self.start).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.start + ab * t
    }

    /// Unit normal of the segment, or `+Y` for a zero-length segment.
    pub fn normal(&self) -> Vec2 {
        (self.end - self.start).perp().try_normalize().unwrap_or(Vec2::Y)
    }
}

impl Line {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    pub fn segment(&self) -> Segment {
        Segment {
            start: self.start,
            end: self.end,
            radius: LINE_WIDTH,
        }
    }

    /// Slab test of the segment against `aabb`.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let delta = self.end - self.start;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for axis in 0..2 {
            let (origin, d, lo, hi) = (self.start[axis], delta[axis], aabb.min[axis], aabb.max[axis]);
            if d.abs() <= f32::EPSILON {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (near, far) = {
                let t1 = (lo - origin) * inv;
                let t2 = (hi - origin) * inv;
                if t1 <= t2 {
                    (t1, t2)
                } else {
                    (t2, t1)
                }
            };
            t_min = t_min.max(near);
            t_max = t_max.min(far);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

impl Capsule {
    pub fn segment(&self) -> Segment {
        Segment {
            start: self.start,
            end: self.end,
            radius: self.radius,
        }
    }
}

/// Collision shape of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle(Circle),
    Line(Line),
    Capsule(Capsule),
}

impl Shape {
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Shape::Circle(Circle { center, radius })
    }

    pub fn line(start: Vec2, end: Vec2) -> Self {
        Shape::Line(Line { start, end })
    }

    pub fn capsule(start: Vec2, end: Vec2, radius: f32) -> Self {
        Shape::Capsule(Capsule { start, end, radius })
    }

    /// Tight bounding box of the shape.
    pub fn aabb(&self) -> Aabb {
        match self {
            Shape::Circle(c) => Aabb {
                min: c.center - Vec2::splat(c.radius),
                max: c.center + Vec2::splat(c.radius),
            },
            Shape::Line(l) => Aabb::from_points(l.start, l.end),
            Shape::Capsule(c) => {
                Aabb::from_points(c.start, c.end).extend(Vec2::splat(c.radius * 2.0))
            }
        }
    }

    /// Apply scale, then rotation, then translation.
    ///
    /// Radii scale by the larger scale component.
    pub fn transform(&self, position: Vec2, dir: Vec2, scale: Vec2) -> Shape {
        let point = |p: Vec2| transform_point(p, position, dir, scale);
        let radius_scale = scale.x.max(scale.y);
        match self {
            Shape::Circle(c) => Shape::Circle(Circle {
                center: point(c.center),
                radius: c.radius * radius_scale,
            }),
            Shape::Line(l) => Shape::Line(Line {
                start: point(l.start),
                end: point(l.end),
            }),
            Shape::Capsule(c) => Shape::Capsule(Capsule {
                start: point(c.start),
                end: point(c.end),
                radius: c.radius * radius_scale,
            }),
        }
    }
}

/// Rotate `v` by the heading `dir = (sin, cos)`.
#[inline]
pub fn rotate(v: Vec2, dir: Vec2) -> Vec2 {
    Vec2::new(v.x * dir.y + v.y * dir.x, -v.x * dir.x + v.y * dir.y)
}

#[inline]
pub fn transform_point(v: Vec2, position: Vec2, dir: Vec2, scale: Vec2) -> Vec2 {
    rotate(v * scale, dir) + position
}
