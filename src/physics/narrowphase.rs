//! Narrowphase collision detection between circles, lines and capsules.
//!
//! Every pair reduces to two circles: segment shapes are replaced by the
//! circle around their point closest to the other shape.

use glam::Vec2;

use super::collider::{Circle, Segment, Shape};

/// Distance below which two centers are treated as coincident.
const DEGENERATE_DISTANCE: f32 = 1e-6;

/// Result of a narrowphase test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactInfo {
    /// Midpoint of the overlap between the two surfaces.
    pub point: Vec2,
    /// Unit separation direction, pointing from A toward B.
    pub direction: Vec2,
    /// Overlap depth; positive when the shapes intersect.
    pub penetration: f32,
}

impl ContactInfo {
    #[inline]
    pub fn colliding(&self) -> bool {
        self.penetration > 0.0
    }

    /// The same contact seen from the other shape.
    pub fn flipped(self) -> Self {
        Self {
            direction: -self.direction,
            ..self
        }
    }
}

/// Test two shapes. `direction` in the result points from `a` toward `b`.
pub fn test_collision(a: &Shape, b: &Shape) -> ContactInfo {
    match (a, b) {
        (Shape::Circle(a), Shape::Circle(b)) => circle_circle(a, b),
        (Shape::Circle(a), Shape::Line(b)) => circle_segment(a, &b.segment()),
        (Shape::Circle(a), Shape::Capsule(b)) => circle_segment(a, &b.segment()),
        (Shape::Line(a), Shape::Circle(b)) => circle_segment(b, &a.segment()).flipped(),
        (Shape::Capsule(a), Shape::Circle(b)) => circle_segment(b, &a.segment()).flipped(),
        (Shape::Line(a), Shape::Line(b)) => segment_segment(&a.segment(), &b.segment()),
        (Shape::Line(a), Shape::Capsule(b)) => segment_segment(&a.segment(), &b.segment()),
        (Shape::Capsule(a), Shape::Line(b)) => segment_segment(&a.segment(), &b.segment()),
        (Shape::Capsule(a), Shape::Capsule(b)) => segment_segment(&a.segment(), &b.segment()),
    }
}

pub fn circle_circle(a: &Circle, b: &Circle) -> ContactInfo {
    contact_between(a.center, a.radius, b.center, b.radius, Vec2::Y)
}

/// Circle `a` against the segment shape `b`.
pub fn circle_segment(a: &Circle, b: &Segment) -> ContactInfo {
    let closest = b.closest_point(a.center);
    let fallback = oriented_normal(b, a.center);
    contact_between(a.center, a.radius, closest, b.radius, -fallback)
}

/// Segment shape `a` against segment shape `b`.
pub fn segment_segment(a: &Segment, b: &Segment) -> ContactInfo {
    let (on_a, on_b) = closest_points(a, b);
    let fallback = oriented_normal(a, b.start.lerp(b.end, 0.5));
    contact_between(on_a, a.radius, on_b, b.radius, fallback)
}

/// Closest pair of points between two segments.
fn closest_points(a: &Segment, b: &Segment) -> (Vec2, Vec2) {
    if let Some(point) = crossing_point(a, b) {
        return (point, point);
    }

    let candidates = [
        (a.closest_point(b.start), b.start),
        (a.closest_point(b.end), b.end),
        (a.start, b.closest_point(a.start)),
        (a.end, b.closest_point(a.end)),
    ];

    let mut best = candidates[0];
    let mut best_distance = best.0.distance_squared(best.1);
    for candidate in &candidates[1..] {
        let distance = candidate.0.distance_squared(candidate.1);
        if distance < best_distance {
            best = *candidate;
            best_distance = distance;
        }
    }
    best
}

/// Intersection point of two properly crossing segments.
fn crossing_point(a: &Segment, b: &Segment) -> Option<Vec2> {
    let da = a.end - a.start;
    let db = b.end - b.start;
    let denom = da.perp_dot(db);
    if denom.abs() <= f32::EPSILON {
        return None;
    }

    let offset = b.start - a.start;
    let t = offset.perp_dot(db) / denom;
    let u = offset.perp_dot(da) / denom;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then(|| a.start + da * t)
}

/// Normal of `segment` turned toward `toward`.
fn oriented_normal(segment: &Segment, toward: Vec2) -> Vec2 {
    let normal = segment.normal();
    let midpoint = segment.start.lerp(segment.end, 0.5);
    if normal.dot(toward - midpoint) < 0.0 {
        -normal
    } else {
        normal
    }
}

fn contact_between(
    center_a: Vec2,
    radius_a: f32,
    center_b: Vec2,
    radius_b: f32,
    fallback: Vec2,
) -> ContactInfo {
    let delta = center_b - center_a;
    let distance = delta.length();
    let direction = if distance < DEGENERATE_DISTANCE {
        fallback
    } else {
        delta / distance
    };
    let penetration = radius_a + radius_b - distance;

    ContactInfo {
        point: center_a + direction * (radius_a - penetration * 0.5),
        direction,
        penetration,
    }
}
