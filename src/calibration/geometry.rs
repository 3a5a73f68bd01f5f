//! Planar geometry on integer contours.

use imageproc::geometry::{approximate_polygon_dp, arc_length, min_area_rect};
use imageproc::point::Point;
use nalgebra::Point2;

/// Douglas-Peucker simplification with tolerance proportional to perimeter.
/// The returned polygon is open (last vertex differs from the first).
pub fn simplify_contour(contour: &[Point<i32>], perimeter_fraction: f64) -> Vec<Point<i32>> {
    if contour.len() < 3 {
        return contour.to_vec();
    }
    let epsilon = perimeter_fraction * arc_length(contour, true);
    if epsilon <= 0.0 {
        return contour.to_vec();
    }
    let mut polygon = approximate_polygon_dp(contour, epsilon, true);
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    // The start of a traced contour is kept by DP even when it lies on an
    // edge; drop seam vertices that are within tolerance of their chord.
    loop {
        let n = polygon.len();
        if n <= 3 {
            break;
        }
        if seam_distance(polygon[n - 1], polygon[0], polygon[1]) <= epsilon {
            polygon.remove(0);
        } else if seam_distance(polygon[n - 2], polygon[n - 1], polygon[0]) <= epsilon {
            polygon.pop();
        } else {
            break;
        }
    }
    polygon
}

fn seam_distance(prev: Point<i32>, p: Point<i32>, next: Point<i32>) -> f64 {
    let to_f = |q: Point<i32>| Point2::new(q.x as f32, q.y as f32);
    point_line_distance(to_f(p), to_f(prev), to_f(next)) as f64
}

/// True when every turn has the same orientation.
pub fn is_convex(polygon: &[Point<i32>]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i64;
    for i in 0..n {
        let (a, b, c) = (polygon[i], polygon[(i + 1) % n], polygon[(i + 2) % n]);
        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64 - (b.y - a.y) as i64 * (c.x - b.x) as i64;
        if cross != 0 {
            if sign != 0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    sign != 0
}

/// Axis-aligned bounding box as `(x, y, width, height)`, inclusive of the
/// extreme points.
pub fn bounding_rect(points: &[Point<i32>]) -> (i64, i64, i64, i64) {
    let Some(first) = points.first() else {
        return (0, 0, 0, 0);
    };
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    (x0 as i64, y0 as i64, (x1 - x0 + 1) as i64, (y1 - y0 + 1) as i64)
}

/// Minimum-area rotated rectangle of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point2<f32>,
    pub width: f32,
    pub height: f32,
}

impl RotatedRect {
    pub fn fit(points: &[Point<i32>]) -> Self {
        let corners = min_area_rect(points);
        let center = corners
            .iter()
            .fold(Point2::new(0.0f32, 0.0), |acc, p| Point2::new(acc.x + p.x as f32, acc.y + p.y as f32));
        let side = |a: Point<i32>, b: Point<i32>| ((a.x - b.x) as f32).hypot((a.y - b.y) as f32);
        Self {
            center: Point2::new(center.x / 4.0, center.y / 4.0),
            width: side(corners[0], corners[1]),
            height: side(corners[1], corners[2]),
        }
    }

    /// Long side over short side, infinite for degenerate rectangles.
    pub fn aspect_ratio(&self) -> f32 {
        let (long, short) = (self.width.max(self.height), self.width.min(self.height));
        if short <= 0.0 { f32::INFINITY } else { long / short }
    }
}

/// Smallest circle enclosing every point, returned as (center, radius).
pub fn min_enclosing_circle(points: &[Point<i32>]) -> (Point2<f64>, f64) {
    let pts: Vec<Point2<f64>> = points.iter().map(|p| Point2::new(p.x as f64, p.y as f64)).collect();
    let Some(&first) = pts.first() else {
        return (Point2::origin(), 0.0);
    };

    let contains = |c: &(Point2<f64>, f64), p: &Point2<f64>| nalgebra::distance(&c.0, p) <= c.1 + 1e-7;
    let mut circle = (first, 0.0);
    for i in 1..pts.len() {
        if contains(&circle, &pts[i]) {
            continue;
        }
        circle = (pts[i], 0.0);
        for j in 0..i {
            if contains(&circle, &pts[j]) {
                continue;
            }
            circle = circle_from_two(pts[i], pts[j]);
            for k in 0..j {
                if !contains(&circle, &pts[k]) {
                    circle = circle_from_three(pts[i], pts[j], pts[k]).unwrap_or(circle);
                }
            }
        }
    }
    circle
}

fn circle_from_two(a: Point2<f64>, b: Point2<f64>) -> (Point2<f64>, f64) {
    let center = nalgebra::center(&a, &b);
    (center, nalgebra::distance(&a, &b) / 2.0)
}

fn circle_from_three(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> Option<(Point2<f64>, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        // Collinear: the two farthest points span the circle
        let candidates = [circle_from_two(a, b), circle_from_two(a, c), circle_from_two(b, c)];
        return candidates.into_iter().max_by(|x, y| x.1.total_cmp(&y.1));
    }
    let (a2, b2, c2) = (a.coords.norm_squared(), b.coords.norm_squared(), c.coords.norm_squared());
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let center = Point2::new(ux, uy);
    Some((center, nalgebra::distance(&center, &a)))
}

/// Perpendicular distance from `p` to the infinite line through `a` and `b`.
pub fn point_line_distance(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len = ab.norm();
    if len == 0.0 {
        return nalgebra::distance(&p, &a);
    }
    let ap = p - a;
    (ab.x * ap.y - ab.y * ap.x).abs() / len
}
