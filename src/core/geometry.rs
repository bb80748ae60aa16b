//! Planar polygon primitives for the tile/orbit matcher.
//!
//! Swath footprints and tile footprints are simple rings; the clip side of
//! every intersection computed here is convex, so Sutherland-Hodgman clipping
//! is exact and no general polygon library is needed.

use crate::types::BoundingBox;

/// A polygon ring as `[x, y]` vertices. The closing vertex is implicit.
pub type Ring = Vec<[f64; 2]>;

/// Signed shoelace area; positive for counter-clockwise rings.
pub fn signed_area(ring: &[[f64; 2]]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..ring.len() {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % ring.len()];
        acc += x0 * y1 - x1 * y0;
    }
    acc / 2.0
}

/// Absolute area of a ring.
pub fn ring_area(ring: &[[f64; 2]]) -> f64 {
    signed_area(ring).abs()
}

/// Four-vertex ring of an axis-aligned box, counter-clockwise.
pub fn bbox_ring(bb: &BoundingBox) -> Ring {
    vec![
        [bb.left, bb.bottom],
        [bb.right, bb.bottom],
        [bb.right, bb.top],
        [bb.left, bb.top],
    ]
}

/// Axis-aligned envelope of a ring.
pub fn ring_envelope(ring: &[[f64; 2]]) -> BoundingBox {
    let mut bb = BoundingBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for [x, y] in ring {
        bb.left = bb.left.min(*x);
        bb.right = bb.right.max(*x);
        bb.bottom = bb.bottom.min(*y);
        bb.top = bb.top.max(*y);
    }
    bb
}

fn is_inside(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> bool {
    // Left-of-edge test for a counter-clockwise clip ring.
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]) >= 0.0
}

fn edge_intersection(p: [f64; 2], q: [f64; 2], a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    let d1 = [q[0] - p[0], q[1] - p[1]];
    let d2 = [b[0] - a[0], b[1] - a[1]];
    let denom = d1[0] * d2[1] - d1[1] * d2[0];
    if denom.abs() < f64::EPSILON {
        // Parallel segments; fall back to the segment end.
        return q;
    }
    let t = ((a[0] - p[0]) * d2[1] - (a[1] - p[1]) * d2[0]) / denom;
    [p[0] + t * d1[0], p[1] + t * d1[1]]
}

/// Clip `subject` by the convex ring `clip` (Sutherland-Hodgman).
///
/// `clip` may come in either orientation; it is normalized to
/// counter-clockwise internally. The subject ring may be non-convex.
pub fn clip_convex(subject: &[[f64; 2]], clip: &[[f64; 2]]) -> Ring {
    if subject.len() < 3 || clip.len() < 3 {
        return Vec::new();
    }
    let clip_ccw: Ring = if signed_area(clip) < 0.0 {
        clip.iter().rev().copied().collect()
    } else {
        clip.to_vec()
    };

    let mut output: Ring = subject.to_vec();
    for i in 0..clip_ccw.len() {
        if output.is_empty() {
            break;
        }
        let a = clip_ccw[i];
        let b = clip_ccw[(i + 1) % clip_ccw.len()];
        let input = std::mem::take(&mut output);
        for j in 0..input.len() {
            let p = input[j];
            let q = input[(j + 1) % input.len()];
            let p_in = is_inside(p, a, b);
            let q_in = is_inside(q, a, b);
            if p_in {
                output.push(p);
                if !q_in {
                    output.push(edge_intersection(p, q, a, b));
                }
            } else if q_in {
                output.push(edge_intersection(p, q, a, b));
            }
        }
    }
    output
}

/// Area of `subject` ∩ `clip`, with `clip` convex.
pub fn intersection_area(subject: &[[f64; 2]], clip: &[[f64; 2]]) -> f64 {
    if !ring_envelope(subject).intersects(&ring_envelope(clip)) {
        return 0.0;
    }
    ring_area(&clip_convex(subject, clip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Ring {
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = unit_square();
        let cw: Ring = ccw.iter().rev().copied().collect();
        assert_relative_eq!(signed_area(&ccw), 1.0);
        assert_relative_eq!(signed_area(&cw), -1.0);
    }

    #[test]
    fn test_full_overlap() {
        let sq = unit_square();
        assert_relative_eq!(intersection_area(&sq, &sq), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_partial_overlap() {
        let sq = unit_square();
        let shifted = vec![[0.5, 0.5], [1.5, 0.5], [1.5, 1.5], [0.5, 1.5]];
        assert_relative_eq!(intersection_area(&sq, &shifted), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_disjoint() {
        let sq = unit_square();
        let far = vec![[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0]];
        assert_eq!(intersection_area(&sq, &far), 0.0);
    }

    #[test]
    fn test_clip_orientation_insensitive() {
        let sq = unit_square();
        let clip = vec![[0.25, -1.0], [0.75, -1.0], [0.75, 2.0], [0.25, 2.0]];
        let clip_cw: Ring = clip.iter().rev().copied().collect();
        assert_relative_eq!(
            intersection_area(&sq, &clip),
            intersection_area(&sq, &clip_cw),
            epsilon = 1e-12
        );
        assert_relative_eq!(intersection_area(&sq, &clip), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_tilted_parallelogram() {
        // Parallelogram of width 0.5 sweeping across the unit square.
        let strip = vec![[0.2, -1.0], [0.7, -1.0], [1.2, 2.0], [0.7, 2.0]];
        let area = intersection_area(&unit_square(), &strip);
        assert!(area > 0.0 && area < 1.0);
    }
}
