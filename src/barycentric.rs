use crate::{interpolate::WeightedSum, math::{cross_2d, pixel_center}};
use vek::Vec2;

/// The order in which the vertices of a triangle appear on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

impl WindingOrder {
    /// Find the winding order of a triangle in a y-up coordinate system, or `None` if it has no area.
    ///
    /// The order is counter-clockwise when the 2D cross product of `(p1 - p0, p2 - p0)` is positive.
    #[inline]
    pub fn of(points: &[Vec2<f32>; 3]) -> Option<Self> {
        let area = cross_2d(points[1] - points[0], points[2] - points[0]);
        if area > 0.0 {
            Some(WindingOrder::CounterClockwise)
        } else if area < 0.0 {
            Some(WindingOrder::Clockwise)
        } else {
            None
        }
    }

    /// +1 for counter-clockwise, -1 for clockwise.
    #[inline(always)]
    pub fn sign(self) -> f32 {
        match self {
            WindingOrder::CounterClockwise => 1.0,
            WindingOrder::Clockwise => -1.0,
        }
    }
}

/// Weights of a point relative to the three vertices of a triangle.
///
/// For a point inside the triangle every weight is in `[0, 1]` and the weights sum to 1.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl BarycentricCoordinates {
    #[inline(always)]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline(always)]
    pub fn sum(&self) -> f32 {
        self.x + self.y + self.z
    }

    /// Linearly interpolate the given per-vertex values with these weights.
    #[inline(always)]
    pub fn interpolate<T: WeightedSum>(&self, a: &T, b: &T, c: &T) -> T {
        T::weighted_sum3(a, b, c, self.x, self.y, self.z)
    }
}

impl From<BarycentricCoordinates> for [f32; 3] {
    fn from(b: BarycentricCoordinates) -> Self {
        [b.x, b.y, b.z]
    }
}

/// Computes barycentric coordinates of pixels with respect to one screen-space triangle.
///
/// Coordinates are made positive inside the triangle regardless of its winding order, so the helper must be given the
/// triangle's own winding order.
#[derive(Copy, Clone, Debug)]
pub struct BarycentricHelper {
    winding: WindingOrder,
    points: [Vec2<f32>; 3],
    // edges[i] is the edge opposite points[i]
    edges: [Vec2<f32>; 3],
    one_over_area: f32,
}

impl BarycentricHelper {
    pub fn new(winding: WindingOrder, points: [Vec2<f32>; 3]) -> Self {
        let area = cross_2d(points[1] - points[0], points[2] - points[0]).abs();
        debug_assert!(area > 0.0, "Barycentric helper built for a triangle with no area: {:?}", points);
        Self {
            winding,
            points,
            edges: [points[2] - points[1], points[0] - points[2], points[1] - points[0]],
            one_over_area: 1.0 / area,
        }
    }

    #[inline]
    pub fn winding(&self) -> WindingOrder {
        self.winding
    }

    #[inline]
    pub fn points(&self) -> &[Vec2<f32>; 3] {
        &self.points
    }

    /// Coordinates of the centre of the given pixel.
    #[inline]
    pub fn coordinates(&self, pixel: [usize; 2]) -> BarycentricCoordinates {
        self.coordinates_at(pixel_center(pixel))
    }

    /// Coordinates of an arbitrary continuous-space point.
    #[inline]
    pub fn coordinates_at(&self, p: Vec2<f32>) -> BarycentricCoordinates {
        let scale = self.one_over_area * self.winding.sign();
        BarycentricCoordinates {
            x: cross_2d(self.edges[0], p - self.points[1]) * scale,
            y: cross_2d(self.edges[1], p - self.points[2]) * scale,
            z: cross_2d(self.edges[2], p - self.points[0]) * scale,
        }
    }

    /// Whether a point with the given coordinates belongs to the triangle.
    ///
    /// Points exactly on an edge belong to the triangle only if that edge is a top or left edge, so that triangles
    /// sharing an edge never both cover a pixel.
    #[inline]
    pub fn is_inside(&self, b: &BarycentricCoordinates) -> bool {
        if !(b.x >= 0.0 && b.y >= 0.0 && b.z >= 0.0) {
            return false;
        }
        let sign = self.winding.sign();
        let owns = |e: Vec2<f32>| (e.y == 0.0 && sign * e.x < 0.0) || sign * e.y < 0.0;
        (b.x != 0.0 || owns(self.edges[0])) && (b.y != 0.0 || owns(self.edges[1])) && (b.z != 0.0 || owns(self.edges[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(points: [[f32; 2]; 3]) -> [Vec2<f32>; 3] {
        [Vec2::from(points[0]), Vec2::from(points[1]), Vec2::from(points[2])]
    }

    #[test]
    fn winding_follows_cyclic_permutation_and_swaps() {
        let [a, b, c] = tri([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        assert_eq!(WindingOrder::of(&[a, b, c]), Some(WindingOrder::CounterClockwise));
        assert_eq!(WindingOrder::of(&[b, c, a]), Some(WindingOrder::CounterClockwise));
        assert_eq!(WindingOrder::of(&[c, a, b]), Some(WindingOrder::CounterClockwise));
        assert_eq!(WindingOrder::of(&[b, a, c]), Some(WindingOrder::Clockwise));
        assert_eq!(WindingOrder::of(&[a, a, c]), None);
    }

    #[test]
    fn inside_weights_are_normalised() {
        for &points in [
            tri([[0.0, 0.0], [7.0, 1.0], [2.0, 6.0]]),
            tri([[2.0, 6.0], [7.0, 1.0], [0.0, 0.0]]),
        ]
        .iter()
        {
            let winding = WindingOrder::of(&points).unwrap();
            let helper = BarycentricHelper::new(winding, points);
            let mut inside = 0;
            for y in 0..8 {
                for x in 0..8 {
                    let b = helper.coordinates([x, y]);
                    assert!((b.sum() - 1.0).abs() < 1e-5, "{:?}", b);
                    if helper.is_inside(&b) {
                        inside += 1;
                        assert!(b.x >= 0.0 && b.y >= 0.0 && b.z >= 0.0);
                    }
                }
            }
            assert!(inside > 0);
        }
    }

    #[test]
    fn nan_weights_are_outside() {
        let points = tri([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let helper = BarycentricHelper::new(WindingOrder::CounterClockwise, points);
        let b = BarycentricCoordinates { x: f32::NAN, y: 0.5, z: 0.5 };
        assert!(!helper.is_inside(&b));
        let b = BarycentricCoordinates { x: 0.25, y: 0.25, z: f32::NAN };
        assert!(!helper.is_inside(&b));
    }

    #[test]
    fn vertices_have_unit_weights() {
        let points = tri([[1.0, 1.0], [5.0, 2.0], [3.0, 7.0]]);
        let helper = BarycentricHelper::new(WindingOrder::CounterClockwise, points);
        let b = helper.coordinates_at(points[1]);
        assert!((b.x - 0.0).abs() < 1e-6 && (b.y - 1.0).abs() < 1e-6 && (b.z - 0.0).abs() < 1e-6);
        assert!((b.interpolate(&10.0, &20.0, &30.0) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn shared_edge_is_owned_once() {
        // Two triangles of a quad sharing the diagonal from (0, 0) to (4, 4), which passes through pixel centres
        let lower = tri([[0.0, 0.0], [4.0, 0.0], [4.0, 4.0]]);
        let upper = tri([[0.0, 0.0], [4.0, 4.0], [0.0, 4.0]]);
        for &(a, b) in [(lower, upper), ([lower[2], lower[1], lower[0]], [upper[2], upper[1], upper[0]])].iter() {
            let ha = BarycentricHelper::new(WindingOrder::of(&a).unwrap(), a);
            let hb = BarycentricHelper::new(WindingOrder::of(&b).unwrap(), b);
            for y in 0..4 {
                for x in 0..4 {
                    let count = ha.is_inside(&ha.coordinates([x, y])) as u32 + hb.is_inside(&hb.coordinates([x, y])) as u32;
                    assert_eq!(count, 1, "pixel {:?}", [x, y]);
                }
            }
        }
    }
}
