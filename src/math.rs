use vek::{Rgba, Vec2};

pub trait Lerp<F = f32> {
    fn lerp_unchecked(a: &Self, b: &Self, factor: &F) -> Self;
}

impl Lerp<f32> for f32 {
    #[inline(always)]
    fn lerp_unchecked(a: &Self, b: &Self, factor: &f32) -> Self { factor.mul_add(*b - *a, *a) }
}

impl Lerp<f32> for Rgba<f32> {
    #[inline(always)]
    fn lerp_unchecked(a: &Self, b: &Self, factor: &f32) -> Self {
        Rgba::new(
            f32::lerp_unchecked(&a.r, &b.r, factor),
            f32::lerp_unchecked(&a.g, &b.g, factor),
            f32::lerp_unchecked(&a.b, &b.b, factor),
            f32::lerp_unchecked(&a.a, &b.a, factor),
        )
    }
}

/// The z component of the cross product of two vectors lying in the xy plane.
#[inline(always)]
pub fn cross_2d(a: Vec2<f32>, b: Vec2<f32>) -> f32 {
    a.x * b.y - a.y * b.x
}

/// The continuous-space position of the centre of the pixel at the given discrete position.
#[inline(always)]
pub fn pixel_center([x, y]: [usize; 2]) -> Vec2<f32> {
    Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
}

/// An axis-aligned rectangle of pixels. `min` is inclusive, `max` is exclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bounds2 {
    pub min: [usize; 2],
    pub max: [usize; 2],
}

impl Bounds2 {
    pub const EMPTY: Self = Self { min: [0; 2], max: [0; 2] };

    #[inline]
    pub fn new(min: [usize; 2], max: [usize; 2]) -> Self {
        debug_assert!(min[0] <= max[0] && min[1] <= max[1], "min: {:?}, max: {:?}", min, max);
        Self { min, max }
    }

    /// Bounds starting at the origin and covering a surface of the given size.
    #[inline]
    pub fn from_size(size: [usize; 2]) -> Self {
        Self { min: [0; 2], max: size }
    }

    /// The smallest pixel rectangle containing all of the given continuous-space points, limited to `surface`.
    ///
    /// Returns [`Bounds2::EMPTY`] if the points lie entirely outside of the surface or are not finite.
    pub fn covering(points: &[Vec2<f32>], surface: Bounds2) -> Self {
        if points.is_empty() || !points.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
            return Self::EMPTY;
        }

        let min = points.iter().copied().fold(Vec2::broadcast(f32::INFINITY), |a, b| Vec2::partial_min(a, b));
        let max = points.iter().copied().fold(Vec2::broadcast(f32::NEG_INFINITY), |a, b| Vec2::partial_max(a, b));

        // Continuous to discrete space
        let lo = [min.x.floor() as i64, min.y.floor() as i64];
        let hi = [(max.x + 1.0).floor() as i64, (max.y + 1.0).floor() as i64];

        let mut out = Self::EMPTY;
        for i in 0..2 {
            let start = lo[i].max(surface.min[i] as i64);
            let end = hi[i].min(surface.max[i] as i64);
            if start >= end {
                return Self::EMPTY;
            }
            out.min[i] = start as usize;
            out.max[i] = end as usize;
        }
        out
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.max[0] - self.min[0]
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.max[1] - self.min[1]
    }

    #[inline]
    pub fn size(&self) -> [usize; 2] {
        [self.width(), self.height()]
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    #[inline]
    pub fn contains(&self, [x, y]: [usize; 2]) -> bool {
        x >= self.min[0] && x < self.max[0] && y >= self.min[1] && y < self.max[1]
    }

    #[inline]
    pub fn overlaps(&self, other: &Bounds2) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min[0] < other.max[0]
            && other.min[0] < self.max[0]
            && self.min[1] < other.max[1]
            && other.min[1] < self.max[1]
    }

    /// The overlapping region of two bounds, or [`Bounds2::EMPTY`] if they do not overlap.
    pub fn intersect(&self, other: &Bounds2) -> Bounds2 {
        if !self.overlaps(other) {
            return Self::EMPTY;
        }
        Self {
            min: [self.min[0].max(other.min[0]), self.min[1].max(other.min[1])],
            max: [self.max[0].min(other.max[0]), self.max[1].min(other.max[1])],
        }
    }

    /// Row-major index of a pixel relative to the corner of these bounds.
    #[inline(always)]
    pub fn local_index(&self, [x, y]: [usize; 2]) -> usize {
        debug_assert!(self.contains([x, y]), "{:?} is not inside {:?}", [x, y], self);
        (x - self.min[0]) + (y - self.min[1]) * self.width()
    }

    /// Split these bounds into square tiles of the given side, the last row and column taking whatever is left.
    pub fn tiles(&self, side: usize) -> impl Iterator<Item = Bounds2> + '_ {
        assert!(side > 0, "Tile side cannot be zero");
        let this = *self;
        (this.min[1]..this.max[1]).step_by(side).flat_map(move |y| {
            (this.min[0]..this.max[0]).step_by(side).map(move |x| Bounds2 {
                min: [x, y],
                max: [(x + side).min(this.max[0]), (y + side).min(this.max[1])],
            })
        })
    }
}
