use crate::{
    arena::Span,
    barycentric::{BarycentricCoordinates, BarycentricHelper, WindingOrder},
    math::Bounds2,
    pipeline::CullMode,
};
use vek::{Vec2, Vec3, Vec4};

/// Map a point from normalised device coordinates into raster space for a surface of the given size.
///
/// `x` and `y` go from `[-1, 1]` to `[0, width]` and `[0, height]`. `z` is unchanged.
#[inline]
pub fn ndc_to_raster(p: Vec3<f32>, [width, height]: [usize; 2]) -> Vec3<f32> {
    Vec3::new((1.0 + p.x) * 0.5 * width as f32, (1.0 + p.y) * 0.5 * height as f32, p.z)
}

/// The inverse of [`ndc_to_raster`].
#[inline]
pub fn raster_to_ndc(p: Vec3<f32>, [width, height]: [usize; 2]) -> Vec3<f32> {
    Vec3::new(2.0 * p.x / width as f32 - 1.0, 2.0 * p.y / height as f32 - 1.0, p.z)
}

/// A triangle prepared for rasterization.
#[derive(Copy, Clone, Debug)]
pub struct Triangle {
    /// Raster-space x and y, and depth, of each vertex.
    pub screen: [Vec3<f32>; 3],
    /// Clip-space W of each vertex.
    pub w: [f32; 3],
    pub one_over_w: [f32; 3],
    pub one_over_depth: [f32; 3],
    /// Indices of the vertices in the draw call's vertex shader outputs.
    pub vertices: [usize; 3],
    /// The pixels the triangle may cover, limited to the target surface.
    pub bounds: Bounds2,
    /// `None` if the triangle has no area on screen.
    pub winding: Option<WindingOrder>,
    pub helper: Option<BarycentricHelper>,
    /// One fragment record per pixel of `bounds`, row by row.
    pub fragments: Span,
    pub ignore: bool,
}

impl Default for Triangle {
    fn default() -> Self {
        Self {
            screen: [Vec3::zero(); 3],
            w: [1.0; 3],
            one_over_w: [1.0; 3],
            one_over_depth: [1.0; 3],
            vertices: [0; 3],
            bounds: Bounds2::EMPTY,
            winding: None,
            helper: None,
            fragments: Span::EMPTY,
            ignore: true,
        }
    }
}

impl Triangle {
    /// Project the clip-space positions of three vertices onto a surface.
    pub fn setup(clip: [Vec4<f32>; 3], vertices: [usize; 3], surface: Bounds2) -> Self {
        let size = surface.size();
        let screen = [
            ndc_to_raster(clip[0].xyz() / clip[0].w, size),
            ndc_to_raster(clip[1].xyz() / clip[1].w, size),
            ndc_to_raster(clip[2].xyz() / clip[2].w, size),
        ];
        let points = [Vec2::from(screen[0]), Vec2::from(screen[1]), Vec2::from(screen[2])];
        let winding = WindingOrder::of(&points);

        Self {
            screen,
            w: [clip[0].w, clip[1].w, clip[2].w],
            one_over_w: [1.0 / clip[0].w, 1.0 / clip[1].w, 1.0 / clip[2].w],
            one_over_depth: [1.0 / screen[0].z, 1.0 / screen[1].z, 1.0 / screen[2].z],
            vertices,
            bounds: Bounds2::covering(&points, surface),
            winding,
            helper: winding.map(|winding| BarycentricHelper::new(winding, points)),
            fragments: Span::EMPTY,
            ignore: false,
        }
    }

    /// Whether any vertex lies outside of the `[0, 1]` depth range.
    #[inline]
    pub fn outside_depth_range(&self) -> bool {
        self.screen.iter().any(|p| !(0.0..=1.0).contains(&p.z))
    }

    /// Whether the triangle cannot be rasterized, or should not be.
    pub fn should_ignore(&self, cull: &CullMode) -> bool {
        let degenerate = self.helper.is_none()
            || self
                .one_over_w
                .iter()
                .chain(self.one_over_depth.iter())
                .any(|x| !x.is_finite() || *x <= 0.0);

        degenerate
            || self.bounds.is_empty()
            || self.outside_depth_range()
            || self.winding.map_or(true, |winding| cull.culls(winding))
    }

    /// Clip-space W at a point, interpolated correctly for perspective.
    #[inline]
    pub fn interpolate_w(&self, b: &BarycentricCoordinates) -> f32 {
        1.0 / b.interpolate(&self.one_over_w[0], &self.one_over_w[1], &self.one_over_w[2])
    }

    /// Depth at a point, interpolated through the reciprocal of each vertex's depth.
    #[inline]
    pub fn interpolate_depth(&self, b: &BarycentricCoordinates) -> f32 {
        1.0 / b.interpolate(&self.one_over_depth[0], &self.one_over_depth[1], &self.one_over_depth[2])
    }
}

/// The coverage of one pixel of a triangle's bounds.
#[derive(Copy, Clone, Debug, Default)]
pub struct Coverage {
    pub position: [usize; 2],
    pub barycentric: BarycentricCoordinates,
    pub inside: bool,
}

/// Links from a covered pixel to covered pixels beside it, used to compute screen-space derivatives.
///
/// Each link holds the index of the neighbour's fragment record and the direction of the step towards it (`1.0` for
/// the positive axis direction, `-1.0` for the negative one).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Neighbours {
    pub x: Option<(usize, f32)>,
    pub y: Option<(usize, f32)>,
}
