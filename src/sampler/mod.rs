//! Filtered sampling of images with normalised texture coordinates.
//!
//! Samplers use normalised coordinates (between 0 and 1) with `(0, 0)` at the bottom-left corner of the image. All
//! samples are linear-space colours, whatever the gamma space of the image.

mod linear;
mod nearest;

pub use self::{linear::{bilinear, trilinear}, nearest::nearest};

use crate::{image::Image, math::Lerp};
use vek::{Rgba, Vec2};

/// How texels are combined when sampling a single mip level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Use the texel containing the sample point.
    Point,
    /// Blend the four texels nearest to the sample point.
    Linear,
}

/// How mip levels are chosen when minifying.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MipFilter {
    /// Always sample the base image.
    None,
    /// Sample the nearest level.
    Point,
    /// Blend the two nearest levels.
    Linear,
}

/// How coordinates outside of `[0, 1]` are brought back onto the image.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Wrap {
    Clamp,
    /// Samples outside of the image take the border colour.
    Border,
    Repeat,
    MirrorRepeat,
}

impl Wrap {
    /// Wrap a single coordinate, returning `None` if the sample falls on the border.
    #[inline]
    pub fn apply(self, x: f32) -> Option<f32> {
        match self {
            Wrap::Clamp => Some(x.max(0.0).min(1.0)),
            Wrap::Border if (0.0..=1.0).contains(&x) => Some(x),
            Wrap::Border => None,
            Wrap::Repeat => Some(x - x.floor()),
            Wrap::MirrorRepeat => {
                let t = x.rem_euclid(2.0);
                Some(if t > 1.0 { 2.0 - t } else { t })
            }
        }
    }
}

/// The configuration of a [`Sampler2D`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    /// Filter used when the texture is magnified (the level of detail is negative).
    pub mag_filter: Filter,
    /// Filter used within a mip level when the texture is minified.
    pub min_filter: Filter,
    pub mip_filter: MipFilter,
    pub wrap_u: Wrap,
    pub wrap_v: Wrap,
    /// The colour of samples that fall outside of the image with [`Wrap::Border`].
    pub border: Rgba<f32>,
    /// Added to the computed level of detail.
    pub lod_bias: f32,
}

impl SamplerConfig {
    pub const NEAREST: Self = Self {
        mag_filter: Filter::Point,
        min_filter: Filter::Point,
        mip_filter: MipFilter::None,
        wrap_u: Wrap::Repeat,
        wrap_v: Wrap::Repeat,
        border: Rgba { r: 1.0, g: 0.0, b: 1.0, a: 1.0 },
        lod_bias: 0.0,
    };

    pub const BILINEAR: Self = Self {
        mag_filter: Filter::Linear,
        min_filter: Filter::Linear,
        ..Self::NEAREST
    };

    pub const TRILINEAR: Self = Self {
        mip_filter: MipFilter::Linear,
        ..Self::BILINEAR
    };

    pub fn with_wrap(self, wrap: Wrap) -> Self {
        Self {
            wrap_u: wrap,
            wrap_v: wrap,
            ..self
        }
    }

    pub fn with_border(self, border: Rgba<f32>) -> Self {
        Self { border, ..self }
    }

    pub fn with_lod_bias(self, lod_bias: f32) -> Self {
        Self { lod_bias, ..self }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::TRILINEAR
    }
}

/// Samples an [`Image`] using screen-space derivatives of the texture coordinates to pick a level of detail.
#[derive(Copy, Clone, Debug)]
pub struct Sampler2D<'a> {
    image: &'a Image,
    config: SamplerConfig,
}

impl<'a> Sampler2D<'a> {
    /// # Panics
    ///
    /// Panics if the image has no pixels.
    pub fn new(image: &'a Image, config: SamplerConfig) -> Self {
        assert!(!image.is_null(), "Cannot sample an image with no pixels");
        Self { image, config }
    }

    #[inline]
    pub fn image(&self) -> &'a Image {
        self.image
    }

    #[inline]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// The level of detail implied by the given derivatives of the texture coordinates.
    ///
    /// The footprint is the largest component of either derivative, measured against the full mip chain of the image
    /// (whether or not it has been generated).
    pub fn lod(&self, duv_dx: Vec2<f32>, duv_dy: Vec2<f32>) -> f32 {
        let width = duv_dx.map(f32::abs).reduce_partial_max().max(duv_dy.map(f32::abs).reduce_partial_max());
        (self.image.full_mip_count() - 1) as f32 + width.max(1e-8).log2() + self.config.lod_bias
    }

    /// Sample the image at `uv`, given how `uv` changes from one pixel to the next along both screen axes.
    pub fn sample(&self, uv: Vec2<f32>, duv_dx: Vec2<f32>, duv_dy: Vec2<f32>) -> Rgba<f32> {
        self.sample_lod(uv, self.lod(duv_dx, duv_dy))
    }

    /// Sample the image at `uv` with an explicit level of detail.
    pub fn sample_lod(&self, uv: Vec2<f32>, lod: f32) -> Rgba<f32> {
        let uv = match (self.config.wrap_u.apply(uv.x), self.config.wrap_v.apply(uv.y)) {
            (Some(u), Some(v)) => Vec2::new(u, v),
            _ => return self.config.border,
        };

        if lod < 0.0 {
            return match self.config.mag_filter {
                Filter::Point => nearest(&self.image.level(0), uv),
                Filter::Linear => bilinear(&self.image.level(0), uv),
            };
        }

        let last = self.image.mip_count() - 1;
        match (self.config.mip_filter, self.config.min_filter) {
            (MipFilter::None, Filter::Point) => nearest(&self.image.level(0), uv),
            (MipFilter::None, Filter::Linear) => bilinear(&self.image.level(0), uv),
            (MipFilter::Point, filter) => {
                let level = self.image.level((lod.round() as usize).min(last));
                match filter {
                    Filter::Point => nearest(&level, uv),
                    Filter::Linear => bilinear(&level, uv),
                }
            }
            (MipFilter::Linear, Filter::Linear) => trilinear(self.image, uv, lod),
            (MipFilter::Linear, Filter::Point) => {
                let lo = (lod.floor() as usize).min(last);
                let hi = (lo + 1).min(last);
                let t = if hi == lo { 0.0 } else { lod - lod.floor() };
                Rgba::lerp_unchecked(&nearest(&self.image.level(lo), uv), &nearest(&self.image.level(hi), uv), &t)
            }
        }
    }
}
