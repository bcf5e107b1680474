//! A CPU triangle rasterizer.
//!
//! Implement [`Pipeline`] to describe how vertices are transformed and how fragments are shaded, then hand
//! [`Model`]s to a [`Rasterizer`] to draw them into a [`FrameBuffer`]:
//!
//! - Vertex data is interpolated across triangles with perspective correction (see [`WeightedSum`])
//! - Triangles sharing an edge never both cover a pixel
//! - Work is split into batches and tiles that run in parallel (see [`Scheduler`])
//! - Depth testing, culling and blending are configured through [`Pipeline`] methods
//! - Textures are sampled with filtering and mipmapping through [`Sampler2D`]
//!
//! Positions on a target are measured from its bottom-left corner.

pub mod arena;
pub mod barycentric;
pub mod color;
pub mod framebuffer;
pub mod image;
pub mod interpolate;
pub mod math;
pub mod model;
pub mod parallel;
pub mod pipeline;
pub mod rasterizer;
pub mod sampler;
pub mod target;

// Reexports
#[cfg(feature = "par")]
pub use self::parallel::ThreadPool;
pub use self::{
    barycentric::{BarycentricCoordinates, BarycentricHelper, WindingOrder},
    color::{GammaSpace, PixelKind, PixelLayout},
    framebuffer::{ColorBufferConfig, FrameBuffer, FrameBufferConfig},
    image::{Image, ImageConfig, PixelValue},
    interpolate::WeightedSum,
    model::Model,
    parallel::{DefaultScheduler, Inline, Scheduler},
    pipeline::{
        BlendFactor, BlendMode, BlendOperator, Comparator, CullMode, DepthMode, Face, FragmentIn, FragmentOut,
        Pipeline, VertexIn,
    },
    rasterizer::{DrawStats, Rasterizer, RasterizerConfig},
    sampler::{Filter, MipFilter, Sampler2D, SamplerConfig, Wrap},
    target::{ColorTarget, DepthTarget, Target},
};
