use crate::{
    barycentric::{BarycentricCoordinates, WindingOrder},
    interpolate::WeightedSum,
};
use vek::{Rgb, Rgba};

/// A comparison between the depth of a new fragment and the depth already in the depth target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Comparator {
    Never,
    Always,
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
}

impl Comparator {
    /// Whether `new` passes the comparison against `current`.
    #[inline]
    pub fn compare(self, new: f32, current: f32) -> bool {
        match self {
            Comparator::Never => false,
            Comparator::Always => true,
            Comparator::Less => new < current,
            Comparator::Greater => new > current,
            Comparator::Equal => new == current,
            Comparator::NotEqual => new != current,
            Comparator::LessEqual => new <= current,
            Comparator::GreaterEqual => new >= current,
        }
    }
}

/// Defines how a [`Pipeline`] will interact with the depth target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepthMode {
    /// The test, if any, that occurs when comparing the depth of the new fragment with that of the current depth.
    pub test: Option<Comparator>,
    /// Whether the fragment's depth should be written to the depth target if the test was passed.
    pub write: bool,
}

impl DepthMode {
    pub const NONE: Self = Self {
        test: None,
        write: false,
    };

    pub const LESS_WRITE: Self = Self {
        test: Some(Comparator::Less),
        write: true,
    };

    pub const LESS_EQUAL_WRITE: Self = Self {
        test: Some(Comparator::LessEqual),
        write: true,
    };

    pub const GREATER_WRITE: Self = Self {
        test: Some(Comparator::Greater),
        write: true,
    };

    pub const LESS_PASS: Self = Self {
        test: Some(Comparator::Less),
        write: false,
    };

    pub const GREATER_PASS: Self = Self {
        test: Some(Comparator::Greater),
        write: false,
    };

    /// Determine whether the depth mode needs to interact with the depth target at all.
    pub fn uses_depth(&self) -> bool {
        self.test.is_some() || self.write
    }

    /// Apply this mode's test. Depths outside of `[0, 1]` always fail a test.
    #[inline]
    pub fn test(&self, new: f32, current: f32) -> bool {
        match self.test {
            Some(cmp) => (0.0..=1.0).contains(&new) && cmp.compare(new, current),
            None => true,
        }
    }
}

impl Default for DepthMode {
    fn default() -> Self {
        Self::NONE
    }
}

/// Which faces of a triangle are culled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
    FrontBack,
}

/// Defines which triangles a [`Pipeline`] skips based on the order in which their vertices appear on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CullMode {
    pub enabled: bool,
    pub face: Face,
    /// The winding order of triangles that face the viewer.
    pub front_face: WindingOrder,
}

impl CullMode {
    pub const NONE: Self = Self {
        enabled: false,
        face: Face::Back,
        front_face: WindingOrder::CounterClockwise,
    };

    pub const BACK: Self = Self {
        enabled: true,
        face: Face::Back,
        front_face: WindingOrder::CounterClockwise,
    };

    pub const FRONT: Self = Self {
        enabled: true,
        face: Face::Front,
        front_face: WindingOrder::CounterClockwise,
    };

    pub const ALL: Self = Self {
        enabled: true,
        face: Face::FrontBack,
        front_face: WindingOrder::CounterClockwise,
    };

    pub fn with_front_face(self, front_face: WindingOrder) -> Self {
        Self { front_face, ..self }
    }

    /// Whether a triangle with the given winding order should be skipped.
    #[inline]
    pub fn culls(&self, winding: WindingOrder) -> bool {
        if !self.enabled {
            return false;
        }
        match self.face {
            Face::FrontBack => true,
            Face::Front => winding == self.front_face,
            Face::Back => winding != self.front_face,
        }
    }
}

impl Default for CullMode {
    fn default() -> Self {
        Self::BACK
    }
}

/// A multiplier applied to one side of a blend operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    DstColor,
    OneMinusSrcColor,
    OneMinusDstColor,
    SrcAlpha,
    DstAlpha,
    OneMinusSrcAlpha,
    OneMinusDstAlpha,
    ConstColor,
    OneMinusConstColor,
    ConstAlpha,
    OneMinusConstAlpha,
}

impl BlendFactor {
    #[inline]
    fn rgb(self, src: Rgba<f32>, dst: Rgba<f32>, constant: Rgba<f32>) -> Rgb<f32> {
        match self {
            BlendFactor::Zero => Rgb::zero(),
            BlendFactor::One => Rgb::one(),
            BlendFactor::SrcColor => Rgb::from(src),
            BlendFactor::DstColor => Rgb::from(dst),
            BlendFactor::OneMinusSrcColor => Rgb::one() - Rgb::from(src),
            BlendFactor::OneMinusDstColor => Rgb::one() - Rgb::from(dst),
            BlendFactor::ConstColor => Rgb::from(constant),
            BlendFactor::OneMinusConstColor => Rgb::one() - Rgb::from(constant),
            alpha => Rgb::broadcast(alpha.alpha(src, dst, constant)),
        }
    }

    // Colour factors used for alpha take the alpha channel of the colour
    #[inline]
    fn alpha(self, src: Rgba<f32>, dst: Rgba<f32>, constant: Rgba<f32>) -> f32 {
        match self {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => 1.0,
            BlendFactor::SrcColor | BlendFactor::SrcAlpha => src.a,
            BlendFactor::DstColor | BlendFactor::DstAlpha => dst.a,
            BlendFactor::OneMinusSrcColor | BlendFactor::OneMinusSrcAlpha => 1.0 - src.a,
            BlendFactor::OneMinusDstColor | BlendFactor::OneMinusDstAlpha => 1.0 - dst.a,
            BlendFactor::ConstColor | BlendFactor::ConstAlpha => constant.a,
            BlendFactor::OneMinusConstColor | BlendFactor::OneMinusConstAlpha => 1.0 - constant.a,
        }
    }
}

/// How the scaled source and destination are combined.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlendOperator {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl BlendOperator {
    #[inline]
    fn apply(self, src: f32, dst: f32) -> f32 {
        let x = match self {
            BlendOperator::Add => src + dst,
            BlendOperator::Subtract => src - dst,
            BlendOperator::ReverseSubtract => dst - src,
            BlendOperator::Min => src.min(dst),
            BlendOperator::Max => src.max(dst),
        };
        x.max(0.0).min(1.0)
    }
}

/// Defines how a [`Pipeline`] combines new fragments with the colour already in the colour target.
///
/// Both sides are scaled by their factor before the operator is applied, and the result is clamped to `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlendMode {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOperator,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOperator,
    /// The colour used by the `Const*` factors.
    pub constant: Rgba<f32>,
}

impl BlendMode {
    /// The new fragment replaces the old colour.
    pub const REPLACE: Self = Self {
        src_color: BlendFactor::One,
        dst_color: BlendFactor::Zero,
        color_op: BlendOperator::Add,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        alpha_op: BlendOperator::Add,
        constant: Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 },
    };

    /// Conventional "over" alpha blending.
    pub const ALPHA: Self = Self {
        src_color: BlendFactor::SrcAlpha,
        dst_color: BlendFactor::OneMinusSrcAlpha,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
        ..Self::REPLACE
    };

    pub const ADDITIVE: Self = Self {
        src_color: BlendFactor::One,
        dst_color: BlendFactor::One,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::One,
        ..Self::REPLACE
    };

    /// Blend a new colour into the current one.
    pub fn blend(&self, src: Rgba<f32>, dst: Rgba<f32>) -> Rgba<f32> {
        let src_rgb = Rgb::from(src) * self.src_color.rgb(src, dst, self.constant);
        let dst_rgb = Rgb::from(dst) * self.dst_color.rgb(src, dst, self.constant);
        let src_a = src.a * self.src_alpha.alpha(src, dst, self.constant);
        let dst_a = dst.a * self.dst_alpha.alpha(src, dst, self.constant);
        Rgba::new(
            self.color_op.apply(src_rgb.r, dst_rgb.r),
            self.color_op.apply(src_rgb.g, dst_rgb.g),
            self.color_op.apply(src_rgb.b, dst_rgb.b),
            self.alpha_op.apply(src_a, dst_a),
        )
    }
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::REPLACE
    }
}

/// Everything the vertex shader knows about the vertex it is processing.
pub struct VertexIn<'a, P: Pipeline> {
    /// Index of the vertex across every instance of the draw call.
    pub index: usize,
    /// Index of the vertex within the model.
    pub vertex_index: usize,
    pub instance_index: usize,
    pub vertex: &'a P::Vertex,
    /// The per-instance data, if the model has any.
    pub instance: Option<&'a P::Instance>,
    pub constants: &'a P::Constants,
}

/// Everything the fragment shader knows about the fragment it is processing.
pub struct FragmentIn<'a, V> {
    /// The pixel being shaded, with the origin at the bottom-left of the target.
    pub position: [usize; 2],
    /// Screen-space barycentric coordinates of the pixel centre.
    pub barycentric: BarycentricCoordinates,
    /// The perspective-correct clip-space W of the fragment.
    pub w: f32,
    /// The perspective-correct depth of the fragment.
    pub depth: f32,
    /// The winding order of the triangle on screen.
    pub winding: WindingOrder,
    pub(crate) vertices: [&'a V; 3],
    pub(crate) one_over_w: [f32; 3],
    // Barycentrics of an inside neighbour along each axis, with the sign of the step towards it
    pub(crate) neighbours: [Option<(BarycentricCoordinates, f32)>; 2],
}

impl<'a, V> FragmentIn<'a, V> {
    /// The vertex shader outputs of the triangle's three vertices.
    #[inline]
    pub fn vertices(&self) -> [&'a V; 3] {
        self.vertices
    }

    #[inline(always)]
    fn perspective_weights(&self, b: &BarycentricCoordinates) -> [f32; 3] {
        let [a, c, d] = self.one_over_w;
        let (x, y, z) = (b.x * a, b.y * c, b.z * d);
        let w = 1.0 / (x + y + z);
        [x * w, y * w, z * w]
    }

    /// Interpolate a value derived from the vertex data across the triangle, correcting for perspective.
    #[inline]
    pub fn interpolate_with<T: WeightedSum, F: Fn(&V) -> T>(&self, f: F) -> T {
        let [x, y, z] = self.perspective_weights(&self.barycentric);
        T::weighted_sum3(&f(self.vertices[0]), &f(self.vertices[1]), &f(self.vertices[2]), x, y, z)
    }

    /// Interpolate the vertex data across the triangle, correcting for perspective.
    #[inline]
    pub fn interpolate(&self) -> V
    where
        V: WeightedSum + Clone,
    {
        self.interpolate_with(V::clone)
    }

    fn derivative_with<T: WeightedSum, F: Fn(&V) -> T>(&self, axis: usize, f: F) -> T {
        let here = self.perspective_weights(&self.barycentric);
        let [x, y, z] = match self.neighbours[axis] {
            Some((b, sign)) => {
                let there = self.perspective_weights(&b);
                [
                    (there[0] - here[0]) * sign,
                    (there[1] - here[1]) * sign,
                    (there[2] - here[2]) * sign,
                ]
            }
            None => [0.0; 3],
        };
        T::weighted_sum3(&f(self.vertices[0]), &f(self.vertices[1]), &f(self.vertices[2]), x, y, z)
    }

    /// The change of a value derived from the vertex data between this pixel and the next one along +x.
    ///
    /// Computed from whichever horizontal neighbour is covered by the triangle. Fragments without a covered horizontal
    /// neighbour have a derivative of zero.
    #[inline]
    pub fn derivative_x_with<T: WeightedSum, F: Fn(&V) -> T>(&self, f: F) -> T {
        self.derivative_with(0, f)
    }

    /// The change of a value derived from the vertex data between this pixel and the next one along +y.
    ///
    /// Computed from whichever vertical neighbour is covered by the triangle. Fragments without a covered vertical
    /// neighbour have a derivative of zero.
    #[inline]
    pub fn derivative_y_with<T: WeightedSum, F: Fn(&V) -> T>(&self, f: F) -> T {
        self.derivative_with(1, f)
    }

    #[inline]
    pub fn derivative_x(&self) -> V
    where
        V: WeightedSum + Clone,
    {
        self.derivative_x_with(V::clone)
    }

    #[inline]
    pub fn derivative_y(&self) -> V
    where
        V: WeightedSum + Clone,
    {
        self.derivative_y_with(V::clone)
    }
}

/// The output of the fragment shader.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FragmentOut {
    /// The linear-space colour of the fragment.
    pub color: Rgba<f32>,
    /// A replacement for the fragment's depth. Only honoured by pipelines that declare
    /// [`Pipeline::fragment_changes_depth`].
    pub depth: Option<f32>,
}

impl FragmentOut {
    #[inline]
    pub fn color(color: Rgba<f32>) -> Self {
        Self { color, depth: None }
    }

    #[inline]
    pub fn with_depth(self, depth: f32) -> Self {
        Self {
            depth: Some(depth),
            ..self
        }
    }
}

impl From<Rgba<f32>> for FragmentOut {
    fn from(color: Rgba<f32>) -> Self {
        Self::color(color)
    }
}

/// Represents the high-level structure of a rendering pipeline.
///
/// Conventionally, uniform data is stored as state within the pipeline itself, although per-draw data may also be
/// passed as the model's constants.
///
/// Additional methods such as [`Pipeline::depth_mode`], [`Pipeline::cull_mode`], etc. may be implemented to customize
/// the behaviour of the pipeline even further.
pub trait Pipeline: Sized + Sync {
    type Vertex: Sync;
    type Instance: Sync;
    type Constants: Sync;
    type VertexData: Clone + WeightedSum + Send + Sync;

    /// Transforms a vertex into a homogeneous clip-space position and a [`Pipeline::VertexData`] to be interpolated
    /// and passed to the fragment shader.
    fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], Self::VertexData);

    /// Shades a fragment covered by a triangle.
    fn fragment(&self, input: &FragmentIn<'_, Self::VertexData>) -> FragmentOut;

    /// Returns the [`BlendMode`] used by the default implementation of [`Pipeline::blend`].
    #[inline]
    fn blend_mode(&self) -> BlendMode {
        BlendMode::default()
    }

    /// Blend a new fragment's colour with the colour currently in the colour target.
    #[inline]
    fn blend(&self, new: Rgba<f32>, current: Rgba<f32>) -> Rgba<f32> {
        self.blend_mode().blend(new, current)
    }

    /// Returns the [`DepthMode`] of this pipeline.
    #[inline]
    fn depth_mode(&self) -> DepthMode {
        DepthMode::default()
    }

    /// Decide whether a fragment with depth `new` replaces one with depth `current`.
    ///
    /// Only called when the [`DepthMode`] has a test.
    #[inline]
    fn depth_test(&self, new: f32, current: f32) -> bool {
        self.depth_mode().test(new, current)
    }

    /// Returns the [`CullMode`] of this pipeline.
    #[inline]
    fn cull_mode(&self) -> CullMode {
        CullMode::default()
    }

    /// Whether the fragment shader may replace the fragment's depth. Disables the early depth test.
    #[inline]
    fn fragment_changes_depth(&self) -> bool {
        false
    }
}
