use vek::Rgba;

/// The exponent of the sRGB transfer curve.
pub const GAMMA: f32 = 2.4;

/// The space that colour channels are stored in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GammaSpace {
    /// Channels are stored sRGB-encoded and are converted to and from linear light on access.
    GammaCorrected,
    /// Channels are stored as linear light.
    Linear,
}

impl Default for GammaSpace {
    fn default() -> Self {
        GammaSpace::GammaCorrected
    }
}

/// What a pixel represents, independent of how its bits are arranged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelKind {
    Color,
    Depth,
    Stencil,
}

/// Exact positions of channels within a pixel and their size in bits.
///
/// Packed colour layouts are named from the most significant byte of a 32-bit word to the least significant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    A8R8G8B8,
    B8G8R8A8,
    R8G8B8A8,
    DepthF32,
    StencilU8,
}

impl Default for PixelLayout {
    fn default() -> Self {
        PixelLayout::A8R8G8B8
    }
}

impl PixelLayout {
    /// Size of one pixel in bytes.
    #[inline]
    pub const fn pixel_size(self) -> usize {
        match self {
            PixelLayout::A8R8G8B8 | PixelLayout::B8G8R8A8 | PixelLayout::R8G8B8A8 => 4,
            PixelLayout::DepthF32 => 4,
            PixelLayout::StencilU8 => 1,
        }
    }

    #[inline]
    pub const fn kind(self) -> PixelKind {
        match self {
            PixelLayout::A8R8G8B8 | PixelLayout::B8G8R8A8 | PixelLayout::R8G8B8A8 => PixelKind::Color,
            PixelLayout::DepthF32 => PixelKind::Depth,
            PixelLayout::StencilU8 => PixelKind::Stencil,
        }
    }

    /// Byte shifts of the red, green, blue and alpha channels within a packed colour word.
    #[inline]
    const fn shifts(self) -> [u32; 4] {
        match self {
            PixelLayout::A8R8G8B8 => [16, 8, 0, 24],
            PixelLayout::B8G8R8A8 => [8, 16, 24, 0],
            PixelLayout::R8G8B8A8 => [24, 16, 8, 0],
            PixelLayout::DepthF32 | PixelLayout::StencilU8 => [0; 4],
        }
    }
}

#[inline]
pub fn to_gamma_corrected(value: f32) -> f32 {
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / GAMMA) - 0.055
    }
}

#[inline]
pub fn to_linear(value: f32) -> f32 {
    if value <= 0.040_45 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(GAMMA)
    }
}

/// Convert the colour channels (but not alpha) of a linear colour into sRGB space.
#[inline]
pub fn color_to_gamma_corrected(c: Rgba<f32>) -> Rgba<f32> {
    Rgba::new(to_gamma_corrected(c.r), to_gamma_corrected(c.g), to_gamma_corrected(c.b), c.a)
}

/// Convert the colour channels (but not alpha) of an sRGB colour into linear space.
#[inline]
pub fn color_to_linear(c: Rgba<f32>) -> Rgba<f32> {
    Rgba::new(to_linear(c.r), to_linear(c.g), to_linear(c.b), c.a)
}

/// Convert a colour that is currently in `from` space into `to` space.
#[inline]
pub fn color_to_space(c: Rgba<f32>, from: GammaSpace, to: GammaSpace) -> Rgba<f32> {
    match (from, to) {
        (GammaSpace::Linear, GammaSpace::GammaCorrected) => color_to_gamma_corrected(c),
        (GammaSpace::GammaCorrected, GammaSpace::Linear) => color_to_linear(c),
        _ => c,
    }
}

/// Quantise a colour with channels in `[0, 1]` into a packed 32-bit word. Out-of-range channels are saturated.
#[inline]
pub fn pack_color(c: Rgba<f32>, layout: PixelLayout) -> u32 {
    debug_assert_eq!(layout.kind(), PixelKind::Color, "{:?} is not a colour layout", layout);
    let quantize = |e: f32| (e.max(0.0).min(1.0) * 255.0).round() as u32;
    let [r, g, b, a] = layout.shifts();
    quantize(c.r) << r | quantize(c.g) << g | quantize(c.b) << b | quantize(c.a) << a
}

#[inline]
pub fn unpack_color(word: u32, layout: PixelLayout) -> Rgba<f32> {
    debug_assert_eq!(layout.kind(), PixelKind::Color, "{:?} is not a colour layout", layout);
    let channel = |shift: u32| ((word >> shift) & 0xFF) as f32 / 255.0;
    let [r, g, b, a] = layout.shifts();
    Rgba::new(channel(r), channel(g), channel(b), channel(a))
}
