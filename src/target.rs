//! Shared-access views over images for use as render targets.

use crate::{
    color::{self, GammaSpace, PixelKind, PixelLayout},
    image::Image,
};
use core::marker::PhantomData;
use vek::Rgba;

/// A 2-dimensional surface that may be written to by many threads at once.
///
/// Targets necessarily require additional invariants to be upheld for safe use. Because access to them may be
/// parallelised, it is essential that there is a 1:1 mapping between each position and a unique memory location. The
/// `read_exclusive_unchecked` and `write_exclusive_unchecked` methods may only be invoked by callers that have already
/// ensured that nothing else can access the same pixel at the same time. The rasterizer does this by giving each
/// worker a disjoint block of the target.
pub trait Target: Send + Sync {
    type Texel: Copy;

    fn size(&self) -> [usize; 2];

    /// Read a texel at the given assumed-valid position.
    ///
    /// # Safety
    ///
    /// The position must be within the bounds of the target and access to it must be exclusive for the duration of
    /// the call (nothing else may be reading or writing to this pixel).
    unsafe fn read_exclusive_unchecked(&self, x: usize, y: usize) -> Self::Texel;

    /// Write a texel at the given assumed-valid position.
    ///
    /// # Safety
    ///
    /// The position must be within the bounds of the target and access to it must be exclusive for the duration of
    /// the call (nothing else may be reading or writing to this pixel).
    unsafe fn write_exclusive_unchecked(&self, x: usize, y: usize, texel: Self::Texel);

    /// Read a texel, panicking if the position is out of bounds.
    #[inline]
    fn read(&mut self, x: usize, y: usize) -> Self::Texel {
        let size = self.size();
        assert!(x < size[0] && y < size[1], "Target of size {:?} read at out-of-bounds location {:?}", size, [x, y]);
        // Safety: in bounds and `&mut self` guarantees exclusivity
        unsafe { self.read_exclusive_unchecked(x, y) }
    }

    /// Write a texel, panicking if the position is out of bounds.
    #[inline]
    fn write(&mut self, x: usize, y: usize, texel: Self::Texel) {
        let size = self.size();
        assert!(x < size[0] && y < size[1], "Target of size {:?} written at out-of-bounds location {:?}", size, [x, y]);
        // Safety: in bounds and `&mut self` guarantees exclusivity
        unsafe { self.write_exclusive_unchecked(x, y, texel) }
    }
}

/// The raw parts of a single-layer image that a target writes through.
#[derive(Copy, Clone)]
struct RawSurface<'a> {
    ptr: *mut u8,
    size: [usize; 2],
    pixel_size: usize,
    phantom: PhantomData<&'a mut [u8]>,
}

impl<'a> RawSurface<'a> {
    fn new(image: &'a mut Image, kind: PixelKind) -> Self {
        assert_eq!(
            image.layout().kind(),
            kind,
            "Cannot use a {:?} image as a {:?} target",
            image.layout(),
            kind,
        );
        let size = image.size();
        let pixel_size = image.pixel_size();
        Self {
            ptr: image.bytes_mut().as_mut_ptr(),
            size,
            pixel_size,
            phantom: PhantomData,
        }
    }

    #[inline(always)]
    unsafe fn pixel(&self, x: usize, y: usize) -> *mut u8 {
        debug_assert!(x < self.size[0] && y < self.size[1], "{:?} out of bounds of {:?}", [x, y], self.size);
        self.ptr.add((y * self.size[0] + x) * self.pixel_size)
    }

    #[inline(always)]
    unsafe fn read_word(&self, x: usize, y: usize) -> u32 {
        (self.pixel(x, y) as *const u32).read_unaligned()
    }

    #[inline(always)]
    unsafe fn write_word(&self, x: usize, y: usize, word: u32) {
        (self.pixel(x, y) as *mut u32).write_unaligned(word)
    }
}

/// A colour target over the first layer of an image. Texels are linear-space colours.
pub struct ColorTarget<'a> {
    surface: RawSurface<'a>,
    layout: PixelLayout,
    gamma: GammaSpace,
}

// Safety: the surface is uniquely borrowed for `'a` and callers uphold per-pixel exclusivity
unsafe impl<'a> Send for ColorTarget<'a> {}
unsafe impl<'a> Sync for ColorTarget<'a> {}

impl<'a> ColorTarget<'a> {
    /// # Panics
    ///
    /// Panics if the image does not store colours.
    pub fn new(image: &'a mut Image) -> Self {
        let (layout, gamma) = (image.layout(), image.gamma());
        Self {
            surface: RawSurface::new(image, PixelKind::Color),
            layout,
            gamma,
        }
    }
}

impl<'a> Target for ColorTarget<'a> {
    type Texel = Rgba<f32>;

    #[inline(always)]
    fn size(&self) -> [usize; 2] {
        self.surface.size
    }

    #[inline(always)]
    unsafe fn read_exclusive_unchecked(&self, x: usize, y: usize) -> Self::Texel {
        let c = color::unpack_color(self.surface.read_word(x, y), self.layout);
        color::color_to_space(c, self.gamma, GammaSpace::Linear)
    }

    #[inline(always)]
    unsafe fn write_exclusive_unchecked(&self, x: usize, y: usize, texel: Self::Texel) {
        let c = color::color_to_space(texel, GammaSpace::Linear, self.gamma);
        self.surface.write_word(x, y, color::pack_color(c, self.layout));
    }
}

/// A depth target over the first layer of a `DepthF32` image.
pub struct DepthTarget<'a> {
    surface: RawSurface<'a>,
}

// Safety: the surface is uniquely borrowed for `'a` and callers uphold per-pixel exclusivity
unsafe impl<'a> Send for DepthTarget<'a> {}
unsafe impl<'a> Sync for DepthTarget<'a> {}

impl<'a> DepthTarget<'a> {
    /// # Panics
    ///
    /// Panics if the image does not store depth.
    pub fn new(image: &'a mut Image) -> Self {
        Self {
            surface: RawSurface::new(image, PixelKind::Depth),
        }
    }
}

impl<'a> Target for DepthTarget<'a> {
    type Texel = f32;

    #[inline(always)]
    fn size(&self) -> [usize; 2] {
        self.surface.size
    }

    #[inline(always)]
    unsafe fn read_exclusive_unchecked(&self, x: usize, y: usize) -> Self::Texel {
        f32::from_bits(self.surface.read_word(x, y))
    }

    #[inline(always)]
    unsafe fn write_exclusive_unchecked(&self, x: usize, y: usize, texel: Self::Texel) {
        self.surface.write_word(x, y, texel.to_bits());
    }
}
