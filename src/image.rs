use crate::{
    color::{self, GammaSpace, PixelKind, PixelLayout},
    math::Bounds2,
};
use vek::Rgba;

/// The shape and pixel format of an [`Image`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageConfig {
    pub width: usize,
    pub height: usize,
    /// Number of 2D layers stacked in the buffer.
    pub depth: usize,
    pub layout: PixelLayout,
    pub gamma: GammaSpace,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            depth: 1,
            layout: PixelLayout::default(),
            gamma: GammaSpace::default(),
        }
    }
}

impl ImageConfig {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_layout(self, layout: PixelLayout) -> Self {
        Self { layout, ..self }
    }

    pub fn with_gamma(self, gamma: GammaSpace) -> Self {
        Self { gamma, ..self }
    }

    pub fn with_depth(self, depth: usize) -> Self {
        Self { depth, ..self }
    }

    /// Total size of a buffer with this configuration, in bytes.
    pub fn byte_count(&self) -> usize {
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.depth))
            .and_then(|n| n.checked_mul(self.layout.pixel_size()))
            .unwrap_or_else(|| panic!("Image of size {}x{}x{} is too large", self.width, self.height, self.depth))
    }
}

/// A value that can be stored in a pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PixelValue {
    /// A colour in linear space.
    Color(Rgba<f32>),
    Depth(f32),
    Stencil(u8),
}

impl PixelValue {
    #[inline]
    pub fn kind(&self) -> PixelKind {
        match self {
            PixelValue::Color(_) => PixelKind::Color,
            PixelValue::Depth(_) => PixelKind::Depth,
            PixelValue::Stencil(_) => PixelKind::Stencil,
        }
    }
}

#[inline(always)]
pub(crate) fn read_word(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(word)
}

#[inline(always)]
pub(crate) fn write_word(bytes: &mut [u8], offset: usize, word: u32) {
    bytes[offset..offset + 4].copy_from_slice(&word.to_ne_bytes());
}

/// A borrowed view of one level of an image's mip chain.
#[derive(Copy, Clone, Debug)]
pub struct Level<'a> {
    width: usize,
    height: usize,
    layout: PixelLayout,
    gamma: GammaSpace,
    bytes: &'a [u8],
}

impl<'a> Level<'a> {
    #[inline]
    pub fn size(&self) -> [usize; 2] {
        [self.width, self.height]
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Read the colour of a pixel on the first layer of this level, in linear space.
    ///
    /// # Panics
    ///
    /// Panics if the position is out of bounds or the level does not hold colours.
    #[inline]
    pub fn read_color(&self, [x, y]: [usize; 2]) -> Rgba<f32> {
        assert_eq!(self.layout.kind(), PixelKind::Color, "Cannot read a colour from a {:?} image", self.layout);
        assert!(
            x < self.width && y < self.height,
            "Attempted to read image of size {:?} at out-of-bounds location {:?}",
            self.size(),
            [x, y],
        );
        let word = read_word(self.bytes, (y * self.width + x) * 4);
        let c = color::unpack_color(word, self.layout);
        match self.gamma {
            GammaSpace::GammaCorrected => color::color_to_linear(c),
            GammaSpace::Linear => c,
        }
    }
}

/// Storage for one level of the mip chain beyond the base image.
#[derive(Clone, Debug)]
struct MipSurface {
    width: usize,
    height: usize,
    bytes: Vec<u8>,
}

/// A CPU-side pixel buffer.
///
/// Images use a coordinate system with the origin at the bottom-left pixel, x growing to the right and y growing
/// upwards. Pixel data is laid out in rows, layer after layer. An image with zero width or height is valid and acts
/// as a placeholder that holds no pixels.
#[derive(Clone, Debug)]
pub struct Image {
    config: ImageConfig,
    bytes: Vec<u8>,
    // Levels `1..N` of the mip chain. Level 0 is always `bytes`.
    mips: Vec<MipSurface>,
}

impl Image {
    /// Create a new image with every byte set to zero.
    pub fn new(config: ImageConfig) -> Self {
        Self {
            bytes: vec![0; config.byte_count()],
            config,
            mips: Vec::new(),
        }
    }

    /// Create a new image from existing pixel data laid out according to `config`.
    ///
    /// # Panics
    ///
    /// Panics if the length of `bytes` does not match the configuration.
    pub fn with_data(config: ImageConfig, bytes: Vec<u8>) -> Self {
        assert_eq!(
            bytes.len(),
            config.byte_count(),
            "Image data does not match a {}x{}x{} {:?} image",
            config.width,
            config.height,
            config.depth,
            config.layout,
        );
        Self {
            bytes,
            config,
            mips: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.config.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.config.height
    }

    /// Number of layers in the image.
    #[inline]
    pub fn depth(&self) -> usize {
        self.config.depth
    }

    #[inline]
    pub fn size(&self) -> [usize; 2] {
        [self.config.width, self.config.height]
    }

    #[inline]
    pub fn bounds(&self) -> Bounds2 {
        Bounds2::from_size(self.size())
    }

    #[inline]
    pub fn layout(&self) -> PixelLayout {
        self.config.layout
    }

    #[inline]
    pub fn gamma(&self) -> GammaSpace {
        self.config.gamma
    }

    #[inline]
    pub fn pixel_size(&self) -> usize {
        self.config.layout.pixel_size()
    }

    /// Whether this image is a placeholder without any pixels.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.config.width == 0 || self.config.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.config.height != 0 {
            self.config.width as f32 / self.config.height as f32
        } else {
            1.0
        }
    }

    /// View the raw pixel data of the base image.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// View the raw pixel data of the base image mutably. Existing mip levels are not updated.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[inline]
    fn offset(&self, [x, y, z]: [usize; 3], kind: PixelKind) -> usize {
        assert_eq!(
            self.config.layout.kind(),
            kind,
            "Cannot access {:?} data in a {:?} image",
            kind,
            self.config.layout,
        );
        assert!(
            x < self.config.width && y < self.config.height && z < self.config.depth,
            "Attempted to access image of size {:?} at out-of-bounds location {:?}",
            [self.config.width, self.config.height, self.config.depth],
            [x, y, z],
        );
        ((z * self.config.height + y) * self.config.width + x) * self.config.layout.pixel_size()
    }

    /// Read the colour of a pixel in linear space.
    #[inline]
    pub fn read_color(&self, [x, y]: [usize; 2]) -> Rgba<f32> {
        self.read_color_at([x, y, 0])
    }

    /// Read the colour of a pixel on any layer, in linear space.
    pub fn read_color_at(&self, pos: [usize; 3]) -> Rgba<f32> {
        let offset = self.offset(pos, PixelKind::Color);
        let c = color::unpack_color(read_word(&self.bytes, offset), self.config.layout);
        match self.config.gamma {
            GammaSpace::GammaCorrected => color::color_to_linear(c),
            GammaSpace::Linear => c,
        }
    }

    #[inline]
    pub fn read_depth(&self, [x, y]: [usize; 2]) -> f32 {
        self.read_depth_at([x, y, 0])
    }

    pub fn read_depth_at(&self, pos: [usize; 3]) -> f32 {
        let offset = self.offset(pos, PixelKind::Depth);
        f32::from_bits(read_word(&self.bytes, offset))
    }

    #[inline]
    pub fn read_stencil(&self, [x, y]: [usize; 2]) -> u8 {
        self.read_stencil_at([x, y, 0])
    }

    pub fn read_stencil_at(&self, pos: [usize; 3]) -> u8 {
        self.bytes[self.offset(pos, PixelKind::Stencil)]
    }

    /// Read whatever kind of value this image stores.
    pub fn read(&self, [x, y]: [usize; 2]) -> PixelValue {
        match self.config.layout.kind() {
            PixelKind::Color => PixelValue::Color(self.read_color([x, y])),
            PixelKind::Depth => PixelValue::Depth(self.read_depth([x, y])),
            PixelKind::Stencil => PixelValue::Stencil(self.read_stencil([x, y])),
        }
    }

    /// Write a linear-space colour into a pixel.
    #[inline]
    pub fn write_color(&mut self, [x, y]: [usize; 2], c: Rgba<f32>) {
        self.write_at([x, y, 0], PixelValue::Color(c));
    }

    #[inline]
    pub fn write_depth(&mut self, [x, y]: [usize; 2], depth: f32) {
        self.write_at([x, y, 0], PixelValue::Depth(depth));
    }

    #[inline]
    pub fn write_stencil(&mut self, [x, y]: [usize; 2], stencil: u8) {
        self.write_at([x, y, 0], PixelValue::Stencil(stencil));
    }

    /// Write a value into a pixel.
    ///
    /// # Panics
    ///
    /// Panics if the kind of value does not match the pixel layout or the position is out of bounds.
    #[inline]
    pub fn write(&mut self, [x, y]: [usize; 2], value: PixelValue) {
        self.write_at([x, y, 0], value);
    }

    pub fn write_at(&mut self, pos: [usize; 3], value: PixelValue) {
        let offset = self.offset(pos, value.kind());
        match value {
            PixelValue::Color(c) => {
                let word = self.encode_color(c);
                write_word(&mut self.bytes, offset, word);
            }
            PixelValue::Depth(depth) => write_word(&mut self.bytes, offset, depth.to_bits()),
            PixelValue::Stencil(stencil) => self.bytes[offset] = stencil,
        }
    }

    /// Pack a linear-space colour into this image's layout and gamma space.
    #[inline]
    pub(crate) fn encode_color(&self, c: Rgba<f32>) -> u32 {
        let c = match self.config.gamma {
            GammaSpace::GammaCorrected => color::color_to_gamma_corrected(c),
            GammaSpace::Linear => c,
        };
        color::pack_color(c, self.config.layout)
    }

    /// Fill every pixel of every layer with the given value.
    ///
    /// # Panics
    ///
    /// Panics if the kind of value does not match the pixel layout.
    pub fn clear(&mut self, value: PixelValue) {
        assert_eq!(
            self.config.layout.kind(),
            value.kind(),
            "Cannot clear a {:?} image with {:?}",
            self.config.layout,
            value,
        );
        match value {
            PixelValue::Color(c) => {
                let word = self.encode_color(c).to_ne_bytes();
                self.bytes.chunks_exact_mut(4).for_each(|px| px.copy_from_slice(&word));
            }
            PixelValue::Depth(depth) => {
                let word = depth.to_bits().to_ne_bytes();
                self.bytes.chunks_exact_mut(4).for_each(|px| px.copy_from_slice(&word));
            }
            PixelValue::Stencil(stencil) => self.bytes.iter_mut().for_each(|px| *px = stencil),
        }
    }

    #[inline]
    pub fn clear_color(&mut self, c: Rgba<f32>) {
        self.clear(PixelValue::Color(c));
    }

    #[inline]
    pub fn clear_depth(&mut self, depth: f32) {
        self.clear(PixelValue::Depth(depth));
    }

    #[inline]
    pub fn clear_stencil(&mut self, stencil: u8) {
        self.clear(PixelValue::Stencil(stencil));
    }

    /// Convert every pixel into a new layout and gamma space in place.
    ///
    /// Only conversions between 4-byte colour layouts are supported. Existing mip levels are regenerated.
    ///
    /// # Panics
    ///
    /// Panics if either the current or the new layout is not a 4-byte colour layout.
    pub fn set_pixel_format(&mut self, gamma: GammaSpace, layout: PixelLayout) {
        assert_eq!(self.config.layout.kind(), PixelKind::Color, "Cannot convert a {:?} image", self.config.layout);
        assert!(
            layout.kind() == PixelKind::Color && layout.pixel_size() == 4,
            "Cannot convert an image into {:?}, only 4-byte colour layouts are supported",
            layout,
        );

        let (old_layout, old_gamma) = (self.config.layout, self.config.gamma);
        self.bytes.chunks_exact_mut(4).for_each(|px| {
            let mut word = [0; 4];
            word.copy_from_slice(px);
            let c = color::unpack_color(u32::from_ne_bytes(word), old_layout);
            let c = color::color_to_space(c, old_gamma, gamma);
            px.copy_from_slice(&color::pack_color(c, layout).to_ne_bytes());
        });

        self.config.layout = layout;
        self.config.gamma = gamma;

        if self.has_mips() {
            self.generate_mips();
        }
    }

    /// Length of the complete mip chain for an image of this size, whether or not it has been generated.
    pub fn full_mip_count(&self) -> usize {
        let largest = self.config.width.max(self.config.height);
        if largest == 0 {
            1
        } else {
            // floor(log2(largest)) + 1
            (usize::BITS - largest.leading_zeros()) as usize
        }
    }

    /// Number of available mip levels, including the base image.
    #[inline]
    pub fn mip_count(&self) -> usize {
        1 + self.mips.len()
    }

    #[inline]
    pub fn has_mips(&self) -> bool {
        !self.mips.is_empty()
    }

    /// Get a view of a level of the mip chain. Level 0 is the base image itself.
    ///
    /// # Panics
    ///
    /// Panics if the level has not been generated.
    pub fn level(&self, level: usize) -> Level<'_> {
        let (width, height, bytes) = if level == 0 {
            (self.config.width, self.config.height, &self.bytes[..])
        } else {
            let mip = self.mips.get(level - 1).unwrap_or_else(|| {
                panic!("Mip level {} requested from an image with {} levels", level, self.mip_count())
            });
            (mip.width, mip.height, &mip.bytes[..])
        };
        Level {
            width,
            height,
            layout: self.config.layout,
            gamma: self.config.gamma,
            bytes,
        }
    }

    /// Rebuild the mip chain from the first layer of the base image.
    ///
    /// Each level halves the size of the previous one (rounding down, to a minimum of 1) and is produced by averaging
    /// 2 or 4 texels of it in linear space.
    ///
    /// # Panics
    ///
    /// Panics if the image does not store colours.
    pub fn generate_mips(&mut self) {
        assert_eq!(self.config.layout.kind(), PixelKind::Color, "Cannot generate mips for a {:?} image", self.config.layout);
        self.mips.clear();
        if self.is_null() {
            return;
        }

        for level in 1..self.full_mip_count() {
            let prev = self.level(level - 1);
            let width = (prev.width / 2).max(1);
            let height = (prev.height / 2).max(1);
            let mut bytes = vec![0; width * height * 4];

            for y in 0..height {
                for x in 0..width {
                    let c = if prev.width == 1 {
                        let bottom = prev.read_color([0, 2 * y]);
                        let top = prev.read_color([0, 2 * y + 1]);
                        (bottom + top) * 0.5
                    } else if prev.height == 1 {
                        let left = prev.read_color([2 * x, 0]);
                        let right = prev.read_color([2 * x + 1, 0]);
                        (left + right) * 0.5
                    } else {
                        let bottom_left = prev.read_color([2 * x, 2 * y]);
                        let bottom_right = prev.read_color([2 * x + 1, 2 * y]);
                        let top_left = prev.read_color([2 * x, 2 * y + 1]);
                        let top_right = prev.read_color([2 * x + 1, 2 * y + 1]);
                        (bottom_left + bottom_right + top_left + top_right) * 0.25
                    };
                    write_word(&mut bytes, (y * width + x) * 4, self.encode_color(c));
                }
            }

            self.mips.push(MipSurface { width, height, bytes });
        }
    }
}

#[cfg(feature = "image")]
impl From<&image_::RgbaImage> for Image {
    /// Copy an sRGB image into a gamma-corrected `R8G8B8A8` image, flipping it so that its first row is the bottom.
    fn from(src: &image_::RgbaImage) -> Self {
        let (width, height) = src.dimensions();
        let config = ImageConfig::new(width as usize, height as usize)
            .with_layout(PixelLayout::R8G8B8A8)
            .with_gamma(GammaSpace::GammaCorrected);
        let mut img = Image::new(config);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b, a] = src.get_pixel(x, height - 1 - y).0;
                let c = Rgba::new(r, g, b, a).map(|e| e as f32 / 255.0);
                let offset = img.offset([x as usize, y as usize, 0], PixelKind::Color);
                write_word(&mut img.bytes, offset, color::pack_color(c, PixelLayout::R8G8B8A8));
            }
        }
        img
    }
}

#[cfg(feature = "image")]
impl Image {
    /// Copy the first layer of a colour image into an sRGB image with the first row at the top.
    pub fn to_rgba_image(&self) -> image_::RgbaImage {
        let (width, height) = (self.width() as u32, self.height() as u32);
        image_::RgbaImage::from_fn(width, height, |x, y| {
            let c = color::color_to_gamma_corrected(self.read_color([x as usize, (height - 1 - y) as usize]));
            let c = c.map(|e| (e.max(0.0).min(1.0) * 255.0).round() as u8);
            image_::Rgba([c.r, c.g, c.b, c.a])
        })
    }
}
