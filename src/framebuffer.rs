use crate::{
    color::{GammaSpace, PixelKind, PixelLayout},
    image::{Image, ImageConfig},
    math::Bounds2,
    target::{ColorTarget, DepthTarget},
};
use vek::Rgba;

/// The format of one colour buffer of a [`FrameBuffer`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColorBufferConfig {
    pub layout: PixelLayout,
    pub gamma: GammaSpace,
}

/// The shape of a [`FrameBuffer`] and the buffers it owns.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameBufferConfig {
    pub width: usize,
    pub height: usize,
    /// One entry per colour buffer. There must be at least one.
    pub color: Vec<ColorBufferConfig>,
    /// Whether the frame buffer owns a depth buffer and a stencil buffer.
    pub depth_stencil: bool,
}

impl Default for FrameBufferConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            color: vec![ColorBufferConfig::default()],
            depth_stencil: true,
        }
    }
}

impl FrameBufferConfig {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_color_buffers(self, color: Vec<ColorBufferConfig>) -> Self {
        Self { color, ..self }
    }

    pub fn without_depth_stencil(self) -> Self {
        Self {
            depth_stencil: false,
            ..self
        }
    }
}

/// A set of images that together form a render target.
///
/// Draw calls write colour into the first colour buffer and test against the depth buffer. The depth buffer starts
/// cleared to `1.0`, the far plane.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    config: FrameBufferConfig,
    color: Vec<Image>,
    depth: Option<Image>,
    stencil: Option<Image>,
}

impl FrameBuffer {
    /// # Panics
    ///
    /// Panics if the configuration has no colour buffers or a colour buffer has a non-colour layout.
    pub fn new(config: FrameBufferConfig) -> Self {
        assert!(!config.color.is_empty(), "A frame buffer needs at least one colour buffer");
        for c in config.color.iter() {
            assert_eq!(c.layout.kind(), PixelKind::Color, "{:?} is not a colour layout", c.layout);
        }

        let mut this = Self {
            config,
            color: Vec::new(),
            depth: None,
            stencil: None,
        };
        this.allocate();
        this
    }

    fn allocate(&mut self) {
        let (width, height) = (self.config.width, self.config.height);
        self.color = self
            .config
            .color
            .iter()
            .map(|c| Image::new(ImageConfig::new(width, height).with_layout(c.layout).with_gamma(c.gamma)))
            .collect();

        if self.config.depth_stencil {
            let mut depth = Image::new(ImageConfig::new(width, height).with_layout(PixelLayout::DepthF32));
            depth.clear_depth(1.0);
            self.depth = Some(depth);
            self.stencil = Some(Image::new(ImageConfig::new(width, height).with_layout(PixelLayout::StencilU8)));
        } else {
            self.depth = None;
            self.stencil = None;
        }
    }

    /// Change the size of every buffer. The contents of all buffers are lost.
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.config.width == width && self.config.height == height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.allocate();
    }

    #[inline]
    pub fn config(&self) -> &FrameBufferConfig {
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

    #[inline]
    pub fn size(&self) -> [usize; 2] {
        [self.config.width, self.config.height]
    }

    #[inline]
    pub fn bounds(&self) -> Bounds2 {
        Bounds2::from_size(self.size())
    }

    #[inline]
    pub fn color_buffer_count(&self) -> usize {
        self.color.len()
    }

    #[inline]
    pub fn uses_depth_stencil(&self) -> bool {
        self.config.depth_stencil
    }

    /// # Panics
    ///
    /// Panics if there is no colour buffer with the given index.
    #[inline]
    pub fn color_buffer(&self, index: usize) -> &Image {
        &self.color[index]
    }

    #[inline]
    pub fn color_buffer_mut(&mut self, index: usize) -> &mut Image {
        &mut self.color[index]
    }

    #[inline]
    pub fn depth_buffer(&self) -> Option<&Image> {
        self.depth.as_ref()
    }

    #[inline]
    pub fn depth_buffer_mut(&mut self) -> Option<&mut Image> {
        self.depth.as_mut()
    }

    #[inline]
    pub fn stencil_buffer(&self) -> Option<&Image> {
        self.stencil.as_ref()
    }

    #[inline]
    pub fn stencil_buffer_mut(&mut self) -> Option<&mut Image> {
        self.stencil.as_mut()
    }

    /// Fill every colour buffer with a linear-space colour.
    pub fn clear_color(&mut self, color: Rgba<f32>) {
        self.color.iter_mut().for_each(|img| img.clear_color(color));
    }

    /// Fill the depth buffer, if there is one.
    pub fn clear_depth(&mut self, depth: f32) {
        if let Some(img) = &mut self.depth {
            img.clear_depth(depth);
        }
    }

    /// Fill the stencil buffer, if there is one.
    pub fn clear_stencil(&mut self, stencil: u8) {
        if let Some(img) = &mut self.stencil {
            img.clear_stencil(stencil);
        }
    }

    /// Borrow the first colour buffer and the depth buffer as render targets.
    pub(crate) fn targets(&mut self) -> (ColorTarget<'_>, Option<DepthTarget<'_>>) {
        let color = ColorTarget::new(&mut self.color[0]);
        let depth = self.depth.as_mut().map(DepthTarget::new);
        (color, depth)
    }
}
