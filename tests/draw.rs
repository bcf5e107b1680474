use std::sync::{
    atomic::{AtomicU32, Ordering},
    Mutex,
};
use tessel::{
    parallel::Inline, BlendMode, ColorBufferConfig, CullMode, DepthMode, FragmentIn, FragmentOut, FrameBuffer,
    FrameBufferConfig, GammaSpace, Model, Pipeline, PixelLayout, Rasterizer, VertexIn,
};
use test_log::test;
use vek::Rgba;

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

fn quad(z: f32) -> [[f32; 3]; 4] {
    [[-1.0, -1.0, z], [1.0, -1.0, z], [1.0, 1.0, z], [-1.0, 1.0, z]]
}

fn approx(a: Rgba<f32>, b: Rgba<f32>, eps: f32) -> bool {
    (a - b).map(f32::abs).reduce_partial_max() <= eps
}

/// Fills triangles with a single colour.
struct Fill {
    color: Rgba<f32>,
    depth: DepthMode,
    cull: CullMode,
    blend: BlendMode,
}

impl Fill {
    fn new(color: Rgba<f32>) -> Self {
        Self {
            color,
            depth: DepthMode::NONE,
            cull: CullMode::NONE,
            blend: BlendMode::REPLACE,
        }
    }
}

impl Pipeline for Fill {
    type Vertex = [f32; 3];
    type Instance = ();
    type Constants = ();
    type VertexData = ();

    fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], ()) {
        let [x, y, z] = *input.vertex;
        ([x, y, z, 1.0], ())
    }

    fn fragment(&self, _: &FragmentIn<'_, ()>) -> FragmentOut {
        FragmentOut::color(self.color)
    }

    fn depth_mode(&self) -> DepthMode {
        self.depth
    }

    fn cull_mode(&self) -> CullMode {
        self.cull
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend
    }
}

/// Counts how many times each pixel is shaded.
struct Counter {
    width: usize,
    hits: Vec<AtomicU32>,
}

impl Counter {
    fn new([width, height]: [usize; 2]) -> Self {
        Self {
            width,
            hits: (0..width * height).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn hits(&self) -> Vec<u32> {
        self.hits.iter().map(|h| h.load(Ordering::Relaxed)).collect()
    }
}

impl Pipeline for Counter {
    type Vertex = [f32; 2];
    type Instance = ();
    type Constants = ();
    type VertexData = ();

    fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], ()) {
        let [x, y] = *input.vertex;
        ([x, y, 0.5, 1.0], ())
    }

    fn fragment(&self, input: &FragmentIn<'_, ()>) -> FragmentOut {
        let [x, y] = input.position;
        self.hits[y * self.width + x].fetch_add(1, Ordering::Relaxed);
        FragmentOut::color(Rgba::white())
    }

    fn cull_mode(&self) -> CullMode {
        CullMode::NONE
    }
}

#[test]
fn shared_edges_are_shaded_once() {
    let size = [8, 8];
    // A fan around the centre of the target, whose diagonals pass through pixel centres
    let vertices = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0], [0.0, 0.0]];
    let indices = [0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4];

    let counter = Counter::new(size);
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(size[0], size[1]));
    let stats = Rasterizer::with_scheduler(Inline)
        .with_pipeline(&counter)
        .draw(&Model::new(&vertices, &indices, &()), &mut fb);

    assert_eq!(stats.ignored, 0);
    assert_eq!(stats.covered, 64);
    assert!(counter.hits().iter().all(|&h| h == 1), "{:?}", counter.hits());
}

#[test]
fn skewed_quad_is_shaded_at_most_once() {
    let size = [13, 11];
    let vertices = [[-0.83, -0.91], [0.77, -0.6], [0.9, 0.71], [-0.52, 0.95]];

    let counter = Counter::new(size);
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(size[0], size[1]));
    let stats = Rasterizer::with_scheduler(Inline)
        .with_pipeline(&counter)
        .draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);

    let hits = counter.hits();
    assert!(hits.iter().all(|&h| h <= 1), "{:?}", hits);
    assert_eq!(hits.iter().sum::<u32>() as usize, stats.covered);
    assert!(stats.covered > 0);
}

#[test]
fn triangle_coverage_matches_area() {
    let size = [8, 8];
    // Raster-space corners at (0, 0), (4, 0) and (0, 4)
    let vertices = [[-1.0, -1.0], [0.0, -1.0], [-1.0, 0.0]];

    let counter = Counter::new(size);
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(size[0], size[1]));
    let stats = Rasterizer::with_scheduler(Inline)
        .with_pipeline(&counter)
        .draw(&Model::new(&vertices, &[0, 1, 2], &()), &mut fb);

    // Pixel centres on the hypotenuse belong to the triangle across it
    assert_eq!(stats.covered, 6);
    let hits = counter.hits();
    for y in 0..size[1] {
        for x in 0..size[0] {
            let inside = x + y < 3;
            assert_eq!(hits[y * size[0] + x], inside as u32, "pixel {:?}", [x, y]);
            let color = fb.color_buffer(0).read_color([x, y]);
            assert_eq!(approx(color, Rgba::white(), 1e-3), inside, "pixel {:?}", [x, y]);
        }
    }
}

#[test]
fn depth_test_keeps_nearest() {
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(8, 8));
    let red = Rgba::new(1.0, 0.0, 0.0, 1.0);
    let green = Rgba::new(0.0, 1.0, 0.0, 1.0);
    let blue = Rgba::new(0.0, 0.0, 1.0, 1.0);

    for &(z, color) in [(0.5, red), (0.3, green), (0.7, blue)].iter() {
        let fill = Fill {
            depth: DepthMode::LESS_WRITE,
            ..Fill::new(color)
        };
        let vertices = quad(z);
        Rasterizer::with_scheduler(Inline)
            .with_pipeline(&fill)
            .draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);
    }

    for pos in [[0, 0], [3, 4], [7, 7]].iter() {
        assert!(approx(fb.color_buffer(0).read_color(*pos), green, 1e-3));
        let depth = fb.depth_buffer().unwrap().read_depth(*pos);
        assert!((depth - 0.3).abs() < 1e-4, "{}", depth);
    }
}

#[test]
fn depth_pass_mode_does_not_write() {
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));
    fb.clear_depth(0.6);
    let fill = Fill {
        depth: DepthMode::LESS_PASS,
        ..Fill::new(Rgba::white())
    };
    let vertices = quad(0.4);
    Rasterizer::with_scheduler(Inline)
        .with_pipeline(&fill)
        .draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);

    assert!(approx(fb.color_buffer(0).read_color([2, 2]), Rgba::white(), 1e-3));
    assert_eq!(fb.depth_buffer().unwrap().read_depth([2, 2]), 0.6);
}

/// Replaces the depth of every fragment.
struct DepthOverride(f32);

impl Pipeline for DepthOverride {
    type Vertex = [f32; 3];
    type Instance = ();
    type Constants = ();
    type VertexData = ();

    fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], ()) {
        let [x, y, z] = *input.vertex;
        ([x, y, z, 1.0], ())
    }

    fn fragment(&self, _: &FragmentIn<'_, ()>) -> FragmentOut {
        FragmentOut::color(Rgba::white()).with_depth(self.0)
    }

    fn depth_mode(&self) -> DepthMode {
        DepthMode::LESS_WRITE
    }

    fn cull_mode(&self) -> CullMode {
        CullMode::NONE
    }

    fn fragment_changes_depth(&self) -> bool {
        true
    }
}

#[test]
fn fragment_depth_replaces_early_test() {
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));
    fb.clear_depth(0.5);
    // Further than the depth buffer, but the shader moves it nearer
    let vertices = quad(0.9);
    Rasterizer::with_scheduler(Inline)
        .with_pipeline(&DepthOverride(0.2))
        .draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);

    assert!(approx(fb.color_buffer(0).read_color([1, 1]), Rgba::white(), 1e-3));
    assert_eq!(fb.depth_buffer().unwrap().read_depth([1, 1]), 0.2);

    // Now the shader moves it behind
    fb.clear_color(Rgba::zero());
    let vertices = quad(0.1);
    Rasterizer::with_scheduler(Inline)
        .with_pipeline(&DepthOverride(0.8))
        .draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);

    assert!(approx(fb.color_buffer(0).read_color([1, 1]), Rgba::zero(), 1e-3));
    assert_eq!(fb.depth_buffer().unwrap().read_depth([1, 1]), 0.2);
}

#[test]
fn alpha_blending() {
    let config = FrameBufferConfig::new(4, 4).with_color_buffers(vec![ColorBufferConfig {
        layout: PixelLayout::R8G8B8A8,
        gamma: GammaSpace::Linear,
    }]);
    let mut fb = FrameBuffer::new(config);
    fb.clear_color(Rgba::new(0.0, 0.0, 1.0, 1.0));

    let fill = Fill {
        blend: BlendMode::ALPHA,
        ..Fill::new(Rgba::new(1.0, 0.0, 0.0, 0.5))
    };
    let vertices = quad(0.5);
    Rasterizer::with_scheduler(Inline)
        .with_pipeline(&fill)
        .draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);

    let color = fb.color_buffer(0).read_color([2, 1]);
    assert!(approx(color, Rgba::new(0.5, 0.0, 0.5, 1.0), 1.0 / 255.0), "{:?}", color);
}

#[test]
fn culling_follows_winding() {
    let ccw = [[-1.0, -1.0, 0.5], [1.0, -1.0, 0.5], [-1.0, 1.0, 0.5]];
    let cw = [ccw[1], ccw[0], ccw[2]];
    let white = Rgba::white();

    for &(cull, vertices, drawn) in [
        (CullMode::BACK, ccw, true),
        (CullMode::BACK, cw, false),
        (CullMode::FRONT, ccw, false),
        (CullMode::FRONT, cw, true),
        (CullMode::ALL, ccw, false),
        (CullMode::NONE, cw, true),
    ]
    .iter()
    {
        let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));
        let fill = Fill { cull, ..Fill::new(white) };
        let stats = Rasterizer::with_scheduler(Inline)
            .with_pipeline(&fill)
            .draw(&Model::new(&vertices, &[0, 1, 2], &()), &mut fb);

        assert_eq!(stats.ignored, (!drawn) as usize, "{:?}", cull);
        assert_eq!(approx(fb.color_buffer(0).read_color([0, 0]), white, 1e-3), drawn, "{:?}", cull);
    }
}

#[test]
fn triangles_outside_depth_range_are_discarded() {
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));
    let vertices = [[-1.0, -1.0, 0.5], [1.0, -1.0, 1.5], [-1.0, 1.0, 0.5]];
    let fill = Fill::new(Rgba::white());
    let stats = Rasterizer::with_scheduler(Inline)
        .with_pipeline(&fill)
        .draw(&Model::new(&vertices, &[0, 1, 2], &()), &mut fb);

    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.fragments, 0);
    assert!(approx(fb.color_buffer(0).read_color([0, 0]), Rgba::zero(), 1e-3));
}

/// Interpolates one value with a different clip-space W at each vertex.
struct Perspective {
    fragments: Mutex<Vec<([f32; 3], f32, f32, f32)>>,
}

impl Pipeline for Perspective {
    type Vertex = ([f32; 2], f32, f32); // NDC position, W, value
    type Instance = ();
    type Constants = ();
    type VertexData = f32;

    fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], f32) {
        let ([x, y], w, value) = *input.vertex;
        ([x * w, y * w, 0.5 * w, w], value)
    }

    fn fragment(&self, input: &FragmentIn<'_, f32>) -> FragmentOut {
        let b = input.barycentric;
        self.fragments
            .lock()
            .unwrap()
            .push(([b.x, b.y, b.z], input.interpolate(), input.w, input.depth));
        FragmentOut::color(Rgba::white())
    }

    fn cull_mode(&self) -> CullMode {
        CullMode::NONE
    }
}

#[test]
fn interpolation_is_perspective_correct() {
    let w = [1.0, 3.0, 2.0];
    let values = [0.0, 1.0, 2.0];
    let vertices = [
        ([-1.0, -1.0], w[0], values[0]),
        ([1.0, -1.0], w[1], values[1]),
        ([-1.0, 1.0], w[2], values[2]),
    ];
    let pipeline = Perspective {
        fragments: Mutex::new(Vec::new()),
    };
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(16, 16));
    Rasterizer::with_scheduler(Inline)
        .with_pipeline(&pipeline)
        .draw(&Model::new(&vertices, &[0, 1, 2], &()), &mut fb);

    let fragments = pipeline.fragments.into_inner().unwrap();
    assert!(!fragments.is_empty());
    for (b, value, frag_w, depth) in fragments {
        let one_over_w = (0..3).map(|i| b[i] / w[i]).sum::<f32>();
        let expected = (0..3).map(|i| b[i] * values[i] / w[i]).sum::<f32>() / one_over_w;
        assert!((value - expected).abs() < 1e-4, "{} != {}", value, expected);
        assert!((frag_w - 1.0 / one_over_w).abs() < 1e-4);
        assert!((depth - 0.5).abs() < 1e-4);
    }
}

/// Offsets every vertex by its instance and records what the vertex shader saw.
struct Instanced {
    seen: Mutex<Vec<(usize, usize, usize)>>,
}

impl Pipeline for Instanced {
    type Vertex = [f32; 2];
    type Instance = [f32; 2];
    type Constants = ();
    type VertexData = ();

    fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], ()) {
        self.seen
            .lock()
            .unwrap()
            .push((input.index, input.vertex_index, input.instance_index));
        let [x, y] = *input.vertex;
        let [dx, dy] = input.instance.copied().unwrap_or([0.0, 0.0]);
        ([x + dx, y + dy, 0.5, 1.0], ())
    }

    fn fragment(&self, _: &FragmentIn<'_, ()>) -> FragmentOut {
        FragmentOut::color(Rgba::white())
    }
}

#[test]
fn instances_draw_the_whole_model() {
    let vertices = [[-0.25, -0.5], [0.25, -0.5], [0.25, 0.5], [-0.25, 0.5]];
    let offsets = [[-0.5, 0.0], [0.5, 0.0]];
    let pipeline = Instanced {
        seen: Mutex::new(Vec::new()),
    };
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(16, 8));
    let stats = Rasterizer::with_scheduler(Inline)
        .with_pipeline(&pipeline)
        .draw(&Model::new(&vertices, &QUAD_INDICES, &()).with_instances(&offsets), &mut fb);

    assert_eq!(stats.vertices, 8);
    assert_eq!(stats.triangles, 4);
    assert_eq!(stats.ignored, 0);

    let mut seen = pipeline.seen.into_inner().unwrap();
    seen.sort();
    let expected = (0..8).map(|i| (i, i % 4, i / 4)).collect::<Vec<_>>();
    assert_eq!(seen, expected);

    let color = fb.color_buffer(0);
    assert!(approx(color.read_color([4, 4]), Rgba::white(), 1e-3));
    assert!(approx(color.read_color([12, 4]), Rgba::white(), 1e-3));
    assert!(approx(color.read_color([8, 4]), Rgba::zero(), 1e-3));
}

#[test]
fn model_pipeline_overrides_bound_pipeline() {
    let vertices = quad(0.5);
    let red = Fill::new(Rgba::new(1.0, 0.0, 0.0, 1.0));
    let green = Fill::new(Rgba::new(0.0, 1.0, 0.0, 1.0));
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));

    let mut rasterizer = Rasterizer::with_scheduler(Inline);
    rasterizer.set_pipeline(&red);
    rasterizer.draw(&Model::new(&vertices, &QUAD_INDICES, &()).with_pipeline(&green), &mut fb);
    assert!(approx(fb.color_buffer(0).read_color([0, 0]), Rgba::new(0.0, 1.0, 0.0, 1.0), 1e-3));

    rasterizer.draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);
    assert!(approx(fb.color_buffer(0).read_color([0, 0]), Rgba::new(1.0, 0.0, 0.0, 1.0), 1e-3));
}

#[test]
#[should_panic(expected = "needs a depth buffer")]
fn depth_mode_needs_depth_buffer() {
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4).without_depth_stencil());
    let fill = Fill {
        depth: DepthMode::LESS_WRITE,
        ..Fill::new(Rgba::white())
    };
    let vertices = quad(0.5);
    Rasterizer::with_scheduler(Inline)
        .with_pipeline(&fill)
        .draw(&Model::new(&vertices, &QUAD_INDICES, &()), &mut fb);
}

#[test]
#[should_panic(expected = "out of range")]
fn indices_must_be_in_range() {
    let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));
    let vertices = quad(0.5);
    let fill = Fill::new(Rgba::white());
    Rasterizer::with_scheduler(Inline)
        .with_pipeline(&fill)
        .draw(&Model::new(&vertices, &[0, 1, 4], &()), &mut fb);
}
