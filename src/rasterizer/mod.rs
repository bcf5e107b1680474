//! The draw call.
//!
//! A draw runs as a sequence of stages, each of which finishes completely before the next begins:
//!
//! 1. setup: resolve the pipeline and allocate per-draw storage
//! 2. run the vertex shader for every vertex of every instance
//! 3. project every triangle onto the target
//! 4. mark triangles that will not be drawn
//! 5. allocate a fragment record for every pixel of each remaining triangle's bounds
//! 6. compute barycentric coordinates and coverage of those pixels
//! 7. link each covered pixel to its covered neighbours, for derivatives
//! 8. shade, depth test and blend, one block of the target at a time
//!
//! The last stage splits the target into blocks that are owned by a single worker each, which is what makes the
//! unsynchronised writes to the frame buffer sound. Within a block, triangles are drawn in submission order.

mod triangles;

pub use self::triangles::{ndc_to_raster, raster_to_ndc, Coverage, Neighbours, Triangle};

use crate::{
    arena::{Scratch, Span},
    framebuffer::FrameBuffer,
    math::Bounds2,
    model::Model,
    parallel::{self, DefaultScheduler, Scheduler, SharedSliceMut},
    pipeline::{FragmentIn, Pipeline, VertexIn},
    target::{ColorTarget, DepthTarget, Target},
};
use log::{debug, trace};
use vek::Vec4;

/// Tuning and resource limits of a [`Rasterizer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RasterizerConfig {
    /// Vertices shaded by one parallel task.
    pub vertices_per_batch: usize,
    /// Triangles set up by one parallel task.
    pub triangles_per_batch: usize,
    /// Side of the tiles that triangle bounds are split into when computing coverage.
    pub tile_size: usize,
    /// Side of the blocks of the target that are shaded by one parallel task.
    pub block_size: usize,
    /// Maximum number of shaded vertices per draw, across all instances.
    pub vertex_limit: usize,
    /// Maximum number of triangles per draw, across all instances.
    pub triangle_limit: usize,
    /// Maximum number of fragment records per draw. Every pixel of every drawn triangle's bounds takes one record.
    pub fragment_limit: usize,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self {
            vertices_per_batch: 64,
            triangles_per_batch: 64,
            tile_size: 32,
            block_size: 32,
            vertex_limit: 1 << 22,
            triangle_limit: 1 << 22,
            fragment_limit: 1 << 26,
        }
    }
}

/// Counts gathered while drawing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DrawStats {
    pub vertices: usize,
    pub triangles: usize,
    /// Triangles skipped because they were culled, degenerate, off-screen or outside of the depth range.
    pub ignored: usize,
    /// Fragment records allocated for the drawn triangles.
    pub fragments: usize,
    /// Pixels covered by the drawn triangles, whether or not they passed the depth test.
    pub covered: usize,
}

struct VertexOut<V> {
    position: Vec4<f32>,
    // `None` only until the vertex shader has run
    data: Option<V>,
}

impl<V> VertexOut<V> {
    #[inline(always)]
    fn data(&self, index: usize) -> &V {
        match &self.data {
            Some(data) => data,
            None => unreachable!("Vertex {} was not shaded", index),
        }
    }
}

struct Arena<V> {
    vertices: Scratch<VertexOut<V>>,
    triangles: Scratch<Triangle>,
    coverage: Scratch<Coverage>,
    neighbours: Scratch<Neighbours>,
}

impl<V> Arena<V> {
    fn new(config: &RasterizerConfig) -> Self {
        Self {
            vertices: Scratch::with_limit(config.vertex_limit),
            triangles: Scratch::with_limit(config.triangle_limit),
            coverage: Scratch::with_limit(config.fragment_limit),
            neighbours: Scratch::with_limit(config.fragment_limit),
        }
    }

    fn reset(&mut self) {
        self.vertices.reset();
        self.triangles.reset();
        self.coverage.reset();
        self.neighbours.reset();
    }
}

/// Draws [`Model`]s into [`FrameBuffer`]s.
///
/// A rasterizer owns the scratch memory of its draw calls, so keeping one alive between frames avoids reallocating it.
pub struct Rasterizer<'p, P: Pipeline, S: Scheduler = DefaultScheduler> {
    pipeline: Option<&'p P>,
    scheduler: S,
    config: RasterizerConfig,
    arena: Arena<P::VertexData>,
}

impl<'p, P: Pipeline> Rasterizer<'p, P> {
    /// Create a rasterizer using the default scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(DefaultScheduler::default())
    }
}

impl<'p, P: Pipeline> Default for Rasterizer<'p, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p, P: Pipeline, S: Scheduler> Rasterizer<'p, P, S> {
    pub fn with_scheduler(scheduler: S) -> Self {
        let config = RasterizerConfig::default();
        Self {
            pipeline: None,
            scheduler,
            arena: Arena::new(&config),
            config,
        }
    }

    /// # Panics
    ///
    /// Panics if a batch, tile or block size is zero.
    pub fn with_config(self, config: RasterizerConfig) -> Self {
        assert!(
            config.vertices_per_batch > 0
                && config.triangles_per_batch > 0
                && config.tile_size > 0
                && config.block_size > 0,
            "Batch, tile and block sizes must be non-zero: {:?}",
            config,
        );
        Self {
            arena: Arena::new(&config),
            config,
            ..self
        }
    }

    /// Bind the pipeline used by models that do not carry their own.
    pub fn set_pipeline(&mut self, pipeline: &'p P) {
        self.pipeline = Some(pipeline);
    }

    pub fn with_pipeline(mut self, pipeline: &'p P) -> Self {
        self.set_pipeline(pipeline);
        self
    }

    #[inline]
    pub fn pipeline(&self) -> Option<&'p P> {
        self.pipeline
    }

    #[inline]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    #[inline]
    pub fn config(&self) -> &RasterizerConfig {
        &self.config
    }

    /// Draw every instance of a model into the first colour buffer of a frame buffer.
    ///
    /// # Panics
    ///
    /// Panics if no pipeline is available, the model is malformed, the frame buffer has no pixels, the pipeline's
    /// depth mode needs a depth buffer that the frame buffer lacks, or the draw needs more scratch memory than the
    /// configured limits allow.
    pub fn draw(&mut self, model: &Model<'_, P>, fb: &mut FrameBuffer) -> DrawStats {
        let Self {
            pipeline: bound,
            scheduler,
            config,
            arena,
        } = self;

        let pipeline: &P = match model.pipeline.or(*bound) {
            Some(pipeline) => pipeline,
            None => panic!("Cannot draw without a pipeline: bind one to the rasterizer or the model"),
        };
        model.validate();
        assert!(!fb.bounds().is_empty(), "Cannot draw into a frame buffer of size {:?}", fb.size());
        let uses_depth = pipeline.depth_mode().uses_depth();
        assert!(
            !uses_depth || fb.depth_buffer().is_some(),
            "The pipeline's depth mode {:?} needs a depth buffer, but the frame buffer has none",
            pipeline.depth_mode(),
        );

        let mut stats = DrawStats::default();
        let (vertices, triangles) = setup(model, arena, &mut stats);

        trace!("Running vertex shaders for {} vertices", stats.vertices);
        run_vertex_shaders(pipeline, model, scheduler, config, arena.vertices.get_mut(vertices));

        trace!("Setting up {} triangles", stats.triangles);
        setup_triangles(model, scheduler, config, fb.bounds(), arena, vertices, triangles);

        trace!("Finding triangles to ignore");
        stats.ignored = find_triangles_to_ignore(pipeline, arena.triangles.get_mut(triangles));

        trace!("Allocating fragment records");
        stats.fragments = allocate_fragment_info(arena, triangles);

        trace!("Computing coverage of {} fragments", stats.fragments);
        stats.covered = barycentric_coordinates(scheduler, config, arena, triangles);

        trace!("Linking neighbouring fragments");
        setup_fragment_neighbours(scheduler, config, arena, triangles);

        trace!("Running fragment shaders");
        let surface = fb.bounds();
        let (color, depth) = fb.targets();
        if let Some(depth) = &depth {
            assert_eq!(color.size(), depth.size(), "Colour and depth buffers are not similarly sized");
        }
        run_fragment_shaders(
            pipeline,
            scheduler,
            config,
            surface,
            arena,
            vertices,
            triangles,
            &color,
            if uses_depth { depth.as_ref() } else { None },
        );

        arena.reset();

        debug!(
            "Drew {} triangles ({} ignored) from {} vertices: {} fragments, {} covered",
            stats.triangles, stats.ignored, stats.vertices, stats.fragments, stats.covered,
        );
        stats
    }
}

fn setup<P: Pipeline>(model: &Model<'_, P>, arena: &mut Arena<P::VertexData>, stats: &mut DrawStats) -> (Span, Span) {
    arena.reset();
    stats.vertices = model.vertex_count() * model.instance_count;
    stats.triangles = model.triangle_count() * model.instance_count;

    let vertices = arena.vertices.alloc_with(stats.vertices, || VertexOut {
        position: Vec4::zero(),
        data: None,
    });
    let triangles = arena.triangles.alloc(stats.triangles);
    (vertices, triangles)
}

fn run_vertex_shaders<P: Pipeline, S: Scheduler>(
    pipeline: &P,
    model: &Model<'_, P>,
    scheduler: &S,
    config: &RasterizerConfig,
    outputs: &mut [VertexOut<P::VertexData>],
) {
    let per_instance = model.vertex_count();
    parallel::parallel_for_each_mut(scheduler, outputs, config.vertices_per_batch, |index, out| {
        let (instance_index, vertex_index) = (index / per_instance, index % per_instance);
        let (position, data) = pipeline.vertex(&VertexIn {
            index,
            vertex_index,
            instance_index,
            vertex: &model.vertices[vertex_index],
            instance: model.instances.get(instance_index),
            constants: model.constants,
        });
        out.position = Vec4::from(position);
        out.data = Some(data);
    });
}

fn setup_triangles<P: Pipeline, S: Scheduler>(
    model: &Model<'_, P>,
    scheduler: &S,
    config: &RasterizerConfig,
    surface: Bounds2,
    arena: &mut Arena<P::VertexData>,
    vertices: Span,
    triangles: Span,
) {
    let Arena {
        vertices: vertex_outputs,
        triangles: tris,
        ..
    } = arena;
    let outputs = vertex_outputs.get(vertices);
    let (per_instance, vertex_count) = (model.triangle_count(), model.vertex_count());

    parallel::parallel_for_each_mut(scheduler, tris.get_mut(triangles), config.triangles_per_batch, |i, tri| {
        let (instance, local) = (i / per_instance, i % per_instance);
        let index = |k: usize| instance * vertex_count + model.indices[local * 3 + k] as usize;
        let idx = [index(0), index(1), index(2)];
        let clip = [outputs[idx[0]].position, outputs[idx[1]].position, outputs[idx[2]].position];
        *tri = Triangle::setup(clip, idx, surface);
    });
}

fn find_triangles_to_ignore<P: Pipeline>(pipeline: &P, triangles: &mut [Triangle]) -> usize {
    let cull = pipeline.cull_mode();
    triangles
        .iter_mut()
        .map(|tri| {
            tri.ignore = tri.should_ignore(&cull);
            tri.ignore as usize
        })
        .sum()
}

fn allocate_fragment_info<V>(arena: &mut Arena<V>, triangles: Span) -> usize {
    let Arena {
        triangles: tris,
        coverage,
        neighbours,
        ..
    } = arena;

    let mut total = 0;
    for tri in tris.get_mut(triangles).iter_mut().filter(|tri| !tri.ignore) {
        let area = tri.bounds.area();
        tri.fragments = coverage.alloc(area);
        let links = neighbours.alloc(area);
        debug_assert_eq!(tri.fragments, links);
        total += area;
    }
    total
}

// Split the bounds of every drawn triangle into tiles
fn triangle_tiles(triangles: &[Triangle], side: usize) -> Vec<(usize, Bounds2)> {
    triangles
        .iter()
        .enumerate()
        .filter(|(_, tri)| !tri.ignore)
        .flat_map(|(i, tri)| tri.bounds.tiles(side).map(move |tile| (i, tile)))
        .collect()
}

fn barycentric_coordinates<V, S: Scheduler>(
    scheduler: &S,
    config: &RasterizerConfig,
    arena: &mut Arena<V>,
    triangles: Span,
) -> usize {
    use core::sync::atomic::{AtomicUsize, Ordering};

    let tris = arena.triangles.get(triangles);
    let jobs = triangle_tiles(tris, config.tile_size);
    let records = SharedSliceMut::new(arena.coverage.all_mut());
    let covered = AtomicUsize::new(0);

    scheduler.run(jobs.len(), &|job| {
        let (i, tile) = jobs[job];
        let tri = &tris[i];
        let helper = match &tri.helper {
            Some(helper) => helper,
            None => unreachable!("Triangle {} has no area but was not ignored", i),
        };

        let mut inside = 0;
        for y in tile.min[1]..tile.max[1] {
            let start = tri.fragments.start + tri.bounds.local_index([tile.min[0], y]);
            debug_assert!(start + tile.width() <= records.len());
            // Safety: tiles of a triangle are disjoint and every triangle has its own fragment records
            let row = unsafe { records.slice_mut(start..start + tile.width()) };
            for (x, record) in (tile.min[0]..tile.max[0]).zip(row.iter_mut()) {
                let barycentric = helper.coordinates([x, y]);
                let is_inside = helper.is_inside(&barycentric);
                debug_assert!(!is_inside || (barycentric.sum() - 1.0).abs() < 1e-3, "{:?}", barycentric);
                *record = Coverage {
                    position: [x, y],
                    barycentric,
                    inside: is_inside,
                };
                inside += is_inside as usize;
            }
        }
        covered.fetch_add(inside, Ordering::Relaxed);
    });

    covered.load(Ordering::Relaxed)
}

fn setup_fragment_neighbours<V, S: Scheduler>(
    scheduler: &S,
    config: &RasterizerConfig,
    arena: &mut Arena<V>,
    triangles: Span,
) {
    let tris = arena.triangles.get(triangles);
    let jobs = triangle_tiles(tris, config.tile_size);
    let coverage = arena.coverage.all();
    let links = SharedSliceMut::new(arena.neighbours.all_mut());

    scheduler.run(jobs.len(), &|job| {
        let (i, tile) = jobs[job];
        let tri = &tris[i];
        let record_of = |pos: [usize; 2]| tri.fragments.start + tri.bounds.local_index(pos);
        // A neighbour is usable if it lies in the triangle's bounds and is covered
        let covered = |pos: [usize; 2]| {
            if tri.bounds.contains(pos) && coverage[record_of(pos)].inside {
                Some(record_of(pos))
            } else {
                None
            }
        };
        let link = |forward: Option<[usize; 2]>, backward: Option<[usize; 2]>| {
            forward
                .and_then(&covered)
                .map(|idx| (idx, 1.0))
                .or_else(|| backward.and_then(&covered).map(|idx| (idx, -1.0)))
        };

        for pos in tile.tiles(1).map(|p| p.min) {
            let idx = record_of(pos);
            if !coverage[idx].inside {
                continue;
            }
            let [x, y] = pos;
            // Safety: tiles of a triangle are disjoint and every triangle has its own fragment records
            let out = unsafe { links.get_mut(idx) };
            *out = Neighbours {
                x: link(Some([x + 1, y]), x.checked_sub(1).map(|x| [x, y])),
                y: link(Some([x, y + 1]), y.checked_sub(1).map(|y| [x, y])),
            };
        }
    });
}

fn run_fragment_shaders<P: Pipeline, S: Scheduler>(
    pipeline: &P,
    scheduler: &S,
    config: &RasterizerConfig,
    surface: Bounds2,
    arena: &Arena<P::VertexData>,
    vertices: Span,
    triangles: Span,
    color: &ColorTarget<'_>,
    depth: Option<&DepthTarget<'_>>,
) {
    let outputs = arena.vertices.get(vertices);
    let tris = arena.triangles.get(triangles);
    let coverage = arena.coverage.all();
    let neighbours = arena.neighbours.all();

    parallel::parallel_for_2d(scheduler, surface, config.block_size, |block| {
        for tri in tris.iter().filter(|tri| !tri.ignore && tri.bounds.overlaps(&block)) {
            let area = tri.bounds.intersect(&block);
            for y in area.min[1]..area.max[1] {
                for x in area.min[0]..area.max[0] {
                    let idx = tri.fragments.start + tri.bounds.local_index([x, y]);
                    let record = &coverage[idx];
                    if !record.inside {
                        continue;
                    }
                    let links = &neighbours[idx];
                    let neighbour = |link: Option<(usize, f32)>| link.map(|(i, sign)| (coverage[i].barycentric, sign));
                    let input = FragmentIn {
                        position: record.position,
                        barycentric: record.barycentric,
                        w: tri.interpolate_w(&record.barycentric),
                        depth: tri.interpolate_depth(&record.barycentric),
                        winding: tri.winding.unwrap_or_else(|| unreachable!("Drawn triangle without winding")),
                        vertices: [
                            outputs[tri.vertices[0]].data(tri.vertices[0]),
                            outputs[tri.vertices[1]].data(tri.vertices[1]),
                            outputs[tri.vertices[2]].data(tri.vertices[2]),
                        ],
                        one_over_w: tri.one_over_w,
                        neighbours: [neighbour(links.x), neighbour(links.y)],
                    };
                    // Safety: `block` belongs to this task alone and contains the pixel
                    unsafe { process_fragment(pipeline, &input, color, depth) };
                }
            }
        }
    });
}

/// Depth test, shade and blend one fragment.
///
/// # Safety
///
/// The fragment's pixel must be within the targets and nothing else may access it during the call.
unsafe fn process_fragment<P: Pipeline>(
    pipeline: &P,
    input: &FragmentIn<'_, P::VertexData>,
    color: &ColorTarget<'_>,
    depth: Option<&DepthTarget<'_>>,
) {
    let [x, y] = input.position;
    let mode = pipeline.depth_mode();
    let changes_depth = pipeline.fragment_changes_depth();
    // Both tests compare against the depth present before this fragment
    let current = depth.map(|d| d.read_exclusive_unchecked(x, y));
    let passes = |new: f32| match (mode.test, current) {
        (Some(_), Some(current)) => pipeline.depth_test(new, current),
        _ => true,
    };

    if !changes_depth {
        if !passes(input.depth) {
            return;
        }
        if let (true, Some(depth)) = (mode.write, depth) {
            depth.write_exclusive_unchecked(x, y, input.depth);
        }
    }

    let out = pipeline.fragment(input);

    if changes_depth {
        let new = out.depth.unwrap_or(input.depth);
        if !passes(new) {
            return;
        }
        if let (true, Some(depth)) = (mode.write, depth) {
            depth.write_exclusive_unchecked(x, y, new);
        }
    }

    let current = color.read_exclusive_unchecked(x, y);
    color.write_exclusive_unchecked(x, y, pipeline.blend(out.color, current));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{framebuffer::FrameBufferConfig, parallel::Inline, pipeline::{CullMode, FragmentOut}};
    use test_log::test;
    use vek::Rgba;

    struct Flat;

    impl Pipeline for Flat {
        type Vertex = [f32; 2];
        type Instance = ();
        type Constants = Rgba<f32>;
        type VertexData = ();

        fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], ()) {
            let [x, y] = *input.vertex;
            ([x, y, 0.5, 1.0], ())
        }

        fn fragment(&self, _: &FragmentIn<'_, ()>) -> FragmentOut {
            FragmentOut::color(Rgba::new(1.0, 0.0, 0.0, 1.0))
        }

        fn cull_mode(&self) -> CullMode {
            CullMode::NONE
        }
    }

    const QUAD: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

    #[test]
    fn stats_count_stages() {
        let mut fb = FrameBuffer::new(FrameBufferConfig::new(8, 8));
        let mut rasterizer = Rasterizer::with_scheduler(Inline).with_pipeline(&Flat);
        let stats = rasterizer.draw(&Model::new(&QUAD, &[0, 1, 2, 0, 2, 3], &Rgba::zero()), &mut fb);
        assert_eq!(stats.vertices, 4);
        assert_eq!(stats.triangles, 2);
        assert_eq!(stats.ignored, 0);
        assert_eq!(stats.fragments, 2 * 64);
        assert_eq!(stats.covered, 64);
        // The arena is empty again
        assert!(rasterizer.arena.coverage.is_empty() && rasterizer.arena.vertices.is_empty());
    }

    #[test]
    fn small_tiles_and_blocks_match_defaults() {
        let model_indices = [0, 1, 2, 0, 2, 3];
        let verts = [[-0.9, -0.7], [0.8, -0.95], [0.6, 0.9], [-0.85, 0.4]];
        let draw = |config: RasterizerConfig| {
            let mut fb = FrameBuffer::new(FrameBufferConfig::new(37, 29));
            let mut rasterizer = Rasterizer::with_scheduler(Inline).with_config(config).with_pipeline(&Flat);
            let stats = rasterizer.draw(&Model::new(&verts, &model_indices, &Rgba::zero()), &mut fb);
            (stats, fb.color_buffer(0).bytes().to_vec())
        };
        let small = RasterizerConfig {
            vertices_per_batch: 1,
            triangles_per_batch: 1,
            tile_size: 3,
            block_size: 5,
            ..RasterizerConfig::default()
        };
        assert_eq!(draw(RasterizerConfig::default()), draw(small));
    }

    #[test]
    fn neighbours_prefer_positive_direction() {
        let fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));
        let mut rasterizer = Rasterizer::<Flat, _>::with_scheduler(Inline);
        let (indices, color) = ([0, 1, 2, 0, 2, 3], Rgba::zero());
        let model = Model::new(&QUAD, &indices, &color);
        let mut stats = DrawStats::default();
        let Rasterizer {
            scheduler,
            config,
            arena,
            ..
        } = &mut rasterizer;

        // Run the stages up to linking so that the links can be inspected before the arena is reset
        let (vertices, triangles) = setup(&model, arena, &mut stats);
        run_vertex_shaders(&Flat, &model, scheduler, config, arena.vertices.get_mut(vertices));
        setup_triangles(&model, scheduler, config, fb.bounds(), arena, vertices, triangles);
        assert_eq!(find_triangles_to_ignore(&Flat, arena.triangles.get_mut(triangles)), 0);
        allocate_fragment_info(arena, triangles);
        barycentric_coordinates(scheduler, config, arena, triangles);
        setup_fragment_neighbours(scheduler, config, arena, triangles);

        // The second triangle covers the upper-left half of the target
        let tri = arena.triangles.get(triangles)[1];
        let corner = tri.fragments.start + tri.bounds.local_index([0, 3]);
        assert!(arena.coverage.all()[corner].inside);
        let links = arena.neighbours.all()[corner];
        assert_eq!(links.x.map(|(_, sign)| sign), Some(1.0));
        assert_eq!(links.y.map(|(_, sign)| sign), Some(-1.0));

        // Uncovered pixels are never linked to
        let right = tri.fragments.start + tri.bounds.local_index([3, 0]);
        assert!(!arena.coverage.all()[right].inside);
        assert!(arena.neighbours.all().iter().all(|n| n.x.map_or(true, |(i, _)| i != right)));
    }

    #[test]
    #[should_panic(expected = "without a pipeline")]
    fn draw_needs_pipeline() {
        let mut fb = FrameBuffer::new(FrameBufferConfig::new(4, 4));
        Rasterizer::<Flat, _>::with_scheduler(Inline).draw(&Model::new(&QUAD, &[0, 1, 2], &Rgba::zero()), &mut fb);
    }

    #[test]
    #[should_panic(expected = "Scratch arena overrun")]
    fn fragment_limit_is_enforced() {
        let mut fb = FrameBuffer::new(FrameBufferConfig::new(16, 16));
        let config = RasterizerConfig {
            fragment_limit: 100,
            ..RasterizerConfig::default()
        };
        let mut rasterizer = Rasterizer::with_scheduler(Inline).with_config(config).with_pipeline(&Flat);
        rasterizer.draw(&Model::new(&QUAD, &[0, 1, 2], &Rgba::zero()), &mut fb);
    }
}
