use tessel::{
    CullMode, DepthMode, FragmentIn, FragmentOut, FrameBuffer, FrameBufferConfig, Image, ImageConfig, Model,
    Pipeline, Rasterizer, Sampler2D, SamplerConfig, VertexIn, Wrap,
};
use vek::{Mat4, Rgba, Vec2, Vec3, Vec4};

const W: usize = 800;
const H: usize = 600;

struct Floor<'a> {
    mvp: Mat4<f32>,
    sampler: Sampler2D<'a>,
}

impl<'a> Pipeline for Floor<'a> {
    type Vertex = (Vec3<f32>, Vec2<f32>); // Position, texture coordinates
    type Instance = ();
    type Constants = ();
    type VertexData = Vec2<f32>;

    #[inline]
    fn vertex(&self, input: &VertexIn<'_, Self>) -> ([f32; 4], Self::VertexData) {
        let (pos, uv) = *input.vertex;
        ((self.mvp * Vec4::from_point(pos)).into_array(), uv)
    }

    #[inline]
    fn fragment(&self, input: &FragmentIn<'_, Self::VertexData>) -> FragmentOut {
        let uv = input.interpolate();
        // Screen-space derivatives choose the mip level
        FragmentOut::color(self.sampler.sample(uv, input.derivative_x(), input.derivative_y()))
    }

    fn depth_mode(&self) -> DepthMode {
        DepthMode::LESS_WRITE
    }

    fn cull_mode(&self) -> CullMode {
        CullMode::NONE
    }
}

fn checkerboard(size: usize, cells: usize) -> Image {
    let mut image = Image::new(ImageConfig::new(size, size));
    for y in 0..size {
        for x in 0..size {
            let odd = (x * cells / size + y * cells / size) % 2 == 1;
            let color = if odd {
                Rgba::new(0.9, 0.9, 0.9, 1.0)
            } else {
                Rgba::new(0.05, 0.1, 0.4, 1.0)
            };
            image.write_color([x, y], color);
        }
    }
    image.generate_mips();
    image
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let texture = checkerboard(256, 8);
    let floor = Floor {
        mvp: Mat4::perspective_fov_rh_zo(1.2, W as f32, H as f32, 0.1, 100.0)
            * Mat4::<f32>::translation_3d(Vec3::new(0.0, -1.0, -3.0))
            * Mat4::rotation_x(-1.0)
            * Mat4::<f32>::scaling_3d(1.5),
        sampler: Sampler2D::new(&texture, SamplerConfig::TRILINEAR.with_wrap(Wrap::Repeat)),
    };

    let vertices = [
        (Vec3::new(-1.0, -1.0, 0.0), Vec2::new(0.0, 0.0)),
        (Vec3::new(1.0, -1.0, 0.0), Vec2::new(8.0, 0.0)),
        (Vec3::new(1.0, 1.0, 0.0), Vec2::new(8.0, 8.0)),
        (Vec3::new(-1.0, 1.0, 0.0), Vec2::new(0.0, 8.0)),
    ];
    let indices = [0, 1, 2, 0, 2, 3];

    let mut fb = FrameBuffer::new(FrameBufferConfig::new(W, H));
    fb.clear_color(Rgba::new(0.6, 0.7, 0.9, 1.0));

    let mut rasterizer = Rasterizer::new().with_pipeline(&floor);
    let stats = rasterizer.draw(&Model::new(&vertices, &indices, &()), &mut fb);
    println!("{:?}", stats);

    fb.color_buffer(0).to_rgba_image().save("textured_quad.png")?;
    println!("Wrote textured_quad.png");
    Ok(())
}
