use crate::{image::{Image, Level}, math::Lerp};
use vek::{Rgba, Vec2};

/// Blend the four texels of a level closest to the point `uv`.
///
/// Texel centres sit at `(i + 0.5) / size`. Points closer to the edge than the outermost texel centres hold that
/// texel's colour.
#[inline]
pub fn bilinear(level: &Level<'_>, uv: Vec2<f32>) -> Rgba<f32> {
    let [w, h] = level.size();
    // Index in texel space, relative to texel centres
    let tx = uv.x * w as f32 - 0.5;
    let ty = uv.y * h as f32 - 0.5;
    let (fx, fy) = (tx - tx.floor(), ty - ty.floor());

    let clamp = |e: f32, size: usize| (e.max(0.0) as usize).min(size - 1);
    let (x0, x1) = (clamp(tx.floor(), w), clamp(tx.floor() + 1.0, w));
    let (y0, y1) = (clamp(ty.floor(), h), clamp(ty.floor() + 1.0, h));

    let t00 = level.read_color([x0, y0]);
    let t10 = level.read_color([x1, y0]);
    let t01 = level.read_color([x0, y1]);
    let t11 = level.read_color([x1, y1]);

    let t0 = Rgba::lerp_unchecked(&t00, &t10, &fx);
    let t1 = Rgba::lerp_unchecked(&t01, &t11, &fx);
    Rgba::lerp_unchecked(&t0, &t1, &fy)
}

/// Blend bilinear samples of the two mip levels either side of `lod`.
///
/// Levels past the end of the generated chain clamp to the last one, so an image without mips is sampled bilinearly.
pub fn trilinear(image: &Image, uv: Vec2<f32>, lod: f32) -> Rgba<f32> {
    let last = image.mip_count() - 1;
    let lod = lod.max(0.0);
    let lo = (lod.floor() as usize).min(last);
    let hi = (lo + 1).min(last);

    let lo_sample = bilinear(&image.level(lo), uv);
    if hi == lo {
        return lo_sample;
    }
    let hi_sample = bilinear(&image.level(hi), uv);
    Rgba::lerp_unchecked(&lo_sample, &hi_sample, &(lod - lod.floor()))
}
