use crate::image::Level;
use vek::{Rgba, Vec2};

/// Read the texel of a level that contains the point `uv`.
///
/// Coordinates are expected to be wrapped into `[0, 1]` already. The texel index is clamped so that `1.0` maps onto
/// the last row and column.
#[inline]
pub fn nearest(level: &Level<'_>, uv: Vec2<f32>) -> Rgba<f32> {
    let [w, h] = level.size();
    let x = ((uv.x * w as f32).max(0.0) as usize).min(w - 1);
    let y = ((uv.y * h as f32).max(0.0) as usize).min(h - 1);
    level.read_color([x, y])
}
