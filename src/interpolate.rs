/// A trait implemented by vertex data that can be interpolated across the face of a primitive.
///
/// Implementations should compute `a * wa + b * wb (+ c * wc)`. The weights always sum to 1 when the rasterizer
/// interpolates vertex data, but may take any value when derivatives are computed.
pub trait WeightedSum: Sized {
    /// Scale two items of this type and sum them.
    fn weighted_sum2(a: &Self, b: &Self, wa: f32, wb: f32) -> Self;

    /// Scale three items of this type and sum them.
    fn weighted_sum3(a: &Self, b: &Self, c: &Self, wa: f32, wb: f32, wc: f32) -> Self;
}

macro_rules! impl_weighted_sum_for {
    ($t:ty) => {
        impl WeightedSum for $t {
            #[inline(always)]
            fn weighted_sum2(a: &Self, b: &Self, wa: f32, wb: f32) -> Self {
                *a * wa + *b * wb
            }

            #[inline(always)]
            fn weighted_sum3(a: &Self, b: &Self, c: &Self, wa: f32, wb: f32, wc: f32) -> Self {
                *a * wa + *b * wb + *c * wc
            }
        }
    };
}

impl_weighted_sum_for!(f32);
impl_weighted_sum_for!(vek::Vec2<f32>);
impl_weighted_sum_for!(vek::Vec3<f32>);
impl_weighted_sum_for!(vek::Vec4<f32>);
impl_weighted_sum_for!(vek::Rgb<f32>);
impl_weighted_sum_for!(vek::Rgba<f32>);

impl<T: WeightedSum + Copy, const N: usize> WeightedSum for [T; N] {
    #[inline(always)]
    fn weighted_sum2(a: &Self, b: &Self, wa: f32, wb: f32) -> Self {
        let mut out = *a;
        (0..N).for_each(|i| out[i] = T::weighted_sum2(&a[i], &b[i], wa, wb));
        out
    }

    #[inline(always)]
    fn weighted_sum3(a: &Self, b: &Self, c: &Self, wa: f32, wb: f32, wc: f32) -> Self {
        let mut out = *a;
        (0..N).for_each(|i| out[i] = T::weighted_sum3(&a[i], &b[i], &c[i], wa, wb, wc));
        out
    }
}

macro_rules! impl_weighted_sum_for_tuple {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: WeightedSum),+> WeightedSum for ($($name,)+) {
            #[inline(always)]
            fn weighted_sum2(a: &Self, b: &Self, wa: f32, wb: f32) -> Self {
                ($($name::weighted_sum2(&a.$idx, &b.$idx, wa, wb),)+)
            }

            #[inline(always)]
            fn weighted_sum3(a: &Self, b: &Self, c: &Self, wa: f32, wb: f32, wc: f32) -> Self {
                ($($name::weighted_sum3(&a.$idx, &b.$idx, &c.$idx, wa, wb, wc),)+)
            }
        }
    };
}

impl_weighted_sum_for_tuple!(A.0);
impl_weighted_sum_for_tuple!(A.0, B.1);
impl_weighted_sum_for_tuple!(A.0, B.1, C.2);
impl_weighted_sum_for_tuple!(A.0, B.1, C.2, D.3);

impl WeightedSum for () {
    #[inline(always)]
    fn weighted_sum2(_: &Self, _: &Self, _: f32, _: f32) -> Self {}

    #[inline(always)]
    fn weighted_sum3(_: &Self, _: &Self, _: &Self, _: f32, _: f32, _: f32) -> Self {}
}
