mod bilinear_filter;
mod f32_ext;
mod image;
mod u32_ext;

use core::ops;

pub use self::bilinear_filter::*;
pub use self::f32_ext::*;
pub use self::image::*;
pub use self::u32_ext::*;

pub fn lerp<T>(a: T, b: T, t: f32) -> T
where
    T: ops::Add<Output = T>,
    T: ops::Sub<Output = T>,
    T: ops::Mul<f32, Output = T>,
    T: Copy,
{
    a + (b - a) * t.clamp(0.0, 1.0)
}
