//! Per-pixel and per-voxel kernels used by Penumbra's denoiser and voxel
//! pyramid.
//!
//! Everything in here is a pure function of its inputs: a kernel borrows the
//! images it reads, gets invoked once per pixel (or voxel) and returns the
//! value that the executor is supposed to write. Scheduling, ping-ponging and
//! resource ownership live in the `penumbra` crate.

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::too_many_arguments)]

mod accumulation;
mod atrous;
mod blur;
mod cache;
mod camera;
mod gbuffer;
mod normal;
mod passes;
mod reprojection;
mod utils;
mod variance;
mod voxel;

pub use self::accumulation::*;
pub use self::atrous::*;
pub use self::blur::*;
pub use self::cache::*;
pub use self::camera::*;
pub use self::gbuffer::*;
pub use self::normal::*;
pub use self::passes::*;
pub use self::reprojection::*;
pub use self::utils::*;
pub use self::variance::*;
pub use self::voxel::*;

/// Marks a pixel that has no sample (sky, inactive checkerboard pixel or a
/// disoccluded pixel nobody has filled yet).
pub const INVALID_VALUE: f32 = -1.0;

/// Small number used to keep divisions finite.
pub const PENUMBRA_EPSILON: f32 = 0.0001;

/// Returns whether given AO value carries an actual sample.
pub fn is_valid_value(value: f32) -> bool {
    value != INVALID_VALUE
}
