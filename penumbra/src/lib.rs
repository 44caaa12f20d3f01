//! Spatiotemporal denoiser for ray-traced ambient occlusion, plus a
//! double-buffered voxel mip pyramid for cone-traced indirect lighting.
//!
//! The per-pixel and per-voxel kernels live in `penumbra-gpu`; this crate
//! owns resources, ping-pongs them between frames, records the pass schedule
//! and uploads results into `wgpu` textures.

#![allow(clippy::too_many_arguments)]

mod buffers;
mod config;
mod denoiser;
mod error;
mod frame;
mod schedule;
mod utils;
mod voxels;

pub use penumbra_gpu as gpu;
pub use penumbra_gpu::{
    Camera, GBufferEntry, Image, SamplingPattern, Triangle, Volume,
    VoxelDirection, INVALID_VALUE,
};

pub use self::buffers::*;
pub use self::config::*;
pub use self::denoiser::*;
pub use self::error::*;
pub use self::frame::*;
pub use self::schedule::*;
pub use self::utils::*;
pub use self::voxels::*;
