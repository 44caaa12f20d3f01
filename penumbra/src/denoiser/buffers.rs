use derivative::Derivative;
use glam::{UVec2, Vec2, Vec4};
use log::debug;
use penumbra_gpu::{CacheSample, Image, INVALID_VALUE};

use crate::{DoubleBuffered, ResourceId};

/// Resolution-dependent resources of the denoiser.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DenoiserBuffers {
    pub size: UVec2,

    /// Serialized [`CacheSample`]s.
    #[derivative(Debug = "ignore")]
    pub cache: DoubleBuffered<Image<Vec4>>,

    /// Packed normal-depth of the G-buffer, kept for the next frame's
    /// reprojection.
    #[derivative(Debug = "ignore")]
    pub normal_depth: DoubleBuffered<Image<Vec4>>,

    /// Previous cache, resampled at the reprojected positions.
    #[derivative(Debug = "ignore")]
    pub reprojected: Image<Vec4>,

    /// Frame age each pixel is going to have after this frame, assuming it
    /// gets traced; zero for disoccluded pixels.
    #[derivative(Debug = "ignore")]
    pub frame_age: Image<u32>,

    /// Local `(mean, variance)` of the raw signal.
    #[derivative(Debug = "ignore")]
    pub moments: Image<Vec2>,

    #[derivative(Debug = "ignore")]
    pub variance_raw: Image<f32>,

    #[derivative(Debug = "ignore")]
    pub variance: Image<f32>,

    #[derivative(Debug = "ignore")]
    pub blur_strength: Image<f32>,

    /// Frame age after accumulation.
    #[derivative(Debug = "ignore")]
    pub history_age: Image<u32>,

    #[derivative(Debug = "ignore")]
    pub hit_distance: Image<f32>,

    /// Ping-pong between consecutive filtering passes; the latest result
    /// always sits in `previous()`.
    #[derivative(Debug = "ignore")]
    pub filtered: DoubleBuffered<Image<f32>>,

    #[derivative(Debug = "ignore")]
    pub output: Image<f32>,
}

impl DenoiserBuffers {
    pub fn new(size: UVec2) -> Self {
        debug!("Allocating denoiser buffers; size={size}");

        let empty = CacheSample::EMPTY.serialize();

        Self {
            size,
            cache: DoubleBuffered::new("denoiser_cache", |_| {
                Image::new(size, empty)
            }),
            normal_depth: DoubleBuffered::new("denoiser_normal_depth", |_| {
                Image::new(size, Vec4::ZERO)
            }),
            reprojected: Image::new(size, empty),
            frame_age: Image::new(size, 0),
            moments: Image::new(size, Vec2::splat(INVALID_VALUE)),
            variance_raw: Image::new(size, INVALID_VALUE),
            variance: Image::new(size, INVALID_VALUE),
            blur_strength: Image::new(size, 0.0),
            history_age: Image::new(size, 0),
            hit_distance: Image::new(size, 0.0),
            filtered: DoubleBuffered::new("denoiser_filtered", |_| {
                Image::new(size, INVALID_VALUE)
            }),
            output: Image::new(size, INVALID_VALUE),
        }
    }

    /// Forgets all history.
    pub fn clear_history(&mut self) {
        let empty = CacheSample::EMPTY.serialize();

        self.cache.for_each_mut(|cache| cache.fill(empty));
        self.normal_depth.for_each_mut(|nd| nd.fill(Vec4::ZERO));
        self.frame_age.fill(0);
        self.history_age.fill(0);
    }
}

/// Identifies a single-buffered resource of the denoiser.
pub fn id(name: &str) -> ResourceId {
    ResourceId::new(format!("denoiser_{name}"))
}
