mod buffers;
mod passes;

use std::borrow::Cow;

use derivative::Derivative;
use glam::UVec2;
use log::{debug, info};
use penumbra_gpu::{CacheSample, Camera, Image, SamplingPattern};

use self::buffers::{id, DenoiserBuffers};
use self::passes::{DenoiserPasses, PassContext};
use crate::{
    measure, Command, DenoiserConfig, Error, FrameInput, Resolution, Result,
    Schedule,
};

/// Temporal accumulation and spatial denoising of a one sample per pixel
/// ambient occlusion signal.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Denoiser {
    config: DenoiserConfig,
    input_size: UVec2,
    buffers: DenoiserBuffers,
    passes: DenoiserPasses,
    prev_camera: Option<Camera>,

    #[derivative(Debug = "ignore")]
    schedule: Schedule,

    frame: u32,
}

impl Denoiser {
    /// Creates a denoiser for input of given size; with
    /// [`Resolution::Quarter`] it works at half of it.
    pub fn new(config: DenoiserConfig, input_size: UVec2) -> Result<Self> {
        config.validate()?;
        validate_size(input_size)?;

        let size = config.resolution.apply(input_size);

        info!("Creating denoiser; input_size={input_size}, size={size}");

        Ok(Self {
            config,
            input_size,
            buffers: DenoiserBuffers::new(size),
            passes: DenoiserPasses::new(&config),
            prev_camera: None,
            schedule: Default::default(),
            frame: 0,
        })
    }

    pub fn config(&self) -> &DenoiserConfig {
        &self.config
    }

    /// Replaces the configuration; history is kept unless the working
    /// resolution changes.
    pub fn set_config(&mut self, config: DenoiserConfig) -> Result<()> {
        config.validate()?;

        debug!("Updating denoiser config");

        let resolution_changed = config.resolution != self.config.resolution;

        self.config = config;
        self.passes = DenoiserPasses::new(&self.config);

        if resolution_changed {
            self.rebuild_buffers();
        }

        Ok(())
    }

    /// Size of the input (G-buffer and raw signal).
    pub fn input_size(&self) -> UVec2 {
        self.input_size
    }

    /// Size the denoiser works at, i.e. size of the output.
    pub fn size(&self) -> UVec2 {
        self.buffers.size
    }

    pub fn resize(&mut self, input_size: UVec2) -> Result<()> {
        validate_size(input_size)?;

        info!("Resizing denoiser; input_size={input_size}");

        self.input_size = input_size;
        self.rebuild_buffers();

        Ok(())
    }

    /// Forgets all history, e.g. after a camera cut.
    pub fn reset(&mut self) {
        info!("Resetting denoiser");

        self.buffers.clear_history();
        self.prev_camera = None;
    }

    fn rebuild_buffers(&mut self) {
        self.buffers =
            DenoiserBuffers::new(self.config.resolution.apply(self.input_size));

        self.prev_camera = None;
    }

    /// Processes a frame, returning the denoised signal.
    ///
    /// Input of wrong size is rejected before anything gets modified.
    pub fn denoise(&mut self, input: &FrameInput) -> Result<&Image<f32>> {
        Error::ensure_size("gbuffer", self.input_size, input.gbuffer.size())?;
        Error::ensure_size("signal", self.input_size, input.signal.size())?;

        let signal = input.signal.masked(input.sampling);

        let (camera, gbuffer, signal, sampling) = match self.config.resolution
        {
            Resolution::Full => (
                input.camera,
                Cow::Borrowed(input.gbuffer),
                signal,
                input.sampling,
            ),

            Resolution::Quarter => {
                let filter = self.config.downsample_filter;
                let signal = signal.downsample(input.gbuffer, filter);
                let gbuffer = input.gbuffer.downsample(filter);

                (
                    input.camera.downsampled(),
                    Cow::Owned(gbuffer),
                    signal,
                    SamplingPattern::Full,
                )
            }
        };

        self.schedule.begin_frame();
        self.buffers.cache.swap();
        self.buffers.normal_depth.swap();

        let mut ctxt = PassContext {
            camera: &camera,
            prev_camera: self.prev_camera.as_ref(),
            gbuffer: gbuffer.entries(),
            signal: &signal,
            sampling,
            buffers: &mut self.buffers,
            schedule: &mut self.schedule,
        };

        let passes = &self.passes;

        measure("reprojection", || passes.reprojection.run(&mut ctxt))?;
        measure("local_variance", || passes.local_variance.run(&mut ctxt))?;
        measure("accumulation", || passes.accumulation.run(&mut ctxt))?;

        measure("variance_smoothing", || {
            passes.variance_smoothing.run(&mut ctxt)
        })?;

        passes.low_tspp_blur.run(&mut ctxt)?;
        measure("missing_fill", || passes.missing_fill.run(&mut ctxt))?;
        passes.atrous.run(&mut ctxt)?;

        self.prev_camera = Some(camera);
        self.frame += 1;

        Ok(&self.buffers.output)
    }

    /// Returns the output of the latest frame; pixels without a surface are
    /// [`penumbra_gpu::INVALID_VALUE`].
    pub fn output(&self) -> &Image<f32> {
        &self.buffers.output
    }

    /// Returns the (smoothed) variance that guided the latest frame's
    /// filtering.
    pub fn variance(&self) -> &Image<f32> {
        &self.buffers.variance
    }

    /// Returns, for each pixel, the frame age it has after the latest frame's
    /// reprojection; useful for distributing rays.
    pub fn frame_ages(&self) -> &Image<u32> {
        &self.buffers.frame_age
    }

    /// Returns the temporal cache written by the latest frame.
    pub fn cache_sample(&self, pos: UVec2) -> CacheSample {
        CacheSample::deserialize(self.buffers.cache.current().get(pos))
    }

    /// Returns the commands recorded while processing the latest frame.
    pub fn commands(&self) -> &[Command] {
        self.schedule.commands()
    }

    /// Number of frames processed since creation.
    pub fn frame(&self) -> u32 {
        self.frame
    }
}

fn validate_size(size: UVec2) -> Result<()> {
    if size.x == 0 || size.y == 0 {
        Err(Error::InvalidResolution(size))
    } else {
        Ok(())
    }
}
