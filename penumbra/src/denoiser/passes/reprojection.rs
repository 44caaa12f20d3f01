use penumbra_gpu::{CacheSample, ReprojectionParams, ReverseReprojector};

use super::PassContext;
use crate::denoiser::id;
use crate::{DenoiserConfig, QueueKind, Result};

/// Finds each pixel's history and resamples the previous cache there.
#[derive(Debug)]
pub struct ReprojectionPass {
    params: ReprojectionParams,
    max_frame_age: u32,
}

impl ReprojectionPass {
    pub fn new(config: &DenoiserConfig) -> Self {
        Self {
            params: config.reprojection,
            max_frame_age: config.accumulation.max_frame_age(),
        }
    }

    pub fn run(&self, ctxt: &mut PassContext) -> Result<()> {
        let buffers = &mut *ctxt.buffers;

        ctxt.schedule.dispatch(
            QueueKind::Compute,
            "reprojection",
            &[
                &id("gbuffer"),
                &buffers.normal_depth.previous_id(),
                &buffers.cache.previous_id(),
            ],
            &[
                &id("reprojected"),
                &id("frame_age"),
                &buffers.normal_depth.current_id(),
            ],
        )?;

        let (normal_depth, prev_normal_depth) =
            buffers.normal_depth.split_mut();

        if let Some(prev_camera) = ctxt.prev_camera {
            let reprojector = ReverseReprojector {
                params: &self.params,
                curr_camera: ctxt.camera,
                prev_camera,
                curr_gbuffer: ctxt.gbuffer,
                prev_normal_depth,
            };

            for pos in ctxt.gbuffer.positions() {
                let reprojection = reprojector.reproject(pos);

                let sample = reprojector.resample(
                    reprojection,
                    buffers.cache.previous(),
                    self.max_frame_age,
                );

                let frame_age = if sample.is_some() {
                    (sample.frame_age + 1).min(self.max_frame_age)
                } else {
                    0
                };

                buffers.reprojected.set(pos, sample.serialize());
                buffers.frame_age.set(pos, frame_age);
            }
        } else {
            buffers.reprojected.fill(CacheSample::EMPTY.serialize());

            buffers.frame_age.fill(0);
        }

        *normal_depth = ctxt.gbuffer.map(|entry| entry.normal_depth().pack());

        Ok(())
    }
}
