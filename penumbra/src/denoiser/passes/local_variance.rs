use penumbra_gpu::{
    cross_fill, Image, LocalVarianceEstimator, SamplingPattern, VarianceParams,
};

use super::PassContext;
use crate::denoiser::id;
use crate::{DenoiserConfig, QueueKind, Result};

/// Estimates local mean and variance of the raw signal; used until the
/// temporal variance becomes reliable.
#[derive(Debug)]
pub struct LocalVariancePass {
    params: VarianceParams,
}

impl LocalVariancePass {
    pub fn new(config: &DenoiserConfig) -> Self {
        Self {
            params: config.variance,
        }
    }

    pub fn run(&self, ctxt: &mut PassContext) -> Result<()> {
        let size = ctxt.gbuffer.size();

        let estimator = LocalVarianceEstimator {
            params: &self.params,
            gbuffer: ctxt.gbuffer,
            signal: ctxt.signal.value(),
        };

        let moments = if self.params.filter.is_separable() {
            ctxt.schedule.dispatch(
                QueueKind::Compute,
                "local_variance_horizontal",
                &[&id("gbuffer"), &id("signal")],
                &[&id("moments_partial")],
            )?;

            let partial = Image::from_fn(size, |pos| estimator.horizontal(pos));

            ctxt.schedule.dispatch(
                QueueKind::Compute,
                "local_variance_vertical",
                &[&id("gbuffer"), &id("moments_partial")],
                &[&id("moments")],
            )?;

            Image::from_fn(size, |pos| estimator.vertical(&partial, pos))
        } else {
            ctxt.schedule.dispatch(
                QueueKind::Compute,
                "local_variance",
                &[&id("gbuffer"), &id("signal")],
                &[&id("moments")],
            )?;

            Image::from_fn(size, |pos| estimator.square(pos))
        };

        ctxt.buffers.moments = if let SamplingPattern::Full = ctxt.sampling {
            moments
        } else {
            ctxt.schedule.dispatch(
                QueueKind::Compute,
                "local_variance_fill",
                &[&id("moments")],
                &[&id("moments_filled")],
            )?;

            Image::from_fn(size, |pos| {
                if ctxt.sampling.is_active(pos) {
                    moments.get(pos)
                } else {
                    cross_fill(&moments, pos)
                }
            })
        };

        Ok(())
    }
}
