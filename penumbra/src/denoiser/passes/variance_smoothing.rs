use penumbra_gpu::{smooth_variance, Image};

use super::PassContext;
use crate::denoiser::id;
use crate::{DenoiserConfig, QueueKind, Result};

#[derive(Debug)]
pub struct VarianceSmoothingPass {
    enabled: bool,
}

impl VarianceSmoothingPass {
    pub fn new(config: &DenoiserConfig) -> Self {
        Self {
            enabled: config.variance.use_smoothed_variance,
        }
    }

    pub fn run(&self, ctxt: &mut PassContext) -> Result<()> {
        let buffers = &mut *ctxt.buffers;

        buffers.variance = if self.enabled {
            ctxt.schedule.dispatch(
                QueueKind::Compute,
                "variance_smoothing",
                &[&id("variance_raw")],
                &[&id("variance")],
            )?;

            Image::from_fn(buffers.size, |pos| {
                smooth_variance(&buffers.variance_raw, pos)
            })
        } else {
            buffers.variance_raw.clone()
        };

        Ok(())
    }
}
