use penumbra_gpu::{fill_missing, Image, LowTsppParams};

use super::PassContext;
use crate::denoiser::id;
use crate::{DenoiserConfig, QueueKind, Result};

/// Gives a value to pixels that have a surface but no sample nor history.
#[derive(Debug)]
pub struct MissingFillPass {
    params: LowTsppParams,
}

impl MissingFillPass {
    pub fn new(config: &DenoiserConfig) -> Self {
        Self {
            params: config.low_tspp,
        }
    }

    pub fn run(&self, ctxt: &mut PassContext) -> Result<()> {
        if !self.params.fill_missing_values {
            return Ok(());
        }

        let buffers = &mut *ctxt.buffers;

        ctxt.schedule.dispatch(
            QueueKind::Compute,
            "missing_fill",
            &[&id("gbuffer"), &buffers.filtered.previous_id()],
            &[&buffers.filtered.current_id()],
        )?;

        let (output, input) = buffers.filtered.split_mut();

        *output = Image::from_fn(input.size(), |pos| {
            fill_missing(&self.params, ctxt.gbuffer, input, pos)
        });

        buffers.filtered.swap();

        Ok(())
    }
}
