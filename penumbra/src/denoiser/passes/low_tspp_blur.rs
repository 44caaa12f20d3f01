use penumbra_gpu::{BlurPassParams, Image, LowTsppParams, MultiPassBlur};

use super::PassContext;
use crate::denoiser::id;
use crate::{measure, DenoiserConfig, QueueKind, Result};

/// Blurs pixels whose history is too short for the variance-guided filter to
/// be trusted.
#[derive(Debug)]
pub struct LowTsppBlurPass {
    params: LowTsppParams,
    passes: Vec<BlurPassParams>,
}

impl LowTsppBlurPass {
    pub fn new(config: &DenoiserConfig) -> Self {
        let params = config.low_tspp;

        let passes = if params.enabled {
            (0..params.blur_passes).map(BlurPassParams::new).collect()
        } else {
            Vec::new()
        };

        Self { params, passes }
    }

    pub fn run(&self, ctxt: &mut PassContext) -> Result<()> {
        for &pass in &self.passes {
            let label = format!("low_tspp_blur_{}", pass.pass);
            let buffers = &mut *ctxt.buffers;

            ctxt.schedule.dispatch(
                QueueKind::Compute,
                &label,
                &[
                    &id("gbuffer"),
                    &id("blur_strength"),
                    &buffers.filtered.previous_id(),
                ],
                &[&buffers.filtered.current_id()],
            )?;

            measure(&label, || {
                let (output, input) = buffers.filtered.split_mut();

                let blur = MultiPassBlur {
                    params: &self.params,
                    pass,
                    gbuffer: ctxt.gbuffer,
                    signal: input,
                    blur_strength: &buffers.blur_strength,
                };

                *output = Image::from_fn(input.size(), |pos| blur.run(pos));
            });

            buffers.filtered.swap();
        }

        Ok(())
    }
}
