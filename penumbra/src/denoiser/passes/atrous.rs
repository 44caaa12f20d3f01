use log::trace;
use penumbra_gpu::{
    is_valid_value, AtrousFilter, AtrousParams, AtrousPassParams, CacheSample,
    Image,
};

use super::PassContext;
use crate::denoiser::id;
use crate::{measure, CacheParams, DenoiserConfig, QueueKind, Result};

/// Edge-aware à-trous filter guided by variance; optionally writes one of its
/// intermediate results back into the temporal cache.
#[derive(Debug)]
pub struct AtrousPass {
    params: AtrousParams,
    passes: Vec<AtrousPassParams>,
    cache: CacheParams,
}

impl AtrousPass {
    pub fn new(config: &DenoiserConfig) -> Self {
        let passes = (0..config.atrous.num_passes)
            .map(|pass| AtrousPassParams::new(&config.atrous, pass))
            .collect();

        Self {
            params: config.atrous,
            passes,
            cache: config.cache,
        }
    }

    pub fn run(&self, ctxt: &mut PassContext) -> Result<()> {
        let mut intermediate = None;

        for &pass in &self.passes {
            let label = format!("atrous_{}", pass.pass);
            let buffers = &mut *ctxt.buffers;

            trace!("{label}: step={}, sigma={}", pass.step, pass.value_sigma);

            ctxt.schedule.dispatch(
                QueueKind::Compute,
                &label,
                &[
                    &id("gbuffer"),
                    &id("variance"),
                    &id("hit_distance"),
                    &id("history_age"),
                    &buffers.filtered.previous_id(),
                ],
                &[&buffers.filtered.current_id()],
            )?;

            measure(&label, || {
                let (output, input) = buffers.filtered.split_mut();

                let filter = AtrousFilter {
                    params: &self.params,
                    pass,
                    gbuffer: ctxt.gbuffer,
                    signal: input,
                    variance: &buffers.variance,
                    hit_distance: &buffers.hit_distance,
                    frame_age: &buffers.history_age,
                };

                *output = Image::from_fn(input.size(), |pos| filter.run(pos));
            });

            buffers.filtered.swap();

            if self.cache.cache_denoised_output
                && pass.pass == self.cache.cache_denoised_output_pass
            {
                intermediate = Some(buffers.filtered.previous().clone());
            }
        }

        let buffers = &mut *ctxt.buffers;

        if let Some(intermediate) = intermediate {
            ctxt.schedule.dispatch(
                QueueKind::Compute,
                "cache_denoised_output",
                &[&id("denoised_intermediate")],
                &[&buffers.cache.current_id()],
            )?;

            let cache = buffers.cache.current_mut();

            for pos in intermediate.positions() {
                let mut sample = CacheSample::deserialize(cache.get(pos));
                let value = intermediate.get(pos);

                if sample.is_some() && is_valid_value(value) {
                    sample.value = value;
                    cache.set(pos, sample.serialize());
                }
            }
        }

        buffers.output = buffers.filtered.previous().clone();

        Ok(())
    }
}
