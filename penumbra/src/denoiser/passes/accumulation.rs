use penumbra_gpu::{
    AccumulationParams, AoSample, CacheSample, LowTsppParams,
    TemporalAccumulator,
};

use super::PassContext;
use crate::denoiser::id;
use crate::{DenoiserConfig, QueueKind, Result};

/// Blends the raw signal into the reprojected history, producing the current
/// cache together with per-pixel variance and low frame age blur strength.
#[derive(Debug)]
pub struct AccumulationPass {
    params: AccumulationParams,
    low_tspp: LowTsppParams,
}

impl AccumulationPass {
    pub fn new(config: &DenoiserConfig) -> Self {
        Self {
            params: config.accumulation,
            low_tspp: config.low_tspp,
        }
    }

    pub fn run(&self, ctxt: &mut PassContext) -> Result<()> {
        let buffers = &mut *ctxt.buffers;

        ctxt.schedule.dispatch(
            QueueKind::Compute,
            "accumulation",
            &[
                &id("gbuffer"),
                &id("signal"),
                &id("reprojected"),
                &id("moments"),
            ],
            &[
                &buffers.cache.current_id(),
                &buffers.filtered.current_id(),
                &id("variance_raw"),
                &id("blur_strength"),
                &id("history_age"),
                &id("hit_distance"),
            ],
        )?;

        let accumulator = TemporalAccumulator {
            params: &self.params,
            low_tspp: &self.low_tspp,
        };

        let cache = buffers.cache.current_mut();
        let filtered = buffers.filtered.current_mut();

        for pos in ctxt.gbuffer.positions() {
            let raw = AoSample {
                value: ctxt.signal.value().get(pos),
                hit_distance: ctxt.signal.hit_distance().get(pos),
            };

            let out = accumulator.blend(
                ctxt.gbuffer.get(pos).is_some(),
                raw,
                CacheSample::deserialize(buffers.reprojected.get(pos)),
                buffers.moments.get(pos).y,
            );

            cache.set(pos, out.cache.serialize());
            filtered.set(pos, out.cache.value);
            buffers.variance_raw.set(pos, out.variance);
            buffers.blur_strength.set(pos, out.blur_strength);
            buffers.history_age.set(pos, out.cache.frame_age);
            buffers.hit_distance.set(pos, out.cache.hit_distance);
        }

        buffers.filtered.swap();

        Ok(())
    }
}
