use crate::{
    is_valid_value, lerp, max_frame_age, CacheSample, F32Ext, LowTsppParams,
    INVALID_VALUE,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccumulationParams {
    /// Lower bound of the blend weight; also determines the maximum frame
    /// age (`1 / min_smoothing_factor`).
    pub min_smoothing_factor: f32,

    /// Blend with `min_smoothing_factor` as soon as there's any history.
    pub force_min_smoothing_factor: bool,

    /// Clamp new samples into the history's `k * sigma` neighbourhood.
    pub use_clamping: bool,

    pub std_dev_gamma: f32,
    pub min_std_dev_tolerance: f32,

    /// How fast the clamping window widens as the history gets older:
    /// `k = 1 + scale * frame_age / max_frame_age`.
    pub clamp_difference_to_frame_age_scale: f32,

    /// Frame age from which the variance gets derived from the running
    /// second moment instead of the spatial neighbourhood.
    pub min_frame_age_to_use_temporal_variance: u32,
}

impl AccumulationParams {
    pub fn max_frame_age(&self) -> u32 {
        max_frame_age(self.min_smoothing_factor)
    }

    /// Returns the weight of the new sample for history of given age.
    pub fn blend_weight(&self, frame_age: u32) -> f32 {
        if frame_age == 0 {
            return 1.0;
        }

        if self.force_min_smoothing_factor {
            return self.min_smoothing_factor;
        }

        (1.0 / (frame_age as f32 + 1.0)).max(self.min_smoothing_factor)
    }

    /// Clamps a new sample into the range spanned by the history's standard
    /// deviation; values already in range are returned untouched.
    pub fn clamp(&self, raw: f32, history: &CacheSample) -> f32 {
        if !self.use_clamping || !history.is_some() {
            return raw;
        }

        let std_dev = (self.std_dev_gamma * history.temporal_variance().sqrt())
            .max(self.min_std_dev_tolerance);

        let k = 1.0
            + self.clamp_difference_to_frame_age_scale
                * history.frame_age as f32
                / self.max_frame_age() as f32;

        raw.clamp(history.value - k * std_dev, history.value + k * std_dev)
    }
}

impl Default for AccumulationParams {
    fn default() -> Self {
        Self {
            min_smoothing_factor: 0.03,
            force_min_smoothing_factor: false,
            use_clamping: true,
            std_dev_gamma: 1.0,
            min_std_dev_tolerance: 0.04,
            clamp_difference_to_frame_age_scale: 4.0,
            min_frame_age_to_use_temporal_variance: 4,
        }
    }
}

/// Freshly traced sample of a pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AoSample {
    /// Ambient occlusion, or [`INVALID_VALUE`] if the pixel wasn't traced
    /// this frame.
    pub value: f32,
    pub hit_distance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Accumulated {
    pub cache: CacheSample,
    pub variance: f32,
    pub blur_strength: f32,
}

impl Accumulated {
    fn missing() -> Self {
        Self {
            cache: CacheSample::EMPTY,
            variance: INVALID_VALUE,
            blur_strength: 0.0,
        }
    }
}

/// Blends a new sample into the reprojected history.
pub struct TemporalAccumulator<'a> {
    pub params: &'a AccumulationParams,
    pub low_tspp: &'a LowTsppParams,
}

impl TemporalAccumulator<'_> {
    /// - `has_surface` - whether the G-buffer has a surface at this pixel,
    /// - `local_variance` - spatial variance of the raw signal around this
    ///   pixel, used until the history is old enough.
    pub fn blend(
        &self,
        has_surface: bool,
        raw: AoSample,
        history: CacheSample,
        local_variance: f32,
    ) -> Accumulated {
        if !has_surface {
            return Accumulated::missing();
        }

        if !is_valid_value(raw.value) {
            // Pixel wasn't traced this frame (checkerboard); keep whatever
            // history we've got, without aging it.
            if !history.is_some() {
                return Accumulated::missing();
            }

            return Accumulated {
                cache: history,
                variance: self.variance(&history, local_variance),
                blur_strength: self.blur_strength(history.frame_age),
            };
        }

        let cache = if history.is_some() {
            let value = self.params.clamp(raw.value, &history);
            let alpha = self.params.blend_weight(history.frame_age);

            CacheSample {
                frame_age: (history.frame_age + 1)
                    .min(self.params.max_frame_age()),
                value: lerp(history.value, value, alpha),
                squared_mean: lerp(history.squared_mean, value.sqr(), alpha),
                hit_distance: lerp(
                    history.hit_distance,
                    raw.hit_distance,
                    alpha,
                ),
            }
        } else {
            CacheSample {
                frame_age: 1,
                value: raw.value,
                squared_mean: raw.value.sqr(),
                hit_distance: raw.hit_distance,
            }
        };

        Accumulated {
            cache,
            variance: self.variance(&cache, local_variance),
            blur_strength: self.blur_strength(cache.frame_age),
        }
    }

    fn variance(&self, cache: &CacheSample, local_variance: f32) -> f32 {
        if cache.frame_age >= self.params.min_frame_age_to_use_temporal_variance
            || !is_valid_value(local_variance)
        {
            cache.temporal_variance()
        } else {
            local_variance
        }
    }

    fn blur_strength(&self, frame_age: u32) -> f32 {
        self.low_tspp.blur_strength(frame_age)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn sample(value: f32) -> AoSample {
        AoSample {
            value,
            hit_distance: 1.0,
        }
    }

    fn history(frame_age: u32, value: f32, squared_mean: f32) -> CacheSample {
        CacheSample {
            frame_age,
            value,
            squared_mean,
            hit_distance: 1.0,
        }
    }

    #[test]
    fn blend_weight_is_bounded() {
        for force in [false, true] {
            let params = AccumulationParams {
                force_min_smoothing_factor: force,
                ..Default::default()
            };

            for frame_age in 0..=100 {
                let alpha = params.blend_weight(frame_age);

                assert!(alpha >= params.min_smoothing_factor);
                assert!(alpha <= 1.0);
            }
        }
    }

    #[test]
    fn clamp_keeps_values_in_range() {
        let params = AccumulationParams::default();
        let history = history(10, 0.5, 0.25 + 0.01);

        for raw in [0.45, 0.5, 0.52, 0.55] {
            assert_eq!(raw, params.clamp(raw, &history));
        }

        assert!(params.clamp(0.0, &history) > 0.0);
        assert!(params.clamp(1.0, &history) < 1.0);
    }

    #[test]
    fn clamp_widens_with_frame_age() {
        let params = AccumulationParams::default();
        let young = params.clamp(1.0, &history(1, 0.5, 0.25));
        let old = params.clamp(1.0, &history(30, 0.5, 0.25));

        assert!(old > young);
    }

    #[test]
    fn first_sample_seeds_history() {
        let params = AccumulationParams::default();
        let low_tspp = LowTsppParams::default();
        let accumulator = TemporalAccumulator {
            params: &params,
            low_tspp: &low_tspp,
        };

        let actual =
            accumulator.blend(true, sample(0.7), CacheSample::EMPTY, 0.01);

        assert_eq!(1, actual.cache.frame_age);
        assert_relative_eq!(actual.cache.value, 0.7);
        assert_relative_eq!(actual.cache.squared_mean, 0.7 * 0.7);
        assert_relative_eq!(actual.variance, 0.01);
        assert!(actual.blur_strength > 0.0);
    }

    #[test]
    fn frame_age_saturates() {
        let params = AccumulationParams::default();
        let low_tspp = LowTsppParams::default();
        let accumulator = TemporalAccumulator {
            params: &params,
            low_tspp: &low_tspp,
        };

        let mut cache = CacheSample::EMPTY;

        for _ in 0..100 {
            let prev_age = cache.frame_age;

            cache = accumulator.blend(true, sample(0.5), cache, 0.0).cache;

            assert!(cache.frame_age >= prev_age);
        }

        assert_eq!(33, cache.frame_age);
        assert_eq!(
            0.0,
            accumulator.blend(true, sample(0.5), cache, 0.0).blur_strength
        );
    }

    #[test]
    fn untraced_pixel_keeps_history() {
        let params = AccumulationParams::default();
        let low_tspp = LowTsppParams::default();
        let accumulator = TemporalAccumulator {
            params: &params,
            low_tspp: &low_tspp,
        };

        let history = history(5, 0.3, 0.1);
        let actual =
            accumulator.blend(true, sample(INVALID_VALUE), history, 0.0);

        assert_eq!(history, actual.cache);

        let actual = accumulator.blend(
            true,
            sample(INVALID_VALUE),
            CacheSample::EMPTY,
            0.0,
        );

        assert!(!actual.cache.is_some());
        assert_eq!(INVALID_VALUE, actual.cache.value);
    }

    #[test]
    fn sky_is_missing() {
        let params = AccumulationParams::default();
        let low_tspp = LowTsppParams::default();
        let accumulator = TemporalAccumulator {
            params: &params,
            low_tspp: &low_tspp,
        };

        let actual =
            accumulator.blend(false, sample(0.5), history(5, 0.5, 0.25), 0.0);

        assert_eq!(CacheSample::EMPTY, actual.cache);
    }
}
