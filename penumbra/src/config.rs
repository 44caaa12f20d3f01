use std::fmt::Display;
use std::ops::RangeInclusive;

use penumbra_gpu::{
    AccumulationParams, AtrousParams, LowTsppParams, ReprojectionParams,
    VarianceParams, MAX_ATROUS_PASSES,
};

use crate::{DownsampleFilter, Error, Resolution, Result};

/// Everything that drives the denoiser; checked by [`Self::validate()`]
/// before it gets used.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DenoiserConfig {
    pub resolution: Resolution,
    pub downsample_filter: DownsampleFilter,
    pub reprojection: ReprojectionParams,
    pub accumulation: AccumulationParams,
    pub variance: VarianceParams,
    pub atrous: AtrousParams,
    pub low_tspp: LowTsppParams,
    pub cache: CacheParams,
}

/// Whether an intermediate à-trous pass gets written back into the temporal
/// cache, so that the history converges faster.
///
/// The pass has to be one the filter actually runs, i.e. below
/// `atrous.num_passes`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheParams {
    pub cache_denoised_output: bool,
    pub cache_denoised_output_pass: u32,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            cache_denoised_output: true,
            cache_denoised_output_pass: 0,
        }
    }
}

impl DenoiserConfig {
    /// Checks every numeric field against its valid range.
    pub fn validate(&self) -> Result<()> {
        self.validate_reprojection()?;
        self.validate_accumulation()?;
        self.validate_variance()?;
        self.validate_atrous()?;
        self.validate_low_tspp()?;
        self.validate_cache()?;

        Ok(())
    }

    fn validate_reprojection(&self) -> Result<()> {
        let params = &self.reprojection;

        within(
            "reprojection.absolute_depth_tolerance",
            params.absolute_depth_tolerance,
            0.0..=100.0,
        )?;

        within(
            "reprojection.depth_tolerance",
            params.depth_tolerance,
            0.0..=1.0,
        )?;

        within(
            "reprojection.min_normal_dot",
            params.min_normal_dot,
            -1.0..=1.0,
        )
    }

    fn validate_accumulation(&self) -> Result<()> {
        let params = &self.accumulation;

        Error::ensure(
            params.min_smoothing_factor > 0.0
                && params.min_smoothing_factor <= 1.0,
            "accumulation.min_smoothing_factor",
            params.min_smoothing_factor,
            "must be within 0 (exclusive) ..= 1",
        )?;

        within(
            "accumulation.std_dev_gamma",
            params.std_dev_gamma,
            0.1..=20.0,
        )?;

        within(
            "accumulation.min_std_dev_tolerance",
            params.min_std_dev_tolerance,
            0.0..=1.0,
        )?;

        within(
            "accumulation.clamp_difference_to_frame_age_scale",
            params.clamp_difference_to_frame_age_scale,
            0.0..=10.0,
        )?;

        within(
            "accumulation.min_frame_age_to_use_temporal_variance",
            params.min_frame_age_to_use_temporal_variance,
            1..=40,
        )
    }

    fn validate_variance(&self) -> Result<()> {
        let params = &self.variance;

        Error::ensure(
            (3..=11).contains(&params.kernel_width)
                && params.kernel_width % 2 == 1,
            "variance.kernel_width",
            params.kernel_width,
            "must be odd and within 3 ..= 11",
        )?;

        within("variance.depth_sigma", params.depth_sigma, 0.0..=10.0)?;
        within("variance.normal_sigma", params.normal_sigma, 0.0..=256.0)
    }

    fn validate_atrous(&self) -> Result<()> {
        let params = &self.atrous;

        within(
            "atrous.num_passes",
            params.num_passes,
            1..=MAX_ATROUS_PASSES as u32,
        )?;

        Error::ensure(
            params.kernel_step_shifts.iter().all(|&shift| shift <= 10),
            "atrous.kernel_step_shifts",
            format!("{:?}", params.kernel_step_shifts),
            "shifts must be within 0 ..= 10",
        )?;

        within("atrous.value_sigma", params.value_sigma, 0.0..=30.0)?;

        within(
            "atrous.later_pass_value_sigma_scale",
            params.later_pass_value_sigma_scale,
            0.0..=1.0,
        )?;

        within("atrous.normal_sigma", params.normal_sigma, 0.0..=256.0)?;
        within("atrous.depth_sigma", params.depth_sigma, 0.0..=10.0)?;

        within(
            "atrous.depth_weight_cutoff",
            params.depth_weight_cutoff,
            0.0..=1.0,
        )?;

        within(
            "atrous.absolute_depth_tolerance",
            params.absolute_depth_tolerance,
            0.0..=100.0,
        )?;

        within(
            "atrous.min_kernel_width",
            params.min_kernel_width,
            3..=101,
        )?;

        within(
            "atrous.max_kernel_width_percentage",
            params.max_kernel_width_percentage,
            0.0..=100.0,
        )?;

        within(
            "atrous.variance_sigma_scale_on_small_kernels",
            params.variance_sigma_scale_on_small_kernels,
            1.0..=20.0,
        )?;

        within(
            "atrous.hit_distance_scale_factor",
            params.hit_distance_scale_factor,
            0.001..=10.0,
        )?;

        within(
            "atrous.min_variance_to_denoise",
            params.min_variance_to_denoise,
            0.0..=1.0,
        )?;

        within(
            "atrous.max_frame_age_to_denoise_first_pass",
            params.max_frame_age_to_denoise_first_pass,
            1..=64,
        )?;

        within(
            "atrous.max_frame_age_to_denoise",
            params.max_frame_age_to_denoise,
            1..=34,
        )
    }

    fn validate_low_tspp(&self) -> Result<()> {
        let params = &self.low_tspp;

        within("low_tspp.max_frame_age", params.max_frame_age, 0..=33)?;
        within("low_tspp.blur_passes", params.blur_passes, 2..=6)?;

        within(
            "low_tspp.decay_constant",
            params.decay_constant,
            0.1..=32.0,
        )?;

        within(
            "low_tspp.min_normal_weight",
            params.min_normal_weight,
            0.0..=1.0,
        )?;

        within(
            "low_tspp.normal_exponent",
            params.normal_exponent,
            1.0..=32.0,
        )?;

        within(
            "low_tspp.depth_tolerance",
            params.depth_tolerance,
            0.0..=1.0,
        )
    }

    fn validate_cache(&self) -> Result<()> {
        let params = &self.cache;

        Error::ensure(
            !params.cache_denoised_output
                || params.cache_denoised_output_pass < self.atrous.num_passes,
            "cache.cache_denoised_output_pass",
            params.cache_denoised_output_pass,
            "must be below atrous.num_passes",
        )
    }
}

/// Rejects `value` outside of `range`; NaNs are rejected, too.
fn within<T>(
    field: &'static str,
    value: T,
    range: RangeInclusive<T>,
) -> Result<()>
where
    T: PartialOrd + Display,
{
    Error::ensure(
        range.contains(&value),
        field,
        &value,
        format!("must be within {} ..= {}", range.start(), range.end()),
    )
}
