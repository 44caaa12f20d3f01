use glam::{ivec2, IVec2, UVec2, Vec2};

use crate::{
    interpolate_depth, is_valid_value, lerp, AtrousPassParams, F32Ext,
    GBufferEntry, Image, PENUMBRA_EPSILON,
};

/// Maximum number of à-trous passes.
pub const MAX_ATROUS_PASSES: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AtrousKernel {
    Box3x3,
    #[default]
    Gaussian3x3,
    Gaussian5x5,
}

impl AtrousKernel {
    pub fn radius(&self) -> i32 {
        match self {
            AtrousKernel::Box3x3 | AtrousKernel::Gaussian3x3 => 1,
            AtrousKernel::Gaussian5x5 => 2,
        }
    }

    /// Returns weight of the tap at given (undilated) offset.
    pub fn weight(&self, offset: IVec2) -> f32 {
        const GAUSSIAN_3: [f32; 2] = [1.0 / 2.0, 1.0 / 4.0];
        const GAUSSIAN_5: [f32; 3] = [3.0 / 8.0, 1.0 / 4.0, 1.0 / 16.0];

        let offset = offset.abs();

        match self {
            AtrousKernel::Box3x3 => 1.0,
            AtrousKernel::Gaussian3x3 => {
                GAUSSIAN_3[offset.x as usize] * GAUSSIAN_3[offset.y as usize]
            }
            AtrousKernel::Gaussian5x5 => {
                GAUSSIAN_5[offset.x as usize] * GAUSSIAN_5[offset.y as usize]
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtrousParams {
    pub num_passes: u32,
    pub kernel: AtrousKernel,

    /// Use `1 << kernel_step_shifts[pass]` as the tap spacing instead of
    /// `1 << pass`.
    pub use_kernel_step_shifts: bool,
    pub kernel_step_shifts: [u32; MAX_ATROUS_PASSES],

    /// Sigma of the value-similarity term; zero disables the term.
    pub value_sigma: f32,

    /// Scale of `value_sigma` for passes after the first one.
    pub later_pass_value_sigma_scale: f32,

    /// Divide value differences by the local standard deviation.
    pub use_spatial_variance: bool,

    /// Exponent applied to `dot(n0, n1)`.
    pub normal_sigma: f32,

    pub depth_sigma: f32,

    /// Taps whose depth weight drops below this get rejected completely.
    pub depth_weight_cutoff: f32,

    pub absolute_depth_tolerance: f32,
    pub perspective_correct_depth_interpolation: bool,

    pub use_adaptive_kernel_size: bool,
    pub min_kernel_width: u32,

    /// Upper bound of the adaptive kernel width, in percent of the screen
    /// width.
    pub max_kernel_width_percentage: f32,

    pub variance_sigma_scale_on_small_kernels: f32,

    /// How quickly the kernel shrinks with growing ray hit distance.
    pub hit_distance_scale_factor: f32,

    /// Filter pixels even if they're old enough to be skipped.
    pub force_denoise_pass: bool,

    pub max_frame_age_to_denoise_first_pass: u32,
    pub max_frame_age_to_denoise: u32,
    pub min_variance_to_denoise: f32,
}

impl Default for AtrousParams {
    fn default() -> Self {
        Self {
            num_passes: 1,
            kernel: Default::default(),
            use_kernel_step_shifts: false,
            kernel_step_shifts: [3, 1, 0, 0, 0, 0, 0, 0],
            value_sigma: 0.3,
            later_pass_value_sigma_scale: 0.5,
            use_spatial_variance: true,
            normal_sigma: 64.0,
            depth_sigma: 0.5,
            depth_weight_cutoff: 0.2,
            absolute_depth_tolerance: 0.05,
            perspective_correct_depth_interpolation: true,
            use_adaptive_kernel_size: true,
            min_kernel_width: 3,
            max_kernel_width_percentage: 1.5,
            variance_sigma_scale_on_small_kernels: 2.0,
            hit_distance_scale_factor: 0.07,
            force_denoise_pass: false,
            max_frame_age_to_denoise_first_pass: 16,
            max_frame_age_to_denoise: 33,
            min_variance_to_denoise: 0.0,
        }
    }
}

impl AtrousParams {
    /// Returns `(step scale, value sigma scale)` of the adaptive kernel.
    pub fn adaptive_kernel(
        &self,
        hit_distance: f32,
        std_dev: f32,
        screen_width: u32,
    ) -> (f32, f32) {
        if !self.use_adaptive_kernel_size {
            return (1.0, 1.0);
        }

        let min_width = self.min_kernel_width as f32;

        let max_width = (self.max_kernel_width_percentage / 100.0
            * screen_width as f32)
            .max(min_width);

        let t = (1.0 - self.hit_distance_scale_factor * hit_distance)
            .saturate()
            * (4.0 * std_dev).saturate();

        let width = lerp(min_width, max_width, t);

        let smallness = if max_width > min_width {
            (width - min_width) / (max_width - min_width)
        } else {
            0.0
        };

        (
            (width / 3.0).max(1.0),
            lerp(self.variance_sigma_scale_on_small_kernels, 1.0, smallness),
        )
    }

    /// Edge-stopping weight of the depth term; exactly zero past the cutoff.
    pub fn depth_weight(
        &self,
        center: &GBufferEntry,
        sample_depth: f32,
        offset: Vec2,
    ) -> f32 {
        let expected = interpolate_depth(
            center.depth,
            center.ddxy,
            offset,
            self.perspective_correct_depth_interpolation,
        );

        let tolerance =
            self.absolute_depth_tolerance + center.ddxy.dot(offset).abs();

        let weight = (-(sample_depth - expected).abs()
            / (self.depth_sigma * tolerance + PENUMBRA_EPSILON))
            .exp();

        if weight < self.depth_weight_cutoff {
            0.0
        } else {
            weight
        }
    }

    pub fn normal_weight(
        &self,
        center: &GBufferEntry,
        sample: &GBufferEntry,
    ) -> f32 {
        center.normal.dot(sample.normal).max(0.0).powf(self.normal_sigma)
    }

    /// Value-similarity term; `value_sigma == 0` disables it.
    pub fn value_weight(
        &self,
        center_value: f32,
        sample_value: f32,
        value_sigma: f32,
        std_dev: f32,
    ) -> f32 {
        if value_sigma <= 0.0 {
            return 1.0;
        }

        let sigma = if self.use_spatial_variance {
            value_sigma * (std_dev + 0.001)
        } else {
            value_sigma
        };

        (-(center_value - sample_value).abs() / sigma).exp()
    }

    /// Returns the weight of the tap between two pixels, including kernel
    /// weight.
    pub fn tap_weight(
        &self,
        center: (&GBufferEntry, f32),
        sample: (&GBufferEntry, f32),
        offset: Vec2,
        kernel_weight: f32,
        value_sigma: f32,
        std_dev: f32,
    ) -> f32 {
        if !sample.0.is_some() || !is_valid_value(sample.1) {
            return 0.0;
        }

        let depth_weight = self.depth_weight(center.0, sample.0.depth, offset);

        if depth_weight == 0.0 {
            return 0.0;
        }

        kernel_weight
            * depth_weight
            * self.normal_weight(center.0, sample.0)
            * self.value_weight(center.1, sample.1, value_sigma, std_dev)
    }
}

/// One pass of the edge-aware à-trous filter.
pub struct AtrousFilter<'a> {
    pub params: &'a AtrousParams,
    pub pass: AtrousPassParams,
    pub gbuffer: &'a Image<GBufferEntry>,
    pub signal: &'a Image<f32>,
    pub variance: &'a Image<f32>,
    pub hit_distance: &'a Image<f32>,
    pub frame_age: &'a Image<u32>,
}

impl AtrousFilter<'_> {
    pub fn run(&self, screen_pos: UVec2) -> f32 {
        let center = self.gbuffer.get(screen_pos);
        let center_value = self.signal.get(screen_pos);

        if !center.is_some() || !is_valid_value(center_value) {
            return center_value;
        }

        let variance = self.variance.get(screen_pos).max(0.0);

        if !self.params.force_denoise_pass
            && (self.frame_age.get(screen_pos) > self.pass.max_frame_age
                || variance < self.params.min_variance_to_denoise)
        {
            return center_value;
        }

        let std_dev = variance.sqrt();

        let (step_scale, sigma_scale) = self.params.adaptive_kernel(
            self.hit_distance.get(screen_pos),
            std_dev,
            self.signal.size().x,
        );

        let step = self.pass.step as f32 * step_scale;
        let value_sigma = self.pass.value_sigma * sigma_scale;
        let radius = self.params.kernel.radius();

        let mut sum = 0.0;
        let mut weights = 0.0;

        for y in -radius..=radius {
            for x in -radius..=radius {
                let tap = ivec2(x, y);
                let offset = (tap.as_vec2() * step).round();
                let pos = screen_pos.as_ivec2() + offset.as_ivec2();

                let Some(sample_value) = self.signal.read(pos) else {
                    continue;
                };

                let sample = self.gbuffer.get(pos.as_uvec2());

                let weight = self.params.tap_weight(
                    (&center, center_value),
                    (&sample, sample_value),
                    offset,
                    self.params.kernel.weight(tap),
                    value_sigma,
                    std_dev,
                );

                sum += sample_value * weight;
                weights += weight;
            }
        }

        if weights > 0.0 {
            sum / weights
        } else {
            center_value
        }
    }
}
