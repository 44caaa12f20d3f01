use glam::{ivec2, vec2, vec3, IVec2, UVec2, Vec2, Vec3};

use crate::{
    is_valid_value, F32Ext, GBufferEntry, Image, INVALID_VALUE,
    PENUMBRA_EPSILON,
};

/// Which pixels got traced this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplingPattern {
    #[default]
    Full,

    /// Only every other pixel gets traced; which half alternates each frame.
    Checkerboard { even_pixels_active: bool },
}

impl SamplingPattern {
    pub fn is_active(&self, pos: UVec2) -> bool {
        match *self {
            SamplingPattern::Full => true,
            SamplingPattern::Checkerboard { even_pixels_active } => {
                ((pos.x + pos.y) % 2 == 0) == even_pixels_active
            }
        }
    }

    /// Returns the pattern to use for the next frame.
    pub fn next(&self) -> Self {
        match *self {
            SamplingPattern::Full => SamplingPattern::Full,
            SamplingPattern::Checkerboard { even_pixels_active } => {
                SamplingPattern::Checkerboard {
                    even_pixels_active: !even_pixels_active,
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VarianceFilter {
    /// Full `n x n` window, weighted by depth and normal similarity.
    SquareBilateral,

    /// Two `n`-wide passes weighted by depth and normal similarity along each
    /// axis.
    SeparableBilateral,

    /// Two `n`-wide unweighted passes.
    #[default]
    Separable,
}

impl VarianceFilter {
    pub fn is_separable(&self) -> bool {
        !matches!(self, VarianceFilter::SquareBilateral)
    }

    pub fn is_bilateral(&self) -> bool {
        !matches!(self, VarianceFilter::Separable)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VarianceParams {
    pub filter: VarianceFilter,

    /// Odd, `3 ..= 11`.
    pub kernel_width: u32,

    /// Relative depth tolerance of the bilateral weights.
    pub depth_sigma: f32,

    /// Exponent applied to `dot(n0, n1)` by the bilateral weights.
    pub normal_sigma: f32,

    /// Run the 3x3 Gaussian over the variance before it drives the à-trous
    /// filter.
    pub use_smoothed_variance: bool,
}

impl Default for VarianceParams {
    fn default() -> Self {
        Self {
            filter: Default::default(),
            kernel_width: 7,
            depth_sigma: 1.0,
            normal_sigma: 32.0,
            use_smoothed_variance: true,
        }
    }
}

impl VarianceParams {
    pub fn radius(&self) -> i32 {
        (self.kernel_width / 2) as i32
    }

    fn weight(&self, center: &GBufferEntry, sample: &GBufferEntry) -> f32 {
        if !sample.is_some() {
            return 0.0;
        }

        if !self.filter.is_bilateral() {
            return 1.0;
        }

        let tolerance =
            (self.depth_sigma * center.depth * 0.05).max(PENUMBRA_EPSILON);

        let depth_weight =
            (-(center.depth - sample.depth).abs() / tolerance).exp();

        let normal_weight =
            center.normal.dot(sample.normal).max(0.0).powf(self.normal_sigma);

        depth_weight * normal_weight
    }
}

/// Estimates local mean and variance of the raw (noisy) signal.
///
/// Local moments are returned as `(mean, variance)`; pixels for which nothing
/// could be gathered yield [`INVALID_VALUE`] in both components.
pub struct LocalVarianceEstimator<'a> {
    pub params: &'a VarianceParams,
    pub gbuffer: &'a Image<GBufferEntry>,
    pub signal: &'a Image<f32>,
}

impl LocalVarianceEstimator<'_> {
    /// First (horizontal) pass of the separable filters; returns weighted
    /// `(sum, sum of squares, weight)`.
    pub fn horizontal(&self, screen_pos: UVec2) -> Vec3 {
        let center = self.gbuffer.get(screen_pos);

        if !center.is_some() {
            return Vec3::ZERO;
        }

        self.gather(&center, screen_pos.as_ivec2(), ivec2(1, 0))
    }

    /// Second (vertical) pass of the separable filters, over the output of
    /// [`Self::horizontal()`].
    pub fn vertical(&self, partial: &Image<Vec3>, screen_pos: UVec2) -> Vec2 {
        let center = self.gbuffer.get(screen_pos);

        if !center.is_some() {
            return Vec2::splat(INVALID_VALUE);
        }

        let mut sum = Vec3::ZERO;

        for i in -self.params.radius()..=self.params.radius() {
            let pos = screen_pos.as_ivec2() + ivec2(0, i);

            let Some(moments) = partial.read(pos) else {
                continue;
            };

            let weight = self
                .params
                .weight(&center, &self.gbuffer.get(pos.as_uvec2()));

            sum += moments * weight;
        }

        Self::finish(sum)
    }

    /// Non-separable variant, used by [`VarianceFilter::SquareBilateral`].
    pub fn square(&self, screen_pos: UVec2) -> Vec2 {
        let center = self.gbuffer.get(screen_pos);

        if !center.is_some() {
            return Vec2::splat(INVALID_VALUE);
        }

        let mut sum = Vec3::ZERO;

        for i in -self.params.radius()..=self.params.radius() {
            let row = screen_pos.as_ivec2() + ivec2(0, i);

            if self.gbuffer.contains(row) {
                sum += self.gather(&center, row, ivec2(1, 0));
            }
        }

        Self::finish(sum)
    }

    /// Gathers weighted moments along `dir`, around `pos`, with bilateral
    /// weights relative to `center`.
    fn gather(&self, center: &GBufferEntry, pos: IVec2, dir: IVec2) -> Vec3 {
        let mut sum = Vec3::ZERO;

        for i in -self.params.radius()..=self.params.radius() {
            let pos = pos + dir * i;

            let Some(value) = self.signal.read(pos) else {
                continue;
            };

            if !is_valid_value(value) {
                continue;
            }

            let weight =
                self.params.weight(center, &self.gbuffer.get(pos.as_uvec2()));

            sum += vec3(value, value.sqr(), 1.0) * weight;
        }

        sum
    }

    fn finish(sum: Vec3) -> Vec2 {
        if sum.z <= 0.0 {
            return Vec2::splat(INVALID_VALUE);
        }

        let mean = sum.x / sum.z;
        let variance = (sum.y / sum.z - mean.sqr()).max(0.0);

        vec2(mean, variance)
    }
}

/// Fills moments of a pixel that wasn't traced this frame from its traced
/// left / right / top / bottom neighbours.
pub fn cross_fill(moments: &Image<Vec2>, screen_pos: UVec2) -> Vec2 {
    let center = moments.get(screen_pos);

    if is_valid_value(center.y) {
        return center;
    }

    let mut sum = Vec2::ZERO;
    let mut count = 0.0;

    for offset in [ivec2(-1, 0), ivec2(1, 0), ivec2(0, -1), ivec2(0, 1)] {
        if let Some(sample) = moments.read(screen_pos.as_ivec2() + offset) {
            if is_valid_value(sample.y) {
                sum += sample;
                count += 1.0;
            }
        }
    }

    if count > 0.0 {
        sum / count
    } else {
        center
    }
}

/// 3x3 Gaussian over the variance, so that the à-trous filter doesn't flicker
/// along with noise in the variance itself.
pub fn smooth_variance(variance: &Image<f32>, screen_pos: UVec2) -> f32 {
    const KERNEL: [f32; 2] = [1.0 / 4.0, 1.0 / 8.0];

    let center = variance.get(screen_pos);

    if !is_valid_value(center) {
        return center;
    }

    let mut sum = 0.0;
    let mut weights = 0.0;

    for y in -1..=1 {
        for x in -1..=1 {
            let pos = screen_pos.as_ivec2() + ivec2(x, y);

            let Some(sample) = variance.read(pos) else {
                continue;
            };

            if !is_valid_value(sample) {
                continue;
            }

            let weight = match x.abs() + y.abs() {
                0 => KERNEL[0],
                1 => KERNEL[1],
                _ => KERNEL[1] / 2.0,
            };

            sum += sample * weight;
            weights += weight;
        }
    }

    sum / weights
}
