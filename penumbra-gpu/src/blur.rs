use glam::{ivec2, UVec2, Vec2};

use crate::{
    is_valid_value, lerp, BlurPassParams, GBufferEntry, Image, INVALID_VALUE,
    PENUMBRA_EPSILON,
};

/// Low frame age ("low tspp") fallback: until a pixel has accumulated enough
/// samples, its variance is unreliable, so it gets blurred by a plain
/// depth-aware Gaussian instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LowTsppParams {
    pub enabled: bool,

    /// Pixels older than this aren't blurred.
    pub max_frame_age: u32,

    pub blur_passes: u32,

    /// Exponent of the blur strength's falloff with growing frame age.
    pub decay_constant: f32,

    /// Fill pixels that have a surface but no value via a 7x7 gather.
    pub fill_missing_values: bool,

    pub use_normal_weights: bool,
    pub min_normal_weight: f32,
    pub normal_exponent: f32,

    /// Depth difference tolerated relatively to the center's depth.
    pub depth_tolerance: f32,
}

impl Default for LowTsppParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_frame_age: 12,
            blur_passes: 3,
            decay_constant: 1.0,
            fill_missing_values: true,
            use_normal_weights: false,
            min_normal_weight: 0.25,
            normal_exponent: 4.0,
            depth_tolerance: 0.05,
        }
    }
}

impl LowTsppParams {
    pub fn blur_strength(&self, frame_age: u32) -> f32 {
        if !self.enabled || frame_age > self.max_frame_age {
            return 0.0;
        }

        let age = frame_age as f32 / (self.max_frame_age as f32 + 1.0);

        (1.0 - age).powf(self.decay_constant)
    }

    fn weight(
        &self,
        center: &GBufferEntry,
        sample: &GBufferEntry,
        offset: Vec2,
    ) -> f32 {
        if !sample.is_some() {
            return 0.0;
        }

        let expected = center.depth + center.ddxy.dot(offset);
        let tolerance = self.depth_tolerance * center.depth + PENUMBRA_EPSILON;
        let depth_weight = (-(sample.depth - expected).abs() / tolerance).exp();

        let normal_weight = if self.use_normal_weights {
            center
                .normal
                .dot(sample.normal)
                .max(0.0)
                .powf(self.normal_exponent)
                .max(self.min_normal_weight)
        } else {
            1.0
        };

        depth_weight * normal_weight
    }
}

/// One pass of the low frame age blur: a 5x5 depth-aware Gaussian whose
/// result gets blended in proportionally to the pixel's blur strength.
pub struct MultiPassBlur<'a> {
    pub params: &'a LowTsppParams,
    pub pass: BlurPassParams,
    pub gbuffer: &'a Image<GBufferEntry>,
    pub signal: &'a Image<f32>,
    pub blur_strength: &'a Image<f32>,
}

impl MultiPassBlur<'_> {
    pub fn run(&self, screen_pos: UVec2) -> f32 {
        const KERNEL: [f32; 3] = [3.0 / 8.0, 1.0 / 4.0, 1.0 / 16.0];

        let center_value = self.signal.get(screen_pos);
        let strength = self.blur_strength.get(screen_pos);

        if strength <= 0.0 || !is_valid_value(center_value) {
            return center_value;
        }

        let center = self.gbuffer.get(screen_pos);
        let step = self.pass.step as i32;

        let mut sum = 0.0;
        let mut weights = 0.0;

        for y in -2..=2i32 {
            for x in -2..=2i32 {
                let offset = ivec2(x, y) * step;
                let pos = screen_pos.as_ivec2() + offset;

                let Some(value) = self.signal.read(pos) else {
                    continue;
                };

                if !is_valid_value(value) {
                    continue;
                }

                let weight = KERNEL[x.unsigned_abs() as usize]
                    * KERNEL[y.unsigned_abs() as usize]
                    * self.params.weight(
                        &center,
                        &self.gbuffer.get(pos.as_uvec2()),
                        offset.as_vec2(),
                    );

                sum += value * weight;
                weights += weight;
            }
        }

        if weights <= 0.0 {
            return center_value;
        }

        lerp(center_value, sum / weights, strength)
    }
}

/// Fills a pixel that has a surface, but no value (e.g. it just got
/// disoccluded while not being traced this frame) from a depth-aware 7x7
/// neighbourhood.
pub fn fill_missing(
    params: &LowTsppParams,
    gbuffer: &Image<GBufferEntry>,
    signal: &Image<f32>,
    screen_pos: UVec2,
) -> f32 {
    let center_value = signal.get(screen_pos);
    let center = gbuffer.get(screen_pos);

    if is_valid_value(center_value) || !center.is_some() {
        return center_value;
    }

    let mut sum = 0.0;
    let mut weights = 0.0;

    for y in -3..=3i32 {
        for x in -3..=3i32 {
            let offset = ivec2(x, y);
            let pos = screen_pos.as_ivec2() + offset;

            let Some(value) = signal.read(pos) else {
                continue;
            };

            if !is_valid_value(value) {
                continue;
            }

            let gaussian = (-(offset.length_squared() as f32) / 8.0).exp();

            let weight = gaussian
                * params.weight(
                    &center,
                    &gbuffer.get(pos.as_uvec2()),
                    offset.as_vec2(),
                );

            sum += value * weight;
            weights += weight;
        }
    }

    if weights > PENUMBRA_EPSILON {
        sum / weights
    } else {
        INVALID_VALUE
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, Vec3};

    use super::*;

    fn gbuffer(size: UVec2) -> Image<GBufferEntry> {
        Image::new(
            size,
            GBufferEntry {
                normal: Vec3::Z,
                depth: 3.0,
                ..Default::default()
            },
        )
    }

    #[test]
    fn blur_strength_decays() {
        let params = LowTsppParams::default();

        assert_relative_eq!(params.blur_strength(0), 1.0);
        assert!(params.blur_strength(6) < params.blur_strength(2));
        assert!(params.blur_strength(12) > 0.0);
        assert_eq!(0.0, params.blur_strength(13));

        let disabled = LowTsppParams {
            enabled: false,
            ..Default::default()
        };

        assert_eq!(0.0, disabled.blur_strength(0));
    }

    #[test]
    fn blur_only_touches_young_pixels() {
        let size = uvec2(5, 5);
        let params = LowTsppParams::default();
        let gbuffer = gbuffer(size);

        let signal = Image::from_fn(size, |pos| {
            if pos == uvec2(2, 2) {
                1.0
            } else {
                0.0
            }
        });

        let blur_strength =
            Image::from_fn(size, |pos| if pos.x == 2 { 1.0 } else { 0.0 });

        let blur = MultiPassBlur {
            params: &params,
            pass: BlurPassParams::new(0),
            gbuffer: &gbuffer,
            signal: &signal,
            blur_strength: &blur_strength,
        };

        assert!(blur.run(uvec2(2, 2)) < 1.0);
        assert!(blur.run(uvec2(2, 1)) > 0.0);
        assert_eq!(0.0, blur.run(uvec2(1, 2)));
    }

    #[test]
    fn missing_values_get_filled() {
        let size = uvec2(7, 7);
        let params = LowTsppParams::default();
        let gbuffer = gbuffer(size);

        let signal = Image::from_fn(size, |pos| {
            if pos == uvec2(3, 3) {
                INVALID_VALUE
            } else {
                0.4
            }
        });

        assert_relative_eq!(
            fill_missing(&params, &gbuffer, &signal, uvec2(3, 3)),
            0.4,
            epsilon = 0.0001
        );

        let nothing = Image::new(size, INVALID_VALUE);

        assert_eq!(
            INVALID_VALUE,
            fill_missing(&params, &gbuffer, &nothing, uvec2(3, 3))
        );
    }
}
