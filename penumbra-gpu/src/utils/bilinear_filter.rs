use glam::{ivec2, vec4, IVec2, Vec2, Vec4};

use crate::Reprojection;

/// Four-tap bilinear footprint around a reprojected (fractional) position.
#[derive(Clone, Copy, Debug)]
pub struct BilinearFilter {
    /// Sample at `f(x=0, y=0)`
    pub s00: Vec4,

    /// Sample at `f(x=1, y=0)`
    pub s10: Vec4,

    /// Sample at `f(x=0, y=1)`
    pub s01: Vec4,

    /// Sample at `f(x=1, y=1)`
    pub s11: Vec4,

    /// Per-sample weights, multiplied with the bilinear ones when evaluating
    pub weights: Vec4,
}

impl BilinearFilter {
    /// Bits of [`Reprojection::validity`] corresponding to `s00`, `s10`, `s01`
    /// and `s11`.
    pub const TAP_BITS: [u32; 4] = [0b0001, 0b0010, 0b0100, 0b1000];

    /// Samples `sample` around the previous position of given reprojection;
    /// taps rejected by the reprojection (or by `sample` returning a zero
    /// weight) don't contribute.
    ///
    /// Returns `None` if nothing could be sampled.
    pub fn reproject(
        reprojection: Reprojection,
        sample: impl Fn(IVec2) -> (Vec4, f32),
    ) -> Option<Vec4> {
        Self::from_reprojection(reprojection, sample)
            .eval(reprojection.prev_pos_fract())
    }

    pub fn from_reprojection(
        reprojection: Reprojection,
        sample: impl Fn(IVec2) -> (Vec4, f32),
    ) -> Self {
        let mut samples = [Vec4::ZERO; 4];
        let mut weights = [0.0; 4];
        let coords = Self::reprojection_coords(reprojection.prev_pos());

        for i in 0..4 {
            if reprojection.validity & Self::TAP_BITS[i] > 0 {
                (samples[i], weights[i]) = sample(coords[i]);
            }
        }

        Self {
            s00: samples[0],
            s10: samples[1],
            s01: samples[2],
            s11: samples[3],
            weights: Vec4::from_array(weights),
        }
    }

    pub fn reprojection_coords(prev_pos: Vec2) -> [IVec2; 4] {
        let p00 = ivec2(prev_pos.x.floor() as i32, prev_pos.y.floor() as i32);

        [
            p00,
            p00 + ivec2(1, 0),
            p00 + ivec2(0, 1),
            p00 + ivec2(1, 1),
        ]
    }

    /// Returns bilinear weights of the four taps for given fractional part.
    pub fn tap_weights(uv: Vec2) -> Vec4 {
        vec4(
            (1.0 - uv.x) * (1.0 - uv.y),
            uv.x * (1.0 - uv.y),
            (1.0 - uv.x) * uv.y,
            uv.x * uv.y,
        )
    }

    pub fn eval(&self, uv: Vec2) -> Option<Vec4> {
        let weights = self.weights * Self::tap_weights(uv);
        let w_sum = weights.dot(Vec4::ONE);

        if w_sum <= 0.0 {
            None
        } else {
            Some(
                (self.s00 * weights.x
                    + self.s10 * weights.y
                    + self.s01 * weights.z
                    + self.s11 * weights.w)
                    / w_sum,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn reprojection(prev_x: f32, prev_y: f32, validity: u32) -> Reprojection {
        Reprojection {
            prev_x,
            prev_y,
            confidence: 1.0,
            validity,
        }
    }

    #[test]
    fn exact_position() {
        let actual = BilinearFilter::reproject(
            reprojection(2.0, 3.0, 0b1111),
            |pos| (vec4(pos.x as f32, pos.y as f32, 0.0, 0.0), 1.0),
        );

        assert_eq!(Some(vec4(2.0, 3.0, 0.0, 0.0)), actual);
    }

    #[test]
    fn rejected_taps_are_renormalized() {
        let actual = BilinearFilter::reproject(
            reprojection(0.5, 0.0, 0b0010),
            |pos| (Vec4::splat(pos.x as f32), 1.0),
        )
        .unwrap();

        assert_relative_eq!(actual.x, 1.0);
    }

    #[test]
    fn nothing_valid() {
        let actual = BilinearFilter::reproject(
            reprojection(0.5, 0.5, 0b1111),
            |_| (Vec4::ONE, 0.0),
        );

        assert_eq!(None, actual);
    }
}
