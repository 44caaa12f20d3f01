use glam::{vec4, Vec4};

use crate::INVALID_VALUE;

/// One pixel of the temporal cache.
///
/// When `frame_age` is zero the remaining fields don't carry any history and
/// must be seeded from the next sample instead of being blended with it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheSample {
    pub frame_age: u32,
    pub value: f32,
    pub squared_mean: f32,
    pub hit_distance: f32,
}

impl CacheSample {
    pub const EMPTY: Self = Self {
        frame_age: 0,
        value: INVALID_VALUE,
        squared_mean: 0.0,
        hit_distance: 0.0,
    };

    pub fn is_some(&self) -> bool {
        self.frame_age > 0
    }

    pub fn serialize(&self) -> Vec4 {
        vec4(
            self.frame_age as f32,
            self.value,
            self.squared_mean,
            self.hit_distance,
        )
    }

    /// Inverse of [`Self::serialize()`]; fractional frame ages (e.g. coming
    /// from a bilinear filter) get rounded.
    pub fn deserialize(d0: Vec4) -> Self {
        let frame_age = d0.x.round().max(0.0) as u32;

        if frame_age == 0 {
            return Self::EMPTY;
        }

        Self {
            frame_age,
            value: d0.y,
            squared_mean: d0.z,
            hit_distance: d0.w,
        }
    }

    /// Returns the variance estimated from the running second moment.
    pub fn temporal_variance(&self) -> f32 {
        (self.squared_mean - self.value * self.value).max(0.0)
    }
}

impl Default for CacheSample {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn blended_frame_age_is_rounded() {
        let actual = CacheSample::deserialize(vec4(6.6, 0.5, 0.3, 2.0));

        assert_eq!(7, actual.frame_age);
        assert_relative_eq!(actual.temporal_variance(), 0.05, epsilon = 0.0001);
    }

    #[test]
    fn no_history_is_empty() {
        let actual = CacheSample::deserialize(vec4(0.2, 0.5, 0.3, 2.0));

        assert_eq!(CacheSample::EMPTY, actual);
        assert!(!actual.is_some());
    }
}
