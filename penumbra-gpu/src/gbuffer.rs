use glam::{vec4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::Normal;

/// Per-pixel surface description produced by the path tracer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GBufferEntry {
    pub normal: Vec3,

    /// Linear view-depth; zero means there's no surface (sky).
    pub depth: f32,

    /// Screen-space displacement from this pixel to its position in the
    /// previous frame.
    pub motion: Vec2,

    /// Change of `depth` per one pixel along x and y.
    pub ddxy: Vec2,

    /// World-space position of the primary hit; compared against the
    /// previous frame when reprojecting with world-space distances.
    pub hit_position: Vec3,
}

impl GBufferEntry {
    pub fn sky() -> Self {
        Self::default()
    }

    pub fn is_some(&self) -> bool {
        self.depth != Default::default()
    }

    pub fn normal_depth(&self) -> NormalDepth {
        NormalDepth {
            normal: self.normal,
            depth: self.depth,
        }
    }

    pub fn pack(self) -> [Vec4; 3] {
        [
            self.normal_depth().pack(),
            vec4(self.motion.x, self.motion.y, self.ddxy.x, self.ddxy.y),
            self.hit_position.extend(0.0),
        ]
    }

    pub fn unpack([d0, d1, d2]: [Vec4; 3]) -> Self {
        let normal = NormalDepth::unpack(d0);

        Self {
            normal: normal.normal,
            depth: normal.depth,
            motion: d1.xy(),
            ddxy: d1.zw(),
            hit_position: d2.xyz(),
        }
    }
}

/// Normal and depth of a pixel, as kept around for the next frame's
/// reprojection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalDepth {
    pub normal: Vec3,
    pub depth: f32,
}

impl NormalDepth {
    pub fn is_some(&self) -> bool {
        self.depth != Default::default()
    }

    pub fn pack(self) -> Vec4 {
        if !self.is_some() {
            return Vec4::ZERO;
        }

        let normal = Normal::encode(self.normal);

        vec4(normal.x, normal.y, self.depth, 0.0)
    }

    pub fn unpack(d0: Vec4) -> Self {
        if d0.z == 0.0 {
            return Self::default();
        }

        Self {
            normal: Normal::decode(d0.xy()),
            depth: d0.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{vec2, vec3};

    use super::*;

    const EPSILON: f32 = 0.001;

    #[test]
    fn serialization() {
        let target = GBufferEntry {
            normal: vec3(0.26, 0.53, 0.80).normalize(),
            depth: 123.456,
            motion: vec2(-1.5, 0.25),
            ddxy: vec2(0.01, -0.02),
            hit_position: vec3(2.0, 3.0, 4.0),
        };

        let actual = GBufferEntry::unpack(target.pack());

        assert_relative_eq!(
            actual.normal.dot(target.normal),
            1.0,
            epsilon = EPSILON
        );
        assert_eq!(target.depth, actual.depth);
        assert_eq!(target.motion, actual.motion);
        assert_eq!(target.ddxy, actual.ddxy);
        assert_eq!(target.hit_position, actual.hit_position);
    }

    #[test]
    fn sky_stays_sky() {
        let target = GBufferEntry::sky();

        assert!(!GBufferEntry::unpack(target.pack()).is_some());
        assert!(!NormalDepth::unpack(target.normal_depth().pack()).is_some());
    }
}
