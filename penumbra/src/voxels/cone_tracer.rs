use glam::{Vec3, Vec4};
use penumbra_gpu::{
    composite_front_to_back, lerp, sample_trilinear, Volume, VoxelDirection,
};

use crate::{BoundingBox, VoxelLayout, VoxelParams};

/// Occlusion at which tracing stops.
const MAX_OCCLUSION: f32 = 0.99;

/// Marches a cone through pre-filtered voxel mips, front to back.
pub struct ConeTracer<'a> {
    pub params: &'a VoxelParams,

    /// Mip chains, indexed by `[chain][level]`.
    pub chains: &'a [Vec<Volume<u32>>],

    pub extents: &'a BoundingBox,
}

impl ConeTracer<'_> {
    /// - `aperture` - full opening angle of the cone, in radians.
    pub fn trace(&self, origin: Vec3, direction: Vec3, aperture: f32) -> Vec4 {
        let direction = direction.normalize_or_zero();

        if direction == Vec3::ZERO {
            return Vec4::ZERO;
        }

        let voxel_size = self.params.voxel_size(0);
        let max_level = (self.params.mip_levels - 1) as f32;
        let spread = 2.0 * (aperture * 0.5).tan();
        let max_distance = self.params.world_size * 3f32.sqrt();

        let mut acc = Vec4::ZERO;

        // Start one voxel away, so that the surface doesn't occlude itself
        let mut t = voxel_size;

        while acc.w < MAX_OCCLUSION && t < max_distance {
            let pos = origin + direction * t;

            if !self.extents.contains(pos) {
                break;
            }

            let diameter = (spread * t).max(voxel_size);
            let level = (diameter / voxel_size).log2().clamp(0.0, max_level);
            let sample = self.sample(pos, direction, level);

            acc = composite_front_to_back(acc, sample);
            t += diameter * 0.5;
        }

        acc
    }

    /// Samples given (fractional) mip level, blending between the two
    /// nearest ones.
    fn sample(&self, pos: Vec3, direction: Vec3, level: f32) -> Vec4 {
        let lo = level.floor();
        let hi = level.ceil();
        let a = self.sample_level(pos, direction, lo as usize);

        if hi == lo {
            return a;
        }

        lerp(a, self.sample_level(pos, direction, hi as usize), level - lo)
    }

    fn sample_level(&self, pos: Vec3, direction: Vec3, level: usize) -> Vec4 {
        let sample = |chain: usize| {
            let volume = &self.chains[chain][level];
            let pos = self.extents.map(pos) * volume.size().as_vec3();

            sample_trilinear(volume, pos)
        };

        match self.params.layout {
            VoxelLayout::Isotropic => sample(0),

            // A cone going along +X sees faces looking towards -X etc.
            VoxelLayout::Anisotropic => {
                let weights = direction * direction;

                let x = if direction.x > 0.0 {
                    VoxelDirection::NegX
                } else {
                    VoxelDirection::PosX
                };

                let y = if direction.y > 0.0 {
                    VoxelDirection::NegY
                } else {
                    VoxelDirection::PosY
                };

                let z = if direction.z > 0.0 {
                    VoxelDirection::NegZ
                } else {
                    VoxelDirection::PosZ
                };

                [(x, weights.x), (y, weights.y), (z, weights.z)]
                    .into_iter()
                    .filter(|(_, weight)| *weight > 0.0)
                    .map(|(face, weight)| sample(face.index()) * weight)
                    .sum()
            }
        }
    }
}
