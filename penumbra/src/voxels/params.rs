use penumbra_gpu::VoxelDirection;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoxelLayout {
    /// Single mip chain, same color seen from every direction.
    #[default]
    Isotropic,

    /// Six mip chains, one per face direction (+X -X +Y -Y +Z -Z).
    Anisotropic,
}

impl VoxelLayout {
    pub fn chains(&self) -> usize {
        match self {
            VoxelLayout::Isotropic => 1,
            VoxelLayout::Anisotropic => VoxelDirection::ALL.len(),
        }
    }

    /// Returns index of the mip chain that stores given face direction.
    pub fn chain_of(&self, direction: VoxelDirection) -> usize {
        match self {
            VoxelLayout::Isotropic => 0,
            VoxelLayout::Anisotropic => direction.index(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelParams {
    /// Resolution of the initial volume along each axis; filtered mip chains
    /// start at half of it.
    pub dims: u32,

    /// Edge of the voxelized volume, in world units.
    pub world_size: f32,

    pub layout: VoxelLayout,

    /// Number of levels in each filtered mip chain.
    pub mip_levels: u32,
}

impl VoxelParams {
    pub fn validate(&self) -> Result<()> {
        Error::ensure(
            self.dims >= 2 && self.dims.is_power_of_two(),
            "voxels.dims",
            self.dims,
            "must be a power of two, at least 2",
        )?;

        Error::ensure(
            self.world_size.is_finite() && self.world_size > 0.0,
            "voxels.world_size",
            self.world_size,
            "must be a finite, positive number",
        )?;

        Error::ensure(
            (1..=self.dims.ilog2()).contains(&self.mip_levels),
            "voxels.mip_levels",
            self.mip_levels,
            "must be within 1 ..= log2(dims)",
        )
    }

    /// Returns the grid camera positions get snapped to, so that the volume
    /// doesn't move by a fraction of a voxel each frame.
    pub fn snap_step(&self) -> f32 {
        16.0 * self.world_size / self.dims as f32
    }

    /// Returns edge of a voxel at given level of a filtered mip chain, in
    /// world units.
    pub fn voxel_size(&self, level: u32) -> f32 {
        self.world_size / (self.dims >> (level + 1)) as f32
    }
}

impl Default for VoxelParams {
    fn default() -> Self {
        Self {
            dims: 256,
            world_size: 64.0,
            layout: Default::default(),
            mip_levels: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        VoxelParams::default().validate().unwrap();
    }

    #[test]
    fn rejects_invalid_params() {
        for params in [
            VoxelParams {
                dims: 48,
                ..Default::default()
            },
            VoxelParams {
                world_size: -1.0,
                ..Default::default()
            },
            VoxelParams {
                mip_levels: 9,
                ..Default::default()
            },
            VoxelParams {
                mip_levels: 0,
                ..Default::default()
            },
        ] {
            assert!(params.validate().is_err(), "{params:?}");
        }
    }

    #[test]
    fn voxel_sizes() {
        let params = VoxelParams::default();

        assert_eq!(4.0, params.snap_step());
        assert_eq!(0.5, params.voxel_size(0));
        assert_eq!(1.0, params.voxel_size(1));
    }
}
