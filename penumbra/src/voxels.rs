mod cone_tracer;
mod params;
mod voxelizer;

use derivative::Derivative;
use glam::{uvec3, UVec3, Vec3, Vec4};
use log::{debug, info};
use penumbra_gpu::{
    downsample_voxels, initial_voxel, Triangle, U32Ext, Volume, VoxelDirection,
};

pub use self::cone_tracer::*;
pub use self::params::*;
pub use self::voxelizer::*;
use crate::{
    measure, BoundingBox, Command, DoubleBuffered, QueueKind, ResourceId,
    Result, Schedule,
};

/// Levels generated by a single mip dispatch, not counting the level they
/// get generated from.
const MIPS_PER_DISPATCH: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoxelBufferKind {
    /// Running RGBA8 averages written by [`VoxelPyramid::voxelize()`].
    InitialVoxelization,

    /// Mip chains being built this frame.
    FilteredVoxels,

    /// Mip chains built during the previous frame; the ones lighting reads.
    FilteredVoxelsPrevious,
}

/// Mip chains of one filtered set, indexed by `[chain][level]`.
pub type VoxelChains = Vec<Vec<Volume<u32>>>;

/// Voxelized scene together with its pre-filtered mips, double-buffered so
/// that lighting can read last frame's voxels while this frame's ones are
/// being built.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VoxelPyramid {
    params: VoxelParams,

    #[derivative(Debug = "ignore")]
    initial: Volume<u32>,

    #[derivative(Debug = "ignore")]
    filtered: DoubleBuffered<VoxelChains>,

    #[derivative(Debug = "ignore")]
    schedule: Schedule,
}

impl VoxelPyramid {
    pub fn new(params: VoxelParams) -> Result<Self> {
        params.validate()?;

        info!(
            "Creating voxel pyramid; dims={}, layout={:?}, mips={}",
            params.dims, params.layout, params.mip_levels
        );

        let chains = params.layout.chains() as u32;
        let dims = params.dims;

        let filtered = DoubleBuffered::new("voxels_filtered", |_| {
            (0..chains)
                .map(|_| {
                    (0..params.mip_levels)
                        .map(|level| {
                            Volume::new(UVec3::splat(dims >> (level + 1)), 0)
                        })
                        .collect()
                })
                .collect()
        });

        Ok(Self {
            params,
            initial: Volume::new(uvec3(dims * chains, dims, dims), 0),
            filtered,
            schedule: Default::default(),
        })
    }

    pub fn params(&self) -> &VoxelParams {
        &self.params
    }

    /// Returns the world-space box that gets voxelized this frame.
    ///
    /// The box follows the camera in steps of [`VoxelParams::snap_step()`]
    /// and never leaves the scene along axes where the scene is larger than
    /// the box; along the remaining axes it's centered on the scene.
    pub fn world_extents(
        &self,
        camera_pos: Vec3,
        scene: &BoundingBox,
    ) -> BoundingBox {
        let step = self.params.snap_step();
        let half_size = self.params.world_size / 2.0;
        let snap = |p: Vec3| (p / step).round() * step;
        let camera_pos = snap(camera_pos);

        if !scene.is_set() {
            return BoundingBox::from_center(camera_pos, Vec3::splat(half_size));
        }

        let scene_center = snap(scene.center());
        let mut center = Vec3::ZERO;

        for axis in 0..3 {
            center[axis] = if scene.extent()[axis] > self.params.world_size {
                camera_pos[axis].clamp(
                    scene.min()[axis] + half_size,
                    scene.max()[axis] - half_size,
                )
            } else {
                scene_center[axis]
            };
        }

        BoundingBox::from_center(center, Vec3::splat(half_size))
    }

    /// Clears the initial volume and rasterizes `triangles` into it; starts
    /// a new frame.
    pub fn voxelize(
        &mut self,
        triangles: &[Triangle],
        extents: &BoundingBox,
    ) -> Result<()> {
        self.schedule.begin_frame();

        self.schedule.dispatch(
            QueueKind::Graphics,
            "voxelize",
            &[],
            &[&Self::initial_id()],
        )?;

        let voxelizer = Voxelizer {
            params: &self.params,
            extents: *extents,
        };

        self.initial = measure("voxelize", || voxelizer.run(triangles));

        debug!("Voxelized {} triangles", triangles.len());

        Ok(())
    }

    /// Converts the initial volume into the first level of each current mip
    /// chain and generates the remaining levels.
    pub fn downsample_and_filter(&mut self) -> Result<()> {
        let fence = self.schedule.signal(QueueKind::Graphics);

        self.schedule.wait(QueueKind::Compute, fence);

        let set = self.filtered.current_id();
        let chains = self.params.layout.chains();
        let dims = self.params.dims;

        let level_0: Vec<_> =
            (0..chains).map(|chain| mip_id(&set, chain, 0)).collect();

        self.schedule.dispatch(
            QueueKind::Compute,
            "voxel_downsample_convert",
            &[&Self::initial_id()],
            &level_0.iter().collect::<Vec<_>>(),
        )?;

        let initial = &self.initial;
        let filtered = self.filtered.current_mut();

        measure("voxel_downsample_convert", || {
            for (chain, levels) in filtered.iter_mut().enumerate() {
                let offset = uvec3(chain as u32 * dims, 0, 0);

                levels[0] = Volume::from_fn(UVec3::splat(dims / 2), |pos| {
                    let samples = block(pos * 2).map(|pos| {
                        initial_voxel(initial.get(offset + pos))
                    });

                    u32::from_unorm4(downsample_voxels(samples))
                });
            }
        });

        let batches =
            (1..self.params.mip_levels).step_by(MIPS_PER_DISPATCH as usize);

        for first in batches {
            let last = (first + MIPS_PER_DISPATCH - 1)
                .min(self.params.mip_levels - 1);

            for chain in 0..chains {
                let source = mip_id(&set, chain, first - 1);

                let targets: Vec<_> = (first..=last)
                    .map(|level| mip_id(&set, chain, level))
                    .collect();

                self.schedule.dispatch(
                    QueueKind::Compute,
                    format!("voxel_mips_{first}-{last}"),
                    &[&source],
                    &targets.iter().collect::<Vec<_>>(),
                )?;

                let levels = &mut self.filtered.current_mut()[chain];

                for level in first..=last {
                    levels[level as usize] =
                        downsample_mip(&levels[level as usize - 1]);
                }
            }
        }

        Ok(())
    }

    /// Turns the set built this frame into the one lighting reads; called
    /// once per completed frame.
    pub fn swap(&mut self) {
        self.filtered.swap();
    }

    /// Returns the mip chain of `kind` that stores given face direction; the
    /// initial volume is returned as a single-level chain.
    pub fn buffer(
        &self,
        kind: VoxelBufferKind,
        direction: VoxelDirection,
    ) -> &[Volume<u32>] {
        self.chain(kind, self.params.layout.chain_of(direction))
    }

    pub fn chain(&self, kind: VoxelBufferKind, idx: usize) -> &[Volume<u32>] {
        match kind {
            VoxelBufferKind::InitialVoxelization => {
                std::slice::from_ref(&self.initial)
            }
            VoxelBufferKind::FilteredVoxels => &self.filtered.current()[idx],
            VoxelBufferKind::FilteredVoxelsPrevious => {
                &self.filtered.previous()[idx]
            }
        }
    }

    /// Returns resolution (along each axis) of the first level of `kind`;
    /// for the initial volume that's per chain.
    pub fn dims(&self, kind: VoxelBufferKind) -> u32 {
        match kind {
            VoxelBufferKind::InitialVoxelization => self.params.dims,
            _ => self.params.dims / 2,
        }
    }

    /// Traces a cone through the voxels built during the previous frame,
    /// returning premultiplied color in `xyz` and occlusion in `w`.
    pub fn cone_trace(
        &self,
        origin: Vec3,
        direction: Vec3,
        aperture: f32,
        extents: &BoundingBox,
    ) -> Vec4 {
        ConeTracer {
            params: &self.params,
            chains: self.filtered.previous(),
            extents,
        }
        .trace(origin, direction, aperture)
    }

    /// Returns the commands recorded since the latest
    /// [`Self::voxelize()`].
    pub fn commands(&self) -> &[Command] {
        self.schedule.commands()
    }

    fn initial_id() -> ResourceId {
        ResourceId::new("voxels_initial")
    }
}

fn mip_id(set: &ResourceId, chain: usize, level: u32) -> ResourceId {
    ResourceId::new(format!("{set}_{chain}_{level}"))
}

fn block(origin: UVec3) -> [UVec3; 8] {
    [
        uvec3(0, 0, 0),
        uvec3(1, 0, 0),
        uvec3(0, 1, 0),
        uvec3(1, 1, 0),
        uvec3(0, 0, 1),
        uvec3(1, 0, 1),
        uvec3(0, 1, 1),
        uvec3(1, 1, 1),
    ]
    .map(|offset| origin + offset)
}

fn downsample_mip(source: &Volume<u32>) -> Volume<u32> {
    Volume::from_fn((source.size() / 2).max(UVec3::ONE), |pos| {
        let samples = block(pos * 2).map(|pos| {
            source
                .read(pos.as_ivec3())
                .map(U32Ext::to_unorm4)
                .unwrap_or_default()
        });

        u32::from_unorm4(downsample_voxels(samples))
    })
}
