use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use glam::{uvec3, UVec3, Vec3};
use log::trace;
use penumbra_gpu::{rgba8_average, Triangle, Volume, VoxelDirection};

use crate::{BoundingBox, VoxelLayout, VoxelParams};

/// Conservatively rasterizes triangles into a volume of running RGBA8
/// averages; with the anisotropic layout, chains are laid side by side along
/// the x axis.
pub struct Voxelizer<'a> {
    pub params: &'a VoxelParams,
    pub extents: BoundingBox,
}

impl Voxelizer<'_> {
    pub fn run(&self, triangles: &[Triangle]) -> Volume<u32> {
        let dims = self.params.dims;
        let chains = self.params.layout.chains() as u32;
        let size = uvec3(dims * chains, dims, dims);

        let texels: Vec<_> = (0..size.x * size.y * size.z)
            .map(|_| AtomicU32::new(0))
            .collect();

        let threads = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        let chunk_size = triangles.len().div_ceil(threads).max(1);

        trace!(
            "Voxelizing {} triangles; threads={threads}, chunk={chunk_size}",
            triangles.len()
        );

        thread::scope(|scope| {
            for chunk in triangles.chunks(chunk_size) {
                let texels = &texels;

                scope.spawn(move || {
                    for triangle in chunk {
                        self.rasterize(triangle, |pos, color| {
                            let idx = (pos.z * size.y + pos.y) * size.x + pos.x;

                            _ = texels[idx as usize].fetch_update(
                                Ordering::Relaxed,
                                Ordering::Relaxed,
                                |texel| Some(rgba8_average(texel, color)),
                            );
                        });
                    }
                });
            }
        });

        Volume::from_fn(size, |pos| {
            texels[((pos.z * size.y + pos.y) * size.x + pos.x) as usize]
                .load(Ordering::Relaxed)
        })
    }

    /// Calls `write` for each voxel (in the chain-packed volume) `triangle`
    /// touches.
    fn rasterize(
        &self,
        triangle: &Triangle,
        mut write: impl FnMut(UVec3, Vec3),
    ) {
        let dims = self.params.dims;
        let voxel_size = self.extents.extent() / dims as f32;

        if triangle.max().cmplt(self.extents.min()).any()
            || triangle.min().cmpgt(self.extents.max()).any()
        {
            return;
        }

        let to_voxel = |p: Vec3| {
            ((p - self.extents.min()) / voxel_size)
                .floor()
                .clamp(Vec3::ZERO, Vec3::splat((dims - 1) as f32))
                .as_uvec3()
        };

        let min = to_voxel(triangle.min());
        let max = to_voxel(triangle.max());
        let normal = triangle.normal();

        for z in min.z..=max.z {
            for y in min.y..=max.y {
                for x in min.x..=max.x {
                    let voxel = uvec3(x, y, z);

                    let center = self.extents.min()
                        + (voxel.as_vec3() + 0.5) * voxel_size;

                    if !triangle.overlaps_box(center, voxel_size * 0.5) {
                        continue;
                    }

                    match self.params.layout {
                        VoxelLayout::Isotropic => {
                            write(voxel, triangle.color);
                        }

                        VoxelLayout::Anisotropic => {
                            for direction in VoxelDirection::ALL {
                                let weight = direction.weight(normal);

                                if weight <= 0.0 {
                                    continue;
                                }

                                let offset = direction.index() as u32 * dims;

                                write(
                                    voxel + uvec3(offset, 0, 0),
                                    triangle.color * weight,
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;
    use penumbra_gpu::U32Ext;

    use super::*;

    fn params(layout: VoxelLayout) -> VoxelParams {
        VoxelParams {
            dims: 16,
            world_size: 16.0,
            layout,
            mip_levels: 3,
        }
    }

    fn extents() -> BoundingBox {
        BoundingBox::from_center(Vec3::ZERO, Vec3::splat(8.0))
    }

    #[test]
    fn thin_triangles_are_not_lost() {
        let params = params(VoxelLayout::Isotropic);

        let triangle = Triangle {
            positions: [
                vec3(-4.5, 0.1, 0.1),
                vec3(4.5, 0.1, 0.1),
                vec3(4.5, 0.1, 0.1001),
            ],
            color: vec3(1.0, 0.5, 0.0),
        };

        let volume = Voxelizer {
            params: &params,
            extents: extents(),
        }
        .run(&[triangle]);

        // x = -4.5 ..= 4.5 maps into voxels 3 ..= 12
        for x in 0..16 {
            let texel = volume.get(uvec3(x, 8, 8));

            if (3..=12).contains(&x) {
                assert_eq!(1, texel.to_bytes().w, "x = {x}");
                assert_eq!(255, texel.to_bytes().x);
                assert_eq!(128, texel.to_bytes().y);
            } else {
                assert_eq!(0, texel, "x = {x}");
            }
        }

        assert_eq!(0, volume.get(uvec3(8, 9, 8)));
        assert_eq!(0, volume.get(uvec3(8, 8, 9)));
    }

    #[test]
    fn overlapping_triangles_get_averaged() {
        let params = params(VoxelLayout::Isotropic);

        let triangle = |color| Triangle {
            positions: [
                vec3(0.2, 0.2, 0.5),
                vec3(0.8, 0.2, 0.5),
                vec3(0.2, 0.8, 0.5),
            ],
            color,
        };

        let volume = Voxelizer {
            params: &params,
            extents: extents(),
        }
        .run(&[triangle(Vec3::X), triangle(Vec3::Z)]);

        let texel = volume.get(uvec3(8, 8, 8)).to_bytes();

        assert_eq!(2, texel.w);
        assert!(texel.x >= 127 && texel.x <= 128);
        assert!(texel.z >= 127 && texel.z <= 128);
    }

    #[test]
    fn anisotropic_faces() {
        let params = params(VoxelLayout::Anisotropic);

        // Faces +Z
        let triangle = Triangle {
            positions: [
                vec3(0.2, 0.2, 0.5),
                vec3(0.8, 0.2, 0.5),
                vec3(0.2, 0.8, 0.5),
            ],
            color: Vec3::ONE,
        };

        let volume = Voxelizer {
            params: &params,
            extents: extents(),
        }
        .run(&[triangle]);

        assert_eq!(uvec3(96, 16, 16), volume.size());

        for direction in VoxelDirection::ALL {
            let offset = direction.index() as u32 * 16;
            let texel = volume.get(uvec3(offset + 8, 8, 8));

            if direction == VoxelDirection::PosZ {
                assert_eq!(1, texel.to_bytes().w);
            } else {
                assert_eq!(0, texel, "{direction:?}");
            }
        }
    }

    #[test]
    fn triangles_outside_extents_are_skipped() {
        let params = params(VoxelLayout::Isotropic);

        let triangle = Triangle {
            positions: [
                vec3(20.0, 0.0, 0.0),
                vec3(21.0, 0.0, 0.0),
                vec3(20.0, 1.0, 0.0),
            ],
            color: Vec3::ONE,
        };

        let volume = Voxelizer {
            params: &params,
            extents: extents(),
        }
        .run(&[triangle]);

        assert!(volume.voxels().iter().all(|&texel| texel == 0));
    }
}
