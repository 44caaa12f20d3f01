use glam::{UVec2, UVec3};
use log::debug;
use penumbra_gpu::Image;

use crate::{
    Error, Result, Texture, VoxelBufferKind, VoxelParams, VoxelPyramid,
};

/// Textures the compositor samples from: the denoised ambient occlusion and
/// the filtered voxel mips (one texture per mip chain).
#[derive(Debug)]
pub struct GpuTargets {
    ao: Texture,
    ao_size: UVec2,
    voxels: Vec<Texture>,
}

impl GpuTargets {
    pub fn new(
        device: &wgpu::Device,
        ao_size: UVec2,
        voxel_params: &VoxelParams,
    ) -> Self {
        debug!("Initializing GPU targets");

        let ao = Texture::new(
            device,
            "penumbra_ao",
            ao_size.extend(1),
            1,
            wgpu::TextureDimension::D2,
            wgpu::TextureFormat::R32Float,
        );

        let voxels = (0..voxel_params.layout.chains())
            .map(|chain| {
                Texture::new(
                    device,
                    format!("penumbra_voxels_{chain}"),
                    UVec3::splat(voxel_params.dims / 2),
                    voxel_params.mip_levels,
                    wgpu::TextureDimension::D3,
                    wgpu::TextureFormat::Rgba8Unorm,
                )
            })
            .collect();

        Self {
            ao,
            ao_size,
            voxels,
        }
    }

    pub fn ao(&self) -> &wgpu::TextureView {
        self.ao.view()
    }

    pub fn voxels(&self) -> impl Iterator<Item = &wgpu::TextureView> + '_ {
        self.voxels.iter().map(Texture::view)
    }

    pub fn upload_ao(
        &self,
        queue: &wgpu::Queue,
        ao: &Image<f32>,
    ) -> Result<()> {
        Error::ensure_size("ao", self.ao_size, ao.size())?;

        self.ao.write(queue, 0, bytemuck::cast_slice(ao.pixels()));

        Ok(())
    }

    /// Uploads the filtered voxels lighting is supposed to read from, i.e.
    /// the previous set.
    pub fn upload_voxels(&self, queue: &wgpu::Queue, pyramid: &VoxelPyramid) {
        let kind = VoxelBufferKind::FilteredVoxelsPrevious;

        for (chain, texture) in self.voxels.iter().enumerate() {
            for (mip_level, volume) in
                pyramid.chain(kind, chain).iter().enumerate()
            {
                texture.write(
                    queue,
                    mip_level as u32,
                    bytemuck::cast_slice(volume.voxels()),
                );
            }
        }
    }
}
