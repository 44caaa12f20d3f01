use glam::{uvec3, UVec3};
use log::debug;

/// Texture the compositor samples from; written from the host side.
#[derive(Debug)]
pub struct Texture {
    tex: wgpu::Texture,
    view: wgpu::TextureView,
    size: UVec3,
    bytes_per_texel: u32,
}

impl Texture {
    pub fn new(
        device: &wgpu::Device,
        label: impl AsRef<str>,
        size: UVec3,
        mip_level_count: u32,
        dimension: wgpu::TextureDimension,
        format: wgpu::TextureFormat,
    ) -> Self {
        let label = label.as_ref();

        debug!(
            "Allocating texture `{label}`; size={size}, mips={mip_level_count}"
        );

        assert!(size.cmpgt(UVec3::ZERO).all());

        let bytes_per_texel = format
            .block_size(None)
            .expect("depth-stencil formats are not supported");

        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{label}_tex")),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: size.z,
            },
            mip_level_count,
            sample_count: 1,
            dimension,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = tex.create_view(&Default::default());

        Self {
            tex,
            view,
            size,
            bytes_per_texel,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Returns size of given mip level.
    pub fn size(&self, mip_level: u32) -> UVec3 {
        let size = (self.size >> mip_level).max(UVec3::ONE);

        if self.tex.dimension() == wgpu::TextureDimension::D3 {
            size
        } else {
            uvec3(size.x, size.y, self.size.z)
        }
    }

    /// Uploads texels of given mip level; `data` must be tightly packed.
    pub fn write(&self, queue: &wgpu::Queue, mip_level: u32, data: &[u8]) {
        let size = self.size(mip_level);

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.tex,
                mip_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.x * self.bytes_per_texel),
                rows_per_image: Some(size.y),
            },
            wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: size.z,
            },
        );
    }
}
