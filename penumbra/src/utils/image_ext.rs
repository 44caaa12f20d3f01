use std::path::Path;

use glam::uvec2;
use image::{GrayImage, ImageResult, Luma};
use penumbra_gpu::{is_valid_value, Image};

/// Debug export of scalar images; invalid pixels come out black.
pub trait ImageExt {
    fn to_luma8(&self) -> GrayImage;

    fn save_png(&self, path: impl AsRef<Path>) -> ImageResult<()> {
        self.to_luma8().save(path)
    }
}

impl ImageExt for Image<f32> {
    fn to_luma8(&self) -> GrayImage {
        let size = self.size();

        GrayImage::from_fn(size.x, size.y, |x, y| {
            let value = self.get(uvec2(x, y));

            let value = if is_valid_value(value) {
                (value.clamp(0.0, 1.0) * 255.0).round() as u8
            } else {
                0
            };

            Luma([value])
        })
    }
}
