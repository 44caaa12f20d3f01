mod double_buffered;
mod gpu_targets;
mod texture;

pub use self::double_buffered::*;
pub use self::gpu_targets::*;
pub use self::texture::*;
