mod bounding_box;
mod image_ext;
mod metrics;

pub use self::bounding_box::*;
pub use self::image_ext::*;
pub use self::metrics::*;
