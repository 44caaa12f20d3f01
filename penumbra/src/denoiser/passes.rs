use log::debug;
use penumbra_gpu::{Camera, GBufferEntry, Image, SamplingPattern};

use super::DenoiserBuffers;
use crate::{AoSignal, DenoiserConfig, Schedule};

macro_rules! passes {
    ([ $( $name:ident => $class:ident, )* ]) => {
        $( mod $name; )*
        $( pub use self::$name::*; )*

        #[derive(Debug)]
        pub struct DenoiserPasses {
            $( pub $name: $class, )*
        }

        impl DenoiserPasses {
            pub fn new(config: &DenoiserConfig) -> Self {
                debug!("Initializing denoiser passes");

                Self {
                    $( $name: $class::new(config), )*
                }
            }
        }
    };
}

passes!([
    accumulation => AccumulationPass,
    atrous => AtrousPass,
    local_variance => LocalVariancePass,
    low_tspp_blur => LowTsppBlurPass,
    missing_fill => MissingFillPass,
    reprojection => ReprojectionPass,
    variance_smoothing => VarianceSmoothingPass,
]);

/// Everything a pass gets to see while processing a frame.
pub struct PassContext<'a> {
    pub camera: &'a Camera,

    /// `None` on the first frame after creation / resize / reset.
    pub prev_camera: Option<&'a Camera>,

    pub gbuffer: &'a Image<GBufferEntry>,
    pub signal: &'a AoSignal,
    pub sampling: SamplingPattern,
    pub buffers: &'a mut DenoiserBuffers,
    pub schedule: &'a mut Schedule,
}
