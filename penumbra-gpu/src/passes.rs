use bytemuck::{Pod, Zeroable};

use crate::AtrousParams;

/// Per-pass values of the à-trous filter, derived from [`AtrousParams`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AtrousPassParams {
    pub pass: u32,

    /// Spacing between taps, in pixels
    pub step: u32,

    pub value_sigma: f32,

    /// Pixels older than this are passed through untouched
    pub max_frame_age: u32,
}

impl AtrousPassParams {
    pub fn new(params: &AtrousParams, pass: u32) -> Self {
        let shifts = &params.kernel_step_shifts;

        let step = if params.use_kernel_step_shifts {
            1 << shifts[pass as usize % shifts.len()]
        } else {
            1 << pass
        };

        let (value_sigma, max_frame_age) = if pass == 0 {
            (
                params.value_sigma,
                params.max_frame_age_to_denoise_first_pass,
            )
        } else {
            (
                params.value_sigma * params.later_pass_value_sigma_scale,
                params.max_frame_age_to_denoise,
            )
        };

        Self {
            pass,
            step,
            value_sigma,
            max_frame_age,
        }
    }
}

/// Per-pass values of the low frame age blur.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BlurPassParams {
    pub pass: u32,

    /// Spacing between taps, in pixels
    pub step: u32,
}

impl BlurPassParams {
    pub fn new(pass: u32) -> Self {
        Self {
            pass,
            step: 1 << pass,
        }
    }
}
