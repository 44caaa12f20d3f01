use glam::{ivec2, UVec2};
use penumbra_gpu::{
    is_valid_value, Camera, GBufferEntry, Image, SamplingPattern,
    INVALID_VALUE, PENUMBRA_EPSILON,
};

use crate::{Error, Result};

/// Resolution the denoiser runs at, relatively to its input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    #[default]
    Full,

    /// Half width and half height.
    Quarter,
}

impl Resolution {
    pub fn apply(&self, size: UVec2) -> UVec2 {
        match self {
            Resolution::Full => size,
            Resolution::Quarter => (size + 1) / 2,
        }
    }
}

/// How 2x2 blocks get reduced when running at [`Resolution::Quarter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DownsampleFilter {
    /// Top-left pixel of each block.
    PointSampling,

    /// Closest surface of each block; AO gets averaged over samples of
    /// similar depth.
    DepthWeighted,

    /// Like [`Self::DepthWeighted`], additionally weighting by normals.
    #[default]
    DepthNormalWeighted,
}

impl DownsampleFilter {
    fn weight(&self, center: &GBufferEntry, sample: &GBufferEntry) -> f32 {
        if !sample.is_some() {
            return 0.0;
        }

        let depth_weight = || {
            let tolerance = 0.05 * center.depth + PENUMBRA_EPSILON;

            (-(center.depth - sample.depth).abs() / tolerance).exp()
        };

        match self {
            DownsampleFilter::PointSampling => 1.0,
            DownsampleFilter::DepthWeighted => depth_weight(),
            DownsampleFilter::DepthNormalWeighted => {
                depth_weight()
                    * center.normal.dot(sample.normal).max(0.0).powf(8.0)
            }
        }
    }
}

/// Surface information of a frame, as produced by the path tracer.
#[derive(Clone, Debug, PartialEq)]
pub struct GBuffer {
    entries: Image<GBufferEntry>,
}

impl GBuffer {
    pub fn new(entries: Image<GBufferEntry>) -> Self {
        Self { entries }
    }

    pub fn size(&self) -> UVec2 {
        self.entries.size()
    }

    pub fn entries(&self) -> &Image<GBufferEntry> {
        &self.entries
    }

    /// Returns position of the pixel that represents given 2x2 block.
    fn representative(&self, filter: DownsampleFilter, block: UVec2) -> UVec2 {
        let origin = block * 2;

        if filter == DownsampleFilter::PointSampling {
            return origin;
        }

        block_positions(&self.entries, origin)
            .filter(|&pos| self.entries.get(pos).is_some())
            .min_by(|&a, &b| {
                self.entries
                    .get(a)
                    .depth
                    .total_cmp(&self.entries.get(b).depth)
            })
            .unwrap_or(origin)
    }

    /// Halves the resolution; each block gets represented by its closest
    /// surface (or, with point sampling, by its top-left pixel).
    pub fn downsample(&self, filter: DownsampleFilter) -> Self {
        let size = Resolution::Quarter.apply(self.size());

        let entries = Image::from_fn(size, |block| {
            let entry = self.entries.get(self.representative(filter, block));

            GBufferEntry {
                motion: entry.motion / 2.0,
                ddxy: entry.ddxy * 2.0,
                ..entry
            }
        });

        Self { entries }
    }
}

/// Noisy ambient occlusion of a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AoSignal {
    value: Image<f32>,
    hit_distance: Image<f32>,
}

impl AoSignal {
    pub fn new(value: Image<f32>, hit_distance: Image<f32>) -> Result<Self> {
        Error::ensure_size("hit_distance", value.size(), hit_distance.size())?;

        Ok(Self {
            value,
            hit_distance,
        })
    }

    pub fn size(&self) -> UVec2 {
        self.value.size()
    }

    pub fn value(&self) -> &Image<f32> {
        &self.value
    }

    pub fn hit_distance(&self) -> &Image<f32> {
        &self.hit_distance
    }

    /// Replaces samples of pixels that weren't traced this frame with
    /// [`INVALID_VALUE`].
    pub fn masked(&self, sampling: SamplingPattern) -> Self {
        let value = Image::from_fn(self.size(), |pos| {
            if sampling.is_active(pos) {
                self.value.get(pos)
            } else {
                INVALID_VALUE
            }
        });

        Self {
            value,
            hit_distance: self.hit_distance.clone(),
        }
    }

    /// Halves the resolution, averaging samples that lay on the same surface
    /// as the block's representative in `gbuffer`.
    pub fn downsample(
        &self,
        gbuffer: &GBuffer,
        filter: DownsampleFilter,
    ) -> Self {
        let size = Resolution::Quarter.apply(self.size());
        let entries = gbuffer.entries();
        let mut hit_distance = Image::new(size, 0.0);

        let value = Image::from_fn(size, |block| {
            let center = entries.get(gbuffer.representative(filter, block));

            let mut value = 0.0;
            let mut distance = 0.0;
            let mut weights = 0.0;

            for pos in block_positions(&self.value, block * 2) {
                let sample = self.value.get(pos);

                if !is_valid_value(sample) {
                    continue;
                }

                let weight = filter.weight(&center, &entries.get(pos));

                value += sample * weight;
                distance += self.hit_distance.get(pos) * weight;
                weights += weight;
            }

            if weights > 0.0 {
                hit_distance.set(block, distance / weights);
                value / weights
            } else {
                INVALID_VALUE
            }
        });

        Self {
            value,
            hit_distance,
        }
    }
}

/// Everything the denoiser needs to process a frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    pub camera: Camera,
    pub gbuffer: &'a GBuffer,
    pub signal: &'a AoSignal,
    pub sampling: SamplingPattern,
}

fn block_positions<T>(
    image: &Image<T>,
    origin: UVec2,
) -> impl Iterator<Item = UVec2> + '_
where
    T: Copy,
{
    [ivec2(0, 0), ivec2(1, 0), ivec2(0, 1), ivec2(1, 1)]
        .into_iter()
        .map(move |offset| origin.as_ivec2() + offset)
        .filter(move |&pos| image.contains(pos))
        .map(|pos| pos.as_uvec2())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec2, Vec3};

    use super::*;

    fn surface(depth: f32) -> GBufferEntry {
        GBufferEntry {
            normal: Vec3::Z,
            depth,
            motion: vec2(2.0, -4.0),
            ..Default::default()
        }
    }

    #[test]
    fn quarter_resolution_rounds_up() {
        assert_eq!(uvec2(2, 2), Resolution::Quarter.apply(uvec2(4, 3)));
        assert_eq!(uvec2(4, 3), Resolution::Full.apply(uvec2(4, 3)));
    }

    #[test]
    fn downsample_picks_closest_surface() {
        let gbuffer = GBuffer::new(
            Image::from_vec(
                uvec2(2, 2),
                vec![
                    GBufferEntry::sky(),
                    surface(10.0),
                    surface(2.0),
                    surface(2.1),
                ],
            )
            .unwrap(),
        );

        let signal = AoSignal::new(
            Image::from_vec(uvec2(2, 2), vec![0.9, 0.0, 0.4, 0.6]).unwrap(),
            Image::new(uvec2(2, 2), 1.0),
        )
        .unwrap();

        let low = gbuffer.downsample(DownsampleFilter::DepthWeighted);
        let entry = low.entries().get(uvec2(0, 0));

        assert_eq!(uvec2(1, 1), low.size());
        assert_eq!(2.0, entry.depth);
        assert_eq!(vec2(1.0, -2.0), entry.motion);

        // Sky doesn't contribute, the far surface barely does
        let value = signal
            .downsample(&gbuffer, DownsampleFilter::DepthWeighted)
            .value()
            .get(uvec2(0, 0));

        assert!(value > 0.4 && value < 0.6);

        let point = gbuffer.downsample(DownsampleFilter::PointSampling);

        assert!(!point.entries().get(uvec2(0, 0)).is_some());
    }

    #[test]
    fn downsample_skips_invalid_samples() {
        let gbuffer = GBuffer::new(Image::new(uvec2(2, 2), surface(3.0)));

        let signal = AoSignal::new(
            Image::from_vec(
                uvec2(2, 2),
                vec![INVALID_VALUE, 0.5, INVALID_VALUE, 0.5],
            )
            .unwrap(),
            Image::new(uvec2(2, 2), 1.0),
        )
        .unwrap();

        let actual = signal
            .downsample(&gbuffer, DownsampleFilter::DepthNormalWeighted)
            .value()
            .get(uvec2(0, 0));

        assert_relative_eq!(actual, 0.5);
    }

    #[test]
    fn masking() {
        let signal = AoSignal::new(
            Image::new(uvec2(2, 1), 0.5),
            Image::new(uvec2(2, 1), 1.0),
        )
        .unwrap();

        let masked = signal.masked(SamplingPattern::Checkerboard {
            even_pixels_active: true,
        });

        assert_eq!(0.5, masked.value().get(uvec2(0, 0)));
        assert_eq!(INVALID_VALUE, masked.value().get(uvec2(1, 0)));
    }

    #[test]
    fn mismatched_signal_is_rejected() {
        let err = AoSignal::new(
            Image::new(uvec2(2, 2), 0.5),
            Image::new(uvec2(2, 1), 1.0),
        )
        .unwrap_err();

        assert!(matches!(err, Error::SizeMismatch { .. }));
    }
}
