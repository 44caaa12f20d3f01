use glam::{vec2, vec4, IVec2, UVec2, Vec2, Vec4};

use crate::{
    BilinearFilter, CacheSample, Camera, GBufferEntry, Image, NormalDepth,
};

/// How the previous-frame position of a pixel gets found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReprojectionSource {
    /// Follow the G-buffer's motion vectors; handles dynamic objects.
    #[default]
    MotionVectors,

    /// Reconstruct the world position and project it with the previous
    /// camera; only correct for static geometry.
    CameraTransform,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReprojectionParams {
    pub source: ReprojectionSource,

    /// Depth difference (in world units) always tolerated.
    ///
    /// Kept at a hundredth of a unit; the rest of the tolerance scales with
    /// depth through `depth_tolerance`, so that a whole-unit depth jump of a
    /// nearby surface still counts as a disocclusion.
    pub absolute_depth_tolerance: f32,

    /// Depth difference tolerated relatively to the expected depth.
    pub depth_tolerance: f32,

    /// Compare the G-buffer's hit positions against world positions
    /// reconstructed from the previous frame, instead of comparing depths.
    pub use_world_space_distance: bool,

    /// Interpolate the expected depth across the tap offset in `1 / depth`
    /// space instead of linearly.
    pub perspective_correct_depth_interpolation: bool,

    pub use_depth_weights: bool,
    pub use_normal_weights: bool,

    /// Minimum `dot(n_curr, n_prev)` for a tap to be accepted.
    pub min_normal_dot: f32,
}

impl Default for ReprojectionParams {
    fn default() -> Self {
        Self {
            source: Default::default(),
            absolute_depth_tolerance: 0.01,
            depth_tolerance: 0.05,
            use_world_space_distance: false,
            perspective_correct_depth_interpolation: false,
            use_depth_weights: true,
            use_normal_weights: true,
            min_normal_dot: 0.9,
        }
    }
}

/// Where a pixel used to be in the previous frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reprojection {
    pub prev_x: f32,
    pub prev_y: f32,

    /// Sum of bilinear weights of the accepted taps; zero means the pixel
    /// got disoccluded.
    pub confidence: f32,

    /// Which taps of the bilinear footprint got accepted; see
    /// [`BilinearFilter::TAP_BITS`].
    pub validity: u32,
}

impl Reprojection {
    pub fn serialize(&self) -> Vec4 {
        vec4(
            self.prev_x,
            self.prev_y,
            self.confidence,
            f32::from_bits(self.validity),
        )
    }

    pub fn deserialize(d0: Vec4) -> Self {
        Self {
            prev_x: d0.x,
            prev_y: d0.y,
            confidence: d0.z,
            validity: d0.w.to_bits(),
        }
    }

    pub fn is_some(&self) -> bool {
        self.confidence > 0.0
    }

    pub fn is_none(&self) -> bool {
        !self.is_some()
    }

    pub fn prev_pos(&self) -> Vec2 {
        vec2(self.prev_x, self.prev_y)
    }

    pub fn prev_pos_fract(&self) -> Vec2 {
        self.prev_pos() - self.prev_pos().floor()
    }
}

/// Finds where each pixel of the current frame was in the previous one and
/// resamples the previous temporal cache there.
pub struct ReverseReprojector<'a> {
    pub params: &'a ReprojectionParams,
    pub curr_camera: &'a Camera,
    pub prev_camera: &'a Camera,
    pub curr_gbuffer: &'a Image<GBufferEntry>,

    /// Packed [`NormalDepth`] of the previous frame
    pub prev_normal_depth: &'a Image<Vec4>,
}

impl ReverseReprojector<'_> {
    pub fn reproject(&self, screen_pos: UVec2) -> Reprojection {
        let surface = self.curr_gbuffer.get(screen_pos);

        if !surface.is_some() {
            return Default::default();
        }

        let pos = screen_pos.as_vec2();

        let (camera_pos, expected_depth) = Camera::reproject(
            self.curr_camera,
            self.prev_camera,
            pos,
            surface.depth,
        );

        let prev_pos = match self.params.source {
            ReprojectionSource::MotionVectors => pos + surface.motion,
            ReprojectionSource::CameraTransform => camera_pos,
        };

        if !prev_pos.is_finite() || expected_depth <= 0.0 {
            return Default::default();
        }

        let reprojection = Reprojection {
            prev_x: prev_pos.x,
            prev_y: prev_pos.y,
            confidence: 0.0,
            validity: 0,
        };

        let coords = BilinearFilter::reprojection_coords(prev_pos);
        let weights =
            BilinearFilter::tap_weights(reprojection.prev_pos_fract());
        let mut validity = 0;
        let mut confidence = 0.0;

        for (i, tap) in coords.into_iter().enumerate() {
            let Some(prev) = self.prev_normal_depth.read(tap) else {
                continue;
            };

            let prev = NormalDepth::unpack(prev);

            let accepted = self.accepts(
                &surface,
                expected_depth,
                prev_pos,
                tap,
                &prev,
            );

            if accepted {
                validity |= BilinearFilter::TAP_BITS[i];
                confidence += weights[i];
            }
        }

        Reprojection {
            confidence,
            validity,
            ..reprojection
        }
    }

    fn accepts(
        &self,
        surface: &GBufferEntry,
        expected_depth: f32,
        prev_pos: Vec2,
        tap: IVec2,
        prev: &NormalDepth,
    ) -> bool {
        if !prev.is_some() {
            return false;
        }

        if self.params.use_normal_weights
            && surface.normal.dot(prev.normal) < self.params.min_normal_dot
        {
            return false;
        }

        if !self.params.use_depth_weights {
            return true;
        }

        let tolerance = self.params.absolute_depth_tolerance
            + self.params.depth_tolerance * expected_depth;

        if self.params.use_world_space_distance {
            let prev_world_pos = self
                .prev_camera
                .screen_to_world(tap.as_vec2(), prev.depth);

            return surface.hit_position.distance(prev_world_pos) <= tolerance;
        }

        let offset = tap.as_vec2() - prev_pos;

        let expected_depth = interpolate_depth(
            expected_depth,
            surface.ddxy,
            offset,
            self.params.perspective_correct_depth_interpolation,
        );

        (prev.depth - expected_depth).abs() <= tolerance
    }

    /// Resamples the previous cache at given reprojection.
    ///
    /// Taps without history don't contribute; the resulting frame age is
    /// capped at `max_frame_age`.
    pub fn resample(
        &self,
        reprojection: Reprojection,
        prev_cache: &Image<Vec4>,
        max_frame_age: u32,
    ) -> CacheSample {
        if reprojection.is_none() {
            return CacheSample::EMPTY;
        }

        let sample = BilinearFilter::reproject(reprojection, |pos| {
            match prev_cache.read(pos).map(CacheSample::deserialize) {
                Some(sample) if sample.is_some() => (sample.serialize(), 1.0),
                _ => (Vec4::ZERO, 0.0),
            }
        });

        let Some(sample) = sample else {
            return CacheSample::EMPTY;
        };

        let mut sample = CacheSample::deserialize(sample);

        sample.frame_age = sample.frame_age.min(max_frame_age);
        sample
    }
}

/// Extrapolates depth of a surface from its center to `offset` pixels away,
/// using the surface's screen-space depth derivatives.
pub fn interpolate_depth(
    depth: f32,
    ddxy: Vec2,
    offset: Vec2,
    perspective_correct: bool,
) -> f32 {
    let delta = ddxy.dot(offset);

    if perspective_correct {
        // 1/z is linear in screen-space; d(1/z) = -dz / z^2
        let inv_depth = 1.0 / depth - delta / (depth * depth);

        if inv_depth > 0.0 {
            return 1.0 / inv_depth;
        }
    }

    depth + delta
}

/// Returns the frame age at which the blend weight bottoms out at
/// `min_smoothing_factor`.
pub fn max_frame_age(min_smoothing_factor: f32) -> u32 {
    if min_smoothing_factor <= 0.0 {
        return u16::MAX as u32;
    }

    ((1.0 / min_smoothing_factor) as u32).clamp(1, u16::MAX as u32)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec3, Vec3};

    use super::*;

    #[test]
    fn serialization() {
        let target = Reprojection {
            prev_x: 123.45,
            prev_y: 234.56,
            confidence: 1.23,
            validity: 0xcafebabe,
        };

        let target = Reprojection::deserialize(target.serialize());

        assert_eq!(123.45, target.prev_x);
        assert_eq!(234.56, target.prev_y);
        assert_eq!(1.23, target.confidence);
        assert_eq!(0xcafebabe, target.validity);
    }

    #[test]
    fn max_frame_age_follows_smoothing_factor() {
        assert_eq!(33, max_frame_age(0.03));
        assert_eq!(1, max_frame_age(1.0));
        assert_eq!(u16::MAX as u32, max_frame_age(0.0));
    }

    #[test]
    fn perspective_correct_interpolation() {
        let ddxy = vec2(0.5, 0.0);
        let offset = vec2(2.0, 0.0);
        let linear = interpolate_depth(10.0, ddxy, offset, false);
        let correct = interpolate_depth(10.0, ddxy, offset, true);

        assert_relative_eq!(linear, 11.0);
        assert_relative_eq!(correct, 10.0 / 0.9, epsilon = 0.0001);
    }

    struct Scene {
        camera: Camera,
        gbuffer: Image<GBufferEntry>,
        normal_depth: Image<Vec4>,
    }

    fn plane(depth: f32) -> Scene {
        plane_seen_from(Vec3::ZERO, depth)
    }

    /// Returns a wall facing +Z, `depth` units in front of `eye`.
    fn plane_seen_from(eye: Vec3, depth: f32) -> Scene {
        let size = uvec2(8, 8);

        let camera = Camera::new(
            eye,
            Vec3::NEG_Z,
            Vec3::Y,
            1.0,
            0.1,
            100.0,
            size,
        );

        let surface = GBufferEntry {
            normal: Vec3::Z,
            depth,
            ..Default::default()
        };

        let gbuffer = Image::from_fn(size, |pos| GBufferEntry {
            hit_position: camera.screen_to_world(pos.as_vec2(), depth),
            ..surface
        });

        Scene {
            camera,
            gbuffer,
            normal_depth: Image::new(size, surface.normal_depth().pack()),
        }
    }

    #[test]
    fn static_scene_is_exact() {
        let scene = plane(5.0);
        let params = ReprojectionParams::default();

        let reprojector = ReverseReprojector {
            params: &params,
            curr_camera: &scene.camera,
            prev_camera: &scene.camera,
            curr_gbuffer: &scene.gbuffer,
            prev_normal_depth: &scene.normal_depth,
        };

        let actual = reprojector.reproject(uvec2(3, 4));

        assert!(actual.is_some());
        assert_relative_eq!(actual.prev_x, 3.0);
        assert_relative_eq!(actual.prev_y, 4.0);
        assert_relative_eq!(actual.confidence, 1.0);
    }

    #[test]
    fn depth_discontinuity_is_rejected() {
        let curr = plane(5.0);
        let prev = plane(6.0);
        let params = ReprojectionParams::default();

        let reprojector = ReverseReprojector {
            params: &params,
            curr_camera: &curr.camera,
            prev_camera: &prev.camera,
            curr_gbuffer: &curr.gbuffer,
            prev_normal_depth: &prev.normal_depth,
        };

        assert!(reprojector.reproject(uvec2(3, 4)).is_none());
    }

    #[test]
    fn default_depth_tolerance_scales_with_depth() {
        let params = ReprojectionParams::default();

        let accepts = |curr_depth: f32, prev_depth: f32| {
            let curr = plane(curr_depth);
            let prev = plane(prev_depth);

            ReverseReprojector {
                params: &params,
                curr_camera: &curr.camera,
                prev_camera: &prev.camera,
                curr_gbuffer: &curr.gbuffer,
                prev_normal_depth: &prev.normal_depth,
            }
            .reproject(uvec2(3, 4))
            .is_some()
        };

        // 0.01 + 0.05 * 5.0
        assert!(accepts(5.0, 5.25));
        assert!(!accepts(5.0, 5.3));
        assert!(!accepts(5.0, 6.0));

        // 0.01 + 0.05 * 50.0
        assert!(accepts(50.0, 51.0));
        assert!(!accepts(50.0, 53.0));
    }

    #[test]
    fn world_space_distance_follows_camera_motion() {
        let prev = plane(5.0);

        // Shift the camera by exactly one pixel's worth at the wall's depth
        let dx = prev.camera.screen_to_world(vec2(4.0, 4.0), 5.0).x
            - prev.camera.screen_to_world(vec2(3.0, 4.0), 5.0).x;

        let curr = plane_seen_from(vec3(dx, 0.0, 0.0), 5.0);

        let params = ReprojectionParams {
            source: ReprojectionSource::CameraTransform,
            use_world_space_distance: true,
            ..Default::default()
        };

        let reprojector = ReverseReprojector {
            params: &params,
            curr_camera: &curr.camera,
            prev_camera: &prev.camera,
            curr_gbuffer: &curr.gbuffer,
            prev_normal_depth: &prev.normal_depth,
        };

        let actual = reprojector.reproject(uvec2(3, 4));

        assert!(actual.is_some());
        assert_relative_eq!(actual.prev_x, 4.0, epsilon = 0.001);
        assert_relative_eq!(actual.prev_y, 4.0, epsilon = 0.001);
        assert!(actual.confidence > 0.99);
    }

    #[test]
    fn world_space_distance_rejects_hit_jumps() {
        let prev = plane(5.0);
        let mut curr = plane(5.0);

        // Same depth and normal, but the hit moved sideways; only
        // world-space comparison can tell
        for pos in curr.gbuffer.positions().collect::<Vec<_>>() {
            let mut entry = curr.gbuffer.get(pos);

            entry.hit_position += vec3(2.0, 0.0, 0.0);
            curr.gbuffer.set(pos, entry);
        }

        let depth_params = ReprojectionParams::default();

        let world_params = ReprojectionParams {
            use_world_space_distance: true,
            ..Default::default()
        };

        let reproject = |params: &ReprojectionParams| {
            ReverseReprojector {
                params,
                curr_camera: &curr.camera,
                prev_camera: &prev.camera,
                curr_gbuffer: &curr.gbuffer,
                prev_normal_depth: &prev.normal_depth,
            }
            .reproject(uvec2(3, 4))
        };

        assert!(reproject(&depth_params).is_some());
        assert!(reproject(&world_params).is_none());
        assert!(
            ReverseReprojector {
                params: &world_params,
                curr_camera: &prev.camera,
                prev_camera: &prev.camera,
                curr_gbuffer: &prev.gbuffer,
                prev_normal_depth: &prev.normal_depth,
            }
            .reproject(uvec2(3, 4))
            .is_some()
        );
    }

    #[test]
    fn normal_discontinuity_is_rejected() {
        let curr = plane(5.0);
        let mut prev = plane(5.0);

        prev.normal_depth.fill(
            NormalDepth {
                normal: vec3(1.0, 0.0, 0.0),
                depth: 5.0,
            }
            .pack(),
        );

        let params = ReprojectionParams::default();

        let reprojector = ReverseReprojector {
            params: &params,
            curr_camera: &curr.camera,
            prev_camera: &prev.camera,
            curr_gbuffer: &curr.gbuffer,
            prev_normal_depth: &prev.normal_depth,
        };

        assert!(reprojector.reproject(uvec2(3, 4)).is_none());
    }

    #[test]
    fn off_screen_motion_is_rejected() {
        let mut scene = plane(5.0);
        let params = ReprojectionParams::default();

        scene.gbuffer.fill(GBufferEntry {
            normal: Vec3::Z,
            depth: 5.0,
            motion: vec2(-20.0, 0.0),
            ..Default::default()
        });

        let reprojector = ReverseReprojector {
            params: &params,
            curr_camera: &scene.camera,
            prev_camera: &scene.camera,
            curr_gbuffer: &scene.gbuffer,
            prev_normal_depth: &scene.normal_depth,
        };

        assert!(reprojector.reproject(uvec2(3, 4)).is_none());
    }

    #[test]
    fn resample_skips_taps_without_history() {
        let scene = plane(5.0);
        let params = ReprojectionParams::default();

        let reprojector = ReverseReprojector {
            params: &params,
            curr_camera: &scene.camera,
            prev_camera: &scene.camera,
            curr_gbuffer: &scene.gbuffer,
            prev_normal_depth: &scene.normal_depth,
        };

        let mut cache =
            Image::new(uvec2(8, 8), CacheSample::EMPTY.serialize());

        cache.set(
            uvec2(2, 2),
            CacheSample {
                frame_age: 40,
                value: 0.25,
                squared_mean: 0.0625,
                hit_distance: 3.0,
            }
            .serialize(),
        );

        let reprojection = Reprojection {
            prev_x: 2.5,
            prev_y: 2.0,
            confidence: 1.0,
            validity: 0b1111,
        };

        let actual = reprojector.resample(reprojection, &cache, 33);

        assert_eq!(33, actual.frame_age);
        assert_relative_eq!(actual.value, 0.25);
        assert_relative_eq!(actual.hit_distance, 3.0);
    }
}
