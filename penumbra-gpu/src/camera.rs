use bytemuck::{Pod, Zeroable};
use glam::{vec2, vec4, IVec2, Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

/// Pinhole camera.
///
/// View matrices are kept camera-relative (i.e. built as if the eye was at the
/// origin) so that reconstructing and reprojecting points far away from the
/// world origin doesn't lose precision; the eye position is tracked
/// separately in `origin` and re-added where needed.
///
/// Screen-coordinates address pixel centers: pixel `(x, y)` spans
/// `x - 0.5 ..= x + 0.5`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Camera {
    /// Camera-relative view matrix (rotation only)
    pub view: Mat4,

    /// Inverse of [`Self::view`]
    pub view_inv: Mat4,

    pub projection: Mat4,

    /// x, y, z - eye position in world-coordinates
    pub origin: Vec4,

    /// x, y - viewport size in pixels
    /// z, w - extent spanned by the NDC, in pixels; differs from `xy` only
    ///        for downsampled cameras of odd-sized viewports
    pub screen: Vec4,
}

impl Camera {
    pub fn new(
        eye: Vec3,
        forward: Vec3,
        up: Vec3,
        fov_y: f32,
        near: f32,
        far: f32,
        screen_size: UVec2,
    ) -> Self {
        let view = Mat4::look_to_rh(Vec3::ZERO, forward, up);
        let aspect = screen_size.x as f32 / screen_size.y as f32;

        Self {
            view,
            view_inv: view.inverse(),
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
            origin: eye.extend(1.0),
            screen: vec4(
                screen_size.x as f32,
                screen_size.y as f32,
                screen_size.x as f32,
                screen_size.y as f32,
            ),
        }
    }

    /// Returns the same camera rendering at half width and half height, each
    /// pixel covering a 2x2 block of this camera's pixels.
    ///
    /// Odd viewports get rounded up; the trailing pixel then reaches half a
    /// pixel past the NDC range, so that pixel centers stay aligned with
    /// their blocks.
    pub fn downsampled(mut self) -> Self {
        let size = (self.screen_size() + 1) / 2;

        self.screen = vec4(
            size.x as f32,
            size.y as f32,
            self.screen.z / 2.0,
            self.screen.w / 2.0,
        );

        self
    }

    pub fn eye(&self) -> Vec3 {
        self.origin.xyz()
    }

    pub fn screen_size(&self) -> UVec2 {
        self.screen.xy().as_uvec2()
    }

    /// Returns whether given point lays inside the screen.
    pub fn contains(&self, pos: IVec2) -> bool {
        let screen_size = self.screen.xy().as_ivec2();

        pos.x >= 0
            && pos.y >= 0
            && pos.x < screen_size.x
            && pos.y < screen_size.y
    }

    pub fn screen_to_ndc(&self, pos: Vec2) -> Vec2 {
        let ndc = (pos + 0.5) / self.screen.zw() * 2.0 - 1.0;

        vec2(ndc.x, -ndc.y)
    }

    pub fn ndc_to_screen(&self, ndc: Vec2) -> Vec2 {
        let ndc = vec2(ndc.x, -ndc.y);

        (ndc * 0.5 + 0.5) * self.screen.zw() - 0.5
    }

    /// Given a point in screen-coordinates and its linear view-depth, returns
    /// it in camera-relative world-coordinates (i.e. `world - eye`).
    pub fn screen_to_rel_world(&self, pos: Vec2, depth: f32) -> Vec3 {
        let ndc = self.screen_to_ndc(pos);

        let view_pos = Vec3::new(
            ndc.x * depth / self.projection.x_axis.x,
            ndc.y * depth / self.projection.y_axis.y,
            -depth,
        );

        self.view_inv.transform_point3(view_pos)
    }

    pub fn screen_to_world(&self, pos: Vec2, depth: f32) -> Vec3 {
        self.screen_to_rel_world(pos, depth) + self.eye()
    }

    /// Given a point in camera-relative world-coordinates, returns its
    /// screen-coordinates and linear view-depth.
    pub fn rel_world_to_screen(&self, pos: Vec3) -> (Vec2, f32) {
        let view_pos = self.view.transform_point3(pos);
        let clip = self.projection * view_pos.extend(1.0);

        if clip.w <= 0.0 {
            return (Vec2::splat(f32::MAX), -view_pos.z);
        }

        (self.ndc_to_screen(clip.xy() / clip.w), -view_pos.z)
    }

    pub fn world_to_screen(&self, pos: Vec3) -> (Vec2, f32) {
        self.rel_world_to_screen(pos - self.eye())
    }

    /// Maps a point seen by `curr` into the screen of `prev`, returning its
    /// previous screen-coordinates and previous linear view-depth.
    ///
    /// Both sides are evaluated relative to their own eye, with only the eye
    /// delta crossing between them.
    pub fn reproject(
        curr: &Self,
        prev: &Self,
        pos: Vec2,
        depth: f32,
    ) -> (Vec2, f32) {
        let rel = curr.screen_to_rel_world(pos, depth);

        prev.rel_world_to_screen(rel + (curr.eye() - prev.eye()))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec2, vec3};

    use super::*;

    fn camera(eye: Vec3) -> Camera {
        Camera::new(
            eye,
            Vec3::NEG_Z,
            Vec3::Y,
            1.0,
            0.1,
            1000.0,
            uvec2(64, 32),
        )
    }

    #[test]
    fn screen_roundtrip_far_from_origin() {
        let camera = camera(vec3(100_000.0, 20.0, -50_000.0));
        let pos = vec2(12.0, 7.0);
        let world = camera.screen_to_world(pos, 15.0);
        let (actual, depth) = camera.world_to_screen(world);

        assert_relative_eq!(actual.x, pos.x, epsilon = 0.05);
        assert_relative_eq!(actual.y, pos.y, epsilon = 0.05);
        assert_relative_eq!(depth, 15.0, epsilon = 0.01);
    }

    #[test]
    fn downsampled_pixels_cover_2x2_blocks() {
        let full = Camera::new(
            Vec3::ZERO,
            Vec3::NEG_Z,
            Vec3::Y,
            1.0,
            0.1,
            1000.0,
            uvec2(5, 3),
        );

        let half = full.downsampled();

        assert_eq!(uvec2(3, 2), half.screen_size());

        for pos in [vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(2.0, 1.0)] {
            let expected = full.screen_to_ndc(pos * 2.0 + 0.5);
            let actual = half.screen_to_ndc(pos);

            assert_relative_eq!(actual.x, expected.x, epsilon = 0.0001);
            assert_relative_eq!(actual.y, expected.y, epsilon = 0.0001);
        }

        // Block (1, 0) spans pixels 2 ..= 3, i.e. the NDC's center column
        assert_relative_eq!(
            half.screen_to_ndc(vec2(1.0, 0.0)).x,
            0.2,
            epsilon = 0.0001
        );

        let screen = half.ndc_to_screen(half.screen_to_ndc(vec2(2.0, 1.0)));

        assert_relative_eq!(screen.x, 2.0, epsilon = 0.0001);
        assert_relative_eq!(screen.y, 1.0, epsilon = 0.0001);
    }

    #[test]
    fn reproject_static_camera() {
        let camera = camera(vec3(1.0, 2.0, 3.0));
        let (prev, depth) =
            Camera::reproject(&camera, &camera, vec2(5.0, 9.0), 4.0);

        assert_relative_eq!(prev.x, 5.0, epsilon = 0.001);
        assert_relative_eq!(prev.y, 9.0, epsilon = 0.001);
        assert_relative_eq!(depth, 4.0, epsilon = 0.001);
    }

    #[test]
    fn reproject_after_moving_back() {
        let curr = camera(vec3(0.0, 0.0, 0.0));
        let prev = camera(vec3(0.0, 0.0, -1.0));

        // Previous camera was one unit closer to the scene
        let (_, depth) =
            Camera::reproject(&curr, &prev, vec2(32.0, 16.0), 5.0);

        assert_relative_eq!(depth, 4.0, epsilon = 0.001);
    }
}
