use glam::{ivec3, uvec4, vec4, Vec3, Vec4, Vec4Swizzles};

use crate::{lerp, U32Ext, Volume, PENUMBRA_EPSILON};

/// Face direction of an anisotropic voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoxelDirection {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl VoxelDirection {
    pub const ALL: [Self; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn axis(&self) -> Vec3 {
        match self {
            Self::PosX => Vec3::X,
            Self::NegX => Vec3::NEG_X,
            Self::PosY => Vec3::Y,
            Self::NegY => Vec3::NEG_Y,
            Self::PosZ => Vec3::Z,
            Self::NegZ => Vec3::NEG_Z,
        }
    }

    /// How much a surface with given normal contributes to this face.
    pub fn weight(&self, normal: Vec3) -> f32 {
        normal.dot(self.axis()).max(0.0)
    }
}

/// Triangle to voxelize, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub positions: [Vec3; 3],
    pub color: Vec3,
}

impl Triangle {
    pub fn normal(&self) -> Vec3 {
        let [p0, p1, p2] = self.positions;

        (p1 - p0).cross(p2 - p0).normalize_or_zero()
    }

    pub fn min(&self) -> Vec3 {
        let [p0, p1, p2] = self.positions;

        p0.min(p1).min(p2)
    }

    pub fn max(&self) -> Vec3 {
        let [p0, p1, p2] = self.positions;

        p0.max(p1).max(p2)
    }

    /// Separating axis test against an axis-aligned box; touching counts as
    /// overlapping, so that rasterization stays conservative.
    pub fn overlaps_box(&self, center: Vec3, half_size: Vec3) -> bool {
        let v = self.positions.map(|p| p - center);
        let edges = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];

        let separates = |axis: Vec3| {
            if axis.length_squared() < PENUMBRA_EPSILON * PENUMBRA_EPSILON {
                return false;
            }

            let p = v.map(|v| v.dot(axis));
            let r = half_size.dot(axis.abs());

            p[0].min(p[1]).min(p[2]) > r || p[0].max(p[1]).max(p[2]) < -r
        };

        for edge in edges {
            for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                if separates(axis.cross(edge)) {
                    return false;
                }
            }
        }

        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            if separates(axis) {
                return false;
            }
        }

        !separates(edges[0].cross(edges[1]))
    }
}

/// Folds `color` into a running RGBA8 average, keeping the number of samples
/// in the alpha channel.
///
/// This is the read-modify-write step of the atomic average; the caller is
/// supposed to retry it in a compare-exchange loop.
pub fn rgba8_average(texel: u32, color: Vec3) -> u32 {
    let prev = texel.to_bytes();
    let count = prev.w.min(254) as f32;
    let color = color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
    let rgb = (prev.xyz().as_vec3() * count + color) / (count + 1.0);
    let rgb = rgb.round().as_uvec3();

    u32::from_bytes(uvec4(rgb.x, rgb.y, rgb.z, prev.w + 1))
}

/// Decodes a texel of the initial volume into `(r, g, b, coverage)`.
pub fn initial_voxel(texel: u32) -> Vec4 {
    let bytes = texel.to_bytes();

    if bytes.w == 0 {
        Vec4::ZERO
    } else {
        (bytes.xyz().as_vec3() / 255.0).extend(1.0)
    }
}

/// Reduces a 2x2x2 block into a single voxel of the next mip.
///
/// Colors are weighted by coverage, so that empty voxels don't darken their
/// neighbours; the coverage itself gets box-filtered.
pub fn downsample_voxels(samples: [Vec4; 8]) -> Vec4 {
    let mut rgb = Vec3::ZERO;
    let mut coverage = 0.0;

    for sample in samples {
        rgb += sample.xyz() * sample.w;
        coverage += sample.w;
    }

    if coverage <= 0.0 {
        return Vec4::ZERO;
    }

    (rgb / coverage).extend(coverage / 8.0)
}

/// Trilinearly samples an RGBA8 volume at given position, expressed in voxels
/// (voxel `i` spans `i ..= i + 1`); everything outside the volume is empty.
pub fn sample_trilinear(volume: &Volume<u32>, pos: Vec3) -> Vec4 {
    let pos = pos - 0.5;
    let base = pos.floor();
    let t = pos - base;
    let base = base.as_ivec3();

    let tap = |x, y, z| {
        volume
            .read(base + ivec3(x, y, z))
            .map(U32Ext::to_unorm4)
            .unwrap_or_default()
    };

    let y0 = lerp(
        lerp(tap(0, 0, 0), tap(1, 0, 0), t.x),
        lerp(tap(0, 1, 0), tap(1, 1, 0), t.x),
        t.y,
    );

    let y1 = lerp(
        lerp(tap(0, 0, 1), tap(1, 0, 1), t.x),
        lerp(tap(0, 1, 1), tap(1, 1, 1), t.x),
        t.y,
    );

    lerp(y0, y1, t.z)
}

/// Front-to-back compositing step of a cone trace; `acc.w` is the occlusion
/// accumulated so far.
pub fn composite_front_to_back(acc: Vec4, sample: Vec4) -> Vec4 {
    let weight = (1.0 - acc.w) * sample.w;

    vec4(
        acc.x + weight * sample.x,
        acc.y + weight * sample.y,
        acc.z + weight * sample.z,
        acc.w + weight,
    )
}
