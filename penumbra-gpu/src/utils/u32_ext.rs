use glam::{UVec4, Vec4};

/// Helpers for treating an `u32` as an RGBA8 texel (`r` in the lowest byte).
pub trait U32Ext
where
    Self: Sized,
{
    fn from_bytes(bytes: UVec4) -> Self;
    fn to_bytes(self) -> UVec4;

    /// Packs a `0.0 ..= 1.0` color into an RGBA8 texel.
    fn from_unorm4(color: Vec4) -> Self;

    /// See: [`Self::from_unorm4()`].
    fn to_unorm4(self) -> Vec4;
}

impl U32Ext for u32 {
    fn from_bytes(bytes: UVec4) -> Self {
        let bytes = bytes.min(UVec4::splat(0xff));

        bytes.x | (bytes.y << 8) | (bytes.z << 16) | (bytes.w << 24)
    }

    fn to_bytes(self) -> UVec4 {
        UVec4::new(
            self & 0xff,
            (self >> 8) & 0xff,
            (self >> 16) & 0xff,
            self >> 24,
        )
    }

    fn from_unorm4(color: Vec4) -> Self {
        let color = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;

        Self::from_bytes(color.round().as_uvec4())
    }

    fn to_unorm4(self) -> Vec4 {
        self.to_bytes().as_vec4() / 255.0
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec4, vec4};

    use super::*;

    #[test]
    fn byte_order() {
        let texel = u32::from_bytes(uvec4(0xbe, 0xba, 0xfe, 0xca));

        assert_eq!(0xcafebabe, texel);
        assert_eq!(uvec4(0xbe, 0xba, 0xfe, 0xca), texel.to_bytes());
    }

    #[test]
    fn unorm_saturates() {
        let texel = u32::from_unorm4(vec4(2.0, -1.0, 1.0, 0.0));

        assert_eq!(vec4(1.0, 0.0, 1.0, 0.0), texel.to_unorm4());
    }
}
