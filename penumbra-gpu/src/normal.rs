use glam::{vec3, Vec2, Vec3, Vec3Swizzles};

pub struct Normal;

impl Normal {
    /// Compresses a unit normal into `0.0 ..= 1.0` octahedral coordinates.
    pub fn encode(n: Vec3) -> Vec2 {
        let n = n / (n.x.abs() + n.y.abs() + n.z.abs());

        let n = if n.z >= 0.0 {
            n.xy()
        } else {
            let t = 1.0 - n.yx().abs();

            Vec2::new(t.x.copysign(n.x), t.y.copysign(n.y))
        };

        n * 0.5 + 0.5
    }

    /// See: [`Self::encode()`].
    pub fn decode(n: Vec2) -> Vec3 {
        let n = n * 2.0 - 1.0;
        let mut n = vec3(n.x, n.y, 1.0 - n.x.abs() - n.y.abs());
        let t = (-n.z).max(0.0);

        n.x -= t.copysign(n.x);
        n.y -= t.copysign(n.y);
        n.normalize()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn both_hemispheres() {
        for n in [
            vec3(0.26, 0.53, 0.80),
            vec3(-0.48, 0.6, -0.64),
            Vec3::NEG_Z,
        ] {
            let n = n.normalize();
            let actual = Normal::decode(Normal::encode(n));

            assert_relative_eq!(actual.dot(n), 1.0, epsilon = 0.0001);
        }
    }
}
