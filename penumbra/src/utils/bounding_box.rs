use std::ops::{Add, AddAssign};

use glam::Vec3;

/// Axis-aligned box; the default one is empty and grows as points get added.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec3, half_size: Vec3) -> Self {
        Self::new(center - half_size, center + half_size)
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn extent(&self) -> Vec3 {
        self.max() - self.min()
    }

    pub fn center(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    pub fn is_set(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Maps `p` from `self.min() ..= self.max()` to `0.0 ..= 1.0`.
    pub fn map(&self, p: Vec3) -> Vec3 {
        let mut p = (p - self.min()) / self.extent();

        // Flat boxes (e.g. a single plane) divide by zero along their thin
        // axis; any value is fine there, since all points map the same way
        if p.x.is_nan() {
            p.x = 0.0;
        }

        if p.y.is_nan() {
            p.y = 0.0;
        }

        if p.z.is_nan() {
            p.z = 0.0;
        }

        p.clamp(Vec3::ZERO, Vec3::ONE)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::MAX, Vec3::MIN)
    }
}

impl Add<Vec3> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Vec3) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Vec3> for BoundingBox {
    fn add_assign(&mut self, rhs: Vec3) {
        self.min = self.min.min(rhs);
        self.max = self.max.max(rhs);
    }
}

impl FromIterator<Vec3> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Vec3>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn grows() {
        let bb: BoundingBox = [vec3(1.0, 0.0, 2.0), vec3(-1.0, 4.0, 0.0)]
            .into_iter()
            .collect();

        assert!(bb.is_set());
        assert_eq!(vec3(-1.0, 0.0, 0.0), bb.min());
        assert_eq!(vec3(1.0, 4.0, 2.0), bb.max());
        assert_eq!(vec3(0.0, 2.0, 1.0), bb.center());
        assert!(!BoundingBox::default().is_set());
    }

    #[test]
    fn map_handles_flat_boxes() {
        let bb = BoundingBox::new(vec3(0.0, 0.0, 1.0), vec3(2.0, 4.0, 1.0));

        assert_eq!(vec3(0.5, 0.25, 0.0), bb.map(vec3(1.0, 1.0, 1.0)));
        assert_eq!(vec3(1.0, 0.0, 0.0), bb.map(vec3(5.0, -1.0, 1.0)));
    }
}
