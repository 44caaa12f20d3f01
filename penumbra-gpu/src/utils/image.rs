use glam::{IVec2, IVec3, UVec2, UVec3};

/// Two-dimensional, row-major image; the CPU-side counterpart of a storage
/// texture.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T> {
    size: UVec2,
    pixels: Vec<T>,
}

impl<T> Image<T>
where
    T: Copy,
{
    pub fn new(size: UVec2, value: T) -> Self {
        Self {
            size,
            pixels: vec![value; (size.x * size.y) as usize],
        }
    }

    pub fn from_fn(size: UVec2, mut f: impl FnMut(UVec2) -> T) -> Self {
        let pixels = (0..size.y)
            .flat_map(|y| (0..size.x).map(move |x| UVec2::new(x, y)))
            .map(&mut f)
            .collect();

        Self { size, pixels }
    }

    /// Returns `None` if `pixels` doesn't contain exactly `size.x * size.y`
    /// elements.
    pub fn from_vec(size: UVec2, pixels: Vec<T>) -> Option<Self> {
        if pixels.len() == (size.x * size.y) as usize {
            Some(Self { size, pixels })
        } else {
            None
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn contains(&self, pos: IVec2) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.x < self.size.x as i32
            && pos.y < self.size.y as i32
    }

    /// Reads pixel at given position; panics if it's out of bounds.
    pub fn get(&self, pos: UVec2) -> T {
        self.pixels[self.idx(pos)]
    }

    /// Reads pixel at given position, if it's inside the image.
    pub fn read(&self, pos: IVec2) -> Option<T> {
        if self.contains(pos) {
            Some(self.get(pos.as_uvec2()))
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: UVec2, value: T) {
        let idx = self.idx(pos);

        self.pixels[idx] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.pixels.fill(value);
    }

    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    pub fn positions(&self) -> impl Iterator<Item = UVec2> {
        let size = self.size;

        (0..size.y)
            .flat_map(move |y| (0..size.x).map(move |x| UVec2::new(x, y)))
    }

    pub fn map<U>(&self, f: impl Fn(T) -> U) -> Image<U>
    where
        U: Copy,
    {
        Image {
            size: self.size,
            pixels: self.pixels.iter().copied().map(f).collect(),
        }
    }

    fn idx(&self, pos: UVec2) -> usize {
        debug_assert!(pos.x < self.size.x && pos.y < self.size.y);

        (pos.y * self.size.x + pos.x) as usize
    }
}

/// Three-dimensional image, laid out as consecutive `x`-rows, then `y`-slices.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume<T> {
    size: UVec3,
    voxels: Vec<T>,
}

impl<T> Volume<T>
where
    T: Copy,
{
    pub fn new(size: UVec3, value: T) -> Self {
        Self {
            size,
            voxels: vec![value; (size.x * size.y * size.z) as usize],
        }
    }

    pub fn from_fn(size: UVec3, f: impl FnMut(UVec3) -> T) -> Self {
        let voxels = Self::positions_of(size).map(f).collect();

        Self { size, voxels }
    }

    pub fn from_vec(size: UVec3, voxels: Vec<T>) -> Option<Self> {
        if voxels.len() == (size.x * size.y * size.z) as usize {
            Some(Self { size, voxels })
        } else {
            None
        }
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn contains(&self, pos: IVec3) -> bool {
        pos.cmpge(IVec3::ZERO).all() && pos.cmplt(self.size.as_ivec3()).all()
    }

    pub fn get(&self, pos: UVec3) -> T {
        self.voxels[self.idx(pos)]
    }

    pub fn read(&self, pos: IVec3) -> Option<T> {
        if self.contains(pos) {
            Some(self.get(pos.as_uvec3()))
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: UVec3, value: T) {
        let idx = self.idx(pos);

        self.voxels[idx] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.voxels.fill(value);
    }

    pub fn voxels(&self) -> &[T] {
        &self.voxels
    }

    pub fn positions(&self) -> impl Iterator<Item = UVec3> {
        Self::positions_of(self.size)
    }

    fn positions_of(size: UVec3) -> impl Iterator<Item = UVec3> {
        (0..size.z).flat_map(move |z| {
            (0..size.y).flat_map(move |y| {
                (0..size.x).map(move |x| UVec3::new(x, y, z))
            })
        })
    }

    fn idx(&self, pos: UVec3) -> usize {
        debug_assert!(pos.cmplt(self.size).all());

        ((pos.z * self.size.y + pos.y) * self.size.x + pos.x) as usize
    }
}

#[cfg(test)]
mod tests {
    use glam::{ivec2, uvec2, uvec3};

    use super::*;

    #[test]
    fn row_major() {
        let image = Image::from_fn(uvec2(3, 2), |pos| pos.y * 10 + pos.x);

        assert_eq!(&[0, 1, 2, 10, 11, 12], image.pixels());
        assert_eq!(12, image.get(uvec2(2, 1)));
        assert_eq!(None, image.read(ivec2(3, 0)));
        assert_eq!(None, image.read(ivec2(-1, 0)));
        assert!(Image::from_vec(uvec2(2, 2), vec![0.0; 3]).is_none());
    }

    #[test]
    fn volume_positions() {
        let volume = Volume::new(uvec3(2, 3, 4), 0u32);

        assert_eq!(24, volume.positions().count());
        assert_eq!(Some(uvec3(1, 2, 3)), volume.positions().last());
    }
}
