use crate::ResourceId;

/// Two copies of a resource that swap roles every frame: one gets written
/// (`current`), the other one keeps what was written a frame before
/// (`previous`).
#[derive(Debug)]
pub struct DoubleBuffered<T> {
    label: String,
    a: T,
    b: T,
    swapped: bool,
}

impl<T> DoubleBuffered<T> {
    /// Creates both slots, passing `{label}_a` and `{label}_b` to `new`.
    pub fn new(
        label: impl AsRef<str>,
        mut new: impl FnMut(String) -> T,
    ) -> Self {
        let label = label.as_ref();

        Self {
            label: label.to_owned(),
            a: new(format!("{label}_a")),
            b: new(format!("{label}_b")),
            swapped: false,
        }
    }

    pub fn current(&self) -> &T {
        if self.swapped {
            &self.b
        } else {
            &self.a
        }
    }

    pub fn previous(&self) -> &T {
        if self.swapped {
            &self.a
        } else {
            &self.b
        }
    }

    pub fn current_mut(&mut self) -> &mut T {
        if self.swapped {
            &mut self.b
        } else {
            &mut self.a
        }
    }

    /// Returns the current slot for writing together with the previous one
    /// for reading.
    pub fn split_mut(&mut self) -> (&mut T, &T) {
        if self.swapped {
            (&mut self.b, &self.a)
        } else {
            (&mut self.a, &self.b)
        }
    }

    pub fn swap(&mut self) {
        self.swapped = !self.swapped;
    }

    /// Applies `f` to both slots, e.g. to clear history.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) {
        f(&mut self.a);
        f(&mut self.b);
    }

    pub fn current_id(&self) -> ResourceId {
        self.id(!self.swapped)
    }

    pub fn previous_id(&self) -> ResourceId {
        self.id(self.swapped)
    }

    fn id(&self, a: bool) -> ResourceId {
        ResourceId::new(format!(
            "{}_{}",
            self.label,
            if a { "a" } else { "b" }
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::*;

    #[test]
    fn slots_never_alias() {
        let mut target = DoubleBuffered::new("cache", |label| label);

        for _ in 0..3 {
            assert!(!ptr::eq(target.current(), target.previous()));
            assert_ne!(target.current_id(), target.previous_id());

            let (curr, prev) = target.split_mut();

            assert!(!ptr::eq(curr, prev));

            target.swap();
        }
    }

    #[test]
    fn swap_turns_current_into_previous() {
        let mut target = DoubleBuffered::new("cache", |_| 0);

        for frame in 1..=4 {
            target.swap();
            *target.current_mut() = frame;

            assert_eq!(frame, *target.current());
            assert_eq!(frame - 1, *target.previous());
        }
    }

    #[test]
    fn labels() {
        let mut target = DoubleBuffered::new("cache", |label| label);

        assert_eq!("cache_a", target.current().as_str());
        assert_eq!(ResourceId::new("cache_a"), target.current_id());
        assert_eq!(ResourceId::new("cache_b"), target.previous_id());

        target.swap();

        assert_eq!("cache_b", target.current().as_str());
        assert_eq!("cache_a", target.previous().as_str());
    }
}
