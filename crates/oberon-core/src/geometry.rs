// SPDX-License-Identifier: CEPL-1.0

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero area. Minimized windows report this and nothing can be drawn.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Offset2d {
    pub x: i32,
    pub y: i32,
}

impl Offset2d {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect2d {
    pub offset: Offset2d,
    pub extent: Extent2d,
}

impl Rect2d {
    pub const fn new(offset: Offset2d, extent: Extent2d) -> Self {
        Self { offset, extent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_when_either_side_is_zero() {
        assert!(Extent2d::new(0, 720).is_empty());
        assert!(Extent2d::new(1280, 0).is_empty());
        assert!(!Extent2d::new(1, 1).is_empty());
    }

    #[test]
    fn aspect_guards_zero_height() {
        assert_eq!(Extent2d::new(1280, 0).aspect(), 1.0);
        assert!((Extent2d::new(1920, 1080).aspect() - 16.0 / 9.0).abs() < 1e-6);
    }
}
