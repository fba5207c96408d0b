//! Plain value types.

/// Pixel dimensions of a window framebuffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either axis is zero (minimized window).
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_window_is_empty() {
        assert!(Dimensions::new(0, 600).is_empty());
        assert!(Dimensions::new(800, 0).is_empty());
        assert!(!Dimensions::new(800, 600).is_empty());
    }

    #[test]
    fn from_tuple() {
        assert_eq!(Dimensions::from((1024, 768)), Dimensions::new(1024, 768));
    }
}
