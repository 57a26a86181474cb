//! Rectangle and resolution types.

use std::fmt;

/// Resolution (`width x height`) of an image, camera, or network input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Creates a new [`Resolution`] of `width x height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are clamped to
/// zero.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            w: width.max(0.0),
            h: height.max(0.0),
        }
    }

    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(
            x_center - width * 0.5,
            y_center - height * 0.5,
            width,
            height,
        )
    }

    /// Creates a rectangle spanning from `(x_min, y_min)` to `(x_max, y_max)`.
    ///
    /// If the maximum is smaller than the minimum on an axis, the rectangle has zero extent on that
    /// axis.
    pub fn from_corners(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x + self.w * 0.5
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y + self.h * 0.5
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Scales the X and Y axes of this rectangle, relative to the origin.
    ///
    /// Used to map normalized (`0.0..=1.0`) detector output into pixel coordinates.
    #[must_use]
    pub fn scale_axes(&self, x: f32, y: f32) -> Self {
        Self::from_top_left(self.x * x, self.y * y, self.w * x, self.h * y)
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x.max(other.x);
        let y_min = self.y.max(other.y);
        let x_max = (self.x + self.w).min(other.x + other.w);
        let y_max = (self.y + self.h).min(other.y + other.h);
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::from_corners(x_min, y_min, x_max, y_max))
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = match self.intersection(other) {
            Some(rect) => rect.area(),
            None => return 0.0,
        };
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x, self.y, self.w, self.h
        )
    }
}
