//! Box representations and conversions.
//!
//! Boxes come in two forms: corner form (`x1, y1, x2, y2`) and center-size
//! form (`cx, cy, w, h`). Both are plain `Copy` values; conversion between
//! them is exact up to floating point rounding. Coordinates may be absolute
//! pixels or normalized to the image, as long as one deployment is
//! consistent.

mod overlap;

pub use overlap::{
    intersection, intersection_area, iou, iou_pair, iou_with_eps, OverlapMatrix, IOU_EPS,
};

#[cfg(feature = "rayon")]
pub use overlap::iou_with_eps_par;

/// Box in corner form.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CornerBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

/// Box in center-size form.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CenterBox {
    /// Center x coordinate.
    pub cx: f32,
    /// Center y coordinate.
    pub cy: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl CornerBox {
    /// Creates a corner-form box.
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The unit box `(0, 0, 1, 1)`.
    pub const UNIT: CornerBox = CornerBox::new(0.0, 0.0, 1.0, 1.0);

    /// Returns the box width (`x2 - x1`).
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Returns the box height (`y2 - y1`).
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Returns `width * height`.
    ///
    /// Not clamped: an inverted box yields a negative area.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Converts to center-size form.
    pub fn to_center(&self) -> CenterBox {
        CenterBox {
            cx: (self.x1 + self.x2) / 2.0,
            cy: (self.y1 + self.y2) / 2.0,
            w: self.x2 - self.x1,
            h: self.y2 - self.y1,
        }
    }

    /// Clamps every coordinate into `[min, max]`.
    pub fn clamp(&self, min: f32, max: f32) -> Self {
        Self {
            x1: self.x1.clamp(min, max),
            y1: self.y1.clamp(min, max),
            x2: self.x2.clamp(min, max),
            y2: self.y2.clamp(min, max),
        }
    }

    /// Scales x coordinates by `sx` and y coordinates by `sy`.
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    /// Returns `[x1, y1, x2, y2]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl CenterBox {
    /// Creates a center-size box.
    pub const fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    /// Converts to corner form.
    pub fn to_corner(&self) -> CornerBox {
        CornerBox {
            x1: self.cx - self.w / 2.0,
            y1: self.cy - self.h / 2.0,
            x2: self.cx + self.w / 2.0,
            y2: self.cy + self.h / 2.0,
        }
    }

    /// Returns `[cx, cy, w, h]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.cx, self.cy, self.w, self.h]
    }
}

impl From<[f32; 4]> for CornerBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<[f32; 4]> for CenterBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<CornerBox> for CenterBox {
    fn from(b: CornerBox) -> Self {
        b.to_center()
    }
}

impl From<CenterBox> for CornerBox {
    fn from(b: CenterBox) -> Self {
        b.to_corner()
    }
}

/// Converts a slice of corner boxes to center-size form.
pub fn corners_to_centers(boxes: &[CornerBox]) -> Vec<CenterBox> {
    boxes.iter().map(CornerBox::to_center).collect()
}

/// Converts a slice of center-size boxes to corner form.
pub fn centers_to_corners(boxes: &[CenterBox]) -> Vec<CornerBox> {
    boxes.iter().map(CenterBox::to_corner).collect()
}
