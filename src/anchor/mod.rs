//! Anchor sets: reference boxes paired 1:1 with dense network outputs.
//!
//! An `AnchorSet` is built once per input image size and never mutated. The
//! center-size form needed by the box coder is derived lazily and cached in a
//! `OnceLock`, so repeated post-processing over the same set pays for the
//! conversion at most once. Dropping the cache (building a fresh set) is
//! always correct, only slower.

mod generate;

pub use generate::AnchorConfig;

use crate::geometry::{CenterBox, CornerBox};
use std::sync::OnceLock;

/// Ordered, immutable set of anchor boxes.
#[derive(Debug)]
pub struct AnchorSet {
    corners: Vec<CornerBox>,
    centers: OnceLock<Vec<CenterBox>>,
    per_location: usize,
    normalized: bool,
}

impl AnchorSet {
    /// Creates a set from corner-form boxes.
    pub fn from_corners(corners: Vec<CornerBox>) -> Self {
        Self {
            corners,
            centers: OnceLock::new(),
            per_location: 1,
            normalized: false,
        }
    }

    /// Creates a set from center-size boxes; the center cache is pre-filled.
    pub fn from_centers(centers: Vec<CenterBox>) -> Self {
        let corners = centers.iter().map(CenterBox::to_corner).collect();
        let cache = OnceLock::new();
        let _ = cache.set(centers);
        Self {
            corners,
            centers: cache,
            per_location: 1,
            normalized: false,
        }
    }

    /// Marks the coordinates as image-relative (`[0, 1]` at anchor centers).
    ///
    /// Proposers then clip decoded boxes to the unit square.
    pub fn with_normalized_coords(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub(crate) fn with_per_location(mut self, per_location: usize) -> Self {
        self.per_location = per_location.max(1);
        self
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.corners.len()
    }

    /// Returns true when the set holds no anchors.
    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    /// Anchors generated per spatial location (1 for explicit sets).
    pub fn per_location(&self) -> usize {
        self.per_location
    }

    /// Returns true for image-relative coordinates.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Anchors in corner form.
    pub fn corners(&self) -> &[CornerBox] {
        &self.corners
    }

    /// Anchors in center-size form, converted on first use.
    pub fn centers(&self) -> &[CenterBox] {
        self.centers
            .get_or_init(|| self.corners.iter().map(CornerBox::to_center).collect())
    }

    /// Returns true once the center-size form has been materialized.
    pub fn is_bound(&self) -> bool {
        self.centers.get().is_some()
    }
}

impl Clone for AnchorSet {
    fn clone(&self) -> Self {
        let centers = OnceLock::new();
        if let Some(cached) = self.centers.get() {
            let _ = centers.set(cached.clone());
        }
        Self {
            corners: self.corners.clone(),
            centers,
            per_location: self.per_location,
            normalized: self.normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AnchorSet;
    use crate::geometry::{CenterBox, CornerBox};

    #[test]
    fn centers_are_cached_on_first_access() {
        let set = AnchorSet::from_corners(vec![CornerBox::new(0.0, 0.0, 2.0, 4.0)]);
        assert!(!set.is_bound());
        let first = set.centers().as_ptr();
        assert!(set.is_bound());
        assert_eq!(set.centers()[0], CenterBox::new(1.0, 2.0, 2.0, 4.0));
        assert_eq!(set.centers().as_ptr(), first);
    }

    #[test]
    fn from_centers_is_bound_immediately() {
        let set = AnchorSet::from_centers(vec![CenterBox::new(0.5, 0.5, 0.2, 0.4)]);
        assert!(set.is_bound());
        let c = set.corners()[0];
        assert!((c.x1 - 0.4).abs() < 1e-6);
        assert!((c.y2 - 0.7).abs() < 1e-6);
    }

    #[test]
    fn explicit_sets_are_not_normalized() {
        let set = AnchorSet::from_corners(vec![CornerBox::new(0.0, 0.0, 100.0, 100.0)]);
        assert!(!set.is_normalized());
        let marked = set.with_normalized_coords();
        assert!(marked.is_normalized());
        assert!(marked.clone().is_normalized());
    }

    #[test]
    fn clone_keeps_cached_form() {
        let set = AnchorSet::from_corners(vec![CornerBox::UNIT]);
        let _ = set.centers();
        assert!(set.clone().is_bound());
    }
}
