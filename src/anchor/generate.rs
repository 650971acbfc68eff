//! Grid anchor generation for a two-stage detector backbone.

use crate::anchor::AnchorSet;
use crate::geometry::CenterBox;
use crate::util::{DetPostError, DetPostResult};

/// Configuration for dense grid anchors.
#[derive(Clone, Debug)]
pub struct AnchorConfig {
    /// Side of the base anchor in input pixels.
    pub base_size: f32,
    /// Aspect ratios (height / width).
    pub ratios: Vec<f32>,
    /// Multipliers applied to `base_size`.
    pub scales: Vec<f32>,
    /// Input pixels per feature-map cell.
    pub feature_stride: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            base_size: 16.0,
            ratios: vec![0.5, 1.0, 2.0],
            scales: vec![8.0, 16.0, 32.0],
            feature_stride: 16,
        }
    }
}

impl AnchorConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> DetPostResult<()> {
        if !self.base_size.is_finite() || self.base_size <= 0.0 {
            return Err(DetPostError::InvalidConfig {
                field: "base_size",
                reason: "must be finite and positive",
            });
        }
        if self.ratios.is_empty() || self.ratios.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(DetPostError::InvalidConfig {
                field: "ratios",
                reason: "must be non-empty, finite and positive",
            });
        }
        if self.scales.is_empty() || self.scales.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(DetPostError::InvalidConfig {
                field: "scales",
                reason: "must be non-empty, finite and positive",
            });
        }
        if self.feature_stride == 0 {
            return Err(DetPostError::InvalidConfig {
                field: "feature_stride",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Anchors per feature-map location.
    pub fn anchors_per_location(&self) -> usize {
        self.ratios.len() * self.scales.len()
    }

    /// Feature-map `(height, width)` for an input image.
    pub fn feature_size(&self, image_height: usize, image_width: usize) -> (usize, usize) {
        (
            image_height / self.feature_stride,
            image_width / self.feature_stride,
        )
    }

    /// Base anchor `(w, h)` pairs in pixels, ratio-major.
    fn base_shapes(&self) -> Vec<(f32, f32)> {
        let mut shapes = Vec::with_capacity(self.anchors_per_location());
        for &ratio in &self.ratios {
            let root = ratio.sqrt();
            for &scale in &self.scales {
                let side = self.base_size * scale;
                shapes.push((side / root, side * root));
            }
        }
        shapes
    }
}

impl AnchorSet {
    /// Generates image-normalized anchors for every feature-map cell.
    ///
    /// Anchors are ordered by row, then column, then (ratio, scale), matching
    /// [`DenseView::per_anchor`](crate::tensor::DenseView::per_anchor).
    pub fn generate(
        cfg: &AnchorConfig,
        image_height: usize,
        image_width: usize,
    ) -> DetPostResult<Self> {
        cfg.validate()?;
        let (feat_h, feat_w) = cfg.feature_size(image_height, image_width);
        if feat_h == 0 || feat_w == 0 {
            return Err(DetPostError::InvalidInput(
                "image is smaller than one feature stride",
            ));
        }

        let shapes = cfg.base_shapes();
        let stride = cfg.feature_stride as f32;
        let offset = cfg.base_size / 2.0;
        let inv_w = 1.0 / image_width as f32;
        let inv_h = 1.0 / image_height as f32;

        let mut centers = Vec::with_capacity(feat_h * feat_w * shapes.len());
        for y in 0..feat_h {
            let cy = (y as f32 * stride + offset) * inv_h;
            for x in 0..feat_w {
                let cx = (x as f32 * stride + offset) * inv_w;
                for &(w, h) in &shapes {
                    centers.push(CenterBox::new(cx, cy, w * inv_w, h * inv_h));
                }
            }
        }

        Ok(AnchorSet::from_centers(centers)
            .with_per_location(shapes.len())
            .with_normalized_coords())
    }
}

#[cfg(test)]
mod tests {
    use super::AnchorConfig;
    use crate::anchor::AnchorSet;
    use crate::util::DetPostError;

    #[test]
    fn default_grid_matches_reference_count() {
        let set = AnchorSet::generate(&AnchorConfig::default(), 600, 1000).unwrap();
        assert_eq!(set.len(), 37 * 62 * 9);
        assert_eq!(set.per_location(), 9);
        assert!(set.is_normalized());
    }

    #[test]
    fn square_anchor_has_expected_size() {
        let cfg = AnchorConfig {
            ratios: vec![1.0],
            scales: vec![8.0],
            ..AnchorConfig::default()
        };
        let set = AnchorSet::generate(&cfg, 256, 512).unwrap();
        let first = set.centers()[0];
        assert!((first.cx - 8.0 / 512.0).abs() < 1e-7);
        assert!((first.cy - 8.0 / 256.0).abs() < 1e-7);
        assert!((first.w - 128.0 / 512.0).abs() < 1e-7);
        assert!((first.h - 128.0 / 256.0).abs() < 1e-7);
    }

    #[test]
    fn ratio_controls_height_over_width() {
        let cfg = AnchorConfig {
            ratios: vec![2.0],
            scales: vec![1.0],
            ..AnchorConfig::default()
        };
        let set = AnchorSet::generate(&cfg, 64, 64).unwrap();
        let a = set.centers()[0];
        assert!((a.h / a.w - 2.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_tiny_images_and_bad_config() {
        let err = AnchorSet::generate(&AnchorConfig::default(), 8, 8).err().unwrap();
        assert_eq!(
            err,
            DetPostError::InvalidInput("image is smaller than one feature stride")
        );

        let cfg = AnchorConfig {
            scales: Vec::new(),
            ..AnchorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
