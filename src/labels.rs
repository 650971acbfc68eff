//! Static class-name tables.
//!
//! Each table lists foreground classes in index order; the background class
//! follows the last foreground index. Tables are compiled in and never
//! change at runtime.

/// Name of the background entry.
pub const BACKGROUND: &str = "background";

const VOC_LABELS: [&str; 20] = [
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

const COCO_LABELS: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Ordered mapping between class indices and names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelMap {
    names: &'static [&'static str],
}

impl LabelMap {
    /// Pascal VOC: 20 classes, background at 20.
    pub const fn voc() -> Self {
        Self { names: &VOC_LABELS }
    }

    /// MS COCO: 80 classes, background at 80.
    pub const fn coco() -> Self {
        Self {
            names: &COCO_LABELS,
        }
    }

    /// Number of foreground classes.
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    /// Index of the background class.
    pub fn background_index(&self) -> usize {
        self.names.len()
    }

    /// Name for `index`, including the background entry.
    pub fn name(&self, index: usize) -> Option<&'static str> {
        if index == self.background_index() {
            return Some(BACKGROUND);
        }
        self.names.get(index).copied()
    }

    /// Index for `name`, including the background entry.
    pub fn index(&self, name: &str) -> Option<usize> {
        if name == BACKGROUND {
            return Some(self.background_index());
        }
        self.names.iter().position(|n| *n == name)
    }

    /// Iterates `(index, name)` over foreground classes.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'static str)> + '_ {
        self.names.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::{LabelMap, BACKGROUND};

    #[test]
    fn voc_round_trips_names() {
        let voc = LabelMap::voc();
        assert_eq!(voc.num_classes(), 20);
        assert_eq!(voc.index("person"), Some(14));
        assert_eq!(voc.name(14), Some("person"));
        assert_eq!(voc.name(20), Some(BACKGROUND));
        assert_eq!(voc.index(BACKGROUND), Some(20));
        assert_eq!(voc.name(21), None);
    }

    #[test]
    fn coco_background_follows_last_class() {
        let coco = LabelMap::coco();
        assert_eq!(coco.background_index(), 80);
        assert_eq!(coco.name(79), Some("toothbrush"));
        assert_eq!(coco.index("unicorn"), None);
    }
}
