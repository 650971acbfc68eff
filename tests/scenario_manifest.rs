//! Table-driven end-to-end scenarios for the detection stage.

use detpost::{ClassBoxes, CornerBox, DetectConfig, Detector, ScoreMatrix};
use serde::Deserialize;

const MANIFEST: &str = r#"[
  {
    "name": "two_classes_one_overlap",
    "num_classes": 3,
    "conf_threshold": 0.1,
    "iou_threshold": 0.5,
    "top_k": 10,
    "boxes": [[0, 0, 10, 10], [1, 1, 11, 11], [50, 50, 60, 60]],
    "scores": [[0.9, 0.0, 0.1], [0.8, 0.0, 0.2], [0.0, 0.7, 0.3]],
    "expected": [[0, 0.9, 0], [1, 0.7, 2]]
  },
  {
    "name": "loose_threshold_keeps_overlap",
    "num_classes": 2,
    "conf_threshold": 0.1,
    "iou_threshold": 0.9,
    "top_k": 10,
    "boxes": [[0, 0, 10, 10], [1, 1, 11, 11]],
    "scores": [[0.6, 0.4], [0.5, 0.5]],
    "expected": [[0, 0.6, 0], [0, 0.5, 1]]
  },
  {
    "name": "truncation_across_classes",
    "num_classes": 3,
    "conf_threshold": 0.1,
    "iou_threshold": 0.5,
    "top_k": 2,
    "boxes": [[0, 0, 10, 10], [50, 50, 60, 60]],
    "scores": [[0.3, 0.6, 0.1], [0.5, 0.2, 0.3]],
    "expected": [[1, 0.6, 0], [0, 0.5, 1]]
  },
  {
    "name": "all_below_threshold",
    "num_classes": 3,
    "conf_threshold": 0.5,
    "iou_threshold": 0.5,
    "top_k": 10,
    "boxes": [[0, 0, 10, 10]],
    "scores": [[0.2, 0.3, 0.5]],
    "expected": [[2, 0.0, null]]
  }
]"#;

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    num_classes: usize,
    conf_threshold: f32,
    iou_threshold: f32,
    top_k: usize,
    boxes: Vec<[f32; 4]>,
    scores: Vec<Vec<f32>>,
    /// `[label, score, box index]`; a null index means the placeholder box.
    expected: Vec<(usize, f32, Option<usize>)>,
}

#[test]
fn manifest_scenarios_match() {
    let scenarios: Vec<Scenario> = serde_json::from_str(MANIFEST).expect("manifest parses");
    assert_eq!(scenarios.len(), 4);

    for sc in scenarios {
        let boxes: Vec<CornerBox> = sc.boxes.iter().copied().map(CornerBox::from).collect();
        let scores = ScoreMatrix::from_rows(&sc.scores).unwrap();
        let detector = Detector::new(DetectConfig {
            conf_threshold: sc.conf_threshold,
            iou_threshold: sc.iou_threshold,
            top_k: sc.top_k,
            ..DetectConfig::with_background_last(sc.num_classes)
        })
        .unwrap();
        let out = detector.detect(ClassBoxes::Shared(&boxes), &scores).unwrap();

        let got: Vec<_> = out.iter().collect();
        assert_eq!(got.len(), sc.expected.len(), "{}", sc.name);
        for (det, (label, score, idx)) in got.iter().zip(sc.expected.iter()) {
            assert_eq!(det.label, *label, "{}", sc.name);
            assert!((det.score - score).abs() < 1e-6, "{}", sc.name);
            let want = idx.map(|i| boxes[i]).unwrap_or(CornerBox::UNIT);
            assert_eq!(det.bbox, want, "{}", sc.name);
        }
    }
}
