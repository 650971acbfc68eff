use detpost::{BoxCoder, ClassBoxes, CornerBox, DetectConfig, Detector, ScoreMatrix};

fn spread_boxes(n: usize) -> Vec<CornerBox> {
    (0..n)
        .map(|i| {
            let x = (i * 20) as f32;
            CornerBox::new(x, 0.0, x + 10.0, 10.0)
        })
        .collect()
}

#[test]
fn nothing_qualifying_yields_placeholder() {
    let boxes = spread_boxes(3);
    let scores = ScoreMatrix::from_rows(&[[0.01f32, 0.02, 0.97]; 3]).unwrap();
    let detector = Detector::new(DetectConfig::with_background_last(3)).unwrap();
    let out = detector.detect(ClassBoxes::Shared(&boxes), &scores).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out.boxes().len(), 1);
    assert_eq!(out.labels().len(), 1);
    assert_eq!(out.scores().len(), 1);
    assert_eq!(out.boxes()[0], CornerBox::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(out.labels()[0], 2);
    assert_eq!(out.scores()[0], 0.0);
    assert!(out.is_placeholder(detector.config().placeholder_label()));
}

#[test]
fn placeholder_uses_class_count_without_background_column() {
    let detector = Detector::new(DetectConfig {
        background: None,
        ..DetectConfig::with_background_last(4)
    })
    .unwrap();
    let scores = ScoreMatrix::new(Vec::new(), 0, 4).unwrap();
    let out = detector.detect(ClassBoxes::Shared(&[]), &scores).unwrap();
    assert_eq!(out.labels(), &[4]);
}

#[test]
fn threshold_is_strict() {
    let boxes = spread_boxes(1);
    let scores = ScoreMatrix::from_rows(&[[0.05f32, 0.95]]).unwrap();
    let detector = Detector::new(DetectConfig {
        conf_threshold: 0.05,
        ..DetectConfig::with_background_last(2)
    })
    .unwrap();
    let out = detector.detect(ClassBoxes::Shared(&boxes), &scores).unwrap();
    assert!(out.is_placeholder(1));
}

#[test]
fn overflow_is_reranked_and_truncated() {
    let n = 8;
    let classes = 4;
    let boxes = spread_boxes(n);
    let mut rows = Vec::new();
    let mut all = Vec::new();
    for i in 0..n {
        let mut row = vec![0.0f32; classes];
        for (c, value) in row.iter_mut().enumerate().take(classes - 1) {
            *value = 0.1 + ((i * 7 + c * 3) % 23) as f32 / 100.0;
            all.push(*value);
        }
        rows.push(row);
    }
    let scores = ScoreMatrix::from_rows(&rows).unwrap();
    let detector = Detector::new(DetectConfig {
        top_k: 5,
        ..DetectConfig::with_background_last(classes)
    })
    .unwrap();
    let out = detector.detect(ClassBoxes::Shared(&boxes), &scores).unwrap();

    assert_eq!(out.len(), 5);
    all.sort_by(|a, b| b.total_cmp(a));
    assert_eq!(out.scores(), &all[..5]);
    for det in out.iter() {
        assert!(det.label < classes - 1);
        let row = scores.row(boxes.iter().position(|b| *b == det.bbox).unwrap()).unwrap();
        assert_eq!(row[det.label], det.score);
    }
}

#[test]
fn per_class_suppression_is_independent() {
    let boxes = [
        CornerBox::new(0.0, 0.0, 10.0, 10.0),
        CornerBox::new(1.0, 1.0, 11.0, 11.0),
    ];
    // Both classes see both overlapping boxes; each keeps its own best.
    let scores = ScoreMatrix::from_rows(&[[0.9f32, 0.3, 0.0], [0.4, 0.8, 0.0]]).unwrap();
    let detector = Detector::new(DetectConfig::with_background_last(3)).unwrap();
    let out = detector.detect(ClassBoxes::Shared(&boxes), &scores).unwrap();
    let records: Vec<_> = out.iter().map(|d| (d.label, d.score)).collect();
    assert_eq!(records, vec![(0, 0.9), (1, 0.8)]);
    assert_eq!(out.boxes(), &[boxes[0], boxes[1]]);
}

#[test]
fn raw_path_decodes_against_proposals() {
    let proposals = [
        CornerBox::new(0.1, 0.1, 0.3, 0.3),
        CornerBox::new(0.6, 0.6, 0.9, 0.9),
    ];
    let logits = ScoreMatrix::from_rows(&[[5.0f32, 0.0, 0.0], [0.0, 5.0, 0.0]]).unwrap();
    let deltas = ScoreMatrix::from_rows(&[[0.0f32; 4]; 2]).unwrap();
    let detector = Detector::new(DetectConfig::with_background_last(3)).unwrap();
    let out = detector
        .detect_raw(&BoxCoder::default(), &proposals, logits, &deltas)
        .unwrap();

    assert_eq!(out.labels(), &[0, 1]);
    for (got, want) in out.boxes().iter().zip(proposals.iter()) {
        for (a, b) in got.to_array().iter().zip(want.to_array().iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
    assert!(out.scores().iter().all(|s| *s > 0.9));
}

#[test]
fn raw_path_infinite_logit_scores_one() {
    let proposals = [CornerBox::new(0.2, 0.2, 0.4, 0.4)];
    let logits = ScoreMatrix::from_rows(&[[f32::INFINITY, 0.0, 0.0]]).unwrap();
    let deltas = ScoreMatrix::from_rows(&[[0.0f32; 4]]).unwrap();
    let detector = Detector::new(DetectConfig::with_background_last(3)).unwrap();
    let out = detector
        .detect_raw(&BoxCoder::default(), &proposals, logits, &deltas)
        .unwrap();

    assert_eq!(out.labels(), &[0]);
    assert_eq!(out.scores(), &[1.0]);
}

#[test]
fn raw_path_accepts_per_class_deltas() {
    let proposals = [CornerBox::new(0.4, 0.4, 0.6, 0.6)];
    let logits = ScoreMatrix::from_rows(&[[2.0f32, 2.0, -4.0]]).unwrap();
    // Class 0 shifts right by half a width, class 1 left by half a width.
    let deltas = ScoreMatrix::from_rows(&[[
        0.5f32, 0.0, 0.0, 0.0, -0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ]])
    .unwrap();
    let detector = Detector::new(DetectConfig::with_background_last(3)).unwrap();
    let out = detector
        .detect_raw(&BoxCoder::unclipped(), &proposals, logits, &deltas)
        .unwrap();

    assert_eq!(out.labels(), &[0, 1]);
    assert!((out.boxes()[0].x1 - 0.5).abs() < 1e-6);
    assert!((out.boxes()[1].x1 - 0.3).abs() < 1e-6);
}

#[test]
fn raw_path_rejects_odd_delta_width() {
    let proposals = [CornerBox::UNIT];
    let logits = ScoreMatrix::from_rows(&[[0.0f32; 3]]).unwrap();
    let deltas = ScoreMatrix::from_rows(&[[0.0f32; 8]]).unwrap();
    let detector = Detector::new(DetectConfig::with_background_last(3)).unwrap();
    assert!(detector
        .detect_raw(&BoxCoder::default(), &proposals, logits, &deltas)
        .is_err());
}
