use criterion::{criterion_group, criterion_main, Criterion};
use detpost::{
    nms, AnchorConfig, AnchorSet, ClassBoxes, CornerBox, DenseView, DetectConfig, Detector,
    NmsConfig, ProposalMode, RegionProposer, ScoreMatrix,
};
use std::hint::black_box;

/// Deterministic pseudo-random values in `[0, 1)`.
fn make_values(n: usize, seed: usize) -> Vec<f32> {
    (0..n)
        .map(|i| ((i + seed).wrapping_mul(2654435761) % 1000) as f32 / 1000.0)
        .collect()
}

fn make_boxes(n: usize) -> Vec<CornerBox> {
    let xs = make_values(n, 1);
    let ys = make_values(n, 7);
    let ss = make_values(n, 13);
    (0..n)
        .map(|i| {
            let s = 0.02 + ss[i] * 0.2;
            CornerBox::new(xs[i] * 0.8, ys[i] * 0.8, xs[i] * 0.8 + s, ys[i] * 0.8 + s)
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let boxes = make_boxes(3000);
    let scores = make_values(3000, 3);
    c.bench_function("nms_3000", |b| {
        b.iter(|| black_box(nms(&boxes, &scores, &NmsConfig::with_threshold(0.7)).unwrap()));
    });

    if cfg!(feature = "rayon") {
        let cfg = NmsConfig {
            parallel: true,
            ..NmsConfig::with_threshold(0.7)
        };
        c.bench_function("nms_3000_parallel", |b| {
            b.iter(|| black_box(nms(&boxes, &scores, &cfg).unwrap()));
        });
    }

    let anchors = AnchorSet::generate(&AnchorConfig::default(), 600, 1000).unwrap();
    let (h, w) = AnchorConfig::default().feature_size(600, 1000);
    let per_loc = anchors.per_location();
    let cls = make_values(2 * per_loc * h * w, 5);
    let reg: Vec<f32> = make_values(4 * per_loc * h * w, 11)
        .into_iter()
        .map(|v| (v - 0.5) * 0.2)
        .collect();
    let cls_view = DenseView::new(&cls, 2 * per_loc, h, w).unwrap();
    let reg_view = DenseView::new(&reg, 4 * per_loc, h, w).unwrap();

    for mode in [ProposalMode::Test, ProposalMode::Train] {
        let proposer = RegionProposer::for_mode(mode);
        let name = format!("propose_600x1000_{mode:?}").to_lowercase();
        c.bench_function(&name, |b| {
            b.iter(|| black_box(proposer.propose(&anchors, cls_view, reg_view).unwrap()));
        });
    }

    let proposals = make_boxes(300);
    let class_scores = ScoreMatrix::new(make_values(300 * 21, 17), 300, 21).unwrap();
    let detector = Detector::new(DetectConfig::voc()).unwrap();
    c.bench_function("detect_300x21", |b| {
        b.iter(|| {
            black_box(
                detector
                    .detect(ClassBoxes::Shared(&proposals), &class_scores)
                    .unwrap(),
            )
        });
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
