use clap::Parser;
use detpost::{
    AnchorConfig, AnchorSet, BoxCoder, CornerBox, DenseView, DetectConfig, Detection, Detector,
    LabelMap, Proposal, ProposalConfig, ProposalMode, RegionProposer, ScoreMatrix,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "detpost CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for stage counts.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ModeConfig {
    Train,
    Test,
}

impl From<&ModeConfig> for ProposalMode {
    fn from(value: &ModeConfig) -> Self {
        match value {
            ModeConfig::Train => ProposalMode::Train,
            ModeConfig::Test => ProposalMode::Test,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LabelsConfig {
    Voc,
    Coco,
}

impl From<LabelsConfig> for LabelMap {
    fn from(value: LabelsConfig) -> Self {
        match value {
            LabelsConfig::Voc => LabelMap::voc(),
            LabelsConfig::Coco => LabelMap::coco(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AnchorConfigJson {
    base_size: f32,
    ratios: Vec<f32>,
    scales: Vec<f32>,
    feature_stride: usize,
}

impl Default for AnchorConfigJson {
    fn default() -> Self {
        let cfg = AnchorConfig::default();
        Self {
            base_size: cfg.base_size,
            ratios: cfg.ratios,
            scales: cfg.scales,
            feature_stride: cfg.feature_stride,
        }
    }
}

impl From<&AnchorConfigJson> for AnchorConfig {
    fn from(value: &AnchorConfigJson) -> Self {
        Self {
            base_size: value.base_size,
            ratios: value.ratios.clone(),
            scales: value.scales.clone(),
            feature_stride: value.feature_stride,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ProposalConfigJson {
    mode: ModeConfig,
    pre_nms_top_k: Option<usize>,
    post_nms_top_k: Option<usize>,
    nms_iou_threshold: f32,
    parallel: bool,
}

impl Default for ProposalConfigJson {
    fn default() -> Self {
        let cfg = ProposalConfig::default();
        Self {
            mode: ModeConfig::Train,
            pre_nms_top_k: None,
            post_nms_top_k: None,
            nms_iou_threshold: cfg.nms_iou_threshold,
            parallel: cfg.parallel,
        }
    }
}

impl From<&ProposalConfigJson> for ProposalConfig {
    fn from(value: &ProposalConfigJson) -> Self {
        let base = ProposalConfig::for_mode((&value.mode).into());
        Self {
            pre_nms_top_k: value.pre_nms_top_k.unwrap_or(base.pre_nms_top_k),
            post_nms_top_k: value.post_nms_top_k.unwrap_or(base.post_nms_top_k),
            nms_iou_threshold: value.nms_iou_threshold,
            parallel: value.parallel,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DetectConfigJson {
    num_classes: usize,
    background: Option<usize>,
    skip_background: bool,
    conf_threshold: f32,
    iou_threshold: f32,
    top_k: usize,
    parallel: bool,
}

impl Default for DetectConfigJson {
    fn default() -> Self {
        let cfg = DetectConfig::default();
        Self {
            num_classes: cfg.num_classes,
            background: cfg.background,
            skip_background: cfg.skip_background,
            conf_threshold: cfg.conf_threshold,
            iou_threshold: cfg.iou_threshold,
            top_k: cfg.top_k,
            parallel: cfg.parallel,
        }
    }
}

impl From<DetectConfigJson> for DetectConfig {
    fn from(value: DetectConfigJson) -> Self {
        Self {
            num_classes: value.num_classes,
            background: value.background,
            skip_background: value.skip_background,
            conf_threshold: value.conf_threshold,
            iou_threshold: value.iou_threshold,
            top_k: value.top_k,
            parallel: value.parallel,
        }
    }
}

/// Channel-first RPN outputs over the anchor feature grid.
#[derive(Debug, Deserialize)]
struct RpnInput {
    cls: Vec<f32>,
    reg: Vec<f32>,
}

/// Classification-head outputs for explicit proposals.
#[derive(Debug, Deserialize)]
struct HeadInput {
    proposals: Vec<[f32; 4]>,
    cls_logits: Vec<Vec<f32>>,
    deltas: Vec<Vec<f32>>,
    /// Clamp decoded boxes to the unit square; only for normalized proposals.
    #[serde(default)]
    clip: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    image_height: usize,
    image_width: usize,
    output_path: Option<String>,
    labels: Option<LabelsConfig>,
    anchors: AnchorConfigJson,
    proposal: ProposalConfigJson,
    rpn: Option<RpnInput>,
    detect: DetectConfigJson,
    head: Option<HeadInput>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_height: 0,
            image_width: 0,
            output_path: None,
            labels: None,
            anchors: AnchorConfigJson::default(),
            proposal: ProposalConfigJson::default(),
            rpn: None,
            detect: DetectConfigJson::default(),
            head: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProposalRecord {
    bbox: [f32; 4],
    score: f32,
}

impl From<Proposal> for ProposalRecord {
    fn from(value: Proposal) -> Self {
        Self {
            bbox: value.bbox.to_array(),
            score: value.score,
        }
    }
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    bbox: [f32; 4],
    label: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,
    score: f32,
}

impl DetectionRecord {
    fn new(det: Detection, labels: Option<&LabelMap>) -> Self {
        Self {
            bbox: det.bbox.to_array(),
            label: det.label,
            name: labels.and_then(|map| map.name(det.label)),
            score: det.score,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    proposals: Option<Vec<ProposalRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detections: Option<Vec<DetectionRecord>>,
}

fn run_rpn(config: &Config, rpn: &RpnInput) -> Result<Vec<Proposal>, Box<dyn std::error::Error>> {
    if config.image_height == 0 || config.image_width == 0 {
        return Err("image_height and image_width must be set for the rpn stage".into());
    }
    let anchor_cfg = AnchorConfig::from(&config.anchors);
    let anchors = AnchorSet::generate(&anchor_cfg, config.image_height, config.image_width)?;
    let (feat_h, feat_w) = anchor_cfg.feature_size(config.image_height, config.image_width);
    let per_loc = anchors.per_location();

    let cls = DenseView::new(&rpn.cls, 2 * per_loc, feat_h, feat_w)?;
    let reg = DenseView::new(&rpn.reg, 4 * per_loc, feat_h, feat_w)?;
    let proposal_cfg = ProposalConfig::from(&config.proposal);
    let proposer = RegionProposer::new(proposal_cfg)?;
    Ok(proposer.propose(&anchors, cls, reg)?)
}

fn run_head(
    detector: &Detector,
    head: &HeadInput,
) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
    let proposals: Vec<CornerBox> = head.proposals.iter().map(|&q| q.into()).collect();
    let cls_logits = if head.cls_logits.is_empty() {
        ScoreMatrix::new(Vec::new(), 0, detector.config().num_classes)?
    } else {
        ScoreMatrix::from_rows(&head.cls_logits)?
    };
    let deltas = if head.deltas.is_empty() {
        ScoreMatrix::new(Vec::new(), 0, 4)?
    } else {
        ScoreMatrix::from_rows(&head.deltas)?
    };
    let coder = if head.clip {
        BoxCoder::unit_clipped()
    } else {
        BoxCoder::unclipped()
    };
    let detections = detector.detect_raw(&coder, &proposals, cls_logits, &deltas)?;
    Ok(detections.iter().collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("detpost=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let mut config: Config = serde_json::from_str(&config_text)?;
    if config.rpn.is_none() && config.head.is_none() {
        return Err("at least one of rpn or head must be set in the config".into());
    }

    let proposals = match &config.rpn {
        Some(rpn) => Some(run_rpn(&config, rpn)?),
        None => None,
    };

    let labels: Option<LabelMap> = config.labels.take().map(LabelMap::from);
    let detections = match config.head.take() {
        Some(head) => {
            let detector = Detector::new(std::mem::take(&mut config.detect).into())?;
            let found = run_head(&detector, &head)?;
            Some(
                found
                    .into_iter()
                    .map(|det| DetectionRecord::new(det, labels.as_ref()))
                    .collect(),
            )
        }
        None => None,
    };

    let output = Output {
        proposals: proposals.map(|p| p.into_iter().map(ProposalRecord::from).collect()),
        detections,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
