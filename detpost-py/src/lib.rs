//! Python bindings for the detpost detector post-processing library.
//!
//! Boxes cross the boundary as `float32` arrays of shape `(N, 4)`.

use numpy::{
    PyArray1, PyArrayMethods, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray3,
    PyUntypedArrayMethods,
};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use detpost::{
    AnchorConfig, AnchorSet, BoxCoder, CenterBox, ClassBoxes, CornerBox, DenseView, DetPostError,
    DetectConfig as RustDetectConfig, Detections, Detector as RustDetector, NmsConfig, Offset,
    ProposalConfig, ProposalMode, RegionProposer as RustRegionProposer, ScoreMatrix,
};

type BoxArray<'py> = Bound<'py, numpy::PyArray2<f32>>;

/// Convert a DetPostError to a Python exception.
fn to_py_err(err: DetPostError) -> PyErr {
    match err {
        DetPostError::InvalidConfig { .. } => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn read_rows(array: &PyReadonlyArray2<'_, f32>) -> PyResult<ScoreMatrix> {
    let shape = array.shape();
    let data = array.as_slice()?.to_vec();
    ScoreMatrix::new(data, shape[0], shape[1]).map_err(to_py_err)
}

fn read_quads(array: &PyReadonlyArray2<'_, f32>) -> PyResult<Vec<[f32; 4]>> {
    if array.shape()[1] != 4 {
        return Err(PyValueError::new_err("expected an array of shape (N, 4)"));
    }
    Ok(array
        .as_slice()?
        .chunks_exact(4)
        .map(|q| [q[0], q[1], q[2], q[3]])
        .collect())
}

fn read_corners(array: &PyReadonlyArray2<'_, f32>) -> PyResult<Vec<CornerBox>> {
    Ok(read_quads(array)?.into_iter().map(CornerBox::from).collect())
}

fn read_centers(array: &PyReadonlyArray2<'_, f32>) -> PyResult<Vec<CenterBox>> {
    Ok(read_quads(array)?.into_iter().map(CenterBox::from).collect())
}

fn quads_to_py<'py>(
    py: Python<'py>,
    quads: impl Iterator<Item = [f32; 4]>,
) -> PyResult<BoxArray<'py>> {
    let flat: Vec<f32> = quads.flat_map(|q| q.into_iter()).collect();
    let rows = flat.len() / 4;
    PyArray1::from_vec(py, flat).reshape([rows, 4])
}

type DetectionArrays<'py> = (
    BoxArray<'py>,
    Bound<'py, PyArray1<usize>>,
    Bound<'py, PyArray1<f32>>,
);

fn detections_to_py(py: Python<'_>, found: Detections) -> PyResult<DetectionArrays<'_>> {
    let (boxes, labels, scores) = found.into_parts();
    Ok((
        quads_to_py(py, boxes.iter().map(CornerBox::to_array))?,
        PyArray1::from_vec(py, labels),
        PyArray1::from_vec(py, scores),
    ))
}

/// Pairwise IoU between two sets of corner-form boxes.
///
/// Returns an `(N, M)` float32 array.
#[pyfunction]
fn iou<'py>(
    py: Python<'py>,
    a: PyReadonlyArray2<'_, f32>,
    b: PyReadonlyArray2<'_, f32>,
) -> PyResult<BoxArray<'py>> {
    let a = read_corners(&a)?;
    let b = read_corners(&b)?;
    let overlaps = detpost::iou(&a, &b);
    PyArray1::from_slice(py, overlaps.as_slice()).reshape([overlaps.rows(), overlaps.cols()])
}

/// Greedy non-maximum suppression.
///
/// Returns the kept indices, best score first.
#[pyfunction]
#[pyo3(signature = (boxes, scores, iou_threshold = 0.5, top_k = None))]
fn nms(
    boxes: PyReadonlyArray2<'_, f32>,
    scores: PyReadonlyArray1<'_, f32>,
    iou_threshold: f32,
    top_k: Option<usize>,
) -> PyResult<Vec<usize>> {
    let boxes = read_corners(&boxes)?;
    let cfg = NmsConfig {
        top_k,
        ..NmsConfig::with_threshold(iou_threshold)
    };
    detpost::nms(&boxes, scores.as_slice()?, &cfg).map_err(to_py_err)
}

/// Encodes center-form ground truth against center-form anchors.
#[pyfunction]
fn encode<'py>(
    py: Python<'py>,
    gt: PyReadonlyArray2<'_, f32>,
    anchors: PyReadonlyArray2<'_, f32>,
) -> PyResult<BoxArray<'py>> {
    let gt = read_centers(&gt)?;
    let anchors = read_centers(&anchors)?;
    let offsets = detpost::lowlevel::encode_all(&gt, &anchors).map_err(to_py_err)?;
    quads_to_py(py, offsets.iter().map(Offset::to_array))
}

/// Decodes offsets against center-form anchors into center-form boxes.
#[pyfunction]
fn decode<'py>(
    py: Python<'py>,
    offsets: PyReadonlyArray2<'_, f32>,
    anchors: PyReadonlyArray2<'_, f32>,
) -> PyResult<BoxArray<'py>> {
    let offsets: Vec<Offset> = read_quads(&offsets)?.into_iter().map(Offset::from).collect();
    let anchors = read_centers(&anchors)?;
    let boxes = detpost::lowlevel::decode_all(&offsets, &anchors).map_err(to_py_err)?;
    quads_to_py(py, boxes.iter().map(CenterBox::to_array))
}

/// Region proposal stage over channel-first RPN outputs.
///
/// Anchors are regenerated only when the image size changes.
#[pyclass]
pub struct RegionProposer {
    inner: RustRegionProposer,
    anchor_cfg: AnchorConfig,
    anchors: Option<((usize, usize), AnchorSet)>,
}

#[pymethods]
impl RegionProposer {
    /// Create a new RegionProposer.
    ///
    /// Args:
    ///     mode: "train" or "test" (default: "train")
    ///     pre_nms_top_k: Override the mode's pre-NMS budget
    ///     post_nms_top_k: Override the mode's post-NMS budget
    ///     nms_iou_threshold: Proposal NMS threshold (default: 0.7)
    ///     parallel: Enable parallel suppression (default: False)
    #[new]
    #[pyo3(signature = (
        mode = "train",
        pre_nms_top_k = None,
        post_nms_top_k = None,
        nms_iou_threshold = 0.7,
        parallel = false
    ))]
    fn new(
        mode: &str,
        pre_nms_top_k: Option<usize>,
        post_nms_top_k: Option<usize>,
        nms_iou_threshold: f32,
        parallel: bool,
    ) -> PyResult<Self> {
        let mode = match mode.to_lowercase().as_str() {
            "train" => ProposalMode::Train,
            "test" => ProposalMode::Test,
            _ => return Err(PyValueError::new_err("mode must be 'train' or 'test'")),
        };
        let base = ProposalConfig::for_mode(mode);
        let cfg = ProposalConfig {
            pre_nms_top_k: pre_nms_top_k.unwrap_or(base.pre_nms_top_k),
            post_nms_top_k: post_nms_top_k.unwrap_or(base.post_nms_top_k),
            nms_iou_threshold,
            parallel,
        };
        let inner = RustRegionProposer::new(cfg).map_err(to_py_err)?;
        Ok(Self {
            inner,
            anchor_cfg: AnchorConfig::default(),
            anchors: None,
        })
    }

    /// Propose regions for one image.
    ///
    /// Args:
    ///     cls: float32 array (2A, H, W) of objectness logits
    ///     reg: float32 array (4A, H, W) of box offsets
    ///     image_height: Input image height in pixels
    ///     image_width: Input image width in pixels
    ///
    /// Returns:
    ///     Tuple of (boxes (K, 4), scores (K,)), best first
    fn propose<'py>(
        &mut self,
        py: Python<'py>,
        cls: PyReadonlyArray3<'_, f32>,
        reg: PyReadonlyArray3<'_, f32>,
        image_height: usize,
        image_width: usize,
    ) -> PyResult<(BoxArray<'py>, Bound<'py, PyArray1<f32>>)> {
        let cls_shape = cls.shape();
        let reg_shape = reg.shape();
        let cls_view = DenseView::new(cls.as_slice()?, cls_shape[0], cls_shape[1], cls_shape[2])
            .map_err(to_py_err)?;
        let reg_view = DenseView::new(reg.as_slice()?, reg_shape[0], reg_shape[1], reg_shape[2])
            .map_err(to_py_err)?;

        // The anchor cache goes back before the result is checked.
        let key = (image_height, image_width);
        let anchors = match self.anchors.take() {
            Some((size, anchors)) if size == key => anchors,
            _ => AnchorSet::generate(&self.anchor_cfg, image_height, image_width)
                .map_err(to_py_err)?,
        };
        let result = self.inner.propose(&anchors, cls_view, reg_view);
        self.anchors = Some((key, anchors));
        let proposals = result.map_err(to_py_err)?;

        let scores: Vec<f32> = proposals.iter().map(|p| p.score).collect();
        Ok((
            quads_to_py(py, proposals.iter().map(|p| p.bbox.to_array()))?,
            PyArray1::from_vec(py, scores),
        ))
    }

    fn __repr__(&self) -> String {
        let cfg = self.inner.config();
        format!(
            "RegionProposer(pre_nms_top_k={}, post_nms_top_k={}, nms_iou_threshold={})",
            cfg.pre_nms_top_k, cfg.post_nms_top_k, cfg.nms_iou_threshold
        )
    }
}

/// Per-class detection stage.
#[pyclass]
pub struct Detector {
    inner: RustDetector,
}

#[pymethods]
impl Detector {
    /// Create a new Detector.
    ///
    /// Args:
    ///     num_classes: Score columns, background included (default: 21)
    ///     has_background: Whether one column is background (default: True)
    ///     background: Background column (default: last column)
    ///     conf_threshold: Minimum score kept (default: 0.05)
    ///     iou_threshold: Per-class NMS threshold (default: 0.5)
    ///     top_k: Maximum detections returned (default: 300)
    ///     parallel: Enable parallel suppression (default: False)
    #[new]
    #[pyo3(signature = (
        num_classes = 21,
        has_background = true,
        background = None,
        conf_threshold = 0.05,
        iou_threshold = 0.5,
        top_k = 300,
        parallel = false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        num_classes: usize,
        has_background: bool,
        background: Option<usize>,
        conf_threshold: f32,
        iou_threshold: f32,
        top_k: usize,
        parallel: bool,
    ) -> PyResult<Self> {
        let background = if has_background {
            Some(background.unwrap_or(num_classes.saturating_sub(1)))
        } else {
            None
        };
        let cfg = RustDetectConfig {
            num_classes,
            background,
            skip_background: true,
            conf_threshold,
            iou_threshold,
            top_k,
            parallel,
        };
        let inner = RustDetector::new(cfg).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Detect from decoded boxes and class scores.
    ///
    /// Args:
    ///     boxes: float32 array (N, 4) shared or (N, 4C) per class
    ///     scores: float32 array (N, C) of class probabilities
    ///
    /// Returns:
    ///     Tuple of (boxes (K, 4), labels (K,), scores (K,))
    fn detect<'py>(
        &self,
        py: Python<'py>,
        boxes: PyReadonlyArray2<'_, f32>,
        scores: PyReadonlyArray2<'_, f32>,
    ) -> PyResult<DetectionArrays<'py>> {
        let per_class = boxes.shape()[1] != 4;
        let flat: Vec<CornerBox> = boxes
            .as_slice()?
            .chunks_exact(4)
            .map(|q| CornerBox::new(q[0], q[1], q[2], q[3]))
            .collect();
        let boxes = if per_class {
            ClassBoxes::PerClass(&flat)
        } else {
            ClassBoxes::Shared(&flat)
        };
        let scores = read_rows(&scores)?;
        let found = self.inner.detect(boxes, &scores).map_err(to_py_err)?;
        detections_to_py(py, found)
    }

    /// Decode head outputs against proposals, then detect.
    ///
    /// Args:
    ///     proposals: float32 array (N, 4) of corner-form proposals
    ///     cls_logits: float32 array (N, C) of raw logits
    ///     deltas: float32 array (N, 4) or (N, 4C) of offsets
    ///     clip: clamp decoded boxes to [0, 1] (normalized proposals only)
    ///
    /// Returns:
    ///     Tuple of (boxes (K, 4), labels (K,), scores (K,))
    #[pyo3(signature = (proposals, cls_logits, deltas, clip = false))]
    fn detect_raw<'py>(
        &self,
        py: Python<'py>,
        proposals: PyReadonlyArray2<'_, f32>,
        cls_logits: PyReadonlyArray2<'_, f32>,
        deltas: PyReadonlyArray2<'_, f32>,
        clip: bool,
    ) -> PyResult<DetectionArrays<'py>> {
        let coder = if clip {
            BoxCoder::unit_clipped()
        } else {
            BoxCoder::unclipped()
        };
        let proposals = read_corners(&proposals)?;
        let cls_logits = read_rows(&cls_logits)?;
        let deltas = read_rows(&deltas)?;
        let found = self
            .inner
            .detect_raw(&coder, &proposals, cls_logits, &deltas)
            .map_err(to_py_err)?;
        detections_to_py(py, found)
    }

    fn __repr__(&self) -> String {
        let cfg = self.inner.config();
        format!(
            "Detector(num_classes={}, background={:?}, conf_threshold={}, top_k={})",
            cfg.num_classes, cfg.background, cfg.conf_threshold, cfg.top_k
        )
    }
}

/// Python module for detector post-processing.
#[pymodule]
fn _detpost(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<RegionProposer>()?;
    m.add_class::<Detector>()?;
    m.add_function(wrap_pyfunction!(iou, m)?)?;
    m.add_function(wrap_pyfunction!(nms, m)?)?;
    m.add_function(wrap_pyfunction!(encode, m)?)?;
    m.add_function(wrap_pyfunction!(decode, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
