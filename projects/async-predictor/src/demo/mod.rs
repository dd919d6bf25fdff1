// Visual-inference demo: runs the detector over frames, sequentially or
// through the async predictor pool, and renders annotated output.

pub mod detector;
pub mod filter;
pub mod types;
pub mod visualize;

use crate::pipeline::types::device_for_worker;
use crate::pipeline::{AsyncPredictor, Device, PredictorConfig, SyncFrames};
use crate::video::Frame;
use anyhow::{Context, Result};
use detector::{BrightRegionDetector, DetectorConfig};
use filter::{filter_detections, ClassFilter};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use types::Predictions;
use visualize::draw_predictions;

pub use types::{BBox, Detection};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub detector: DetectorConfig,
    pub predictor: PredictorConfig,
    /// Boxes with a side at or below this many pixels are dropped
    pub not_empty_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_filter: Option<ClassFilter>,
    /// Look-ahead depth for the parallel video driver; defaults to 5 per worker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            predictor: PredictorConfig::default(),
            not_empty_threshold: 5.0,
            class_filter: None,
            buffer_size: None,
        }
    }
}

impl DemoConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read demo config: {:?}", path))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid demo config: {:?}", path))?;
        Ok(config)
    }
}

/// A frame together with its (filtered) predictions and rendering
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub predictions: Predictions,
    pub rendered: RgbImage,
}

enum Backend {
    Sequential(BrightRegionDetector),
    Parallel(AsyncPredictor<Frame, Predictions>),
}

pub struct VisualizationDemo {
    backend: Backend,
    config: DemoConfig,
}

impl VisualizationDemo {
    /// `parallel` runs the model in a pool of predict workers so rendering on
    /// the caller's thread overlaps with inference.
    pub fn new(config: DemoConfig, parallel: bool) -> Result<Self> {
        let backend = if parallel {
            let detector_config = config.detector.clone();
            let predictor = AsyncPredictor::new(&config.predictor, move |device| {
                Ok(BrightRegionDetector::new(detector_config.clone(), device))
            })
            .context("Failed to start async predictor")?;
            Backend::Parallel(predictor)
        } else {
            let device = device_for_worker(config.predictor.num_accelerators, 0);
            Backend::Sequential(BrightRegionDetector::new(config.detector.clone(), device))
        };

        Ok(Self { backend, config })
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.backend, Backend::Parallel(_))
    }

    pub fn devices(&self) -> Vec<Device> {
        match &self.backend {
            Backend::Sequential(detector) => vec![detector.device()],
            Backend::Parallel(predictor) => predictor.devices(),
        }
    }

    /// Predict, filter and render one frame. Returns `None` when nothing is
    /// left after filtering.
    pub fn run_on_image(&mut self, frame: &Frame) -> Result<Option<(Predictions, RgbImage)>> {
        let raw = match &mut self.backend {
            Backend::Sequential(detector) => detector.detect(frame),
            Backend::Parallel(predictor) => predictor.predict(frame.clone())?,
        };

        let predictions = filter_detections(
            &raw,
            self.config.not_empty_threshold,
            self.config.class_filter.as_ref(),
        );
        if predictions.is_empty() {
            return Ok(None);
        }

        let rendered = draw_predictions(&frame.image, &predictions);
        Ok(Some((predictions, rendered)))
    }

    /// Annotate every frame of `frames`, yielding them in input order.
    pub fn run_on_video<'a, S>(
        &'a mut self,
        frames: S,
    ) -> Box<dyn Iterator<Item = Result<AnnotatedFrame>> + 'a>
    where
        S: Iterator<Item = Frame> + 'a,
    {
        let Self { backend, config } = self;
        let config: &DemoConfig = config;

        match backend {
            Backend::Parallel(predictor) => {
                let buffer_size = config
                    .buffer_size
                    .unwrap_or_else(|| predictor.default_buffer_size());
                Box::new(
                    predictor
                        .run_buffered(frames, buffer_size)
                        .map(move |(frame, prediction)| annotate(frame, prediction?, config)),
                )
            }
            Backend::Sequential(detector) => {
                let detector: &BrightRegionDetector = detector;
                let predict =
                    move |frame: Frame| -> Result<Predictions> { Ok(detector.detect(&frame)) };
                Box::new(
                    SyncFrames::new(predict, frames)
                        .map(move |(frame, prediction)| annotate(frame, prediction?, config)),
                )
            }
        }
    }

    /// Stop the worker pool (if any) and wait for it to exit.
    pub fn finish(self) -> Result<()> {
        match self.backend {
            Backend::Parallel(predictor) => predictor.join(),
            Backend::Sequential(_) => Ok(()),
        }
    }
}

fn annotate(frame: Frame, raw: Predictions, config: &DemoConfig) -> Result<AnnotatedFrame> {
    let predictions = filter_detections(
        &raw,
        config.not_empty_threshold,
        config.class_filter.as_ref(),
    );
    let rendered = draw_predictions(&frame.image, &predictions);
    Ok(AnnotatedFrame {
        frame,
        predictions,
        rendered,
    })
}
