use crate::demo::types::{BBox, Detection, Predictions};
use crate::pipeline::{Device, Predictor};
use crate::video::Frame;
use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};

pub const CLASS_REGION: usize = 0;
pub const CLASS_HIGHLIGHT: usize = 1;
pub const CLASS_NAMES: [&str; 2] = ["region", "highlight"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum luma for a pixel to belong to a region
    pub threshold: u8,
    /// Components smaller than this many pixels are ignored
    pub min_area: usize,
    /// Regions with a mean luma at or above this are classed as highlights
    pub highlight_threshold: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 128,
            min_area: 4,
            highlight_threshold: 220,
        }
    }
}

/// Stand-in perception model for the demo: finds 4-connected bright regions
/// and reports one detection per region.
pub struct BrightRegionDetector {
    config: DetectorConfig,
    device: Device,
}

impl BrightRegionDetector {
    pub fn new(config: DetectorConfig, device: Device) -> Self {
        tracing::debug!("Loading bright region detector on {}", device);
        Self { config, device }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn detect(&self, frame: &Frame) -> Predictions {
        let gray = imageops::grayscale(frame.image.as_ref());
        let detections = self.label_regions(&gray);

        tracing::trace!(
            "Frame {}: {} regions on {}",
            frame.index,
            detections.len(),
            self.device
        );

        Predictions {
            width: frame.width(),
            height: frame.height(),
            detections,
        }
    }

    fn label_regions(&self, gray: &GrayImage) -> Vec<Detection> {
        let (width, height) = gray.dimensions();
        let mut visited = vec![false; width as usize * height as usize];
        let mut stack = Vec::new();
        let mut detections = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let idx = y as usize * width as usize + x as usize;
                if visited[idx] || gray.get_pixel(x, y).0[0] < self.config.threshold {
                    continue;
                }

                // Flood fill one component
                let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
                let mut area = 0usize;
                let mut luma_sum = 0u64;
                visited[idx] = true;
                stack.push((x, y));

                while let Some((cx, cy)) = stack.pop() {
                    area += 1;
                    luma_sum += gray.get_pixel(cx, cy).0[0] as u64;
                    min_x = min_x.min(cx);
                    min_y = min_y.min(cy);
                    max_x = max_x.max(cx);
                    max_y = max_y.max(cy);

                    let neighbours = [
                        (cx.wrapping_sub(1), cy),
                        (cx + 1, cy),
                        (cx, cy.wrapping_sub(1)),
                        (cx, cy + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx >= width || ny >= height {
                            continue;
                        }
                        let n_idx = ny as usize * width as usize + nx as usize;
                        if !visited[n_idx] && gray.get_pixel(nx, ny).0[0] >= self.config.threshold
                        {
                            visited[n_idx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }

                if area < self.config.min_area {
                    continue;
                }

                let mean_luma = luma_sum as f32 / area as f32;
                let class_id = if mean_luma >= self.config.highlight_threshold as f32 {
                    CLASS_HIGHLIGHT
                } else {
                    CLASS_REGION
                };

                detections.push(Detection {
                    bbox: BBox {
                        x: min_x as f32,
                        y: min_y as f32,
                        w: (max_x - min_x + 1) as f32,
                        h: (max_y - min_y + 1) as f32,
                    },
                    score: mean_luma / 255.0,
                    class_id,
                    class_name: Some(CLASS_NAMES[class_id].to_string()),
                });
            }
        }

        detections
    }
}

impl Predictor<Frame, Predictions> for BrightRegionDetector {
    fn predict(&mut self, frame: Frame) -> anyhow::Result<Predictions> {
        Ok(self.detect(&frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn fill(img: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, shade: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Rgb([shade, shade, shade]));
            }
        }
    }

    #[test]
    fn test_detects_separate_regions() {
        let mut img = RgbImage::new(32, 24);
        fill(&mut img, 2, 3, 5, 4, 160);
        fill(&mut img, 20, 10, 6, 6, 250);
        // Too small to count
        fill(&mut img, 30, 0, 1, 1, 255);

        let detector = BrightRegionDetector::new(DetectorConfig::default(), Device::Cpu);
        let predictions = detector.detect(&Frame::new(0, "test", img));

        assert_eq!((predictions.width, predictions.height), (32, 24));
        assert_eq!(predictions.len(), 2);

        let first = &predictions.detections[0];
        assert_eq!(
            first.bbox,
            BBox {
                x: 2.0,
                y: 3.0,
                w: 5.0,
                h: 4.0
            }
        );
        assert_eq!(first.class_id, CLASS_REGION);
        assert!((first.score - 160.0 / 255.0).abs() < 0.01);

        let second = &predictions.detections[1];
        assert_eq!(second.bbox.area(), 36.0);
        assert_eq!(second.class_id, CLASS_HIGHLIGHT);
        assert_eq!(second.class_name.as_deref(), Some("highlight"));
    }

    #[test]
    fn test_dark_frame_has_no_detections() {
        let img = RgbImage::from_pixel(8, 8, Rgb([40, 40, 40]));
        let mut detector = BrightRegionDetector::new(DetectorConfig::default(), Device::Cpu);
        let predictions = detector.predict(Frame::new(3, "dark", img)).unwrap();
        assert!(predictions.is_empty());
    }

    #[test]
    fn test_regions_touching_the_far_edges() {
        // Wide strip: row-major indexing must not mix up x and y
        let mut img = RgbImage::new(300, 3);
        fill(&mut img, 296, 0, 4, 3, 200);
        fill(&mut img, 0, 2, 3, 1, 200);

        let detector = BrightRegionDetector::new(DetectorConfig::default(), Device::Cpu);
        let predictions = detector.detect(&Frame::new(0, "strip", img));
        assert_eq!(predictions.len(), 1);
        assert_eq!(
            predictions.detections[0].bbox,
            BBox {
                x: 296.0,
                y: 0.0,
                w: 4.0,
                h: 3.0
            }
        );
    }

    #[test]
    fn test_l_shape_is_one_component() {
        let mut img = RgbImage::new(10, 10);
        fill(&mut img, 1, 1, 1, 6, 200);
        fill(&mut img, 1, 6, 6, 1, 200);

        let detector = BrightRegionDetector::new(DetectorConfig::default(), Device::Accelerator(0));
        let predictions = detector.detect(&Frame::new(0, "l", img));
        assert_eq!(predictions.len(), 1);
        assert_eq!(
            predictions.detections[0].bbox,
            BBox {
                x: 1.0,
                y: 1.0,
                w: 6.0,
                h: 6.0
            }
        );
    }
}
