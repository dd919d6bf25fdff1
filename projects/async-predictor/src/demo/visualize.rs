use crate::demo::types::{BBox, Predictions};
use image::{Rgb, RgbImage};

const PALETTE: [[u8; 3]; 6] = [
    [0, 255, 0],
    [255, 64, 64],
    [64, 160, 255],
    [255, 200, 0],
    [200, 64, 255],
    [0, 220, 220],
];
const LINE_WIDTH: u32 = 2;

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Render box outlines for every detection on a copy of `image`.
pub fn draw_predictions(image: &RgbImage, predictions: &Predictions) -> RgbImage {
    let mut canvas = image.clone();
    for d in &predictions.detections {
        draw_rect(&mut canvas, &d.bbox, class_color(d.class_id));
    }
    canvas
}

fn draw_rect(canvas: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 || bbox.w <= 0.0 || bbox.h <= 0.0 {
        return;
    }

    let x0 = (bbox.x.max(0.0) as u32).min(width - 1);
    let y0 = (bbox.y.max(0.0) as u32).min(height - 1);
    let x1 = ((bbox.x + bbox.w - 1.0).max(0.0) as u32).min(width - 1);
    let y1 = ((bbox.y + bbox.h - 1.0).max(0.0) as u32).min(height - 1);

    for t in 0..LINE_WIDTH {
        for x in x0..=x1 {
            canvas.put_pixel(x, (y0 + t).min(y1), color);
            canvas.put_pixel(x, y1.saturating_sub(t).max(y0), color);
        }
        for y in y0..=y1 {
            canvas.put_pixel((x0 + t).min(x1), y, color);
            canvas.put_pixel(x1.saturating_sub(t).max(x0), y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::types::Detection;

    #[test]
    fn test_draws_outline_only() {
        let image = RgbImage::new(20, 20);
        let predictions = Predictions {
            width: 20,
            height: 20,
            detections: vec![Detection {
                bbox: BBox {
                    x: 4.0,
                    y: 4.0,
                    w: 10.0,
                    h: 10.0,
                },
                score: 0.9,
                class_id: 1,
                class_name: None,
            }],
        };

        let out = draw_predictions(&image, &predictions);
        let color = class_color(1);
        assert_eq!(out.get_pixel(4, 4), &color);
        assert_eq!(out.get_pixel(13, 13), &color);
        assert_eq!(out.get_pixel(5, 9), &color);
        // Interior and outside stay untouched
        assert_eq!(out.get_pixel(9, 9), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        // Source image is not modified
        assert_eq!(image.get_pixel(4, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_boxes_are_clipped_to_canvas() {
        let image = RgbImage::new(8, 8);
        let predictions = Predictions {
            width: 8,
            height: 8,
            detections: vec![Detection {
                bbox: BBox {
                    x: 5.0,
                    y: -3.0,
                    w: 30.0,
                    h: 6.0,
                },
                score: 0.5,
                class_id: 0,
                class_name: None,
            }],
        };

        let out = draw_predictions(&image, &predictions);
        assert_eq!(out.get_pixel(7, 0), &class_color(0));
    }
}
