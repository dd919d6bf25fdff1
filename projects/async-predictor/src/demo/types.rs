use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    /// True if both sides are strictly longer than `threshold`
    pub fn is_nonempty(&self, threshold: f32) -> bool {
        self.w > threshold && self.h > threshold
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub score: f32,
    pub class_id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// Model output for one frame
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Predictions {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

impl Predictions {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }
}
