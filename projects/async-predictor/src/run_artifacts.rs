// Run artifact struct definitions
//
// This module contains the struct definitions for artifacts that are persisted
// as JSON files within a run's output directory.

use crate::demo::Detection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Run metadata as stored in metadata.json
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunMetadata {
    pub run_id: String,
    pub input: String,
    pub created_at: DateTime<Utc>,
    pub parallel: bool,
    pub devices: Vec<String>,
    #[serde(skip)]
    pub output_dir: PathBuf,
}

/// One entry of detections.json
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FrameRecord {
    pub index: usize,
    pub name: String,
    pub detections: Vec<Detection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

/// Totals written alongside the per-frame records
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RunSummary {
    pub frames: usize,
    pub frames_with_detections: usize,
    pub detections: usize,
    pub elapsed_secs: f64,
    pub fps: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DetectionsFile {
    pub summary: RunSummary,
    pub frames: Vec<FrameRecord>,
}
