use crate::demo::AnnotatedFrame;
use crate::run_artifacts::{DetectionsFile, FrameRecord, RunMetadata, RunSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Create `<output_root>/<run_id>/` and write its metadata.json. Refuses to
/// reuse an existing run directory.
pub fn create_run(
    output_root: &Path,
    input: &Path,
    parallel: bool,
    devices: Vec<String>,
) -> Result<RunMetadata> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid input name: {:?}", input))?;

    let output_dir = output_root.join(stem);
    if output_dir.exists() {
        return Err(anyhow::anyhow!(
            "Output directory already exists for: {}",
            stem
        ));
    }

    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create run directory {:?}", output_dir))?;

    let metadata = RunMetadata {
        run_id: stem.to_string(),
        input: input.to_string_lossy().to_string(),
        created_at: Utc::now(),
        parallel,
        devices,
        output_dir: output_dir.clone(),
    };

    let metadata_path = output_dir.join("metadata.json");
    let content = serde_json::to_string_pretty(&metadata)?;
    fs::write(metadata_path, content)?;

    tracing::info!("Created run {} at {:?}", metadata.run_id, output_dir);
    Ok(metadata)
}

/// Writes annotated frames as they arrive and collects detections.json.
pub struct RunWriter {
    output_dir: PathBuf,
    frames_dir: Option<PathBuf>,
    records: Vec<FrameRecord>,
}

impl RunWriter {
    pub fn new(metadata: &RunMetadata, save_frames: bool) -> Result<Self> {
        let frames_dir = if save_frames {
            let dir = metadata.output_dir.join("frames");
            fs::create_dir_all(&dir)?;
            Some(dir)
        } else {
            None
        };

        Ok(Self {
            output_dir: metadata.output_dir.clone(),
            frames_dir,
            records: Vec::new(),
        })
    }

    pub fn write(&mut self, annotated: &AnnotatedFrame) -> Result<()> {
        let rendered = match &self.frames_dir {
            Some(dir) => {
                let filename = format!("frame_{:06}.png", annotated.frame.index);
                let path = dir.join(&filename);
                annotated
                    .rendered
                    .save(&path)
                    .with_context(|| format!("Failed to write frame image {}", filename))?;
                Some(filename)
            }
            None => None,
        };

        self.records.push(FrameRecord {
            index: annotated.frame.index,
            name: annotated.frame.name.clone(),
            detections: annotated.predictions.detections.clone(),
            rendered,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write detections.json and return the run totals.
    pub fn finish(self, elapsed: Duration) -> Result<RunSummary> {
        let secs = elapsed.as_secs_f64();
        let summary = RunSummary {
            frames: self.records.len(),
            frames_with_detections: self
                .records
                .iter()
                .filter(|r| !r.detections.is_empty())
                .count(),
            detections: self.records.iter().map(|r| r.detections.len()).sum(),
            elapsed_secs: secs,
            fps: if secs > 0.0 {
                self.records.len() as f64 / secs
            } else {
                0.0
            },
        };

        let file = DetectionsFile {
            summary: summary.clone(),
            frames: self.records,
        };
        let results_path = self.output_dir.join("detections.json");
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(results_path, json)?;

        Ok(summary)
    }
}
