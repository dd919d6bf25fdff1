use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct ProcessingStats {
    pub processed_frames: usize,
    pub duration: Duration,
}

impl ProcessingStats {
    pub fn fps(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.processed_frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// A trait for handling processed frames. This separates "what to do with a
/// result" from the logic that produces results in order.
pub trait FrameProcessor<T> {
    fn process(&mut self, item: T) -> Result<()>;
}

/// Blanket implementation so any closure with the right signature
/// automatically implements FrameProcessor.
impl<F, T> FrameProcessor<T> for F
where
    F: FnMut(T) -> Result<()>,
{
    fn process(&mut self, item: T) -> Result<()> {
        self(item)
    }
}

pub fn progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} fps, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Feed every item from `items` to `processor`, ticking `pb` per item.
pub fn process_frames<I, T, P>(items: I, pb: &ProgressBar, mut processor: P) -> Result<ProcessingStats>
where
    I: IntoIterator<Item = T>,
    P: FrameProcessor<T>,
{
    let start_time = Instant::now();
    let mut processed_frames = 0;

    for item in items {
        processor.process(item)?;
        processed_frames += 1;
        pb.inc(1);
    }

    pb.finish_with_message("Done");

    Ok(ProcessingStats {
        processed_frames,
        duration: start_time.elapsed(),
    })
}
