pub mod image_dir_reader;
pub mod processor;

use anyhow::Result;
use image::RgbImage;
use std::sync::Arc;

/// A decoded frame. The pixel buffer is shared, so clones are cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub name: String,
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(index: usize, name: impl Into<String>, image: RgbImage) -> Self {
        Self {
            index,
            name: name.into(),
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

pub trait FrameSource: Send {
    fn frame_count(&self) -> usize;
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Adapts a [`FrameSource`] into an iterator. The stream ends at the first
/// read error, which is kept and reported by [`Frames::finish`].
pub struct Frames<R> {
    reader: R,
    error: Option<anyhow::Error>,
}

impl<R: FrameSource> Frames<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            error: None,
        }
    }

    /// Fails if the stream stopped on a read error rather than at the end
    /// of the source.
    pub fn finish(&mut self) -> Result<()> {
        match self.error.take() {
            Some(e) => Err(e.context("Frame stream ended early")),
            None => Ok(()),
        }
    }
}

impl<R: FrameSource> Iterator for Frames<R> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.error.is_some() {
            return None;
        }
        match self.reader.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Stopping frame stream: {:#}", e);
                self.error = Some(e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::image_dir_reader::ImageDirReader;
    use super::*;
    use image::Rgb;

    #[test]
    fn test_corrupt_frame_fails_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([1, 1, 1]))
            .save(dir.path().join("frame_001.png"))
            .unwrap();
        std::fs::write(dir.path().join("frame_002.png"), b"not a png").unwrap();
        RgbImage::from_pixel(4, 4, Rgb([3, 3, 3]))
            .save(dir.path().join("frame_003.png"))
            .unwrap();

        let reader = ImageDirReader::new(dir.path()).unwrap();
        let mut frames = Frames::new(reader);
        let names: Vec<String> = frames.by_ref().map(|f| f.name).collect();

        assert_eq!(names, vec!["frame_001".to_string()]);
        assert!(frames.next().is_none());
        let err = frames.finish().unwrap_err();
        assert!(format!("{:#}", err).contains("frame_002"));
        assert!(frames.finish().is_ok());
    }

    #[test]
    fn test_clean_stream_finishes_ok() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            RgbImage::new(2, 2)
                .save(dir.path().join(format!("f{}.png", i)))
                .unwrap();
        }

        let mut frames = Frames::new(ImageDirReader::new(dir.path()).unwrap());
        assert_eq!(frames.by_ref().count(), 3);
        assert!(frames.finish().is_ok());
    }
}
