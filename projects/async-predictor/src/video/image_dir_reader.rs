use super::{Frame, FrameSource};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Reads a directory of still images (sorted by path) as a frame stream.
/// A path to a single image is a one-frame stream.
pub struct ImageDirReader {
    paths: Vec<PathBuf>,
    position: usize,
}

impl ImageDirReader {
    pub fn new(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Input not found: {:?}", path));
        }

        let paths = if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            list_images(path)
        };

        if paths.is_empty() {
            return Err(anyhow!("No images found under {:?}", path));
        }

        tracing::info!(
            "ImageDirReader: opened {:?}, {} frames",
            path,
            paths.len()
        );

        Ok(Self { paths, position: 0 })
    }
}

impl FrameSource for ImageDirReader {
    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.position) else {
            return Ok(None);
        };

        let image = image::open(path)
            .with_context(|| format!("Failed to decode image at: {:?}", path))?
            .to_rgb8();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let frame = Frame::new(self.position, name, image);
        self.position += 1;
        Ok(Some(frame))
    }
}

pub fn list_images(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| IMAGE_EXTENSIONS.contains(&s.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_image(path: &Path, shade: u8) {
        RgbImage::from_pixel(4, 3, Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_reads_images_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("frame_002.png"), 20);
        write_image(&dir.path().join("frame_001.png"), 10);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut reader = ImageDirReader::new(dir.path()).unwrap();
        assert_eq!(reader.frame_count(), 2);

        let first = reader.next_frame().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.name, "frame_001");
        assert_eq!(first.image.get_pixel(0, 0), &Rgb([10, 10, 10]));
        assert_eq!((first.width(), first.height()), (4, 3));

        let second = reader.next_frame().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.name, "frame_002");

        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_single_file_and_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        write_image(&path, 99);

        let reader = ImageDirReader::new(&path).unwrap();
        assert_eq!(reader.frame_count(), 1);

        assert!(ImageDirReader::new(&dir.path().join("missing")).is_err());

        let empty = tempfile::tempdir().unwrap();
        assert!(ImageDirReader::new(empty.path()).is_err());
    }
}
