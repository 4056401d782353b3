//! Where results are written

use crate::config::DEFAULT_OUTPUT_DIR;
use crate::error::{BgRemovalError, Result};
use crate::types::RemovalResult;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Output directory holding one `<stem>.png` per input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl OutputLayout {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory if it does not exist
    ///
    /// # Errors
    /// - Directory cannot be created
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| BgRemovalError::file_io_error("create output directory", &self.dir, &e))
    }

    /// `dir/<input stem>.png`, or `dir/output.png` when the input has no stem
    #[must_use]
    pub fn path_for(&self, input: &Path) -> PathBuf {
        let mut name = input
            .file_stem()
            .map_or_else(|| OsString::from("output"), OsStr::to_os_string);
        name.push(".png");
        self.dir.join(name)
    }

    /// Write `result` as the PNG for `input`
    ///
    /// # Errors
    /// - Encoding or write failures
    pub fn save(&self, result: &RemovalResult, input: &Path) -> Result<PathBuf> {
        let output_path = self.path_for(input);
        result.save_png(&output_path)?;
        Ok(output_path)
    }

    /// Output paths that more than one input maps to, with those inputs
    #[must_use]
    pub fn collisions<'a, I>(&self, inputs: I) -> Vec<(PathBuf, Vec<PathBuf>)>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut by_output: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for input in inputs {
            by_output
                .entry(self.path_for(input))
                .or_default()
                .push(input.to_path_buf());
        }

        by_output
            .into_iter()
            .filter(|(_, inputs)| inputs.len() > 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProcessingTimings, SegmentationMask};
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_path_for_uses_stem() {
        let layout = OutputLayout::default();
        assert_eq!(layout.dir(), Path::new("output"));
        assert_eq!(
            layout.path_for(Path::new("/photos/cat.final.JPG")),
            PathBuf::from("output/cat.final.png")
        );
        assert_eq!(layout.path_for(Path::new("/")), PathBuf::from("output/output.png"));
    }

    #[cfg(unix)]
    #[test]
    fn test_path_for_keeps_non_utf8_stems_distinct() {
        use std::os::unix::ffi::OsStrExt;

        let layout = OutputLayout::new("out");
        let acute = Path::new(OsStr::from_bytes(b"caf\xe9.jpg"));
        let grave = Path::new(OsStr::from_bytes(b"caf\xe8.jpg"));
        let first = layout.path_for(acute);
        let second = layout.path_for(grave);

        assert_ne!(first, second);
        assert_eq!(first, Path::new("out").join(OsStr::from_bytes(b"caf\xe9.png")));
        assert!(layout.collisions([acute, grave]).is_empty());
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path().join("a/b"));
        layout.ensure_dir().unwrap();
        layout.ensure_dir().unwrap();
        assert!(layout.dir().is_dir());
    }

    #[test]
    fn test_save_writes_rgba_png() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        let result = RemovalResult {
            image: RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 128])),
            mask: SegmentationMask::new(vec![128; 6], (3, 2)),
            original_dimensions: (3, 2),
            timings: ProcessingTimings::default(),
        };

        let saved = layout.save(&result, Path::new("in/photo.jpg")).unwrap();
        assert_eq!(saved, temp.path().join("photo.png"));

        let reloaded = image::open(&saved).unwrap().to_rgba8();
        assert_eq!(reloaded.get_pixel(0, 0), &Rgba([1, 2, 3, 128]));
    }

    #[test]
    fn test_collisions() {
        let layout = OutputLayout::default();
        let inputs = [
            Path::new("a/photo.jpg"),
            Path::new("b/photo.png"),
            Path::new("a/other.jpg"),
        ];

        let collisions = layout.collisions(inputs);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].0, PathBuf::from("output/photo.png"));
        assert_eq!(collisions[0].1.len(), 2);
    }
}
