//! The ordered set of images waiting to be processed

use crate::config::DEFAULT_EXTENSIONS;
use crate::error::{BgRemovalError, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// One selected input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Path as given by the user
    pub path: PathBuf,
    /// Canonical path used to detect duplicates
    key: PathBuf,
}

impl SelectedFile {
    fn new(path: PathBuf) -> Self {
        let key = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        Self { path, key }
    }

    /// File name shown to the user
    #[must_use]
    pub fn display_name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

/// What happened to a path passed to [`FileSelection::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Same file is already selected
    Duplicate,
    /// Extension is not accepted
    Unsupported,
    /// Path does not exist or is not a file
    Missing,
}

/// Counts from expanding a list of CLI inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionSummary {
    pub added: usize,
    pub duplicates: usize,
    pub unsupported: usize,
    pub missing: usize,
}

impl SelectionSummary {
    fn record(&mut self, outcome: AddOutcome) {
        match outcome {
            AddOutcome::Added => self.added += 1,
            AddOutcome::Duplicate => self.duplicates += 1,
            AddOutcome::Unsupported => self.unsupported += 1,
            AddOutcome::Missing => self.missing += 1,
        }
    }
}

/// Ordered, de-duplicated list of input images
#[derive(Debug, Clone)]
pub struct FileSelection {
    entries: Vec<SelectedFile>,
    extensions: Vec<String>,
    /// Canonical directories skipped while expanding directories and globs
    excluded: Vec<PathBuf>,
}

impl Default for FileSelection {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl FileSelection {
    /// Selection accepting the given extensions, matched case-insensitively
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            entries: Vec::new(),
            extensions,
            excluded: Vec::new(),
        }
    }

    /// Skip `dir` and everything below it when expanding directories and globs
    ///
    /// Files passed to [`FileSelection::add`] directly are not affected.
    pub fn exclude_dir<P: AsRef<Path>>(&mut self, dir: P) {
        let dir = dir.as_ref();
        let key = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        if !self.excluded.contains(&key) {
            self.excluded.push(key);
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        std::fs::canonicalize(path)
            .is_ok_and(|key| self.excluded.iter().any(|dir| key.starts_with(dir)))
    }

    /// Accepted extensions, lowercase without the dot
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `path` has an accepted extension
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Append one file
    pub fn add<P: AsRef<Path>>(&mut self, path: P) -> AddOutcome {
        let path = path.as_ref();
        if !path.is_file() {
            return AddOutcome::Missing;
        }
        if !self.accepts(path) {
            return AddOutcome::Unsupported;
        }

        let file = SelectedFile::new(path.to_path_buf());
        if self.entries.iter().any(|e| e.key == file.key) {
            return AddOutcome::Duplicate;
        }

        self.entries.push(file);
        AddOutcome::Added
    }

    /// Add the accepted files of a directory in sorted order
    ///
    /// `pattern` filters on the file name, e.g. `"*.jpg"`.
    ///
    /// # Errors
    /// - Directory cannot be read
    /// - Invalid pattern
    pub fn add_directory<P: AsRef<Path>>(
        &mut self,
        dir: P,
        recursive: bool,
        pattern: Option<&str>,
    ) -> Result<usize> {
        Ok(self.expand_directory(dir.as_ref(), recursive, pattern)?.added)
    }

    fn expand_directory(
        &mut self,
        dir: &Path,
        recursive: bool,
        pattern: Option<&str>,
    ) -> Result<SelectionSummary> {
        let pattern = pattern
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    BgRemovalError::invalid_config(format!("Invalid pattern '{}': {}", p, e))
                })
            })
            .transpose()?;

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        // A directory named explicitly is walked even when it is excluded
        let skip_excluded = !self.is_excluded(dir);
        let walker = walkdir::WalkDir::new(dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| {
                !(skip_excluded && e.file_type().is_dir() && self.is_excluded(e.path()))
            });
        for entry in walker {
            let entry = entry.map_err(|e| {
                BgRemovalError::file_io_error("read directory", dir, &std::io::Error::from(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = match (&pattern, entry.file_name().to_str()) {
                (Some(pattern), Some(name)) => pattern.matches(name),
                (Some(_), None) => false,
                (None, _) => true,
            };
            if matches && self.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        let mut summary = SelectionSummary::default();
        for file in files {
            summary.record(self.add(file));
        }
        Ok(summary)
    }

    /// Add every accepted file matching a shell glob
    ///
    /// # Errors
    /// - Invalid glob
    pub fn add_glob(&mut self, pattern: &str) -> Result<usize> {
        Ok(self.expand_glob(pattern)?.added)
    }

    fn expand_glob(&mut self, pattern: &str) -> Result<SelectionSummary> {
        let paths = glob::glob(pattern).map_err(|e| {
            BgRemovalError::invalid_config(format!("Invalid glob '{}': {}", pattern, e))
        })?;

        let mut summary = SelectionSummary::default();
        for path in paths {
            match path {
                Ok(path) if self.is_excluded(&path) => {
                    debug!("Skipping excluded glob match: {}", path.display());
                },
                Ok(path) if path.is_file() => summary.record(self.add(path)),
                Ok(_) => {},
                Err(e) => warn!("Skipping unreadable glob match: {}", e),
            }
        }
        Ok(summary)
    }

    /// Add command-line inputs: files, directories or glob patterns
    ///
    /// Inputs that do not exist are counted as missing and logged.
    ///
    /// # Errors
    /// - Directory cannot be read
    /// - Invalid pattern or glob
    pub fn add_inputs<S: AsRef<str>>(
        &mut self,
        inputs: &[S],
        recursive: bool,
        pattern: Option<&str>,
    ) -> Result<SelectionSummary> {
        let mut summary = SelectionSummary::default();

        for input in inputs {
            let input = input.as_ref();
            let path = Path::new(input);

            let part = if path.is_dir() {
                self.expand_directory(path, recursive, pattern)?
            } else if path.exists() {
                let mut part = SelectionSummary::default();
                let outcome = self.add(path);
                if outcome == AddOutcome::Unsupported {
                    warn!("Skipping unsupported file: {}", input);
                }
                part.record(outcome);
                part
            } else if input.contains(['*', '?', '[']) {
                self.expand_glob(input)?
            } else {
                warn!("Input not found: {}", input);
                let mut part = SelectionSummary::default();
                part.record(AddOutcome::Missing);
                part
            };

            summary.added += part.added;
            summary.duplicates += part.duplicates;
            summary.unsupported += part.unsupported;
            summary.missing += part.missing;
        }

        Ok(summary)
    }

    /// File names in selection order
    #[must_use]
    pub fn display_names(&self) -> Vec<String> {
        self.entries.iter().map(SelectedFile::display_name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SelectedFile> {
        self.entries.iter()
    }

    /// Selected paths in selection order
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Drop every entry, keeping the accepted extensions
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a FileSelection {
    type Item = &'a SelectedFile;
    type IntoIter = std::slice::Iter<'a, SelectedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_add_preserves_order_and_rejects_duplicates() {
        let temp = TempDir::new().unwrap();
        let b = touch(temp.path(), "b.jpg");
        let a = touch(temp.path(), "a.png");

        let mut selection = FileSelection::default();
        assert_eq!(selection.add(&b), AddOutcome::Added);
        assert_eq!(selection.add(&a), AddOutcome::Added);
        assert_eq!(selection.add(&b), AddOutcome::Duplicate);

        assert_eq!(selection.paths(), vec![b, a]);
        assert_eq!(selection.display_names(), vec!["b.jpg", "a.png"]);
    }

    #[test]
    fn test_duplicate_detected_through_different_spelling() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "photo.jpg");
        let sub = temp.path().join("sub");
        fs::create_dir(&sub).unwrap();

        let mut selection = FileSelection::default();
        assert_eq!(selection.add(temp.path().join("photo.jpg")), AddOutcome::Added);
        assert_eq!(
            selection.add(sub.join("..").join("photo.jpg")),
            AddOutcome::Duplicate
        );
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let upper = touch(temp.path(), "IMG_001.JPG");
        let gif = touch(temp.path(), "anim.gif");

        let mut selection = FileSelection::default();
        assert_eq!(selection.add(&upper), AddOutcome::Added);
        assert_eq!(selection.add(&gif), AddOutcome::Unsupported);
        assert_eq!(selection.add(temp.path().join("nope.png")), AddOutcome::Missing);
    }

    #[test]
    fn test_custom_extensions_are_normalized() {
        let selection = FileSelection::new([".WebP", "", "png"]);
        assert_eq!(selection.extensions(), &["webp".to_string(), "png".to_string()]);
        assert!(selection.accepts(Path::new("x.webp")));
        assert!(!selection.accepts(Path::new("x.jpg")));
    }

    #[test]
    fn test_add_directory_sorted_and_recursive() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "c.jpg");
        touch(temp.path(), "a.jpg");
        touch(temp.path(), "notes.txt");
        touch(temp.path(), "nested/b.png");

        let mut flat = FileSelection::default();
        assert_eq!(flat.add_directory(temp.path(), false, None).unwrap(), 2);
        assert_eq!(flat.display_names(), vec!["a.jpg", "c.jpg"]);

        let mut deep = FileSelection::default();
        assert_eq!(deep.add_directory(temp.path(), true, None).unwrap(), 3);
        assert_eq!(deep.display_names(), vec!["a.jpg", "c.jpg", "b.png"]);
    }

    #[test]
    fn test_add_directory_with_pattern() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "cat.jpg");
        touch(temp.path(), "dog.png");

        let mut selection = FileSelection::default();
        assert_eq!(selection.add_directory(temp.path(), false, Some("*.png")).unwrap(), 1);
        assert_eq!(selection.display_names(), vec!["dog.png"]);

        assert!(selection.add_directory(temp.path(), false, Some("[")).is_err());
    }

    #[test]
    fn test_excluded_dir_is_not_walked() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.jpg");
        touch(temp.path(), "output/a.png");
        touch(temp.path(), "output/nested/b.png");

        let mut selection = FileSelection::default();
        selection.exclude_dir(temp.path().join("output"));
        assert_eq!(selection.add_directory(temp.path(), true, None).unwrap(), 1);
        assert_eq!(selection.display_names(), vec!["a.jpg"]);

        let pattern = format!("{}/output/*.png", temp.path().display());
        assert_eq!(selection.add_glob(&pattern).unwrap(), 0);

        let mut direct = FileSelection::default();
        direct.exclude_dir(temp.path().join("output"));
        assert_eq!(direct.add_directory(temp.path().join("output"), true, None).unwrap(), 2);
    }

    #[test]
    fn test_add_glob() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "one.jpg");
        touch(temp.path(), "two.jpg");
        touch(temp.path(), "three.png");

        let mut selection = FileSelection::default();
        let pattern = format!("{}/*.jpg", temp.path().display());
        assert_eq!(selection.add_glob(&pattern).unwrap(), 2);
    }

    #[test]
    fn test_add_inputs_mixes_kinds_and_counts_missing() {
        let temp = TempDir::new().unwrap();
        let single = touch(temp.path(), "single.jpg");
        let dir = temp.path().join("dir");
        touch(&dir, "x.png");
        touch(&dir, "y.jpeg");
        touch(temp.path(), "readme.md");

        let inputs = vec![
            single.display().to_string(),
            dir.display().to_string(),
            temp.path().join("missing.jpg").display().to_string(),
            temp.path().join("readme.md").display().to_string(),
            single.display().to_string(),
        ];

        let mut selection = FileSelection::default();
        let summary = selection.add_inputs(&inputs, false, None).unwrap();
        assert_eq!(
            summary,
            SelectionSummary {
                added: 3,
                duplicates: 1,
                unsupported: 1,
                missing: 1,
            }
        );
        assert_eq!(selection.display_names(), vec!["single.jpg", "x.png", "y.jpeg"]);
    }

    #[test]
    fn test_clear_keeps_extensions() {
        let temp = TempDir::new().unwrap();
        let file = touch(temp.path(), "a.webp");

        let mut selection = FileSelection::new(["webp"]);
        selection.add(&file);
        selection.clear();

        assert!(selection.is_empty());
        assert_eq!(selection.extensions(), &["webp".to_string()]);
        assert_eq!(selection.add(&file), AddOutcome::Added);
    }
}
