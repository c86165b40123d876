//! Shared test utilities for the sku-tiles test suite.
//!
//! Builds descriptors without the date-dependent name filter and creates
//! placeholder files inside temp directories.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let desc = sharded(tmp.path(), "3080240112_01.jpg");
//! make_file(&desc.path());
//! assert_files(&tmp.path().join("30802401/3080240112"), &["3080240112_01.jpg"]);
//! ```

use std::fs;
use std::path::Path;

use crate::naming::ImageDescriptor;
use crate::normalize::Passthrough;

// =========================================================================
// Descriptors
// =========================================================================

/// Parse `name` without normalisation, placed directly in `dir`.
pub fn plain(dir: &Path, name: &str) -> ImageDescriptor {
    ImageDescriptor::parse_with(name, &Passthrough).with_directory(dir.to_string_lossy())
}

/// Parse `name` without normalisation, sharded below `root`.
pub fn sharded(root: &Path, name: &str) -> ImageDescriptor {
    plain(root, name).into_sharded()
}

// =========================================================================
// Files
// =========================================================================

/// Create a small file, including missing parent directories.
pub fn make_file(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"placeholder").unwrap();
}

/// Sorted names of the regular files directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert `dir` contains exactly `expected` (any order).
pub fn assert_files(dir: &Path, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(
        file_names(dir),
        expected,
        "unexpected files in {}",
        dir.display()
    );
}
