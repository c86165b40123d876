//! File operations on the image tree.
//!
//! Everything that touches the disk on behalf of a descriptor lives here:
//! creating the sharded directory, moving uploads into the tree, copying a
//! file into several trees and finding a sibling with another extension.
//!
//! Target files are overwritten without asking. Two descriptors for the same
//! file are not coordinated; callers that need exclusivity serialize.

use crate::naming::{ImageDescriptor, easy_file_name_with};
use crate::normalize::{NameFilter, Passthrough};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source file does not exist: {}", .0.display())]
    MissingSource(PathBuf),
}

/// Create the descriptor's directory (with shard segments) if needed.
pub fn ensure_directory(desc: &ImageDescriptor) -> Result<PathBuf, StoreError> {
    let dir = PathBuf::from(desc.directory());
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Move `from` to the descriptor's path, replacing an existing file.
pub fn move_file(from: &Path, to: &ImageDescriptor) -> Result<PathBuf, StoreError> {
    ensure_directory(to)?;
    let target = to.path();
    if target == from {
        return Ok(target);
    }
    if target.exists() {
        fs::remove_file(&target)?;
    }
    if let Err(e) = fs::rename(from, &target) {
        // different file systems
        debug!(from = %from.display(), error = %e, "rename failed, copying");
        fs::copy(from, &target)?;
        fs::remove_file(from)?;
    }
    Ok(target)
}

/// Move every `*.extension` file directly inside `from_dir` into the sharded
/// tree below `root`. `remove` is cut out of each file name first (e.g. a
/// `-edited` suffix a retouching tool appended). Returns the number of
/// files moved.
pub fn move_to_tree(
    from_dir: &Path,
    root: &Path,
    extension: &str,
    remove: &str,
) -> Result<usize, StoreError> {
    let mut count = 0;
    for entry in WalkDir::new(from_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, extension) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let name = if remove.is_empty() {
            name.to_string()
        } else {
            name.replace(remove, "")
        };
        let dest = ImageDescriptor::parse_with(&name, &Passthrough)
            .into_sharded()
            .with_directory(root.to_string_lossy());
        let target = move_file(path, &dest)?;
        info!(from = %path.display(), to = %target.display(), "moved into tree");
        count += 1;
    }
    Ok(count)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}

/// Copy the descriptor's file below each root, keeping its layout.
/// Returns the written paths.
pub fn copy_to(desc: &ImageDescriptor, roots: &[PathBuf]) -> Result<Vec<PathBuf>, StoreError> {
    let source = desc.path();
    if !source.is_file() {
        return Err(StoreError::MissingSource(source));
    }
    let mut written = Vec::with_capacity(roots.len());
    for root in roots {
        let target_desc = desc.clone().with_directory(root.to_string_lossy());
        ensure_directory(&target_desc)?;
        let target = target_desc.path();
        if target.exists() {
            fs::remove_file(&target)?;
        }
        fs::copy(&source, &target)?;
        debug!(to = %target.display(), "copied");
        written.push(target);
    }
    Ok(written)
}

/// Find a sibling on disk that matches `desc` with one of `extensions`.
///
/// SKU, qualifier and tile fields must match. The color must match when
/// `desc` has one and is taken from the file otherwise; likewise a missing
/// image number adopts the one found. Files are tried in name order, and
/// the first file with any listed extension wins.
pub fn find_existing(
    desc: &ImageDescriptor,
    extensions: &[&str],
) -> Result<Option<ImageDescriptor>, StoreError> {
    let directory = desc.directory();
    let dir = if directory.is_empty() {
        Path::new(".")
    } else {
        Path::new(&directory)
    };
    if extensions.is_empty() || !dir.is_dir() {
        return Ok(None);
    }

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let found = ImageDescriptor::parse_with(name, &Passthrough);
        if !same_image(desc, &found) {
            continue;
        }
        if let Some(ext) = extensions.iter().find(|ext| **ext == found.extension()) {
            let number = desc.image_number().or(found.image_number());
            return Ok(Some(
                desc.clone()
                    .with_extension(*ext)
                    .with_color(found.color().cloned())
                    .with_image_number(number),
            ));
        }
    }
    Ok(None)
}

fn same_image(wanted: &ImageDescriptor, found: &ImageDescriptor) -> bool {
    wanted.sku() == found.sku()
        && wanted.qualifier() == found.qualifier()
        && wanted.tile_template() == found.tile_template()
        && wanted.tile_index() == found.tile_index()
        && (wanted.color().is_none() || wanted.color() == found.color())
        && (wanted.image_number().is_none() || wanted.image_number() == found.image_number())
}

/// Tidy an uploaded file's name and rename it on disk when the tidy name
/// differs.
pub fn easy_rename(path: &Path, filter: &dyn NameFilter) -> Result<ImageDescriptor, StoreError> {
    let tidy = easy_file_name_with(&path.to_string_lossy(), filter);
    if tidy.path() != path {
        if !path.is_file() {
            return Err(StoreError::MissingSource(path.to_path_buf()));
        }
        move_file(path, &tidy)?;
        info!(from = %path.display(), to = %tidy, "renamed");
    }
    Ok(tidy)
}
