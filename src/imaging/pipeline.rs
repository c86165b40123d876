//! Tile pipeline: plan, purge, run both stages, clean up.
//!
//! ```text
//! create_tiles(master, spec, dest)
//!   ├─ tile 0 of the set exists, no delete   → skip (no engine call)
//!   ├─ identify master                       → GeometryUnavailable is fatal
//!   ├─ plan_tiles                            → Stage A + Stage B
//!   ├─ purge stale tiles                     → retried with backoff, never fatal
//!   ├─ Stage A: master → intermediate
//!   ├─ Stage B: intermediate → tiles         (only if Stage A succeeded)
//!   └─ remove intermediate                   (always)
//! ```
//!
//! Engine failures are reported through [`TileOutcome::status`], not as
//! errors, and are never retried here.

use super::engine::{EngineError, RasterEngine};
use super::planner::{
    Decision, PlanError, TILE_PLACEHOLDER, TilePlan, decide, explicit_tile_set, first_tile_path,
    is_first_tile_of, plan_tiles,
};
use super::params::TileSpec;
use crate::config::Config;
use crate::naming::ImageDescriptor;
use crate::normalize::Passthrough;
use crate::types::Dimensions;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result of one [`TilePipeline::create_tiles`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileOutcome {
    /// Combined engine status; 0 means every stage that ran succeeded.
    pub status: i32,
    /// Tiles were already present and nothing was done.
    pub skipped: bool,
    /// Tile set pattern (with `%d`) when the pipeline ran.
    pub tiles: Option<ImageDescriptor>,
    pub tile_size: Option<Dimensions>,
    pub stale_removed: Vec<PathBuf>,
    /// Stale tiles that survived every delete attempt.
    pub stale_left: Vec<PathBuf>,
    pub diagnostics: String,
}

impl TileOutcome {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Drives a [`RasterEngine`] through tile plans.
pub struct TilePipeline<E> {
    engine: E,
    intermediate_format: String,
    backoff: Vec<Duration>,
}

impl<E: RasterEngine> TilePipeline<E> {
    pub fn new(engine: E, config: &Config) -> Self {
        Self {
            engine,
            intermediate_format: config.engine.intermediate_format.clone(),
            backoff: config.cleanup.backoff(),
        }
    }

    /// Replace the delete retry schedule (one delay per attempt).
    pub fn with_backoff(self, backoff: Vec<Duration>) -> Self {
        Self { backoff, ..self }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Cut `master` into tiles named after `dest`.
    ///
    /// `dest` supplies directory, SKU, template and extension; its
    /// qualifier is replaced by the tile size and its index by `%d`.
    /// A rerun finds the set by [`find_existing_first_tile`] and skips
    /// before the master is identified.
    pub fn create_tiles(
        &self,
        master: &ImageDescriptor,
        spec: &TileSpec,
        dest: &ImageDescriptor,
    ) -> Result<TileOutcome, PipelineError> {
        spec.validate()?;

        let existing = if spec.delete_existing_first {
            None
        } else {
            find_existing_first_tile(dest, spec)?
        };
        let purge = match decide(spec, existing.is_some()) {
            Decision::Skip => {
                info!(tile = ?existing, "tiles exist, skipping");
                return Ok(TileOutcome {
                    skipped: true,
                    ..TileOutcome::default()
                });
            }
            Decision::Regenerate { purge } => purge,
        };

        let master_size = self.engine.identify(&master.path())?;
        debug!(master = %master, size = %master_size, "identified master");
        let plan = plan_tiles(master, master_size, spec, dest, &self.intermediate_format)?;

        let mut outcome = TileOutcome {
            tiles: Some(plan.tiles.clone()),
            tile_size: Some(plan.geometry.tile),
            ..TileOutcome::default()
        };
        if purge {
            self.purge_stale(&plan.tiles, &mut outcome)?;
        }

        let directory = plan.tiles.directory();
        if !directory.is_empty() {
            fs::create_dir_all(&directory)?;
        }

        self.run_stages(&plan, &mut outcome)?;
        if outcome.success() {
            info!(tiles = %plan.tiles, size = %plan.geometry.tile, "tiles created");
        } else {
            warn!(tiles = %plan.tiles, status = outcome.status, "tile creation failed");
        }
        Ok(outcome)
    }

    fn run_stages(&self, plan: &TilePlan, outcome: &mut TileOutcome) -> Result<(), PipelineError> {
        let _cleanup = RemoveOnDrop(plan.intermediate.path());

        let stage_a = self.engine.execute(&plan.stage_a)?;
        outcome.status |= stage_a.status;
        outcome.diagnostics.push_str(&stage_a.diagnostics);
        if !stage_a.success() {
            debug!(status = stage_a.status, "stage A failed, not cropping");
            return Ok(());
        }

        let stage_b = self.engine.execute(&plan.stage_b)?;
        outcome.status |= stage_b.status;
        outcome.diagnostics.push_str(&stage_b.diagnostics);
        Ok(())
    }

    fn purge_stale(
        &self,
        tiles: &ImageDescriptor,
        outcome: &mut TileOutcome,
    ) -> Result<(), PipelineError> {
        for path in find_stale_tiles(tiles)? {
            if remove_with_backoff(&path, &self.backoff, |p| fs::remove_file(p)) {
                outcome.stale_removed.push(path);
            } else {
                outcome.stale_left.push(path);
            }
        }
        Ok(())
    }
}

/// Tile 0 of a set already written for `dest`, looked up without the engine.
///
/// Checked in order: `dest` as given, the set named by an explicit resize,
/// then any `WxH` set of the same image, template and extension in the
/// tile directory. The last step covers auto-derived sizes, whose name
/// depends on the master's pixel size.
pub fn find_existing_first_tile(
    dest: &ImageDescriptor,
    spec: &TileSpec,
) -> io::Result<Option<PathBuf>> {
    let given = first_tile_path(dest);
    if given.is_file() {
        return Ok(Some(given));
    }
    if let Some(tiles) = explicit_tile_set(dest, spec) {
        let first = first_tile_path(&tiles);
        return Ok(first.is_file().then_some(first));
    }

    let found = files_in(&dest.directory())?
        .into_iter()
        .find(|(name, _)| {
            is_first_tile_of(&ImageDescriptor::parse_with(name, &Passthrough), dest, spec)
        });
    Ok(found.map(|(_, path)| path))
}

/// Files in the tile directory matching the tile pattern with any index.
pub fn find_stale_tiles(tiles: &ImageDescriptor) -> io::Result<Vec<PathBuf>> {
    let file_name = tiles.file_name();
    let (prefix, suffix) = file_name
        .split_once(TILE_PLACEHOLDER)
        .unwrap_or((file_name.as_str(), ""));

    Ok(files_in(&tiles.directory())?
        .into_iter()
        .filter(|(name, _)| {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        })
        .map(|(_, path)| path)
        .collect())
}

/// Regular files in `directory` as `(name, path)`, sorted by name.
///
/// A missing directory is empty. Names that are not UTF-8 are skipped.
fn files_in(directory: &str) -> io::Result<Vec<(String, PathBuf)>> {
    let dir = if directory.is_empty() {
        Path::new(".")
    } else {
        Path::new(directory)
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if entry.file_type()?.is_file() {
            files.push((name, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Try `remove` once per entry in `schedule`, sleeping that long first.
///
/// A missing file counts as removed. Returns `false` when every attempt
/// failed; the caller carries on either way.
pub fn remove_with_backoff(
    path: &Path,
    schedule: &[Duration],
    mut remove: impl FnMut(&Path) -> io::Result<()>,
) -> bool {
    for (attempt, delay) in schedule.iter().enumerate() {
        if !delay.is_zero() {
            thread::sleep(*delay);
        }
        match remove(path) {
            Ok(()) => return true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
            Err(e) => debug!(path = %path.display(), attempt, error = %e, "delete failed"),
        }
    }
    warn!(path = %path.display(), "giving up on stale file");
    false
}

/// Removes the intermediate on every exit path out of the stages.
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Ok(()) => debug!(path = %self.0.display(), "removed intermediate"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.0.display(), error = %e, "cannot remove intermediate"),
        }
    }
}
