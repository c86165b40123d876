//! ImageMagick engine: shells out to `convert` and `identify`.
//!
//! | Call | Implementation |
//! |---|---|
//! | **Execute** | `convert` with [`Operation::argv`], stdout + stderr captured |
//! | **Identify** | `image::image_dimensions` header probe, `identify -ping` as fallback |
//!
//! Arguments are passed to the process directly, never through a shell; the
//! escaped [`Operation::command_line`] only goes to the debug log.

use super::engine::{EngineError, EngineOutput, RasterEngine};
use super::params::Operation;
use crate::config::EngineConfig;
use crate::types::Dimensions;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// `identify` format printing `W H`.
const IDENTIFY_FORMAT: &str = "%[fx:w] %[fx:h]";

/// Runs the ImageMagick command line tools.
#[derive(Debug, Clone)]
pub struct MagickEngine {
    convert: PathBuf,
    identify: PathBuf,
}

impl MagickEngine {
    pub fn new(convert: impl Into<PathBuf>, identify: impl Into<PathBuf>) -> Self {
        Self {
            convert: convert.into(),
            identify: identify.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.convert, &config.identify)
    }

    fn identify_with_magick(&self, path: &Path) -> Result<Dimensions, EngineError> {
        let unavailable = |reason: String| EngineError::GeometryUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        let output = Command::new(&self.identify)
            .args(["-ping", "-format", IDENTIFY_FORMAT])
            .arg(path)
            .output()
            .map_err(|e| unavailable(format!("cannot run {}: {e}", self.identify.display())))?;
        let result = to_engine_output(&output);
        if !result.success() {
            return Err(unavailable(result.diagnostics));
        }
        parse_identify_output(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| unavailable(format!("unexpected identify output: {}", result.diagnostics)))
    }
}

impl Default for MagickEngine {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl RasterEngine for MagickEngine {
    fn execute(&self, operation: &Operation) -> Result<EngineOutput, EngineError> {
        debug!(
            command = %operation.command_line(&self.convert.to_string_lossy()),
            "running convert"
        );
        let output = Command::new(&self.convert).args(operation.argv()).output()?;
        Ok(to_engine_output(&output))
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, EngineError> {
        match image::image_dimensions(path) {
            Ok((width, height)) => Ok(Dimensions::new(width, height)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "header probe failed, asking identify");
                self.identify_with_magick(path)
            }
        }
    }
}

fn to_engine_output(output: &Output) -> EngineOutput {
    let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
    diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
    EngineOutput {
        // killed by a signal
        status: output.status.code().unwrap_or(-1),
        diagnostics,
    }
}

/// Parse `W H` as printed with [`IDENTIFY_FORMAT`]. Multi-frame files print
/// one pair per frame; the first one wins.
fn parse_identify_output(stdout: &str) -> Option<Dimensions> {
    let mut numbers = stdout.split_whitespace().map(str::parse::<u32>);
    match (numbers.next()?, numbers.next()?) {
        (Ok(width), Ok(height)) => Some(Dimensions::new(width, height)),
        _ => None,
    }
}
