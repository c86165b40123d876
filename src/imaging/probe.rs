//! Empty-form probe.
//!
//! Checks whether a drawn shape covers any non-white pixel of an image: the
//! image is used as fill pattern for the shape on a white canvas, and the
//! result is trimmed with a generous fuzz. If nothing survives the trim the
//! engine reports [`EMPTY_GEOMETRY`](super::engine::EMPTY_GEOMETRY).
//!
//! ```text
//! convert -size 180x225 xc:white -fill 292990_01_Gallery.png \
//!         -draw "circle 30,110 32,82" -fuzz 50% -trim /tmp/i1a2b3c.png
//! ```

use super::engine::{EMPTY_GEOMETRY, EngineError, RasterEngine};
use super::params::{Operation, Placement};
use crate::types::Dimensions;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Build the probe operation writing to `scratch`.
pub fn plan_empty_form(image: &Path, canvas: Dimensions, draw: &str, scratch: &Path) -> Operation {
    Operation::new(
        vec![
            "-fill".to_string(),
            image.to_string_lossy().into_owned(),
            "-draw".to_string(),
            draw.to_string(),
            "-fuzz".to_string(),
            "50%".to_string(),
            "-trim".to_string(),
        ],
        "xc:white",
        scratch,
        Placement::Between,
    )
    .with_settings(vec!["-size".to_string(), canvas.to_string()])
}

/// True when the shape described by `draw` covers only white in `image`.
///
/// The scratch output is removed afterwards whatever the outcome.
pub fn probe_empty_form(
    engine: &impl RasterEngine,
    image: &Path,
    canvas: Dimensions,
    draw: &str,
) -> Result<bool, EngineError> {
    let scratch = scratch_path();
    let output = engine.execute(&plan_empty_form(image, canvas, draw, &scratch));
    let _ = fs::remove_file(&scratch);
    Ok(output?.mentions(EMPTY_GEOMETRY))
}

fn scratch_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("i{:x}{:x}.png", process::id(), nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::engine::EngineOutput;
    use crate::imaging::engine::tests::MockEngine;

    #[test]
    fn probe_command_layout() {
        let op = plan_empty_form(
            Path::new("/img/292990_01_Gallery.png"),
            Dimensions::new(180, 225),
            "circle 30,110 32,82",
            Path::new("/tmp/probe.png"),
        );
        assert_eq!(
            op.command_line("convert"),
            "convert -size 180x225 xc:white -fill /img/292990_01_Gallery.png \
             -draw 'circle 30,110 32,82' -fuzz 50% -trim /tmp/probe.png"
        );
    }

    #[test]
    fn empty_when_engine_reports_empty_geometry() {
        let engine = MockEngine::new().with_outputs(vec![EngineOutput::failed(
            1,
            "convert: geometry does not contain image `xc:white' @ warning/attribute.c/GetImageBoundingBox/247.",
        )]);
        let empty = probe_empty_form(
            &engine,
            Path::new("/img/a.png"),
            Dimensions::new(10, 10),
            "point 1,1",
        )
        .unwrap();
        assert!(empty);
    }

    #[test]
    fn not_empty_on_clean_run() {
        let engine = MockEngine::new();
        let empty = probe_empty_form(
            &engine,
            Path::new("/img/a.png"),
            Dimensions::new(10, 10),
            "point 1,1",
        )
        .unwrap();
        assert!(!empty);
        assert_eq!(engine.executed()[0].settings, ["-size", "10x10"]);
    }
}
