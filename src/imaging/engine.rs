//! Raster engine trait and shared types.
//!
//! The [`RasterEngine`] trait defines the two calls the tile pipeline needs:
//! run a conversion, and read the pixel size of an image. Engines are
//! synchronous; a call blocks until the external process exits.
//!
//! The production implementation is
//! [`MagickEngine`](super::magick::MagickEngine), which shells out to
//! ImageMagick's `convert` and `identify`.
//!
//! A non-zero exit status is *not* an error at this level: it comes back as
//! [`EngineOutput`] so callers can inspect the diagnostics. `Err` means the
//! engine could not be run at all, or could not report a geometry.

use super::params::Operation;
use crate::types::Dimensions;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Diagnostic substring that marks a permissions problem on the source.
pub const PERMISSION_DENIED: &str = "Permission denied";

/// Diagnostic substring ImageMagick prints when a trim leaves nothing.
pub const EMPTY_GEOMETRY: &str = "geometry does not contain image";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot determine size of {}: {reason}", path.display())]
    GeometryUnavailable { path: PathBuf, reason: String },
}

/// Exit status and combined stdout/stderr of one engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub status: i32,
    pub diagnostics: String,
}

impl EngineOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(status: i32, diagnostics: impl Into<String>) -> Self {
        Self {
            status,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn mentions(&self, needle: &str) -> bool {
        self.diagnostics.contains(needle)
    }
}

/// Trait for raster engines.
pub trait RasterEngine {
    /// Run one conversion.
    fn execute(&self, operation: &Operation) -> Result<EngineOutput, EngineError>;

    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, EngineError>;
}

impl<E: RasterEngine + ?Sized> RasterEngine for &E {
    fn execute(&self, operation: &Operation) -> Result<EngineOutput, EngineError> {
        (**self).execute(operation)
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, EngineError> {
        (**self).identify(path)
    }
}

/// Repairs access rights after the engine reported [`PERMISSION_DENIED`].
///
/// Returns `true` when something was changed and a retry is worthwhile.
pub trait PermissionRemediation {
    fn remediate(&self, operation: &Operation) -> bool;
}

impl<T: PermissionRemediation + ?Sized> PermissionRemediation for &T {
    fn remediate(&self, operation: &Operation) -> bool {
        (**self).remediate(operation)
    }
}

/// Wraps an engine with a one-shot permission fix and retry.
pub struct RemediatingEngine<E, R> {
    inner: E,
    remediation: R,
}

impl<E: RasterEngine, R: PermissionRemediation> RemediatingEngine<E, R> {
    pub fn new(inner: E, remediation: R) -> Self {
        Self { inner, remediation }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: RasterEngine, R: PermissionRemediation> RasterEngine for RemediatingEngine<E, R> {
    fn execute(&self, operation: &Operation) -> Result<EngineOutput, EngineError> {
        let output = self.inner.execute(operation)?;
        if output.success() || !output.mentions(PERMISSION_DENIED) {
            return Ok(output);
        }
        warn!(source = %operation.source.display(), "permission denied, attempting remediation");
        if self.remediation.remediate(operation) {
            self.inner.execute(operation)
        } else {
            Ok(output)
        }
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, EngineError> {
        self.inner.identify(path)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::Placement;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock engine that records operations without executing them.
    ///
    /// Scripted outputs are consumed in order; once exhausted every call
    /// succeeds.
    #[derive(Default)]
    pub struct MockEngine {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub outputs: Mutex<VecDeque<EngineOutput>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Execute(Operation),
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::default()
            }
        }

        pub fn with_outputs(self, outputs: Vec<EngineOutput>) -> Self {
            *self.outputs.lock().unwrap() = outputs.into();
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn executed(&self) -> Vec<Operation> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Execute(op) => Some(op),
                    RecordedOp::Identify(_) => None,
                })
                .collect()
        }
    }

    impl RasterEngine for MockEngine {
        fn execute(&self, operation: &Operation) -> Result<EngineOutput, EngineError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Execute(operation.clone()));
            Ok(self.outputs.lock().unwrap().pop_front().unwrap_or_default())
        }

        fn identify(&self, path: &Path) -> Result<Dimensions, EngineError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results.lock().unwrap().pop().ok_or_else(|| {
                EngineError::GeometryUnavailable {
                    path: path.to_path_buf(),
                    reason: "No mock dimensions".to_string(),
                }
            })
        }
    }

    struct CountingFix {
        calls: Cell<u32>,
        fixed: bool,
    }

    impl PermissionRemediation for CountingFix {
        fn remediate(&self, _operation: &Operation) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.fixed
        }
    }

    fn op() -> Operation {
        Operation::new(vec![], "/src.jpg", "/dst.png", Placement::Between)
    }

    #[test]
    fn mock_records_identify() {
        let engine = MockEngine::with_dimensions(vec![Dimensions::new(800, 600)]);

        let result = engine.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result, Dimensions::new(800, 600));

        let ops = engine.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_without_dimensions_reports_geometry_unavailable() {
        let engine = MockEngine::new();
        assert!(matches!(
            engine.identify(Path::new("/x.jpg")),
            Err(EngineError::GeometryUnavailable { .. })
        ));
    }

    #[test]
    fn mock_replays_scripted_outputs() {
        let engine = MockEngine::new().with_outputs(vec![EngineOutput::failed(1, "boom")]);
        assert_eq!(engine.execute(&op()).unwrap().status, 1);
        assert!(engine.execute(&op()).unwrap().success());
        assert_eq!(engine.executed().len(), 2);
    }

    #[test]
    fn remediation_retries_once_after_fix() {
        let engine = MockEngine::new()
            .with_outputs(vec![EngineOutput::failed(1, "convert: Permission denied `/src.jpg'")]);
        let fix = CountingFix {
            calls: Cell::new(0),
            fixed: true,
        };
        let wrapped = RemediatingEngine::new(&engine, &fix);

        let out = wrapped.execute(&op()).unwrap();
        assert!(out.success());
        assert_eq!(engine.executed().len(), 2);
        assert_eq!(fix.calls.get(), 1);
    }

    #[test]
    fn remediation_without_fix_returns_original_failure() {
        let engine = MockEngine::new()
            .with_outputs(vec![EngineOutput::failed(1, "Permission denied")]);
        let fix = CountingFix {
            calls: Cell::new(0),
            fixed: false,
        };
        let out = RemediatingEngine::new(&engine, &fix).execute(&op()).unwrap();
        assert_eq!(out.status, 1);
        assert_eq!(engine.executed().len(), 1);
    }

    #[test]
    fn remediation_ignores_other_failures() {
        let engine = MockEngine::new().with_outputs(vec![EngineOutput::failed(1, "no decode delegate")]);
        let fix = CountingFix {
            calls: Cell::new(0),
            fixed: true,
        };
        let out = RemediatingEngine::new(&engine, &fix).execute(&op()).unwrap();
        assert_eq!(out.status, 1);
        assert_eq!(fix.calls.get(), 0);
    }
}
