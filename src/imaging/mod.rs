//! Tile derivation on top of an external raster engine.
//!
//! | Step | Where |
//! |---|---|
//! | **Geometry** | [`calculations`]: permille → tiles across, auto resize, canvas |
//! | **Plan** | [`planner`]: skip decision, Stage A / Stage B operations |
//! | **Run** | [`pipeline`]: purge, execute, clean up |
//! | **Engine** | [`RasterEngine`] trait + [`MagickEngine`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing tile specs and engine calls
//! - **Engine**: [`RasterEngine`] trait, permission remediation, ImageMagick
//! - **Planner / Pipeline**: Combining calculations with engine execution

mod calculations;
pub mod engine;
pub mod magick;
mod params;
pub mod pipeline;
pub mod planner;
pub mod probe;

pub use calculations::{TileGeometry, auto_resize, tile_geometry, tiles_across};
pub use engine::{
    EngineError, EngineOutput, PermissionRemediation, RasterEngine, RemediatingEngine,
};
pub use magick::MagickEngine;
pub use params::{Operation, Placement, Quality, Sharpening, TileSpec, escape_param};
pub use pipeline::{PipelineError, TileOutcome, TilePipeline};
pub use planner::{PlanError, TILE_PLACEHOLDER, TilePlan, plan_tiles};
pub use probe::probe_empty_form;
