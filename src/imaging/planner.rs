//! Tile planning.
//!
//! Turns a master descriptor, its pixel size and a [`TileSpec`] into the two
//! engine calls that produce a tile set:
//!
//! 1. **Stage A** converts the master into one full-size intermediate,
//!    resized to the tile canvas when needed. The intermediate is always
//!    written in a lossless format, whatever the final extension; cropping
//!    straight from a lossy master shifts some red levels.
//! 2. **Stage B** crops the intermediate into `WxH` tiles, numbered by the
//!    engine through the `%d` placeholder in the tile descriptor.
//!
//! Nothing here touches the file system.

use super::calculations::{TileGeometry, tile_geometry, tiles_across};
use super::params::{Operation, Placement, TileSpec};
use crate::naming::ImageDescriptor;
use crate::types::Dimensions;
use std::path::PathBuf;
use thiserror::Error;

/// Tile index placeholder the engine replaces with 0, 1, 2, ...
pub const TILE_PLACEHOLDER: &str = "%d";

/// Tile index of the Stage A intermediate.
pub const INTERMEDIATE_INDEX: &str = "all";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Tile {axis} of {value}‰ is outside 1..=1000")]
    PermilleOutOfRange { axis: &'static str, value: u32 },
    #[error("Master of {master} is too small for {tile} tiles")]
    DegenerateGeometry { master: Dimensions, tile: Dimensions },
    #[error("Canvas of {across}x{down} tiles at resize {resize} overflows u32 pixels")]
    CanvasTooLarge { across: u32, down: u32, resize: Dimensions },
}

/// What to do about an existing tile set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Tiles already exist and must not be replaced.
    Skip,
    /// Produce the tiles, deleting stale ones first when `purge` is set.
    Regenerate { purge: bool },
}

/// Decide from the spec whether to skip, given whether tile 0 is on disk.
pub fn decide(spec: &TileSpec, first_tile_exists: bool) -> Decision {
    match (spec.delete_existing_first, first_tile_exists) {
        (true, _) => Decision::Regenerate { purge: true },
        (false, true) => Decision::Skip,
        (false, false) => Decision::Regenerate { purge: false },
    }
}

/// The tile set descriptor with its placeholder resolved to index 0.
pub fn first_tile_path(tiles: &ImageDescriptor) -> PathBuf {
    PathBuf::from(tiles.full_path().replacen(TILE_PLACEHOLDER, "0", 1))
}

/// Tile set pattern for `dest` at a given tile size.
fn tile_set(dest: &ImageDescriptor, tile: Dimensions) -> ImageDescriptor {
    dest.clone()
        .with_qualifier(tile.to_string())
        .with_tile_index(TILE_PLACEHOLDER)
}

/// The tile set name when it is known without looking at the master.
///
/// Only an explicit resize on both axes fixes the `WxH` qualifier up front.
pub fn explicit_tile_set(dest: &ImageDescriptor, spec: &TileSpec) -> Option<ImageDescriptor> {
    match (spec.resize_width, spec.resize_height) {
        (0, _) | (_, 0) => None,
        (width, height) => Some(tile_set(dest, Dimensions::new(width, height))),
    }
}

/// Whether `candidate` names tile 0 of a set `spec` may have written for `dest`.
///
/// The qualifier must be a `WxH` size. Auto-derived axes accept any size,
/// explicit ones must match exactly.
pub fn is_first_tile_of(
    candidate: &ImageDescriptor,
    dest: &ImageDescriptor,
    spec: &TileSpec,
) -> bool {
    let Ok(size) = candidate.qualifier().parse::<Dimensions>() else {
        return false;
    };
    let axis_matches = |requested: u32, actual: u32| requested == 0 || requested == actual;

    candidate.tile_index() == "0"
        && candidate.sku() == dest.sku()
        && candidate.color() == dest.color()
        && candidate.image_number() == dest.image_number()
        && candidate.tile_template() == dest.tile_template()
        && candidate.extension() == dest.extension()
        && axis_matches(spec.resize_width, size.width)
        && axis_matches(spec.resize_height, size.height)
}

/// A complete two-stage plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    pub geometry: TileGeometry,
    /// Tile set descriptor, tile index set to [`TILE_PLACEHOLDER`].
    pub tiles: ImageDescriptor,
    /// Stage A output, removed once Stage B has run.
    pub intermediate: ImageDescriptor,
    pub stage_a: Operation,
    pub stage_b: Operation,
}

/// Plan a tile run without executing it.
///
/// The tile descriptor's qualifier becomes the tile size (`260x325`), so
/// tile sets of different geometry for the same template live side by side.
pub fn plan_tiles(
    master: &ImageDescriptor,
    master_size: Dimensions,
    spec: &TileSpec,
    dest: &ImageDescriptor,
    intermediate_format: &str,
) -> Result<TilePlan, PlanError> {
    spec.validate()?;
    let geometry = tile_geometry(master_size, spec).ok_or_else(|| PlanError::CanvasTooLarge {
        across: tiles_across(spec.tile_width_permille),
        down: tiles_across(spec.tile_height_permille),
        resize: Dimensions::new(spec.resize_width, spec.resize_height),
    })?;
    if geometry.tile.width == 0 || geometry.tile.height == 0 {
        return Err(PlanError::DegenerateGeometry {
            master: master_size,
            tile: geometry.tile,
        });
    }

    let tiles = tile_set(dest, geometry.tile);
    let intermediate = tiles
        .clone()
        .with_extension(intermediate_format)
        .with_tile_index(INTERMEDIATE_INDEX);

    let stage_a = Operation::new(
        stage_a_options(spec, &geometry),
        master.path(),
        intermediate.path(),
        Placement::Between,
    );
    let stage_b = Operation::new(
        stage_b_options(spec, &geometry),
        intermediate.path(),
        tiles.path(),
        Placement::Between,
    );

    Ok(TilePlan {
        geometry,
        tiles,
        intermediate,
        stage_a,
        stage_b,
    })
}

fn stage_a_options(spec: &TileSpec, geometry: &TileGeometry) -> Vec<String> {
    let mut options = Vec::new();
    if spec.strip {
        options.push("-strip".to_string());
    }
    if geometry.needs_resize {
        let flag = if spec.adaptive {
            "-adaptive-resize"
        } else {
            "-resize"
        };
        options.push(flag.to_string());
        options.push(geometry.canvas.to_string());
    }
    if let Some(sharpening) = spec.sharpening() {
        options.push(sharpening.flag().to_string());
        options.push(sharpening.argument().to_string());
    }
    options
}

fn stage_b_options(spec: &TileSpec, geometry: &TileGeometry) -> Vec<String> {
    let mut options = Vec::new();
    if let Some(quality) = spec.quality {
        options.push("-quality".to_string());
        options.push(quality.to_string());
    }
    options.push("-crop".to_string());
    options.push(geometry.tile.to_string());
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::normalize::Passthrough;

    fn master() -> ImageDescriptor {
        ImageDescriptor::parse_with("/img/3080240112_01.jpg", &Passthrough).into_sharded()
    }

    fn dest() -> ImageDescriptor {
        master().with_tile("grid", TILE_PLACEHOLDER)
    }

    fn plan(spec: &TileSpec, size: Dimensions) -> TilePlan {
        plan_tiles(&master(), size, spec, &dest(), "png").unwrap()
    }

    #[test]
    fn decide_skips_only_without_delete() {
        let keep = TileSpec::new(125, 125);
        let purge = TileSpec {
            delete_existing_first: true,
            ..keep.clone()
        };
        assert_eq!(decide(&keep, true), Decision::Skip);
        assert_eq!(decide(&keep, false), Decision::Regenerate { purge: false });
        assert_eq!(decide(&purge, true), Decision::Regenerate { purge: true });
        assert_eq!(decide(&purge, false), Decision::Regenerate { purge: true });
    }

    #[test]
    fn first_tile_replaces_placeholder() {
        assert_eq!(
            first_tile_path(&dest()),
            PathBuf::from("/img/30802401/3080240112/3080240112_01,grid-0.jpg")
        );
    }

    #[test]
    fn plan_names_tiles_by_geometry() {
        let p = plan(&TileSpec::new(125, 125), Dimensions::new(2080, 2600));
        assert_eq!(p.tiles.qualifier(), "260x325");
        assert_eq!(
            p.tiles.full_path(),
            "/img/30802401/3080240112/3080240112_01_260x325,grid-%d.jpg"
        );
        assert_eq!(
            p.intermediate.full_path(),
            "/img/30802401/3080240112/3080240112_01_260x325,grid-all.png"
        );
    }

    #[test]
    fn plan_skips_resize_when_canvas_matches() {
        let p = plan(&TileSpec::new(125, 125), Dimensions::new(2080, 2600));
        assert!(p.stage_a.options.is_empty());
        assert_eq!(p.stage_b.options, ["-crop", "260x325"]);
    }

    #[test]
    fn plan_resizes_to_canvas() {
        let spec = TileSpec {
            resize_width: 60,
            resize_height: 75,
            adaptive: true,
            ..TileSpec::new(125, 125)
        };
        let p = plan(&spec, Dimensions::new(2080, 2600));
        assert_eq!(p.stage_a.options, ["-adaptive-resize", "480x600"]);
        assert_eq!(p.tiles.qualifier(), "60x75");
    }

    #[test]
    fn plan_strip_comes_first_and_one_sharpening() {
        let spec = TileSpec {
            resize_width: 100,
            resize_height: 100,
            strip: true,
            sharpen: Some("0x1".into()),
            unsharp_mask: Some("1x1".into()),
            ..TileSpec::new(500, 500)
        };
        let p = plan(&spec, Dimensions::new(1000, 1000));
        assert_eq!(
            p.stage_a.options,
            ["-strip", "-resize", "200x200", "-sharpen", "0x1"]
        );
    }

    #[test]
    fn plan_quality_precedes_crop() {
        let spec = TileSpec {
            quality: Some(Quality::new(85)),
            ..TileSpec::new(250, 250)
        };
        let p = plan(&spec, Dimensions::new(800, 800));
        assert_eq!(p.stage_b.options, ["-quality", "85%", "-crop", "200x200"]);
    }

    #[test]
    fn plan_wires_stages_through_intermediate() {
        let p = plan(&TileSpec::new(125, 125), Dimensions::new(2080, 2600));
        assert_eq!(p.stage_a.source, master().path());
        assert_eq!(p.stage_a.destination, p.intermediate.path());
        assert_eq!(p.stage_b.source, p.intermediate.path());
        assert_eq!(p.stage_b.destination, p.tiles.path());
        assert_eq!(p.stage_a.placement, Placement::Between);
    }

    #[test]
    fn plan_rejects_tiny_master() {
        let err = plan_tiles(
            &master(),
            Dimensions::new(5, 5),
            &TileSpec::new(125, 125),
            &dest(),
            "png",
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::DegenerateGeometry { .. }));
    }

    #[test]
    fn plan_rejects_bad_permille() {
        let err = plan_tiles(
            &master(),
            Dimensions::new(800, 800),
            &TileSpec::new(0, 125),
            &dest(),
            "png",
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::PermilleOutOfRange { .. }));
    }

    #[test]
    fn plan_rejects_overflowing_canvas() {
        let spec = TileSpec {
            resize_width: 5_000_000,
            ..TileSpec::new(1, 1000)
        };
        let err = plan_tiles(&master(), Dimensions::new(2080, 2600), &spec, &dest(), "png")
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::CanvasTooLarge {
                across: 1000,
                down: 1,
                resize: Dimensions::new(5_000_000, 0),
            }
        );
    }

    // =========================================================================
    // Existing tile sets
    // =========================================================================

    #[test]
    fn explicit_tile_set_needs_both_axes() {
        let both = TileSpec {
            resize_width: 60,
            resize_height: 75,
            ..TileSpec::new(125, 125)
        };
        let one = TileSpec {
            resize_width: 60,
            ..TileSpec::new(125, 125)
        };
        assert_eq!(
            explicit_tile_set(&dest(), &both).map(|t| t.full_path()),
            Some("/img/30802401/3080240112/3080240112_01_60x75,grid-%d.jpg".to_string())
        );
        assert_eq!(explicit_tile_set(&dest(), &one), None);
        assert_eq!(explicit_tile_set(&dest(), &TileSpec::new(125, 125)), None);
    }

    #[test]
    fn explicit_tile_set_matches_the_plan() {
        let spec = TileSpec {
            resize_width: 60,
            resize_height: 75,
            ..TileSpec::new(125, 125)
        };
        let p = plan(&spec, Dimensions::new(2080, 2600));
        assert_eq!(explicit_tile_set(&dest(), &spec), Some(p.tiles));
    }

    #[test]
    fn first_tile_of_any_size_for_auto_geometry() {
        let auto = TileSpec::new(125, 125);
        for name in [
            "3080240112_01_260x325,grid-0.jpg",
            "3080240112_01_1040x1300,grid-0.jpg",
        ] {
            let candidate = ImageDescriptor::parse_with(name, &Passthrough);
            assert!(is_first_tile_of(&candidate, &dest(), &auto), "{name}");
        }
    }

    #[test]
    fn first_tile_rejects_other_sets() {
        let auto = TileSpec::new(125, 125);
        for name in [
            "3080240112_01_260x325,grid-1.jpg",
            "3080240112_01_260x325,zoom-0.jpg",
            "3080240112_02_260x325,grid-0.jpg",
            "3080240112_01_260x325,grid-0.png",
            "3080240112_01_big,grid-0.jpg",
            "3080240112_01_260x325,grid-all.jpg",
            "3080240112_01.jpg",
        ] {
            let candidate = ImageDescriptor::parse_with(name, &Passthrough);
            assert!(!is_first_tile_of(&candidate, &dest(), &auto), "{name}");
        }
    }

    #[test]
    fn first_tile_honours_explicit_axis() {
        let wide = TileSpec {
            resize_width: 100,
            ..TileSpec::new(125, 125)
        };
        let hit = ImageDescriptor::parse_with("3080240112_01_100x325,grid-0.jpg", &Passthrough);
        let miss = ImageDescriptor::parse_with("3080240112_01_260x325,grid-0.jpg", &Passthrough);
        assert!(is_first_tile_of(&hit, &dest(), &wide));
        assert!(!is_first_tile_of(&miss, &dest(), &wide));
    }
}
