//! Pure calculation functions for tile geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! A tile of `p` permille covers `1000 / p` tiles per axis, rounded
//! half-to-even. When the master size is not a multiple of that count the
//! derived tile size is floored and the canvas is resized to
//! `tiles × tile size`, so the last tile never ends up narrower than the
//! others. The drift is bounded by `tiles - 1` pixels per axis.

use super::params::TileSpec;
use crate::types::Dimensions;

/// Number of tiles along one axis for a tile size in permille.
///
/// ```
/// # use sku_tiles::imaging::tiles_across;
/// assert_eq!(tiles_across(125), 8);
/// assert_eq!(tiles_across(1000), 1);
/// ```
pub fn tiles_across(permille: u32) -> u32 {
    let permille = permille.max(1);
    (1000.0 / permille as f64).round_ties_even() as u32
}

/// Tile edge derived from the master edge, floored.
pub fn auto_resize(master_edge: u32, permille: u32) -> u32 {
    master_edge / tiles_across(permille)
}

/// Resolved geometry for one tile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    /// Size of every tile (the `-crop` geometry).
    pub tile: Dimensions,
    /// Canvas the master is resized to before cropping.
    pub canvas: Dimensions,
    /// Whether `canvas` differs from the master size.
    pub needs_resize: bool,
}

/// Resolve tile and canvas sizes for a master image.
///
/// `None` when the canvas does not fit in `u32` pixels, which an explicit
/// resize at a small permille can ask for.
pub fn tile_geometry(master: Dimensions, spec: &TileSpec) -> Option<TileGeometry> {
    let across = tiles_across(spec.tile_width_permille);
    let down = tiles_across(spec.tile_height_permille);

    let tile = Dimensions::new(
        match spec.resize_width {
            0 => master.width / across,
            w => w,
        },
        match spec.resize_height {
            0 => master.height / down,
            h => h,
        },
    );
    let canvas = Dimensions::new(
        across.checked_mul(tile.width)?,
        down.checked_mul(tile.height)?,
    );

    Some(TileGeometry {
        tile,
        canvas,
        needs_resize: canvas != master,
    })
}
