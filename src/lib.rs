//! # SKU Tiles
//!
//! File naming, storage layout and tile derivation for product photography.
//! Every image of a catalog is identified by its file name alone: the name
//! carries the SKU, an optional color, an image number, a qualifier and,
//! for tiles, a template and index. The directory an image lives in is
//! derived from the SKU.
//!
//! # The File Name Grammar
//!
//! ```text
//! <sku>[_<color>][_<number>][_<qualifier>][,<template>[-<index>]].<ext>
//!
//! 308024.jpg                        SKU only
//! 308024_01.jpg                     image number 1
//! 308024_ff00aa_01.jpg              color + number
//! 308024_01_zoom.jpg                number + qualifier
//! 308024_01_260x325,grid-17.jpg     tile 17 of the "grid" template
//! ```
//!
//! Parsing is lenient: unrecognised tokens land in the qualifier and nothing
//! ever fails. Formatting drops unset fields, so parse → format is stable
//! for well-formed names.
//!
//! # Sharded Layout
//!
//! A flat directory with hundreds of thousands of images is slow to list,
//! so SKUs are spread over two directory levels:
//!
//! ```text
//! <root>/<sku[..8]>/<sku[..10]>/3080240112_01.jpg
//! ```
//!
//! Short SKUs clamp to their own length (`1` lives in `<root>/1/1/`).
//! A top segment that collides with a reserved device name such as `con` or
//! `nul` is escaped.
//!
//! # Tiles
//!
//! Zoom viewers load large product shots as a grid of tiles. A tile run is
//! two engine calls:
//!
//! ```text
//! Stage A   master.tif  →  resize + sharpen  →  <sku>_01_WxH,grid-all.png
//! Stage B   intermediate →  crop WxH         →  <sku>_01_WxH,grid-%d.jpg
//! ```
//!
//! Tile sizes are given in permille of the canvas; the canvas is snapped so
//! that a whole number of tiles fits. Existing tiles are either reused or
//! purged first, and the intermediate is always cleaned up.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Parse and format file names ([`naming::ImageDescriptor`]) |
//! | [`normalize`] | Clean-up rules applied to raw names before parsing |
//! | [`shard`] | SKU → directory mapping and reserved name escaping |
//! | [`store`] | Create directories, move and copy files within the tree |
//! | [`imaging`] | Tile geometry, planning and the raster engine seam |
//! | [`color`] | Color code ↔ name lookup |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//! | [`types`] | Shared value types |
//!
//! # External Engine
//!
//! Pixels are pushed by ImageMagick through the [`imaging::RasterEngine`]
//! trait. All planning is pure and tested against a recording mock; only
//! [`imaging::MagickEngine`] spawns processes.

pub mod color;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod normalize;
pub mod output;
pub mod shard;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
