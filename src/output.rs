//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Parse
//!
//! ```text
//! 308024_ff00aa_01_zoom,grid-17.jpg
//!     SKU: 308024
//!     Color: #ff00aa (DeepPink)
//!     Image number: 01
//!     Qualifier: zoom
//!     Tile: grid-17
//!     Directory: /img/308024/308024/
//! ```
//!
//! ## Tiles
//!
//! ```text
//! 3080240112_01_260x325,grid-%d.jpg
//!     Directory: /img/30802401/3080240112/
//!     Tile size: 260x325
//!     Stale removed: 64
//!     Stale left: /img/30802401/3080240112/3080240112_01_260x325,grid-3.jpg
//!     Status: ok
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::color::ColorLookup;
use crate::imaging::TileOutcome;
use crate::naming::ImageDescriptor;
use crate::shard::Layout;
use serde_json::{Value, json};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("{}{}: {}", indent(1), label, value)
}

fn layout_name(layout: Layout) -> &'static str {
    match layout {
        Layout::Plain => "plain",
        Layout::Sharded => "sharded",
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Format the fields of a descriptor, unset fields omitted.
pub fn format_descriptor(desc: &ImageDescriptor, colors: Option<&dyn ColorLookup>) -> Vec<String> {
    let mut lines = vec![desc.file_name()];
    lines.push(field("SKU", desc.sku()));
    if let Some(color) = desc.color() {
        let name = colors.and_then(|c| c.lookup(&color.to_string()));
        lines.push(match name {
            Some(named) => field("Color", format!("{color} ({})", named.name)),
            None => field("Color", color),
        });
    }
    if let Some(number) = desc.image_number() {
        lines.push(field("Image number", format!("{number:02}")));
    }
    if !desc.qualifier().is_empty() {
        lines.push(field("Qualifier", desc.qualifier()));
    }
    if !desc.tile_template().is_empty() || !desc.tile_index().is_empty() {
        let tile = match desc.tile_index() {
            "" => desc.tile_template().to_string(),
            index => format!("{}-{}", desc.tile_template(), index),
        };
        lines.push(field("Tile", tile));
    }
    let directory = desc.directory();
    if !directory.is_empty() {
        lines.push(field("Directory", directory));
    }
    lines
}

pub fn print_descriptor(desc: &ImageDescriptor, colors: Option<&dyn ColorLookup>) {
    for line in format_descriptor(desc, colors) {
        println!("{}", line);
    }
}

/// Machine-readable view of a descriptor for `parse --json`.
pub fn descriptor_json(desc: &ImageDescriptor) -> Value {
    json!({
        "sku": desc.sku(),
        "color": desc.color().map(|c| c.to_string()),
        "image_number": desc.image_number(),
        "qualifier": desc.qualifier(),
        "tile_template": desc.tile_template(),
        "tile_index": desc.tile_index(),
        "directory": desc.directory(),
        "extension": desc.extension(),
        "layout": layout_name(desc.layout()),
        "name": desc.name(),
        "full_path": desc.full_path(),
    })
}

// ============================================================================
// Tiles
// ============================================================================

/// Format the outcome of one tile run.
pub fn format_tile_outcome(outcome: &TileOutcome) -> Vec<String> {
    if outcome.skipped {
        return vec!["Tiles exist, skipped".to_string()];
    }
    let mut lines = Vec::new();
    if let Some(tiles) = &outcome.tiles {
        lines.push(tiles.file_name());
        lines.push(field("Directory", tiles.directory()));
    }
    if let Some(size) = outcome.tile_size {
        lines.push(field("Tile size", size));
    }
    if !outcome.stale_removed.is_empty() {
        lines.push(field("Stale removed", outcome.stale_removed.len()));
    }
    for path in &outcome.stale_left {
        lines.push(field("Stale left", path.display()));
    }
    lines.push(match outcome.status {
        0 => field("Status", "ok"),
        code => field("Status", format!("failed (exit {code})")),
    });
    for line in outcome.diagnostics.lines().filter(|l| !l.trim().is_empty()) {
        lines.push(format!("{}{}", indent(2), line.trim_end()));
    }
    lines
}

pub fn print_tile_outcome(outcome: &TileOutcome) {
    for line in format_tile_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Store
// ============================================================================

pub fn format_move_summary(count: usize, root: &str) -> String {
    match count {
        1 => format!("Moved 1 file into {root}"),
        n => format!("Moved {n} files into {root}"),
    }
}
