//! Parameter types for tile derivation and raster engine invocations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`planner`](super::planner) (which decides which
//! commands to run) and the [`engine`](super::engine) (which runs them).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Sharpening`]: One of three ImageMagick sharpening operators, picked by priority.
//! - [`TileSpec`]: Everything a tile template says about geometry and processing.
//! - [`Operation`]: A single `convert` invocation: settings, options, source, destination.

use super::planner::PlanError;
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Sharpening operator with its ImageMagick geometry argument (e.g. `0x1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sharpening {
    Adaptive(String),
    Sharpen(String),
    Unsharp(String),
}

impl Sharpening {
    /// Pick at most one operator: adaptive beats sharpen beats unsharp.
    /// Empty arguments count as unset.
    pub fn select(
        adaptive: Option<&str>,
        sharpen: Option<&str>,
        unsharp: Option<&str>,
    ) -> Option<Self> {
        let set = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).map(str::to_string);
        set(adaptive)
            .map(Self::Adaptive)
            .or_else(|| set(sharpen).map(Self::Sharpen))
            .or_else(|| set(unsharp).map(Self::Unsharp))
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Self::Adaptive(_) => "-adaptive-sharpen",
            Self::Sharpen(_) => "-sharpen",
            Self::Unsharp(_) => "-unsharp",
        }
    }

    pub fn argument(&self) -> &str {
        match self {
            Self::Adaptive(a) | Self::Sharpen(a) | Self::Unsharp(a) => a,
        }
    }
}

/// Tile geometry and processing options of one tile template.
///
/// Tile sizes are given in permille of the master canvas: 125 means every
/// tile is 1/8 of the width, i.e. 8 tiles across. A resize of 0 lets the
/// planner derive it from the master size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSpec {
    pub tile_width_permille: u32,
    pub tile_height_permille: u32,
    pub resize_width: u32,
    pub resize_height: u32,
    /// `-adaptive-resize` instead of `-resize`.
    pub adaptive: bool,
    pub quality: Option<Quality>,
    /// Remove profiles and comments from the output.
    pub strip: bool,
    pub sharpen: Option<String>,
    pub adaptive_sharpen: Option<String>,
    pub unsharp_mask: Option<String>,
    pub delete_existing_first: bool,
}

impl TileSpec {
    pub const PERMILLE_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

    /// A spec with auto-derived resize geometry and no processing options.
    pub fn new(tile_width_permille: u32, tile_height_permille: u32) -> Self {
        Self {
            tile_width_permille,
            tile_height_permille,
            resize_width: 0,
            resize_height: 0,
            adaptive: false,
            quality: None,
            strip: false,
            sharpen: None,
            adaptive_sharpen: None,
            unsharp_mask: None,
            delete_existing_first: false,
        }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        for (axis, value) in [
            ("width", self.tile_width_permille),
            ("height", self.tile_height_permille),
        ] {
            if !Self::PERMILLE_RANGE.contains(&value) {
                return Err(PlanError::PermilleOutOfRange { axis, value });
            }
        }
        Ok(())
    }

    /// True when at least one resize dimension is left to the planner.
    pub fn auto_resize(&self) -> bool {
        self.resize_width == 0 || self.resize_height == 0
    }

    pub fn sharpening(&self) -> Option<Sharpening> {
        Sharpening::select(
            self.adaptive_sharpen.as_deref(),
            self.sharpen.as_deref(),
            self.unsharp_mask.as_deref(),
        )
    }
}

/// Where the options go relative to the source image.
///
/// ImageMagick applies settings before the image is read and operators
/// after, so tiling needs options *between* source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// `convert OPTIONS SOURCE DEST`
    #[default]
    Before,
    /// `convert SOURCE OPTIONS DEST`
    Between,
}

/// A single raster engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Always emitted first, ahead of the source (e.g. `-size 180x225`).
    pub settings: Vec<String>,
    pub options: Vec<String>,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub placement: Placement,
}

impl Operation {
    pub fn new(
        options: Vec<String>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        placement: Placement,
    ) -> Self {
        Self {
            settings: Vec::new(),
            options,
            source: source.into(),
            destination: destination.into(),
            placement,
        }
    }

    pub fn with_settings(self, settings: Vec<String>) -> Self {
        Self { settings, ..self }
    }

    /// Arguments in execution order, without the program name.
    pub fn argv(&self) -> Vec<String> {
        let source = self.source.to_string_lossy().into_owned();
        let destination = self.destination.to_string_lossy().into_owned();
        let mut args = self.settings.clone();
        match self.placement {
            Placement::Before => {
                args.extend(self.options.iter().cloned());
                args.push(source);
            }
            Placement::Between => {
                args.push(source);
                args.extend(self.options.iter().cloned());
            }
        }
        args.push(destination);
        args
    }

    /// Shell-ready command line for `program`, every argument escaped.
    pub fn command_line(&self, program: &str) -> String {
        std::iter::once(program.to_string())
            .chain(self.argv())
            .map(|arg| escape_param(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote an argument for a POSIX shell when it contains anything special.
pub fn escape_param(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:%,+=@#".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
