//! The product-photo filename grammar.
//!
//! Every image on disk carries its metadata in its name:
//!
//! ```text
//! SKU[_COLOR][_NUMBER][_QUALIFIER][,TEMPLATE[-INDEX]].EXT
//!
//! 308024.jpg                        SKU only
//! 308024_01.jpg                     SKU + image number
//! 308024_zoom.jpg                   SKU + qualifier (starts with a letter)
//! 308024_ff00aa_01.jpg              SKU + color + image number
//! 308024_01_260x325,grid-17.jpg     ... + qualifier + tile template + index
//! ```
//!
//! [`ImageDescriptor::parse`] never fails: shapes it does not recognise
//! degrade to "only the SKU is known". [`ImageDescriptor::name`] composes the
//! canonical form back. Once a name has been through one parse, parse and
//! compose reproduce each other byte for byte, which is what keeps the
//! descriptors interoperable with files written years ago.
//!
//! Descriptors built field by field only round-trip inside the grammar:
//!
//! - a color needs an image number next to it. `308024_ff00aa` reads back
//!   as qualifier `ff00aa`;
//! - a qualifier without number or color must start with a letter.
//!   `308024_7up` reads back as a failed image number, qualifier lost.
//!
//! ## Disambiguation
//!
//! The `_` separated tokens after the SKU have no markers, so the token count
//! picks a [`ParseRule`]:
//!
//! | Tokens | Rule | Reading |
//! |---|---|---|
//! | 1 | [`ParseRule::SkuOnly`] | SKU |
//! | 2 | [`ParseRule::NumberOrQualifier`] | letter first → qualifier, else number |
//! | 3 | [`ParseRule::ColorOrNumber`] | color + number, or number + qualifier |
//! | ≥4 | [`ParseRule::Extended`] | color + number + qualifier, or number + qualifier |
//!
//! A token is a color candidate only when it is exactly six characters long;
//! anything else short-circuits to the number/qualifier reading. A qualifier
//! that is not preceded by a number or color must start with a letter,
//! otherwise it reads back as a (failed) image number.

use crate::normalize::{NameFilter, Normalizer, blank_to_camel_case};
use crate::shard::{self, Layout, ShardSegments};
use std::fmt;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("Malformed color code '{0}': expected '#' followed by exactly 6 hex digits")]
    MalformedColorCode(String),
}

/// A 6-hex-digit color as encoded in file names.
///
/// The canonical text form carries a leading `#` (`#ff00aa`); file names
/// carry the bare digits. Letter case is preserved so that names round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorCode(String);

impl ColorCode {
    pub const MARKER: char = '#';

    /// Build from the bare digits as they appear in a file name.
    pub fn from_hex(hex: &str) -> Result<Self, NamingError> {
        if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(hex.to_string()))
        } else {
            Err(NamingError::MalformedColorCode(hex.to_string()))
        }
    }

    /// The digits without the marker.
    pub fn hex(&self) -> &str {
        &self.0
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or_default();
        (channel(0), channel(2), channel(4))
    }
}

impl FromStr for ColorCode {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(Self::MARKER)
            .ok_or_else(|| NamingError::MalformedColorCode(s.to_string()))
            .and_then(|hex| {
                Self::from_hex(hex).map_err(|_| NamingError::MalformedColorCode(s.to_string()))
            })
    }
}

impl fmt::Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::MARKER, self.0)
    }
}

// ============================================================================
// Token rules
// ============================================================================

/// Fields decoded from the `_` separated tokens after the SKU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFields {
    pub color: Option<ColorCode>,
    pub image_number: Option<u32>,
    pub qualifier: String,
}

/// Which reading applies to a given number of `_` separated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRule {
    /// `SKU`
    SkuOnly,
    /// `SKU_NUMBER` or `SKU_QUALIFIER`
    NumberOrQualifier,
    /// `SKU_COLOR_NUMBER` or `SKU_NUMBER_QUALIFIER`
    ColorOrNumber,
    /// `SKU_COLOR_NUMBER_QUALIFIER[_...]` or `SKU_NUMBER_QUALIFIER[_...]`
    Extended,
}

impl ParseRule {
    pub fn for_token_count(count: usize) -> Self {
        match count {
            0 | 1 => Self::SkuOnly,
            2 => Self::NumberOrQualifier,
            3 => Self::ColorOrNumber,
            _ => Self::Extended,
        }
    }

    /// Decode `tokens` (including the SKU at index 0) under this rule.
    pub fn apply(self, tokens: &[&str]) -> NameFields {
        match self {
            Self::SkuOnly => NameFields::default(),
            Self::NumberOrQualifier => number_or_qualifier(tokens[1]),
            Self::ColorOrNumber => color_or_number(tokens[1], tokens[2]),
            Self::Extended => extended(tokens[1], tokens[2], tokens[3]),
        }
    }
}

fn number_or_qualifier(token: &str) -> NameFields {
    match token.chars().next() {
        Some(c) if c.is_alphabetic() => NameFields {
            qualifier: token.to_string(),
            ..NameFields::default()
        },
        _ => NameFields {
            image_number: parse_image_number(token),
            ..NameFields::default()
        },
    }
}

fn color_or_number(second: &str, third: &str) -> NameFields {
    match color_candidate(second) {
        Some(color) => NameFields {
            color: Some(color),
            image_number: parse_image_number(third),
            qualifier: String::new(),
        },
        None => NameFields {
            color: None,
            image_number: parse_image_number(second),
            qualifier: blank_to_camel_case(third),
        },
    }
}

fn extended(second: &str, third: &str, fourth: &str) -> NameFields {
    match color_candidate(second) {
        Some(color) => NameFields {
            color: Some(color),
            image_number: parse_image_number(third),
            qualifier: blank_to_camel_case(fourth),
        },
        None => NameFields {
            color: None,
            image_number: parse_image_number(second),
            qualifier: blank_to_camel_case(third),
        },
    }
}

/// A token is only tried as a color when it has exactly six characters.
fn color_candidate(token: &str) -> Option<ColorCode> {
    if token.chars().count() != 6 {
        return None;
    }
    ColorCode::from_hex(token).ok()
}

/// Decimal image number; negative or unparsable values mean "no number".
pub fn parse_image_number(token: &str) -> Option<u32> {
    token
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|n| u32::try_from(n).ok())
}

/// Split `TEMPLATE-INDEX` and keep only the leading digits of the index.
///
/// `"grid-17abc"` → `("grid", "17")`, `"grid"` → `("grid", "")`.
pub fn split_tile_suffix(segment: &str) -> (&str, &str) {
    match segment.split_once('-') {
        Some((template, rest)) => {
            let digits = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            (template, &rest[..digits])
        }
        None => (segment, ""),
    }
}

/// Split a path into directory (with trailing `/`), bare name and extension.
fn split_path(raw: &str) -> (String, String, String) {
    let raw = raw.replace('\\', "/");
    let (directory, file) = match raw.rfind('/') {
        Some(i) => (raw[..=i].to_string(), &raw[i + 1..]),
        None => (String::new(), raw.as_str()),
    };
    match file.rfind('.') {
        Some(i) if i > 0 => (directory, file[..i].to_string(), file[i + 1..].to_string()),
        _ => (directory, file.to_string(), String::new()),
    }
}

// ============================================================================
// ImageDescriptor
// ============================================================================

/// Structured form of an image file name plus its location.
///
/// Descriptors are values: every `with_*` method consumes the descriptor and
/// returns a new one with dependent fields (shard segments, directory)
/// re-derived. Strings are never `None`; empty means unset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageDescriptor {
    sku: String,
    color: Option<ColorCode>,
    image_number: Option<u32>,
    qualifier: String,
    tile_template: String,
    tile_index: String,
    /// Plain layout: the directory. Sharded layout: the root below which the
    /// shard segments are appended.
    root: String,
    extension: String,
    layout: Layout,
}

impl ImageDescriptor {
    /// A descriptor that only knows its SKU.
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            ..Self::default()
        }
    }

    /// Parse a file name or full path, applying the default [`Normalizer`].
    pub fn parse(raw: &str) -> Self {
        Self::parse_with(raw, &Normalizer::today())
    }

    /// Parse a file name or full path with a custom name pre-filter.
    pub fn parse_with(raw: &str, filter: &dyn NameFilter) -> Self {
        let (directory, name, extension) = split_path(raw);
        let name = filter.apply(&name);
        let (base, suffix) = match name.split_once(',') {
            Some((base, rest)) => (base, Some(rest.split(',').next().unwrap_or(rest))),
            None => (name.as_str(), None),
        };
        Self::from_parts(base, suffix)
            .with_directory(directory)
            .with_extension(extension)
    }

    /// Parse the bare parts of a name: `SKU[_..]` and the optional
    /// `TEMPLATE[-INDEX]` segment that followed the first comma.
    pub fn from_parts(base: &str, tile_suffix: Option<&str>) -> Self {
        let tokens: Vec<&str> = base.split('_').collect();
        let fields = ParseRule::for_token_count(tokens.len()).apply(&tokens);
        let (tile_template, tile_index) = tile_suffix.map(split_tile_suffix).unwrap_or_default();
        Self {
            sku: tokens[0].to_string(),
            color: fields.color,
            image_number: fields.image_number,
            qualifier: fields.qualifier,
            tile_template: tile_template.to_string(),
            tile_index: tile_index.to_string(),
            ..Self::default()
        }
    }

    /// Parse and switch to the sharded layout in one go.
    pub fn parse_sharded(raw: &str) -> Self {
        Self::parse(raw).into_sharded()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn color(&self) -> Option<&ColorCode> {
        self.color.as_ref()
    }

    pub fn image_number(&self) -> Option<u32> {
        self.image_number
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    pub fn tile_template(&self) -> &str {
        &self.tile_template
    }

    pub fn tile_index(&self) -> &str {
        &self.tile_index
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Directory without shard segments.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Shard segments when the layout is sharded and the SKU is set.
    pub fn shard_segments(&self) -> Option<ShardSegments> {
        match self.layout {
            Layout::Sharded => shard::shard_segments(&self.sku),
            Layout::Plain => None,
        }
    }

    /// The directory the file lives in, ending in `/` unless empty.
    pub fn directory(&self) -> String {
        match self.shard_segments() {
            Some(segments) => format!("{}{}", self.root, segments.relative_dir()),
            None => self.root.clone(),
        }
    }

    /// Canonical composed name without directory and extension.
    pub fn name(&self) -> String {
        let mut n = self.sku.clone();
        if let Some(color) = &self.color {
            n.push('_');
            n.push_str(color.hex());
        }
        if let Some(number) = self.image_number {
            let _ = write!(n, "_{number:02}");
        }
        if !self.qualifier.is_empty() {
            n.push('_');
            n.push_str(&self.qualifier);
        }
        if !self.tile_template.is_empty() || !self.tile_index.is_empty() {
            n.push(',');
            n.push_str(&self.tile_template);
            if !self.tile_index.is_empty() {
                n.push('-');
                n.push_str(&self.tile_index);
            }
        }
        n
    }

    /// SKU and image number only, e.g. `308024_01`.
    pub fn short_name(&self) -> String {
        match self.image_number {
            Some(number) => format!("{}_{number:02}", self.sku),
            None => self.sku.clone(),
        }
    }

    /// Composed name plus extension.
    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.name()
        } else {
            format!("{}.{}", self.name(), self.extension)
        }
    }

    /// Directory plus file name as a string, always `/` separated.
    pub fn full_path(&self) -> String {
        format!("{}{}", self.directory(), self.file_name())
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.full_path())
    }

    // ------------------------------------------------------------------------
    // Derivation
    // ------------------------------------------------------------------------

    /// New SKU; a sharded directory follows the SKU automatically.
    pub fn with_sku(self, sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            ..self
        }
    }

    pub fn with_color(self, color: Option<ColorCode>) -> Self {
        Self { color, ..self }
    }

    pub fn with_image_number(self, image_number: Option<u32>) -> Self {
        Self {
            image_number,
            ..self
        }
    }

    pub fn with_qualifier(self, qualifier: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            ..self
        }
    }

    pub fn with_tile(self, template: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            tile_template: template.into(),
            tile_index: index.into(),
            ..self
        }
    }

    pub fn with_tile_index(self, index: impl Into<String>) -> Self {
        Self {
            tile_index: index.into(),
            ..self
        }
    }

    pub fn with_extension(self, extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            ..self
        }
    }

    /// New directory. For the sharded layout a trailing `top/sub` pair that
    /// belongs to the current SKU is stripped, so feeding [`directory`]
    /// back in is a no-op.
    ///
    /// [`directory`]: Self::directory
    pub fn with_directory(self, directory: impl Into<String>) -> Self {
        let directory = shard::with_trailing_separator(&directory.into());
        let root = match self.layout {
            Layout::Sharded => root_of(&directory, &self.sku),
            Layout::Plain => directory,
        };
        Self { root, ..self }
    }

    /// Switch to the sharded layout, treating the current directory as
    /// either a root or an already sharded directory.
    pub fn into_sharded(self) -> Self {
        let root = root_of(&self.root, &self.sku);
        Self {
            root,
            layout: Layout::Sharded,
            ..self
        }
    }

    /// Switch to the plain layout, freezing the current resolved directory.
    pub fn into_plain(self) -> Self {
        let root = self.directory();
        Self {
            root,
            layout: Layout::Plain,
            ..self
        }
    }

    /// Pad a short SKU to four characters the way uploads have always been
    /// tidied: numeric SKUs grow zeros in front, others at the back, and the
    /// camera default `img` borrows digits from the image number.
    pub fn with_padded_sku(self) -> Self {
        const MIN_SKU_LEN: usize = 4;
        if self.sku.chars().count() >= MIN_SKU_LEN {
            return self;
        }
        let mut sku = self.sku.clone();
        let mut number = self.image_number;
        if sku.eq_ignore_ascii_case("img") {
            let n = number.unwrap_or(0);
            if n > 100_000 {
                sku = (n / 100_000).to_string();
                number = Some(n % 100_000);
            } else if n > 10 {
                sku.push_str(&(n / 10).to_string());
                number = Some(n % 10);
            } else {
                sku = "Image".to_string();
            }
        } else if sku.trim().is_empty() {
            sku = "0".to_string();
        }
        let len = sku.chars().count();
        if len < MIN_SKU_LEN {
            let fill = "0".repeat(MIN_SKU_LEN - len);
            if sku.bytes().all(|b| b.is_ascii_digit()) {
                sku = format!("{fill}{sku}");
            } else {
                sku.push_str(&fill);
            }
        }
        Self {
            sku,
            image_number: number,
            ..self
        }
    }
}

fn root_of(directory: &str, sku: &str) -> String {
    match shard::shard_segments(sku) {
        Some(segments) => shard::strip_shard_suffix(directory, &segments).to_string(),
        None => directory.to_string(),
    }
}

impl fmt::Display for ImageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

/// Tidy an uploaded file name: default image number 1, default extension
/// `jpg`, trailing `_` removed and a short SKU padded.
pub fn easy_file_name(raw: &str) -> ImageDescriptor {
    easy_file_name_with(raw, &Normalizer::today())
}

pub fn easy_file_name_with(raw: &str, filter: &dyn NameFilter) -> ImageDescriptor {
    let trimmed = raw.trim_end_matches('_');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    let mut desc = ImageDescriptor::parse_with(trimmed, filter);
    if desc.image_number.is_none() {
        desc = desc.with_image_number(Some(1));
    }
    if desc.extension.is_empty() {
        desc = desc.with_extension("jpg");
    }
    desc.with_padded_sku()
}
