//! Named color lookup.
//!
//! Color codes in file names are bare hex; for display they are resolved
//! against a table of ImageMagick color names, loaded from a tab-separated
//! file with one `name<TAB>hex` pair per line:
//!
//! ```text
//! AliceBlue	f0f8ff
//! aquamarine	7fffd4
//! aquamarine1	7fffd4
//! ```
//!
//! Lookups work in both directions and ignore case. When several names share
//! a code (`aquamarine`, `aquamarine1`) the first one in the file wins.

use crate::naming::ColorCode;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// A color code together with its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedColor {
    pub code: ColorCode,
    pub name: String,
}

/// Resolves `#hex` codes to names and names to codes.
pub trait ColorLookup {
    fn lookup(&self, hex_or_name: &str) -> Option<NamedColor>;
}

/// In-memory color table.
#[derive(Debug, Clone, Default)]
pub struct ColorTable {
    /// lower-case hex → display name
    by_code: HashMap<String, String>,
    /// lower-case name → lower-case hex
    by_name: HashMap<String, String>,
}

impl ColorTable {
    pub fn from_tsv(content: &str) -> Self {
        let mut table = Self::default();
        for line in content.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            let Some((name, hex)) = line.split_once('\t') else {
                debug!(line, "skipping color line without tab");
                continue;
            };
            let hex = hex.trim().trim_start_matches(ColorCode::MARKER).to_ascii_lowercase();
            if ColorCode::from_hex(&hex).is_err() {
                debug!(line, "skipping color line with bad code");
                continue;
            }
            let name = name.trim();
            table
                .by_code
                .entry(hex.clone())
                .or_insert_with(|| name.to_string());
            table.by_name.entry(name.to_lowercase()).or_insert(hex);
        }
        table
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_tsv(&fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    fn named(&self, hex: &str) -> Option<NamedColor> {
        let name = self.by_code.get(hex)?;
        Some(NamedColor {
            code: ColorCode::from_hex(hex).ok()?,
            name: name.clone(),
        })
    }
}

impl ColorLookup for ColorTable {
    fn lookup(&self, hex_or_name: &str) -> Option<NamedColor> {
        match hex_or_name.strip_prefix(ColorCode::MARKER) {
            Some(hex) => self.named(&hex.to_ascii_lowercase()),
            None => {
                let hex = self.by_name.get(&hex_or_name.to_lowercase())?;
                self.named(hex)
            }
        }
    }
}
