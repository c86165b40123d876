//! Two-level directory sharding keyed on the SKU.
//!
//! A flat directory with millions of product shots is unusable on every file
//! system we care about, so sharded descriptors live two levels below a root:
//!
//! ```text
//! ROOT/<first 8 chars of SKU>/<first 10 chars of SKU>/<file name>
//!
//! images/30802401/3080240112/3080240112_01.jpg
//! images/1/1/1.jpg                      (short SKUs clamp to their length)
//! ```
//!
//! ## Idempotence
//!
//! Re-deriving a directory must never stack shard segments
//! (`root/3080/3080/3080/...`). [`strip_shard_suffix`] removes an existing
//! `top/sub` pair from a directory before the fresh pair is appended, and
//! sharded descriptors only ever store the stripped root.
//!
//! ## Reserved device names
//!
//! Windows refuses to create `con`, `nul`, `com1` and friends as directory
//! names. A top segment of `con` has always been spelled `C0N` on disk (zero
//! instead of O); the other device names get a trailing `_`, which no SKU
//! can contain since `_` is the field separator of the filename grammar.
//!
//! Only the top segment is escaped. The sub segment is the plain prefix, so
//! SKU `con` lives in `C0N/con/`, as existing trees have it.

use std::borrow::Cow;

/// Length of the top-level shard segment.
pub const TOP_SEGMENT_LEN: usize = 8;

/// Extra characters the second-level segment adds on top of the first.
pub const SUB_SEGMENT_EXTRA: usize = 2;

const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// How a descriptor's directory relates to its SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// The directory is used as is.
    #[default]
    Plain,
    /// The directory is a root; `top/sub` segments derived from the SKU are
    /// appended on every path composition.
    Sharded,
}

/// The two directory names a SKU is bucketed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSegments {
    pub top: String,
    pub sub: String,
}

impl ShardSegments {
    /// `top/sub/`, ready to be appended to a root ending in `/`.
    pub fn relative_dir(&self) -> String {
        format!("{}/{}/", self.top, self.sub)
    }
}

/// Compute the shard segments for a SKU, `None` for an empty SKU.
pub fn shard_segments(sku: &str) -> Option<ShardSegments> {
    if sku.is_empty() {
        return None;
    }
    Some(ShardSegments {
        top: escape_reserved(char_prefix(sku, TOP_SEGMENT_LEN)).into_owned(),
        sub: char_prefix(sku, TOP_SEGMENT_LEN + SUB_SEGMENT_EXTRA).to_string(),
    })
}

/// First `n` characters of `s`, or all of it when shorter.
fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Replace a reserved device name with its on-disk spelling.
pub fn escape_reserved(segment: &str) -> Cow<'_, str> {
    if segment.eq_ignore_ascii_case("con") {
        return Cow::Borrowed("C0N");
    }
    if RESERVED_NAMES
        .iter()
        .any(|reserved| segment.eq_ignore_ascii_case(reserved))
    {
        return Cow::Owned(format!("{segment}_"));
    }
    Cow::Borrowed(segment)
}

/// Cut `dir` in front of the first `top/sub` pair it contains.
///
/// The pair only matches as whole path components, compared ASCII
/// case-insensitively. A directory without the pair comes back unchanged.
pub fn strip_shard_suffix<'a>(dir: &'a str, segments: &ShardSegments) -> &'a str {
    let needle = format!("{}/{}", segments.top, segments.sub).to_ascii_lowercase();
    let haystack = dir.to_ascii_lowercase();
    let bytes = haystack.as_bytes();

    let mut from = 0;
    while let Some(offset) = haystack[from..].find(&needle) {
        let start = from + offset;
        let end = start + needle.len();
        let starts_component = start == 0 || bytes[start - 1] == b'/';
        let ends_component = end == bytes.len() || bytes[end] == b'/';
        if starts_component && ends_component {
            return &dir[..start];
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    dir
}

/// Make sure a non-empty directory ends in exactly one `/`.
pub fn with_trailing_separator(dir: &str) -> String {
    let dir = dir.replace('\\', "/");
    if dir.is_empty() || dir.ends_with('/') {
        dir
    } else {
        format!("{dir}/")
    }
}

/// `root/top/sub/` for a SKU, or just `root` when the SKU is empty.
pub fn resolve_directory(root: &str, sku: &str) -> String {
    let root = with_trailing_separator(root);
    match shard_segments(sku) {
        Some(segments) => {
            let base = strip_shard_suffix(&root, &segments);
            format!("{base}{}", segments.relative_dir())
        }
        None => root,
    }
}
