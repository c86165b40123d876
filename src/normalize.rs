//! Best-effort clean-up of camera and phone file names before parsing.
//!
//! Files arrive from photographers' devices with names like
//! `IMG_4711 (2).jpg`, `WP_20150705_001.jpg` or `2008-06-15 21.15.07.jpg`.
//! None of these carry a SKU, so the filter rewrites them into something the
//! grammar in [`naming`](crate::naming) can digest:
//!
//! | Input | Output (today = 2026-10-18) |
//! |---|---|
//! | `my photo (2)` | `myPhoto2` |
//! | `WP_20150705_001` | `150705_001` |
//! | `photo-12` | `261018_12` |
//! | `IMG_4711` | `261018_4711` |
//! | `2008-06-15 21.15.07` | `080615_211507` |
//!
//! The filter is pluggable through [`NameFilter`]; [`Passthrough`] switches it
//! off entirely.

use chrono::{NaiveDate, NaiveDateTime, Utc};

/// A rewrite applied to the bare file name (no directory, no extension).
pub trait NameFilter {
    fn apply(&self, name: &str) -> String;
}

/// Leaves names untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl NameFilter for Passthrough {
    fn apply(&self, name: &str) -> String {
        name.to_string()
    }
}

/// The default filter: blanks, parentheses, device prefixes and timestamps.
#[derive(Debug, Clone)]
pub struct Normalizer {
    date_prefix: String,
}

impl Normalizer {
    /// Uses `date` for the `yyMMdd` prefix that replaces device prefixes.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date_prefix: date.format("%y%m%d").to_string(),
        }
    }

    pub fn today() -> Self {
        Self::for_date(Utc::now().date_naive())
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::today()
    }
}

impl NameFilter for Normalizer {
    fn apply(&self, name: &str) -> String {
        if let Some(stamped) = rewrite_timestamp(name) {
            return stamped;
        }
        let cleaned = name.replace("_Film", "Film_").replace(['(', ')'], "");
        let camel = blank_to_camel_case(&cleaned);
        self.strip_device_prefix(camel)
    }
}

impl Normalizer {
    fn strip_device_prefix(&self, name: String) -> String {
        if starts_with_ignore_case(&name, "WP_20") {
            name[5..].to_string()
        } else if starts_with_ignore_case(&name, "photo-") {
            format!("{}_{}", self.date_prefix, &name[6..])
        } else if starts_with_ignore_case(&name, "photo") || starts_with_ignore_case(&name, "image")
        {
            format!("{}{}", self.date_prefix, &name[5..])
        } else if starts_with_ignore_case(&name, "IMG") || starts_with_ignore_case(&name, "_MG") {
            format!("{}{}", self.date_prefix, &name[3..])
        } else {
            name
        }
    }
}

/// ASCII case-insensitive prefix test that never slices inside a code point.
fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Removes blanks and upper-cases the first letter of every following word.
///
/// `"red summer dress"` → `"redSummerDress"`. U+FFFD (a mangled blank from a
/// broken code page) counts as a blank too.
pub fn blank_to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, word) in name
        .split([' ', '\u{FFFD}'])
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        if i == 0 {
            out.push_str(word);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// `2008-06-15 21.15.07` (optionally followed by more text) → `080615_211507`.
fn rewrite_timestamp(name: &str) -> Option<String> {
    const STAMP_LEN: usize = "2008-06-15 21.15.07".len();
    if !name.starts_with("20") {
        return None;
    }
    let stamp = name.get(..STAMP_LEN)?;
    let parsed = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H.%M.%S").ok()?;
    let compact = format!("{}{}", parsed.format("%y%m%d_%H%M%S"), &name[STAMP_LEN..]);
    Some(blank_to_camel_case(&compact))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::for_date(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
    }

    #[test]
    fn passthrough_keeps_everything() {
        assert_eq!(Passthrough.apply("IMG_0001 (2)"), "IMG_0001 (2)");
    }

    #[test]
    fn blanks_become_camel_case() {
        assert_eq!(blank_to_camel_case("red summer dress"), "redSummerDress");
        assert_eq!(blank_to_camel_case("  double  blank "), "doubleBlank");
        assert_eq!(blank_to_camel_case(""), "");
    }

    #[test]
    fn replacement_char_counts_as_blank() {
        assert_eq!(blank_to_camel_case("a\u{FFFD}b"), "aB");
    }

    #[test]
    fn parentheses_are_removed() {
        assert_eq!(normalizer().apply("308024_01 (2)"), "308024_012");
    }

    #[test]
    fn film_suffix_moves_in_front_of_separator() {
        assert_eq!(normalizer().apply("308024_Film01"), "308024Film_01");
    }

    #[test]
    fn windows_phone_prefix_dropped() {
        assert_eq!(normalizer().apply("WP_20150705_001"), "150705_001");
    }

    #[test]
    fn photo_dash_gets_date_and_separator() {
        assert_eq!(normalizer().apply("photo-12"), "261018_12");
    }

    #[test]
    fn photo_and_image_prefix_replaced_by_date() {
        assert_eq!(normalizer().apply("Photo_3"), "261018_3");
        assert_eq!(normalizer().apply("image_3"), "261018_3");
    }

    #[test]
    fn camera_prefixes_replaced_by_date() {
        assert_eq!(normalizer().apply("IMG_4711"), "261018_4711");
        assert_eq!(normalizer().apply("img_4711"), "261018_4711");
        assert_eq!(normalizer().apply("_MG_4711"), "261018_4711");
    }

    #[test]
    fn timestamp_names_are_compacted() {
        assert_eq!(normalizer().apply("2008-06-15 21.15.07"), "080615_211507");
        assert_eq!(normalizer().apply("2008-06-15 21.15.07 beach"), "080615_211507Beach");
    }

    #[test]
    fn sku_names_unchanged() {
        assert_eq!(normalizer().apply("308024_ff00aa_01_zoom"), "308024_ff00aa_01_zoom");
        assert_eq!(normalizer().apply("2008"), "2008");
    }

    #[test]
    fn non_ascii_names_do_not_panic() {
        assert_eq!(normalizer().apply("ä"), "ä");
        assert_eq!(normalizer().apply("phöto"), "phöto");
    }
}
