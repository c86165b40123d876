//! Shared value types used across the codec, planner and engine.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pixel size of an image on disk or of a planned canvas.
///
/// Rendered as `WxH` (e.g. `260x325`), the same form the raster engine takes
/// for geometry arguments and the tile names carry as qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected WIDTHxHEIGHT, got '{0}'")]
pub struct DimensionsParseError(pub String);

impl FromStr for Dimensions {
    type Err = DimensionsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DimensionsParseError(s.to_string());
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(err)?;
        Ok(Self {
            width: w.trim().parse().map_err(|_| err())?,
            height: h.trim().parse().map_err(|_| err())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_w_x_h() {
        assert_eq!(Dimensions::new(2080, 2600).to_string(), "2080x2600");
    }

    #[test]
    fn parse_accepts_upper_and_lower_x() {
        assert_eq!("260x325".parse(), Ok(Dimensions::new(260, 325)));
        assert_eq!("260X325".parse(), Ok(Dimensions::new(260, 325)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("260".parse::<Dimensions>().is_err());
        assert!("ax325".parse::<Dimensions>().is_err());
        assert!("260x".parse::<Dimensions>().is_err());
    }
}
