//! Output size descriptor in the upstream's `"<width>*<height>"` notation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Size used when a request omits `dimensions`.
pub const DEFAULT_DIMENSIONS: &str = "2572*3576";

/// Smallest edge the upstream accepts.
pub const MIN_EDGE: u32 = 256;

/// Largest edge the upstream accepts.
pub const MAX_EDGE: u32 = 8192;

/// Requested output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, CoreError> {
        for (label, edge) in [("width", width), ("height", height)] {
            if !(MIN_EDGE..=MAX_EDGE).contains(&edge) {
                return Err(CoreError::Validation(format!(
                    "Dimension {label} must be between {MIN_EDGE} and {MAX_EDGE}, got {edge}"
                )));
            }
        }
        Ok(Self { width, height })
    }

    /// Parse an optional form value, falling back to [`DEFAULT_DIMENSIONS`]
    /// when it is absent or blank.
    pub fn parse_or_default(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() => value.parse(),
            _ => Ok(Self::default()),
        }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: 2572,
            height: 3576,
        }
    }
}

impl FromStr for Dimensions {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            CoreError::Validation(format!(
                "Invalid dimensions '{s}'. Expected '<width>*<height>', e.g. '{DEFAULT_DIMENSIONS}'"
            ))
        };
        let (w, h) = s.trim().split_once('*').ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        Self::new(width, height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.width, self.height)
    }
}

impl TryFrom<String> for Dimensions {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dimensions> for String {
    fn from(value: Dimensions) -> Self {
        value.to_string()
    }
}
