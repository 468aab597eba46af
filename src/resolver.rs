//! Location resolution
//!
//! Maps free text to canonical location codes by case-insensitive substring
//! containment against a fixed alias table. The first alias (in declaration
//! order) contained in the text wins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical airport/city codes the assistant can plan for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocationCode {
    /// Shenzhen Bao'an
    Szx,
    /// Shenzhen Futian port
    Fyg,
    /// Jakarta Soekarno-Hatta
    Cgk,
}

impl LocationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationCode::Szx => "SZX",
            LocationCode::Fyg => "FYG",
            LocationCode::Cgk => "CGK",
        }
    }
}

impl fmt::Display for LocationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alias table in precedence order. Keys are lower-case.
pub const ALIASES: &[(&str, LocationCode)] = &[
    ("shenzhen", LocationCode::Szx),
    ("szx", LocationCode::Szx),
    ("fyg", LocationCode::Fyg),
    ("jakarta", LocationCode::Cgk),
];

/// Resolve a location code from free text
pub fn resolve(text: &str) -> Option<LocationCode> {
    let lower = text.to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| lower.contains(alias))
        .map(|&(_, code)| code)
}
