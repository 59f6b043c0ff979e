//! Release channels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Release maturity track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// General availability
    #[default]
    Stable,
    /// Release candidate
    Rc,
    /// Beta
    Beta,
    /// Alpha
    Alpha,
    /// Development builds
    Dev,
}

impl Channel {
    /// Accepted selector values.
    pub const NAMES: &'static str = "stable, rc, beta, alpha, dev";

    /// Lowercase channel name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Rc => "rc",
            Self::Beta => "beta",
            Self::Alpha => "alpha",
            Self::Dev => "dev",
        }
    }

    /// Channel implied by a version's pre-release suffix.
    ///
    /// ```
    /// use shipkey_schema::Channel;
    ///
    /// assert_eq!(Channel::from_version("1.2.3-beta.1"), Channel::Beta);
    /// assert_eq!(Channel::from_version("1.2.3"), Channel::Stable);
    /// ```
    pub fn from_version(version: &str) -> Self {
        // Checked in this order so "1.0.0-rc.1+dev" stays on rc.
        if version.contains("-rc") {
            Self::Rc
        } else if version.contains("-beta") {
            Self::Beta
        } else if version.contains("-alpha") {
            Self::Alpha
        } else if version.contains("-dev") {
            Self::Dev
        } else {
            Self::Stable
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "rc" => Ok(Self::Rc),
            "beta" => Ok(Self::Beta),
            "alpha" => Ok(Self::Alpha),
            "dev" => Ok(Self::Dev),
            _ => Err(SchemaError::UnsupportedAlgorithm {
                kind: "channel",
                name: s.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}
