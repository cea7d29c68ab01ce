use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Policy governing automatic vs. manual submission for an organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadMode {
    /// Only human-triggered cycles may upload.
    #[default]
    Manual,
    /// Every eligible file is uploaded by scheduled cycles.
    Auto,
    /// Scheduled cycles upload media published in or after the minimum year.
    AutoFromDate,
}

impl Display for UploadMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadMode::Manual => write!(f, "MANUAL"),
            UploadMode::Auto => write!(f, "AUTO"),
            UploadMode::AutoFromDate => write!(f, "AUTO_FROM_DATE"),
        }
    }
}

impl FromStr for UploadMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(UploadMode::Manual),
            "AUTO" => Ok(UploadMode::Auto),
            "AUTO_FROM_DATE" => Ok(UploadMode::AutoFromDate),
            _ => Err(anyhow::anyhow!("Invalid upload mode: {}", s)),
        }
    }
}
