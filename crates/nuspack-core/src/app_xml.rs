//! Recovery of title identity fields from the `code/app.xml` descriptor.
//!
//! The descriptor is a small, flat, fixed-schema XML file whose identity
//! elements are hex text (`<title_id type="hexBinary" length="8">...`).
//! Parsing it is the one recoverable failure class in the engine: callers
//! log a warning and continue with the identity they already have.

use std::path::Path;

use regex::Regex;
use thiserror::Error;

use crate::config::TitleIdentity;

/// Errors from descriptor parsing. Never fatal to a build.
#[derive(Error, Debug)]
pub enum AppXmlError {
    /// The descriptor file could not be read.
    #[error("failed to read descriptor: {0}")]
    Io(#[from] std::io::Error),

    /// A required identity element was not found.
    #[error("descriptor is missing the <{0}> element")]
    MissingElement(&'static str),

    /// An identity element held non-hex text.
    #[error("element <{0}> is not valid hex: {1}")]
    BadHex(&'static str, String),
}

/// Identity fields recovered from app.xml.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppXmlInfo {
    /// 64-bit title id.
    pub title_id: u64,
    /// Content group id.
    pub group_id: u16,
    /// Application type flags.
    pub app_type: u32,
    /// Target OS version.
    pub os_version: u64,
    /// Title version.
    pub title_version: u16,
}

impl AppXmlInfo {
    /// Fold the recovered fields into a [`TitleIdentity`].
    pub fn into_identity(self) -> TitleIdentity {
        TitleIdentity {
            title_id: self.title_id,
            title_version: self.title_version,
            os_version: self.os_version,
            app_type: self.app_type,
        }
    }
}

/// Parse the descriptor at `path`.
///
/// # Errors
///
/// [`AppXmlError`] when the file cannot be read or a required hex element
/// is missing or malformed. The caller treats every variant as
/// recoverable.
pub fn parse(path: &Path) -> Result<AppXmlInfo, AppXmlError> {
    let text = std::fs::read_to_string(path)?;
    Ok(AppXmlInfo {
        title_id: hex_element(&text, "title_id")?,
        group_id: hex_element(&text, "group_id")? as u16,
        app_type: hex_element(&text, "app_type")? as u32,
        os_version: hex_element(&text, "os_version")?,
        title_version: hex_element(&text, "title_version")? as u16,
    })
}

fn hex_element(text: &str, element: &'static str) -> Result<u64, AppXmlError> {
    // Fixed flat schema; a targeted extraction beats a full XML stack.
    let pattern = format!(r"<{element}\b[^>]*>([0-9A-Fa-f]+)</{element}>");
    let re = Regex::new(&pattern).expect("invalid builtin element pattern");
    let captures = re
        .captures(text)
        .ok_or(AppXmlError::MissingElement(element))?;
    u64::from_str_radix(&captures[1], 16).map_err(|e| AppXmlError::BadHex(element, e.to_string()))
}
