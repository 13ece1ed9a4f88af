//! Filename validation
//!
//! Client supplied names are checked against a strict allow-set before any
//! path is built from them. Only ASCII letters, digits, `-`, `_` and `.` are
//! accepted, which rules out path separators entirely.

use std::fmt;

use crate::error::NameError;

/// A filename that passed [`validate_filename`].
///
/// The storage accessor only accepts this type, so raw client input can
/// never reach path construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Validate a client supplied filename.
pub fn validate_filename(name: &str) -> Result<FileName, NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if let Some(found) = name.chars().find(|c| !is_allowed(*c)) {
        return Err(NameError::DisallowedCharacter {
            name: name.to_string(),
            found,
        });
    }

    // Made of allowed characters, but these name directories
    if name == "." || name == ".." {
        return Err(NameError::Reserved(name.to_string()));
    }

    Ok(FileName(name.to_string()))
}
