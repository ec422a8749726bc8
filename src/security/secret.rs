use std::fmt;

use crate::constants::REDACTION_MASK;

/// A configuration value that must never be written to a log in clear text.
///
/// `Display` and `Debug` both render [`REDACTION_MASK`]; the real value is
/// only reachable through [`Secret::expose`], which callers use when handing
/// the value to the wire (SSH command, S3 credentials provider).
///
/// An empty secret renders as the empty string, since there is nothing to
/// hide and an empty backup password means "no encryption".
///
/// # Example
///
/// ```
/// use routeros_backup::security::Secret;
///
/// let password = Secret::new("hunter2");
/// assert_eq!(format!("password={}", password), "password=***");
/// assert_eq!(password.expose(), "hunter2");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the clear-text value. Never pass the result to a log macro.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            f.write_str(REDACTION_MASK)
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(\"{}\")", self)
    }
}
