//! Name validation.
//!
//! Categories and filenames arrive from the operator (indirectly, through
//! choice tokens and the remote index) and are joined onto an inventory root.
//! Each one must be exactly one normal path component.

use std::path::{Component, Path};

use crate::error::{ErrorKind, Result};

/// Validates that `name` is a single, non-empty path component.
///
/// # Examples
///
/// ```
/// use shelfcast_inventory::validate_name;
/// assert!(validate_name("fiction").is_ok());
/// assert!(validate_name("The Book.txt").is_ok());
/// assert!(validate_name("三体.epub").is_ok());
/// assert!(validate_name("../secrets").is_err());
/// assert!(validate_name("a/b").is_err());
/// assert!(validate_name("").is_err());
/// ```
pub fn validate(name: &str) -> Result<&str> {
    if name.is_empty() || name.contains('\0') || name.contains('/') || name.contains('\\') {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidName(name.to_string())),
    }
}
