use std::path::{Component, Path};

use crate::TransferError;

/// Validates a file name received from the peer before it is joined to the
/// destination directory.
///
/// The name must be exactly one plain path component. Rejects:
/// - Empty names
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent (`..`) or current (`.`) directory components
/// - Anything containing a directory separator
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidPath(format!(
            "directory separator not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(TransferError::InvalidPath(format!(
            "parent directory traversal not allowed: {name}"
        ))),
        (Some(Component::Prefix(_) | Component::RootDir), _) => Err(
            TransferError::InvalidPath(format!("absolute path not allowed: {name}")),
        ),
        _ => Err(TransferError::InvalidPath(format!(
            "not a plain file name: {name}"
        ))),
    }
}
