//! Path validation utilities.
//!
//! Used by the Sub-Agent when resolving `context_files`: paths
//! are resolved against a base directory and must not escape it.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("{path_type} does not exist: {path}")]
    NotFound { path_type: String, path: String },
    #[error("{path_type} escapes allowed root: {path}")]
    Escapes { path_type: String, path: String },
    #[error("invalid root directory: {0}")]
    InvalidRoot(std::io::Error),
}

/// Resolve `path` against `root` and confirm the canonicalized result stays
/// under `root`. `root` itself must already exist; `path` may be relative or
/// absolute.
pub fn validate_path_under_root(
    root: &Path,
    path: &str,
    path_type: &str,
) -> Result<PathBuf, PathValidationError> {
    let root_canonical = root.canonicalize().map_err(PathValidationError::InvalidRoot)?;
    let input = Path::new(path);
    let full = if input.is_absolute() { input.to_path_buf() } else { root_canonical.join(input) };
    let canonical = full.canonicalize().map_err(|_| PathValidationError::NotFound {
        path_type: path_type.to_string(),
        path: path.to_string(),
    })?;
    if !canonical.starts_with(&root_canonical) {
        return Err(PathValidationError::Escapes {
            path_type: path_type.to_string(),
            path: path.to_string(),
        });
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn accepts_path_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "hello").unwrap();
        let resolved = validate_path_under_root(dir.path(), "a.md", "context file").unwrap();
        assert!(resolved.ends_with("a.md"));
    }

    #[test]
    fn rejects_traversal_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.md"), "nope").unwrap();
        let rel = format!("../{}/secret.md", outside.path().file_name().unwrap().to_string_lossy());
        let err = validate_path_under_root(dir.path(), &rel, "context file");
        assert!(err.is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_path_under_root(dir.path(), "missing.md", "context file").unwrap_err();
        assert!(matches!(err, PathValidationError::NotFound { .. }));
    }
}
