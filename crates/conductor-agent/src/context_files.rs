//! Context-file loading and budget enforcement. Missing files are skipped with a warning; a path that escapes
//! the base directory is a hard failure rather than a silent skip — that
//! leniency is explicitly scoped to "missing", and escape attempts are a
//! scope-enforcement concern, not a convenience one (recorded as an Open
//! Question resolution in DESIGN.md).

use std::path::Path;

use conductor_core::path_validation::{validate_path_under_root, PathValidationError};

/// Roughly 4 bytes per token, matching the Context Assembler's estimator
/// (`conductor-context::estimate`).
const BYTES_PER_TOKEN: u64 = 4;

#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: String,
    pub content: String,
    pub estimated_tokens: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextFileError {
    #[error("context file path escapes base directory: {0}")]
    PathEscape(String),
    #[error("context_budget_exceeded: {total_estimated} tokens needed, budget is {budget} ({breakdown:?})")]
    BudgetExceeded { budget: u64, total_estimated: u64, breakdown: Vec<(String, u64)> },
}

fn estimate_tokens(byte_len: usize) -> u64 {
    (byte_len as u64 / BYTES_PER_TOKEN).max(1)
}

/// Loads `paths` resolved against `base_dir` and enforces `budget` (already
/// halved by the caller to leave room for the conversation body).
pub fn load_context_files(base_dir: &Path, paths: &[String], budget: u64) -> Result<Vec<LoadedFile>, ContextFileError> {
    let mut loaded = Vec::with_capacity(paths.len());
    let mut breakdown = Vec::with_capacity(paths.len());
    let mut total = 0u64;

    for rel in paths {
        let resolved = match validate_path_under_root(base_dir, rel, "context file") {
            Ok(p) => p,
            Err(PathValidationError::NotFound { .. }) => {
                tracing::warn!(path = %rel, "context file missing, skipping");
                continue;
            }
            Err(e @ PathValidationError::Escapes { .. }) => return Err(ContextFileError::PathEscape(e.to_string())),
            Err(e @ PathValidationError::InvalidRoot(_)) => return Err(ContextFileError::PathEscape(e.to_string())),
        };

        let content = match std::fs::read_to_string(&resolved) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %rel, error = %e, "context file unreadable, skipping");
                continue;
            }
        };

        let tokens = estimate_tokens(content.len());
        total += tokens;
        breakdown.push((rel.clone(), tokens));
        loaded.push(LoadedFile { path: rel.clone(), content, estimated_tokens: tokens });
    }

    if total > budget {
        return Err(ContextFileError::BudgetExceeded { budget, total_estimated: total, breakdown });
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_files_are_skipped_not_errored() {
        let dir = tempfile::tempdir().unwrap();
        let out = load_context_files(dir.path(), &["missing.md".to_string()], 1_000).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn escaping_path_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.md"), "nope").unwrap();
        let rel = format!("../{}/secret.md", outside.path().file_name().unwrap().to_string_lossy());
        let err = load_context_files(dir.path(), &[rel], 1_000).unwrap_err();
        assert!(matches!(err, ContextFileError::PathEscape(_)));
    }

    #[test]
    fn over_budget_reports_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "x".repeat(400)).unwrap();
        let err = load_context_files(dir.path(), &["a.md".to_string()], 10).unwrap_err();
        match err {
            ContextFileError::BudgetExceeded { budget, total_estimated, breakdown } => {
                assert_eq!(budget, 10);
                assert!(total_estimated > 10);
                assert_eq!(breakdown.len(), 1);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn under_budget_loads_every_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "hello").unwrap();
        fs::write(dir.path().join("b.md"), "world").unwrap();
        let out = load_context_files(dir.path(), &["a.md".to_string(), "b.md".to_string()], 1_000).unwrap();
        assert_eq!(out.len(), 2);
    }
}
