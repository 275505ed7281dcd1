use std::path::PathBuf;

use thiserror::Error;

/// Option combinations that make a run impossible. These are detected before
/// any row of the source file is read and map to a dedicated exit code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--fk-file {0:?} was given without --fk-column")]
    MissingJoinColumn(PathBuf),
    #[error("--fk-column '{0}' was given without --fk-file")]
    MissingJoinFile(String),
    #[error("join column '{column}' not found in header of {path:?}")]
    JoinColumnNotFound { column: String, path: PathBuf },
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error("input must be a file path; stdin cannot be read twice")]
    StdinInput,
    #[error("schema describes {expected} source column(s) but the header has {actual}")]
    SchemaMismatch { expected: usize, actual: usize },
    #[error("generated column '{0}' collides with another column of the same name")]
    DuplicateColumn(String),
}

/// Process exit code used when a run is rejected for configuration reasons.
pub const CONFIG_EXIT_CODE: i32 = 2;

/// Returns the exit code for a failed run: configuration errors anywhere in
/// the chain get [`CONFIG_EXIT_CODE`], everything else exits with 1.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|cause| cause.is::<ConfigError>()) {
        CONFIG_EXIT_CODE
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn config_errors_map_to_dedicated_exit_code() {
        let err = anyhow::Error::new(ConfigError::InvalidBatchSize);
        assert_eq!(exit_code_for(&err), CONFIG_EXIT_CODE);

        let wrapped: anyhow::Result<()> =
            Err(ConfigError::MissingJoinFile("dept".into())).context("Validating options");
        assert_eq!(exit_code_for(&wrapped.unwrap_err()), CONFIG_EXIT_CODE);
    }

    #[test]
    fn other_errors_exit_with_one() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(exit_code_for(&err), 1);
    }
}
