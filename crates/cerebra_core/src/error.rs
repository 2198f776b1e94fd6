//! Error taxonomy for tool invocations.
//!
//! Errors are grouped by the stage that raises them. Validation and
//! compilation errors surface before any subprocess is spawned; execution
//! and resolution errors surface after.

use crate::printf::FormatError;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Invocation rejected by its schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Mandatory field has no value
    #[error("{tool}: mandatory field '{field}' is not set")]
    MissingMandatory {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
    },

    /// Two mutually exclusive fields are both set
    #[error("{tool}: fields '{field}' and '{other}' are mutually exclusive")]
    MutuallyExclusive {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Field it conflicts with
        other: String,
    },

    /// Field set without a field it depends on
    #[error("{tool}: field '{field}' requires '{requires}' to be set")]
    MissingCoRequirement {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Field that must also be set
        requires: String,
    },

    /// Value outside an enumeration
    #[error("{tool}: '{value}' is not a valid value for '{field}' (expected one of: {allowed})")]
    InvalidEnumValue {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Rejected value
        value: String,
        /// Accepted values
        allowed: String,
    },

    /// Value of the wrong shape
    #[error("{tool}: field '{field}' expects {expected}, got {actual}")]
    InvalidType {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Expected kind
        expected: String,
        /// Kind of the given value
        actual: String,
    },

    /// List with too few or too many elements
    #[error("{tool}: field '{field}' expects {expected} elements, got {actual}")]
    InvalidLength {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Accepted element count
        expected: String,
        /// Given element count
        actual: usize,
    },

    /// Field not declared by the schema
    #[error("{tool}: unknown field '{field}'")]
    UnknownField {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
    },

    /// Input file declared as existing is missing
    #[error("{tool}: input file for '{field}' does not exist: {path}")]
    MissingInputFile {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Path that was checked
        path: String,
    },

    /// Installed tool is older than the field supports
    #[error("{tool}: field '{field}' requires version {required} or newer, found {found}")]
    VersionTooOld {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Minimum supported version
        required: String,
        /// Installed version
        found: String,
    },
}

impl ValidationError {
    /// Name of the offending field
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingMandatory { field, .. }
            | Self::MutuallyExclusive { field, .. }
            | Self::MissingCoRequirement { field, .. }
            | Self::InvalidEnumValue { field, .. }
            | Self::InvalidType { field, .. }
            | Self::InvalidLength { field, .. }
            | Self::UnknownField { field, .. }
            | Self::MissingInputFile { field, .. }
            | Self::VersionTooOld { field, .. } => field,
        }
    }
}

/// Cross-field rule violated while rendering arguments
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Tool-specific combination rule violated
    #[error("{tool}: invalid combination for '{field}': {reason}")]
    InvalidCombination {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Why the operation failed
        reason: String,
    },

    /// Two related counts disagree
    #[error("{tool}: '{field}' expects {expected} values, got {actual}")]
    CountMismatch {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Count implied by the related field
        expected: usize,
        /// Count found
        actual: usize,
    },

    /// Files referenced by an argument are missing
    #[error("{tool}: one or more files for '{field}' do not exist: {}", paths.join(", "))]
    MissingFile {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Missing paths
        paths: Vec<String>,
    },

    /// Argument template could not be applied
    #[error("{tool}: cannot format '{field}': {source}")]
    Format {
        /// Interface name
        tool: String,
        /// Offending field
        field: String,
        /// Formatting failure
        #[source]
        source: FormatError,
    },
}

/// Subprocess failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Process could not be started
    #[error("failed to spawn '{command}': {reason}")]
    Spawn {
        /// Command line that was run
        command: String,
        /// Why the operation failed
        reason: String,
    },

    /// Process exited unsuccessfully
    #[error("'{command}' exited with code {code:?}: {stderr}")]
    NonZeroExit {
        /// Command line that was run
        command: String,
        /// Exit code, absent when killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Tool reported a missing dependency in its output
    #[error("{tool} requires \"{dependency}\": {detail}")]
    MissingDependency {
        /// Interface name
        tool: String,
        /// Dependency the tool reported missing
        dependency: String,
        /// Tool output describing the failure
        detail: String,
    },

    /// Required environment variable absent and not inferable
    #[error("{tool}: environment variable ${var} is not defined: {reason}")]
    Environment {
        /// Interface name
        tool: String,
        /// Variable name
        var: String,
        /// Why the operation failed
        reason: String,
    },

    /// Preparing the working directory failed
    #[error("{tool}: failed to prepare working directory: {reason}")]
    Staging {
        /// Interface name
        tool: String,
        /// Why the operation failed
        reason: String,
    },
}

/// Expected output absent after execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// Declared output file does not exist
    #[error("{tool}: expected output '{output}' not found at {path}")]
    MissingOutput {
        /// Interface name
        tool: String,
        /// Output name
        output: String,
        /// Path that was checked
        path: String,
    },

    /// Output name template could not be applied
    #[error("{tool}: cannot build path for output '{output}': {source}")]
    Template {
        /// Interface name
        tool: String,
        /// Output name
        output: String,
        /// Formatting failure
        #[source]
        source: FormatError,
    },

    /// Glob pattern is malformed
    #[error("{tool}: invalid glob pattern '{pattern}' for output '{output}': {reason}")]
    Pattern {
        /// Interface name
        tool: String,
        /// Output name
        output: String,
        /// Glob pattern
        pattern: String,
        /// Why the operation failed
        reason: String,
    },
}

/// Any error raised while driving an invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Schema validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Argument compilation failed
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Subprocess failed
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Output resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Invocation could not be decoded
    #[error("invalid invocation: {reason}")]
    InvalidInvocation {
        /// Why the operation failed
        reason: String,
    },

    /// Stage transition out of order
    #[error("invalid state: expected {expected}, found {found}")]
    InvalidState {
        /// Stage the job had to be in
        expected: String,
        /// Stage the job was in
        found: String,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInvocation {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::MissingMandatory {
            tool: "Atropos".to_string(),
            field: "mask_image".to_string(),
        };
        assert_eq!(err.to_string(), "Atropos: mandatory field 'mask_image' is not set");
        assert_eq!(err.field(), "mask_image");
    }

    #[test]
    fn test_count_mismatch_display() {
        let err = CompileError::CountMismatch {
            tool: "Atropos".to_string(),
            field: "kmeans_init_centers".to_string(),
            expected: 2,
            actual: 3,
        };
        let s = err.to_string();
        assert!(s.contains("expects 2"));
        assert!(s.contains("got 3"));
    }

    #[test]
    fn test_missing_file_display() {
        let err = CompileError::MissingFile {
            tool: "Atropos".to_string(),
            field: "prior_image".to_string(),
            paths: vec!["prior01.nii".to_string(), "prior02.nii".to_string()],
        };
        assert!(err.to_string().ends_with("prior01.nii, prior02.nii"));
    }

    #[test]
    fn test_core_error_from() {
        let err: CoreError = ExecutionError::NonZeroExit {
            command: "bet in out".to_string(),
            code: Some(1),
            stderr: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Execution(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_core_error_from_json() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CoreError::InvalidInvocation { .. }));
    }
}
