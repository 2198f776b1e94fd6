//! Cerebra Core Types
//!
//! Pure types and helpers shared by every tool wrapper: parameter values,
//! printf-style argument formatting, filename manipulation, tool versions,
//! invocation fingerprints, and the error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fingerprint;
pub mod path;
pub mod printf;
pub mod value;
pub mod version;

// Re-exports
pub use error::{
    CompileError, CoreError, CoreResult, ExecutionError, ResolutionError, ValidationError,
};
pub use fingerprint::Fingerprint;
pub use path::{derive_name, fname_presuffix, split_filename, SplitName};
pub use printf::{format_g, sprintf, FormatError};
pub use value::Value;
pub use version::{Version, VersionError};
