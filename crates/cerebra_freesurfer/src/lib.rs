//! Cerebra FreeSurfer Interfaces
//!
//! FreeSurfer tools locate subject data through `SUBJECTS_DIR`. When the
//! context carries it, every interface here forwards it to the process.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod parse_dicom_dir;

// Re-exports
pub use parse_dicom_dir::ParseDicomDir;

use cerebra_tool::{Context, Registry, RegistryError};
use std::sync::Arc;

/// Environment variable naming the subjects directory
pub const SUBJECTS_DIR_VAR: &str = "SUBJECTS_DIR";

/// Register every FreeSurfer interface
///
/// # Errors
///
/// Returns error if an interface with the same name is already registered
pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(Arc::new(ParseDicomDir::new()))?;
    Ok(())
}

pub(crate) fn subjects_environment(ctx: &Context) -> Vec<(String, String)> {
    match ctx.env(SUBJECTS_DIR_VAR) {
        Some(dir) => vec![(SUBJECTS_DIR_VAR.to_string(), dir.to_string())],
        None => {
            tracing::debug!("{} not set in context", SUBJECTS_DIR_VAR);
            Vec::new()
        }
    }
}
