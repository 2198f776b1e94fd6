//! Caller-owned execution context.
//!
//! Everything that would otherwise be process-wide state travels here:
//! working directory, environment, known tool versions.

use crate::schema::ToolFamily;
use cerebra_core::Version;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Working directory, environment, and tool versions for invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Directory the tool runs in and where relative paths resolve
    pub workdir: PathBuf,
    /// Environment variables passed to the tool
    pub environ: IndexMap<String, String>,
    /// Check that input files exist during validation
    pub check_inputs_exist: bool,
    /// Installed tool versions, when known
    pub versions: IndexMap<ToolFamily, Version>,
}

impl Context {
    /// Create a context rooted at a working directory
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Self::default()
        }
    }

    /// Snapshot the process environment and current directory
    ///
    /// # Errors
    ///
    /// Returns error if the current directory cannot be read
    pub fn from_env() -> std::io::Result<Self> {
        let workdir = std::env::current_dir()?;
        Ok(Self {
            workdir,
            environ: std::env::vars().collect(),
            ..Self::default()
        })
    }

    /// Set an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environ.insert(key.into(), value.into());
        self
    }

    /// Record an installed tool version
    #[must_use]
    pub fn with_version(mut self, family: ToolFamily, version: Version) -> Self {
        self.versions.insert(family, version);
        self
    }

    /// Enable or disable input existence checks
    #[must_use]
    pub const fn with_input_checks(mut self, enabled: bool) -> Self {
        self.check_inputs_exist = enabled;
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Look up an environment variable
    #[must_use]
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environ.get(key).map(String::as_str)
    }

    /// Installed version of a tool family
    #[must_use]
    pub fn version(&self, family: ToolFamily) -> Option<Version> {
        self.versions.get(&family).copied()
    }

    /// Resolve a path against the working directory
    #[must_use]
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            environ: IndexMap::new(),
            check_inputs_exist: true,
            versions: IndexMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builders() {
        let ctx = Context::new("/work")
            .with_env("FSLOUTPUTTYPE", "NIFTI")
            .with_version(ToolFamily::Ants, Version::new(2, 1, 0))
            .with_input_checks(false);
        assert_eq!(ctx.env("FSLOUTPUTTYPE"), Some("NIFTI"));
        assert_eq!(ctx.env("FSLDIR"), None);
        assert_eq!(ctx.version(ToolFamily::Ants), Some(Version::new(2, 1, 0)));
        assert_eq!(ctx.version(ToolFamily::Fsl), None);
        assert!(!ctx.check_inputs_exist);
    }

    #[test]
    fn test_resolve_path() {
        let ctx = Context::new("/work");
        assert_eq!(ctx.resolve_path("a.nii"), PathBuf::from("/work/a.nii"));
        assert_eq!(ctx.resolve_path("/data/a.nii"), PathBuf::from("/data/a.nii"));
    }

    #[test]
    fn test_from_env_uses_current_dir() {
        let ctx = Context::from_env().unwrap();
        assert_eq!(ctx.workdir, std::env::current_dir().unwrap());
        assert!(ctx.check_inputs_exist);
    }
}
