//! FSL output image type and the filename helpers built on it.
//!
//! FSL tools pick the format of the images they write from the
//! `FSLOUTPUTTYPE` environment variable. Generated output names must carry
//! the matching extension, so the type is read from the context rather than
//! the process environment.

use cerebra_core::{split_filename, ExecutionError, Value};
use cerebra_tool::{Context, Invocation};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable selecting the output type
pub const OUTPUT_TYPE_VAR: &str = "FSLOUTPUTTYPE";

/// Error parsing an output type name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputTypeError {
    /// Name is not one of the FSL output types
    #[error("unknown FSL output type '{0}' (expected NIFTI, NIFTI_GZ, NIFTI_PAIR or NIFTI_PAIR_GZ)")]
    Unknown(String),
}

/// Image format FSL tools write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputType {
    /// Single `.nii` file
    Nifti,
    /// Single gzipped `.nii.gz` file
    #[default]
    NiftiGz,
    /// `.hdr`/`.img` pair
    NiftiPair,
    /// Gzipped `.hdr`/`.img` pair
    NiftiPairGz,
}

impl OutputType {
    /// Name as used in `FSLOUTPUTTYPE`
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nifti => "NIFTI",
            Self::NiftiGz => "NIFTI_GZ",
            Self::NiftiPair => "NIFTI_PAIR",
            Self::NiftiPairGz => "NIFTI_PAIR_GZ",
        }
    }

    /// Extension of the image file, including the leading dot
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Nifti => ".nii",
            Self::NiftiGz => ".nii.gz",
            Self::NiftiPair => ".img",
            Self::NiftiPairGz => ".img.gz",
        }
    }

    /// Output type configured in the context, the default when unset
    ///
    /// # Errors
    ///
    /// Returns error if the variable holds an unknown name
    pub fn from_context(ctx: &Context) -> Result<Self, OutputTypeError> {
        ctx.env(OUTPUT_TYPE_VAR).map_or(Ok(Self::default()), str::parse)
    }

    /// Output type configured in the context, falling back to the default
    /// with a warning when the configured name is unknown
    #[must_use]
    pub fn from_context_or_default(ctx: &Context) -> Self {
        Self::from_context(ctx).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to {}", Self::default());
            Self::default()
        })
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = OutputTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NIFTI" => Ok(Self::Nifti),
            "NIFTI_GZ" => Ok(Self::NiftiGz),
            "NIFTI_PAIR" => Ok(Self::NiftiPair),
            "NIFTI_PAIR_GZ" => Ok(Self::NiftiPairGz),
            other => Err(OutputTypeError::Unknown(other.to_string())),
        }
    }
}

/// Environment exported to FSL processes
///
/// # Errors
///
/// Returns error if the configured output type is unknown
pub(crate) fn output_environment(
    tool: &str,
    ctx: &Context,
) -> Result<Vec<(String, String)>, ExecutionError> {
    let output_type = OutputType::from_context(ctx).map_err(|err| ExecutionError::Environment {
        tool: tool.to_string(),
        var: OUTPUT_TYPE_VAR.to_string(),
        reason: err.to_string(),
    })?;
    Ok(vec![(OUTPUT_TYPE_VAR.to_string(), output_type.to_string())])
}

/// `<workdir>/<stem of the source field's first file><suffix><ext>`, where
/// `ext` defaults to the output type extension
pub(crate) fn gen_fname(
    inv: &Invocation,
    ctx: &Context,
    source: &str,
    suffix: &str,
    ext: Option<&str>,
) -> Option<Value> {
    let first = match inv.get(source)? {
        Value::List(items) => items.first()?.to_string(),
        other => other.to_string(),
    };
    let stem = split_filename(first).stem;
    let ext = ext.unwrap_or_else(|| OutputType::from_context_or_default(ctx).extension());
    let path = ctx.workdir.join(format!("{}{}{}", stem, suffix, ext));
    Some(Value::Str(path.to_string_lossy().into_owned()))
}

/// Sibling of an image path: same directory and stem plus a suffix and an
/// extension, e.g. `brain.nii.gz` to `brain_mask.nii.gz`
pub(crate) fn sibling(path: &str, suffix: &str, ext: &str) -> PathBuf {
    let split = split_filename(Path::new(path));
    split.dir.join(format!("{}{}{}", split.stem, suffix, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_extension() {
        assert_eq!("NIFTI".parse::<OutputType>().unwrap().extension(), ".nii");
        assert_eq!("NIFTI_PAIR_GZ".parse::<OutputType>().unwrap().extension(), ".img.gz");
        assert_eq!(
            "ANALYZE".parse::<OutputType>(),
            Err(OutputTypeError::Unknown("ANALYZE".to_string()))
        );
    }

    #[test]
    fn test_from_context() {
        assert_eq!(OutputType::from_context(&Context::default()), Ok(OutputType::NiftiGz));
        let ctx = Context::default().with_env(OUTPUT_TYPE_VAR, "NIFTI_PAIR");
        assert_eq!(OutputType::from_context(&ctx), Ok(OutputType::NiftiPair));
        let bad = Context::default().with_env(OUTPUT_TYPE_VAR, "MINC");
        assert!(OutputType::from_context(&bad).is_err());
        assert_eq!(OutputType::from_context_or_default(&bad), OutputType::NiftiGz);
    }

    #[test]
    fn test_output_environment() {
        let ctx = Context::default().with_env(OUTPUT_TYPE_VAR, "NIFTI");
        assert_eq!(
            output_environment("bet", &ctx).unwrap(),
            vec![(OUTPUT_TYPE_VAR.to_string(), "NIFTI".to_string())]
        );
        let bad = Context::default().with_env(OUTPUT_TYPE_VAR, "MINC");
        assert!(matches!(
            output_environment("bet", &bad),
            Err(ExecutionError::Environment { .. })
        ));
    }

    #[test]
    fn test_gen_fname() {
        let ctx = Context::new("/work").with_env(OUTPUT_TYPE_VAR, "NIFTI");
        let inv = Invocation::new("BET").with("in_file", "/data/foo.nii.gz");
        assert_eq!(
            gen_fname(&inv, &ctx, "in_file", "_brain", None),
            Some(Value::from("/work/foo_brain.nii"))
        );
        assert_eq!(
            gen_fname(&inv, &ctx, "in_file", "_flirt", Some(".mat")),
            Some(Value::from("/work/foo_flirt.mat"))
        );
        assert_eq!(gen_fname(&inv, &ctx, "missing", "_x", None), None);
    }

    #[test]
    fn test_sibling() {
        assert_eq!(
            sibling("/work/foo_brain.nii.gz", "_mask", ".nii.gz"),
            PathBuf::from("/work/foo_brain_mask.nii.gz")
        );
    }
}
