//! Filename helpers aware of compound imaging extensions.
//!
//! `structural.nii.gz` splits into stem `structural` and extension `.nii.gz`,
//! not `structural.nii` and `.gz`.

use crate::printf::{sprintf, FormatError};
use crate::value::Value;
use std::path::{Path, PathBuf};

/// Extensions treated as a single unit when splitting filenames
pub const COMPOUND_EXTENSIONS: &[&str] = &[".nii.gz", ".tar.gz", ".niml.dset"];

/// A filename split into directory, stem and extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitName {
    /// Parent directory (empty for bare filenames)
    pub dir: PathBuf,
    /// Filename without directory and extension
    pub stem: String,
    /// Extension including the leading dot, or empty
    pub ext: String,
}

/// Split a path into directory, stem and extension
#[must_use]
pub fn split_filename(path: impl AsRef<Path>) -> SplitName {
    let path = path.as_ref();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for ext in COMPOUND_EXTENSIONS {
        if name.len() <= ext.len() {
            continue;
        }
        let cut = name.len() - ext.len();
        if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(ext) {
            return SplitName {
                dir,
                stem: name[..cut].to_string(),
                ext: name[cut..].to_string(),
            };
        }
    }

    // leading dots belong to the stem
    let body_start = name.len() - name.trim_start_matches('.').len();
    match name[body_start..].rfind('.') {
        Some(idx) => {
            let cut = body_start + idx;
            SplitName {
                dir,
                stem: name[..cut].to_string(),
                ext: name[cut..].to_string(),
            }
        }
        None => SplitName {
            dir,
            stem: name,
            ext: String::new(),
        },
    }
}

/// Insert a prefix and suffix around a filename's stem, keeping its
/// directory and extension
#[must_use]
pub fn fname_presuffix(path: impl AsRef<Path>, prefix: &str, suffix: &str) -> PathBuf {
    let split = split_filename(path);
    split
        .dir
        .join(format!("{}{}{}{}", prefix, split.stem, suffix, split.ext))
}

/// Derive an output filename from a source file through a `%s` name
/// template, optionally keeping the source extension
///
/// # Errors
///
/// Returns error if the template does not hold exactly one placeholder
pub fn derive_name(
    source: impl AsRef<Path>,
    template: &str,
    keep_extension: bool,
) -> Result<String, FormatError> {
    let split = split_filename(source);
    let mut name = sprintf(template, &[Value::Str(split.stem)])?;
    if keep_extension {
        name.push_str(&split.ext);
    }
    Ok(name)
}
