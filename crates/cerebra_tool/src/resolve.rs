//! Output resolution: path rules evaluated against the working directory.
//!
//! Resolving never touches the filesystem except to expand globs.
//! [`verify`] checks that outputs declared as expected actually exist.

use crate::schema::ToolSchema;
use cerebra_core::{sprintf, FormatError, ResolutionError, Value};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How one output's path is constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRule {
    /// A single known path
    Fixed(PathBuf),
    /// `count` paths from a template with one numeric placeholder, numbered from 1
    Numbered { template: String, count: usize },
    /// An explicit list of paths
    Files(Vec<PathBuf>),
    /// Every path matching a glob pattern, sorted; empty when nothing matches
    Glob(String),
}

/// Output path rules for one invocation, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPlan {
    rules: IndexMap<String, PathRule>,
}

impl OutputPlan {
    /// Create an empty plan
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single known path
    #[must_use]
    pub fn fixed(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.rules.insert(name.into(), PathRule::Fixed(path.into()));
        self
    }

    /// Add numbered paths
    #[must_use]
    pub fn numbered(mut self, name: impl Into<String>, template: impl Into<String>, count: usize) -> Self {
        self.rules.insert(
            name.into(),
            PathRule::Numbered {
                template: template.into(),
                count,
            },
        );
        self
    }

    /// Add an explicit list of paths
    #[must_use]
    pub fn files(mut self, name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        self.rules.insert(name.into(), PathRule::Files(paths));
        self
    }

    /// Add a glob pattern
    #[must_use]
    pub fn glob(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.rules.insert(name.into(), PathRule::Glob(pattern.into()));
        self
    }

    /// Add a rule
    pub fn insert(&mut self, name: impl Into<String>, rule: PathRule) {
        self.rules.insert(name.into(), rule);
    }

    /// Look up a rule
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PathRule> {
        self.rules.get(name)
    }

    /// Iterate rules
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the plan is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolved value of one output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    /// Single file
    File(PathBuf),
    /// List of files
    Files(Vec<PathBuf>),
}

impl OutputValue {
    /// All paths held
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::File(p) => vec![p.as_path()],
            Self::Files(ps) => ps.iter().map(PathBuf::as_path).collect(),
        }
    }
}

/// Resolved outputs of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outputs {
    /// Interface name
    pub tool: String,
    entries: IndexMap<String, OutputValue>,
}

impl Outputs {
    /// Create an empty output set
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            entries: IndexMap::new(),
        }
    }

    /// Look up an output
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.entries.get(name)
    }

    /// Look up a single-file output
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&Path> {
        match self.entries.get(name)? {
            OutputValue::File(p) => Some(p),
            OutputValue::Files(_) => None,
        }
    }

    /// Look up a multi-file output
    #[must_use]
    pub fn files(&self, name: &str) -> Option<&[PathBuf]> {
        match self.entries.get(name)? {
            OutputValue::Files(ps) => Some(ps),
            OutputValue::File(_) => None,
        }
    }

    /// Whether an output was resolved
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate outputs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutputValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of outputs
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no output was resolved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: &str, value: OutputValue) {
        self.entries.insert(name.to_string(), value);
    }
}

fn absolute(workdir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workdir.join(path)
    }
}

/// Expand a numbered template into paths `1..=count`
///
/// # Errors
///
/// Returns error if the template does not take exactly one number
pub fn numbered_paths(template: &str, count: usize) -> Result<Vec<PathBuf>, FormatError> {
    (1..=count)
        .map(|i| sprintf(template, &[Value::from(i)]).map(PathBuf::from))
        .collect()
}

fn expand_glob(tool: &str, output: &str, pattern: &str, workdir: &Path) -> Result<Vec<PathBuf>, ResolutionError> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let base = glob::Pattern::escape(&workdir.to_string_lossy());
        format!("{}/{}", base.trim_end_matches('/'), pattern)
    };
    let entries = glob::glob(&full).map_err(|e| ResolutionError::Pattern {
        tool: tool.to_string(),
        output: output.to_string(),
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
    paths.sort();
    if paths.is_empty() {
        tracing::debug!(tool, output, pattern, "glob matched nothing");
    }
    Ok(paths)
}

/// Evaluate an output plan against a working directory
///
/// # Errors
///
/// Returns error if a numbered template or glob pattern is malformed
pub fn resolve(tool: &str, plan: &OutputPlan, workdir: &Path) -> Result<Outputs, ResolutionError> {
    let mut outputs = Outputs::new(tool);

    for (name, rule) in plan.iter() {
        let value = match rule {
            PathRule::Fixed(path) => OutputValue::File(absolute(workdir, path)),
            PathRule::Numbered { template, count } => {
                let paths = numbered_paths(template, *count).map_err(|source| {
                    ResolutionError::Template {
                        tool: tool.to_string(),
                        output: name.to_string(),
                        source,
                    }
                })?;
                OutputValue::Files(paths.iter().map(|p| absolute(workdir, p)).collect())
            }
            PathRule::Files(paths) => {
                OutputValue::Files(paths.iter().map(|p| absolute(workdir, p)).collect())
            }
            PathRule::Glob(pattern) => {
                OutputValue::Files(expand_glob(tool, name, pattern, workdir)?)
            }
        };
        outputs.insert(name, value);
    }

    tracing::debug!(tool, outputs = outputs.len(), "resolved outputs");
    Ok(outputs)
}

/// Check that every resolved output declared as expected exists
///
/// # Errors
///
/// Returns the first expected output missing from disk
pub fn verify(schema: &ToolSchema, outputs: &Outputs) -> Result<(), ResolutionError> {
    for (name, value) in outputs.iter() {
        let must_exist = schema.output(name).is_some_and(|d| d.must_exist);
        for path in value.paths() {
            if path.exists() {
                continue;
            }
            if must_exist {
                return Err(ResolutionError::MissingOutput {
                    tool: schema.name.clone(),
                    output: name.to_string(),
                    path: path.display().to_string(),
                });
            }
            tracing::warn!(
                tool = %schema.name,
                output = name,
                path = %path.display(),
                "optional output not found"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{OutputDescriptor, ToolFamily};

    #[test]
    fn test_numbered_paths_one_indexed() {
        let paths = numbered_paths("POSTERIOR_%02d.nii.gz", 3).unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("POSTERIOR_01.nii.gz"),
                PathBuf::from("POSTERIOR_02.nii.gz"),
                PathBuf::from("POSTERIOR_03.nii.gz"),
            ]
        );
        assert!(numbered_paths("POSTERIOR_%02d.nii.gz", 0).unwrap().is_empty());
        assert!(numbered_paths("POSTERIOR.nii.gz", 2).is_err());
    }

    #[test]
    fn test_resolve_rules() {
        let plan = OutputPlan::new()
            .fixed("classified_image", "structural_labeled.nii")
            .fixed("absolute", "/data/out.nii")
            .numbered("posteriors", "POSTERIOR_%02d.nii.gz", 2)
            .files("pve", vec![PathBuf::from("a_pve_0.nii.gz")]);
        let outputs = resolve("Atropos", &plan, Path::new("/work")).unwrap();

        assert_eq!(
            outputs.file("classified_image"),
            Some(Path::new("/work/structural_labeled.nii"))
        );
        assert_eq!(outputs.file("absolute"), Some(Path::new("/data/out.nii")));
        assert_eq!(
            outputs.files("posteriors").unwrap(),
            &[
                PathBuf::from("/work/POSTERIOR_01.nii.gz"),
                PathBuf::from("/work/POSTERIOR_02.nii.gz"),
            ]
        );
        assert_eq!(outputs.files("pve").unwrap().len(), 1);
        assert!(outputs.files("classified_image").is_none());
    }

    #[test]
    fn test_resolve_bad_template() {
        let plan = OutputPlan::new().numbered("posteriors", "POSTERIOR_%s_%d", 2);
        let err = resolve("Atropos", &plan, Path::new("/work")).unwrap_err();
        assert!(matches!(err, ResolutionError::Template { .. }));
    }

    #[test]
    fn test_glob_sorted_and_soft() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["fusion_Intensity_2.nii", "fusion_Intensity_1.nii", "other.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let plan = OutputPlan::new()
            .glob("intensity", "fusion_Intensity_*.nii")
            .glob("posteriors", "fusion_Posterior_*.nii");
        let outputs = resolve("JointFusion", &plan, dir.path()).unwrap();

        assert_eq!(
            outputs.files("intensity").unwrap(),
            &[
                dir.path().join("fusion_Intensity_1.nii"),
                dir.path().join("fusion_Intensity_2.nii"),
            ]
        );
        assert_eq!(outputs.files("posteriors").unwrap(), &[] as &[PathBuf]);
    }

    #[test]
    fn test_glob_invalid_pattern() {
        let plan = OutputPlan::new().glob("broken", "[");
        let err = resolve("JointFusion", &plan, Path::new("/work")).unwrap_err();
        assert!(matches!(err, ResolutionError::Pattern { .. }));
    }

    #[test]
    fn test_verify() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("brain.nii.gz"), b"").unwrap();

        let schema = ToolSchema::new("BrainExtraction", "antsBrainExtraction.sh", ToolFamily::Ants)
            .with_output(OutputDescriptor::file("BrainExtractionBrain"))
            .with_output(OutputDescriptor::file("BrainExtractionMask"))
            .with_output(OutputDescriptor::file("BrainExtractionCSF").optional());

        let present = OutputPlan::new()
            .fixed("BrainExtractionBrain", "brain.nii.gz")
            .fixed("BrainExtractionCSF", "csf.nii.gz");
        let outputs = resolve("BrainExtraction", &present, dir.path()).unwrap();
        assert!(verify(&schema, &outputs).is_ok());

        let missing = present.fixed("BrainExtractionMask", "mask.nii.gz");
        let outputs = resolve("BrainExtraction", &missing, dir.path()).unwrap();
        let err = verify(&schema, &outputs).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::MissingOutput { ref output, .. } if output == "BrainExtractionMask"
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_numbered_count(count in 0usize..40) {
            let paths = numbered_paths("POSTERIOR_%02d.nii.gz", count).unwrap();
            proptest::prop_assert_eq!(paths.len(), count);
            if count > 0 {
                proptest::prop_assert_eq!(&paths[0], &PathBuf::from("POSTERIOR_01.nii.gz"));
                let last = format!("POSTERIOR_{:02}.nii.gz", count);
                proptest::prop_assert_eq!(&paths[count - 1], &PathBuf::from(last));
            }
        }
    }
}
