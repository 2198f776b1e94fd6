//! antsBrainExtraction.sh: template-based skull stripping.
//!
//! The script locates the other ANTs programs through `$ANTSPATH` and, when
//! one is missing, reports it on stdout while still exiting 0.

use cerebra_core::{ExecutionError, ResolutionError};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan,
    ProcessOutput, ToolFamily, ToolSchema,
};

/// Outputs written only when temporary files are kept: output name and
/// file name after the prefix (the image suffix is appended unless the name
/// carries its own extension)
const TEMPORARY_OUTPUTS: [(&str, &str); 16] = [
    ("BrainExtractionCSF", "BrainExtractionCSF"),
    ("BrainExtractionGM", "BrainExtractionGM"),
    ("BrainExtractionInitialAffine", "BrainExtractionInitialAffine.mat"),
    ("BrainExtractionInitialAffineFixed", "BrainExtractionInitialAffineFixed"),
    ("BrainExtractionInitialAffineMoving", "BrainExtractionInitialAffineMoving"),
    ("BrainExtractionLaplacian", "BrainExtractionLaplacian"),
    ("BrainExtractionPrior0GenericAffine", "BrainExtractionPrior0GenericAffine.mat"),
    ("BrainExtractionPrior1InverseWarp", "BrainExtractionPrior1InverseWarp"),
    ("BrainExtractionPrior1Warp", "BrainExtractionPrior1Warp"),
    ("BrainExtractionPriorWarped", "BrainExtractionPriorWarped"),
    ("BrainExtractionSegmentation", "BrainExtractionSegmentation"),
    ("BrainExtractionTemplateLaplacian", "BrainExtractionTemplateLaplacian"),
    ("BrainExtractionTmp", "BrainExtractionTmp"),
    ("BrainExtractionWM", "BrainExtractionWM"),
    ("N4Corrected0", "N4Corrected0"),
    ("N4Truncated0", "N4Truncated0"),
];

/// Program whose location identifies the ANTs installation
const ANTS_PROBE: &str = "antsRegistration";

/// ANTs brain extraction
#[derive(Debug, Clone)]
pub struct BrainExtraction {
    schema: ToolSchema,
}

impl BrainExtraction {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for BrainExtraction {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for BrainExtraction {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let s = &self.schema;
        let prefix = s.str_of("out_prefix", inv, ctx).unwrap_or_default();
        let suffix = s.str_of("image_suffix", inv, ctx).unwrap_or_default();
        let image = |name: &str| format!("{}{}.{}", prefix, name, suffix);

        let mut plan = OutputPlan::new()
            .fixed("BrainExtractionMask", image("BrainExtractionMask"))
            .fixed("BrainExtractionBrain", image("BrainExtractionBrain"));

        if s.int_of("keep_temporary_files", inv, ctx).unwrap_or(0) != 0 {
            for (name, file) in TEMPORARY_OUTPUTS {
                let path = if file.ends_with(".mat") {
                    format!("{}{}", prefix, file)
                } else {
                    image(file)
                };
                plan = plan.fixed(name, path);
            }
        }
        Ok(plan)
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        if let Some(path) = ctx.env("ANTSPATH") {
            return Ok(vec![("ANTSPATH".to_string(), path.to_string())]);
        }

        let found = which::which_in(ANTS_PROBE, ctx.env("PATH"), &ctx.workdir).map_err(|e| {
            ExecutionError::Environment {
                tool: self.schema.command.clone(),
                var: "ANTSPATH".to_string(),
                reason: format!("{} not found on PATH: {}", ANTS_PROBE, e),
            }
        })?;
        let dir = found.parent().ok_or_else(|| ExecutionError::Environment {
            tool: self.schema.command.clone(),
            var: "ANTSPATH".to_string(),
            reason: format!("{} has no parent directory", found.display()),
        })?;

        let mut antspath = dir.to_string_lossy().into_owned();
        if !antspath.ends_with('/') {
            antspath.push('/');
        }
        tracing::debug!(antspath = %antspath, "inferred ANTSPATH");
        Ok(vec![("ANTSPATH".to_string(), antspath)])
    }

    fn inspect(&self, output: &ProcessOutput) -> Result<(), ExecutionError> {
        if !output.stdout.contains("we can't find") {
            return Ok(());
        }
        let line = output
            .stdout
            .lines()
            .find(|l| l.trim_start().starts_with("we can't find"))
            .unwrap_or_default()
            .trim();
        let dependency = missing_program(line).unwrap_or("unknown").to_string();
        Err(ExecutionError::MissingDependency {
            tool: self.schema.command.clone(),
            dependency,
            detail: format!("not found in $ANTSPATH ({})", line),
        })
    }
}

/// Program named by a `we can't find the <program> program` line
fn missing_program(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("we can't find")?.trim_start();
    let rest = rest.strip_prefix("the").unwrap_or(rest);
    rest.split_whitespace().next()
}

fn schema() -> ToolSchema {
    let mut schema = ToolSchema::new("BrainExtraction", "antsBrainExtraction.sh", ToolFamily::Ants)
        .with_description("Template-based brain extraction")
        .with_field(
            Field::new("dimension", FieldKind::choice([3, 2]))
                .argstr("-d %d")
                .default_value(3),
        )
        .with_field(
            Field::new("anatomical_image", FieldKind::existing_file())
                .argstr("-a %s")
                .mandatory(),
        )
        .with_field(
            Field::new("brain_template", FieldKind::existing_file())
                .argstr("-e %s")
                .mandatory(),
        )
        .with_field(
            Field::new("brain_probability_mask", FieldKind::existing_file())
                .argstr("-m %s")
                .mandatory(),
        )
        .with_field(
            Field::new("out_prefix", FieldKind::Str)
                .argstr("-o %s")
                .default_value("highres001_"),
        )
        .with_field(
            Field::new("extraction_registration_mask", FieldKind::existing_file())
                .argstr("-f %s")
                .desc("mask in template space restricting the registration metric"),
        )
        .with_field(
            Field::new("image_suffix", FieldKind::Str)
                .argstr("-s %s")
                .default_value("nii.gz"),
        )
        .with_field(Field::new("use_random_seeding", FieldKind::choice([0, 1])).argstr("-u %d"))
        .with_field(Field::new("keep_temporary_files", FieldKind::Int).argstr("-k %d"))
        .with_field(Field::new("use_floatingpoint_precision", FieldKind::choice([0, 1])).argstr("-q %d"))
        .with_field(Field::new("debug", FieldKind::Bool).argstr("-z 1"))
        .with_output(OutputDescriptor::file("BrainExtractionMask"))
        .with_output(OutputDescriptor::file("BrainExtractionBrain"));

    for (name, _) in TEMPORARY_OUTPUTS {
        schema = schema.with_output(OutputDescriptor::file(name).optional());
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Invocation {
        Invocation::new("BrainExtraction")
            .with("dimension", 3)
            .with("anatomical_image", "T1.nii.gz")
            .with("brain_template", "study_template.nii.gz")
            .with("brain_probability_mask", "ProbabilityMaskOfStudyTemplate.nii.gz")
    }

    #[test]
    fn test_cmdline() {
        let ctx = Context::default().with_input_checks(false);
        let line = BrainExtraction::new().compile(&base(), &ctx).unwrap();
        assert_eq!(
            line.cmdline(),
            "antsBrainExtraction.sh -a T1.nii.gz -m ProbabilityMaskOfStudyTemplate.nii.gz \
             -e study_template.nii.gz -d 3 -s nii.gz -o highres001_"
        );
    }

    #[test]
    fn test_antspath_from_context() {
        let ctx = Context::default().with_env("ANTSPATH", "/opt/ants/bin/");
        let env = BrainExtraction::new().environment(&ctx).unwrap();
        assert_eq!(env, vec![("ANTSPATH".to_string(), "/opt/ants/bin/".to_string())]);
    }

    #[cfg(unix)]
    #[test]
    fn test_antspath_inferred() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let probe = bin.path().join("antsRegistration");
        std::fs::write(&probe, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&probe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let ctx = Context::new(bin.path()).with_env("PATH", bin.path().to_string_lossy());
        let env = BrainExtraction::new().environment(&ctx).unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].0, "ANTSPATH");
        assert!(env[0].1.ends_with('/'));
        assert!(std::path::Path::new(&env[0].1).join("antsRegistration").exists());
    }

    #[test]
    fn test_antspath_unavailable() {
        let empty = tempfile::tempdir().unwrap();
        let ctx = Context::new(empty.path()).with_env("PATH", empty.path().to_string_lossy());
        let err = BrainExtraction::new().environment(&ctx).unwrap_err();
        assert!(matches!(err, ExecutionError::Environment { .. }));
    }

    #[test]
    fn test_inspect_missing_program() {
        let output = ProcessOutput {
            command: "antsBrainExtraction.sh".to_string(),
            exit_code: Some(0),
            stdout: "checking\nwe can't find the N4BiasFieldCorrection program\nexiting\n".to_string(),
            stderr: String::new(),
        };
        let err = BrainExtraction::new().inspect(&output).unwrap_err();
        match err {
            ExecutionError::MissingDependency { dependency, .. } => {
                assert_eq!(dependency, "N4BiasFieldCorrection");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inspect_clean_output() {
        let output = ProcessOutput {
            command: "antsBrainExtraction.sh".to_string(),
            exit_code: Some(0),
            stdout: "done\n".to_string(),
            stderr: String::new(),
        };
        assert!(BrainExtraction::new().inspect(&output).is_ok());
    }

    #[test]
    fn test_temporary_outputs() {
        let work = tempfile::tempdir().unwrap();
        let ctx = Context::new(work.path()).with_input_checks(false);
        let be = BrainExtraction::new();

        let outputs = be.resolve(&base(), &ctx).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs.file("BrainExtractionBrain"),
            Some(work.path().join("highres001_BrainExtractionBrain.nii.gz").as_path())
        );

        let outputs = be.resolve(&base().with("keep_temporary_files", 1), &ctx).unwrap();
        assert_eq!(outputs.len(), 18);
        assert_eq!(
            outputs.file("BrainExtractionInitialAffine"),
            Some(work.path().join("highres001_BrainExtractionInitialAffine.mat").as_path())
        );
        assert_eq!(
            outputs.file("N4Truncated0"),
            Some(work.path().join("highres001_N4Truncated0.nii.gz").as_path())
        );
    }

    #[test]
    fn test_temporary_outputs_are_optional() {
        let schema = BrainExtraction::new().schema().clone();
        assert!(schema.output("BrainExtractionMask").unwrap().must_exist);
        assert!(!schema.output("BrainExtractionWM").unwrap().must_exist);
    }
}
