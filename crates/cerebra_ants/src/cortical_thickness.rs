//! antsCorticalThickness.sh: the full brain extraction, segmentation and
//! thickness pipeline.
//!
//! The script takes its segmentation priors as a single `%02d` pattern, so
//! the priors are staged into the working directory under a fixed name
//! before the process starts.

use crate::common::items;
use cerebra_core::{split_filename, CompileError, ExecutionError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, RenderCtx,
    ToolFamily, ToolSchema,
};
use std::path::Path;

/// Directory, relative to the working directory, the priors are staged into
const PRIORS_DIR: &str = "segmentation_priors";

/// Output name, file name after the prefix, and whether the image suffix
/// is appended
const OUTPUTS: [(&str, &str, bool); 12] = [
    ("BrainExtractionMask", "BrainExtractionMask", true),
    ("ExtractedBrainN4", "ExtractedBrain0N4", true),
    ("BrainSegmentation", "BrainSegmentation", true),
    ("BrainSegmentationN4", "BrainSegmentation0N4", true),
    ("CorticalThickness", "CorticalThickness", true),
    ("TemplateToSubject1GenericAffine", "TemplateToSubject1GenericAffine.mat", false),
    ("TemplateToSubject0Warp", "TemplateToSubject0Warp", true),
    ("SubjectToTemplate1Warp", "SubjectToTemplate1Warp", true),
    ("SubjectToTemplate0GenericAffine", "SubjectToTemplate0GenericAffine.mat", false),
    ("SubjectToTemplateLogJacobian", "SubjectToTemplateLogJacobian", true),
    ("CorticalThicknessNormedToTemplate", "CorticalThickness", true),
    ("BrainVolumes", "brainvols.csv", false),
];

/// ANTs cortical thickness pipeline
#[derive(Debug, Clone)]
pub struct CorticalThickness {
    schema: ToolSchema,
}

impl CorticalThickness {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }

    fn staging_error(&self, reason: String) -> ExecutionError {
        ExecutionError::Staging {
            tool: self.schema.name.clone(),
            reason,
        }
    }
}

impl Default for CorticalThickness {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for CorticalThickness {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let s = &self.schema;
        let prefix = s.str_of("out_prefix", inv, ctx).unwrap_or_default();
        let suffix = s.str_of("image_suffix", inv, ctx).unwrap_or_default();

        let mut plan = OutputPlan::new();
        for (name, file, with_suffix) in OUTPUTS {
            let path = if with_suffix {
                format!("{}{}.{}", prefix, file, suffix)
            } else {
                format!("{}{}", prefix, file)
            };
            plan = plan.fixed(name, path);
        }

        let count = inv.get("segmentation_priors").map_or(0, |v| items(v).len());
        let template = format!(
            "{}BrainSegmentationPosteriors%02d.{}",
            prefix.replace('%', "%%"),
            suffix.replace('%', "%%")
        );
        Ok(plan.numbered("BrainSegmentationPosteriors", template, count))
    }

    fn prepare(&self, inv: &Invocation, ctx: &Context) -> Result<(), ExecutionError> {
        let Some(priors) = inv.get("segmentation_priors") else {
            return Ok(());
        };
        let staging = ctx.workdir.join(PRIORS_DIR);
        std::fs::create_dir_all(&staging)
            .map_err(|e| self.staging_error(format!("{}: {}", staging.display(), e)))?;

        // every staged prior takes the first prior's extension, as the `-p` pattern does
        let ext = prior_ext(priors);
        for (i, prior) in items(priors).iter().enumerate() {
            let source = ctx.resolve_path(prior.to_string());
            let target = staging.join(format!("BrainSegmentationPrior{:02}{}", i + 1, ext));
            if same_file(&source, &target) {
                continue;
            }
            std::fs::copy(&source, &target).map_err(|e| {
                self.staging_error(format!(
                    "copying {} to {}: {}",
                    source.display(),
                    target.display(),
                    e
                ))
            })?;
            tracing::debug!(
                source = %source.display(),
                target = %target.display(),
                "staged segmentation prior"
            );
        }
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn schema() -> ToolSchema {
    let mut schema = ToolSchema::new(
        "CorticalThickness",
        "antsCorticalThickness.sh",
        ToolFamily::Ants,
    )
    .with_description("Brain extraction, segmentation, registration and DiReCT thickness")
    .with_field(
        Field::new("dimension", FieldKind::choice([3, 2]))
            .argstr("-d %d")
            .default_value(3),
    )
    .with_field(
        Field::new("anatomical_image", FieldKind::existing_file())
            .argstr("-a %s")
            .mandatory()
            .desc("structural image, typically T1"),
    )
    .with_field(
        Field::new("brain_template", FieldKind::existing_file())
            .argstr("-e %s")
            .mandatory()
            .desc("anatomical template with skull"),
    )
    .with_field(
        Field::new("brain_probability_mask", FieldKind::existing_file())
            .argstr("-m %s")
            .mandatory()
            .desc("brain probability mask in template space"),
    )
    .with_field(
        Field::new("segmentation_priors", FieldKind::list(FieldKind::existing_file()))
            .argstr("-p %s")
            .mandatory()
            .renderer(render_priors),
    )
    .with_field(
        Field::new("out_prefix", FieldKind::Str)
            .argstr("-o %s")
            .default_value("antsCT_"),
    )
    .with_field(
        Field::new("image_suffix", FieldKind::Str)
            .argstr("-s %s")
            .default_value("nii.gz"),
    )
    .with_field(
        Field::new("t1_registration_template", FieldKind::existing_file())
            .argstr("-t %s")
            .mandatory()
            .desc("skull-stripped anatomical template"),
    )
    .with_field(
        Field::new("extraction_registration_mask", FieldKind::existing_file()).argstr("-f %s"),
    )
    .with_field(Field::new("keep_temporary_files", FieldKind::Int).argstr("-k %d"))
    .with_field(Field::new("max_iterations", FieldKind::Int).argstr("-i %d"))
    .with_field(Field::new("prior_segmentation_weight", FieldKind::Float).argstr("-w %f"))
    .with_field(Field::new("segmentation_iterations", FieldKind::Int).argstr("-n %d"))
    .with_field(Field::new("posterior_formulation", FieldKind::Str).argstr("-b %s"))
    .with_field(Field::new("use_floatingpoint_precision", FieldKind::choice([0, 1])).argstr("-j %d"))
    .with_field(Field::new("use_random_seeding", FieldKind::choice([0, 1])).argstr("-u %d"))
    .with_field(Field::new("b_spline_smoothing", FieldKind::Bool).argstr("-v"))
    .with_field(Field::new("label_propagation", FieldKind::Str).argstr("-l %s"))
    .with_field(
        Field::new("quick_registration", FieldKind::Bool)
            .argstr("-q 1")
            .desc("use antsRegistrationSyNQuick.sh for the template registration"),
    )
    .with_field(Field::new("debug", FieldKind::Bool).argstr("-z 1"));

    for (name, _, _) in OUTPUTS {
        schema = schema.with_output(OutputDescriptor::file(name));
    }
    schema.with_output(OutputDescriptor::files("BrainSegmentationPosteriors"))
}

/// Extension of the first prior
fn prior_ext(priors: &Value) -> String {
    items(priors)
        .first()
        .map(|first| split_filename(first.to_string()).ext)
        .unwrap_or_default()
}

fn render_priors(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    if items(value).is_empty() {
        return Err(ctx.invalid("at least one segmentation prior is required"));
    }
    Ok(Some(format!(
        "-p {}/BrainSegmentationPrior%02d{}",
        PRIORS_DIR,
        prior_ext(value)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priors() -> Value {
        Value::List(
            ["BrainSegmentationPrior01.nii.gz", "BrainSegmentationPrior02.nii.gz"]
                .into_iter()
                .map(Value::from)
                .collect(),
        )
    }

    fn base() -> Invocation {
        Invocation::new("CorticalThickness")
            .with("dimension", 3)
            .with("anatomical_image", "T1.nii.gz")
            .with("brain_template", "study_template.nii.gz")
            .with("brain_probability_mask", "ProbabilityMaskOfStudyTemplate.nii.gz")
            .with("segmentation_priors", priors())
            .with("t1_registration_template", "brain_study_template.nii.gz")
    }

    #[test]
    fn test_cmdline() {
        let ctx = Context::default().with_input_checks(false);
        let line = CorticalThickness::new().compile(&base(), &ctx).unwrap();
        assert_eq!(
            line.cmdline(),
            "antsCorticalThickness.sh -a T1.nii.gz -m ProbabilityMaskOfStudyTemplate.nii.gz \
             -e study_template.nii.gz -d 3 -s nii.gz -o antsCT_ \
             -p segmentation_priors/BrainSegmentationPrior%02d.nii.gz \
             -t brain_study_template.nii.gz"
        );
    }

    #[test]
    fn test_optional_flags() {
        let ctx = Context::default().with_input_checks(false);
        let inv = base()
            .with("quick_registration", true)
            .with("prior_segmentation_weight", 0.25)
            .with("keep_temporary_files", 1);
        let line = CorticalThickness::new().compile(&inv, &ctx).unwrap().cmdline();
        assert!(line.contains(" -q 1 "));
        assert!(line.contains(" -w 0.250000"));
        assert!(line.contains(" -k 1 "));
    }

    #[test]
    fn test_prepare_stages_priors() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let first = data.path().join("csf.nii.gz");
        let second = data.path().join("gm.nii.gz");
        std::fs::write(&first, b"csf").unwrap();
        std::fs::write(&second, b"gm").unwrap();

        let inv = base().with(
            "segmentation_priors",
            Value::List(vec![
                Value::from(first.to_string_lossy().into_owned()),
                Value::from(second.to_string_lossy().into_owned()),
            ]),
        );
        let ctx = Context::new(work.path());
        CorticalThickness::new().prepare(&inv, &ctx).unwrap();

        let staged = work.path().join("segmentation_priors");
        assert_eq!(
            std::fs::read(staged.join("BrainSegmentationPrior01.nii.gz")).unwrap(),
            b"csf"
        );
        assert_eq!(
            std::fs::read(staged.join("BrainSegmentationPrior02.nii.gz")).unwrap(),
            b"gm"
        );

        // staging twice is harmless
        CorticalThickness::new().prepare(&inv, &ctx).unwrap();
    }

    #[test]
    fn test_prepare_mixed_extensions_follow_pattern() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let first = data.path().join("p1.nii.gz");
        let second = data.path().join("p2.nii");
        std::fs::write(&first, b"p1").unwrap();
        std::fs::write(&second, b"p2").unwrap();

        let inv = base().with(
            "segmentation_priors",
            Value::List(vec![
                Value::from(first.to_string_lossy().into_owned()),
                Value::from(second.to_string_lossy().into_owned()),
            ]),
        );
        let ctx = Context::new(work.path()).with_input_checks(false);
        let line = CorticalThickness::new().compile(&inv, &ctx).unwrap().cmdline();
        assert!(line.contains("-p segmentation_priors/BrainSegmentationPrior%02d.nii.gz"));

        CorticalThickness::new().prepare(&inv, &ctx).unwrap();
        let mut staged: Vec<String> = std::fs::read_dir(work.path().join("segmentation_priors"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        staged.sort();
        assert_eq!(
            staged,
            vec![
                "BrainSegmentationPrior01.nii.gz".to_string(),
                "BrainSegmentationPrior02.nii.gz".to_string(),
            ]
        );
    }

    #[test]
    fn test_prepare_missing_prior() {
        let work = tempfile::tempdir().unwrap();
        let ctx = Context::new(work.path());
        let err = CorticalThickness::new().prepare(&base(), &ctx).unwrap_err();
        assert!(matches!(err, ExecutionError::Staging { .. }));
    }

    #[test]
    fn test_outputs() {
        let work = tempfile::tempdir().unwrap();
        let ctx = Context::new(work.path()).with_input_checks(false);
        let outputs = CorticalThickness::new().resolve(&base(), &ctx).unwrap();

        assert_eq!(
            outputs.file("BrainExtractionMask"),
            Some(work.path().join("antsCT_BrainExtractionMask.nii.gz").as_path())
        );
        assert_eq!(
            outputs.file("ExtractedBrainN4"),
            Some(work.path().join("antsCT_ExtractedBrain0N4.nii.gz").as_path())
        );
        assert_eq!(
            outputs.file("SubjectToTemplate0GenericAffine"),
            Some(work.path().join("antsCT_SubjectToTemplate0GenericAffine.mat").as_path())
        );
        assert_eq!(
            outputs.file("BrainVolumes"),
            Some(work.path().join("antsCT_brainvols.csv").as_path())
        );
        assert_eq!(
            outputs.file("CorticalThicknessNormedToTemplate"),
            outputs.file("CorticalThickness")
        );
        assert_eq!(
            outputs.files("BrainSegmentationPosteriors").unwrap(),
            &[
                work.path().join("antsCT_BrainSegmentationPosteriors01.nii.gz"),
                work.path().join("antsCT_BrainSegmentationPosteriors02.nii.gz"),
            ]
        );
    }
}
