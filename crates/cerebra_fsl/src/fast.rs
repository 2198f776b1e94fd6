//! FAST: tissue segmentation with bias field correction.
//!
//! Without `-o`, FAST names its outputs after the first input image and
//! writes them next to it.

use crate::output_type::{output_environment, OutputType};
use cerebra_core::{split_filename, ExecutionError, ResolutionError};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, ToolFamily,
    ToolSchema,
};
use std::path::PathBuf;

/// Classes FAST segments into when `-n` is not given
const DEFAULT_CLASSES: i64 = 3;

/// FSL automated segmentation tool
#[derive(Debug, Clone)]
pub struct Fast {
    schema: ToolSchema,
}

impl Fast {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }

    /// Output basename without extension
    fn basename(&self, inv: &Invocation, ctx: &Context) -> Option<PathBuf> {
        if let Some(base) = self.schema.str_of("out_basename", inv, ctx) {
            return Some(ctx.resolve_path(base));
        }
        let first = match inv.get("in_files")? {
            cerebra_core::Value::List(items) => items.first()?.to_string(),
            other => other.to_string(),
        };
        let split = split_filename(ctx.resolve_path(first));
        Some(split.dir.join(split.stem))
    }
}

impl Default for Fast {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for Fast {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let s = &self.schema;
        let Some(base) = self.basename(inv, ctx) else {
            return Ok(OutputPlan::new());
        };
        let base = base.to_string_lossy().into_owned();
        let ext = OutputType::from_context_or_default(ctx).extension();
        let image = |suffix: &str| PathBuf::from(format!("{}{}{}", base, suffix, ext));
        let classes = s
            .int_of("number_classes", inv, ctx)
            .unwrap_or(DEFAULT_CLASSES)
            .max(0);
        let per_class = |suffix: &str| -> Vec<PathBuf> {
            (0..classes)
                .map(|i| image(&format!("{}_{}", suffix, i)))
                .collect()
        };

        let mut plan = OutputPlan::new()
            .fixed("tissue_class_map", image("_seg"))
            .fixed("mixeltype", image("_mixeltype"));
        if !s.flag_of("no_pve", inv, ctx) {
            plan = plan
                .fixed("partial_volume_map", image("_pveseg"))
                .files("partial_volume_files", per_class("_pve"));
        }
        if s.flag_of("segments", inv, ctx) {
            plan = plan.files("tissue_class_files", per_class("_seg"));
        }
        if s.flag_of("output_biascorrected", inv, ctx) {
            plan = plan.fixed("restored_image", image("_restore"));
        }
        if s.flag_of("output_biasfield", inv, ctx) {
            plan = plan.fixed("bias_field", image("_bias"));
        }
        if s.flag_of("probability_maps", inv, ctx) {
            plan = plan.files("probability_maps", per_class("_prob"));
        }
        Ok(plan)
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        output_environment(self.name(), ctx)
    }
}

fn schema() -> ToolSchema {
    ToolSchema::new("FAST", "fast", ToolFamily::Fsl)
        .with_description("Segment a brain image into tissue classes and correct the bias field")
        .with_field(
            Field::new("in_files", FieldKind::list(FieldKind::existing_file()))
                .argstr("%s")
                .position(-1)
                .mandatory()
                .desc("one image per channel"),
        )
        .with_field(Field::new("number_classes", FieldKind::Int).argstr("-n %d"))
        .with_field(Field::new("bias_iters", FieldKind::Int).argstr("-I %d"))
        .with_field(Field::new("bias_lowpass", FieldKind::Int).argstr("-l %d").desc("FWHM in mm"))
        .with_field(
            Field::new("img_type", FieldKind::choice([1, 2, 3]))
                .argstr("-t %d")
                .desc("1 for T1, 2 for T2, 3 for PD"),
        )
        .with_field(Field::new("init_seg_smooth", FieldKind::Float).argstr("-f %.3f"))
        .with_field(Field::new("segments", FieldKind::Bool).argstr("-g"))
        .with_field(Field::new("init_transform", FieldKind::existing_file()).argstr("-a %s"))
        .with_field(
            Field::new(
                "other_priors",
                FieldKind::list_bounded(FieldKind::existing_file(), Some(3), Some(3)),
            )
            .argstr("-A %s")
            .desc("alternative CSF, grey and white matter priors"),
        )
        .with_field(Field::new("no_pve", FieldKind::Bool).argstr("--nopve"))
        .with_field(Field::new("output_biasfield", FieldKind::Bool).argstr("-b"))
        .with_field(Field::new("output_biascorrected", FieldKind::Bool).argstr("-B"))
        .with_field(Field::new("no_bias", FieldKind::Bool).argstr("-N"))
        .with_field(Field::new("out_basename", FieldKind::Str).argstr("-o %s"))
        .with_field(Field::new("use_priors", FieldKind::Bool).argstr("-P"))
        .with_field(Field::new("segment_iters", FieldKind::Int).argstr("-W %d"))
        .with_field(Field::new("mixel_smooth", FieldKind::Float).argstr("-R %.2f"))
        .with_field(Field::new("iters_afterbias", FieldKind::Int).argstr("-O %d"))
        .with_field(Field::new("hyper", FieldKind::Float).argstr("-H %.2f"))
        .with_field(Field::new("verbose", FieldKind::Bool).argstr("-v"))
        .with_field(Field::new("manual_seg", FieldKind::existing_file()).argstr("-s %s"))
        .with_field(Field::new("probability_maps", FieldKind::Bool).argstr("-p"))
        .with_output(OutputDescriptor::file("tissue_class_map"))
        .with_output(OutputDescriptor::file("mixeltype"))
        .with_output(OutputDescriptor::file("partial_volume_map"))
        .with_output(OutputDescriptor::files("partial_volume_files"))
        .with_output(OutputDescriptor::files("tissue_class_files"))
        .with_output(OutputDescriptor::file("restored_image"))
        .with_output(OutputDescriptor::file("bias_field"))
        .with_output(OutputDescriptor::files("probability_maps"))
}
