//! antsJointFusion: multi-atlas label and intensity fusion.
//!
//! Target and atlas images come in groups, one group per modality set, and
//! each atlas group pairs with exactly one segmentation. The output flag
//! takes either a single label image or a bracketed list of the label image
//! followed by the filename formats for the optional outputs.

use crate::common::{items, xarray};
use cerebra_core::{CompileError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, RenderCtx,
    ToolFamily, ToolSchema,
};

/// Output filename formats in the order the output bracket lists them,
/// paired with the output each one resolves to
const OUTPUT_FORMATS: [(&str, &str); 3] = [
    ("out_intensity_fusion_name_format", "out_intensity_fusion"),
    ("out_label_post_prob_name_format", "out_label_post_prob"),
    ("out_atlas_voting_weight_name_format", "out_atlas_voting_weight"),
];

/// ANTs joint label fusion
#[derive(Debug, Clone)]
pub struct JointFusion {
    schema: ToolSchema,
}

impl JointFusion {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for JointFusion {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for JointFusion {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let mut plan = OutputPlan::new();
        if let Some(label) = self.schema.str_of("out_label_fusion", inv, ctx) {
            plan = plan.fixed("out_label_fusion", label);
        }
        for (field, output) in OUTPUT_FORMATS {
            if let Some(format) = self.schema.str_of(field, inv, ctx) {
                plan = plan.glob(output, format.replace("%d", "*"));
            }
        }
        Ok(plan)
    }
}

fn schema() -> ToolSchema {
    let image_groups = FieldKind::list(FieldKind::list(FieldKind::existing_file()));

    ToolSchema::new("JointFusion", "antsJointFusion", ToolFamily::Ants)
        .with_description("Multi-atlas joint label fusion")
        .with_field(Field::new("dimension", FieldKind::choice([3, 2, 4])).argstr("-d %d"))
        .with_field(
            Field::new("target_image", image_groups.clone())
                .argstr("-t %s")
                .mandatory()
                .renderer(render_target_groups)
                .desc("target images, one group of modalities per target"),
        )
        .with_field(
            Field::new("atlas_image", image_groups)
                .argstr("-g %s...")
                .mandatory()
                .renderer(render_atlas_groups)
                .desc("atlas images, one group of modalities per atlas"),
        )
        .with_field(
            Field::new("atlas_segmentation_image", FieldKind::list(FieldKind::existing_file()))
                .argstr("-l %s...")
                .mandatory()
                .renderer(render_segmentations)
                .desc("one segmentation per atlas group"),
        )
        .with_field(Field::new("alpha", FieldKind::Float).argstr("-a %s").default_value(0.1))
        .with_field(Field::new("beta", FieldKind::Float).argstr("-b %s").default_value(2.0))
        .with_field(
            Field::new("retain_label_posterior_images", FieldKind::Bool)
                .argstr("-r")
                .default_value(false)
                .requires(["atlas_segmentation_image"]),
        )
        .with_field(
            Field::new("retain_atlas_voting_images", FieldKind::Bool)
                .argstr("-f")
                .default_value(false),
        )
        .with_field(
            Field::new("constrain_nonnegative", FieldKind::Bool)
                .argstr("-c")
                .default_value(false),
        )
        .with_field(
            Field::new(
                "patch_radius",
                FieldKind::list_bounded(FieldKind::Int, Some(3), Some(3)),
            )
            .argstr("-p %s")
            .renderer(render_xarray),
        )
        .with_field(
            Field::new("patch_metric", FieldKind::choice(["PC", "MSQ"]))
                .argstr("-m %s")
                .desc("patch similarity metric"),
        )
        .with_field(
            Field::new(
                "search_radius",
                FieldKind::list_bounded(
                    FieldKind::either([FieldKind::Int, FieldKind::existing_file()]),
                    Some(1),
                    Some(3),
                ),
            )
            .argstr("-s %s")
            .default_value(Value::List(vec![Value::Int(3), Value::Int(3), Value::Int(3)]))
            .renderer(render_xarray)
            .desc("search radius, or an image of per-voxel radii"),
        )
        .with_field(
            Field::new("exclusion_image_label", FieldKind::list(FieldKind::Str))
                .argstr("-e %s")
                .requires(["exclusion_image"])
                .renderer(render_exclusions),
        )
        .with_field(Field::new(
            "exclusion_image",
            FieldKind::list(FieldKind::existing_file()),
        ))
        .with_field(Field::new("mask_image", FieldKind::existing_file()).argstr("-x %s"))
        .with_field(
            Field::new("out_label_fusion", FieldKind::file())
                .argstr("%s")
                .renderer(render_output),
        )
        .with_field(
            Field::new("out_intensity_fusion_name_format", FieldKind::Str)
                .argstr("")
                .renderer(render_intensity_format)
                .desc("e.g. antsJointFusionIntensity_%d_%d.nii.gz"),
        )
        .with_field(
            Field::new("out_label_post_prob_name_format", FieldKind::Str)
                .requires(["out_label_fusion", "out_intensity_fusion_name_format"]),
        )
        .with_field(
            Field::new("out_atlas_voting_weight_name_format", FieldKind::Str).requires([
                "out_label_fusion",
                "out_intensity_fusion_name_format",
                "out_label_post_prob_name_format",
            ]),
        )
        .with_field(Field::new("verbose", FieldKind::Bool).argstr("-v"))
        .with_output(OutputDescriptor::file("out_label_fusion"))
        .with_output(OutputDescriptor::files("out_intensity_fusion"))
        .with_output(OutputDescriptor::files("out_label_post_prob"))
        .with_output(OutputDescriptor::files("out_atlas_voting_weight"))
}

/// `<flag> ['a', 'b']` for each group
fn render_groups(flag: &str, value: &Value) -> String {
    let groups: Vec<String> = items(value)
        .iter()
        .map(|group| {
            let names: Vec<String> = items(group).iter().map(|f| format!("'{}'", f)).collect();
            format!("{} [{}]", flag, names.join(", "))
        })
        .collect();
    groups.join(" ")
}

fn render_target_groups(_ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    Ok(Some(render_groups("-t", value)))
}

fn render_atlas_groups(_ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    Ok(Some(render_groups("-g", value)))
}

fn render_segmentations(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let segmentations = items(value);
    let atlases = ctx.value("atlas_image").map_or(0, |v| items(&v).len());
    if segmentations.len() != atlases {
        return Err(ctx.count_mismatch(atlases, segmentations.len()));
    }
    let parts: Vec<String> = segmentations.iter().map(|s| format!("-l {}", s)).collect();
    Ok(Some(parts.join(" ")))
}

fn render_xarray(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    ctx.format(ctx.argstr(), &[Value::Str(xarray(value))]).map(Some)
}

fn render_exclusions(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let labels = items(value);
    let images = ctx.value("exclusion_image").unwrap_or(Value::List(Vec::new()));
    let images = items(&images);
    if labels.len() != images.len() {
        return Err(ctx.count_mismatch(labels.len(), images.len()));
    }
    let parts: Vec<String> = labels
        .iter()
        .zip(images)
        .map(|(label, image)| format!("-e {}[{}]", label, image))
        .collect();
    Ok(Some(parts.join(" ")))
}

fn render_output(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let mut args = vec![value.to_string()];
    for (field, _) in OUTPUT_FORMATS {
        match ctx.string(field) {
            Some(format) => args.push(format),
            None => break,
        }
    }
    Ok(Some(if args.len() == 1 {
        format!("-o {}", args[0])
    } else {
        format!("-o [{}]", args.join(", "))
    }))
}

fn render_intensity_format(
    ctx: &RenderCtx<'_>,
    value: &Value,
) -> Result<Option<String>, CompileError> {
    if ctx.is_set("out_label_fusion") {
        // folded into the out_label_fusion bracket
        return Ok(None);
    }
    Ok(Some(format!("-o {}", value)))
}
