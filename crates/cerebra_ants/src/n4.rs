//! N4BiasFieldCorrection: intensity non-uniformity correction.

use crate::common::xarray;
use cerebra_core::{derive_name, format_g, CompileError, ResolutionError, Value, Version};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, RenderCtx,
    ToolFamily, ToolSchema,
};

/// N4 bias field correction
#[derive(Debug, Clone)]
pub struct N4BiasFieldCorrection {
    schema: ToolSchema,
}

impl N4BiasFieldCorrection {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for N4BiasFieldCorrection {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for N4BiasFieldCorrection {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let mut plan = OutputPlan::new();
        if let Some(out) = self.schema.str_of("output_image", inv, ctx) {
            plan = plan.fixed("output_image", out);
        }
        if let Some(bias) = bias_file(&self.schema, inv, ctx) {
            plan = plan.fixed("bias_image", bias);
        }
        Ok(plan)
    }
}

/// Bias field filename, when the bias field is saved
fn bias_file(schema: &ToolSchema, inv: &Invocation, ctx: &Context) -> Option<String> {
    if let Some(bias) = inv.get("bias_image") {
        return Some(bias.to_string());
    }
    if !schema.flag_of("save_bias", inv, ctx) {
        return None;
    }
    let input = schema.str_of("input_image", inv, ctx)?;
    derive_name(input, "%s_bias", true).ok()
}

fn schema() -> ToolSchema {
    ToolSchema::new("N4BiasFieldCorrection", "N4BiasFieldCorrection", ToolFamily::Ants)
        .with_description("Bias field correction with the N4 algorithm")
        .with_field(
            Field::new("dimension", FieldKind::choice([3, 2, 4]))
                .argstr("-d %d")
                .default_value(3),
        )
        .with_field(
            Field::new("input_image", FieldKind::file())
                .argstr("--input-image %s")
                .mandatory()
                .desc("image to correct"),
        )
        .with_field(Field::new("mask_image", FieldKind::file()).argstr("--mask-image %s"))
        .with_field(Field::new("weight_image", FieldKind::file()).argstr("--weight-image %s"))
        .with_field(
            Field::new("output_image", FieldKind::Str)
                .argstr("--output %s")
                .name_template("input_image", "%s_corrected", true)
                .renderer(render_output),
        )
        .with_field(
            Field::new("bspline_fitting_distance", FieldKind::Float)
                .argstr("--bspline-fitting %s")
                .renderer(render_bspline),
        )
        .with_field(
            Field::new("bspline_order", FieldKind::Int).requires(["bspline_fitting_distance"]),
        )
        .with_field(Field::new("shrink_factor", FieldKind::Int).argstr("--shrink-factor %d"))
        .with_field(
            Field::new("n_iterations", FieldKind::list(FieldKind::Int))
                .argstr("--convergence %s")
                .renderer(render_convergence),
        )
        .with_field(
            Field::new("convergence_threshold", FieldKind::Float).requires(["n_iterations"]),
        )
        .with_field(
            Field::new("save_bias", FieldKind::Bool)
                .default_value(false)
                .mandatory()
                .xor(["bias_image"])
                .desc("save the estimated bias field next to the corrected image"),
        )
        .with_field(
            Field::new("bias_image", FieldKind::file())
                .xor(["save_bias"])
                .desc("filename for the estimated bias field"),
        )
        .with_field(
            Field::new("rescale_intensities", FieldKind::Bool)
                .argstr("-r")
                .default_value(false)
                .min_version(Version::new(2, 1, 0))
                .desc("rescale the corrected image to the input intensity range"),
        )
        .with_field(
            Field::new(
                "histogram_sharpening",
                FieldKind::tuple([FieldKind::Float, FieldKind::Float, FieldKind::Int]),
            )
            .argstr("--histogram-sharpening [%g,%g,%d]")
            .desc("FWHM, Wiener noise, and number of histogram bins"),
        )
        .with_output(OutputDescriptor::file("output_image"))
        .with_output(OutputDescriptor::file("bias_image"))
}

fn render_output(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    match bias_file(ctx.schema, ctx.invocation, ctx.context) {
        Some(bias) => Ok(Some(format!("--output [ {}, {} ]", value, bias))),
        None => ctx.render(value),
    }
}

fn render_bspline(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let distance = format_g(value.as_float().unwrap_or_default());
    Ok(Some(match ctx.int("bspline_order") {
        Some(order) => format!("--bspline-fitting [ {}, {} ]", distance, order),
        None => format!("--bspline-fitting [ {} ]", distance),
    }))
}

fn render_convergence(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let iterations = xarray(value);
    Ok(Some(match ctx.value("convergence_threshold").and_then(|v| v.as_float()) {
        Some(threshold) => format!("--convergence [ {}, {} ]", iterations, format_g(threshold)),
        None => format!("--convergence [ {} ]", iterations),
    }))
}
