//! DenoiseImage: non-local means denoising.

use cerebra_core::{CompileError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, RenderCtx,
    ToolFamily, ToolSchema,
};

/// ANTs image denoising
#[derive(Debug, Clone)]
pub struct DenoiseImage {
    schema: ToolSchema,
}

impl DenoiseImage {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for DenoiseImage {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for DenoiseImage {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let mut plan = OutputPlan::new();
        if let Some(out) = self.schema.str_of("output_image", inv, ctx) {
            plan = plan.fixed("output_image", out);
        }
        if let Some(noise) = noise_file(&self.schema, inv, ctx) {
            plan = plan.fixed("noise_image", noise);
        }
        Ok(plan)
    }
}

/// Noise image filename, when the noise is saved
fn noise_file(schema: &ToolSchema, inv: &Invocation, ctx: &Context) -> Option<String> {
    if inv.is_set("noise_image") || schema.flag_of("save_noise", inv, ctx) {
        schema.str_of("noise_image", inv, ctx)
    } else {
        None
    }
}

fn schema() -> ToolSchema {
    ToolSchema::new("DenoiseImage", "DenoiseImage", ToolFamily::Ants)
        .with_description("Denoise an image with a spatially adaptive non-local means filter")
        .with_field(Field::new("dimension", FieldKind::choice([2, 3, 4])).argstr("-d %d"))
        .with_field(
            Field::new("input_image", FieldKind::existing_file())
                .argstr("-i %s")
                .mandatory(),
        )
        .with_field(
            Field::new("noise_model", FieldKind::choice(["Gaussian", "Rician"]))
                .argstr("-n %s")
                .default_value("Gaussian"),
        )
        .with_field(
            Field::new("shrink_factor", FieldKind::Int)
                .argstr("-s %s")
                .default_value(1)
                .desc("downsampling applied before denoising"),
        )
        .with_field(
            Field::new("output_image", FieldKind::file())
                .argstr("-o %s")
                .name_template("input_image", "%s_noise_corrected", true)
                .renderer(render_output),
        )
        .with_field(
            Field::new("save_noise", FieldKind::Bool)
                .default_value(false)
                .mandatory()
                .xor(["noise_image"]),
        )
        .with_field(
            Field::new("noise_image", FieldKind::file())
                .name_template("input_image", "%s_noise", true)
                .xor(["save_noise"]),
        )
        .with_field(Field::new("verbose", FieldKind::Bool).argstr("-v"))
        .with_output(OutputDescriptor::file("output_image"))
        .with_output(OutputDescriptor::file("noise_image"))
}

fn render_output(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    match noise_file(ctx.schema, ctx.invocation, ctx.context) {
        Some(noise) => Ok(Some(format!("-o [ {}, {} ]", value, noise))),
        None => ctx.render(value),
    }
}
