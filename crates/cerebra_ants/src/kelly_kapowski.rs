//! KellyKapowski: DiReCT cortical thickness estimation.

use cerebra_core::{CompileError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, RenderCtx,
    ToolFamily, ToolSchema,
};

/// DiReCT cortical thickness
#[derive(Debug, Clone)]
pub struct KellyKapowski {
    schema: ToolSchema,
}

impl KellyKapowski {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for KellyKapowski {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for KellyKapowski {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let mut plan = OutputPlan::new();
        for name in ["cortical_thickness", "warped_white_matter"] {
            if let Some(path) = self.schema.str_of(name, inv, ctx) {
                plan = plan.fixed(name, path);
            }
        }
        Ok(plan)
    }
}

fn schema() -> ToolSchema {
    ToolSchema::new("KellyKapowski", "KellyKapowski", ToolFamily::Ants)
        .with_description("Diffeomorphic registration-based cortical thickness")
        .with_field(
            Field::new("dimension", FieldKind::choice([3, 2]))
                .argstr("--image-dimensionality %d")
                .default_value(3),
        )
        .with_field(
            Field::new("segmentation_image", FieldKind::existing_file())
                .argstr("--segmentation-image \"%s\"")
                .mandatory()
                .renderer(render_segmentation)
                .desc("label image with gray and white matter labels"),
        )
        .with_field(Field::new("gray_matter_label", FieldKind::Int).default_value(2))
        .with_field(Field::new("white_matter_label", FieldKind::Int).default_value(3))
        .with_field(
            Field::new("gray_matter_prob_image", FieldKind::existing_file())
                .argstr("--gray-matter-probability-image \"%s\""),
        )
        .with_field(
            Field::new("white_matter_prob_image", FieldKind::existing_file())
                .argstr("--white-matter-probability-image \"%s\""),
        )
        .with_field(
            Field::new("convergence", FieldKind::Str)
                .argstr("--convergence \"%s\"")
                .default_value("[50,0.001,10]")
                .desc("[iterations,threshold,window]"),
        )
        .with_field(
            Field::new("thickness_prior_estimate", FieldKind::Float)
                .argstr("--thickness-prior-estimate %f")
                .default_value(10.0),
        )
        .with_field(
            Field::new("thickness_prior_image", FieldKind::existing_file())
                .argstr("--thickness-prior-image \"%s\""),
        )
        .with_field(
            Field::new("gradient_step", FieldKind::Float)
                .argstr("--gradient-step %f")
                .default_value(0.025),
        )
        .with_field(
            Field::new("smoothing_variance", FieldKind::Float)
                .argstr("--smoothing-variance %f")
                .default_value(1.0),
        )
        .with_field(
            Field::new("smoothing_velocity_field", FieldKind::Float)
                .argstr("--smoothing-velocity-field-parameter %f")
                .default_value(1.5),
        )
        .with_field(
            Field::new("use_bspline_smoothing", FieldKind::Bool)
                .argstr("--use-bspline-smoothing 1"),
        )
        .with_field(
            Field::new("number_integration_points", FieldKind::Int)
                .argstr("--number-of-integration-points %d")
                .default_value(10),
        )
        .with_field(
            Field::new("max_invert_displacement_field_iters", FieldKind::Int)
                .argstr("--maximum-number-of-invert-displacement-field-iterations %d")
                .default_value(20),
        )
        .with_field(
            Field::new("cortical_thickness", FieldKind::file())
                .argstr("--output \"%s\"")
                .name_template("segmentation_image", "%s_cortical_thickness", true)
                .renderer(render_output),
        )
        .with_field(
            Field::new("warped_white_matter", FieldKind::file()).name_template(
                "segmentation_image",
                "%s_warped_white_matter",
                true,
            ),
        )
        .with_output(OutputDescriptor::file("cortical_thickness"))
        .with_output(OutputDescriptor::file("warped_white_matter"))
}

fn render_segmentation(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let gm = ctx.value("gray_matter_label").unwrap_or(Value::Int(2));
    let wm = ctx.value("white_matter_label").unwrap_or(Value::Int(3));
    let composite = format!("[{},{},{}]", value, gm, wm);
    ctx.format(ctx.argstr(), &[Value::Str(composite)]).map(Some)
}

fn render_output(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let composite = match ctx.string("warped_white_matter") {
        Some(wm) => format!("[{},{}]", value, wm),
        None => value.to_string(),
    };
    ctx.format(ctx.argstr(), &[Value::Str(composite)]).map(Some)
}
