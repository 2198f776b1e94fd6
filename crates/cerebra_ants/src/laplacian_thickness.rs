//! LaplacianThickness: cortical thickness from white and gray matter masks.
//!
//! Every argument is positional, so each optional parameter requires the one
//! before it.

use cerebra_core::ResolutionError;
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, ToolFamily,
    ToolSchema,
};

/// Laplacian cortical thickness
#[derive(Debug, Clone)]
pub struct LaplacianThickness {
    schema: ToolSchema,
}

impl LaplacianThickness {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for LaplacianThickness {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for LaplacianThickness {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let mut plan = OutputPlan::new();
        if let Some(out) = self.schema.str_of("output_image", inv, ctx) {
            plan = plan.fixed("output_image", out);
        }
        Ok(plan)
    }
}

fn schema() -> ToolSchema {
    ToolSchema::new("LaplacianThickness", "LaplacianThickness", ToolFamily::Ants)
        .with_description("Cortical thickness by solving Laplace's equation between tissue boundaries")
        .with_field(
            Field::new("input_wm", FieldKind::existing_file())
                .argstr("%s")
                .position(1)
                .mandatory()
                .desc("white matter segmentation image"),
        )
        .with_field(
            Field::new("input_gm", FieldKind::existing_file())
                .argstr("%s")
                .position(2)
                .mandatory()
                .desc("gray matter segmentation image"),
        )
        .with_field(
            Field::new("output_image", FieldKind::file())
                .argstr("%s")
                .position(3)
                .name_template("input_wm", "%s_thickness", true),
        )
        .with_field(
            Field::new("smooth_param", FieldKind::Float)
                .argstr("%s")
                .position(4)
                .desc("sigma of the Gaussian smoothing of the solution"),
        )
        .with_field(
            Field::new("prior_thickness", FieldKind::Float)
                .argstr("%s")
                .position(5)
                .requires(["smooth_param"]),
        )
        .with_field(
            Field::new("dT", FieldKind::Float)
                .argstr("%s")
                .position(6)
                .requires(["prior_thickness"])
                .desc("time delta used during integration"),
        )
        .with_field(
            Field::new("sulcus_prior", FieldKind::Float)
                .argstr("%s")
                .position(7)
                .requires(["dT"]),
        )
        .with_field(
            Field::new("tolerance", FieldKind::Float)
                .argstr("%s")
                .position(8)
                .requires(["sulcus_prior"]),
        )
        .with_output(OutputDescriptor::file("output_image"))
}
