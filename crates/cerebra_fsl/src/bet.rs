//! BET: brain extraction.

use crate::output_type::{gen_fname, output_environment, sibling, OutputType};
use cerebra_core::{ExecutionError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, ToolFamily,
    ToolSchema,
};

/// Variants of the extraction that may not be combined
const MODES: [&str; 7] = [
    "robust",
    "padding",
    "remove_eyes",
    "surfaces",
    "t2_guided",
    "functional",
    "reduce_bias",
];

/// FSL brain extraction tool
#[derive(Debug, Clone)]
pub struct Bet {
    schema: ToolSchema,
}

impl Bet {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for Bet {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for Bet {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let s = &self.schema;
        let Some(out) = s.str_of("out_file", inv, ctx) else {
            return Ok(OutputPlan::new());
        };
        let ext = OutputType::from_context_or_default(ctx).extension();

        let mut plan = OutputPlan::new().fixed("out_file", out.as_str());
        if s.flag_of("mask", inv, ctx) {
            plan = plan.fixed("mask_file", sibling(&out, "_mask", ext));
        }
        if s.flag_of("outline", inv, ctx) {
            plan = plan.fixed("outline_file", sibling(&out, "_overlay", ext));
        }
        if s.flag_of("skull", inv, ctx) {
            plan = plan.fixed("skull_file", sibling(&out, "_skull", ext));
        }
        if s.flag_of("mesh", inv, ctx) {
            plan = plan.fixed("mesh_file", sibling(&out, "_mesh", ".vtk"));
        }
        Ok(plan)
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        output_environment(self.name(), ctx)
    }
}

fn gen_out_file(inv: &Invocation, ctx: &Context) -> Option<Value> {
    gen_fname(inv, ctx, "in_file", "_brain", None)
}

fn mode(name: &str, argstr: &str) -> Field {
    let others = MODES.iter().copied().filter(|m| *m != name);
    Field::new(name, FieldKind::Bool).argstr(argstr).xor(others)
}

fn schema() -> ToolSchema {
    ToolSchema::new("BET", "bet", ToolFamily::Fsl)
        .with_description("Delete non-brain tissue from an image of the whole head")
        .with_field(
            Field::new("in_file", FieldKind::existing_file())
                .argstr("%s")
                .position(0)
                .mandatory(),
        )
        .with_field(
            Field::new("out_file", FieldKind::file())
                .argstr("%s")
                .position(1)
                .generator(gen_out_file)
                .desc("defaults to <input>_brain in the working directory"),
        )
        .with_field(Field::new("outline", FieldKind::Bool).argstr("-o"))
        .with_field(Field::new("mask", FieldKind::Bool).argstr("-m").desc("create a binary mask"))
        .with_field(Field::new("skull", FieldKind::Bool).argstr("-s"))
        .with_field(Field::new("no_output", FieldKind::Bool).argstr("-n"))
        .with_field(
            Field::new("frac", FieldKind::Float)
                .argstr("-f %.2f")
                .desc("fractional intensity threshold"),
        )
        .with_field(Field::new("vertical_gradient", FieldKind::Float).argstr("-g %.2f"))
        .with_field(Field::new("radius", FieldKind::Int).argstr("-r %d").desc("head radius"))
        .with_field(
            Field::new(
                "center",
                FieldKind::list_bounded(FieldKind::Int, Some(3), Some(3)),
            )
            .argstr("-c %s")
            .desc("centre of gravity in voxels"),
        )
        .with_field(Field::new("threshold", FieldKind::Bool).argstr("-t"))
        .with_field(Field::new("mesh", FieldKind::Bool).argstr("-e"))
        .with_field(mode("robust", "-R"))
        .with_field(mode("padding", "-Z"))
        .with_field(mode("remove_eyes", "-S"))
        .with_field(mode("surfaces", "-A"))
        .with_field(
            Field::new("t2_guided", FieldKind::existing_file())
                .argstr("-A2 %s")
                .xor(MODES.iter().copied().filter(|m| *m != "t2_guided")),
        )
        .with_field(mode("functional", "-F"))
        .with_field(mode("reduce_bias", "-B"))
        .with_field(Field::new("verbose", FieldKind::Bool).argstr("-v"))
        .with_output(OutputDescriptor::file("out_file"))
        .with_output(OutputDescriptor::file("mask_file"))
        .with_output(OutputDescriptor::file("outline_file"))
        .with_output(OutputDescriptor::file("skull_file"))
        .with_output(OutputDescriptor::file("mesh_file"))
}
