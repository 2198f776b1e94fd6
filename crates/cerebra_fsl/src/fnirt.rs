//! FNIRT non-linear registration and `ApplyWarp`.
//!
//! FNIRT takes `--key=value` options. Per-level settings (sub-sampling,
//! iterations, smoothing) accept one value or one value per level and are
//! joined with commas.

use crate::output_type::{gen_fname, output_environment};
use cerebra_core::{CompileError, ExecutionError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, RenderCtx,
    ToolFamily, ToolSchema,
};

/// Files FNIRT writes, only when asked for
const WRITTEN: [&str; 7] = [
    "fieldcoeff_file",
    "outimage",
    "fieldfile",
    "jacobianfile",
    "reffile",
    "intensityfile",
    "logfile",
];

/// FSL non-linear image registration
#[derive(Debug, Clone)]
pub struct Fnirt {
    schema: ToolSchema,
}

impl Fnirt {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: fnirt_schema(),
        }
    }
}

impl Default for Fnirt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for Fnirt {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, _ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let mut plan = OutputPlan::new();
        for name in WRITTEN {
            if let Some(value) = inv.get(name) {
                plan = plan.fixed(name, value.to_string());
            }
        }
        Ok(plan)
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        output_environment(self.name(), ctx)
    }
}

/// Apply a FNIRT warp field to an image
#[derive(Debug, Clone)]
pub struct ApplyWarp {
    schema: ToolSchema,
}

impl ApplyWarp {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: applywarp_schema(),
        }
    }
}

impl Default for ApplyWarp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for ApplyWarp {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        Ok(match self.schema.str_of("out_file", inv, ctx) {
            Some(out) => OutputPlan::new().fixed("out_file", out),
            None => OutputPlan::new(),
        })
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        output_environment(self.name(), ctx)
    }
}

fn per_level(name: &str, argstr: &str) -> Field {
    Field::new(name, FieldKind::list(FieldKind::Int))
        .argstr(argstr)
        .sep(",")
}

fn per_level_float(name: &str, argstr: &str) -> Field {
    Field::new(name, FieldKind::list(FieldKind::Float))
        .argstr(argstr)
        .renderer(render_floats)
        .desc("rendered with six decimals per level")
}

/// `%f` applied to every level, comma-joined
fn render_floats(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let items = match value {
        Value::List(items) => items.as_slice(),
        scalar => std::slice::from_ref(scalar),
    };
    let parts = items
        .iter()
        .map(|item| ctx.format("%f", std::slice::from_ref(item)))
        .collect::<Result<Vec<_>, _>>()?;
    ctx.format(ctx.argstr(), &[Value::Str(parts.join(","))]).map(Some)
}

fn fnirt_schema() -> ToolSchema {
    ToolSchema::new("FNIRT", "fnirt", ToolFamily::Fsl)
        .with_description("Non-linear registration of an image to a reference")
        .with_field(
            Field::new("in_file", FieldKind::existing_file())
                .argstr("--in=%s")
                .position(0)
                .mandatory(),
        )
        .with_field(
            Field::new("reference", FieldKind::existing_file())
                .argstr("--ref=%s")
                .position(1)
                .mandatory(),
        )
        .with_field(Field::new("affine", FieldKind::file()).argstr("--aff=%s"))
        .with_field(Field::new("initwarp", FieldKind::file()).argstr("--inwarp=%s"))
        .with_field(Field::new("initintensity", FieldKind::file()).argstr("--intin=%s"))
        .with_field(Field::new("configfile", FieldKind::file()).argstr("--config=%s"))
        .with_field(Field::new("referencemask", FieldKind::file()).argstr("--refmask=%s"))
        .with_field(Field::new("imagemask", FieldKind::file()).argstr("--inmask=%s"))
        .with_field(Field::new("fieldcoeff_file", FieldKind::file()).argstr("--cout=%s"))
        .with_field(Field::new("outimage", FieldKind::file()).argstr("--iout=%s"))
        .with_field(Field::new("fieldfile", FieldKind::file()).argstr("--fout=%s"))
        .with_field(Field::new("jacobianfile", FieldKind::file()).argstr("--jout=%s"))
        .with_field(Field::new("reffile", FieldKind::file()).argstr("--refout=%s"))
        .with_field(Field::new("intensityfile", FieldKind::file()).argstr("--intout=%s"))
        .with_field(Field::new("logfile", FieldKind::file()).argstr("--logout=%s"))
        .with_field(Field::new("verbose", FieldKind::Bool).argstr("--verbose"))
        .with_field(
            Field::new("flags", FieldKind::Str)
                .argstr("%s")
                .desc("passed through verbatim"),
        )
        .with_field(per_level("sub_sampling", "--subsamp=%s"))
        .with_field(per_level("max_iter", "--miter=%s"))
        .with_field(per_level("referencefwhm", "--reffwhm=%s"))
        .with_field(per_level("imgfwhm", "--infwhm=%s"))
        .with_field(per_level("lambdas", "--lambda=%s"))
        .with_field(per_level("estintensity", "--estint=%s"))
        .with_field(per_level_float("applyrefmask", "--applyrefmask=%s"))
        .with_field(per_level_float("applyimgmask", "--applyinmask=%s"))
        .with_output(OutputDescriptor::file("fieldcoeff_file"))
        .with_output(OutputDescriptor::file("outimage"))
        .with_output(OutputDescriptor::file("fieldfile"))
        .with_output(OutputDescriptor::file("jacobianfile"))
        .with_output(OutputDescriptor::file("reffile"))
        .with_output(OutputDescriptor::file("intensityfile"))
        .with_output(OutputDescriptor::file("logfile"))
}

fn gen_warped(inv: &Invocation, ctx: &Context) -> Option<Value> {
    gen_fname(inv, ctx, "in_file", "_warp", None)
}

fn applywarp_schema() -> ToolSchema {
    ToolSchema::new("ApplyWarp", "applywarp", ToolFamily::Fsl)
        .with_description("Resample an image through a warp field")
        .with_field(
            Field::new("in_file", FieldKind::existing_file())
                .argstr("--in=%s")
                .position(0)
                .mandatory(),
        )
        .with_field(
            Field::new("out_file", FieldKind::file())
                .argstr("--out=%s")
                .position(1)
                .generator(gen_warped),
        )
        .with_field(
            Field::new("reference", FieldKind::existing_file())
                .argstr("--ref=%s")
                .position(2)
                .mandatory(),
        )
        .with_field(Field::new("fieldfile", FieldKind::existing_file()).argstr("--warp=%s"))
        .with_field(Field::new("premat", FieldKind::existing_file()).argstr("--premat=%s"))
        .with_field(Field::new("postmat", FieldKind::existing_file()).argstr("--postmat=%s"))
        .with_output(OutputDescriptor::file("out_file"))
}
