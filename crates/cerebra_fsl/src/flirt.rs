//! FLIRT: linear registration, and `ApplyXfm` for resampling through an
//! existing affine.

use crate::output_type::{gen_fname, output_environment};
use cerebra_core::{ExecutionError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, ToolFamily,
    ToolSchema,
};

const COSTS: [&str; 7] = [
    "mutualinfo",
    "corratio",
    "normcorr",
    "normmi",
    "leastsq",
    "labeldiff",
    "bbr",
];

/// FSL linear image registration
#[derive(Debug, Clone)]
pub struct Flirt {
    schema: ToolSchema,
}

impl Flirt {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: schema("FLIRT", false),
        }
    }
}

impl Default for Flirt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for Flirt {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        Ok(plan(&self.schema, inv, ctx))
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        output_environment(self.name(), ctx)
    }
}

/// FLIRT restricted to applying a known transform
///
/// `in_matrix_file` is mandatory and `-applyxfm` is on by default.
#[derive(Debug, Clone)]
pub struct ApplyXfm {
    schema: ToolSchema,
}

impl ApplyXfm {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: schema("ApplyXfm", true),
        }
    }
}

impl Default for ApplyXfm {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for ApplyXfm {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        Ok(plan(&self.schema, inv, ctx))
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        output_environment(self.name(), ctx)
    }
}

fn plan(schema: &ToolSchema, inv: &Invocation, ctx: &Context) -> OutputPlan {
    let mut plan = OutputPlan::new();
    for name in ["out_file", "out_matrix_file"] {
        if let Some(path) = schema.str_of(name, inv, ctx) {
            plan = plan.fixed(name, path);
        }
    }
    plan
}

fn gen_out_file(inv: &Invocation, ctx: &Context) -> Option<Value> {
    gen_fname(inv, ctx, "in_file", "_flirt", None)
}

fn gen_out_matrix(inv: &Invocation, ctx: &Context) -> Option<Value> {
    gen_fname(inv, ctx, "in_file", "_flirt", Some(".mat"))
}

fn search_range(name: &str, argstr: &str) -> Field {
    Field::new(name, FieldKind::list_bounded(FieldKind::Int, Some(2), Some(2)))
        .argstr(argstr)
        .desc("search angles in degrees, as min max")
}

fn schema(name: &str, apply_xfm: bool) -> ToolSchema {
    let mut apply = Field::new("apply_xfm", FieldKind::Bool)
        .argstr("-applyxfm")
        .desc("apply the transform given by in_matrix_file");
    let mut init = Field::new("in_matrix_file", FieldKind::existing_file())
        .argstr("-init %s")
        .desc("input 4x4 affine matrix");
    if apply_xfm {
        apply = apply.default_value(true);
        init = init.mandatory();
    }

    ToolSchema::new(name, "flirt", ToolFamily::Fsl)
        .with_description("Linear (affine) intra- and inter-modal brain image registration")
        .with_field(
            Field::new("in_file", FieldKind::existing_file())
                .argstr("-in %s")
                .position(0)
                .mandatory(),
        )
        .with_field(
            Field::new("reference", FieldKind::existing_file())
                .argstr("-ref %s")
                .position(1)
                .mandatory(),
        )
        .with_field(
            Field::new("out_file", FieldKind::file())
                .argstr("-out %s")
                .position(2)
                .generator(gen_out_file)
                .desc("registered image"),
        )
        .with_field(
            Field::new("out_matrix_file", FieldKind::file())
                .argstr("-omat %s")
                .position(3)
                .generator(gen_out_matrix)
                .desc("estimated 4x4 affine matrix"),
        )
        .with_field(init)
        .with_field(apply)
        .with_field(
            Field::new(
                "datatype",
                FieldKind::choice(["char", "short", "int", "float", "double"]),
            )
            .argstr("-datatype %s"),
        )
        .with_field(Field::new("cost", FieldKind::choice(COSTS)).argstr("-cost %s"))
        .with_field(Field::new("searchcost", FieldKind::choice(COSTS)).argstr("-searchcost %s"))
        .with_field(Field::new("uses_qform", FieldKind::Bool).argstr("-usesqform"))
        .with_field(Field::new("display_init", FieldKind::Bool).argstr("-displayinit"))
        .with_field(
            Field::new("angle_rep", FieldKind::choice(["quaternion", "euler"]))
                .argstr("-anglerep %s"),
        )
        .with_field(
            Field::new(
                "interp",
                FieldKind::choice(["trilinear", "nearestneighbour", "sinc", "spline"]),
            )
            .argstr("-interp %s"),
        )
        .with_field(Field::new("sinc_width", FieldKind::Int).argstr("-sincwidth %d"))
        .with_field(
            Field::new(
                "sinc_window",
                FieldKind::choice(["rectangular", "hanning", "blackman"]),
            )
            .argstr("-sincwindow %s"),
        )
        .with_field(Field::new("bins", FieldKind::Int).argstr("-bins %d"))
        .with_field(Field::new("dof", FieldKind::Int).argstr("-dof %d").desc("degrees of freedom"))
        .with_field(Field::new("no_resample", FieldKind::Bool).argstr("-noresample"))
        .with_field(Field::new("force_scaling", FieldKind::Bool).argstr("-forcescaling"))
        .with_field(Field::new("min_sampling", FieldKind::Float).argstr("-minsampling %f"))
        .with_field(Field::new("padding_size", FieldKind::Int).argstr("-paddingsize %d"))
        .with_field(search_range("searchr_x", "-searchrx %s"))
        .with_field(search_range("searchr_y", "-searchry %s"))
        .with_field(search_range("searchr_z", "-searchrz %s"))
        .with_field(Field::new("no_search", FieldKind::Bool).argstr("-nosearch"))
        .with_field(Field::new("coarse_search", FieldKind::Int).argstr("-coarsesearch %d"))
        .with_field(Field::new("fine_search", FieldKind::Int).argstr("-finesearch %d"))
        .with_field(Field::new("schedule", FieldKind::existing_file()).argstr("-schedule %s"))
        .with_field(Field::new("ref_weight", FieldKind::existing_file()).argstr("-refweight %s"))
        .with_field(Field::new("in_weight", FieldKind::existing_file()).argstr("-inweight %s"))
        .with_field(Field::new("no_clamp", FieldKind::Bool).argstr("-noclamp"))
        .with_field(Field::new("no_resample_blur", FieldKind::Bool).argstr("-noresampblur"))
        .with_field(Field::new("rigid2D", FieldKind::Bool).argstr("-2D"))
        .with_field(Field::new("verbose", FieldKind::Int).argstr("-verbose %d"))
        .with_output(OutputDescriptor::file("out_file"))
        .with_output(OutputDescriptor::file("out_matrix_file"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_type::OUTPUT_TYPE_VAR;
    use cerebra_core::ValidationError;

    struct Fixture {
        dir: tempfile::TempDir,
        infile: String,
        reffile: String,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = |name: &str| {
                let p = dir.path().join(name);
                std::fs::write(&p, b"").unwrap();
                p.to_string_lossy().into_owned()
            };
            let infile = path("foo.nii");
            let reffile = path("bar.nii");
            Self {
                dir,
                infile,
                reffile,
            }
        }

        fn ctx(&self) -> Context {
            Context::new(self.dir.path()).with_env(OUTPUT_TYPE_VAR, "NIFTI")
        }

        fn inv(&self, tool: &str) -> Invocation {
            Invocation::new(tool)
                .with("in_file", self.infile.as_str())
                .with("reference", self.reffile.as_str())
        }

        fn at(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }
    }

    #[test]
    fn test_explicit_outputs() {
        let f = Fixture::new();
        let inv = f
            .inv("FLIRT")
            .with("out_file", "outfile")
            .with("out_matrix_file", "outmat.mat")
            .with("bins", 256)
            .with("cost", "mutualinfo");
        let line = Flirt::new().compile(&inv, &f.ctx()).unwrap();
        assert_eq!(
            line.cmdline(),
            format!(
                "flirt -in {} -ref {} -out outfile -omat outmat.mat -bins 256 -cost mutualinfo",
                f.infile, f.reffile
            )
        );
    }

    #[test]
    fn test_generated_outputs() {
        let f = Fixture::new();
        let line = Flirt::new().compile(&f.inv("FLIRT"), &f.ctx()).unwrap();
        assert_eq!(
            line.cmdline(),
            format!(
                "flirt -in {} -ref {} -out {} -omat {}",
                f.infile,
                f.reffile,
                f.at("foo_flirt.nii"),
                f.at("foo_flirt.mat")
            )
        );
        let outputs = Flirt::new().resolve(&f.inv("FLIRT"), &f.ctx()).unwrap();
        assert_eq!(
            outputs.file("out_matrix_file").unwrap().to_string_lossy(),
            f.at("foo_flirt.mat")
        );
    }

    #[test]
    fn test_options() {
        let f = Fixture::new();
        let options: Vec<(&str, Value, &str)> = vec![
            ("dof", Value::Int(6), "-dof 6"),
            ("interp", Value::from("nearestneighbour"), "-interp nearestneighbour"),
            (
                "searchr_x",
                Value::List(vec![Value::Int(-90), Value::Int(90)]),
                "-searchrx -90 90",
            ),
            ("min_sampling", Value::Float(2.0), "-minsampling 2.000000"),
            ("rigid2D", Value::Bool(true), "-2D"),
            ("verbose", Value::Int(1), "-verbose 1"),
        ];
        for (name, value, expected) in options {
            let inv = f.inv("FLIRT").with(name, value);
            let line = Flirt::new().compile(&inv, &f.ctx()).unwrap().cmdline();
            assert!(line.ends_with(expected), "option {}: {}", name, line);
        }
    }

    #[test]
    fn test_bad_cost_rejected() {
        let f = Fixture::new();
        let inv = f.inv("FLIRT").with("cost", "entropy");
        let err = Flirt::new().validate(&inv, &f.ctx()).unwrap_err();
        assert_eq!(err.field(), "cost");
    }

    #[test]
    fn test_apply_xfm() {
        let f = Fixture::new();
        let err = ApplyXfm::new().validate(&f.inv("ApplyXfm"), &f.ctx()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingMandatory { .. }));

        let inv = f
            .inv("ApplyXfm")
            .with("in_matrix_file", f.infile.as_str())
            .with("out_file", "out.nii")
            .with("out_matrix_file", "out.mat");
        let line = ApplyXfm::new().compile(&inv, &f.ctx()).unwrap();
        assert_eq!(
            line.cmdline(),
            format!(
                "flirt -in {} -ref {} -out out.nii -omat out.mat -applyxfm -init {}",
                f.infile, f.reffile, f.infile
            )
        );
    }
}
