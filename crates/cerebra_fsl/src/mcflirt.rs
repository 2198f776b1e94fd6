//! MCFLIRT: intra-modal motion correction of a time series.

use crate::output_type::{gen_fname, output_environment, sibling, OutputType};
use cerebra_core::{ExecutionError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, ToolFamily,
    ToolSchema,
};

/// FSL motion correction
#[derive(Debug, Clone)]
pub struct McFlirt {
    schema: ToolSchema,
}

impl McFlirt {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for McFlirt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for McFlirt {
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
        if s.flag_of("meanvol", inv, ctx) {
            plan = plan.fixed("mean_img", sibling(&out, "_mean_reg", ext));
        }
        if s.flag_of("saveplots", inv, ctx) {
            plan = plan.fixed("par_file", format!("{}.par", out));
        }
        if s.flag_of("savemats", inv, ctx) {
            let dir = ctx.resolve_path(format!("{}.mat", out));
            let pattern = format!(
                "{}/MAT_*",
                glob::Pattern::escape(&dir.to_string_lossy())
            );
            plan = plan.glob("mat_files", pattern);
        }
        if s.flag_of("statsimgs", inv, ctx) {
            plan = plan
                .fixed("variance_img", sibling(&out, "_variance", ext))
                .fixed("std_img", sibling(&out, "_sigma", ext));
        }
        Ok(plan)
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        output_environment(self.name(), ctx)
    }
}

fn gen_out_file(inv: &Invocation, ctx: &Context) -> Option<Value> {
    gen_fname(inv, ctx, "in_file", "_mcf", None)
}

fn schema() -> ToolSchema {
    ToolSchema::new("MCFLIRT", "mcflirt", ToolFamily::Fsl)
        .with_description("Rigid-body motion correction of a 4D series")
        .with_field(
            Field::new("in_file", FieldKind::existing_file())
                .argstr("-in %s")
                .position(0)
                .mandatory(),
        )
        .with_field(
            Field::new("out_file", FieldKind::file())
                .argstr("-out %s")
                .position(1)
                .generator(gen_out_file),
        )
        .with_field(
            Field::new(
                "cost",
                FieldKind::choice([
                    "mutualinfo",
                    "woods",
                    "corratio",
                    "normcorr",
                    "normmi",
                    "leastsquares",
                ]),
            )
            .argstr("-cost %s"),
        )
        .with_field(Field::new("bins", FieldKind::Int).argstr("-bins %d"))
        .with_field(Field::new("dof", FieldKind::Int).argstr("-dof %d"))
        .with_field(
            Field::new("refvol", FieldKind::Int)
                .argstr("-refvol %d")
                .desc("volume to register the series to"),
        )
        .with_field(Field::new("scaling", FieldKind::Float).argstr("-scaling %.2f"))
        .with_field(Field::new("smooth", FieldKind::Float).argstr("-smooth %.2f"))
        .with_field(Field::new("rotation", FieldKind::Int).argstr("-rotation %d"))
        .with_field(Field::new("verbose", FieldKind::Bool).argstr("-verbose"))
        .with_field(Field::new("stages", FieldKind::Int).argstr("-stages %d"))
        .with_field(Field::new("init", FieldKind::file()).argstr("-init %s"))
        .with_field(Field::new("usegradient", FieldKind::Bool).argstr("-gdt"))
        .with_field(Field::new("usecontour", FieldKind::Bool).argstr("-edge"))
        .with_field(Field::new("meanvol", FieldKind::Bool).argstr("-meanvol"))
        .with_field(Field::new("statsimgs", FieldKind::Bool).argstr("-stats"))
        .with_field(Field::new("savemats", FieldKind::Bool).argstr("-mats"))
        .with_field(Field::new("saveplots", FieldKind::Bool).argstr("-plots"))
        .with_field(Field::new("report", FieldKind::Bool).argstr("-report"))
        .with_output(OutputDescriptor::file("out_file"))
        .with_output(OutputDescriptor::file("mean_img"))
        .with_output(OutputDescriptor::file("par_file"))
        .with_output(OutputDescriptor::files("mat_files"))
        .with_output(OutputDescriptor::file("variance_img"))
        .with_output(OutputDescriptor::file("std_img"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_type::OUTPUT_TYPE_VAR;

    struct Fixture {
        dir: tempfile::TempDir,
        infile: String,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let infile = dir.path().join("foo.nii");
            std::fs::write(&infile, b"").unwrap();
            Self {
                infile: infile.to_string_lossy().into_owned(),
                dir,
            }
        }

        fn ctx(&self) -> Context {
            Context::new(self.dir.path()).with_env(OUTPUT_TYPE_VAR, "NIFTI")
        }

        fn inv(&self) -> Invocation {
            Invocation::new("MCFLIRT").with("in_file", self.infile.as_str())
        }
    }

    #[test]
    fn test_out_file() {
        let f = Fixture::new();
        let line = McFlirt::new().compile(&f.inv(), &f.ctx()).unwrap();
        let generated = f.dir.path().join("foo_mcf.nii");
        assert_eq!(
            line.cmdline(),
            format!("mcflirt -in {} -out {}", f.infile, generated.display())
        );

        let inv = f.inv().with("out_file", "/newdata/bar.nii");
        let line = McFlirt::new().compile(&inv, &f.ctx()).unwrap();
        assert_eq!(line.cmdline(), format!("mcflirt -in {} -out /newdata/bar.nii", f.infile));
    }

    #[test]
    fn test_each_option() {
        let f = Fixture::new();
        let options: Vec<(&str, Value, &str)> = vec![
            ("cost", Value::from("mutualinfo"), "-cost mutualinfo"),
            ("bins", Value::Int(256), "-bins 256"),
            ("dof", Value::Int(6), "-dof 6"),
            ("refvol", Value::Int(2), "-refvol 2"),
            ("scaling", Value::Float(6.0), "-scaling 6.00"),
            ("smooth", Value::Float(1.0), "-smooth 1.00"),
            ("rotation", Value::Int(2), "-rotation 2"),
            ("verbose", Value::Bool(true), "-verbose"),
            ("stages", Value::Int(3), "-stages 3"),
            ("init", Value::from("matrix.mat"), "-init matrix.mat"),
            ("usegradient", Value::Bool(true), "-gdt"),
            ("usecontour", Value::Bool(true), "-edge"),
            ("meanvol", Value::Bool(true), "-meanvol"),
            ("statsimgs", Value::Bool(true), "-stats"),
            ("savemats", Value::Bool(true), "-mats"),
            ("saveplots", Value::Bool(true), "-plots"),
            ("report", Value::Bool(true), "-report"),
        ];
        for (name, value, expected) in options {
            let inv = f.inv().with("out_file", "bar.nii").with(name, value);
            let line = McFlirt::new().compile(&inv, &f.ctx()).unwrap();
            assert_eq!(
                line.cmdline(),
                format!("mcflirt -in {} -out bar.nii {}", f.infile, expected),
                "option {}",
                name
            );
        }
    }

    #[test]
    fn test_outputs() {
        let f = Fixture::new();
        let mats = f.dir.path().join("bar.nii.mat");
        std::fs::create_dir(&mats).unwrap();
        for name in ["MAT_0001", "MAT_0000"] {
            std::fs::write(mats.join(name), b"").unwrap();
        }

        let inv = f
            .inv()
            .with("out_file", "bar.nii")
            .with("meanvol", true)
            .with("saveplots", true)
            .with("savemats", true);
        let outputs = McFlirt::new().resolve(&inv, &f.ctx()).unwrap();
        let at = |name: &str| f.dir.path().join(name);

        assert_eq!(outputs.file("mean_img"), Some(at("bar_mean_reg.nii").as_path()));
        assert_eq!(outputs.file("par_file"), Some(at("bar.nii.par").as_path()));
        assert_eq!(
            outputs.files("mat_files").unwrap(),
            &[mats.join("MAT_0000"), mats.join("MAT_0001")]
        );
        assert!(!outputs.contains("variance_img"));
    }
}
