//! ParseDICOMDir: summarise the series in a DICOM directory.

use crate::subjects_environment;
use cerebra_core::{ExecutionError, ResolutionError};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, ToolFamily,
    ToolSchema,
};

/// Information file written when none is named
pub const DEFAULT_INFO_FILE: &str = "dicominfo.txt";

/// `mri_parse_sdcmdir` wrapper
#[derive(Debug, Clone)]
pub struct ParseDicomDir {
    schema: ToolSchema,
}

impl ParseDicomDir {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for ParseDicomDir {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for ParseDicomDir {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        Ok(match self.schema.str_of("dicom_info_file", inv, ctx) {
            Some(info) => OutputPlan::new().fixed("dicom_info_file", info),
            None => OutputPlan::new(),
        })
    }

    fn environment(&self, ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        Ok(subjects_environment(ctx))
    }
}

fn schema() -> ToolSchema {
    ToolSchema::new("ParseDICOMDir", "mri_parse_sdcmdir", ToolFamily::FreeSurfer)
        .with_description("Write a text summary of the series in a DICOM directory")
        .with_field(
            Field::new("dicom_dir", FieldKind::existing_file())
                .argstr("--d %s")
                .position(0)
                .mandatory()
                .desc("directory holding the DICOM files"),
        )
        .with_field(
            Field::new("dicom_info_file", FieldKind::file())
                .argstr("--o %s")
                .position(1)
                .default_value(DEFAULT_INFO_FILE)
                .desc("file the summary is written to"),
        )
        .with_field(
            Field::new("sortbyrun", FieldKind::Bool)
                .argstr("--sortbyrun")
                .desc("assign run numbers"),
        )
        .with_field(
            Field::new("summarize", FieldKind::Bool)
                .argstr("--summarize")
                .desc("only print run leaders"),
        )
        .with_output(
            OutputDescriptor::file("dicom_info_file").desc("text file describing each series"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cerebra_core::ValidationError;

    #[test]
    fn test_cmdline() {
        let inv = Invocation::new("ParseDICOMDir")
            .with("dicom_dir", ".")
            .with("sortbyrun", true)
            .with("summarize", true);
        let line = ParseDicomDir::new().compile(&inv, &Context::default()).unwrap();
        assert_eq!(
            line.cmdline(),
            "mri_parse_sdcmdir --d . --o dicominfo.txt --sortbyrun --summarize"
        );
    }

    #[test]
    fn test_dicom_dir_required() {
        let err = ParseDicomDir::new()
            .validate(&Invocation::new("ParseDICOMDir"), &Context::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingMandatory { .. }));
    }

    #[test]
    fn test_info_file_in_workdir() {
        let work = tempfile::tempdir().unwrap();
        let ctx = Context::new(work.path());
        let inv = Invocation::new("ParseDICOMDir").with("dicom_dir", ".");
        let outputs = ParseDicomDir::new().resolve(&inv, &ctx).unwrap();
        assert_eq!(
            outputs.file("dicom_info_file"),
            Some(work.path().join(DEFAULT_INFO_FILE).as_path())
        );

        let inv = inv.with("dicom_info_file", "series.txt");
        let outputs = ParseDicomDir::new().resolve(&inv, &ctx).unwrap();
        assert_eq!(
            outputs.file("dicom_info_file"),
            Some(work.path().join("series.txt").as_path())
        );
    }
}
