//! Cerebra CLI
//!
//! Lists the registered tool interfaces, describes their fields, compiles
//! invocations read from JSON, and runs them.

#![warn(missing_docs)]
#![warn(clippy::all)]

use cerebra_core::Version;
use cerebra_runtime::{Executor, Job};
use cerebra_tool::compile::argument_order;
use cerebra_tool::{Context, Invocation, Registry, ToolFamily, ToolSchema};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter
const LOG_VAR: &str = "CEREBRA_LOG";
const DEFAULT_FILTER: &str = "cerebra=info";

#[derive(Parser)]
#[command(name = "cerebra")]
#[command(about = "Cerebra - typed wrappers for neuroimaging command-line tools", long_about = None)]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered tools
    List,
    /// Show a tool's fields and outputs
    Describe {
        /// Tool name
        tool: String,
    },
    /// Print the command line an invocation compiles to
    Cmdline(InvocationArgs),
    /// Run an invocation and print its outputs as JSON
    Run(InvocationArgs),
}

#[derive(Args)]
struct InvocationArgs {
    /// Tool name
    tool: String,
    /// JSON object of field values
    #[arg(short, long)]
    inputs: PathBuf,
    /// Working directory, the current directory when omitted
    #[arg(short, long)]
    workdir: Option<PathBuf>,
    /// Do not check that input files exist
    #[arg(long)]
    no_input_checks: bool,
    /// Installed tool version as family=version, e.g. ants=2.1.0
    #[arg(long = "tool-version", value_parser = parse_tool_version)]
    tool_versions: Vec<(ToolFamily, Version)>,
}

fn parse_tool_version(s: &str) -> Result<(ToolFamily, Version), String> {
    let (family, version) = s
        .split_once('=')
        .ok_or_else(|| format!("expected family=version, got '{}'", s))?;
    let family = family.parse::<ToolFamily>()?;
    let version = version.parse::<Version>().map_err(|e| e.to_string())?;
    Ok((family, version))
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Registry of every interface the binary ships
fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    cerebra_ants::register(&mut registry)?;
    cerebra_fsl::register(&mut registry)?;
    cerebra_freesurfer::register(&mut registry)?;
    Ok(registry)
}

impl InvocationArgs {
    fn context(&self) -> Result<Context> {
        let mut ctx = Context::from_env().wrap_err("cannot read the current directory")?;
        if let Some(dir) = &self.workdir {
            ctx = ctx.with_workdir(dir.clone());
        }
        ctx = ctx.with_input_checks(!self.no_input_checks);
        for (family, version) in &self.tool_versions {
            ctx = ctx.with_version(*family, *version);
        }
        Ok(ctx)
    }

    fn invocation(&self) -> Result<Invocation> {
        let json = std::fs::read_to_string(&self.inputs)
            .wrap_err_with(|| format!("cannot read {}", self.inputs.display()))?;
        Ok(Invocation::from_json(&self.tool, &json)?)
    }
}

fn describe(schema: &ToolSchema) -> String {
    let mut out = format!(
        "{} ({}, {})\n{}\n\nFields:\n",
        schema.name, schema.command, schema.family, schema.description
    );
    for field in argument_order(schema) {
        let mut line = format!("  {:<36} {}", field.name, field.kind.describe());
        if field.mandatory {
            line.push_str(", mandatory");
        }
        if let Some(default) = &field.default {
            line.push_str(&format!(", default {}", default));
        }
        if let Some(argstr) = &field.argstr {
            line.push_str(&format!(", `{}`", argstr));
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("\nOutputs:\n");
    for output in schema.outputs.values() {
        let shape = if output.multi { "files" } else { "file" };
        let optional = if output.must_exist { "" } else { ", optional" };
        out.push_str(&format!("  {:<36} {}{}\n", output.name, shape, optional));
    }
    out
}

fn cmdline(registry: &Registry, args: &InvocationArgs) -> Result<String> {
    let interface = registry.get(&args.tool)?;
    let ctx = args.context()?;
    let line = interface.compile(&args.invocation()?, &ctx)?;
    Ok(line.cmdline())
}

fn run(registry: &Registry, args: &InvocationArgs) -> Result<String> {
    let interface = registry.get(&args.tool)?;
    let ctx = args.context()?;
    let mut job = Job::new(interface, args.invocation()?);
    tracing::debug!(
        tool = %args.tool,
        workdir = %ctx.workdir.display(),
        checks = ctx.check_inputs_exist,
        "context ready"
    );
    let outputs = job.run(&ctx, &Executor::new())?;
    Ok(serde_json::to_string_pretty(&outputs)?)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.json);
    let registry = registry()?;

    match cli.command {
        Commands::List => {
            for interface in registry.iter() {
                let schema = interface.schema();
                println!("{:<24} {:<10} {}", schema.name, schema.family, schema.command);
            }
        }
        Commands::Describe { tool } => {
            print!("{}", describe(registry.get(&tool)?.schema()));
        }
        Commands::Cmdline(args) => println!("{}", cmdline(&registry, &args)?),
        Commands::Run(args) => println!("{}", run(&registry, &args)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tool: &str, inputs: PathBuf, workdir: PathBuf) -> InvocationArgs {
        InvocationArgs {
            tool: tool.to_string(),
            inputs,
            workdir: Some(workdir),
            no_input_checks: false,
            tool_versions: Vec::new(),
        }
    }

    #[test]
    fn test_registry_holds_every_family() {
        let registry = registry().unwrap();
        assert_eq!(registry.count(), 16);
        for name in ["Atropos", "BET", "ParseDICOMDir"] {
            assert!(registry.contains(name), "{}", name);
        }
    }

    #[test]
    fn test_parse_tool_version() {
        assert_eq!(
            parse_tool_version("ants=2.1.0").unwrap(),
            (ToolFamily::Ants, Version::new(2, 1, 0))
        );
        assert!(parse_tool_version("ants").is_err());
        assert!(parse_tool_version("spm=12").is_err());
    }

    #[test]
    fn test_cli_parses_invocation_args() {
        let cli = Cli::try_parse_from([
            "cerebra",
            "cmdline",
            "BET",
            "--inputs",
            "in.json",
            "--no-input-checks",
            "--tool-version",
            "fsl=6.0.7",
        ])
        .unwrap();
        let Commands::Cmdline(args) = cli.command else {
            panic!("expected cmdline");
        };
        assert_eq!(args.tool, "BET");
        assert!(args.no_input_checks);
        assert_eq!(args.tool_versions, vec![(ToolFamily::Fsl, Version::new(6, 0, 7))]);
    }

    #[test]
    fn test_cmdline_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = dir.path().join("in.json");
        std::fs::write(&inputs, r#"{"dicom_dir": ".", "summarize": true, "sortbyrun": null}"#)
            .unwrap();
        let line = cmdline(
            &registry().unwrap(),
            &args("ParseDICOMDir", inputs, dir.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(line, "mri_parse_sdcmdir --d . --o dicominfo.txt --summarize");
    }

    #[test]
    fn test_cmdline_reports_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = dir.path().join("in.json");
        std::fs::write(&inputs, "{}").unwrap();
        let err = cmdline(
            &registry().unwrap(),
            &args("ParseDICOMDir", inputs, dir.path().to_path_buf()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("dicom_dir"), "{}", err);
    }

    #[test]
    fn test_unknown_tool_reported_by_registry() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmdline(
            &registry().unwrap(),
            &args("SPM", dir.path().join("in.json"), dir.path().to_path_buf()),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "interface not found: SPM");
    }

    #[test]
    fn test_describe_lists_fields_and_outputs() {
        let registry = registry().unwrap();
        let text = describe(registry.get("ParseDICOMDir").unwrap().schema());
        assert!(text.starts_with("ParseDICOMDir (mri_parse_sdcmdir, freesurfer)"));
        assert!(text.contains("dicom_dir"));
        assert!(text.contains("mandatory"));
        assert!(text.contains("default dicominfo.txt"));
        assert!(text.contains("Outputs:\n  dicom_info_file"));
    }
}
