//! Atropos: n-tissue segmentation with EM and MRF regularization.
//!
//! Most options render as bracketed composites (`--mrf [0.2,1x1x1]`), so
//! several fields carry a renderer that folds a companion field into the
//! same argument. The companion fields themselves have no template.

use crate::common::{items, xarray};
use cerebra_core::{format_g, CompileError, ResolutionError, Value};
use cerebra_tool::{
    Context, Field, FieldKind, Interface, Invocation, OutputDescriptor, OutputPlan, RenderCtx,
    ToolFamily, ToolSchema,
};

const INITIALIZATIONS: [&str; 5] = [
    "Random",
    "Otsu",
    "KMeans",
    "PriorProbabilityImages",
    "PriorLabelImage",
];

/// Atropos segmentation
#[derive(Debug, Clone)]
pub struct Atropos {
    schema: ToolSchema,
}

impl Atropos {
    /// Create the interface
    #[must_use]
    pub fn new() -> Self {
        Self { schema: schema() }
    }
}

impl Default for Atropos {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for Atropos {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError> {
        let s = &self.schema;
        let mut plan = OutputPlan::new();
        if let Some(classified) = s.str_of("out_classified_image_name", inv, ctx) {
            plan = plan.fixed("classified_image", classified);
        }
        if s.flag_of("save_posteriors", inv, ctx) {
            let template = s
                .str_of("output_posteriors_name_template", inv, ctx)
                .unwrap_or_default();
            let count = s.int_of("number_of_tissue_classes", inv, ctx).unwrap_or(0);
            plan = plan.numbered("posteriors", template, usize::try_from(count).unwrap_or(0));
        }
        Ok(plan)
    }
}

fn schema() -> ToolSchema {
    ToolSchema::new("Atropos", "Atropos", ToolFamily::Ants)
        .with_description("Multivariate n-class segmentation with EM and MRF regularization")
        .with_field(
            Field::new("dimension", FieldKind::choice([3, 2, 4]))
                .argstr("--image-dimensionality %d")
                .default_value(3)
                .desc("image dimension (2, 3, or 4)"),
        )
        .with_field(
            Field::new("intensity_images", FieldKind::list(FieldKind::existing_file()))
                .argstr("--intensity-image %s...")
                .mandatory(),
        )
        .with_field(
            Field::new("mask_image", FieldKind::existing_file())
                .argstr("--mask-image %s")
                .mandatory(),
        )
        .with_field(
            Field::new("initialization", FieldKind::choice(INITIALIZATIONS))
                .argstr("%s")
                .mandatory()
                .requires(["number_of_tissue_classes"])
                .renderer(render_initialization),
        )
        .with_field(
            Field::new(
                "kmeans_init_centers",
                FieldKind::list_bounded(FieldKind::Float, Some(1), None),
            )
            .desc("initial class centers for KMeans"),
        )
        .with_field(
            Field::new(
                "prior_image",
                FieldKind::either([FieldKind::file(), FieldKind::Str]),
            )
            .desc("label image, or a %02d pattern naming one probability image per class"),
        )
        .with_field(Field::new("number_of_tissue_classes", FieldKind::Int).mandatory())
        .with_field(Field::new("prior_weighting", FieldKind::Float))
        .with_field(
            Field::new("prior_probability_threshold", FieldKind::Float)
                .requires(["prior_weighting"]),
        )
        .with_field(Field::new("likelihood_model", FieldKind::Str).argstr("--likelihood-model %s"))
        .with_field(
            Field::new("mrf_smoothing_factor", FieldKind::Float)
                .argstr("%s")
                .renderer(render_mrf),
        )
        .with_field(
            Field::new("mrf_radius", FieldKind::list(FieldKind::Int))
                .requires(["mrf_smoothing_factor"]),
        )
        .with_field(
            Field::new("icm_use_synchronous_update", FieldKind::Bool)
                .argstr("%s")
                .renderer(render_icm),
        )
        .with_field(
            Field::new("maximum_number_of_icm_iterations", FieldKind::Int)
                .requires(["icm_use_synchronous_update"]),
        )
        .with_field(
            Field::new("n_iterations", FieldKind::Int)
                .argstr("%s")
                .renderer(render_convergence),
        )
        .with_field(
            Field::new("convergence_threshold", FieldKind::Float).requires(["n_iterations"]),
        )
        .with_field(
            Field::new("posterior_formulation", FieldKind::Str)
                .argstr("%s")
                .renderer(render_posterior_formulation),
        )
        .with_field(
            Field::new("use_mixture_model_proportions", FieldKind::Bool)
                .requires(["posterior_formulation"]),
        )
        .with_field(
            Field::new("use_random_seed", FieldKind::Bool)
                .argstr("--use-random-seed %d")
                .default_value(true)
                .desc("use a random seed instead of a fixed one"),
        )
        .with_field(
            Field::new("out_classified_image_name", FieldKind::file())
                .argstr("%s")
                .name_template("intensity_images", "%s_labeled", true)
                .renderer(render_output),
        )
        .with_field(Field::new("save_posteriors", FieldKind::Bool))
        .with_field(
            Field::new("output_posteriors_name_template", FieldKind::Str)
                .default_value("POSTERIOR_%02d.nii.gz"),
        )
        .with_output(OutputDescriptor::file("classified_image"))
        .with_output(OutputDescriptor::files("posteriors").desc("one probability image per class"))
}

fn render_initialization(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let mode = value.to_string();
    let n_classes = ctx
        .int("number_of_tissue_classes")
        .ok_or_else(|| ctx.invalid("initialization requires number_of_tissue_classes"))?;
    let expected = usize::try_from(n_classes).unwrap_or(0);
    let mut brackets = vec![n_classes.to_string()];

    match mode.as_str() {
        "KMeans" => {
            if let Some(centers) = ctx.value("kmeans_init_centers") {
                let mut centers: Vec<f64> = items(&centers).iter().filter_map(Value::as_float).collect();
                centers.sort_by(f64::total_cmp);
                centers.dedup();
                if centers.len() != expected {
                    return Err(ctx.count_mismatch(expected, centers.len()));
                }
                brackets.extend(centers.into_iter().map(format_g));
            }
        }
        "PriorProbabilityImages" | "PriorLabelImage" => {
            let (Some(prior), Some(weighting)) = (ctx.string("prior_image"), ctx.value("prior_weighting"))
            else {
                return Err(ctx.invalid(format!(
                    "'{}' initialization requires prior_image and prior_weighting",
                    mode
                )));
            };

            let paths = if prior.contains("%02d") {
                if mode == "PriorLabelImage" {
                    return Err(ctx.invalid(
                        "'PriorLabelImage' initialization does not accept a pattern for prior_image",
                    ));
                }
                (1..=n_classes)
                    .map(|i| ctx.format(&prior, &[Value::Int(i)]))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                vec![prior.clone()]
            };

            // prior files must exist whether or not input checks are enabled
            let missing: Vec<String> = paths.into_iter().filter(|p| !ctx.path(p).exists()).collect();
            if !missing.is_empty() {
                return Err(CompileError::MissingFile {
                    tool: ctx.tool().to_string(),
                    field: "prior_image".to_string(),
                    paths: missing,
                });
            }

            brackets.push(prior);
            brackets.push(format_g(weighting.as_float().unwrap_or_default()));
            if mode == "PriorProbabilityImages" {
                if let Some(threshold) = ctx.value("prior_probability_threshold").and_then(|v| v.as_float()) {
                    brackets.push(format_g(threshold));
                }
            }
        }
        _ => {}
    }

    Ok(Some(format!("--initialization {}[{}]", mode, brackets.join(","))))
}

fn render_mrf(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let mut arg = format!("--mrf [{}", format_g(value.as_float().unwrap_or_default()));
    if let Some(radius) = ctx.value("mrf_radius") {
        arg.push(',');
        arg.push_str(&xarray(&radius));
    }
    arg.push(']');
    Ok(Some(arg))
}

fn render_icm(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let mut arg = format!("--icm [{}", value.as_int().unwrap_or_default());
    if let Some(iterations) = ctx.value("maximum_number_of_icm_iterations").and_then(|v| v.as_float()) {
        arg.push(',');
        arg.push_str(&format_g(iterations));
    }
    arg.push(']');
    Ok(Some(arg))
}

fn render_convergence(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let mut arg = format!("--convergence [{}", value.as_int().unwrap_or_default());
    if let Some(threshold) = ctx.value("convergence_threshold").and_then(|v| v.as_float()) {
        arg.push(',');
        arg.push_str(&format_g(threshold));
    }
    arg.push(']');
    Ok(Some(arg))
}

fn render_posterior_formulation(
    ctx: &RenderCtx<'_>,
    value: &Value,
) -> Result<Option<String>, CompileError> {
    let mut arg = format!("--posterior-formulation {}", value);
    if let Some(proportions) = ctx.value("use_mixture_model_proportions").and_then(|v| v.as_int()) {
        arg.push_str(&format!("[{}]", proportions));
    }
    Ok(Some(arg))
}

fn render_output(ctx: &RenderCtx<'_>, value: &Value) -> Result<Option<String>, CompileError> {
    let mut arg = format!("--output [{}", value);
    if ctx.flag("save_posteriors") {
        if let Some(template) = ctx.string("output_posteriors_name_template") {
            arg.push(',');
            arg.push_str(&template);
        }
    }
    arg.push(']');
    Ok(Some(arg))
}
