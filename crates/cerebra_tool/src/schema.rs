//! Tool schemas: typed fields, declarative constraints, and output descriptors.
//!
//! A schema is defined once per tool and shared by every invocation of it.
//! Constraints are derived from the fields as they are added, so the
//! validator evaluates one flat list instead of walking field attributes.

use crate::compile::Renderer;
use crate::context::Context;
use crate::invocation::Invocation;
use cerebra_core::{derive_name, Value, Version};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Computes a field value from sibling fields and the context when unset
pub type Generator = fn(&Invocation, &Context) -> Option<Value>;

/// Tool suite an interface belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFamily {
    /// Advanced Normalization Tools
    Ants,
    /// FMRIB Software Library
    Fsl,
    /// FreeSurfer
    FreeSurfer,
}

impl ToolFamily {
    /// Lowercase family name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ants => "ants",
            Self::Fsl => "fsl",
            Self::FreeSurfer => "freesurfer",
        }
    }
}

impl fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ToolFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ants" => Ok(Self::Ants),
            "fsl" => Ok(Self::Fsl),
            "freesurfer" => Ok(Self::FreeSurfer),
            other => Err(format!("unknown tool family: {}", other)),
        }
    }
}

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Flag
    Bool,
    /// Integer
    Int,
    /// Float (integers accepted)
    Float,
    /// Free-form string
    Str,
    /// File path, optionally required to exist before running
    File { exists: bool },
    /// One of a fixed set of values
    Enum { choices: Vec<Value> },
    /// Homogeneous list (a lone scalar counts as one element)
    List {
        item: Box<FieldKind>,
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    /// Fixed-length heterogeneous tuple
    Tuple { items: Vec<FieldKind> },
    /// Any of several kinds
    Either { options: Vec<FieldKind> },
}

impl FieldKind {
    /// File path that need not exist
    #[must_use]
    pub const fn file() -> Self {
        Self::File { exists: false }
    }

    /// File path that must exist before running
    #[must_use]
    pub const fn existing_file() -> Self {
        Self::File { exists: true }
    }

    /// Enumeration over the given values
    #[must_use]
    pub fn choice<V: Into<Value>>(choices: impl IntoIterator<Item = V>) -> Self {
        Self::Enum {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Unbounded list
    #[must_use]
    pub fn list(item: Self) -> Self {
        Self::List {
            item: Box::new(item),
            min_len: None,
            max_len: None,
        }
    }

    /// List with length bounds
    #[must_use]
    pub fn list_bounded(item: Self, min_len: Option<usize>, max_len: Option<usize>) -> Self {
        Self::List {
            item: Box::new(item),
            min_len,
            max_len,
        }
    }

    /// Tuple of the given kinds
    #[must_use]
    pub fn tuple(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Tuple {
            items: items.into_iter().collect(),
        }
    }

    /// Union of the given kinds
    #[must_use]
    pub fn either(options: impl IntoIterator<Item = Self>) -> Self {
        Self::Either {
            options: options.into_iter().collect(),
        }
    }

    /// Whether a value has this kind's shape
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Bool, Value::Bool(_)) | (Self::Int, Value::Int(_)) => true,
            (Self::Float, Value::Int(_) | Value::Float(_)) => true,
            (Self::Str | Self::File { .. }, Value::Str(_)) => true,
            (Self::Enum { choices }, v) => choices.contains(v),
            (
                Self::List {
                    item,
                    min_len,
                    max_len,
                },
                Value::List(items),
            ) => {
                length_within(items.len(), *min_len, *max_len)
                    && items.iter().all(|v| item.accepts(v))
            }
            (
                Self::List {
                    item,
                    min_len,
                    max_len,
                },
                scalar,
            ) => length_within(1, *min_len, *max_len) && item.accepts(scalar),
            (Self::Tuple { items }, Value::List(values)) => {
                items.len() == values.len()
                    && items.iter().zip(values).all(|(k, v)| k.accepts(v))
            }
            (Self::Either { options }, v) => options.iter().any(|o| o.accepts(v)),
            _ => false,
        }
    }

    /// Whether values of this kind name files that must already exist
    #[must_use]
    pub fn requires_existing(&self) -> bool {
        match self {
            Self::File { exists } => *exists,
            Self::List { item, .. } => item.requires_existing(),
            _ => false,
        }
    }

    /// Human-readable description used in error messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Int => "int".to_string(),
            Self::Float => "float".to_string(),
            Self::Str => "string".to_string(),
            Self::File { exists: true } => "existing file".to_string(),
            Self::File { exists: false } => "file".to_string(),
            Self::Enum { choices } => format!("one of {}", join_values(choices)),
            Self::List { item, .. } => format!("list of {}", item.describe()),
            Self::Tuple { items } => {
                let parts: Vec<String> = items.iter().map(Self::describe).collect();
                format!("({})", parts.join(", "))
            }
            Self::Either { options } => {
                let parts: Vec<String> = options.iter().map(Self::describe).collect();
                parts.join(" or ")
            }
        }
    }
}

fn length_within(len: usize, min_len: Option<usize>, max_len: Option<usize>) -> bool {
    min_len.is_none_or(|m| len >= m) && max_len.is_none_or(|m| len <= m)
}

/// Join values for display, e.g. `3, 2, 4`
#[must_use]
pub fn join_values(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    parts.join(", ")
}

/// Rule generating an output filename from another field's file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameTemplate {
    /// Field holding the source file
    pub source: String,
    /// `%s` template applied to the source stem
    pub template: String,
    /// Append the source extension
    pub keep_extension: bool,
}

impl NameTemplate {
    fn generate(&self, schema: &ToolSchema, inv: &Invocation, ctx: &Context) -> Option<Value> {
        let source = schema.value_of(&self.source, inv, ctx)?;
        let first = match &source {
            Value::List(items) => items.first()?.as_str()?.to_string(),
            other => other.as_str()?.to_string(),
        };
        match derive_name(&first, &self.template, self.keep_extension) {
            Ok(name) => Some(Value::Str(name)),
            Err(err) => {
                tracing::warn!(
                    tool = %schema.name,
                    template = %self.template,
                    error = %err,
                    "name template could not be applied"
                );
                None
            }
        }
    }
}

/// One named, typed parameter of a tool
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Semantic type
    pub kind: FieldKind,
    /// Help text
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// printf-style argument template
    pub argstr: Option<String>,
    /// Ordering position; negative positions count from the end
    pub position: Option<i32>,
    /// Must hold a value before compiling
    pub mandatory: bool,
    /// Value used when unset
    pub default: Option<Value>,
    /// Fields that may not be set together with this one
    pub xor: Vec<String>,
    /// Fields that must hold a value when this one is set
    pub requires: Vec<String>,
    /// Separator for joining list elements
    pub sep: Option<String>,
    /// Minimum tool version supporting this field
    pub min_version: Option<Version>,
    /// Filename generated from another field when unset
    pub name_template: Option<NameTemplate>,
    /// Tool-specific value generator used when unset
    #[serde(skip)]
    pub generator: Option<Generator>,
    /// Tool-specific renderer replacing the generic one
    #[serde(skip)]
    pub renderer: Option<Renderer>,
}

impl Field {
    /// Create a field
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            argstr: None,
            position: None,
            mandatory: false,
            default: None,
            xor: Vec::new(),
            requires: Vec::new(),
            sep: None,
            min_version: None,
            name_template: None,
            generator: None,
            renderer: None,
        }
    }

    /// Set help text
    #[must_use]
    pub fn desc(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the argument template
    #[must_use]
    pub fn argstr(mut self, argstr: impl Into<String>) -> Self {
        self.argstr = Some(argstr.into());
        self
    }

    /// Set the ordering position
    #[must_use]
    pub const fn position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Mark as mandatory
    #[must_use]
    pub const fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Set the value used when unset
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Declare mutually exclusive fields
    #[must_use]
    pub fn xor<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.xor.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Declare co-required fields
    #[must_use]
    pub fn requires<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.requires.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the list separator
    #[must_use]
    pub fn sep(mut self, sep: impl Into<String>) -> Self {
        self.sep = Some(sep.into());
        self
    }

    /// Set the minimum supported tool version
    #[must_use]
    pub const fn min_version(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Generate the value from another field's filename when unset
    #[must_use]
    pub fn name_template(
        mut self,
        source: impl Into<String>,
        template: impl Into<String>,
        keep_extension: bool,
    ) -> Self {
        self.name_template = Some(NameTemplate {
            source: source.into(),
            template: template.into(),
            keep_extension,
        });
        self
    }

    /// Generate the value with a tool-specific function when unset
    #[must_use]
    pub const fn generator(mut self, generator: Generator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Render with a tool-specific function
    #[must_use]
    pub const fn renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Whether the field contributes to the command line
    #[must_use]
    pub const fn renders(&self) -> bool {
        self.argstr.is_some() || self.renderer.is_some()
    }
}

/// Declarative rule evaluated at validation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Constraint {
    /// Field must hold a value
    Mandatory { field: String },
    /// At most one of the fields may be set
    Xor { fields: Vec<String> },
    /// When `field` is set, every field in `requires` must hold a value
    Requires { field: String, requires: Vec<String> },
}

/// Named artifact a tool is expected to produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDescriptor {
    /// Output name
    pub name: String,
    /// Help text
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Resolves to a list of paths
    pub multi: bool,
    /// Verified to exist after a successful run
    pub must_exist: bool,
}

impl OutputDescriptor {
    /// Single file expected to exist
    #[must_use]
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            multi: false,
            must_exist: true,
        }
    }

    /// List of files expected to exist
    #[must_use]
    pub fn files(name: impl Into<String>) -> Self {
        Self {
            multi: true,
            ..Self::file(name)
        }
    }

    /// Do not verify existence
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.must_exist = false;
        self
    }

    /// Set help text
    #[must_use]
    pub fn desc(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Static description of one tool's parameters and outputs
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    /// Interface name
    pub name: String,
    /// Executable or script invoked
    pub command: String,
    /// Tool suite
    pub family: ToolFamily,
    /// Help text
    pub description: String,
    /// Fields in declaration order
    pub fields: IndexMap<String, Field>,
    /// Rules derived from the fields
    pub constraints: Vec<Constraint>,
    /// Declared outputs
    pub outputs: IndexMap<String, OutputDescriptor>,
}

impl ToolSchema {
    /// Create an empty schema
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>, family: ToolFamily) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            family,
            description: String::new(),
            fields: IndexMap::new(),
            constraints: Vec::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Set help text
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a field and the constraints it declares
    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        if field.mandatory {
            self.constraints.push(Constraint::Mandatory {
                field: field.name.clone(),
            });
        }
        if !field.xor.is_empty() {
            let mut group: Vec<String> = field.xor.clone();
            group.push(field.name.clone());
            group.sort();
            group.dedup();
            let exists = self
                .constraints
                .iter()
                .any(|c| matches!(c, Constraint::Xor { fields } if *fields == group));
            if !exists {
                self.constraints.push(Constraint::Xor { fields: group });
            }
        }
        if !field.requires.is_empty() {
            self.constraints.push(Constraint::Requires {
                field: field.name.clone(),
                requires: field.requires.clone(),
            });
        }
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Declare an output
    #[must_use]
    pub fn with_output(mut self, output: OutputDescriptor) -> Self {
        self.outputs.insert(output.name.clone(), output);
        self
    }

    /// Look up a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Look up an output
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&OutputDescriptor> {
        self.outputs.get(name)
    }

    /// Effective value of a field: the explicit value, else the default,
    /// else a generated one
    #[must_use]
    pub fn value_of(&self, name: &str, inv: &Invocation, ctx: &Context) -> Option<Value> {
        if let Some(value) = inv.get(name) {
            return Some(value.clone());
        }
        let field = self.fields.get(name)?;
        if let Some(default) = &field.default {
            return Some(default.clone());
        }
        if let Some(generate) = field.generator {
            return generate(inv, ctx);
        }
        field
            .name_template
            .as_ref()
            .and_then(|t| t.generate(self, inv, ctx))
    }

    /// Whether a field has an effective value
    #[must_use]
    pub fn has_value(&self, name: &str, inv: &Invocation, ctx: &Context) -> bool {
        self.value_of(name, inv, ctx).is_some()
    }

    /// Effective value as a string
    #[must_use]
    pub fn str_of(&self, name: &str, inv: &Invocation, ctx: &Context) -> Option<String> {
        self.value_of(name, inv, ctx).map(|v| v.to_string())
    }

    /// Effective value as an integer
    #[must_use]
    pub fn int_of(&self, name: &str, inv: &Invocation, ctx: &Context) -> Option<i64> {
        self.value_of(name, inv, ctx).and_then(|v| v.as_int())
    }

    /// Effective boolean value, false when unset
    #[must_use]
    pub fn flag_of(&self, name: &str, inv: &Invocation, ctx: &Context) -> bool {
        self.value_of(name, inv, ctx)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ToolSchema {
        ToolSchema::new("Denoise", "DenoiseImage", ToolFamily::Ants)
            .with_field(
                Field::new("input_image", FieldKind::file())
                    .argstr("-i %s")
                    .mandatory(),
            )
            .with_field(Field::new("shrink_factor", FieldKind::Int).default_value(1))
            .with_field(
                Field::new("output_image", FieldKind::file())
                    .argstr("-o %s")
                    .name_template("input_image", "%s_noise_corrected", true),
            )
            .with_field(
                Field::new("save_noise", FieldKind::Bool)
                    .xor(["noise_image"])
                    .requires(["output_image"]),
            )
            .with_field(Field::new("noise_image", FieldKind::file()).xor(["save_noise"]))
    }

    #[test]
    fn test_constraints_derived() {
        let s = schema();
        assert_eq!(
            s.constraints,
            vec![
                Constraint::Mandatory {
                    field: "input_image".to_string()
                },
                Constraint::Xor {
                    fields: vec!["noise_image".to_string(), "save_noise".to_string()]
                },
                Constraint::Requires {
                    field: "save_noise".to_string(),
                    requires: vec!["output_image".to_string()]
                },
            ]
        );
    }

    #[test]
    fn test_value_of_precedence() {
        let s = schema();
        let ctx = Context::default();
        let inv = Invocation::new("Denoise").with("input_image", "/data/im1.nii");

        assert_eq!(
            s.value_of("input_image", &inv, &ctx),
            Some(Value::from("/data/im1.nii"))
        );
        assert_eq!(s.value_of("shrink_factor", &inv, &ctx), Some(Value::Int(1)));
        assert_eq!(
            s.value_of("output_image", &inv, &ctx),
            Some(Value::from("im1_noise_corrected.nii"))
        );
        assert_eq!(s.value_of("noise_image", &inv, &ctx), None);
        assert_eq!(s.value_of("missing", &inv, &ctx), None);

        let explicit = inv.with("output_image", "custom.nii");
        assert_eq!(
            s.value_of("output_image", &explicit, &ctx),
            Some(Value::from("custom.nii"))
        );
    }

    #[test]
    fn test_generator_takes_context() {
        fn in_workdir(_inv: &Invocation, ctx: &Context) -> Option<Value> {
            Some(Value::from(ctx.workdir.join("out.nii").to_string_lossy().into_owned()))
        }
        let s = ToolSchema::new("T", "t", ToolFamily::Fsl)
            .with_field(Field::new("out", FieldKind::file()).generator(in_workdir));
        let ctx = Context::new("/work");
        assert_eq!(
            s.value_of("out", &Invocation::new("T"), &ctx),
            Some(Value::from("/work/out.nii"))
        );
    }

    #[test]
    fn test_kind_accepts() {
        assert!(FieldKind::Float.accepts(&Value::Int(3)));
        assert!(!FieldKind::Int.accepts(&Value::Float(3.5)));
        assert!(FieldKind::choice([3, 2, 4]).accepts(&Value::Int(2)));
        assert!(!FieldKind::choice(["Gaussian", "Rician"]).accepts(&Value::from("Poisson")));

        let list = FieldKind::list(FieldKind::existing_file());
        assert!(list.accepts(&Value::from(vec!["a.nii", "b.nii"])));
        assert!(list.accepts(&Value::from("a.nii")));
        assert!(!list.accepts(&Value::from(vec![1, 2])));

        let triple = FieldKind::list_bounded(FieldKind::Int, Some(3), Some(3));
        assert!(triple.accepts(&Value::from(vec![54, 75, 80])));
        assert!(!triple.accepts(&Value::from(vec![54, 75])));

        let pair = FieldKind::tuple([FieldKind::Float, FieldKind::Int]);
        assert!(pair.accepts(&Value::List(vec![Value::Float(0.2), Value::Int(1)])));
        assert!(!pair.accepts(&Value::List(vec![Value::Float(0.2)])));

        let either = FieldKind::either([FieldKind::Int, FieldKind::file()]);
        assert!(either.accepts(&Value::Int(2)));
        assert!(either.accepts(&Value::from("r.nii")));
        assert!(!either.accepts(&Value::Bool(true)));
    }

    #[test]
    fn test_kind_describe() {
        assert_eq!(FieldKind::choice([3, 2, 4]).describe(), "one of 3, 2, 4");
        assert_eq!(
            FieldKind::list(FieldKind::existing_file()).describe(),
            "list of existing file"
        );
        assert_eq!(
            FieldKind::tuple([FieldKind::Float, FieldKind::Int]).describe(),
            "(float, int)"
        );
    }

    #[test]
    fn test_tool_family_parse() {
        assert_eq!("ANTs".parse::<ToolFamily>().unwrap(), ToolFamily::Ants);
        assert_eq!("fsl".parse::<ToolFamily>().unwrap(), ToolFamily::Fsl);
        assert!("spm".parse::<ToolFamily>().is_err());
        assert_eq!(ToolFamily::FreeSurfer.to_string(), "freesurfer");
    }
}
