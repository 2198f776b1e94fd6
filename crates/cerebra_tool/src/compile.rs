//! Argument compilation: invocation values to an ordered token list.
//!
//! Order is driven by field positions: non-negative positions ascending,
//! then unpositioned fields by name, then negative positions with `-1` last.
//! Each field renders through its argument template unless the schema
//! registers a renderer for it.

use crate::context::Context;
use crate::invocation::Invocation;
use crate::schema::{Field, FieldKind, ToolSchema};
use cerebra_core::printf::placeholder_count;
use cerebra_core::{sprintf, CompileError, FormatError, Value};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// Tool-specific rendering of one field. `Ok(None)` omits the field.
pub type Renderer = fn(&RenderCtx<'_>, &Value) -> Result<Option<String>, CompileError>;

/// Everything a renderer may consult besides the field value
pub struct RenderCtx<'a> {
    /// Schema being compiled
    pub schema: &'a ToolSchema,
    /// Invocation being compiled
    pub invocation: &'a Invocation,
    /// Caller context
    pub context: &'a Context,
    /// Field being rendered
    pub field: &'a Field,
}

impl RenderCtx<'_> {
    /// Interface name
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.schema.name
    }

    /// Field argument template, empty when absent
    #[must_use]
    pub fn argstr(&self) -> &str {
        self.field.argstr.as_deref().unwrap_or("")
    }

    /// Effective value of a sibling field
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.schema.value_of(name, self.invocation, self.context)
    }

    /// Effective value of a sibling field as a string
    #[must_use]
    pub fn string(&self, name: &str) -> Option<String> {
        self.schema.str_of(name, self.invocation, self.context)
    }

    /// Effective value of a sibling field as an integer
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        self.schema.int_of(name, self.invocation, self.context)
    }

    /// Effective boolean value of a sibling field, false when unset
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.schema.flag_of(name, self.invocation, self.context)
    }

    /// Whether a sibling field was explicitly set
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.invocation.is_set(name)
    }

    /// Resolve a path against the working directory
    #[must_use]
    pub fn path(&self, path: &str) -> PathBuf {
        self.context.resolve_path(path)
    }

    /// Apply a printf template
    ///
    /// # Errors
    ///
    /// Returns error if the arguments do not fit the template
    pub fn format(&self, template: &str, args: &[Value]) -> Result<String, CompileError> {
        sprintf(template, args).map_err(|source| self.format_error(source))
    }

    /// Render a value through the field's template with the generic rules
    ///
    /// # Errors
    ///
    /// Returns error if the value does not fit the template
    pub fn render(&self, value: &Value) -> Result<Option<String>, CompileError> {
        render_generic(self.field, value).map_err(|source| self.format_error(source))
    }

    /// Tool-specific combination error for this field
    #[must_use]
    pub fn invalid(&self, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidCombination {
            tool: self.tool().to_string(),
            field: self.field.name.clone(),
            reason: reason.into(),
        }
    }

    /// Count mismatch error for this field
    #[must_use]
    pub fn count_mismatch(&self, expected: usize, actual: usize) -> CompileError {
        CompileError::CountMismatch {
            tool: self.tool().to_string(),
            field: self.field.name.clone(),
            expected,
            actual,
        }
    }

    fn format_error(&self, source: FormatError) -> CompileError {
        CompileError::Format {
            tool: self.tool().to_string(),
            field: self.field.name.clone(),
            source,
        }
    }
}

/// Compiled command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    /// Executable or script
    pub command: String,
    /// Rendered argument fragments in order
    pub args: Vec<String>,
}

impl CommandLine {
    /// Command followed by its arguments
    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Space-joined command line as passed to the shell
    #[must_use]
    pub fn cmdline(&self) -> String {
        self.tokens().join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cmdline())
    }
}

fn order_key(field: &Field) -> (u8, i32) {
    match field.position {
        Some(p) if p >= 0 => (0, p),
        None => (1, 0),
        Some(p) => (2, p),
    }
}

/// Fields in command-line order
#[must_use]
pub fn argument_order(schema: &ToolSchema) -> Vec<&Field> {
    let mut fields: Vec<&Field> = schema.fields.values().collect();
    fields.sort_by(|a, b| match order_key(a).cmp(&order_key(b)) {
        Ordering::Equal => a.name.cmp(&b.name),
        other => other,
    });
    fields
}

/// Render a field value through its template with the generic rules
///
/// # Errors
///
/// Returns error if the value does not fit the template
pub fn render_generic(field: &Field, value: &Value) -> Result<Option<String>, FormatError> {
    let Some(argstr) = field.argstr.as_deref() else {
        return Ok(None);
    };

    if let Value::Bool(flag) = value {
        if placeholder_count(argstr) == 0 {
            return Ok(flag.then(|| argstr.to_string()));
        }
        return sprintf(argstr, &[Value::Int(i64::from(*flag))]).map(Some);
    }

    let sep = field.sep.as_deref().unwrap_or(" ");
    match (&field.kind, value) {
        (FieldKind::Tuple { .. }, Value::List(items)) if placeholder_count(argstr) == items.len() => {
            sprintf(argstr, items).map(Some)
        }
        (FieldKind::List { .. } | FieldKind::Tuple { .. } | FieldKind::Either { .. }, _)
            if argstr.ends_with("...") =>
        {
            let base = argstr.trim_end_matches("...");
            let items = match value {
                Value::List(items) => items.as_slice(),
                scalar => std::slice::from_ref(scalar),
            };
            let parts = items
                .iter()
                .map(|item| sprintf(base, std::slice::from_ref(item)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(parts.join(" ")))
        }
        (_, Value::List(items)) => {
            let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
            sprintf(argstr, &[Value::Str(parts.join(sep))]).map(Some)
        }
        (_, scalar) => sprintf(argstr, std::slice::from_ref(scalar)).map(Some),
    }
}

/// Compile an invocation into a command line. The invocation is assumed
/// to be valid.
///
/// # Errors
///
/// Returns error if a field cannot be rendered or a tool-specific rule
/// rejects a combination of values
pub fn compile(
    schema: &ToolSchema,
    inv: &Invocation,
    ctx: &Context,
) -> Result<CommandLine, CompileError> {
    let mut args = Vec::new();

    for field in argument_order(schema) {
        if !field.renders() {
            continue;
        }
        let Some(value) = schema.value_of(&field.name, inv, ctx) else {
            continue;
        };
        let render_ctx = RenderCtx {
            schema,
            invocation: inv,
            context: ctx,
            field,
        };
        let rendered = match field.renderer {
            Some(render) => render(&render_ctx, &value)?,
            None => render_ctx.render(&value)?,
        };
        if let Some(arg) = rendered.filter(|s| !s.is_empty()) {
            args.push(arg);
        }
    }

    let line = CommandLine {
        command: schema.command.clone(),
        args,
    };
    tracing::debug!(tool = %schema.name, cmdline = %line, "compiled command line");
    Ok(line)
}
