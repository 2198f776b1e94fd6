//! Invocation validation against a tool schema.
//!
//! Validation is pure apart from the optional input-existence check, and
//! always runs before anything is compiled or spawned.

use crate::context::Context;
use crate::invocation::Invocation;
use crate::schema::{join_values, Constraint, Field, FieldKind, ToolSchema};
use cerebra_core::{Value, ValidationError};

/// Checks invocations of one schema
pub struct Validator<'a> {
    schema: &'a ToolSchema,
    context: &'a Context,
}

impl<'a> Validator<'a> {
    /// Create a validator
    #[must_use]
    pub const fn new(schema: &'a ToolSchema, context: &'a Context) -> Self {
        Self { schema, context }
    }

    /// Validate, stopping at the first error
    ///
    /// # Errors
    ///
    /// Returns the first rule the invocation violates
    pub fn validate(&self, inv: &Invocation) -> Result<(), ValidationError> {
        match self.validate_all(inv).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect every violation
    #[must_use]
    pub fn validate_all(&self, inv: &Invocation) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (name, value) in inv.values() {
            match self.schema.field(name) {
                Some(field) => {
                    if let Err(err) = self.check_value(field, value) {
                        errors.push(err);
                    }
                }
                None => errors.push(ValidationError::UnknownField {
                    tool: self.tool(),
                    field: name.to_string(),
                }),
            }
        }

        for constraint in &self.schema.constraints {
            self.check_constraint(constraint, inv, &mut errors);
        }

        if self.context.check_inputs_exist {
            self.check_inputs(inv, &mut errors);
        }

        self.check_versions(inv, &mut errors);

        if !errors.is_empty() {
            tracing::debug!(
                tool = %self.schema.name,
                errors = errors.len(),
                "invocation rejected"
            );
        }
        errors
    }

    fn tool(&self) -> String {
        self.schema.name.clone()
    }

    fn check_value(&self, field: &Field, value: &Value) -> Result<(), ValidationError> {
        match &field.kind {
            FieldKind::Enum { choices } => {
                if choices.contains(value) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidEnumValue {
                        tool: self.tool(),
                        field: field.name.clone(),
                        value: value.to_string(),
                        allowed: join_values(choices),
                    })
                }
            }
            FieldKind::List {
                item,
                min_len,
                max_len,
            } => {
                let items = match value {
                    Value::List(items) => items.as_slice(),
                    scalar => std::slice::from_ref(scalar),
                };
                if let Some(bad) = items.iter().find(|v| !item.accepts(v)) {
                    return Err(self.invalid_type(field, bad));
                }
                let too_short = min_len.is_some_and(|m| items.len() < m);
                let too_long = max_len.is_some_and(|m| items.len() > m);
                if too_short || too_long {
                    return Err(ValidationError::InvalidLength {
                        tool: self.tool(),
                        field: field.name.clone(),
                        expected: describe_bounds(*min_len, *max_len),
                        actual: items.len(),
                    });
                }
                Ok(())
            }
            FieldKind::Tuple { items } => match value {
                Value::List(values) if values.len() != items.len() => {
                    Err(ValidationError::InvalidLength {
                        tool: self.tool(),
                        field: field.name.clone(),
                        expected: items.len().to_string(),
                        actual: values.len(),
                    })
                }
                other if field.kind.accepts(other) => Ok(()),
                other => Err(self.invalid_type(field, other)),
            },
            kind if kind.accepts(value) => Ok(()),
            _ => Err(self.invalid_type(field, value)),
        }
    }

    fn invalid_type(&self, field: &Field, value: &Value) -> ValidationError {
        ValidationError::InvalidType {
            tool: self.tool(),
            field: field.name.clone(),
            expected: field.kind.describe(),
            actual: value.kind_name().to_string(),
        }
    }

    fn check_constraint(
        &self,
        constraint: &Constraint,
        inv: &Invocation,
        errors: &mut Vec<ValidationError>,
    ) {
        match constraint {
            Constraint::Mandatory { field } => {
                // an explicitly set alternative satisfies a mandatory xor group
                let alternative_set = self
                    .schema
                    .field(field)
                    .is_some_and(|f| f.xor.iter().any(|x| inv.is_set(x)));
                if !alternative_set && !self.schema.has_value(field, inv, self.context) {
                    errors.push(ValidationError::MissingMandatory {
                        tool: self.tool(),
                        field: field.clone(),
                    });
                }
            }
            Constraint::Xor { fields } => {
                let set: Vec<&String> = fields.iter().filter(|f| inv.is_set(f)).collect();
                if let [first, second, ..] = set.as_slice() {
                    errors.push(ValidationError::MutuallyExclusive {
                        tool: self.tool(),
                        field: (*first).clone(),
                        other: (*second).clone(),
                    });
                }
            }
            Constraint::Requires { field, requires } => {
                if !inv.is_set(field) {
                    return;
                }
                for required in requires {
                    if !self.schema.has_value(required, inv, self.context) {
                        errors.push(ValidationError::MissingCoRequirement {
                            tool: self.tool(),
                            field: field.clone(),
                            requires: required.clone(),
                        });
                    }
                }
            }
        }
    }

    fn check_inputs(&self, inv: &Invocation, errors: &mut Vec<ValidationError>) {
        for (name, value) in inv.values() {
            let Some(field) = self.schema.field(name) else {
                continue;
            };
            if !field.kind.requires_existing() {
                continue;
            }
            let mut paths = Vec::new();
            collect_strings(value, &mut paths);
            for path in paths {
                if !self.context.resolve_path(path).exists() {
                    errors.push(ValidationError::MissingInputFile {
                        tool: self.tool(),
                        field: name.to_string(),
                        path: path.to_string(),
                    });
                }
            }
        }
    }

    fn check_versions(&self, inv: &Invocation, errors: &mut Vec<ValidationError>) {
        let Some(found) = self.context.version(self.schema.family) else {
            return;
        };
        for (name, _) in inv.values() {
            let Some(required) = self.schema.field(name).and_then(|f| f.min_version) else {
                continue;
            };
            if found < required {
                errors.push(ValidationError::VersionTooOld {
                    tool: self.tool(),
                    field: name.to_string(),
                    required: required.to_string(),
                    found: found.to_string(),
                });
            }
        }
    }
}

fn collect_strings<'v>(value: &'v Value, out: &mut Vec<&'v str>) {
    match value {
        Value::Str(s) => out.push(s),
        Value::List(items) => items.iter().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

fn describe_bounds(min_len: Option<usize>, max_len: Option<usize>) -> String {
    match (min_len, max_len) {
        (Some(lo), Some(hi)) if lo == hi => lo.to_string(),
        (Some(lo), Some(hi)) => format!("{} to {}", lo, hi),
        (Some(lo), None) => format!("at least {}", lo),
        (None, Some(hi)) => format!("at most {}", hi),
        (None, None) => "any number of".to_string(),
    }
}

/// Validate an invocation against a schema
///
/// # Errors
///
/// Returns the first rule the invocation violates
pub fn validate(
    schema: &ToolSchema,
    inv: &Invocation,
    ctx: &Context,
) -> Result<(), ValidationError> {
    Validator::new(schema, ctx).validate(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ToolFamily;
    use cerebra_core::Version;

    fn schema() -> ToolSchema {
        ToolSchema::new("N4BiasFieldCorrection", "N4BiasFieldCorrection", ToolFamily::Ants)
            .with_field(
                Field::new("dimension", FieldKind::choice([3, 2, 4]))
                    .argstr("-d %d")
                    .default_value(3),
            )
            .with_field(
                Field::new("input_image", FieldKind::existing_file())
                    .argstr("--input-image %s")
                    .mandatory(),
            )
            .with_field(Field::new(
                "n_iterations",
                FieldKind::list(FieldKind::Int),
            ))
            .with_field(
                Field::new("convergence_threshold", FieldKind::Float).requires(["n_iterations"]),
            )
            .with_field(
                Field::new("save_bias", FieldKind::Bool)
                    .mandatory()
                    .xor(["bias_image"]),
            )
            .with_field(Field::new("bias_image", FieldKind::file()).xor(["save_bias"]))
            .with_field(
                Field::new("center", FieldKind::list_bounded(FieldKind::Int, Some(3), Some(3))),
            )
            .with_field(
                Field::new("rescale_intensities", FieldKind::Bool)
                    .argstr("-r")
                    .min_version(Version::new(2, 1, 0)),
            )
    }

    fn ctx() -> Context {
        Context::default().with_input_checks(false)
    }

    fn base() -> Invocation {
        Invocation::new("N4BiasFieldCorrection")
            .with("input_image", "structural.nii")
            .with("save_bias", true)
    }

    #[test]
    fn test_valid_invocation() {
        let s = schema();
        assert!(validate(&s, &base(), &ctx()).is_ok());
    }

    #[test]
    fn test_missing_mandatory() {
        let s = schema();
        let inv = Invocation::new("N4BiasFieldCorrection").with("save_bias", true);
        let err = validate(&s, &inv, &ctx()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingMandatory {
                tool: "N4BiasFieldCorrection".to_string(),
                field: "input_image".to_string(),
            }
        );
    }

    #[test]
    fn test_mandatory_satisfied_by_xor_alternative() {
        let s = schema();
        let inv = Invocation::new("N4BiasFieldCorrection")
            .with("input_image", "structural.nii")
            .with("bias_image", "bias.nii");
        assert!(validate(&s, &inv, &ctx()).is_ok());
    }

    #[test]
    fn test_mutually_exclusive() {
        let s = schema();
        let inv = base().with("bias_image", "bias.nii");
        let err = validate(&s, &inv, &ctx()).unwrap_err();
        assert!(matches!(err, ValidationError::MutuallyExclusive { .. }));
        assert_eq!(err.field(), "bias_image");
    }

    #[test]
    fn test_missing_co_requirement() {
        let s = schema();
        let inv = base().with("convergence_threshold", 1e-6);
        let err = validate(&s, &inv, &ctx()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingCoRequirement {
                tool: "N4BiasFieldCorrection".to_string(),
                field: "convergence_threshold".to_string(),
                requires: "n_iterations".to_string(),
            }
        );

        let ok = inv.with("n_iterations", vec![50, 50, 30, 20]);
        assert!(validate(&s, &ok, &ctx()).is_ok());
    }

    #[test]
    fn test_invalid_enum_value() {
        let s = schema();
        let err = validate(&s, &base().with("dimension", 5), &ctx()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "N4BiasFieldCorrection: '5' is not a valid value for 'dimension' (expected one of: 3, 2, 4)"
        );
    }

    #[test]
    fn test_invalid_type_and_length() {
        let s = schema();
        let err = validate(&s, &base().with("n_iterations", vec!["a"]), &ctx()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidType { .. }));

        let err = validate(&s, &base().with("center", vec![54, 75]), &ctx()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidLength {
                tool: "N4BiasFieldCorrection".to_string(),
                field: "center".to_string(),
                expected: "3".to_string(),
                actual: 2,
            }
        );
    }

    #[test]
    fn test_unknown_field() {
        let s = schema();
        let err = validate(&s, &base().with("colour", "red"), &ctx()).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { .. }));
    }

    #[test]
    fn test_validate_all_collects() {
        let s = schema();
        let inv = Invocation::new("N4BiasFieldCorrection")
            .with("dimension", 7)
            .with("convergence_threshold", 0.1);
        let errors = Validator::new(&s, &ctx()).validate_all(&inv);
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("structural.nii"), b"").unwrap();
        let s = schema();
        let checked = Context::new(dir.path());

        assert!(validate(&s, &base(), &checked).is_ok());

        let inv = base().with("input_image", "absent.nii");
        let err = validate(&s, &inv, &checked).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingInputFile {
                tool: "N4BiasFieldCorrection".to_string(),
                field: "input_image".to_string(),
                path: "absent.nii".to_string(),
            }
        );
    }

    #[test]
    fn test_version_too_old() {
        let s = schema();
        let inv = base().with("rescale_intensities", true);

        assert!(validate(&s, &inv, &ctx()).is_ok());

        let old = ctx().with_version(ToolFamily::Ants, Version::new(2, 0, 3));
        let err = validate(&s, &inv, &old).unwrap_err();
        assert!(matches!(err, ValidationError::VersionTooOld { .. }));

        let new = ctx().with_version(ToolFamily::Ants, Version::new(2, 1, 0));
        assert!(validate(&s, &inv, &new).is_ok());
    }
}
