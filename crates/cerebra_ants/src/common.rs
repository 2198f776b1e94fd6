//! Helpers shared by the ANTs renderers.

use cerebra_core::Value;

/// Elements of a list value, or the value itself as a single element
pub(crate) fn items(value: &Value) -> &[Value] {
    match value {
        Value::List(items) => items,
        scalar => std::slice::from_ref(scalar),
    }
}

/// ANTs vector notation, e.g. `3x3x3`
pub(crate) fn xarray(value: &Value) -> String {
    let parts: Vec<String> = items(value).iter().map(ToString::to_string).collect();
    parts.join("x")
}
