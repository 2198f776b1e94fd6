//! One populated instance of a tool schema.

use cerebra_core::{CoreResult, Fingerprint, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Explicitly set field values for one run of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Interface name
    pub tool: String,
    /// Values keyed by field name
    #[serde(default)]
    values: BTreeMap<String, Value>,
}

impl Invocation {
    /// Create an invocation with no values set
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            values: BTreeMap::new(),
        }
    }

    /// Decode field values from a JSON object. `null` leaves a field unset.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is not an object of supported values
    pub fn from_json(tool: impl Into<String>, json: &str) -> CoreResult<Self> {
        let raw: BTreeMap<String, Option<Value>> = serde_json::from_str(json)?;
        let values = raw
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        Ok(Self {
            tool: tool.into(),
            values,
        })
    }

    /// Set a value, builder style
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Clear a value
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Get an explicitly set value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether a field was explicitly set
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate explicitly set values in name order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of explicitly set values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fingerprint over the tool name and explicit values
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        // BTreeMap keeps the encoding canonical
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        Fingerprint::compute(&bytes)
    }
}
