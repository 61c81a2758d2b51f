//! The metric registry: a name→(description, function) table built once at start-up
//! from user-registered callables, plus the dynamic parameter coercion metric
//! invocations use.

use std::collections::HashMap;
use std::sync::Arc;

/// A metric extra-parameter: numeric when it parses as a float, otherwise passed
/// through as text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn coerce(raw: &str) -> Self {
        match raw.parse::<f64>() {
            Ok(n) => ParamValue::Number(n),
            Err(_) => ParamValue::Text(raw.to_string()),
        }
    }
}

/// The per-channel sample arrays handed to a metric function: one `Vec<f64>` per
/// channel named in the specifier, in the order the channels were requested.
#[derive(Debug, Clone, Default)]
pub struct ChannelBundle {
    pub channels: Vec<Vec<f64>>,
}

/// A registered metric function. Returns `Err` with a human-readable message on
/// argument mismatch (arity, type); the responder surfaces that message verbatim as
/// the result for that specifier.
pub type MetricFn = Arc<dyn Fn(&ChannelBundle, &[ParamValue]) -> Result<serde_json::Value, String> + Send + Sync>;

struct MetricEntry {
    description: String,
    func: MetricFn,
}

/// Name→function table, built once at start-up from a list of registrations.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    entries: HashMap<String, Arc<MetricEntry>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a metric under `name`, with an optional one-line `description`.
    pub fn register(&mut self, name: impl Into<String>, description: impl Into<String>, func: MetricFn) {
        self.entries.insert(
            name.into(),
            Arc::new(MetricEntry {
                description: description.into(),
                func,
            }),
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Invokes the named metric, returning its result or the function's own error
    /// message. Panics only if `name` is not registered — callers must check
    /// [`MetricRegistry::contains`] first, which the responder always does.
    pub fn invoke(&self, name: &str, data: &ChannelBundle, params: &[ParamValue]) -> Result<serde_json::Value, String> {
        let entry = self.entries.get(name).expect("metric name checked by caller");
        (entry.func)(data, params)
    }

    /// The name→description mapping returned by the `get_metric_list` command.
    pub fn list(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.description.clone()))
            .collect()
    }
}
