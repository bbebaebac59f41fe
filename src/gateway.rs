//! Contracts for the collaborators a form consumes but never implements.
//!
//! Transport (how a query or save physically reaches a server) and
//! presentation (how messages, dialogs and focus are rendered) live behind
//! these traits so the form state machine stays independent of both.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CapabilityError;

/// Flat mapping of field name to value, used for query parameters, save
/// payloads and loaded records.
pub type Record = BTreeMap<String, String>;

/// A result record returned by a query capability. Objects carry named
/// properties; arrays are positional.
pub type Row = Value;

/// Executes a query and returns matching records.
///
/// Used both for form queries (parameters built from the filled-in fields) and
/// for list-of-values lookups (a filter value plus any source fields).
#[async_trait]
pub trait QueryCapability: Send + Sync {
    async fn query(&self, parameters: &Record) -> Result<Vec<Row>, CapabilityError>;
}

/// Persists a record. Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait PersistenceCapability: Send + Sync {
    async fn persist(&self, record: &Record) -> Result<(), CapabilityError>;
}

/// Rendering side of the form. Everything except the disambiguation prompt is
/// fire-and-forget.
#[async_trait]
pub trait PresentationGateway: Send + Sync {
    fn show_error(&self, message: &str);

    fn show_message(&self, message: &str);

    fn focus(&self, field: &str);

    /// Asks the user to pick one of several list-of-values matches. `None`
    /// means the prompt was cancelled.
    async fn show_disambiguation(&self, title: &str, rows: &[Row]) -> Option<Row>;
}

/// Renders a scalar JSON value the way a text field displays it.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Converts a query result row into a record keyed by field name.
///
/// Object rows keep their property names; array rows are matched to
/// `positional_names` in order.
pub fn row_to_record(row: &Row, positional_names: &[String]) -> Record {
    match row {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), value_to_text(value)))
            .collect(),
        Value::Array(items) => positional_names
            .iter()
            .zip(items.iter())
            .map(|(name, value)| (name.clone(), value_to_text(value)))
            .collect(),
        _ => Record::new(),
    }
}
