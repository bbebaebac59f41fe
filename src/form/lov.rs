//! List-of-values lookups.
//!
//! A binding queries a reference data set and copies properties of the chosen
//! row into target fields. One match is applied directly, several matches go
//! through the presentation layer for disambiguation.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{FormError, FormFailure};
use crate::form::registry::FieldRegistry;
use crate::form::triggers::TriggerDispatcher;
use crate::gateway::{value_to_text, PresentationGateway, QueryCapability, Record, Row};

pub const DEFAULT_FILTER_PARAM: &str = "filter";

/// How a result row maps onto form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LovMapping {
    /// Ordered `(row property, target field)` pairs.
    Named(Vec<(String, String)>),
    /// Target fields for the positional columns of an array row.
    Positional(Vec<String>),
}

impl LovMapping {
    pub fn named<P, F>(pairs: impl IntoIterator<Item = (P, F)>) -> Self
    where
        P: Into<String>,
        F: Into<String>,
    {
        LovMapping::Named(
            pairs
                .into_iter()
                .map(|(property, field)| (property.into(), field.into()))
                .collect(),
        )
    }

    pub fn positional<F: Into<String>>(return_items: impl IntoIterator<Item = F>) -> Self {
        LovMapping::Positional(return_items.into_iter().map(Into::into).collect())
    }

    pub fn target_fields(&self) -> Vec<&str> {
        match self {
            LovMapping::Named(pairs) => pairs.iter().map(|(_, field)| field.as_str()).collect(),
            LovMapping::Positional(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

pub struct LovBinding {
    id: String,
    title: String,
    source: Arc<dyn QueryCapability>,
    mapping: LovMapping,
    filter_param: String,
    source_fields: Vec<String>,
}

impl fmt::Debug for LovBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LovBinding")
            .field("id", &self.id)
            .field("mapping", &self.mapping)
            .field("filter_param", &self.filter_param)
            .field("source_fields", &self.source_fields)
            .finish_non_exhaustive()
    }
}

impl LovBinding {
    pub fn new(
        id: impl Into<String>,
        source: Arc<dyn QueryCapability>,
        mapping: LovMapping,
    ) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            source,
            mapping,
            filter_param: DEFAULT_FILTER_PARAM.to_string(),
            source_fields: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_filter_param(mut self, param: impl Into<String>) -> Self {
        self.filter_param = param.into();
        self
    }

    /// Fields whose current values are passed along as extra query parameters.
    pub fn with_source_fields<F: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = F>,
    ) -> Self {
        self.source_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn mapping(&self) -> &LovMapping {
        &self.mapping
    }

    fn parameters(&self, filter: &str, registry: &FieldRegistry) -> Record {
        let mut params = Record::new();
        for name in &self.source_fields {
            if let Ok(value) = registry.value(name) {
                if !value.is_empty() {
                    params.insert(name.clone(), value.to_string());
                }
            }
        }
        if !filter.is_empty() {
            params.insert(self.filter_param.clone(), filter.to_string());
        }
        params
    }

    /// `(target field, value)` pairs carried by `row`. Columns the row lacks
    /// are skipped.
    fn extract(&self, row: &Row) -> Vec<(String, String)> {
        match &self.mapping {
            LovMapping::Named(pairs) => pairs
                .iter()
                .filter_map(|(property, field)| {
                    lookup_property(row, property).map(|value| (field.clone(), value))
                })
                .collect(),
            LovMapping::Positional(items) => match row {
                Value::Array(columns) => items
                    .iter()
                    .zip(columns.iter())
                    .map(|(field, value)| (field.clone(), value_to_text(value)))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

fn lookup_property(row: &Row, property: &str) -> Option<String> {
    match row {
        Value::Object(map) => map.get(property).map(value_to_text),
        Value::Array(columns) => property
            .parse::<usize>()
            .ok()
            .and_then(|idx| columns.get(idx))
            .map(value_to_text),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LovOutcome {
    /// Nothing matched; fields untouched.
    NoMatch,
    /// A row was applied; carries the fields that were written.
    Applied(Vec<String>),
    /// Several rows matched and the user dismissed the prompt.
    Cancelled,
    /// The lookup failed and was reported; fields untouched.
    Failed(String),
}

pub struct LovResolver;

impl LovResolver {
    /// Runs the binding's query for `filter` and applies the outcome to the
    /// registry. Failures are reported through `ON_ERROR` and the presentation
    /// gateway rather than returned.
    pub async fn resolve(
        binding: &LovBinding,
        filter: &str,
        registry: &mut FieldRegistry,
        presentation: &dyn PresentationGateway,
        triggers: &TriggerDispatcher,
    ) -> LovOutcome {
        let params = binding.parameters(filter, registry);
        debug!(lov = binding.id(), ?params, "resolving list of values");

        let rows = match binding.source.query(&params).await {
            Ok(rows) => rows,
            Err(source) => {
                let failure = FormFailure::Lov {
                    binding: binding.id().to_string(),
                    source,
                };
                return Self::fail(failure.to_string(), presentation, triggers);
            }
        };

        let chosen = match rows.len() {
            0 => return LovOutcome::NoMatch,
            1 => rows.into_iter().next(),
            count => {
                debug!(lov = binding.id(), count, "asking user to disambiguate");
                match presentation.show_disambiguation(binding.title(), &rows).await {
                    Some(row) => Some(row),
                    None => return LovOutcome::Cancelled,
                }
            }
        };

        let Some(row) = chosen else {
            return LovOutcome::NoMatch;
        };

        match Self::apply(binding, &row, registry) {
            Ok(written) => LovOutcome::Applied(written),
            Err(err) => Self::fail(err.to_string(), presentation, triggers),
        }
    }

    /// Writes the row into the mapped fields. Writes go straight to the
    /// registry so they never start another lookup. Nothing is written when a
    /// target field is unknown.
    pub fn apply(
        binding: &LovBinding,
        row: &Row,
        registry: &mut FieldRegistry,
    ) -> Result<Vec<String>, FormError> {
        let writes = binding.extract(row);
        if let Some((field, _)) = writes.iter().find(|(field, _)| !registry.contains(field)) {
            return Err(FormError::InvalidBinding {
                binding: binding.id().to_string(),
                field: field.clone(),
            });
        }
        if writes.len() < binding.mapping().target_fields().len() {
            warn!(lov = binding.id(), "row is missing mapped columns");
        }

        let mut written = Vec::with_capacity(writes.len());
        for (field, value) in writes {
            registry.set(&field, value)?;
            written.push(field);
        }
        Ok(written)
    }

    fn fail(
        message: String,
        presentation: &dyn PresentationGateway,
        triggers: &TriggerDispatcher,
    ) -> LovOutcome {
        warn!(error = %message, "list of values failed");
        triggers.report_error(&message);
        presentation.show_error(&message);
        LovOutcome::Failed(message)
    }
}
