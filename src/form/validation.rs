//! Field validation rules.
//!
//! Rules run in a fixed order and the first failure wins: required, maximum
//! length, number, date, then the field's custom validator.

use chrono::NaiveDate;

use crate::form::field::{DataType, FieldDefinition};
use crate::form::registry::FieldRegistry;

pub const REQUIRED_MESSAGE: &str = "field is required";
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%d/%m/%Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: String,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Validates values against field definitions. Only the accepted date
/// formats are configurable.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    date_formats: Vec<String>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self {
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl ValidationEngine {
    pub fn with_date_formats(formats: Vec<String>) -> Self {
        if formats.is_empty() {
            Self::default()
        } else {
            Self {
                date_formats: formats,
            }
        }
    }

    pub fn date_formats(&self) -> &[String] {
        &self.date_formats
    }

    pub fn validate(&self, definition: &FieldDefinition, value: &str) -> ValidationResult {
        let trimmed = value.trim();

        if definition.required && trimmed.is_empty() {
            return ValidationResult::invalid(REQUIRED_MESSAGE);
        }

        if let Some(max) = definition.max_length {
            if value.chars().count() > max {
                return ValidationResult::invalid(format!(
                    "exceeds maximum length of {} characters",
                    max
                ));
            }
        }

        if !trimmed.is_empty() {
            match definition.data_type {
                DataType::Number if !is_number(trimmed) => {
                    return ValidationResult::invalid("must be a number");
                }
                DataType::Date if !self.is_date(trimmed) => {
                    return ValidationResult::invalid(format!(
                        "must be a valid date ({})",
                        self.date_formats.join(", ")
                    ));
                }
                _ => {}
            }
        }

        if let Some(custom) = &definition.custom_validator {
            if let Err(message) = custom.check(value) {
                return ValidationResult::invalid(message);
            }
        }

        ValidationResult::ok()
    }

    /// Validates every field, recording each verdict on the field, and
    /// returns whether all of them passed.
    pub fn validate_form(&self, registry: &mut FieldRegistry) -> bool {
        let verdicts: Vec<(String, ValidationResult)> = registry
            .fields()
            .map(|field| {
                (
                    field.name().to_string(),
                    self.validate(field.definition(), field.value()),
                )
            })
            .collect();

        let mut all_valid = true;
        for (name, verdict) in verdicts {
            all_valid &= verdict.valid;
            if let Ok(field) = registry.get_mut(&name) {
                field.set_validity(verdict.valid, &verdict.message);
            }
        }
        all_valid
    }

    fn is_date(&self, value: &str) -> bool {
        self.date_formats
            .iter()
            .any(|format| NaiveDate::parse_from_str(value, format).is_ok())
    }
}

/// Validates with the default date formats.
pub fn validate(definition: &FieldDefinition, value: &str) -> ValidationResult {
    ValidationEngine::default().validate(definition, value)
}

fn is_number(value: &str) -> bool {
    value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}
