use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::form::lov::LovBinding;

/// Supported data kinds for form fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Date,
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "string" | "char" | "varchar2" | "text" => Ok(DataType::String),
            "number" | "numeric" => Ok(DataType::Number),
            "date" => Ok(DataType::Date),
            other => Err(format!("unknown data type `{}`", other)),
        }
    }
}

type ValidatorCallback = dyn Fn(&str) -> Result<(), String> + Send + Sync;

/// Extra validation run after the built-in rules. `Err` carries the message
/// shown to the user verbatim.
#[derive(Clone)]
pub struct CustomValidator(Arc<ValidatorCallback>);

impl CustomValidator {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    pub fn check(&self, value: &str) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValidator(..)")
    }
}

/// Declarative description of a single form field. Every recognised option is
/// a named member; there are no free-form option bags.
#[derive(Debug, Clone, Default)]
pub struct FieldDefinition {
    pub label: Option<String>,
    pub required: bool,
    pub data_type: DataType,
    pub max_length: Option<usize>,
    pub lov_binding: Option<Arc<LovBinding>>,
    pub custom_validator: Option<CustomValidator>,
    pub default_value: Option<String>,
}

impl FieldDefinition {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            ..Self::default()
        }
    }

    pub fn text() -> Self {
        Self::new(DataType::String)
    }

    pub fn number() -> Self {
        Self::new(DataType::Number)
    }

    pub fn date() -> Self {
        Self::new(DataType::Date)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_lov(mut self, binding: Arc<LovBinding>) -> Self {
        self.lov_binding = Some(binding);
        self
    }

    pub fn with_validator<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom_validator = Some(CustomValidator::new(check));
        self
    }
}

/// A registered field and its live state.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) definition: FieldDefinition,
    pub(crate) value: String,
    pub(crate) original_value: String,
    pub(crate) valid: bool,
    pub(crate) error_message: String,
}

impl Field {
    pub(crate) fn new(name: String, definition: FieldDefinition) -> Self {
        let initial = definition.default_value.clone().unwrap_or_default();
        Self {
            name,
            definition,
            value: initial.clone(),
            original_value: initial,
            valid: true,
            error_message: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        self.definition.label.as_deref().unwrap_or(&self.name)
    }

    pub fn definition(&self) -> &FieldDefinition {
        &self.definition
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn original_value(&self) -> &str {
        &self.original_value
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn is_changed(&self) -> bool {
        self.value != self.original_value
    }

    /// Records a validation verdict, keeping `valid == false` paired with a
    /// non-empty message.
    pub(crate) fn set_validity(&mut self, valid: bool, message: &str) {
        self.valid = valid;
        self.error_message = if valid {
            String::new()
        } else if message.is_empty() {
            "invalid value".to_string()
        } else {
            message.to_string()
        };
    }

    pub(crate) fn clear_validity(&mut self) {
        self.set_validity(true, "");
    }
}

/// Builds a block-qualified field name such as `EMP.LAST_NAME`.
pub fn qualified_name(block: Option<&str>, name: &str) -> String {
    match block.map(str::trim).filter(|block| !block.is_empty()) {
        Some(block) => format!("{}.{}", block, name.trim()),
        None => name.trim().to_string(),
    }
}
