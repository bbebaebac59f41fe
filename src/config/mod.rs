//! JSON form definitions and where they live on disk.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{
    collections::HashMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

use crate::errors::{CapabilityError, FormError};
use crate::form::{
    qualified_name, DataType, FieldDefinition, FormCollaborators, FormController, LovBinding,
    LovMapping, ValidationEngine,
};
use crate::gateway::PresentationGateway;
use crate::storage::{table_path, JsonRecordStore};
use crate::utils::paths::{app_data_dir, data_dir_in, ensure_dir, forms_dir_in};

pub const DEMO_FORM: &str = "employees";
const TMP_SUFFIX: &str = "json.tmp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid form definition: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Form definition `{0}` not found")]
    NotFound(String),
    #[error("Field `{field}` refers to unknown list of values `{lov}`")]
    UnknownLov { field: String, lov: String },
    #[error("List of values `{0}` maps no fields")]
    EmptyMapping(String),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Storage(#[from] CapabilityError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Id of the list of values bound to this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lov: Option<String>,
}

impl FieldConfig {
    fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            required: false,
            data_type,
            max_length: None,
            default_value: None,
            lov: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LovColumn {
    pub property: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LovConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_param: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_fields: Vec<String>,
    /// Named mapping from row property to field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map: Vec<LovColumn>,
    /// Positional mapping used when `map` is empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub return_items: Vec<String>,
}

/// A complete form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    pub data_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_formats: Vec<String>,
    pub fields: Vec<FieldConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lovs: Vec<LovConfig>,
}

impl FormConfig {
    /// The EMPLOYEES form shipped with the CLI.
    pub fn demo() -> Self {
        let mut employee_id = FieldConfig::new("EMPLOYEE_ID", DataType::Number);
        employee_id.required = true;
        employee_id.max_length = Some(6);
        employee_id.label = Some("Employee ID".into());

        let mut first_name = FieldConfig::new("FIRST_NAME", DataType::String);
        first_name.required = true;
        first_name.max_length = Some(20);
        first_name.label = Some("First name".into());

        let mut last_name = FieldConfig::new("LAST_NAME", DataType::String);
        last_name.max_length = Some(25);
        last_name.label = Some("Last name".into());

        let mut hire_date = FieldConfig::new("HIRE_DATE", DataType::Date);
        hire_date.label = Some("Hire date".into());

        let mut salary = FieldConfig::new("SALARY", DataType::Number);
        salary.label = Some("Salary".into());

        let mut department_id = FieldConfig::new("DEPARTMENT_ID", DataType::Number);
        department_id.label = Some("Department".into());

        let mut department_name = FieldConfig::new("DEPARTMENT_NAME", DataType::String);
        department_name.label = Some("Department name".into());
        department_name.lov = Some("DEPARTMENTS".into());

        Self {
            name: DEMO_FORM.into(),
            block: None,
            data_table: "employees".into(),
            key_field: Some("EMPLOYEE_ID".into()),
            date_formats: Vec::new(),
            fields: vec![
                employee_id,
                first_name,
                last_name,
                hire_date,
                salary,
                department_id,
                department_name,
            ],
            lovs: vec![LovConfig {
                id: "DEPARTMENTS".into(),
                title: Some("Departments".into()),
                table: "departments".into(),
                filter_param: Some("DEPARTMENT_NAME".into()),
                source_fields: Vec::new(),
                map: vec![
                    LovColumn {
                        property: "DEPARTMENT_ID".into(),
                        field: "DEPARTMENT_ID".into(),
                    },
                    LovColumn {
                        property: "DEPARTMENT_NAME".into(),
                        field: "DEPARTMENT_NAME".into(),
                    },
                ],
                return_items: Vec::new(),
            }],
        }
    }

    fn qualify(&self, name: &str) -> String {
        qualified_name(self.block.as_deref(), name)
    }

    fn binding(&self, lov: &LovConfig, data_dir: &Path) -> Result<LovBinding, ConfigError> {
        let mapping = if !lov.map.is_empty() {
            LovMapping::named(
                lov.map
                    .iter()
                    .map(|column| (column.property.clone(), self.qualify(&column.field))),
            )
        } else if !lov.return_items.is_empty() {
            LovMapping::positional(lov.return_items.iter().map(|field| self.qualify(field)))
        } else {
            return Err(ConfigError::EmptyMapping(lov.id.clone()));
        };

        let store = Arc::new(JsonRecordStore::new(table_path(data_dir, &lov.table), None));
        let mut binding = LovBinding::new(lov.id.clone(), store, mapping)
            .with_source_fields(lov.source_fields.iter().map(|field| self.qualify(field)));
        if let Some(title) = &lov.title {
            binding = binding.with_title(title.clone());
        }
        if let Some(param) = &lov.filter_param {
            binding = binding.with_filter_param(param.clone());
        }
        Ok(binding)
    }

    /// Builds a live form backed by JSON tables under `data_dir`.
    pub fn build(
        &self,
        data_dir: &Path,
        presentation: Arc<dyn PresentationGateway>,
    ) -> Result<FormController, ConfigError> {
        let mut bindings = HashMap::new();
        for lov in &self.lovs {
            bindings.insert(lov.id.clone(), Arc::new(self.binding(lov, data_dir)?));
        }

        let store = Arc::new(JsonRecordStore::new(
            table_path(data_dir, &self.data_table),
            self.key_field.as_deref().map(|key| self.qualify(key)),
        ));
        let collaborators = FormCollaborators {
            query: store.clone(),
            persistence: store,
            presentation,
        };
        let mut form = FormController::new(self.name.clone(), collaborators)
            .with_validation(ValidationEngine::with_date_formats(self.date_formats.clone()));

        for field in &self.fields {
            let mut definition = FieldDefinition::new(field.data_type);
            definition.required = field.required;
            definition.max_length = field.max_length;
            definition.label = field.label.clone();
            definition.default_value = field.default_value.clone();
            if let Some(lov) = &field.lov {
                let binding = bindings.get(lov).ok_or_else(|| ConfigError::UnknownLov {
                    field: field.name.clone(),
                    lov: lov.clone(),
                })?;
                definition.lov_binding = Some(Arc::clone(binding));
            }
            form.register_field(&self.qualify(&field.name), definition)?;
        }
        Ok(form)
    }
}

fn demo_departments() -> Vec<Map<String, Value>> {
    [
        (10, "Administration"),
        (20, "Marketing"),
        (30, "Purchasing"),
        (40, "Human Resources"),
        (50, "Shipping"),
        (80, "Sales"),
    ]
    .into_iter()
    .filter_map(|(id, name)| match json!({"DEPARTMENT_ID": id, "DEPARTMENT_NAME": name}) {
        Value::Object(map) => Some(map),
        _ => None,
    })
    .collect()
}

/// Resolves form definitions and data tables under the application home.
pub struct ConfigManager {
    forms_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_base_dir(app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        ensure_dir(&base)?;
        let forms_dir = forms_dir_in(&base);
        ensure_dir(&forms_dir)?;
        let data_dir = data_dir_in(&base);
        ensure_dir(&data_dir)?;
        Ok(Self {
            forms_dir,
            data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn form_path(&self, name: &str) -> PathBuf {
        table_path(&self.forms_dir, name)
    }

    /// Loads `forms/<name>.json`; the demo form is available without a file.
    pub fn load_form(&self, name: &str) -> Result<FormConfig, ConfigError> {
        let path = self.form_path(name);
        if path.exists() {
            let data = fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&data)?)
        } else if name.eq_ignore_ascii_case(DEMO_FORM) {
            Ok(FormConfig::demo())
        } else {
            Err(ConfigError::NotFound(name.to_string()))
        }
    }

    pub fn save_form(&self, config: &FormConfig) -> Result<PathBuf, ConfigError> {
        let path = self.form_path(&config.name);
        let json = serde_json::to_string_pretty(config)?;
        let tmp = path.with_extension(TMP_SUFFIX);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Writes the demo form definition and seeds its departments table when
    /// missing. Returns the files that were written.
    pub fn init_demo(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut written = Vec::new();
        let demo = FormConfig::demo();
        if !self.form_path(&demo.name).exists() {
            written.push(self.save_form(&demo)?);
        }
        let departments = JsonRecordStore::new(table_path(&self.data_dir, "departments"), None);
        if !departments.path().exists() {
            departments.write_rows(&demo_departments())?;
            written.push(departments.path().to_path_buf());
        }
        Ok(written)
    }
}

fn write_atomic(path: &Path, data: &str) -> Result<(), ConfigError> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn demo_form_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).unwrap();
        let written = manager.init_demo().unwrap();
        assert_eq!(written.len(), 2);
        assert!(manager.init_demo().unwrap().is_empty());

        let loaded = manager.load_form(DEMO_FORM).unwrap();
        assert_eq!(loaded, FormConfig::demo());
    }

    #[test]
    fn missing_form_is_reported() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).unwrap();
        assert!(matches!(
            manager.load_form("payroll"),
            Err(ConfigError::NotFound(name)) if name == "payroll"
        ));
    }

    #[test]
    fn field_config_defaults_are_optional_in_json() {
        let field: FieldConfig = serde_json::from_str(r#"{"name": "ENAME"}"#).unwrap();
        assert_eq!(field.data_type, DataType::String);
        assert!(!field.required);
        assert!(field.lov.is_none());
    }

    #[test]
    fn unknown_lov_reference_is_rejected() {
        let mut config = FormConfig::demo();
        config.lovs.clear();
        let dir = TempDir::new().unwrap();
        let presentation = Arc::new(crate::form::testing::RecordingPresentation::default());
        let err = config.build(dir.path(), presentation).err();
        assert!(matches!(err, Some(ConfigError::UnknownLov { ref lov, .. }) if lov == "DEPARTMENTS"));
    }

    #[test]
    fn block_qualifies_field_names() {
        let mut config = FormConfig::demo();
        config.block = Some("EMP".into());
        let dir = TempDir::new().unwrap();
        let presentation = Arc::new(crate::form::testing::RecordingPresentation::default());
        let form = config.build(dir.path(), presentation).unwrap();
        assert!(form.field("EMP.EMPLOYEE_ID").is_ok());
        assert!(form.field("EMPLOYEE_ID").is_err());
    }
}
