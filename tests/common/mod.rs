#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use form_core::{
    errors::CapabilityError,
    form::{FieldDefinition, FormCollaborators, FormController},
    gateway::{PersistenceCapability, PresentationGateway, QueryCapability, Record, Row},
};
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A fresh directory that outlives the test that asked for it.
pub fn temp_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

/// Query capability returning canned rows and remembering its parameters.
#[derive(Default)]
pub struct CannedQuery {
    rows: Vec<Row>,
    calls: Mutex<Vec<Record>>,
}

impl CannedQuery {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Record> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryCapability for CannedQuery {
    async fn query(&self, parameters: &Record) -> Result<Vec<Row>, CapabilityError> {
        self.calls.lock().unwrap().push(parameters.clone());
        Ok(self.rows.clone())
    }
}

#[derive(Default)]
pub struct CapturingPersistence {
    saved: Mutex<Vec<Record>>,
}

impl CapturingPersistence {
    pub fn saved(&self) -> Vec<Record> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistenceCapability for CapturingPersistence {
    async fn persist(&self, record: &Record) -> Result<(), CapabilityError> {
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Presentation gateway that records everything and picks a fixed row.
#[derive(Default)]
pub struct CapturingPresentation {
    pub choice: Option<usize>,
    errors: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl CapturingPresentation {
    pub fn choosing(choice: usize) -> Self {
        Self {
            choice: Some(choice),
            ..Self::default()
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PresentationGateway for CapturingPresentation {
    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn show_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn focus(&self, _field: &str) {}

    async fn show_disambiguation(&self, title: &str, rows: &[Row]) -> Option<Row> {
        self.prompts.lock().unwrap().push(title.to_string());
        self.choice.and_then(|idx| rows.get(idx).cloned())
    }
}

pub struct Harness {
    pub form: FormController,
    pub query: Arc<CannedQuery>,
    pub persistence: Arc<CapturingPersistence>,
    pub presentation: Arc<CapturingPresentation>,
}

/// EMPLOYEES-style form with EMPLOYEE_ID and FIRST_NAME required.
pub fn employees_form(rows: Vec<Row>, presentation: CapturingPresentation) -> Harness {
    let query = Arc::new(CannedQuery::new(rows));
    let persistence = Arc::new(CapturingPersistence::default());
    let presentation = Arc::new(presentation);
    let collaborators = FormCollaborators {
        query: query.clone(),
        persistence: persistence.clone(),
        presentation: presentation.clone(),
    };

    let mut form = FormController::new("EMPLOYEES", collaborators);
    form.register_field("EMPLOYEE_ID", FieldDefinition::number().required())
        .unwrap();
    form.register_field(
        "FIRST_NAME",
        FieldDefinition::text().required().with_max_length(20),
    )
    .unwrap();
    form.register_field("LAST_NAME", FieldDefinition::text())
        .unwrap();
    form.register_field("HIRE_DATE", FieldDefinition::date())
        .unwrap();

    Harness {
        form,
        query,
        persistence,
        presentation,
    }
}
