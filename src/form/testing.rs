//! Recording fakes for the collaborator traits, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::CapabilityError;
use crate::gateway::{PersistenceCapability, PresentationGateway, QueryCapability, Record, Row};

#[derive(Default)]
pub struct StaticQuery {
    rows: Vec<Row>,
    failure: Option<String>,
    calls: AtomicUsize,
    last: Mutex<Option<Record>>,
}

impl StaticQuery {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_parameters(&self) -> Option<Record> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryCapability for StaticQuery {
    async fn query(&self, parameters: &Record) -> Result<Vec<Row>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(parameters.clone());
        match &self.failure {
            Some(message) => Err(CapabilityError::Transport(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}

#[derive(Default)]
pub struct RecordingPersistence {
    failure: Option<String>,
    saved: Mutex<Vec<Record>>,
}

impl RecordingPersistence {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<Record> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistenceCapability for RecordingPersistence {
    async fn persist(&self, record: &Record) -> Result<(), CapabilityError> {
        self.saved.lock().unwrap().push(record.clone());
        match &self.failure {
            Some(message) => Err(CapabilityError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

/// Records every presentation call. Disambiguation picks `choice` (an index
/// into the offered rows) or cancels when it is `None`.
pub struct RecordingPresentation {
    choice: Option<usize>,
    errors: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
    focused: Mutex<Vec<String>>,
    disambiguations: AtomicUsize,
}

impl Default for RecordingPresentation {
    fn default() -> Self {
        Self::choosing(0)
    }
}

impl RecordingPresentation {
    pub fn choosing(choice: usize) -> Self {
        Self {
            choice: Some(choice),
            errors: Mutex::default(),
            messages: Mutex::default(),
            focused: Mutex::default(),
            disambiguations: AtomicUsize::new(0),
        }
    }

    pub fn cancelling() -> Self {
        Self {
            choice: None,
            ..Self::choosing(0)
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().unwrap().clone()
    }

    pub fn disambiguations(&self) -> usize {
        self.disambiguations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresentationGateway for RecordingPresentation {
    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn show_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn focus(&self, field: &str) {
        self.focused.lock().unwrap().push(field.to_string());
    }

    async fn show_disambiguation(&self, _title: &str, rows: &[Row]) -> Option<Row> {
        self.disambiguations.fetch_add(1, Ordering::SeqCst);
        self.choice.and_then(|idx| rows.get(idx).cloned())
    }
}
