use tracing::{debug, info, warn};

use crate::errors::FormFailure;
use crate::form::registry::FieldRegistry;
use crate::form::triggers::{Trigger, TriggerContext, TriggerDispatcher};
use crate::form::validation::ValidationEngine;
use crate::gateway::{
    row_to_record, PersistenceCapability, PresentationGateway, QueryCapability, Record,
};

pub const NO_RECORDS_MESSAGE: &str = "no records found";
pub const NO_CHANGES_MESSAGE: &str = "no changes to save";
pub const QUERY_MODE_SAVE_MESSAGE: &str = "cannot save while in query mode";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormMode {
    #[default]
    Normal,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    NotInQueryMode,
    NoRecords,
    /// The first match was loaded; `matches` counts every row returned.
    Loaded { record: Record, matches: usize },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    QueryModeActive,
    /// Names of the fields that failed validation.
    Invalid(Vec<String>),
    NoChanges,
    /// `PRE_UPDATE` refused the save.
    Rejected(String),
    Saved(Record),
    Failed(String),
}

/// NORMAL/QUERY mode plus the query and save transitions that depend on it.
///
/// While in QUERY mode field values are search filters: saving is refused and
/// list-of-values lookups are suppressed.
#[derive(Debug, Default)]
pub struct QueryModeStateMachine {
    mode: FormMode,
}

impl QueryModeStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_query(&self) -> bool {
        self.mode == FormMode::Query
    }

    pub fn allows_save(&self) -> bool {
        self.mode == FormMode::Normal
    }

    pub fn allows_lov(&self) -> bool {
        self.mode == FormMode::Normal
    }

    pub fn enter_query(&mut self, registry: &mut FieldRegistry, triggers: &TriggerDispatcher) {
        registry.reset(false);
        self.mode = FormMode::Query;
        debug!("entered query mode");
        let _ = triggers.fire_or_report(Trigger::EnterQueryMode, &TriggerContext::default());
    }

    /// Leaves QUERY mode without running the query. Returns `false` when the
    /// form was not in QUERY mode.
    pub fn cancel_query(&mut self, registry: &mut FieldRegistry) -> bool {
        if !self.is_query() {
            return false;
        }
        clear_to_empty(registry);
        self.mode = FormMode::Normal;
        debug!("query cancelled");
        true
    }

    /// Runs the query described by the filled-in fields and loads the first
    /// match. The form is back in NORMAL mode afterwards whatever happened.
    pub async fn execute_query(
        &mut self,
        registry: &mut FieldRegistry,
        query: &dyn QueryCapability,
        triggers: &TriggerDispatcher,
        presentation: &dyn PresentationGateway,
    ) -> QueryOutcome {
        if !self.is_query() {
            return QueryOutcome::NotInQueryMode;
        }

        let parameters = registry.snapshot();
        debug!(?parameters, "executing query");
        let result = query.query(&parameters).await;
        self.mode = FormMode::Normal;

        let rows = match result {
            Ok(rows) => rows,
            Err(err) => {
                clear_to_empty(registry);
                let message = FormFailure::Query(err).to_string();
                warn!(error = %message, "query failed");
                triggers.report_error(&message);
                presentation.show_error(&message);
                return QueryOutcome::Failed(message);
            }
        };

        clear_to_empty(registry);
        let Some(first) = rows.first() else {
            info!("query returned no records");
            presentation.show_message(NO_RECORDS_MESSAGE);
            return QueryOutcome::NoRecords;
        };

        let names: Vec<String> = registry.names().map(str::to_string).collect();
        let record = row_to_record(first, &names);
        registry.load(&record);

        let matches = rows.len();
        info!(matches, "query loaded first record");
        if matches == 1 {
            presentation.show_message("1 record retrieved");
        } else {
            presentation.show_message(&format!(
                "{} records retrieved, showing the first",
                matches
            ));
        }
        let _ = triggers.fire_or_report(
            Trigger::AfterQuery,
            &TriggerContext::for_record(record.clone()),
        );

        QueryOutcome::Loaded { record, matches }
    }

    /// Validates and persists the form. Refusals are reported through the
    /// presentation gateway and never leave the form half-saved: the dirty
    /// flag and baselines only change after the persistence call succeeds.
    pub async fn save(
        &mut self,
        registry: &mut FieldRegistry,
        validation: &ValidationEngine,
        persistence: &dyn PersistenceCapability,
        triggers: &TriggerDispatcher,
        presentation: &dyn PresentationGateway,
    ) -> SaveOutcome {
        if !self.allows_save() {
            presentation.show_message(QUERY_MODE_SAVE_MESSAGE);
            return SaveOutcome::QueryModeActive;
        }

        if !validate_items(registry, validation, triggers) {
            let invalid: Vec<String> = registry
                .fields()
                .filter(|field| !field.is_valid())
                .map(|field| field.name().to_string())
                .collect();
            if let Some(field) = registry.fields().find(|field| !field.is_valid()) {
                let failure = FormFailure::Validation {
                    field: field.label().to_string(),
                    message: field.error_message().to_string(),
                };
                presentation.show_error(&failure.to_string());
            }
            debug!(?invalid, "save blocked by validation");
            return SaveOutcome::Invalid(invalid);
        }

        if !registry.is_dirty() {
            presentation.show_message(NO_CHANGES_MESSAGE);
            return SaveOutcome::NoChanges;
        }

        let record = registry.snapshot();
        let context = TriggerContext::for_record(record.clone());
        if let Err(err) = triggers.fire_or_report(Trigger::PreUpdate, &context) {
            presentation.show_error(&err.message);
            return SaveOutcome::Rejected(err.message);
        }

        match persistence.persist(&record).await {
            Ok(()) => {
                let _ = triggers.fire_or_report(Trigger::PostUpdate, &context);
                registry.commit_baseline();
                info!(fields = record.len(), "record saved");
                presentation.show_message("record saved");
                SaveOutcome::Saved(record)
            }
            Err(err) => {
                let message = FormFailure::Save(err).to_string();
                warn!(error = %message, "save failed");
                triggers.report_error(&message);
                presentation.show_error(&message);
                SaveOutcome::Failed(message)
            }
        }
    }
}

/// Built-in rules for every field, then `WHEN_VALIDATE_ITEM` for each field
/// that passed them. A trigger failure marks its field invalid.
fn validate_items(
    registry: &mut FieldRegistry,
    validation: &ValidationEngine,
    triggers: &TriggerDispatcher,
) -> bool {
    let mut all_valid = validation.validate_form(registry);
    let passed: Vec<(String, String)> = registry
        .fields()
        .filter(|field| field.is_valid())
        .map(|field| (field.name().to_string(), field.value().to_string()))
        .collect();

    for (name, value) in passed {
        let context = TriggerContext::for_field(&name, &value);
        if let Err(err) = triggers.fire(Trigger::WhenValidateItem, &context) {
            all_valid = false;
            if let Ok(field) = registry.get_mut(&name) {
                field.set_validity(false, &err.message);
            }
        }
    }
    all_valid
}

/// Empties every field and makes the empty form the clean baseline.
pub(crate) fn clear_to_empty(registry: &mut FieldRegistry) {
    registry.reset(false);
    registry.commit_baseline();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TriggerError;
    use crate::form::field::FieldDefinition;
    use crate::form::testing::{RecordingPersistence, RecordingPresentation, StaticQuery};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn registry() -> FieldRegistry {
        let mut registry = FieldRegistry::new();
        registry
            .register("EMPNO", FieldDefinition::number().required())
            .unwrap();
        registry.register("ENAME", FieldDefinition::text()).unwrap();
        registry
    }

    #[test]
    fn enter_query_clears_fields_and_fires_trigger() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut triggers = TriggerDispatcher::new();
        let counter = Arc::clone(&fired);
        triggers.register(Trigger::EnterQueryMode, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let mut registry = registry();
        registry.set("ENAME", "KING").unwrap();
        let mut machine = QueryModeStateMachine::new();
        machine.enter_query(&mut registry, &triggers);

        assert_eq!(machine.mode(), FormMode::Query);
        assert_eq!(registry.value("ENAME").unwrap(), "");
        assert!(!registry.is_dirty());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!machine.allows_lov());
    }

    #[tokio::test]
    async fn execute_outside_query_mode_is_a_no_op() {
        let query = StaticQuery::new(vec![json!({"EMPNO": "1"})]);
        let mut machine = QueryModeStateMachine::new();
        let outcome = machine
            .execute_query(
                &mut registry(),
                &query,
                &TriggerDispatcher::new(),
                &RecordingPresentation::default(),
            )
            .await;
        assert_eq!(outcome, QueryOutcome::NotInQueryMode);
        assert_eq!(query.calls(), 0);
    }

    #[tokio::test]
    async fn only_filled_fields_become_parameters_and_first_row_loads() {
        let query = StaticQuery::new(vec![
            json!({"EMPNO": 7839, "ENAME": "KING"}),
            json!({"EMPNO": 7698, "ENAME": "BLAKE"}),
        ]);
        let presentation = RecordingPresentation::default();
        let mut registry = registry();
        let mut machine = QueryModeStateMachine::new();
        machine.enter_query(&mut registry, &TriggerDispatcher::new());
        registry.set("ENAME", "%K%").unwrap();

        let outcome = machine
            .execute_query(&mut registry, &query, &TriggerDispatcher::new(), &presentation)
            .await;

        let params = query.last_parameters().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params["ENAME"], "%K%");
        assert!(matches!(outcome, QueryOutcome::Loaded { matches: 2, .. }));
        assert_eq!(registry.value("EMPNO").unwrap(), "7839");
        assert_eq!(registry.value("ENAME").unwrap(), "KING");
        assert!(!registry.is_dirty());
        assert_eq!(machine.mode(), FormMode::Normal);
    }

    #[tokio::test]
    async fn failed_query_still_leaves_query_mode() {
        let query = StaticQuery::failing("ORA-12541: no listener");
        let presentation = RecordingPresentation::default();
        let mut registry = registry();
        let mut machine = QueryModeStateMachine::new();
        machine.enter_query(&mut registry, &TriggerDispatcher::new());

        let outcome = machine
            .execute_query(&mut registry, &query, &TriggerDispatcher::new(), &presentation)
            .await;

        assert!(matches!(outcome, QueryOutcome::Failed(_)));
        assert_eq!(machine.mode(), FormMode::Normal);
        assert_eq!(presentation.errors().len(), 1);
    }

    #[test]
    fn cancel_query_only_applies_in_query_mode() {
        let mut registry = registry();
        let mut machine = QueryModeStateMachine::new();
        assert!(!machine.cancel_query(&mut registry));
        machine.enter_query(&mut registry, &TriggerDispatcher::new());
        registry.set("ENAME", "SM%").unwrap();
        assert!(machine.cancel_query(&mut registry));
        assert_eq!(machine.mode(), FormMode::Normal);
        assert_eq!(registry.value("ENAME").unwrap(), "");
        assert!(!registry.is_dirty());
    }

    #[tokio::test]
    async fn save_is_refused_in_query_mode() {
        let persistence = RecordingPersistence::default();
        let presentation = RecordingPresentation::default();
        let mut registry = registry();
        let mut machine = QueryModeStateMachine::new();
        machine.enter_query(&mut registry, &TriggerDispatcher::new());
        registry.set("EMPNO", "1").unwrap();

        let outcome = machine
            .save(
                &mut registry,
                &ValidationEngine::default(),
                &persistence,
                &TriggerDispatcher::new(),
                &presentation,
            )
            .await;

        assert_eq!(outcome, SaveOutcome::QueryModeActive);
        assert!(persistence.saved().is_empty());
    }

    #[tokio::test]
    async fn pre_update_failure_aborts_save() {
        let persistence = RecordingPersistence::default();
        let presentation = RecordingPresentation::default();
        let mut triggers = TriggerDispatcher::new();
        triggers.register(Trigger::PreUpdate, |_| {
            Err(TriggerError::new("record is locked"))
        });
        let mut registry = registry();
        registry.set("EMPNO", "7").unwrap();
        let mut machine = QueryModeStateMachine::new();

        let outcome = machine
            .save(
                &mut registry,
                &ValidationEngine::default(),
                &persistence,
                &triggers,
                &presentation,
            )
            .await;

        assert_eq!(outcome, SaveOutcome::Rejected("record is locked".into()));
        assert!(persistence.saved().is_empty());
        assert!(registry.is_dirty());
    }

    #[tokio::test]
    async fn persistence_failure_keeps_form_dirty() {
        let persistence = RecordingPersistence::failing("unique constraint violated");
        let presentation = RecordingPresentation::default();
        let mut registry = registry();
        registry.set("EMPNO", "7").unwrap();
        let mut machine = QueryModeStateMachine::new();

        let outcome = machine
            .save(
                &mut registry,
                &ValidationEngine::default(),
                &persistence,
                &TriggerDispatcher::new(),
                &presentation,
            )
            .await;

        assert!(matches!(outcome, SaveOutcome::Failed(ref msg) if msg.contains("unique constraint")));
        assert!(registry.is_dirty());
        assert_eq!(registry.get("EMPNO").unwrap().original_value(), "");
        assert_eq!(persistence.saved().len(), 1);
    }

    #[tokio::test]
    async fn successful_save_rebaselines_and_fires_post_update() {
        let persistence = RecordingPersistence::default();
        let presentation = RecordingPresentation::default();
        let posted = Arc::new(AtomicUsize::new(0));
        let mut triggers = TriggerDispatcher::new();
        let counter = Arc::clone(&posted);
        triggers.register(Trigger::PostUpdate, move |ctx| {
            assert_eq!(ctx.record.get("EMPNO").map(String::as_str), Some("7"));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let mut registry = registry();
        registry.set("EMPNO", "7").unwrap();
        let mut machine = QueryModeStateMachine::new();

        let outcome = machine
            .save(
                &mut registry,
                &ValidationEngine::default(),
                &persistence,
                &triggers,
                &presentation,
            )
            .await;

        assert!(matches!(outcome, SaveOutcome::Saved(_)));
        assert!(!registry.is_dirty());
        assert_eq!(registry.get("EMPNO").unwrap().original_value(), "7");
        assert_eq!(posted.load(Ordering::SeqCst), 1);
        assert_eq!(presentation.messages(), vec!["record saved".to_string()]);
    }
}
