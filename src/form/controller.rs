use std::sync::Arc;

use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::errors::{Result, TriggerError};
use crate::form::field::{Field, FieldDefinition};
use crate::form::lov::{LovOutcome, LovResolver};
use crate::form::navigation::{
    key_command, Direction, FormKey, KeyCommand, KeyModifiers, NavigationController,
};
use crate::form::query_mode::{
    clear_to_empty, FormMode, QueryModeStateMachine, QueryOutcome, SaveOutcome,
};
use crate::form::registry::FieldRegistry;
use crate::form::triggers::{Trigger, TriggerContext, TriggerDispatcher};
use crate::form::validation::ValidationEngine;
use crate::gateway::{PersistenceCapability, PresentationGateway, QueryCapability, Record};

pub const LOV_IN_QUERY_MESSAGE: &str = "list of values is not available in query mode";

/// Capabilities a form is constructed with.
#[derive(Clone)]
pub struct FormCollaborators {
    pub query: Arc<dyn QueryCapability>,
    pub persistence: Arc<dyn PersistenceCapability>,
    pub presentation: Arc<dyn PresentationGateway>,
}

/// Result of handling a field change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub valid: bool,
    pub lov: Option<LovOutcome>,
}

/// Result of handling a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Focused(String),
    QueryEntered,
    Query(QueryOutcome),
    Save(SaveOutcome),
    Lov(Option<LovOutcome>),
    Cleared,
    QueryCancelled(bool),
    Ignored,
}

/// One form instance: its fields, triggers, mode and collaborators.
///
/// Every handler takes `&mut self`, so one owner processes each event to
/// completion (including any awaited lookup, query or save) before the next.
pub struct FormController {
    session_id: Uuid,
    name: String,
    registry: FieldRegistry,
    validation: ValidationEngine,
    triggers: TriggerDispatcher,
    state: QueryModeStateMachine,
    current_field: Option<String>,
    collaborators: FormCollaborators,
}

impl FormController {
    pub fn new(name: impl Into<String>, collaborators: FormCollaborators) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            name: name.into(),
            registry: FieldRegistry::new(),
            validation: ValidationEngine::default(),
            triggers: TriggerDispatcher::new(),
            state: QueryModeStateMachine::new(),
            current_field: None,
            collaborators,
        }
    }

    pub fn with_validation(mut self, validation: ValidationEngine) -> Self {
        self.validation = validation;
        self
    }

    pub fn register_field(&mut self, name: &str, definition: FieldDefinition) -> Result<()> {
        self.registry.register(name, definition)
    }

    pub fn register_trigger<F>(&mut self, trigger: Trigger, callback: F)
    where
        F: Fn(&TriggerContext) -> std::result::Result<(), TriggerError> + Send + Sync + 'static,
    {
        self.triggers.register(trigger, callback);
    }

    pub fn register_trigger_named<F>(&mut self, name: &str, callback: F) -> Result<Trigger>
    where
        F: Fn(&TriggerContext) -> std::result::Result<(), TriggerError> + Send + Sync + 'static,
    {
        self.triggers.register_named(name, callback)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> FormMode {
        self.state.mode()
    }

    pub fn is_dirty(&self) -> bool {
        self.registry.is_dirty()
    }

    pub fn current_field(&self) -> Option<&str> {
        self.current_field.as_deref()
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.registry.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.registry.fields()
    }

    pub fn snapshot(&self) -> Record {
        self.registry.snapshot()
    }

    /// Handles a user edit. Outside QUERY mode the field is validated,
    /// `WHEN_VALIDATE_ITEM` runs, and a bound list of values is resolved.
    pub async fn on_field_changed(&mut self, name: &str, raw_value: &str) -> Result<FieldChange> {
        let span = info_span!("field_changed", session = %self.session_id, field = name);
        self.handle_field_change(name, raw_value)
            .instrument(span)
            .await
    }

    async fn handle_field_change(&mut self, name: &str, raw_value: &str) -> Result<FieldChange> {
        self.registry.set(name, raw_value)?;
        self.current_field = Some(name.to_string());

        if self.state.is_query() {
            debug!("query filter updated");
            return Ok(FieldChange {
                valid: true,
                lov: None,
            });
        }

        if !self.validate_field(name)? {
            return Ok(FieldChange {
                valid: false,
                lov: None,
            });
        }

        let mut valid = true;
        let binding = self.registry.get(name)?.definition().lov_binding.clone();
        let lov = match binding {
            Some(binding) if !raw_value.trim().is_empty() && self.state.allows_lov() => {
                let outcome = LovResolver::resolve(
                    &binding,
                    raw_value.trim(),
                    &mut self.registry,
                    self.collaborators.presentation.as_ref(),
                    &self.triggers,
                )
                .await;
                if let LovOutcome::Applied(written) = &outcome {
                    for field in written {
                        valid &= self.validate_field(field)?;
                    }
                }
                Some(outcome)
            }
            _ => None,
        };

        Ok(FieldChange { valid, lov })
    }

    /// Validates one field, records the verdict and reports a failure.
    /// `WHEN_VALIDATE_ITEM` only runs when the built-in rules pass; its
    /// failure marks the field invalid.
    fn validate_field(&mut self, name: &str) -> Result<bool> {
        let field = self.registry.get(name)?;
        let value = field.value().to_string();
        let mut verdict = self.validation.validate(field.definition(), &value);

        if verdict.valid {
            let context = TriggerContext::for_field(name, &value);
            if let Err(err) = self.triggers.fire(Trigger::WhenValidateItem, &context) {
                verdict.valid = false;
                verdict.message = err.message;
            }
        }

        let field = self.registry.get_mut(name)?;
        field.set_validity(verdict.valid, &verdict.message);
        if !verdict.valid {
            let message = format!("{}: {}", field.label(), field.error_message());
            self.collaborators.presentation.show_error(&message);
        }
        Ok(verdict.valid)
    }

    pub fn on_focus(&mut self, name: &str) -> Result<()> {
        self.registry.position(name)?;
        self.current_field = Some(name.to_string());
        Ok(())
    }

    pub fn navigate(&mut self, direction: Direction) -> Result<String> {
        let next =
            NavigationController::next(&self.registry, self.current_field.as_deref(), direction)?;
        self.focus(&next);
        Ok(next)
    }

    pub async fn on_key(&mut self, key: FormKey, modifiers: KeyModifiers) -> Result<KeyOutcome> {
        let outcome = match key_command(key, modifiers) {
            KeyCommand::Navigate(direction) => KeyOutcome::Focused(self.navigate(direction)?),
            KeyCommand::EnterQuery => {
                self.enter_query()?;
                KeyOutcome::QueryEntered
            }
            KeyCommand::ExecuteQuery => KeyOutcome::Query(self.execute_query().await?),
            KeyCommand::CancelQuery => KeyOutcome::QueryCancelled(self.cancel_query()),
            KeyCommand::ListValues => KeyOutcome::Lov(self.list_values().await?),
            KeyCommand::Save => KeyOutcome::Save(self.request_save().await),
            KeyCommand::ClearForm => {
                self.clear_form();
                KeyOutcome::Cleared
            }
            KeyCommand::Ignored => KeyOutcome::Ignored,
        };
        Ok(outcome)
    }

    pub async fn request_save(&mut self) -> SaveOutcome {
        let span = info_span!("save", session = %self.session_id, form = %self.name);
        self.state
            .save(
                &mut self.registry,
                &self.validation,
                self.collaborators.persistence.as_ref(),
                &self.triggers,
                self.collaborators.presentation.as_ref(),
            )
            .instrument(span)
            .await
    }

    /// Enters QUERY mode from NORMAL mode (`None`), or executes the pending
    /// query when already in QUERY mode.
    pub async fn request_query(&mut self) -> Result<Option<QueryOutcome>> {
        if self.state.is_query() {
            self.execute_query().await.map(Some)
        } else {
            self.enter_query()?;
            Ok(None)
        }
    }

    pub fn enter_query(&mut self) -> Result<()> {
        self.state.enter_query(&mut self.registry, &self.triggers);
        self.focus_first()?;
        Ok(())
    }

    pub async fn execute_query(&mut self) -> Result<QueryOutcome> {
        let span = info_span!("query", session = %self.session_id, form = %self.name);
        let outcome = self
            .state
            .execute_query(
                &mut self.registry,
                self.collaborators.query.as_ref(),
                &self.triggers,
                self.collaborators.presentation.as_ref(),
            )
            .instrument(span)
            .await;
        if matches!(outcome, QueryOutcome::Loaded { .. }) {
            self.focus_first()?;
        }
        Ok(outcome)
    }

    pub fn cancel_query(&mut self) -> bool {
        self.state.cancel_query(&mut self.registry)
    }

    /// Empties the form, leaves QUERY mode and starts a clean record.
    pub fn clear_form(&mut self) {
        self.state.cancel_query(&mut self.registry);
        clear_to_empty(&mut self.registry);
        self.current_field = None;
    }

    pub fn load_record(&mut self, record: &Record) {
        self.registry.load(record);
    }

    /// Opens the list of values bound to the focused field, filtered by its
    /// current value. Returns `None` when there is nothing to look up.
    pub async fn list_values(&mut self) -> Result<Option<LovOutcome>> {
        let Some(name) = self.current_field.clone() else {
            return Ok(None);
        };
        if !self.state.allows_lov() {
            self.collaborators
                .presentation
                .show_message(LOV_IN_QUERY_MESSAGE);
            return Ok(None);
        }
        let field = self.registry.get(&name)?;
        let Some(binding) = field.definition().lov_binding.clone() else {
            self.collaborators
                .presentation
                .show_message(&format!("{} has no list of values", field.label()));
            return Ok(None);
        };
        let filter = field.value().trim().to_string();

        let outcome = LovResolver::resolve(
            &binding,
            &filter,
            &mut self.registry,
            self.collaborators.presentation.as_ref(),
            &self.triggers,
        )
        .await;
        if let LovOutcome::Applied(written) = &outcome {
            for field in written {
                self.validate_field(field)?;
            }
        }
        Ok(Some(outcome))
    }

    fn focus_first(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            self.current_field = None;
            return Ok(());
        }
        let first = NavigationController::first(&self.registry)?;
        self.focus(&first);
        Ok(())
    }

    fn focus(&mut self, name: &str) {
        self.current_field = Some(name.to_string());
        self.collaborators.presentation.focus(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FormError;
    use crate::form::testing::{RecordingPersistence, RecordingPresentation, StaticQuery};

    fn controller() -> (FormController, Arc<RecordingPresentation>) {
        let presentation = Arc::new(RecordingPresentation::default());
        let collaborators = FormCollaborators {
            query: Arc::new(StaticQuery::new(Vec::new())),
            persistence: Arc::new(RecordingPersistence::default()),
            presentation: presentation.clone(),
        };
        let mut form = FormController::new("EMP", collaborators);
        form.register_field("EMPNO", FieldDefinition::number().required())
            .unwrap();
        form.register_field("ENAME", FieldDefinition::text().with_max_length(10))
            .unwrap();
        (form, presentation)
    }

    #[tokio::test]
    async fn invalid_change_is_reported() {
        let (mut form, presentation) = controller();
        let change = form.on_field_changed("EMPNO", "seven").await.unwrap();
        assert!(!change.valid);
        assert_eq!(form.field("EMPNO").unwrap().error_message(), "must be a number");
        assert_eq!(presentation.errors(), vec!["EMPNO: must be a number".to_string()]);
        assert!(form.is_dirty());
    }

    #[tokio::test]
    async fn unknown_field_change_is_an_error() {
        let (mut form, _) = controller();
        assert_eq!(
            form.on_field_changed("SAL", "1").await,
            Err(FormError::UnknownField("SAL".into()))
        );
    }

    #[tokio::test]
    async fn when_validate_item_failure_marks_field_invalid() {
        let (mut form, _) = controller();
        form.register_trigger(Trigger::WhenValidateItem, |ctx| {
            if ctx.field.as_deref() == Some("ENAME") && ctx.value.as_deref() == Some("NOBODY") {
                Err(TriggerError::new("name is reserved"))
            } else {
                Ok(())
            }
        });
        let change = form.on_field_changed("ENAME", "NOBODY").await.unwrap();
        assert!(!change.valid);
        assert_eq!(form.field("ENAME").unwrap().error_message(), "name is reserved");
    }

    #[tokio::test]
    async fn query_mode_changes_skip_validation() {
        let (mut form, _) = controller();
        assert_eq!(form.request_query().await.unwrap(), None);
        assert_eq!(form.mode(), FormMode::Query);
        let change = form.on_field_changed("EMPNO", ">7000").await.unwrap();
        assert!(change.valid);
        assert!(form.field("EMPNO").unwrap().is_valid());
    }

    #[tokio::test]
    async fn tab_walks_fields_and_focuses_presentation() {
        let (mut form, presentation) = controller();
        let first = form.on_key(FormKey::Tab, KeyModifiers::NONE).await.unwrap();
        assert_eq!(first, KeyOutcome::Focused("EMPNO".into()));
        let second = form.on_key(FormKey::Tab, KeyModifiers::NONE).await.unwrap();
        assert_eq!(second, KeyOutcome::Focused("ENAME".into()));
        let wrapped = form.on_key(FormKey::Tab, KeyModifiers::NONE).await.unwrap();
        assert_eq!(wrapped, KeyOutcome::Focused("EMPNO".into()));
        assert_eq!(presentation.focused().len(), 3);
    }

    #[tokio::test]
    async fn clear_form_resets_everything() {
        let (mut form, _) = controller();
        form.on_field_changed("ENAME", "SCOTT").await.unwrap();
        form.clear_form();
        assert!(!form.is_dirty());
        assert_eq!(form.field("ENAME").unwrap().value(), "");
        assert_eq!(form.current_field(), None);
        assert_eq!(form.mode(), FormMode::Normal);
    }

    #[tokio::test]
    async fn list_values_is_refused_in_query_mode() {
        let (mut form, presentation) = controller();
        form.enter_query().unwrap();
        assert_eq!(form.list_values().await.unwrap(), None);
        assert_eq!(
            presentation.messages(),
            vec![LOV_IN_QUERY_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn list_values_without_binding_reports_message() {
        let (mut form, presentation) = controller();
        form.on_focus("ENAME").unwrap();
        assert_eq!(form.list_values().await.unwrap(), None);
        assert_eq!(
            presentation.messages(),
            vec!["ENAME has no list of values".to_string()]
        );
    }
}
