use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, error};

use crate::errors::{FormError, TriggerError};
use crate::gateway::Record;

/// Lifecycle points a form exposes to hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trigger {
    WhenValidateItem,
    EnterQueryMode,
    AfterQuery,
    PreUpdate,
    PostUpdate,
    OnError,
}

impl Trigger {
    pub const ALL: [Trigger; 6] = [
        Trigger::WhenValidateItem,
        Trigger::EnterQueryMode,
        Trigger::AfterQuery,
        Trigger::PreUpdate,
        Trigger::PostUpdate,
        Trigger::OnError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::WhenValidateItem => "WHEN_VALIDATE_ITEM",
            Trigger::EnterQueryMode => "ENTER_QUERY_MODE",
            Trigger::AfterQuery => "AFTER_QUERY",
            Trigger::PreUpdate => "PRE_UPDATE",
            Trigger::PostUpdate => "POST_UPDATE",
            Trigger::OnError => "ON_ERROR",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = FormError;

    /// Accepts `WHEN-VALIDATE-ITEM`, `when_validate_field` and similar
    /// spellings.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "WHEN_VALIDATE_ITEM" | "WHEN_VALIDATE_FIELD" => Ok(Trigger::WhenValidateItem),
            "ENTER_QUERY_MODE" | "ENTER_QUERY" => Ok(Trigger::EnterQueryMode),
            "AFTER_QUERY" | "POST_QUERY" => Ok(Trigger::AfterQuery),
            "PRE_UPDATE" => Ok(Trigger::PreUpdate),
            "POST_UPDATE" => Ok(Trigger::PostUpdate),
            "ON_ERROR" => Ok(Trigger::OnError),
            _ => Err(FormError::UnknownTrigger(input.trim().to_string())),
        }
    }
}

/// Data handed to a trigger callback.
#[derive(Debug, Clone, Default)]
pub struct TriggerContext {
    pub field: Option<String>,
    pub value: Option<String>,
    pub record: Record,
    pub message: Option<String>,
}

impl TriggerContext {
    pub fn for_record(record: Record) -> Self {
        Self {
            record,
            ..Self::default()
        }
    }

    pub fn for_field(field: &str, value: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            value: Some(value.to_string()),
            ..Self::default()
        }
    }

    pub fn for_error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

pub type TriggerCallback = Arc<dyn Fn(&TriggerContext) -> Result<(), TriggerError> + Send + Sync>;

/// One callback per trigger; registering again replaces the previous one.
#[derive(Default)]
pub struct TriggerDispatcher {
    callbacks: HashMap<Trigger, TriggerCallback>,
}

impl TriggerDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, trigger: Trigger, callback: F)
    where
        F: Fn(&TriggerContext) -> Result<(), TriggerError> + Send + Sync + 'static,
    {
        debug!(%trigger, "trigger registered");
        self.callbacks.insert(trigger, Arc::new(callback));
    }

    /// Registers by name, rejecting anything outside the trigger vocabulary.
    pub fn register_named<F>(&mut self, name: &str, callback: F) -> Result<Trigger, FormError>
    where
        F: Fn(&TriggerContext) -> Result<(), TriggerError> + Send + Sync + 'static,
    {
        let trigger = name.parse::<Trigger>()?;
        self.register(trigger, callback);
        Ok(trigger)
    }

    pub fn is_registered(&self, trigger: Trigger) -> bool {
        self.callbacks.contains_key(&trigger)
    }

    /// Runs the callback for `trigger`, if any. A missing callback is a no-op.
    pub fn fire(&self, trigger: Trigger, context: &TriggerContext) -> Result<(), TriggerError> {
        match self.callbacks.get(&trigger) {
            Some(callback) => {
                debug!(%trigger, "firing trigger");
                callback(context)
            }
            None => Ok(()),
        }
    }

    /// Fires `trigger` and routes a failure to `ON_ERROR`. Returns the
    /// original failure so callers can decide whether to abort.
    pub fn fire_or_report(
        &self,
        trigger: Trigger,
        context: &TriggerContext,
    ) -> Result<(), TriggerError> {
        let outcome = self.fire(trigger, context);
        if let Err(err) = &outcome {
            if trigger == Trigger::OnError {
                error!(%trigger, error = %err, "ON_ERROR trigger failed; dropping");
            } else {
                self.report_error(&format!("{} failed: {}", trigger, err));
            }
        }
        outcome
    }

    /// Hands a failure message to `ON_ERROR`. A failing `ON_ERROR` handler is
    /// logged and dropped, never re-entered.
    pub fn report_error(&self, message: &str) {
        if let Err(err) = self.fire(Trigger::OnError, &TriggerContext::for_error(message)) {
            error!(error = %err, original = message, "ON_ERROR trigger failed; dropping");
        }
    }
}
