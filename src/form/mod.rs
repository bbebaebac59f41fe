//! Terminal-style data-entry form engine.
//!
//! A [`FormController`] owns a [`FieldRegistry`] and coordinates validation,
//! query-by-example, list-of-values lookups, navigation and lifecycle
//! triggers in response to commands from a presentation layer.

pub mod controller;
pub mod field;
pub mod lov;
pub mod navigation;
pub mod query_mode;
pub mod registry;
pub mod triggers;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{FieldChange, FormCollaborators, FormController, KeyOutcome};
pub use field::{qualified_name, CustomValidator, DataType, Field, FieldDefinition};
pub use lov::{LovBinding, LovMapping, LovOutcome, LovResolver};
pub use navigation::{
    key_command, parse_key_chord, Direction, FormKey, KeyCommand, KeyModifiers,
    NavigationController,
};
pub use query_mode::{FormMode, QueryModeStateMachine, QueryOutcome, SaveOutcome};
pub use registry::FieldRegistry;
pub use triggers::{Trigger, TriggerCallback, TriggerContext, TriggerDispatcher};
pub use validation::{validate, ValidationEngine, ValidationResult};
