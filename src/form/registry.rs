use std::collections::HashMap;

use tracing::debug;

use crate::errors::{FormError, Result};
use crate::form::field::{Field, FieldDefinition};
use crate::gateway::Record;

/// Owns every field of a form, in registration order, together with the
/// form-wide dirty flag.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    dirty: bool,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, definition: FieldDefinition) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FormError::InvalidFieldName);
        }
        if self.index.contains_key(name) {
            return Err(FormError::DuplicateField(name.to_string()));
        }
        self.index.insert(name.to_string(), self.fields.len());
        self.fields.push(Field::new(name.to_string(), definition));
        debug!(field = name, "field registered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Field> {
        self.position(name).map(|idx| &self.fields[idx])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Result<&mut Field> {
        let idx = self.position(name)?;
        Ok(&mut self.fields[idx])
    }

    pub fn value(&self, name: &str) -> Result<&str> {
        self.get(name).map(Field::value)
    }

    /// Writes a field value. Any field differing from its baseline marks the
    /// whole form dirty; `set` itself never clears the flag.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let idx = self.position(name)?;
        self.fields[idx].value = value.into();
        if self.fields.iter().any(Field::is_changed) {
            self.dirty = true;
        }
        Ok(())
    }

    /// Non-empty values by field name.
    pub fn snapshot(&self) -> Record {
        self.fields
            .iter()
            .filter(|field| !field.value.is_empty())
            .map(|field| (field.name.clone(), field.value.clone()))
            .collect()
    }

    /// Clears every value (or restores baselines when `to_original`), resets
    /// validity and clears the dirty flag.
    pub fn reset(&mut self, to_original: bool) {
        for field in &mut self.fields {
            field.value = if to_original {
                field.original_value.clone()
            } else {
                String::new()
            };
            field.clear_validity();
        }
        self.dirty = false;
    }

    /// Loads a record so that it starts clean: matching fields take the value
    /// as both current and baseline, unmatched fields are left alone.
    pub fn load(&mut self, record: &Record) {
        for field in &mut self.fields {
            if let Some(value) = record.get(&field.name) {
                field.value = value.clone();
                field.original_value = value.clone();
                field.clear_validity();
            }
        }
        self.dirty = false;
    }

    /// Makes every current value the new baseline, as after a completed save.
    pub fn commit_baseline(&mut self) {
        for field in &mut self.fields {
            field.original_value = field.value.clone();
        }
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub(crate) fn name_at(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(|field| field.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> FieldRegistry {
        let mut registry = FieldRegistry::new();
        for name in names {
            registry.register(name, FieldDefinition::text()).unwrap();
        }
        registry
    }

    #[test]
    fn register_rejects_duplicates_and_blank_names() {
        let mut registry = registry(&["A"]);
        assert_eq!(
            registry.register("A", FieldDefinition::text()),
            Err(FormError::DuplicateField("A".into()))
        );
        assert_eq!(
            registry.register("  ", FieldDefinition::text()),
            Err(FormError::InvalidFieldName)
        );
    }

    #[test]
    fn set_unknown_field_fails() {
        let mut registry = registry(&["A"]);
        assert_eq!(
            registry.set("B", "1"),
            Err(FormError::UnknownField("B".into()))
        );
    }

    #[test]
    fn set_marks_dirty_and_only_save_or_reset_clears_it() {
        let mut registry = registry(&["A", "B"]);
        registry.set("A", "1").unwrap();
        assert!(registry.is_dirty());

        // Writing the baseline back does not clear the flag.
        registry.set("A", "").unwrap();
        assert!(registry.is_dirty());

        registry.reset(true);
        assert!(!registry.is_dirty());
    }

    #[test]
    fn load_sets_baseline_and_leaves_other_fields() {
        let mut registry = registry(&["A", "B"]);
        registry.set("B", "keep").unwrap();

        let mut record = Record::new();
        record.insert("A".into(), "1".into());
        record.insert("Z".into(), "ignored".into());
        registry.load(&record);

        let a = registry.get("A").unwrap();
        assert_eq!(a.value(), "1");
        assert_eq!(a.original_value(), "1");
        assert_eq!(registry.value("B").unwrap(), "keep");
        assert!(!registry.is_dirty());
    }

    #[test]
    fn reset_to_original_is_idempotent() {
        let mut registry = registry(&["A", "B"]);
        let mut record = Record::new();
        record.insert("A".into(), "x".into());
        registry.load(&record);
        registry.set("A", "y").unwrap();
        registry.set("B", "z").unwrap();

        registry.reset(true);
        let first: Vec<String> = registry.fields().map(|f| f.value().to_string()).collect();
        registry.reset(true);
        let second: Vec<String> = registry.fields().map(|f| f.value().to_string()).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec!["x".to_string(), String::new()]);
    }

    #[test]
    fn snapshot_skips_empty_values() {
        let mut registry = registry(&["A", "B", "C"]);
        registry.set("A", "1").unwrap();
        registry.set("C", "3").unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains_key("B"));
    }

    #[test]
    fn commit_baseline_rebases_every_field() {
        let mut registry = registry(&["A"]);
        registry.set("A", "new").unwrap();
        registry.commit_baseline();
        assert_eq!(registry.get("A").unwrap().original_value(), "new");
        assert!(!registry.is_dirty());
    }
}
