//! Form-state holder and the bridge between form values and draft payloads.
//!
//! Form values are an open map of field name to JSON value, so any editor
//! form can be described without a dedicated struct.

pub mod bridge;

pub use bridge::{FieldMapping, FormStateBridge};

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::watch;

/// Current values of every form field.
pub type FormValues = Map<String, Value>;

/// A partial update: only the fields to overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPatch(pub Map<String, Value>);

impl FormPatch {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }
}

/// Something holding editable form values.
///
/// The controller reads a snapshot when it needs a payload and writes
/// patches when it hydrates or adopts a remote draft.
pub trait FormState: Send + Sync {
    fn snapshot(&self) -> FormValues;

    fn apply_patch(&self, patch: &FormPatch);
}

/// Form holder backed by a watch channel, so views can subscribe to changes.
#[derive(Debug, Clone)]
pub struct SharedForm {
    values: Arc<watch::Sender<FormValues>>,
}

impl SharedForm {
    pub fn new(initial: FormValues) -> Self {
        let (values, _) = watch::channel(initial);
        Self {
            values: Arc::new(values),
        }
    }

    /// Set one field from user input.
    pub fn set_field(&self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        self.values.send_if_modified(|values| {
            if values.get(field) == Some(&value) {
                return false;
            }
            values.insert(field.to_string(), value);
            true
        });
    }

    /// Current value of a text field, empty when absent or not a string.
    pub fn text(&self, field: &str) -> String {
        self.values
            .borrow()
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn subscribe(&self) -> watch::Receiver<FormValues> {
        self.values.subscribe()
    }
}

impl Default for SharedForm {
    fn default() -> Self {
        Self::new(FormValues::new())
    }
}

impl FormState for SharedForm {
    fn snapshot(&self) -> FormValues {
        self.values.borrow().clone()
    }

    fn apply_patch(&self, patch: &FormPatch) {
        if patch.is_empty() {
            return;
        }
        self.values.send_modify(|values| {
            for (field, value) in &patch.0 {
                values.insert(field.clone(), value.clone());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_overwrites_only_named_fields() {
        let form = SharedForm::default();
        form.set_field("title", "Local");
        form.set_field("content", "Body");

        let mut patch = FormPatch::default();
        patch.set("title", json!("Remote"));
        form.apply_patch(&patch);

        assert_eq!(form.text("title"), "Remote");
        assert_eq!(form.text("content"), "Body");
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let form = SharedForm::default();
        let mut rx = form.subscribe();
        form.set_field("title", "x");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().get("title"), Some(&json!("x")));
    }

    #[test]
    fn unchanged_value_does_not_notify() {
        let form = SharedForm::default();
        form.set_field("title", "x");
        let rx = form.subscribe();
        form.set_field("title", "x");
        assert!(!rx.has_changed().unwrap());
    }
}
