//! Form field state store.
//!
//! An insertion-ordered mapping from field key to value and validation
//! state, exclusively owned by one flow instance. Mutations notify
//! subscribers synchronously; reads are snapshots. The store performs no
//! network work.

use crate::params::{Params, fields_to_params};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Declared input type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text.
    Text,
    /// Email address.
    Email,
    /// Password input.
    Password,
    /// Phone number.
    Phone,
    /// One-time code.
    Otp,
    /// Boolean checkbox.
    Checkbox,
}

impl FieldType {
    /// Whether a value is acceptable for this field type.
    #[must_use]
    pub const fn accepts(&self, value: &FieldValue) -> bool {
        match self {
            Self::Checkbox => matches!(value, FieldValue::Checked(_) | FieldValue::Null),
            _ => matches!(value, FieldValue::Text(_) | FieldValue::Null),
        }
    }
}

/// A field's value.
///
/// An absent value (field registered but never set) is represented as
/// `None` at the [`FormField`] level; an explicit `Null` survives into
/// request parameters so the backend can clear the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text content.
    Text(String),
    /// Checkbox state.
    Checked(bool),
    /// Explicit null (clears the field server-side).
    Null,
}

impl FieldValue {
    /// The text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON rendering used when building request parameters.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Checked(checked) => Value::Bool(*checked),
            Self::Null => Value::Null,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Checked(value)
    }
}

/// Validation state of a field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Not validated yet.
    #[default]
    Idle,
    /// Passed validation.
    Valid,
    /// Failed validation.
    Invalid {
        /// Message to show inline.
        message: String,
    },
}

/// One entry in the form store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// Current value; `None` until the user provides one.
    pub value: Option<FieldValue>,

    /// Declared input type.
    pub field_type: FieldType,

    /// Validation state.
    pub state: FieldState,
}

impl FormField {
    /// Empty field of a type.
    #[must_use]
    pub const fn empty(field_type: FieldType) -> Self {
        Self {
            value: None,
            field_type,
            state: FieldState::Idle,
        }
    }
}

/// Errors from form mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// The value does not match the field's declared type.
    #[error("field `{key}` does not accept this value kind")]
    TypeMismatch {
        /// Field key that rejected the value.
        key: String,
    },
}

/// Identifier of a form subscription, for unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&str, &FormField) + Send + Sync>;

struct FormInner {
    fields: IndexMap<String, FormField>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

/// Form field state store.
///
/// Cheap to clone; clones share the same underlying store. Created per
/// flow mount, cleared on reset.
#[derive(Clone)]
pub struct FormStore {
    inner: Arc<Mutex<FormInner>>,
}

impl Default for FormStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("FormStore")
            .field("fields", &inner.fields)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl FormStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FormInner {
                fields: IndexMap::new(),
                subscribers: Vec::new(),
                next_subscription: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormInner> {
        // A poisoned lock only means a panic elsewhere; field state is
        // still coherent for display.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a field with its declared type.
    ///
    /// Registering an existing key keeps its current value and state.
    pub fn register(&self, key: impl Into<String>, field_type: FieldType) {
        let key = key.into();
        self.lock()
            .fields
            .entry(key)
            .or_insert_with(|| FormField::empty(field_type));
    }

    /// Set a field's value, validating it against the declared type.
    ///
    /// Subscribers are notified synchronously. Setting an unregistered key
    /// registers it with a type inferred from the value.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::TypeMismatch`] when the value kind does not
    /// match the field's declared type.
    pub fn set_field(
        &self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), FormError> {
        let key = key.into();
        let value = value.into();

        let (field, subscribers) = {
            let mut inner = self.lock();

            let inferred = match value {
                FieldValue::Checked(_) => FieldType::Checkbox,
                _ => FieldType::Text,
            };
            let field = inner
                .fields
                .entry(key.clone())
                .or_insert_with(|| FormField::empty(inferred));

            if !field.field_type.accepts(&value) {
                return Err(FormError::TypeMismatch { key });
            }

            field.value = Some(value);
            field.state = FieldState::Idle;

            let snapshot = field.clone();
            let subscribers: Vec<Subscriber> = inner
                .subscribers
                .iter()
                .map(|(_, subscriber)| Arc::clone(subscriber))
                .collect();
            (snapshot, subscribers)
        };

        for subscriber in subscribers {
            subscriber(&key, &field);
        }

        Ok(())
    }

    /// Current value of a field.
    #[must_use]
    pub fn field_value(&self, key: &str) -> Option<FieldValue> {
        self.lock().fields.get(key).and_then(|f| f.value.clone())
    }

    /// Current state of a field.
    #[must_use]
    pub fn field_state(&self, key: &str) -> Option<FieldState> {
        self.lock().fields.get(key).map(|f| f.state.clone())
    }

    /// Update a field's validation state.
    pub fn set_field_state(&self, key: &str, state: FieldState) {
        if let Some(field) = self.lock().fields.get_mut(key) {
            field.state = state;
        }
    }

    /// Subscribe to field changes.
    ///
    /// The callback runs synchronously inside [`FormStore::set_field`].
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &FormField) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock()
            .subscribers
            .retain(|(subscriber_id, _)| *subscriber_id != id);
    }

    /// Project current values into request parameters.
    ///
    /// Only allow-listed keys with a present value are included; explicit
    /// nulls survive. Pure and order-independent.
    #[must_use]
    pub fn to_params(&self, allowed: &[&str]) -> Params {
        fields_to_params(&self.lock().fields, allowed)
    }

    /// Clear all values and validation states, keeping registrations.
    pub fn reset(&self) {
        let mut inner = self.lock();
        for field in inner.fields.values_mut() {
            field.value = None;
            field.state = FieldState::Idle;
        }
    }

    /// Number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().fields.len()
    }

    /// Whether no fields are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().fields.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn set_and_read_back() {
        let form = FormStore::new();
        form.register("emailAddress", FieldType::Email);

        form.set_field("emailAddress", "test@example.com")
            .expect("text accepted");

        assert_eq!(
            form.field_value("emailAddress"),
            Some(FieldValue::Text("test@example.com".to_string()))
        );
    }

    #[test]
    fn checkbox_rejects_text() {
        let form = FormStore::new();
        form.register("remember", FieldType::Checkbox);

        assert_eq!(
            form.set_field("remember", "yes"),
            Err(FormError::TypeMismatch {
                key: "remember".to_string()
            })
        );
        assert!(form.set_field("remember", true).is_ok());
    }

    #[test]
    fn subscribers_fire_synchronously() {
        let form = FormStore::new();
        let notified = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&notified);
        let id = form.subscribe(move |key, field| {
            assert_eq!(key, "username");
            assert!(field.value.is_some());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        form.set_field("username", "octo").expect("accepted");
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        form.unsubscribe(id);
        form.set_field("username", "cat").expect("accepted");
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_clears_values_but_keeps_registrations() {
        let form = FormStore::new();
        form.register("password", FieldType::Password);
        form.set_field("password", "hunter2").expect("accepted");

        form.reset();

        assert_eq!(form.len(), 1);
        assert_eq!(form.field_value("password"), None);
    }

    #[test]
    fn explicit_null_is_preserved_in_params() {
        let form = FormStore::new();
        form.set_field("firstName", FieldValue::Null)
            .expect("null accepted");

        let params = form.to_params(&["firstName"]);
        assert_eq!(params.get("firstName"), Some(&serde_json::Value::Null));
    }
}
