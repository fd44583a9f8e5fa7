//! Field-to-parameter mapping.
//!
//! The wire-adjacent contract with the identity backend: request
//! parameters are built from form fields through a fixed allow-list.
//! Unknown keys are silently dropped - intentional forward-compatibility,
//! not an error.

use crate::form::FormField;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Plain request-parameter object sent to the resource client.
pub type Params = Map<String, Value>;

/// Allow-listed sign-up parameter keys.
pub const SIGN_UP_PARAM_KEYS: [&str; 6] = [
    "firstName",
    "lastName",
    "emailAddress",
    "username",
    "password",
    "phoneNumber",
];

/// Allow-listed sign-in parameter keys (sign-up keys plus `identifier`).
pub const SIGN_IN_PARAM_KEYS: [&str; 7] = [
    "firstName",
    "lastName",
    "emailAddress",
    "username",
    "password",
    "phoneNumber",
    "identifier",
];

/// Project form fields into request parameters.
///
/// Includes only allow-listed keys whose value is present: an unset field
/// is dropped, an explicit null is kept (it clears the field server-side).
/// Pure; iteration order of the input does not affect the output contents.
#[must_use]
pub fn fields_to_params(fields: &IndexMap<String, FormField>, allowed: &[&str]) -> Params {
    let mut params = Params::new();

    for (key, field) in fields {
        if !allowed.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = &field.value {
            params.insert(key.clone(), value.to_json());
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FieldType, FieldValue, FormField};

    fn field(value: Option<FieldValue>) -> FormField {
        FormField {
            value,
            field_type: FieldType::Text,
            state: crate::form::FieldState::Idle,
        }
    }

    #[test]
    fn unknown_and_unset_keys_are_dropped() {
        let mut fields = IndexMap::new();
        fields.insert(
            "firstName".to_string(),
            field(Some(FieldValue::Text("John".to_string()))),
        );
        fields.insert(
            "foo".to_string(),
            field(Some(FieldValue::Text("bar".to_string()))),
        );
        fields.insert("emailAddress".to_string(), field(None));

        let params = fields_to_params(&fields, &SIGN_UP_PARAM_KEYS);

        assert_eq!(params.len(), 1);
        assert_eq!(
            params.get("firstName"),
            Some(&Value::String("John".to_string()))
        );
    }

    #[test]
    fn explicit_null_survives() {
        let mut fields = IndexMap::new();
        fields.insert("lastName".to_string(), field(Some(FieldValue::Null)));

        let params = fields_to_params(&fields, &SIGN_UP_PARAM_KEYS);

        assert_eq!(params.get("lastName"), Some(&Value::Null));
    }

    #[test]
    fn output_is_insertion_order_independent() {
        let mut forward = IndexMap::new();
        forward.insert(
            "username".to_string(),
            field(Some(FieldValue::Text("octo".to_string()))),
        );
        forward.insert(
            "password".to_string(),
            field(Some(FieldValue::Text("hunter2".to_string()))),
        );

        let mut reversed = IndexMap::new();
        reversed.insert(
            "password".to_string(),
            field(Some(FieldValue::Text("hunter2".to_string()))),
        );
        reversed.insert(
            "username".to_string(),
            field(Some(FieldValue::Text("octo".to_string()))),
        );

        let a = fields_to_params(&forward, &SIGN_UP_PARAM_KEYS);
        let b = fields_to_params(&reversed, &SIGN_UP_PARAM_KEYS);

        assert_eq!(a, b);
    }

    #[test]
    fn identifier_is_sign_in_only() {
        let mut fields = IndexMap::new();
        fields.insert(
            "identifier".to_string(),
            field(Some(FieldValue::Text("a@b.com".to_string()))),
        );

        assert!(
            fields_to_params(&fields, &SIGN_UP_PARAM_KEYS).is_empty()
        );
        assert_eq!(fields_to_params(&fields, &SIGN_IN_PARAM_KEYS).len(), 1);
    }
}
