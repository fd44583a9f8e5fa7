//! Error taxonomy for flow operations.
//!
//! Three families, each with a distinct recovery path:
//!
//! - **`Api`**: the backend rejected the request with structured details.
//!   Details carrying a `param_name` route to that field's inline slot;
//!   the rest surface through a single global slot.
//! - **`Network`**: transport-level failure, transient by definition. A
//!   single failed background reload never terminal-fails a flow.
//! - **`Unexpected`**: a programming error or an unrecognized failure
//!   shape. Never hidden behind field-error display; the machine routes to
//!   its error step and logs it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for flow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// One structured error entry from the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Stable machine-readable code (e.g. `form_code_incorrect`).
    pub code: String,

    /// Short human-readable message.
    pub message: String,

    /// Longer explanation, when the backend provides one.
    pub long_message: Option<String>,

    /// Form parameter this error is scoped to, if any.
    pub param_name: Option<String>,
}

impl ApiErrorDetail {
    /// New detail with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            long_message: None,
            param_name: None,
        }
    }

    /// Scope the detail to a form parameter.
    #[must_use]
    pub fn with_param(mut self, param_name: impl Into<String>) -> Self {
        self.param_name = Some(param_name.into());
        self
    }

    /// Attach a long message.
    #[must_use]
    pub fn with_long_message(mut self, long_message: impl Into<String>) -> Self {
        self.long_message = Some(long_message.into());
        self
    }
}

/// Structured rejection from the identity backend.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("identity API rejected the request ({} error(s))", .errors.len())]
pub struct ApiError {
    /// Individual error entries.
    pub errors: Vec<ApiErrorDetail>,
}

impl ApiError {
    /// Error with a single detail.
    #[must_use]
    pub fn single(detail: ApiErrorDetail) -> Self {
        Self {
            errors: vec![detail],
        }
    }

    /// Code of the first entry, if any.
    #[must_use]
    pub fn first_code(&self) -> Option<&str> {
        self.errors.first().map(|detail| detail.code.as_str())
    }

    /// Whether any entry carries the given code.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|detail| detail.code == code)
    }
}

/// Comprehensive error taxonomy for flow operations.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowError {
    /// Structured rejection from the identity backend.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transport-level failure; transient.
    #[error("network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// Unrecognized failure shape or programming error.
    #[error("unexpected error: {message}")]
    Unexpected {
        /// Description of the failure.
        message: String,
    },
}

impl FlowError {
    /// Transport failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Unrecognized failure.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Whether the error is transient and safe to retry later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// The backend error details, when this is an `Api` error.
    #[must_use]
    pub const fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(api) => Some(api),
            _ => None,
        }
    }
}

/// Error display slots for one flow instance.
///
/// Exactly one global error and at most one inline error per field at any
/// time. Field slots and the global slot are independent: filling one
/// never clears or overwrites the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSlots {
    global: Option<ApiErrorDetail>,
    fields: IndexMap<String, ApiErrorDetail>,
}

impl ErrorSlots {
    /// Clear every slot.
    pub fn clear(&mut self) {
        self.global = None;
        self.fields.clear();
    }

    /// The global error, if any.
    #[must_use]
    pub const fn global(&self) -> Option<&ApiErrorDetail> {
        self.global.as_ref()
    }

    /// The inline error for a field, if any.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ApiErrorDetail> {
        self.fields.get(name)
    }

    /// Iterate over `(field, detail)` pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &ApiErrorDetail)> {
        self.fields
            .iter()
            .map(|(name, detail)| (name.as_str(), detail))
    }

    /// Whether any slot is filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.fields.is_empty()
    }

    /// Route an API error into the slots.
    ///
    /// Details whose `param_name` matches a known field fill that field's
    /// slot (first detail per field wins). Everything else competes for the
    /// single global slot; only the first is shown.
    pub fn absorb(&mut self, error: &ApiError, known_fields: &[&str]) {
        for detail in &error.errors {
            let field = detail
                .param_name
                .as_deref()
                .filter(|name| known_fields.contains(name));

            match field {
                Some(name) => {
                    self.fields
                        .entry(name.to_string())
                        .or_insert_with(|| detail.clone());
                },
                None => {
                    if self.global.is_none() {
                        self.global = Some(detail.clone());
                    }
                },
            }
        }
    }

    /// Fill the global slot with a plain message, unless already filled.
    pub fn set_global(&mut self, code: impl Into<String>, message: impl Into<String>) {
        if self.global.is_none() {
            self.global = Some(ApiErrorDetail::new(code, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["emailAddress", "password", "code"];

    #[test]
    fn field_errors_route_to_their_slot() {
        let mut slots = ErrorSlots::default();
        let error = ApiError::single(
            ApiErrorDetail::new("form_param_invalid", "Invalid email").with_param("emailAddress"),
        );

        slots.absorb(&error, KNOWN);

        assert!(slots.global().is_none());
        assert_eq!(
            slots.field("emailAddress").map(|d| d.code.as_str()),
            Some("form_param_invalid")
        );
    }

    #[test]
    fn field_and_global_slots_are_isolated() {
        let mut slots = ErrorSlots::default();

        slots.absorb(
            &ApiError::single(
                ApiErrorDetail::new("form_param_invalid", "Invalid email")
                    .with_param("emailAddress"),
            ),
            KNOWN,
        );
        slots.absorb(
            &ApiError::single(ApiErrorDetail::new("internal_error", "Something went wrong")),
            KNOWN,
        );

        // Each absorb touched only its own slot.
        assert!(slots.field("emailAddress").is_some());
        assert_eq!(
            slots.global().map(|d| d.code.as_str()),
            Some("internal_error")
        );
    }

    #[test]
    fn only_first_global_error_is_kept() {
        let mut slots = ErrorSlots::default();
        let error = ApiError {
            errors: vec![
                ApiErrorDetail::new("first", "First"),
                ApiErrorDetail::new("second", "Second"),
            ],
        };

        slots.absorb(&error, KNOWN);

        assert_eq!(slots.global().map(|d| d.code.as_str()), Some("first"));
    }

    #[test]
    fn unknown_param_falls_back_to_global() {
        let mut slots = ErrorSlots::default();
        let error = ApiError::single(
            ApiErrorDetail::new("form_param_unknown", "Unknown").with_param("shoeSize"),
        );

        slots.absorb(&error, KNOWN);

        assert!(slots.field("shoeSize").is_none());
        assert!(slots.global().is_some());
    }

    #[test]
    fn transient_classification() {
        assert!(FlowError::network("timeout").is_transient());
        assert!(!FlowError::unexpected("bug").is_transient());
        assert!(!FlowError::from(ApiError { errors: vec![] }).is_transient());
    }
}
