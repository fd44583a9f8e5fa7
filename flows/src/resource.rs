//! Resource snapshots returned by the identity backend.
//!
//! A resource is an opaque server-side view of flow progress, keyed by a
//! `status` discriminator. Machines never mutate a resource in place: each
//! backend response replaces the previous snapshot wholesale.

use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Status Discriminators
// ═══════════════════════════════════════════════════════════════════════

/// Sign-in progress discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInStatus {
    /// No identifier submitted yet.
    #[default]
    NeedsIdentifier,
    /// A first factor must be verified.
    NeedsFirstFactor,
    /// A second factor must be verified.
    NeedsSecondFactor,
    /// A new password must be set (password reset).
    NeedsNewPassword,
    /// Sign-in finished; `created_session_id` is populated.
    Complete,
    /// The backend determined a sign-up is required instead
    /// (e.g. a new `OAuth` identity).
    Transferable,
}

/// Sign-up progress discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignUpStatus {
    /// Required fields are missing or unverified.
    #[default]
    MissingRequirements,
    /// Sign-up finished; `created_session_id` is populated.
    Complete,
    /// The flow was abandoned server-side.
    Abandoned,
    /// The backend determined a sign-in is required instead.
    Transferable,
}

/// Per-verification progress discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Not attempted yet.
    #[default]
    Unverified,
    /// Prepared and awaiting the user's code or link confirmation.
    Pending,
    /// Verified successfully.
    Verified,
    /// Attempt failed (wrong code, rejected assertion).
    Failed,
    /// The code or link expired.
    Expired,
    /// Verification indicates the opposite flow is required.
    Transferable,
}

// ═══════════════════════════════════════════════════════════════════════
// Snapshot Types
// ═══════════════════════════════════════════════════════════════════════

/// State of a single verification attached to a resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Verification {
    /// Verification progress.
    pub status: VerificationStatus,

    /// Strategy this verification belongs to.
    pub strategy: Option<Strategy>,

    /// Provider URL to leave for, on redirect strategies.
    pub external_verification_redirect_url: Option<String>,
}

impl Verification {
    /// Pending verification for a strategy.
    #[must_use]
    pub const fn pending(strategy: Strategy) -> Self {
        Self {
            status: VerificationStatus::Pending,
            strategy: Some(strategy),
            external_verification_redirect_url: None,
        }
    }
}

/// One authentication method instance offered by the backend.
///
/// Immutable once received; a new list replaces the old on each resource
/// refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    /// The strategy this factor uses.
    pub strategy: Strategy,

    /// Redacted identifier shown to the user (e.g. `j***@example.com`).
    pub safe_identifier: Option<String>,

    /// Backend id of the phone number, for `SMS` strategies.
    pub phone_number_id: Option<String>,

    /// Backend id of the email address, for email strategies.
    pub email_address_id: Option<String>,
}

impl Factor {
    /// Factor with only a strategy set.
    #[must_use]
    pub const fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            safe_identifier: None,
            phone_number_id: None,
            email_address_id: None,
        }
    }

    /// Attach a safe identifier.
    #[must_use]
    pub fn with_safe_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.safe_identifier = Some(identifier.into());
        self
    }
}

/// Sign-in resource snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignInResource {
    /// Backend id of the sign-in attempt.
    pub id: Option<String>,

    /// Progress discriminator.
    pub status: SignInStatus,

    /// The identifier the attempt was created with.
    pub identifier: Option<String>,

    /// Session id, populated once `status` is `Complete`.
    pub created_session_id: Option<String>,

    /// First factors available for this identifier.
    pub first_factors: Vec<Factor>,

    /// Second factors available after the first factor verifies.
    pub second_factors: Vec<Factor>,

    /// Verification state of the current first factor.
    pub first_factor_verification: Option<Verification>,

    /// Verification state of the current second factor.
    pub second_factor_verification: Option<Verification>,
}

impl SignInResource {
    /// Snapshot with only a status set.
    #[must_use]
    pub fn with_status(status: SignInStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// Sign-up resource snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignUpResource {
    /// Backend id of the sign-up attempt.
    pub id: Option<String>,

    /// Progress discriminator.
    pub status: SignUpStatus,

    /// Session id, populated once `status` is `Complete`.
    pub created_session_id: Option<String>,

    /// Required fields not collected yet (allow-list keys).
    pub missing_fields: Vec<String>,

    /// Collected fields still awaiting verification.
    pub unverified_fields: Vec<String>,

    /// Verifications attached to the attempt, keyed by their strategy.
    pub verifications: Vec<Verification>,
}

impl SignUpResource {
    /// Snapshot with only a status set.
    #[must_use]
    pub fn with_status(status: SignUpStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Verification for a specific strategy, if present.
    #[must_use]
    pub fn verification_for(&self, strategy: Strategy) -> Option<&Verification> {
        self.verifications
            .iter()
            .find(|v| v.strategy == Some(strategy))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Envelope
// ═══════════════════════════════════════════════════════════════════════

/// Which verification slot a sub-machine is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationSlot {
    /// Sign-in first factor.
    SignInFirst,
    /// Sign-in second factor.
    SignInSecond,
    /// Sign-up field verification.
    SignUp,
}

/// A resource snapshot from either flow, carried through the generic
/// verification sub-machine and back up to the owning router machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResourceEnvelope {
    /// Sign-in snapshot.
    SignIn(SignInResource),
    /// Sign-up snapshot.
    SignUp(SignUpResource),
}

impl ResourceEnvelope {
    /// Session id if the enclosed resource is complete.
    #[must_use]
    pub fn created_session_id(&self) -> Option<&str> {
        match self {
            Self::SignIn(resource) => resource.created_session_id.as_deref(),
            Self::SignUp(resource) => resource.created_session_id.as_deref(),
        }
    }

    /// The verification relevant to a slot and strategy, if any.
    #[must_use]
    pub fn verification_for(
        &self,
        slot: VerificationSlot,
        strategy: Strategy,
    ) -> Option<&Verification> {
        match (self, slot) {
            (Self::SignIn(resource), VerificationSlot::SignInFirst) => {
                resource.first_factor_verification.as_ref()
            },
            (Self::SignIn(resource), VerificationSlot::SignInSecond) => {
                resource.second_factor_verification.as_ref()
            },
            (Self::SignUp(resource), VerificationSlot::SignUp) => {
                resource.verification_for(strategy)
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_selects_slot_verification() {
        let resource = SignInResource {
            status: SignInStatus::NeedsFirstFactor,
            first_factor_verification: Some(Verification::pending(Strategy::EmailCode)),
            ..SignInResource::default()
        };

        let envelope = ResourceEnvelope::SignIn(resource);
        let verification = envelope
            .verification_for(VerificationSlot::SignInFirst, Strategy::EmailCode)
            .cloned();

        assert_eq!(verification, Some(Verification::pending(Strategy::EmailCode)));
        assert!(
            envelope
                .verification_for(VerificationSlot::SignUp, Strategy::EmailCode)
                .is_none()
        );
    }

    #[test]
    fn sign_up_verification_lookup_is_by_strategy() {
        let resource = SignUpResource {
            verifications: vec![
                Verification::pending(Strategy::EmailCode),
                Verification::pending(Strategy::PhoneCode),
            ],
            ..SignUpResource::default()
        };

        assert_eq!(
            resource
                .verification_for(Strategy::PhoneCode)
                .and_then(|v| v.strategy),
            Some(Strategy::PhoneCode)
        );
        assert!(resource.verification_for(Strategy::Totp).is_none());
    }

    #[test]
    fn status_serialization_uses_snake_case() {
        let json = serde_json::to_string(&SignInStatus::NeedsFirstFactor).unwrap_or_default();
        assert_eq!(json, "\"needs_first_factor\"");
    }
}
