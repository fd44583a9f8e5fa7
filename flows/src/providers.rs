//! Capability traits for external collaborators.
//!
//! The identity backend, session layer, and platform probe are
//! interfaces, not implementations: reducers depend on these traits and
//! capture them into effects, which keeps every flow testable against
//! in-memory mocks and lets hosts plug in their real clients.

use crate::error::Result;
use crate::params::Params;
use crate::resource::{Factor, SignInResource, SignUpResource};
use crate::strategy::{OauthProvider, Strategy};
use serde::{Deserialize, Serialize};
use std::future::Future;

// ═══════════════════════════════════════════════════════════════════════
// Typed Request Parameters
// ═══════════════════════════════════════════════════════════════════════

/// Parameters for preparing a first factor.
///
/// Closed over the strategies that have a prepare step; passwords and
/// passkeys are attempted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrepareFirstFactorParams {
    /// Send a one-time code by email.
    EmailCode {
        /// Backend id of the email address to use.
        email_address_id: Option<String>,
    },
    /// Send a verification link by email.
    EmailLink {
        /// Where the link should land after confirmation.
        redirect_url: String,
        /// Backend id of the email address to use.
        email_address_id: Option<String>,
    },
    /// Send a one-time code by `SMS`.
    PhoneCode {
        /// Backend id of the phone number to use.
        phone_number_id: Option<String>,
    },
    /// Send a password-reset code by email.
    ResetPasswordEmailCode {
        /// Backend id of the email address to use.
        email_address_id: Option<String>,
    },
    /// Send a password-reset code by `SMS`.
    ResetPasswordPhoneCode {
        /// Backend id of the phone number to use.
        phone_number_id: Option<String>,
    },
    /// Start an `OAuth` redirect.
    Oauth {
        /// Provider to redirect to.
        provider: OauthProvider,
        /// Return URL after the provider round-trip.
        redirect_url: String,
    },
    /// Start an enterprise `SSO` redirect.
    EnterpriseSso {
        /// Return URL after the identity-provider round-trip.
        redirect_url: String,
    },
}

impl PrepareFirstFactorParams {
    /// The strategy these parameters prepare.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        match self {
            Self::EmailCode { .. } => Strategy::EmailCode,
            Self::EmailLink { .. } => Strategy::EmailLink,
            Self::PhoneCode { .. } => Strategy::PhoneCode,
            Self::ResetPasswordEmailCode { .. } => Strategy::ResetPasswordEmailCode,
            Self::ResetPasswordPhoneCode { .. } => Strategy::ResetPasswordPhoneCode,
            Self::Oauth { provider, .. } => Strategy::Oauth(*provider),
            Self::EnterpriseSso { .. } => Strategy::EnterpriseSso,
        }
    }

    /// Build prepare parameters for a matched factor.
    ///
    /// Returns `None` for strategies without a prepare step (password,
    /// passkey, `TOTP`, backup code).
    #[must_use]
    pub fn for_factor(factor: &Factor, redirect_url: &str) -> Option<Self> {
        match factor.strategy {
            Strategy::EmailCode => Some(Self::EmailCode {
                email_address_id: factor.email_address_id.clone(),
            }),
            Strategy::EmailLink => Some(Self::EmailLink {
                redirect_url: redirect_url.to_string(),
                email_address_id: factor.email_address_id.clone(),
            }),
            Strategy::PhoneCode => Some(Self::PhoneCode {
                phone_number_id: factor.phone_number_id.clone(),
            }),
            Strategy::ResetPasswordEmailCode => Some(Self::ResetPasswordEmailCode {
                email_address_id: factor.email_address_id.clone(),
            }),
            Strategy::ResetPasswordPhoneCode => Some(Self::ResetPasswordPhoneCode {
                phone_number_id: factor.phone_number_id.clone(),
            }),
            Strategy::Oauth(provider) => Some(Self::Oauth {
                provider,
                redirect_url: redirect_url.to_string(),
            }),
            Strategy::EnterpriseSso => Some(Self::EnterpriseSso {
                redirect_url: redirect_url.to_string(),
            }),
            Strategy::Password | Strategy::Passkey | Strategy::Totp | Strategy::BackupCode => None,
        }
    }
}

/// Parameters for attempting a first factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttemptFirstFactorParams {
    /// Verify with a password.
    Password {
        /// The password.
        password: String,
    },
    /// Verify an emailed one-time code.
    EmailCode {
        /// The entered code.
        code: String,
    },
    /// Verify an `SMS` one-time code.
    PhoneCode {
        /// The entered code.
        code: String,
    },
    /// Verify an emailed password-reset code.
    ResetPasswordEmailCode {
        /// The entered code.
        code: String,
    },
    /// Verify an `SMS` password-reset code.
    ResetPasswordPhoneCode {
        /// The entered code.
        code: String,
    },
    /// Verify a passkey assertion.
    Passkey {
        /// Serialized `WebAuthn` assertion from the platform.
        public_key_credential: String,
    },
    /// Set a new password after a verified reset code.
    ResetPassword {
        /// The new password.
        password: String,
        /// Whether other sessions should be revoked.
        sign_out_of_other_sessions: bool,
    },
}

impl AttemptFirstFactorParams {
    /// The strategy these parameters attempt.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        match self {
            Self::Password { .. } | Self::ResetPassword { .. } => Strategy::Password,
            Self::EmailCode { .. } => Strategy::EmailCode,
            Self::PhoneCode { .. } => Strategy::PhoneCode,
            Self::ResetPasswordEmailCode { .. } => Strategy::ResetPasswordEmailCode,
            Self::ResetPasswordPhoneCode { .. } => Strategy::ResetPasswordPhoneCode,
            Self::Passkey { .. } => Strategy::Passkey,
        }
    }

    /// Build attempt parameters for a factor and an entered secret.
    ///
    /// Returns `None` for redirect strategies, which never attempt
    /// locally.
    #[must_use]
    pub fn for_factor(factor: &Factor, secret: &str) -> Option<Self> {
        match factor.strategy {
            Strategy::Password => Some(Self::Password {
                password: secret.to_string(),
            }),
            Strategy::EmailCode => Some(Self::EmailCode {
                code: secret.to_string(),
            }),
            Strategy::PhoneCode => Some(Self::PhoneCode {
                code: secret.to_string(),
            }),
            Strategy::ResetPasswordEmailCode => Some(Self::ResetPasswordEmailCode {
                code: secret.to_string(),
            }),
            Strategy::ResetPasswordPhoneCode => Some(Self::ResetPasswordPhoneCode {
                code: secret.to_string(),
            }),
            Strategy::Passkey => Some(Self::Passkey {
                public_key_credential: secret.to_string(),
            }),
            Strategy::EmailLink
            | Strategy::Totp
            | Strategy::BackupCode
            | Strategy::Oauth(_)
            | Strategy::EnterpriseSso => None,
        }
    }
}

/// Parameters for preparing a second factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrepareSecondFactorParams {
    /// Send a one-time code by `SMS`.
    PhoneCode {
        /// Backend id of the phone number to use.
        phone_number_id: Option<String>,
    },
}

impl PrepareSecondFactorParams {
    /// The strategy these parameters prepare.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        match self {
            Self::PhoneCode { .. } => Strategy::PhoneCode,
        }
    }
}

/// Parameters for attempting a second factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttemptSecondFactorParams {
    /// Verify a `TOTP` code.
    Totp {
        /// The entered code.
        code: String,
    },
    /// Verify an `SMS` one-time code.
    PhoneCode {
        /// The entered code.
        code: String,
    },
    /// Verify a backup code.
    BackupCode {
        /// The entered code.
        code: String,
    },
}

impl AttemptSecondFactorParams {
    /// The strategy these parameters attempt.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        match self {
            Self::Totp { .. } => Strategy::Totp,
            Self::PhoneCode { .. } => Strategy::PhoneCode,
            Self::BackupCode { .. } => Strategy::BackupCode,
        }
    }

    /// Build attempt parameters for a second factor and an entered code.
    #[must_use]
    pub fn for_factor(factor: &Factor, code: &str) -> Option<Self> {
        match factor.strategy {
            Strategy::Totp => Some(Self::Totp {
                code: code.to_string(),
            }),
            Strategy::PhoneCode => Some(Self::PhoneCode {
                code: code.to_string(),
            }),
            Strategy::BackupCode => Some(Self::BackupCode {
                code: code.to_string(),
            }),
            _ => None,
        }
    }
}

/// Parameters for reloading a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReloadParams {
    /// Nonce rotated through an `OAuth` callback, when returning from a
    /// redirect.
    pub rotating_token_nonce: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Capability Traits
// ═══════════════════════════════════════════════════════════════════════

/// Sign-in operations of the identity backend.
pub trait SignInApi: Send + Sync {
    /// Create a sign-in attempt.
    fn create(&self, params: Params) -> impl Future<Output = Result<SignInResource>> + Send;

    /// Prepare a first factor (send code, send link, mint redirect).
    fn prepare_first_factor(
        &self,
        params: PrepareFirstFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send;

    /// Attempt a first factor.
    fn attempt_first_factor(
        &self,
        params: AttemptFirstFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send;

    /// Prepare a second factor.
    fn prepare_second_factor(
        &self,
        params: PrepareSecondFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send;

    /// Attempt a second factor.
    fn attempt_second_factor(
        &self,
        params: AttemptSecondFactorParams,
    ) -> impl Future<Output = Result<SignInResource>> + Send;

    /// Reload the current attempt.
    fn reload(&self, params: ReloadParams) -> impl Future<Output = Result<SignInResource>> + Send;
}

/// Sign-up operations of the identity backend.
pub trait SignUpApi: Send + Sync {
    /// Create a sign-up attempt.
    fn create(&self, params: Params) -> impl Future<Output = Result<SignUpResource>> + Send;

    /// Update the attempt with additional fields.
    fn update(&self, params: Params) -> impl Future<Output = Result<SignUpResource>> + Send;

    /// Prepare a field verification for a strategy.
    fn prepare_verification(
        &self,
        strategy: Strategy,
    ) -> impl Future<Output = Result<SignUpResource>> + Send;

    /// Attempt a field verification.
    fn attempt_verification(
        &self,
        strategy: Strategy,
        code: String,
    ) -> impl Future<Output = Result<SignUpResource>> + Send;

    /// Reload the current attempt.
    fn reload(&self) -> impl Future<Output = Result<SignUpResource>> + Send;
}

/// Session-activation collaborator.
///
/// The core hands off `created_session_id` here and is done; session
/// persistence is not its concern.
pub trait SessionActivator: Send + Sync {
    /// Activate the session created by a completed flow.
    fn set_active(&self, session_id: String) -> impl Future<Output = Result<()>> + Send;
}

/// Platform capability probe.
pub trait Platform: Send + Sync {
    /// Whether the platform supports passkeys (`WebAuthn`).
    fn passkey_supported(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_params_follow_factor_metadata() {
        let factor = Factor {
            strategy: Strategy::PhoneCode,
            safe_identifier: Some("+1555".to_string()),
            phone_number_id: Some("idn_1".to_string()),
            email_address_id: None,
        };

        let params = PrepareFirstFactorParams::for_factor(&factor, "/sign-in/verify");
        assert_eq!(
            params,
            Some(PrepareFirstFactorParams::PhoneCode {
                phone_number_id: Some("idn_1".to_string()),
            })
        );
    }

    #[test]
    fn password_has_no_prepare_step() {
        let factor = Factor::new(Strategy::Password);
        assert_eq!(
            PrepareFirstFactorParams::for_factor(&factor, "/sign-in"),
            None
        );
    }

    #[test]
    fn attempt_params_carry_the_secret() {
        let factor = Factor::new(Strategy::EmailCode);
        let params = AttemptFirstFactorParams::for_factor(&factor, "424242");

        assert_eq!(
            params,
            Some(AttemptFirstFactorParams::EmailCode {
                code: "424242".to_string(),
            })
        );
        assert_eq!(
            params.map(|p| p.strategy()),
            Some(Strategy::EmailCode)
        );
    }

    #[test]
    fn redirect_strategies_never_attempt_locally() {
        let factor = Factor::new(Strategy::EnterpriseSso);
        assert_eq!(AttemptFirstFactorParams::for_factor(&factor, "x"), None);
    }
}
