//! Authentication strategy identifiers.
//!
//! Strategies form a closed set: every place that dispatches on a strategy
//! matches exhaustively, so adding a variant is a compile error until every
//! consumer handles it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// `OAuth` provider behind an [`Strategy::Oauth`] factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OauthProvider {
    /// Google `OAuth`.
    Google,
    /// GitHub `OAuth`.
    Github,
    /// Microsoft `OAuth`.
    Microsoft,
}

impl OauthProvider {
    /// Get the provider name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Microsoft => "microsoft",
        }
    }
}

/// One authentication method, as reported by the identity backend.
///
/// The set is closed on purpose: UI dispatch and parameter construction
/// both match on it exhaustively, so an unhandled strategy cannot silently
/// render nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Knowledge factor: a password.
    Password,
    /// Platform passkey (`WebAuthn`).
    Passkey,
    /// One-time code delivered by email.
    EmailCode,
    /// Verification link delivered by email, confirmed out-of-band.
    EmailLink,
    /// One-time code delivered by `SMS`.
    PhoneCode,
    /// Time-based one-time password from an authenticator app.
    Totp,
    /// Single-use backup code.
    BackupCode,
    /// Password-reset code delivered by email.
    ResetPasswordEmailCode,
    /// Password-reset code delivered by `SMS`.
    ResetPasswordPhoneCode,
    /// `OAuth` redirect flow.
    Oauth(OauthProvider),
    /// Enterprise `SSO` (`SAML` / `OIDC`) redirect flow.
    EnterpriseSso,
}

impl Strategy {
    /// Wire name of the strategy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Passkey => "passkey",
            Self::EmailCode => "email_code",
            Self::EmailLink => "email_link",
            Self::PhoneCode => "phone_code",
            Self::Totp => "totp",
            Self::BackupCode => "backup_code",
            Self::ResetPasswordEmailCode => "reset_password_email_code",
            Self::ResetPasswordPhoneCode => "reset_password_phone_code",
            Self::Oauth(OauthProvider::Google) => "oauth_google",
            Self::Oauth(OauthProvider::Github) => "oauth_github",
            Self::Oauth(OauthProvider::Microsoft) => "oauth_microsoft",
            Self::EnterpriseSso => "enterprise_sso",
        }
    }

    /// Whether the strategy completes via an external redirect rather than
    /// a locally entered secret.
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Oauth(_) | Self::EnterpriseSso)
    }

    /// Whether the strategy belongs to the password-reset family.
    #[must_use]
    pub const fn is_reset(&self) -> bool {
        matches!(
            self,
            Self::ResetPasswordEmailCode | Self::ResetPasswordPhoneCode
        )
    }
}

/// Error returned when parsing an unknown strategy name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown strategy: {0}")]
pub struct StrategyParseError(pub String);

impl std::str::FromStr for Strategy {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Self::Password),
            "passkey" => Ok(Self::Passkey),
            "email_code" => Ok(Self::EmailCode),
            "email_link" => Ok(Self::EmailLink),
            "phone_code" => Ok(Self::PhoneCode),
            "totp" => Ok(Self::Totp),
            "backup_code" => Ok(Self::BackupCode),
            "reset_password_email_code" => Ok(Self::ResetPasswordEmailCode),
            "reset_password_phone_code" => Ok(Self::ResetPasswordPhoneCode),
            "oauth_google" => Ok(Self::Oauth(OauthProvider::Google)),
            "oauth_github" => Ok(Self::Oauth(OauthProvider::Github)),
            "oauth_microsoft" => Ok(Self::Oauth(OauthProvider::Microsoft)),
            "enterprise_sso" => Ok(Self::EnterpriseSso),
            other => Err(StrategyParseError(other.to_string())),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Strategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Strategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
