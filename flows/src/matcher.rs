//! Starting-factor selection.
//!
//! Pure, stateless decision functions. The tie-break orders here are
//! product policy: "alternative methods" lists depend on first-choice
//! determinism, so the orders must not be reshuffled.

use crate::resource::Factor;
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};

/// Which family of first factors the instance prefers to lead with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredStrategy {
    /// Lead with one-time codes and links.
    #[default]
    Otp,
    /// Lead with passwords.
    Password,
}

/// Fallback order when passwords are preferred.
const PASSWORD_PREFERRED_ORDER: [Strategy; 4] = [
    Strategy::Password,
    Strategy::EmailLink,
    Strategy::EmailCode,
    Strategy::PhoneCode,
];

/// Fallback order when one-time codes are preferred.
const OTP_PREFERRED_ORDER: [Strategy; 4] = [
    Strategy::EmailLink,
    Strategy::EmailCode,
    Strategy::PhoneCode,
    Strategy::Password,
];

/// Select the first factor to attempt when a sign-in starts.
///
/// Priority:
///
/// 1. A passkey factor, whenever the platform supports passkeys.
/// 2. With `Password` preferred: a password factor, then the factor whose
///    `safe_identifier` matches `identifier`, then the first match in
///    `[password, email_link, email_code, phone_code]`.
/// 3. Otherwise (`Otp` preferred): the factor matching `identifier`, then
///    `email_link`, then the first match in
///    `[email_link, email_code, phone_code, password]`.
///
/// Returns `None` when no factor is supplied or none matches.
#[must_use]
pub fn starting_first_factor(
    factors: &[Factor],
    identifier: Option<&str>,
    preferred: PreferredStrategy,
    passkey_supported: bool,
) -> Option<Factor> {
    if factors.is_empty() {
        return None;
    }

    if passkey_supported {
        if let Some(passkey) = factors.iter().find(|f| f.strategy == Strategy::Passkey) {
            return Some(passkey.clone());
        }
    }

    let matches_identifier = |factor: &&Factor| {
        identifier.is_some() && factor.safe_identifier.as_deref() == identifier
    };

    let selected = match preferred {
        PreferredStrategy::Password => factors
            .iter()
            .find(|f| f.strategy == Strategy::Password)
            .or_else(|| factors.iter().find(matches_identifier))
            .or_else(|| first_matching(factors, &PASSWORD_PREFERRED_ORDER)),
        PreferredStrategy::Otp => factors
            .iter()
            .find(matches_identifier)
            .or_else(|| factors.iter().find(|f| f.strategy == Strategy::EmailLink))
            .or_else(|| first_matching(factors, &OTP_PREFERRED_ORDER)),
    };

    selected.cloned()
}

/// Select the second factor to attempt.
///
/// Priority: `totp`, then `phone_code`, then the first available factor.
/// Returns `None` when the list is empty.
#[must_use]
pub fn starting_second_factor(factors: &[Factor]) -> Option<Factor> {
    first_matching(factors, &[Strategy::Totp, Strategy::PhoneCode])
        .or_else(|| factors.first())
        .cloned()
}

/// First factor whose strategy appears earliest in `order`.
fn first_matching<'a>(factors: &'a [Factor], order: &[Strategy]) -> Option<&'a Factor> {
    order
        .iter()
        .find_map(|strategy| factors.iter().find(|f| f.strategy == *strategy))
}
