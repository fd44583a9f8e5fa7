//! Mock platform capability probe.

use crate::providers::Platform;

/// Mock platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPlatform {
    passkeys: bool,
}

impl MockPlatform {
    /// Platform with passkey support.
    #[must_use]
    pub const fn with_passkeys() -> Self {
        Self { passkeys: true }
    }

    /// Platform without passkey support.
    #[must_use]
    pub const fn without_passkeys() -> Self {
        Self { passkeys: false }
    }
}

impl Platform for MockPlatform {
    fn passkey_supported(&self) -> bool {
        self.passkeys
    }
}
