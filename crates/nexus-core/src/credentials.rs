// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plaintext platform credentials.
//!
//! A [`Credentials`] value only exists between a vault `decrypt` and the
//! adapter constructor that consumes it. Values are zeroized on drop and
//! never printed by `Debug`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::NexusError;
use crate::types::Platform;

/// String-to-string credential map for one bridge.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the value of a field that must be present and non-empty.
    pub fn require(&self, key: &str) -> Result<&str, NexusError> {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(NexusError::Config(format!("missing credential field '{key}'"))),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks required fields and rejects fields the platform does not know.
    pub fn validate_for(&self, platform: Platform) -> Result<(), NexusError> {
        let missing: Vec<&str> = platform
            .required_credentials()
            .iter()
            .copied()
            .filter(|field| self.require(field).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(NexusError::Config(format!(
                "{platform} credentials missing required fields: {}",
                missing.join(", ")
            )));
        }

        let unknown: Vec<&str> = self
            .keys()
            .filter(|k| {
                !platform
                    .required_credentials()
                    .iter()
                    .chain(platform.optional_credentials())
                    .any(|f| f == k)
            })
            .collect();
        if !unknown.is_empty() {
            return Err(NexusError::Config(format!(
                "{platform} credentials contain unknown fields: {}",
                unknown.join(", ")
            )));
        }
        Ok(())
    }

    /// Copies the platform's public identifiers into a plain map.
    pub fn public_identifiers(&self, platform: Platform) -> BTreeMap<String, String> {
        platform
            .public_identifier_fields()
            .iter()
            .filter_map(|f| self.get(f).map(|v| (f.to_string(), v.to_string())))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in self.0.keys() {
            map.entry(key, &"[REDACTED]");
        }
        map.finish()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        for value in self.0.values_mut() {
            value.zeroize();
        }
    }
}

/// Renders a secret for logs: first and last four characters only.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telegram() -> Credentials {
        Credentials::new()
            .with("bot_token", "123456:ABCDEF")
            .with("bot_username", "acme_bot")
    }

    #[test]
    fn debug_never_prints_values() {
        let out = format!("{:?}", telegram());
        assert!(out.contains("bot_token"));
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("ABCDEF"));
    }

    #[test]
    fn validate_reports_missing_fields() {
        let creds = Credentials::new().with("bot_token", "x");
        let err = creds.validate_for(Platform::Telegram).unwrap_err();
        assert!(err.to_string().contains("bot_username"));
    }

    #[test]
    fn validate_rejects_blank_and_unknown() {
        let blank = telegram().with("bot_username", "  ");
        assert!(blank.validate_for(Platform::Telegram).is_err());

        let extra = telegram().with("password", "x");
        let err = extra.validate_for(Platform::Telegram).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn signal_cli_path_is_optional() {
        let creds = Credentials::new().with("phone_number", "+15550001111");
        assert!(creds.validate_for(Platform::Signal).is_ok());
    }

    #[test]
    fn public_identifiers_exclude_secrets() {
        let creds = Credentials::new()
            .with("access_token", "EAAG-secret")
            .with("phone_number_id", "1098")
            .with("business_account_id", "77")
            .with("webhook_verify_token", "verify");
        let ids = creds.public_identifiers(Platform::WhatsApp);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids["phone_number_id"], "1098");
        assert!(!ids.contains_key("access_token"));
    }

    #[test]
    fn mask_secret_keeps_edges() {
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("abcd1234efgh"), "abcd****efgh");
    }

    proptest::proptest! {
        #[test]
        fn mask_secret_preserves_length(secret in "\\PC{0,64}") {
            let masked = mask_secret(&secret);
            proptest::prop_assert_eq!(masked.chars().count(), secret.chars().count());
        }
    }
}
