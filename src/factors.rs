//! Transient second-factor values supplied by the caller.
//!
//! Each login flow declares an ordered list of [`FactorKind`] keys. After a
//! challenge is raised, the caller fills the matching key in
//! [`FactorValues`]; the engine consumes it on the next login attempt and
//! clears it so a stale answer can never re-trigger a handler.

use std::collections::BTreeMap;

/// Name of a second-factor configuration key (`"otp_sms"`, `"resume"`, ...).
///
/// Flows declare these as static strings; declaration order in
/// [`LoginFlow::authentication_methods`](crate::flow::LoginFlow::authentication_methods)
/// is dispatch priority.
pub type FactorKind = &'static str;

/// Single-use store for caller-supplied second-factor answers.
///
/// Values start absent, are set once by the caller, and are cleared by the
/// engine after the matching handler runs (see the clearing rules on
/// [`TwoFactorBrowser::login`](crate::browser::TwoFactorBrowser::login)).
#[derive(Debug, Clone, Default)]
pub struct FactorValues {
    values: BTreeMap<String, String>,
}

impl FactorValues {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a value for a factor key.
    pub fn set(&mut self, kind: impl Into<String>, value: impl Into<String>) {
        self.values.insert(kind.into(), value.into());
    }

    /// Get the value for a key, if set and non-empty.
    pub fn get(&self, kind: &str) -> Option<&str> {
        self.values
            .get(kind)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// True if a non-empty value is set for this key.
    pub fn is_set(&self, kind: &str) -> bool {
        self.get(kind).is_some()
    }

    /// Reset one key back to its default (absent) state.
    pub fn clear(&mut self, kind: &str) {
        self.values.remove(kind);
    }

    /// Reset every listed key back to its default state.
    pub fn clear_all(&mut self, kinds: &[FactorKind]) {
        for kind in kinds {
            self.values.remove(*kind);
        }
    }

    /// True if none of the listed keys has a non-empty value.
    pub fn none_set(&self, kinds: &[FactorKind]) -> bool {
        kinds.iter().all(|kind| !self.is_set(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut factors = FactorValues::new();
        assert!(!factors.is_set("otp"));

        factors.set("otp", "123456");
        assert_eq!(factors.get("otp"), Some("123456"));

        factors.clear("otp");
        assert!(!factors.is_set("otp"));
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        let mut factors = FactorValues::new();
        factors.set("otp", "");
        assert!(!factors.is_set("otp"));
        assert_eq!(factors.get("otp"), None);
    }

    #[test]
    fn test_clear_all_only_touches_listed_keys() {
        let mut factors = FactorValues::new();
        factors.set("otp_sms", "111111");
        factors.set("resume", "true");
        factors.set("unrelated", "keep");

        factors.clear_all(&["otp_sms", "resume"]);
        assert!(!factors.is_set("otp_sms"));
        assert!(!factors.is_set("resume"));
        assert!(factors.is_set("unrelated"));
    }

    #[test]
    fn test_none_set() {
        let mut factors = FactorValues::new();
        assert!(factors.none_set(&["otp_sms", "otp_email"]));

        factors.set("otp_email", "222222");
        assert!(!factors.none_set(&["otp_sms", "otp_email"]));
    }
}
