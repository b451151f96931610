//! Process-wide runtime options
//!
//! The option store is created on first use and lives for the rest of the
//! process. It only changes through [`configure`] / [`configure_json`].

use crate::error::{KlassError, KlassResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Runtime options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlassOptions {
    /// Direct invocation is refused; klasses must be approved and invoked
    /// through the allocation path
    pub construct_with_new: bool,

    /// Install instance fields with `[[Set]]` instead of defining them
    pub use_set_for_klass_fields: bool,

    /// Let derived constructors touch `this` before the parent constructor
    pub unsafe_disable_no_this_before_super_check: bool,
}

/// Partial update to [`KlassOptions`]; unset fields are left alone
///
/// Deserializes from the documented option names. Unknown keys are
/// ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigPatch {
    /// See [`KlassOptions::construct_with_new`]
    #[serde(rename = "constructWithNew", alias = "constructWithNеw", default)]
    pub construct_with_new: Option<bool>,

    /// See [`KlassOptions::use_set_for_klass_fields`]
    #[serde(rename = "useSetForKlassFields", default)]
    pub use_set_for_klass_fields: Option<bool>,

    /// See [`KlassOptions::unsafe_disable_no_this_before_super_check`]
    #[serde(rename = "UNSAFE_disableNoThisBeforeSuperCheck", default)]
    pub unsafe_disable_no_this_before_super_check: Option<bool>,
}

impl ConfigPatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `constructWithNew`
    pub fn construct_with_new(mut self, enabled: bool) -> Self {
        self.construct_with_new = Some(enabled);
        self
    }

    /// Set `useSetForKlassFields`
    pub fn use_set_for_klass_fields(mut self, enabled: bool) -> Self {
        self.use_set_for_klass_fields = Some(enabled);
        self
    }

    /// Set `UNSAFE_disableNoThisBeforeSuperCheck`
    pub fn unsafe_disable_no_this_before_super_check(mut self, enabled: bool) -> Self {
        self.unsafe_disable_no_this_before_super_check = Some(enabled);
        self
    }

    fn apply(&self, options: &mut KlassOptions) {
        if let Some(v) = self.construct_with_new {
            options.construct_with_new = v;
        }
        if let Some(v) = self.use_set_for_klass_fields {
            options.use_set_for_klass_fields = v;
        }
        if let Some(v) = self.unsafe_disable_no_this_before_super_check {
            options.unsafe_disable_no_this_before_super_check = v;
        }
    }
}

fn store() -> &'static RwLock<KlassOptions> {
    static OPTIONS: OnceLock<RwLock<KlassOptions>> = OnceLock::new();
    OPTIONS.get_or_init(|| RwLock::new(KlassOptions::default()))
}

/// Snapshot of the current options
pub fn options() -> KlassOptions {
    *store().read()
}

/// Apply a partial update to the process-wide options
pub fn configure(patch: ConfigPatch) {
    let mut options = store().write();
    patch.apply(&mut options);
    tracing::debug!(options = ?*options, "klass options updated");
}

/// Apply a JSON options document such as
/// `{"constructWithNew": true, "UNSAFE_disableNoThisBeforeSuperCheck": false}`
pub fn configure_json(document: &serde_json::Value) -> KlassResult<()> {
    if !document.is_object() {
        return Err(KlassError::Config(
            "options must be a JSON object".to_string(),
        ));
    }
    let patch = ConfigPatch::deserialize(document)?;
    configure(patch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut options = KlassOptions {
            construct_with_new: true,
            ..Default::default()
        };
        ConfigPatch::new()
            .use_set_for_klass_fields(true)
            .apply(&mut options);
        assert!(options.construct_with_new);
        assert!(options.use_set_for_klass_fields);
        assert!(!options.unsafe_disable_no_this_before_super_check);
    }

    #[test]
    fn test_patch_from_json_ignores_unknown_keys() {
        let patch = ConfigPatch::deserialize(&json!({
            "constructWithNew": true,
            "somethingElse": 42,
        }))
        .unwrap();
        assert_eq!(patch, ConfigPatch::new().construct_with_new(true));
    }

    #[test]
    fn test_patch_accepts_cyrillic_spelling() {
        let patch = ConfigPatch::deserialize(&json!({
            "constructWithNеw": false,
            "UNSAFE_disableNoThisBeforeSuperCheck": true,
        }))
        .unwrap();
        assert_eq!(patch.construct_with_new, Some(false));
        assert_eq!(patch.unsafe_disable_no_this_before_super_check, Some(true));
    }

    #[test]
    fn test_patch_rejects_non_boolean() {
        let err = ConfigPatch::deserialize(&json!({ "useSetForKlassFields": "yes" }));
        assert!(err.is_err());
    }

    #[test]
    fn test_configure_json_rejects_non_object() {
        assert!(matches!(
            configure_json(&json!([1, 2])),
            Err(KlassError::Config(_))
        ));
    }
}
