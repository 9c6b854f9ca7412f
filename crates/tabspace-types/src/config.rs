//! Engine configuration.
//!
//! All fields have serde defaults so a partial (or empty) config document
//! deserializes to the stock behavior. Unknown fields are ignored for
//! forward compatibility.

use serde::{Deserialize, Serialize};

fn default_debounce_ms() -> u64 {
    1000
}

fn default_history_limit() -> usize {
    200
}

fn default_ignored_url_markers() -> Vec<String> {
    vec!["chrome://newtab/".into()]
}

/// Tuning knobs for the reconciliation engine.
///
/// The URL markers participate in fingerprint normalization, so changing
/// them invalidates previously stored fingerprints; the engine's
/// `rehash_all_sessions` exists for exactly that migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period before a window's queued events trigger one
    /// reconciliation pass.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum history entries retained per session.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// URLs containing any of these substrings normalize to empty
    /// (excluded from fingerprints and history).
    #[serde(default = "default_ignored_url_markers")]
    pub ignored_url_markers: Vec<String>,

    /// Marker identifying this tracker's own pages (e.g. an extension id).
    /// Such URLs normalize to empty, and a single-tab window showing one is
    /// treated as internal and never reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_url_marker: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            history_limit: default_history_limit(),
            ignored_url_markers: default_ignored_url_markers(),
            own_url_marker: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.debounce_ms, 1000);
        assert_eq!(cfg.history_limit, 200);
        assert_eq!(cfg.ignored_url_markers, vec!["chrome://newtab/"]);
        assert!(cfg.own_url_marker.is_none());
    }

    #[test]
    fn empty_document_deserializes_to_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.debounce_ms, 1000);
        assert_eq!(cfg.history_limit, 200);
    }

    #[test]
    fn partial_override() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"debounce_ms": 50, "own_url_marker": "abcdef"}"#).unwrap();
        assert_eq!(cfg.debounce_ms, 50);
        assert_eq!(cfg.history_limit, 200);
        assert_eq!(cfg.own_url_marker.as_deref(), Some("abcdef"));
    }
}
