//! # tabspace-core
//!
//! The window/session reconciliation engine.
//!
//! Browser-level tab and window events arrive asynchronously; the
//! [`engine::SessionEngine`] records history intents, coalesces bursts per
//! window through the [`debounce::DebounceQueue`], and on each pass
//! re-reads live window state, matches it to saved sessions by
//! content fingerprint, and persists saved sessions through the store.
//!
//! Modules, leaf first:
//!
//! - **[`fingerprint`]** -- URL normalization and the 32-bit session hash
//! - **[`history`]** -- bounded, deduplicated ledger of closed-tab URLs
//! - **[`cache`]** -- the authoritative in-memory session collection
//! - **[`debounce`]** -- per-window coalescing timers
//! - **[`engine`]** -- the reconciliation state machine

pub mod cache;
pub mod debounce;
pub mod engine;
pub mod fingerprint;
pub mod history;

pub use engine::SessionEngine;
pub use fingerprint::UrlNormalizer;
