//! # tabspace-types
//!
//! Core type definitions for the tabspace session tracker.
//!
//! This crate is the foundation of the dependency graph -- both
//! `tabspace-platform` and `tabspace-core` depend on it. It contains:
//!
//! - **[`error`]** -- [`TabspaceError`] and the crate-wide [`Result`] alias
//! - **[`config`]** -- Engine tuning knobs (debounce interval, history cap)
//! - **[`event`]** -- Raw browser events consumed by the engine
//! - **[`session`]** -- Session and tab records

pub mod config;
pub mod error;
pub mod event;
pub mod session;

pub use error::{Result, TabspaceError};
pub use session::{Session, SessionId, Tab, WindowId};
