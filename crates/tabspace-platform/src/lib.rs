//! Collaborator abstraction layer for tabspace.
//!
//! The engine depends on two external collaborators, each behind a trait so
//! the core stays host-agnostic and testable:
//!
//! - [`browser::Browser`] -- live window/tab state queries. A WebExtension
//!   host or CDP bridge implements this against a real browser;
//!   [`browser::SimBrowser`] is the in-memory implementation used by tests
//!   and embedders.
//! - [`store::SessionStore`] -- durable session records.
//!   [`store::MemoryStore`] keeps everything in memory;
//!   [`store::JsonFileStore`] writes one JSON file per session.
//!
//! The engine never reads through the store on hot paths: the in-memory
//! cache is authoritative and the store is a write-through mirror.

pub mod browser;
pub mod store;

pub use browser::{Browser, BrowserWindow, SimBrowser, WindowKind};
pub use store::{JsonFileStore, MemoryStore, SessionStore};
