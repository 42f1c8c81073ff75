//! Wire types for the Chrome DevTools Protocol.
//!
//! This crate contains the serde-serializable types exchanged with a
//! Chromium-family browser over its remote debugging websocket. Only the
//! domains the scraper drives are modelled: message envelopes, `Target`,
//! `Page` and `Runtime`.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with protocol: Field names follow the CDP JSON schema
//! * Stable: Changes only when the wire protocol changes
//!
//! Driver behavior is built on top of these types in `bankscrape-driver`.

pub mod message;
pub mod page;
pub mod runtime;
pub mod target;

pub use message::*;
pub use page::*;
pub use runtime::*;
pub use target::*;
