//! Boundary types for netload request sessions.
//!
//! This crate contains the serde-serializable types that cross the session
//! boundary in either direction: request descriptors going in, response
//! heads, auth challenges, redirect notifications, and terminal outcomes
//! coming back out.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and
//!   trivial accessors
//! * Transport-agnostic: Nothing here names a concrete network stack
//! * Stable: Changes only when the session boundary changes
//!
//! The session engine built on top of these types lives in `netload`.

pub mod auth;
pub mod options;
pub mod outcome;
pub mod redirect;
pub mod request;
pub mod response;

pub use auth::*;
pub use options::*;
pub use outcome::*;
pub use redirect::*;
pub use request::*;
pub use response::*;
