//! Core domain types for the colloquy conversational backend.
//!
//! This crate provides the strongly-typed identifiers shared by every
//! other crate in the workspace.

pub mod id;

pub use id::{ChatSessionId, IdentityId, ParseIdError, TurnId};
