//! Generation capability for the colloquy platform.
//!
//! This crate provides:
//!
//! - **Backend contract**: role-tagged messages and the [`GenerationBackend`] trait
//! - **OpenAI-compatible backend**: HTTP implementation for any
//!   `/chat/completions`-shaped endpoint

pub mod backend;
pub mod error;
pub mod openai;

pub use backend::{ChatMessage, GenerationBackend, GenerationConfig, MessageRole};
pub use error::GenerationError;
pub use openai::OpenAiCompatibleBackend;
