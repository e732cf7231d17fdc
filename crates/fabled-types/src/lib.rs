//! Shared domain types for Fabled.
//!
//! This crate contains the types that flow through the chat relay:
//! personas, conversation entries, the client-facing fragment schema,
//! the OpenAI-compatible wire shapes, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod persona;
