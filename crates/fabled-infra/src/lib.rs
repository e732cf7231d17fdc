//! Infrastructure layer for Fabled.
//!
//! Contains implementations of the traits defined in `fabled-core`: SQLite
//! storage for personas, conversations and session settings, and the HTTP
//! client for OpenAI-compatible completion servers. Also loads the global
//! configuration file.

pub mod config;
pub mod llm;
pub mod sqlite;
