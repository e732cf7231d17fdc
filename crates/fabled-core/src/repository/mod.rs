//! Repository trait definitions.
//!
//! Implementations live in fabled-infra (e.g., `SqlitePersonaRepository`).
//! All traits use native async fn in traits (RPITIT, Rust 2024 edition).

pub mod conversation;
pub mod persona;
pub mod session;
