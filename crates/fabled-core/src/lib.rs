//! Chat relay and repository trait definitions for Fabled.
//!
//! This crate defines the "ports" (repository traits and the upstream
//! completion trait) that the infrastructure layer implements, plus the
//! streaming relay pipeline built on top of them. It depends only on
//! `fabled-types` -- never on `fabled-infra` or any database/HTTP crate.

pub mod chat;
pub mod llm;
pub mod persona;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;
