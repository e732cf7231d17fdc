//! Observability for Fabled: structured logging and optional trace export.

pub mod tracing_setup;
