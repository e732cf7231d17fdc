//! Upstream completion clients.

pub mod openai_compat;
