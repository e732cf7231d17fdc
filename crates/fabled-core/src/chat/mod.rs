//! The streaming chat pipeline: event normalization and the turn relay.

pub mod normalizer;
pub mod relay;
