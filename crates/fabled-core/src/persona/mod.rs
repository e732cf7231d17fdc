//! Persona lookup for the relay and persona administration.

pub mod resolver;
pub mod service;
