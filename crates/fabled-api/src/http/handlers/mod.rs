//! HTTP request handlers.

pub mod chat;
pub mod history;
pub mod models;
pub mod persona;
