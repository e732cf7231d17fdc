//! Upstream completion port and the stream frame parser.

pub mod frame;
pub mod upstream;
