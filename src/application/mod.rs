//! Application layer: render orchestration and its errors.

pub mod error;
pub mod render;
