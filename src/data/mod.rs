//! Model inputs.

pub mod batch;
