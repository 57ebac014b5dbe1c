//! Utterance graphs: window edges, relation labels, batch assembly and
//! diagnostic export.

pub mod batch;
pub mod export;
pub mod relation;
pub mod window;
