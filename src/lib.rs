//! DialogueGCN: emotion recognition in multi-party conversation with
//! relational graph convolution.
//!
//! # Public API
//!
//! ```ignore
//! use dialogue_gcn::{DialogueBatch, DialogueGcnConfig};
//! let model = DialogueGcnConfig::new(200, 2).init::<B>(&device)?;
//! let batch = DialogueBatch::new(features, speakers, lengths)?;
//! let out = model.forward(&batch)?;
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod model;

pub use config::{DeviceKind, DialogueGcnConfig};
pub use data::batch::{BatchFile, DialogueBatch, DialogueRecord, SpeakerMasks};
pub use error::{Error, Result};
pub use graph::batch::{assemble, BatchGraph};
pub use graph::relation::{Direction, RelationTypeMap};
pub use graph::window::{edge_perms, EdgeSet, Window, WindowSpec};
pub use model::dialogue_gcn::{DialogueGcn, DialogueGcnOutput};
pub use model::edge_attention::EdgeScorer;
