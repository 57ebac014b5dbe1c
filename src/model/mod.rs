//! DialogueGCN model: edge attention, relational convolution and the
//! self-attentive classifier, all as burn modules.

pub mod classifier;
pub mod conv;
pub mod dialogue_gcn;
pub mod edge_attention;
pub mod gnn_ops;
pub mod loss;
