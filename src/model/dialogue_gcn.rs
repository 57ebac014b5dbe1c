//! Composite DialogueGCN model: edge attention, graph assembly,
//! relational convolution and the self-attentive classifier.
//!
//! Wraps every learned component into a single `Module` that can be
//! saved/loaded as a unit.

use burn::module::Module;
use burn::prelude::*;
use tracing::{debug, info};

use super::classifier::{SelfAttentiveClassifier, SelfAttentiveClassifierConfig};
use super::conv::{RelationalConvStack, RelationalConvStackConfig};
use super::edge_attention::{EdgeScorer, ScalarEdgeAttention, ScalarEdgeAttentionConfig};
use crate::config::DialogueGcnConfig;
use crate::data::batch::DialogueBatch;
use crate::error::{Error, Result};
use crate::graph::batch::{assemble, BatchGraph};
use crate::graph::relation::RelationTypeMap;
use crate::graph::window::WindowSpec;

/// DialogueGCN: window graph over utterances, relational GCN, node classifier.
#[derive(Module, Debug)]
pub struct DialogueGcn<B: Backend> {
    pub edge_attention: ScalarEdgeAttention<B>,
    pub conv: RelationalConvStack<B>,
    pub classifier: SelfAttentiveClassifier<B>,
    feature_dim: usize,
    num_speakers: usize,
    num_classes: usize,
    window_past: i64,
    window_future: i64,
}

/// Forward pass result.
#[derive(Debug, Clone)]
pub struct DialogueGcnOutput<B: Backend> {
    /// [total_valid_nodes, num_classes]
    pub log_probs: Tensor<B, 2>,
    /// The batch graph the convolution ran over, for diagnostics.
    pub graph: BatchGraph<B>,
}

impl<B: Backend> DialogueGcnOutput<B> {
    /// Most likely class per node.
    pub fn predictions(&self) -> Result<Vec<usize>> {
        if self.graph.num_nodes == 0 {
            return Ok(Vec::new());
        }
        let classes = self
            .log_probs
            .clone()
            .argmax(1)
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| Error::TensorData(format!("{:?}", e)))?;
        Ok(classes.into_iter().map(|c| c as usize).collect())
    }
}

impl DialogueGcnConfig {
    /// Validate and initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DialogueGcn<B>> {
        self.validate()?;

        let edge_attention =
            ScalarEdgeAttentionConfig::new(self.feature_dim, self.max_seq_len).init(device);
        let conv_config = RelationalConvStackConfig::new(self.feature_dim, self.num_relations())
            .with_hidden_size(self.hidden_size)
            .with_num_bases(self.num_bases);
        let conv = conv_config.init(device);
        let classifier = SelfAttentiveClassifierConfig::new(conv_config.d_out())
            .with_hidden_size(self.hidden_size)
            .with_num_classes(self.num_classes)
            .with_dropout(self.dropout)
            .init(device);

        info!(
            relations = self.num_relations(),
            bases = self.num_bases,
            window_past = self.window_past,
            window_future = self.window_future,
            device = %self.device,
            "initialized DialogueGCN"
        );

        Ok(DialogueGcn {
            edge_attention,
            conv,
            classifier,
            feature_dim: self.feature_dim,
            num_speakers: self.num_speakers,
            num_classes: self.num_classes,
            window_past: self.window_past,
            window_future: self.window_future,
        })
    }
}

impl<B: Backend> DialogueGcn<B> {
    pub fn window(&self) -> Result<WindowSpec> {
        WindowSpec::try_new(self.window_past, self.window_future)
    }

    pub fn relation_map(&self) -> RelationTypeMap {
        RelationTypeMap::new(self.num_speakers)
    }

    /// Classify every valid utterance of the batch.
    pub fn forward(&self, batch: &DialogueBatch<B>) -> Result<DialogueGcnOutput<B>> {
        self.forward_with(batch, &self.edge_attention)
    }

    /// Same as [`forward`](Self::forward) with another edge scorer.
    pub fn forward_with<S: EdgeScorer<B> + ?Sized>(
        &self,
        batch: &DialogueBatch<B>,
        scorer: &S,
    ) -> Result<DialogueGcnOutput<B>> {
        if batch.feature_dim() != self.feature_dim {
            return Err(Error::ShapeMismatch {
                what: "features",
                expected: format!("feature_dim {}", self.feature_dim),
                got: batch.feature_dim().to_string(),
            });
        }

        let graph = assemble(batch, self.window()?, &self.relation_map(), scorer)?;
        if graph.num_nodes == 0 {
            let log_probs = Tensor::zeros([0, self.num_classes], &batch.features.device());
            return Ok(DialogueGcnOutput { log_probs, graph });
        }
        let contextual = self.conv.forward(&graph);
        let log_probs = self.classifier.forward(contextual);
        debug!(nodes = graph.num_nodes, edges = graph.num_edges(), "forward pass");

        Ok(DialogueGcnOutput { log_probs, graph })
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::edge_attention::NeighbourEdgeAttentionConfig;
    use crate::model::loss::nll_loss;
    use burn::backend::{Autodiff, NdArray};

    type B = NdArray;

    fn small_config() -> DialogueGcnConfig {
        DialogueGcnConfig::new(8, 2)
            .with_num_classes(4)
            .with_max_seq_len(6)
            .with_window_past(1)
            .with_window_future(1)
            .with_hidden_size(16)
            .with_num_bases(4)
            .with_dropout(0.0)
    }

    #[test]
    fn two_dialogues_five_nodes() {
        let device = Default::default();
        let model = small_config().init::<B>(&device).unwrap();
        let batch = DialogueBatch::<B>::synthetic(&[3, 2], 8, 2, &device).unwrap();

        let out = model.forward(&batch).unwrap();
        assert_eq!(out.log_probs.dims(), [5, 4]);
        let sums = out.log_probs.clone().exp().sum_dim(1).into_data().to_vec::<f32>().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5, "row sum {}", s);
        }
        assert_eq!(out.graph.edge_counts, vec![7, 4]);
        let preds = out.predictions().unwrap();
        assert_eq!(preds.len(), 5);
        assert!(preds.iter().all(|&c| c < 4));
    }

    #[test]
    fn utterance_free_batch_yields_no_rows() {
        let device = Default::default();
        let model = small_config().init::<B>(&device).unwrap();
        let batch = DialogueBatch::<B>::synthetic(&[0, 0], 8, 2, &device).unwrap();

        let out = model.forward(&batch).unwrap();
        assert_eq!(out.log_probs.dims(), [0, 4]);
        assert_eq!(out.graph.num_edges(), 0);
        assert!(out.predictions().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_never_builds() {
        let device = Default::default();
        let result = small_config().with_window_future(-3).init::<B>(&device);
        assert!(matches!(result, Err(Error::InvalidWindow(-3))));
    }

    #[test]
    fn wrong_feature_width_rejected() {
        let device = Default::default();
        let model = small_config().init::<B>(&device).unwrap();
        let batch = DialogueBatch::<B>::synthetic(&[2], 6, 2, &device).unwrap();
        assert!(matches!(
            model.forward(&batch),
            Err(Error::ShapeMismatch { what: "features", .. })
        ));
    }

    #[test]
    fn speaker_beyond_model_rejected() {
        let device = Default::default();
        let model = small_config().init::<B>(&device).unwrap();
        let batch = DialogueBatch::<B>::synthetic(&[3], 8, 3, &device).unwrap();
        assert!(matches!(
            model.forward(&batch),
            Err(Error::UnknownSpeaker { speaker: 2, num_speakers: 2 })
        ));
    }

    #[test]
    fn neighbour_scorer_plugs_in() {
        let device = Default::default();
        let model = small_config().init::<B>(&device).unwrap();
        let scorer = NeighbourEdgeAttentionConfig::new(8).init::<B>(&device);
        let batch = DialogueBatch::<B>::synthetic(&[4, 1], 8, 2, &device).unwrap();

        let out = model.forward_with(&batch, &scorer).unwrap();
        assert_eq!(out.log_probs.dims(), [5, 4]);
    }

    #[test]
    fn gradients_reach_edge_attention() {
        type AB = Autodiff<NdArray>;
        let device = Default::default();
        let model = small_config().init::<AB>(&device).unwrap();
        let batch = DialogueBatch::<AB>::synthetic(&[3, 2], 8, 2, &device).unwrap();

        let out = model.forward(&batch).unwrap();
        let targets = Tensor::<AB, 1, Int>::from_ints([0, 1, 2, 3, 0], &device);
        let loss = nll_loss(out.log_probs, targets, None);
        let grads = loss.backward();

        let grad = model
            .edge_attention
            .scoring()
            .weight
            .grad(&grads)
            .expect("scoring weight has a gradient");
        let magnitude: f32 = grad.abs().sum().into_scalar();
        assert!(magnitude > 0.0);
    }
}
