//! Batch graph assembly.
//!
//! Every dialogue in a mini-batch becomes its own window graph; the graphs
//! are laid side by side in one node index space so a single convolution
//! call covers the batch. Dialogue `b` owns the node range
//! `[offset_b, offset_b + length_b)` and none of its edges leave it.

use burn::prelude::*;
use tracing::{debug, trace};

use super::relation::{Direction, RelationTypeMap};
use super::window::{EdgeSet, WindowSpec};
use crate::data::batch::DialogueBatch;
use crate::error::Result;
use crate::model::edge_attention::EdgeScorer;
use crate::model::gnn_ops::index_tensor;

/// Disjoint union of the per-dialogue graphs of one batch.
#[derive(Debug, Clone)]
pub struct BatchGraph<B: Backend> {
    /// [num_nodes, feature_dim], ordered by dialogue then position.
    pub node_features: Tensor<B, 2>,
    /// Global `(source, target)` pairs.
    pub edges: Vec<(usize, usize)>,
    /// Relation label per edge.
    pub relations: Vec<usize>,
    /// [num_edges], source node per edge.
    pub src_indices: Tensor<B, 1, Int>,
    /// [num_edges], target node per edge.
    pub dst_indices: Tensor<B, 1, Int>,
    /// [num_edges], relation label per edge.
    pub edge_types: Tensor<B, 1, Int>,
    /// [num_edges], attention weight per edge.
    pub edge_weights: Tensor<B, 1>,
    /// Edges contributed by each dialogue.
    pub edge_counts: Vec<usize>,
    /// First node of each dialogue.
    pub node_offsets: Vec<usize>,
    pub num_nodes: usize,
    pub num_relations: usize,
}

impl<B: Backend> BatchGraph<B> {
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_dialogues(&self) -> usize {
        self.node_offsets.len()
    }

    /// Dialogue owning `node`.
    pub fn dialogue_of(&self, node: usize) -> Option<usize> {
        if node >= self.num_nodes {
            return None;
        }
        // Last offset ≤ node; empty dialogues share an offset with their successor.
        self.node_offsets.iter().rposition(|&offset| offset <= node)
    }
}

/// Build the batch graph, weighting edges with `scorer`.
///
/// Relation labels and candidate sets are resolved on the host before any
/// tensor work, so malformed speaker masks fail without partial output.
/// A batch without valid utterances yields a graph with zero nodes and
/// zero edges; the scorer is not consulted.
pub fn assemble<B: Backend, S: EdgeScorer<B> + ?Sized>(
    batch: &DialogueBatch<B>,
    window: WindowSpec,
    relation_map: &RelationTypeMap,
    scorer: &S,
) -> Result<BatchGraph<B>> {
    let device = batch.features.device();
    let lengths = &batch.lengths;
    let num_nodes = batch.total_nodes();
    if num_nodes == 0 {
        debug!(dialogues = lengths.len(), "batch has no valid utterances");
        return Ok(BatchGraph {
            node_features: Tensor::zeros([0, batch.feature_dim()], &device),
            edges: Vec::new(),
            relations: Vec::new(),
            src_indices: index_tensor::<B>(&[], &device),
            dst_indices: index_tensor::<B>(&[], &device),
            edge_types: index_tensor::<B>(&[], &device),
            edge_weights: Tensor::zeros([0], &device),
            edge_counts: vec![0; lengths.len()],
            node_offsets: vec![0; lengths.len()],
            num_nodes: 0,
            num_relations: relation_map.len(),
        });
    }

    let candidates: Vec<EdgeSet> = lengths.iter().map(|&len| window.edges(len)).collect();

    let mut edges = Vec::new();
    let mut relations = Vec::new();
    let mut local = Vec::new();
    let mut edge_counts = Vec::with_capacity(lengths.len());
    let mut node_offsets = Vec::with_capacity(lengths.len());
    let mut offset = 0usize;

    for (dialogue, dialogue_edges) in candidates.iter().enumerate() {
        node_offsets.push(offset);
        edge_counts.push(dialogue_edges.len());
        trace!(dialogue, length = lengths[dialogue], edges = dialogue_edges.len(), "window graph");

        for &(i, j) in dialogue_edges {
            let source_speaker = batch.speakers.speaker(i, dialogue)?;
            let target_speaker = batch.speakers.speaker(j, dialogue)?;
            let label = relation_map.label(source_speaker, target_speaker, Direction::of(i, j))?;

            edges.push((i + offset, j + offset));
            relations.push(label);
            local.push((dialogue, i, j));
        }
        offset += lengths[dialogue];
    }

    let grid = scorer.score_edges(batch.features.clone(), lengths, &candidates)?;
    let [grid_batch, rows, cols] = grid.dims();
    let cells: Vec<usize> = local
        .iter()
        .map(|&(b, i, j)| (b * rows + i) * cols + j)
        .collect();
    let edge_weights = grid
        .reshape([grid_batch * rows * cols])
        .select(0, index_tensor::<B>(&cells, &device));

    let feature_dim = batch.feature_dim();
    let rows_per_dialogue: Vec<Tensor<B, 2>> = lengths
        .iter()
        .enumerate()
        .filter(|&(_, &len)| len > 0)
        .map(|(b, &len)| {
            batch
                .features
                .clone()
                .slice([0..len, b..b + 1, 0..feature_dim])
                .reshape([len, feature_dim])
        })
        .collect();
    let node_features = Tensor::cat(rows_per_dialogue, 0);

    let sources: Vec<usize> = edges.iter().map(|&(s, _)| s).collect();
    let targets: Vec<usize> = edges.iter().map(|&(_, t)| t).collect();

    debug!(
        dialogues = lengths.len(),
        nodes = num_nodes,
        edges = edges.len(),
        "assembled batch graph"
    );

    Ok(BatchGraph {
        node_features,
        src_indices: index_tensor::<B>(&sources, &device),
        dst_indices: index_tensor::<B>(&targets, &device),
        edge_types: index_tensor::<B>(&relations, &device),
        edges,
        relations,
        edge_weights,
        edge_counts,
        node_offsets,
        num_nodes,
        num_relations: relation_map.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batch::SpeakerMasks;
    use crate::error::Error;
    use crate::model::edge_attention::ScalarEdgeAttentionConfig;
    use burn::backend::NdArray;

    type B = NdArray;

    fn batch(lengths: &[usize], speakers: &[Vec<usize>], dim: usize) -> DialogueBatch<B> {
        let device = Default::default();
        let seq_len = lengths.iter().copied().max().unwrap();
        let features = Tensor::<B, 3>::random(
            [seq_len, lengths.len(), dim],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let masks = SpeakerMasks::from_indices(speakers, seq_len, 2).unwrap();
        DialogueBatch::new(features, masks, lengths.to_vec()).unwrap()
    }

    fn build(b: &DialogueBatch<B>, past: i64, future: i64) -> Result<BatchGraph<B>> {
        let device = Default::default();
        let scorer = ScalarEdgeAttentionConfig::new(b.feature_dim(), 8).init::<B>(&device);
        assemble(
            b,
            WindowSpec::try_new(past, future).unwrap(),
            &RelationTypeMap::new(2),
            &scorer,
        )
    }

    #[test]
    fn three_utterance_dialogue_relations() {
        let b = batch(&[3], &[vec![0, 1, 0]], 4);
        let graph = build(&b, 1, 1).unwrap();
        let map = RelationTypeMap::new(2);

        assert_eq!(
            graph.edges,
            vec![(0, 0), (0, 1), (1, 0), (1, 1), (1, 2), (2, 1), (2, 2)]
        );
        let rel = |s, t| graph.relations[graph.edges.iter().position(|&e| e == (s, t)).unwrap()];
        assert_eq!(rel(0, 1), map.label(0, 1, Direction::Forward).unwrap());
        assert_eq!(rel(1, 0), map.label(1, 0, Direction::Backward).unwrap());
        assert_eq!(rel(1, 1), map.label(1, 1, Direction::Backward).unwrap());
        assert_eq!(graph.edge_counts, vec![7]);
    }

    #[test]
    fn dialogues_stay_disjoint() {
        let b = batch(&[3, 2, 4], &[vec![0, 1, 0], vec![1, 1], vec![0, 0, 1, 1]], 4);
        let graph = build(&b, -1, -1).unwrap();

        assert_eq!(graph.num_nodes, 9);
        assert_eq!(graph.node_features.dims(), [9, 4]);
        assert_eq!(graph.node_offsets, vec![0, 3, 5]);
        assert_eq!(graph.edge_counts, vec![9, 4, 16]);
        assert_eq!(graph.num_edges(), 29);
        for &(s, t) in &graph.edges {
            assert_eq!(graph.dialogue_of(s), graph.dialogue_of(t), "edge ({}, {})", s, t);
        }
        assert!(graph.relations.iter().all(|&r| r < graph.num_relations));
    }

    #[test]
    fn node_rows_follow_dialogue_order() {
        let b = batch(&[2, 3], &[vec![0, 1], vec![1, 0, 1]], 3);
        let graph = build(&b, 1, 1).unwrap();

        // Node 2 is position 0 of dialogue 1.
        let expected = b
            .features
            .clone()
            .slice([0..1, 1..2, 0..3])
            .reshape([1, 3])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let got = graph
            .node_features
            .clone()
            .slice([2..3, 0..3])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn edge_weights_sum_to_one_per_anchor() {
        let b = batch(&[4, 2], &[vec![0, 1, 1, 0], vec![1, 0]], 4);
        let graph = build(&b, 2, 1).unwrap();
        let weights = graph.edge_weights.clone().into_data().to_vec::<f32>().unwrap();

        let mut sums = vec![0.0f32; graph.num_nodes];
        for (&(s, _), w) in graph.edges.iter().zip(&weights) {
            sums[s] += w;
        }
        for (node, sum) in sums.iter().enumerate() {
            assert!((sum - 1.0).abs() < 1e-5, "node {} sum {}", node, sum);
        }
    }

    #[test]
    fn single_utterance_is_one_self_loop() {
        let b = batch(&[1], &[vec![1]], 4);
        let graph = build(&b, 2, 2).unwrap();
        let map = RelationTypeMap::new(2);

        assert_eq!(graph.edges, vec![(0, 0)]);
        assert_eq!(graph.relations, vec![map.label(1, 1, Direction::Backward).unwrap()]);
        let w = graph.edge_weights.into_data().to_vec::<f32>().unwrap();
        assert!((w[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_dialogue_contributes_nothing() {
        let b = batch(&[2, 0, 1], &[vec![0, 1], vec![], vec![1]], 4);
        let graph = build(&b, 1, 1).unwrap();

        assert_eq!(graph.num_nodes, 3);
        assert_eq!(graph.edge_counts, vec![4, 0, 1]);
        assert_eq!(graph.node_offsets, vec![0, 2, 2]);
        assert_eq!(graph.edges.last(), Some(&(2, 2)));
        assert_eq!(graph.dialogue_of(2), Some(2));
    }

    #[test]
    fn all_empty_batch_gives_empty_graph() {
        let device = Default::default();
        let features = Tensor::<B, 3>::zeros([2, 2, 4], &device);
        let masks = SpeakerMasks::from_indices(&[vec![], vec![]], 2, 2).unwrap();
        let b = DialogueBatch::new(features, masks, vec![0, 0]).unwrap();
        let graph = build(&b, 1, 1).unwrap();

        assert_eq!(graph.num_nodes, 0);
        assert_eq!(graph.num_edges(), 0);
        assert_eq!(graph.node_features.dims(), [0, 4]);
        assert_eq!(graph.edge_weights.dims(), [0]);
        assert_eq!(graph.edge_counts, vec![0, 0]);
        assert_eq!(graph.node_offsets, vec![0, 0]);
        assert_eq!(graph.dialogue_of(0), None);
    }

    #[test]
    fn malformed_speaker_mask_fails() {
        let device = Default::default();
        let features = Tensor::<B, 3>::zeros([2, 1, 4], &device);
        // Position 1 claims to be valid but has no speaker.
        let masks = SpeakerMasks::from_one_hot(vec![1.0, 0.0, 0.0, 0.0], [2, 1, 2]).unwrap();
        let b = DialogueBatch::new(features, masks, vec![2]).unwrap();
        assert!(matches!(
            build(&b, 1, 1),
            Err(Error::MissingSpeaker { dialogue: 0, position: 1 })
        ));
    }
}
