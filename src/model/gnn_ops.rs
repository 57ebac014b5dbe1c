//! Graph neural network operations for burn.
//!
//! Scatter-based message passing primitives that burn doesn't have
//! natively: sum aggregation by target node, grouped softmax, and the
//! per-segment normalization used by mean aggregation.

use burn::prelude::*;
use burn::tensor::IndexingUpdateOp;

/// Scatter-add: aggregate per-edge rows by destination index.
///
/// - `src_features`: [num_edges, d], per-edge feature vectors
/// - `dst_indices`: [num_edges], destination row per edge
/// - `num_nodes`: number of output rows
///
/// Returns: [num_nodes, d]
pub fn scatter_add<B: Backend>(
    src_features: Tensor<B, 2>,
    dst_indices: Tensor<B, 1, Int>,
    num_nodes: usize,
) -> Tensor<B, 2> {
    let device = src_features.device();
    let num_edges = dst_indices.dims()[0];
    let d = src_features.dims()[1];

    // Expand dst_indices [E] → [E, 1] → [E, d] for scatter
    let indices_2d: Tensor<B, 2, Int> = dst_indices.unsqueeze_dim::<2>(1).expand([num_edges, d]);

    let output = Tensor::<B, 2>::zeros([num_nodes, d], &device);
    output.scatter(0, indices_2d, src_features, IndexingUpdateOp::Add)
}

/// Grouped softmax: edge scores normalized within each group.
///
/// - `edge_scores`: [num_edges, 1], raw logits
/// - `group_indices`: [num_edges], group per edge, each below `num_groups`
/// - `num_groups`: number of groups
///
/// Each group's maximum is subtracted before exponentiating. The maxima
/// are read on the host and enter as constants, so gradients are those of
/// the plain softmax.
pub fn grouped_softmax<B: Backend>(
    edge_scores: Tensor<B, 2>,
    group_indices: Tensor<B, 1, Int>,
    num_groups: usize,
) -> Tensor<B, 2> {
    let device = edge_scores.device();
    let num_edges = group_indices.dims()[0];

    let groups: Vec<usize> = group_indices
        .clone()
        .into_data()
        .iter::<i64>()
        .map(|g| g as usize)
        .collect();
    let scores = edge_scores.clone().detach().into_data();
    let mut group_max = vec![f32::NEG_INFINITY; num_groups];
    for (&g, score) in groups.iter().zip(scores.iter::<f32>()) {
        group_max[g] = group_max[g].max(score);
    }
    let shift: Vec<f32> = groups.iter().map(|&g| group_max[g]).collect();
    let shift = Tensor::<B, 2>::from_data(TensorData::new(shift, [num_edges, 1]), &device);

    let exp_scores = (edge_scores - shift).exp();
    let group_sum = scatter_add(exp_scores.clone(), group_indices.clone(), num_groups);
    let edge_sum = group_sum.select(0, group_indices);
    exp_scores / edge_sum
}

/// `1 / |segment|` per edge, for mean aggregation over segments.
///
/// - `segment_indices`: [num_edges], segment per edge
///
/// Returns: [num_edges]
pub fn inverse_segment_counts<B: Backend>(
    segment_indices: Tensor<B, 1, Int>,
    num_segments: usize,
) -> Tensor<B, 1> {
    let device = segment_indices.device();
    let num_edges = segment_indices.dims()[0];

    let ones = Tensor::<B, 2>::ones([num_edges, 1], &device);
    let counts = scatter_add(ones, segment_indices.clone(), num_segments);
    counts
        .select(0, segment_indices)
        .reshape([num_edges])
        .recip()
}

/// Host indices → device `Int` tensor.
pub fn index_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    Tensor::<B, 1, Int>::from_data(TensorData::new(data, [indices.len()]), device)
}

// ─── Tests ────────────────────────────────────────────────────────
