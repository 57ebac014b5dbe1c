//! Edge weighting over window candidates.
//!
//! A scorer turns encoder features [seq_len, batch, dim] plus each
//! dialogue's candidate edge set into a dense grid `w[b, i, j]` whose
//! non-zero entries are exactly the candidate edges, normalized so every
//! anchor's weights sum to 1.
//!
//! [`ScalarEdgeAttention`] is the model's scorer. [`NeighbourEdgeAttention`]
//! and [`MlpEdgeAttention`] are alternate neighbour-local strategies behind
//! the same trait.

use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::softmax;

use super::gnn_ops::{grouped_softmax, index_tensor, scatter_add};
use crate::error::Error;
use crate::graph::window::EdgeSet;

/// Capability shared by edge weighting strategies.
pub trait EdgeScorer<B: Backend> {
    /// Weight grid [batch, rows, seq_len], read at `w[b, i, j]` for each
    /// candidate `(i, j)` of dialogue `b`.
    fn score_edges(
        &self,
        features: Tensor<B, 3>,
        lengths: &[usize],
        candidates: &[EdgeSet],
    ) -> crate::error::Result<Tensor<B, 3>>;
}

/// Check candidates against the batch and return the 0/1 grid
/// [batch, rows, cols].
///
/// Every anchor inside a dialogue needs at least one candidate, otherwise
/// its normalization would divide by zero.
pub fn candidate_mask<B: Backend>(
    lengths: &[usize],
    candidates: &[EdgeSet],
    rows: usize,
    cols: usize,
    device: &B::Device,
) -> crate::error::Result<Tensor<B, 3>> {
    check_candidates(lengths, candidates)?;
    let batch = lengths.len();
    let mut data = vec![0.0f32; batch * rows * cols];
    for (b, edges) in candidates.iter().enumerate() {
        for &(i, j) in edges {
            if i >= rows || j >= cols {
                return Err(Error::ShapeMismatch {
                    what: "candidate edge",
                    expected: format!("inside [{}, {}]", rows, cols),
                    got: format!("({}, {})", i, j),
                });
            }
            data[(b * rows + i) * cols + j] = 1.0;
        }
    }
    Ok(Tensor::<B, 3>::from_data(
        TensorData::new(data, [batch, rows, cols]),
        device,
    ))
}

fn check_candidates(lengths: &[usize], candidates: &[EdgeSet]) -> crate::error::Result<()> {
    if candidates.len() != lengths.len() {
        return Err(Error::ShapeMismatch {
            what: "candidate edge sets",
            expected: lengths.len().to_string(),
            got: candidates.len().to_string(),
        });
    }
    for (dialogue, (edges, &length)) in candidates.iter().zip(lengths).enumerate() {
        let mut has_edge = vec![false; length];
        for &(i, j) in edges {
            if i >= length || j >= length {
                return Err(Error::ShapeMismatch {
                    what: "candidate edge",
                    expected: format!("endpoints below {}", length),
                    got: format!("({}, {})", i, j),
                });
            }
            has_edge[i] = true;
        }
        if let Some(anchor) = has_edge.iter().position(|&h| !h) {
            return Err(Error::EmptyCandidateSet { dialogue, anchor });
        }
    }
    Ok(())
}

fn check_batch(features_batch: usize, lengths: &[usize]) -> crate::error::Result<()> {
    if lengths.len() != features_batch {
        return Err(Error::ShapeMismatch {
            what: "lengths",
            expected: features_batch.to_string(),
            got: lengths.len().to_string(),
        });
    }
    Ok(())
}

// ─── Scalar attention ─────────────────────────────────────────────

/// Configuration for [`ScalarEdgeAttention`].
#[derive(Config, Debug)]
pub struct ScalarEdgeAttentionConfig {
    /// Encoder feature width.
    pub input_dim: usize,
    /// Score slots per timestep; bounds the padded sequence length.
    pub max_seq_len: usize,
}

/// Learned per-timestep scoring, normalized over the time axis.
///
/// `scale = W·x_t` gives `max_seq_len` scores per timestep. Softmax runs
/// over time for each slot, then the grid is permuted to
/// [batch, slot, time] so slot `i` reads as the anchor and time `j` as the
/// target. Non-candidates are zeroed and each anchor row renormalized.
#[derive(Module, Debug)]
pub struct ScalarEdgeAttention<B: Backend> {
    scalar: Linear<B>,
    max_seq_len: usize,
}

impl ScalarEdgeAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ScalarEdgeAttention<B> {
        ScalarEdgeAttention {
            scalar: LinearConfig::new(self.input_dim, self.max_seq_len)
                .with_bias(false)
                .init(device),
            max_seq_len: self.max_seq_len,
        }
    }
}

impl<B: Backend> ScalarEdgeAttention<B> {
    /// The `dim → max_seq_len` scoring projection.
    pub fn scoring(&self) -> &Linear<B> {
        &self.scalar
    }
}

impl<B: Backend> EdgeScorer<B> for ScalarEdgeAttention<B> {
    fn score_edges(
        &self,
        features: Tensor<B, 3>,
        lengths: &[usize],
        candidates: &[EdgeSet],
    ) -> crate::error::Result<Tensor<B, 3>> {
        let device = features.device();
        let [seq_len, batch, _] = features.dims();
        check_batch(batch, lengths)?;
        if seq_len > self.max_seq_len {
            return Err(Error::SequenceTooLong {
                seq_len,
                max_seq_len: self.max_seq_len,
            });
        }
        let mask = candidate_mask::<B>(lengths, candidates, self.max_seq_len, seq_len, &device)?;
        let shape = [batch, self.max_seq_len, seq_len];

        let scale = self.scalar.forward(features); // [S, B, M]
        let alpha = softmax(scale, 0).permute([1, 2, 0]); // [B, M, S]

        let masked = alpha * mask.clone();
        let sums = masked.clone().sum_dim(2); // [B, M, 1]
        check_anchor_mass(&sums, lengths, self.max_seq_len)?;
        // Rows without candidates (padding slots) divide by 1 instead of 0.
        let empty_rows = mask.sum_dim(2).clamp_max(1.0).neg().add_scalar(1.0);
        let denom = (sums + empty_rows).expand(shape);

        Ok(masked / denom)
    }
}

/// Softmax over time can underflow every candidate of an anchor to 0,
/// which would turn the renormalization into 0/0.
fn check_anchor_mass<B: Backend>(sums: &Tensor<B, 3>, lengths: &[usize], rows: usize) -> crate::error::Result<()> {
    let mass: Vec<f32> = sums.clone().detach().into_data().iter::<f32>().collect();
    for (dialogue, &length) in lengths.iter().enumerate() {
        let degenerate = |i: usize| {
            let m = mass[dialogue * rows + i];
            m <= 0.0 || m.is_nan()
        };
        if let Some(anchor) = (0..length).find(|&i| degenerate(i)) {
            return Err(Error::DegenerateAttention { dialogue, anchor });
        }
    }
    Ok(())
}

// ─── Neighbour-local attention ────────────────────────────────────

/// Configuration for [`NeighbourEdgeAttention`].
#[derive(Config, Debug)]
pub struct NeighbourEdgeAttentionConfig {
    /// Encoder feature width.
    pub input_dim: usize,
}

/// Softmax over each anchor's own neighbours of a learned target score.
///
/// Unlike [`ScalarEdgeAttention`] the normalization never leaves the
/// candidate set, and the output grid is [batch, seq_len, seq_len].
#[derive(Module, Debug)]
pub struct NeighbourEdgeAttention<B: Backend> {
    scalar: Linear<B>,
}

impl NeighbourEdgeAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> NeighbourEdgeAttention<B> {
        NeighbourEdgeAttention {
            scalar: LinearConfig::new(self.input_dim, 1)
                .with_bias(false)
                .init(device),
        }
    }
}

impl<B: Backend> EdgeScorer<B> for NeighbourEdgeAttention<B> {
    fn score_edges(
        &self,
        features: Tensor<B, 3>,
        lengths: &[usize],
        candidates: &[EdgeSet],
    ) -> crate::error::Result<Tensor<B, 3>> {
        let device = features.device();
        let [seq_len, batch, _] = features.dims();
        check_batch(batch, lengths)?;
        check_candidates(lengths, candidates)?;

        let layout = EdgeLayout::new(candidates, batch, seq_len);
        // [S, B, 1] → [S·B, 1], row t·B + b
        let scores = self.scalar.forward(features).reshape([seq_len * batch, 1]);
        let edge_scores = scores.select(0, index_tensor::<B>(&layout.target_rows, &device));
        Ok(layout.normalize(edge_scores, &device))
    }
}

/// Flat indices for per-edge scoring over a [seq_len, batch] feature grid.
struct EdgeLayout {
    /// Feature row `t·B + b` of each edge's target.
    target_rows: Vec<usize>,
    /// Feature row of each edge's anchor.
    anchor_rows: Vec<usize>,
    /// Softmax group `b·S + i` of each edge.
    groups: Vec<usize>,
    /// Cell `(b·S + i)·S + j` of the output grid.
    cells: Vec<usize>,
    batch: usize,
    seq_len: usize,
}

impl EdgeLayout {
    fn new(candidates: &[EdgeSet], batch: usize, seq_len: usize) -> Self {
        let mut layout = EdgeLayout {
            target_rows: Vec::new(),
            anchor_rows: Vec::new(),
            groups: Vec::new(),
            cells: Vec::new(),
            batch,
            seq_len,
        };
        for (b, edges) in candidates.iter().enumerate() {
            for &(i, j) in edges {
                layout.target_rows.push(j * batch + b);
                layout.anchor_rows.push(i * batch + b);
                layout.groups.push(b * seq_len + i);
                layout.cells.push((b * seq_len + i) * seq_len + j);
            }
        }
        layout
    }

    /// Softmax each anchor's edge scores [E, 1] and lay them out as
    /// [batch, seq_len, seq_len].
    fn normalize<B: Backend>(&self, edge_scores: Tensor<B, 2>, device: &B::Device) -> Tensor<B, 3> {
        let (batch, seq_len) = (self.batch, self.seq_len);
        let weights = grouped_softmax(
            edge_scores,
            index_tensor::<B>(&self.groups, device),
            batch * seq_len,
        );
        scatter_add(
            weights,
            index_tensor::<B>(&self.cells, device),
            batch * seq_len * seq_len,
        )
        .reshape([batch, seq_len, seq_len])
    }
}

// ─── Concat-MLP attention ─────────────────────────────────────────

/// Configuration for [`MlpEdgeAttention`].
#[derive(Config, Debug)]
pub struct MlpEdgeAttentionConfig {
    /// Encoder feature width.
    pub input_dim: usize,
    /// Key/query projection width; the input width when unset.
    pub hidden_dim: Option<usize>,
}

/// Additive attention: `score(i → j) = tanh(w · [W_k·x_j ‖ W_q·x_i])`,
/// softmax-normalized over each anchor's candidates.
#[derive(Module, Debug)]
pub struct MlpEdgeAttention<B: Backend> {
    key: Linear<B>,
    query: Linear<B>,
    /// [2·hidden_dim], key half first.
    weight: Param<Tensor<B, 1>>,
    hidden_dim: usize,
}

impl MlpEdgeAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpEdgeAttention<B> {
        let hidden_dim = self.hidden_dim.unwrap_or(self.input_dim);
        let bound = 1.0 / (hidden_dim as f64).sqrt();
        MlpEdgeAttention {
            key: LinearConfig::new(self.input_dim, hidden_dim).init(device),
            query: LinearConfig::new(self.input_dim, hidden_dim).init(device),
            weight: Initializer::Uniform {
                min: -bound,
                max: bound,
            }
            .init([2 * hidden_dim], device),
            hidden_dim,
        }
    }
}

impl<B: Backend> EdgeScorer<B> for MlpEdgeAttention<B> {
    fn score_edges(
        &self,
        features: Tensor<B, 3>,
        lengths: &[usize],
        candidates: &[EdgeSet],
    ) -> crate::error::Result<Tensor<B, 3>> {
        let device = features.device();
        let [seq_len, batch, _] = features.dims();
        check_batch(batch, lengths)?;
        check_candidates(lengths, candidates)?;
        let layout = EdgeLayout::new(candidates, batch, seq_len);

        let h = self.hidden_dim;
        let rows = seq_len * batch;
        let weight = self.weight.val();
        let w_key = weight.clone().slice([0..h]).reshape([h, 1]);
        let w_query = weight.slice([h..2 * h]).reshape([h, 1]);

        // The concat dot product splits into a key term and a query term.
        let key_scores = self
            .key
            .forward(features.clone())
            .reshape([rows, h])
            .matmul(w_key);
        let query_scores = self.query.forward(features).reshape([rows, h]).matmul(w_query);

        let edge_scores = (key_scores.select(0, index_tensor::<B>(&layout.target_rows, &device))
            + query_scores.select(0, index_tensor::<B>(&layout.anchor_rows, &device)))
        .tanh();
        Ok(layout.normalize(edge_scores, &device))
    }
}
