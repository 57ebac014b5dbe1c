//! Two-layer graph convolution over the batch graph.
//!
//! Layer 1 is relation-aware: every relation label owns a weight matrix
//! built from a small shared basis, messages are scaled by the edge's
//! attention weight and averaged per (target, relation). Layer 2 ignores
//! relations and sums neighbours. The stack returns `[x, layer2(layer1(x))]`.

use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;

use super::gnn_ops::{inverse_segment_counts, scatter_add};
use crate::graph::batch::BatchGraph;

// ─── Configuration ────────────────────────────────────────────────

/// Relational convolution configuration.
#[derive(Config, Debug)]
pub struct RelationalGraphConvConfig {
    pub d_in: usize,
    pub d_out: usize,
    /// Number of relation labels.
    pub num_relations: usize,
    /// Shared basis matrices the relation weights are mixed from.
    #[config(default = 30)]
    pub num_bases: usize,
}

/// Relation-agnostic convolution configuration.
#[derive(Config, Debug)]
pub struct GraphConvConfig {
    pub d_in: usize,
    pub d_out: usize,
}

/// Two-layer stack configuration.
#[derive(Config, Debug)]
pub struct RelationalConvStackConfig {
    /// Node feature width.
    pub d_in: usize,
    /// Width of both convolution outputs.
    #[config(default = 64)]
    pub hidden_size: usize,
    pub num_relations: usize,
    #[config(default = 30)]
    pub num_bases: usize,
}

// ─── Relational convolution ───────────────────────────────────────

/// Basis-decomposed relational graph convolution.
///
/// `h_t = W_root·x_t + b + Σ_r mean_{s→t, rel r}(w_st · W_r·x_s)` with
/// `W_r = Σ_b comp[r, b]·basis[b]`.
#[derive(Module, Debug)]
pub struct RelationalGraphConv<B: Backend> {
    /// [num_bases, d_in, d_out]
    bases: Param<Tensor<B, 3>>,
    /// [num_relations, num_bases]
    comp: Param<Tensor<B, 2>>,
    /// Self connection with bias.
    root: Linear<B>,
    num_relations: usize,
}

impl RelationalGraphConvConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RelationalGraphConv<B> {
        let bound = 1.0 / (self.d_in as f64).sqrt();
        let comp_bound = 1.0 / (self.num_bases as f64).sqrt();
        RelationalGraphConv {
            bases: Initializer::Uniform {
                min: -bound,
                max: bound,
            }
            .init([self.num_bases, self.d_in, self.d_out], device),
            comp: Initializer::Uniform {
                min: -comp_bound,
                max: comp_bound,
            }
            .init([self.num_relations, self.num_bases], device),
            root: LinearConfig::new(self.d_in, self.d_out).init(device),
            num_relations: self.num_relations,
        }
    }
}

impl<B: Backend> RelationalGraphConv<B> {
    /// Per-relation weights [num_relations, d_in, d_out].
    pub fn relation_weights(&self) -> Tensor<B, 3> {
        let [num_bases, d_in, d_out] = self.bases.val().dims();
        self.comp
            .val()
            .matmul(self.bases.val().reshape([num_bases, d_in * d_out]))
            .reshape([self.num_relations, d_in, d_out])
    }

    /// - `x`: [N, d_in]
    /// - `src_indices`, `dst_indices`, `edge_types`: [E]
    /// - `edge_weights`: [E]
    ///
    /// Returns: [N, d_out]
    pub fn forward(
        &self,
        x: Tensor<B, 2>,
        src_indices: Tensor<B, 1, Int>,
        dst_indices: Tensor<B, 1, Int>,
        edge_types: Tensor<B, 1, Int>,
        edge_weights: Tensor<B, 1>,
    ) -> Tensor<B, 2> {
        let [num_nodes, d_in] = x.dims();
        let num_edges = src_indices.dims()[0];
        let weights = self.relation_weights();
        let d_out = weights.dims()[2];
        let r = self.num_relations;

        // Every node under every relation: [R, N, d_out] → [R·N, d_out]
        let table = x
            .clone()
            .unsqueeze_dim::<3>(0)
            .expand([r, num_nodes, d_in])
            .matmul(weights)
            .reshape([r * num_nodes, d_out]);

        let rows = edge_types.clone().mul_scalar(num_nodes as i64) + src_indices;
        let segments = dst_indices.clone().mul_scalar(r as i64) + edge_types;
        let norm = inverse_segment_counts(segments, num_nodes * r);
        let scale = (edge_weights * norm)
            .unsqueeze_dim::<2>(1)
            .expand([num_edges, d_out]);

        let messages = table.select(0, rows) * scale;
        scatter_add(messages, dst_indices, num_nodes) + self.root.forward(x)
    }
}

// ─── Plain graph convolution ──────────────────────────────────────

/// `h_t = W_rel·Σ_{s→t} x_s + b + W_root·x_t`.
#[derive(Module, Debug)]
pub struct GraphConv<B: Backend> {
    rel: Linear<B>,
    root: Linear<B>,
}

impl GraphConvConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GraphConv<B> {
        GraphConv {
            rel: LinearConfig::new(self.d_in, self.d_out).init(device),
            root: LinearConfig::new(self.d_in, self.d_out)
                .with_bias(false)
                .init(device),
        }
    }
}

impl<B: Backend> GraphConv<B> {
    pub fn forward(
        &self,
        x: Tensor<B, 2>,
        src_indices: Tensor<B, 1, Int>,
        dst_indices: Tensor<B, 1, Int>,
    ) -> Tensor<B, 2> {
        let num_nodes = x.dims()[0];
        let messages = x.clone().select(0, src_indices);
        let aggregated = scatter_add(messages, dst_indices, num_nodes);
        self.rel.forward(aggregated) + self.root.forward(x)
    }
}

// ─── Stack ────────────────────────────────────────────────────────

/// Relational layer, plain layer, residual concat.
#[derive(Module, Debug)]
pub struct RelationalConvStack<B: Backend> {
    relational: RelationalGraphConv<B>,
    plain: GraphConv<B>,
}

impl RelationalConvStackConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RelationalConvStack<B> {
        RelationalConvStack {
            relational: RelationalGraphConvConfig::new(self.d_in, self.hidden_size, self.num_relations)
                .with_num_bases(self.num_bases)
                .init(device),
            plain: GraphConvConfig::new(self.hidden_size, self.hidden_size).init(device),
        }
    }

    /// Width of the stack's output.
    pub fn d_out(&self) -> usize {
        self.d_in + self.hidden_size
    }
}

impl<B: Backend> RelationalConvStack<B> {
    /// Returns: [N, d_in + hidden_size]
    pub fn forward(&self, graph: &BatchGraph<B>) -> Tensor<B, 2> {
        let x = graph.node_features.clone();
        let h = self.relational.forward(
            x.clone(),
            graph.src_indices.clone(),
            graph.dst_indices.clone(),
            graph.edge_types.clone(),
            graph.edge_weights.clone(),
        );
        let out = self
            .plain
            .forward(h, graph.src_indices.clone(), graph.dst_indices.clone());
        Tensor::cat(vec![x, out], 1)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
