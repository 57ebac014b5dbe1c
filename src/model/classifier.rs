//! Self-attentive pooling and emotion classification head.
//!
//! Attention spans every node of the batch graph, not just the node's own
//! dialogue: `beta = softmax((W_β·x + b)·xᵀ)` row-wise over all N nodes.
//! That cross-dialogue mixing is a property of the trained model and is
//! kept as is.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{log_softmax, relu, softmax};

/// Classifier configuration.
#[derive(Config, Debug)]
pub struct SelfAttentiveClassifierConfig {
    /// Node feature width (convolution stack output).
    pub d_in: usize,
    /// Hidden layer width.
    #[config(default = 64)]
    pub hidden_size: usize,
    /// Number of emotion classes.
    #[config(default = 7)]
    pub num_classes: usize,
    /// Dropout after the hidden layer.
    #[config(default = 0.5)]
    pub dropout: f64,
}

/// Global node attention, then `Linear → ReLU → Dropout → Linear → log-softmax`.
#[derive(Module, Debug)]
pub struct SelfAttentiveClassifier<B: Backend> {
    beta_proj: Linear<B>,
    hidden: Linear<B>,
    dropout: Dropout,
    output: Linear<B>,
}

impl SelfAttentiveClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SelfAttentiveClassifier<B> {
        SelfAttentiveClassifier {
            beta_proj: LinearConfig::new(self.d_in, self.d_in).init(device),
            hidden: LinearConfig::new(self.d_in, self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
        }
    }
}

impl<B: Backend> SelfAttentiveClassifier<B> {
    /// Node-to-node attention [N, N]; every row sums to 1.
    pub fn attention(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let projected = self.beta_proj.forward(x.clone());
        softmax(projected.matmul(x.transpose()), 1)
    }

    /// - `x`: [N, d_in]
    ///
    /// Returns: [N, num_classes] log-probabilities.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let beta = self.attention(x.clone());
        let pooled = beta.matmul(x);
        let hidden = self.dropout.forward(relu(self.hidden.forward(pooled)));
        log_softmax(self.output.forward(hidden), 1)
    }
}
