//! Negative log-likelihood over flattened node log-probabilities.
//!
//! Nodes come out of the model already stripped of padding, so no mask is
//! needed: targets are the per-dialogue, per-position labels flattened in
//! the same order as the batch graph's nodes.

use burn::prelude::*;

/// Mean NLL, or the class-weighted mean when `class_weights` is given
/// (sum of weighted losses over the sum of the targets' weights).
///
/// - `log_probs`: [N, C]
/// - `targets`: [N]
/// - `class_weights`: [C]
///
/// Returns: [1]
pub fn nll_loss<B: Backend>(
    log_probs: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    class_weights: Option<Tensor<B, 1>>,
) -> Tensor<B, 1> {
    let num_nodes = targets.dims()[0];
    let picked = log_probs
        .gather(1, targets.clone().unsqueeze_dim::<2>(1))
        .reshape([num_nodes]);

    match class_weights {
        Some(weights) => {
            let w = weights.select(0, targets);
            (picked * w.clone()).sum().neg() / w.sum()
        }
        None => picked.mean().neg(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn scalar(t: Tensor<B, 1>) -> f32 {
        t.into_data().to_vec::<f32>().unwrap()[0]
    }

    #[test]
    fn unweighted_is_mean_of_picked() {
        let device = Default::default();
        let lp = Tensor::<B, 2>::from_floats([[-0.1, -2.0], [-3.0, -0.5]], &device);
        let targets = Tensor::<B, 1, Int>::from_ints([0, 1], &device);
        let loss = scalar(nll_loss(lp, targets, None));
        assert!((loss - 0.3).abs() < 1e-6, "{}", loss);
    }

    #[test]
    fn weighted_divides_by_target_weights() {
        let device = Default::default();
        let lp = Tensor::<B, 2>::from_floats([[-1.0, -2.0], [-3.0, -4.0]], &device);
        let targets = Tensor::<B, 1, Int>::from_ints([0, 1], &device);
        let weights = Tensor::<B, 1>::from_floats([1.0, 3.0], &device);
        let loss = scalar(nll_loss(lp, targets, Some(weights)));
        // (1·1 + 3·4) / (1 + 3)
        assert!((loss - 13.0 / 4.0).abs() < 1e-6, "{}", loss);
    }
}
