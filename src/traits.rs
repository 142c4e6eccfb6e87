use std::fmt::{Debug, Display};

use ndarray::prelude::*;

use crate::error::{ConfigurationError, Result};
use crate::linalg::{self, Matrix, Vector};
use crate::minibatch::Minibatch;
use crate::network::Network;
use crate::sample::TrainingSample;

/// A cost function `C` measuring how far a network's output is from what
/// the training samples expect.
///
/// Implementors supply the per-sample cost and the output-layer error
/// `delta[L] = ∂C/∂z[L]`. Everything else (the regularized total cost, and
/// the gradients with respect to any layer's weights and biases) follows
/// from those two.
pub trait CostFunction: Debug + Display + Send + Sync {
    /// Cost of a single sample with output activations `a` and target `y`,
    /// without regularization.
    fn sample_cost(&self, a: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64;

    /// Set `delta[L]` in `mb` from the output activations already computed
    /// by `Network::feedforward`.
    fn calculate_error_in_output_layer(
        &self,
        network: &Network,
        target: &Vector,
        mb: &mut Minibatch,
    ) -> Result<()>;

    /// Mean cost over `samples` plus the L2 term
    /// `lambda / (2n) · Σ w²`.
    fn evaluate(&self, network: &Network, lambda: f64, samples: &[TrainingSample]) -> Result<f64> {
        if samples.is_empty() {
            return Err(ConfigurationError::NoSamples);
        }
        let mut mb = Minibatch::new(network.nodes());
        let mut cost = 0.0;
        for sample in samples {
            network.set_input_activations(&sample.input, &mut mb)?;
            network.feedforward(&mut mb)?;
            let y = sample.target(network.num_outputs())?;
            cost += self.sample_cost(network.output_activations(&mb)?.view(), y.view());
        }
        let n = samples.len() as f64;
        Ok(cost / n + lambda / (2.0 * n) * network.weights_squared())
    }

    /// `∂C/∂b` for `layer`, averaged over `samples`.
    fn grad_bias(
        &self,
        layer: usize,
        network: &Network,
        samples: &[TrainingSample],
    ) -> Result<Vector> {
        let mut db = Vector::zeros(network.biases(layer)?.len());
        if samples.is_empty() {
            return Err(ConfigurationError::NoSamples);
        }
        let mut mb = Minibatch::new(network.nodes());
        for sample in samples {
            network.backpropagate_sample(sample, self, &mut mb)?;
            db += &mb.delta[layer];
        }
        linalg::scale_in_place(&mut db, 1.0 / samples.len() as f64);
        Ok(db)
    }

    /// `∂C/∂w` for `layer`, averaged over `samples`, including the
    /// derivative `(lambda / n) · w` of the regularization term.
    fn grad_weight(
        &self,
        layer: usize,
        lambda: f64,
        network: &Network,
        samples: &[TrainingSample],
    ) -> Result<Matrix> {
        let w = network.weights(layer)?;
        if samples.is_empty() {
            return Err(ConfigurationError::NoSamples);
        }
        let mut dw = Matrix::zeros(w.raw_dim());
        let mut mb = Minibatch::new(network.nodes());
        for sample in samples {
            network.backpropagate_sample(sample, self, &mut mb)?;
            dw += &linalg::outer(&mb.delta[layer], &mb.a[layer - 1]);
        }
        let n = samples.len() as f64;
        linalg::scale_in_place(&mut dw, 1.0 / n);
        dw.scaled_add(lambda / n, w);
        Ok(dw)
    }
}
