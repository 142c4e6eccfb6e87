use ndarray::linalg::general_mat_vec_mul;
use ndarray::prelude::*;
use ndarray::Zip;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activation::{argmax, sigmoid, sigmoid_prime};
use crate::error::{ConfigurationError, Result};
use crate::linalg::{self, Matrix, Vector};
use crate::minibatch::Minibatch;
use crate::sample::TrainingSample;
use crate::CostFunction;

/// A fully connected feedforward network of sigmoid neurons.
///
/// Layer 0 is the input layer. Every other layer `l` has a bias vector of
/// `nodes[l]` entries and a weight matrix of shape `(nodes[l], nodes[l-1])`,
/// so `w[l][(i, j)]` connects node `j` of layer `l-1` to node `i` of layer
/// `l`.
///
/// Serializes as `(nodes, biases, weights, lambda)`, in that order.
/// Deserializing re-checks the shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkParts")]
pub struct Network {
    /// Number of nodes in each layer.
    nodes: Vec<usize>,

    /// `biases[l - 1]` belongs to layer `l`.
    biases: Vec<Vector>,

    /// `weights[l - 1]` maps layer `l - 1` activations into layer `l`.
    weights: Vec<Matrix>,

    /// L2 regularization parameter this network was last trained with.
    lambda: f64,
}

#[derive(Deserialize)]
struct NetworkParts {
    nodes: Vec<usize>,
    biases: Vec<Vector>,
    weights: Vec<Matrix>,
    lambda: f64,
}

impl TryFrom<NetworkParts> for Network {
    type Error = ConfigurationError;

    fn try_from(parts: NetworkParts) -> Result<Self> {
        Network::from_parameters(parts.nodes, parts.biases, parts.weights, parts.lambda)
    }
}

/// `∂C/∂w` and `∂C/∂b` for every layer, shaped like the network's
/// parameters. Index `l - 1` holds layer `l`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub dw: Vec<Matrix>,
    pub db: Vec<Vector>,
}

impl Gradients {
    pub fn zeros(nodes: &[usize]) -> Self {
        Gradients {
            dw: nodes
                .windows(2)
                .map(|w| Matrix::zeros((w[1], w[0])))
                .collect(),
            db: nodes.iter().skip(1).map(|&n| Vector::zeros(n)).collect(),
        }
    }

    pub fn weights(&self, layer: usize) -> Result<&Matrix> {
        layer
            .checked_sub(1)
            .and_then(|i| self.dw.get(i))
            .ok_or(ConfigurationError::InvalidLayer {
                layer,
                layers: self.dw.len() + 1,
            })
    }

    pub fn biases(&self, layer: usize) -> Result<&Vector> {
        layer
            .checked_sub(1)
            .and_then(|i| self.db.get(i))
            .ok_or(ConfigurationError::InvalidLayer {
                layer,
                layers: self.db.len() + 1,
            })
    }

    /// Euclidean norm of the whole gradient, weights and biases together.
    pub fn norm(&self) -> f64 {
        let w: f64 = self.dw.iter().map(linalg::sum_of_squares).sum();
        let b: f64 = self.db.iter().map(linalg::sum_of_squares).sum();
        (w + b).sqrt()
    }
}

fn check_topology(nodes: &[usize]) -> Result<()> {
    if nodes.len() < 2 {
        return Err(ConfigurationError::InvalidTopology(format!(
            "need an input and an output layer, got {} layer(s)",
            nodes.len()
        )));
    }
    if let Some(layer) = nodes.iter().position(|&n| n == 0) {
        return Err(ConfigurationError::InvalidTopology(format!(
            "layer {layer} has no nodes"
        )));
    }
    Ok(())
}

impl Network {
    /// Create a network with the given layer sizes. All weights and biases
    /// start at zero; see `initialize_weights_and_biases`.
    pub fn new(nodes: &[usize], lambda: f64) -> Result<Self> {
        check_topology(nodes)?;
        let grads = Gradients::zeros(nodes);
        Ok(Network {
            nodes: nodes.to_vec(),
            biases: grads.db,
            weights: grads.dw,
            lambda,
        })
    }

    /// Assemble a network from existing parameters, checking every shape.
    pub fn from_parameters(
        nodes: Vec<usize>,
        biases: Vec<Vector>,
        weights: Vec<Matrix>,
        lambda: f64,
    ) -> Result<Self> {
        check_topology(&nodes)?;
        let layers = nodes.len() - 1;
        if biases.len() != layers {
            return Err(ConfigurationError::len_mismatch(layers, biases.len()));
        }
        if weights.len() != layers {
            return Err(ConfigurationError::len_mismatch(layers, weights.len()));
        }
        for l in 1..nodes.len() {
            let b = &biases[l - 1];
            if b.len() != nodes[l] {
                return Err(ConfigurationError::len_mismatch(nodes[l], b.len()));
            }
            let w = &weights[l - 1];
            if w.shape() != [nodes[l], nodes[l - 1]] {
                return Err(ConfigurationError::shape_mismatch(
                    &[nodes[l], nodes[l - 1]],
                    w.shape(),
                ));
            }
        }
        Ok(Network {
            nodes,
            biases,
            weights,
            lambda,
        })
    }

    /// Draw every weight and bias uniformly from `[0, 0.01)`.
    pub fn initialize_weights_and_biases<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let dist = Uniform::new(0.0f64, 0.01);
        for w in &mut self.weights {
            *w = Array::random_using(w.raw_dim(), &dist, rng);
        }
        for b in &mut self.biases {
            *b = Array::random_using(b.raw_dim(), &dist, rng);
        }
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Index `L` of the output layer.
    pub fn output_layer(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn num_inputs(&self) -> usize {
        self.nodes[0]
    }

    pub fn num_outputs(&self) -> usize {
        self.nodes[self.output_layer()]
    }

    pub fn num_weights(&self) -> usize {
        self.weights.iter().map(|w| w.len()).sum()
    }

    pub fn num_biases(&self) -> usize {
        self.biases.iter().map(|b| b.len()).sum()
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
    }

    fn layer_index(&self, layer: usize) -> Result<usize> {
        if layer == 0 || layer >= self.nodes.len() {
            return Err(ConfigurationError::InvalidLayer {
                layer,
                layers: self.nodes.len(),
            });
        }
        Ok(layer - 1)
    }

    pub fn weights(&self, layer: usize) -> Result<&Matrix> {
        let i = self.layer_index(layer)?;
        Ok(&self.weights[i])
    }

    /// Writable view of one layer's weights. The shape stays fixed.
    pub fn weights_mut(&mut self, layer: usize) -> Result<ArrayViewMut2<'_, f64>> {
        let i = self.layer_index(layer)?;
        Ok(self.weights[i].view_mut())
    }

    pub fn biases(&self, layer: usize) -> Result<&Vector> {
        let i = self.layer_index(layer)?;
        Ok(&self.biases[i])
    }

    pub fn biases_mut(&mut self, layer: usize) -> Result<ArrayViewMut1<'_, f64>> {
        let i = self.layer_index(layer)?;
        Ok(self.biases[i].view_mut())
    }

    fn check_weight_index(&self, i: usize, j: usize, layer: usize) -> Result<usize> {
        let l = self.layer_index(layer)?;
        if i >= self.nodes[layer] {
            return Err(ConfigurationError::InvalidIndex {
                index: i,
                len: self.nodes[layer],
                layer,
            });
        }
        if j >= self.nodes[layer - 1] {
            return Err(ConfigurationError::InvalidIndex {
                index: j,
                len: self.nodes[layer - 1],
                layer: layer - 1,
            });
        }
        Ok(l)
    }

    /// `w[layer][(i, j)]`, the weight from node `j` of layer `layer - 1` to
    /// node `i` of layer `layer`.
    pub fn weight(&self, i: usize, j: usize, layer: usize) -> Result<f64> {
        let l = self.check_weight_index(i, j, layer)?;
        Ok(self.weights[l][(i, j)])
    }

    pub fn set_weight(&mut self, value: f64, i: usize, j: usize, layer: usize) -> Result<()> {
        let l = self.check_weight_index(i, j, layer)?;
        self.weights[l][(i, j)] = value;
        Ok(())
    }

    fn check_bias_index(&self, i: usize, layer: usize) -> Result<usize> {
        let l = self.layer_index(layer)?;
        if i >= self.nodes[layer] {
            return Err(ConfigurationError::InvalidIndex {
                index: i,
                len: self.nodes[layer],
                layer,
            });
        }
        Ok(l)
    }

    pub fn bias(&self, i: usize, layer: usize) -> Result<f64> {
        let l = self.check_bias_index(i, layer)?;
        Ok(self.biases[l][i])
    }

    pub fn set_bias(&mut self, value: f64, i: usize, layer: usize) -> Result<()> {
        let l = self.check_bias_index(i, layer)?;
        self.biases[l][i] = value;
        Ok(())
    }

    /// Sum of the squares of all weights (biases excluded), the quantity
    /// L2 regularization penalizes.
    pub fn weights_squared(&self) -> f64 {
        self.weights.iter().map(linalg::sum_of_squares).sum()
    }

    /// Make sure every layer of `mb.z`, `mb.a` and `mb.delta` is sized for
    /// this topology.
    pub fn check_minibatch(&self, mb: &Minibatch) -> Result<()> {
        for (name, field) in [("z", &mb.z), ("a", &mb.a), ("delta", &mb.delta)] {
            if !field.iter().map(|v| v.len()).eq(self.nodes.iter().copied()) {
                let actual: Vec<usize> = field.iter().map(|v| v.len()).collect();
                return Err(ConfigurationError::DimensionMismatch {
                    expected: format!("{name} layer sizes {:?}", self.nodes),
                    actual: format!("{name} layer sizes {actual:?}"),
                });
            }
        }
        Ok(())
    }

    pub fn set_input_activations(&self, input: &Vector, mb: &mut Minibatch) -> Result<()> {
        if input.len() != self.nodes[0] {
            return Err(ConfigurationError::len_mismatch(self.nodes[0], input.len()));
        }
        self.check_minibatch(mb)?;
        mb.a[0].assign(input);
        Ok(())
    }

    // z[l] = w[l]·a[l-1] + b[l]. Shapes must already be checked.
    fn compute_z(&self, layer: usize, mb: &mut Minibatch) {
        general_mat_vec_mul(
            1.0,
            &self.weights[layer - 1],
            &mb.a[layer - 1],
            0.0,
            &mut mb.z[layer],
        );
        mb.z[layer] += &self.biases[layer - 1];
    }

    /// Fill in `z[layer]` from whatever `a[layer - 1]` currently holds,
    /// without touching `a[layer]`.
    pub fn calculate_z(&self, layer: usize, mb: &mut Minibatch) -> Result<()> {
        self.layer_index(layer)?;
        self.check_minibatch(mb)?;
        self.compute_z(layer, mb);
        Ok(())
    }

    fn feedforward_layer(&self, layer: usize, mb: &mut Minibatch) {
        self.compute_z(layer, mb);
        Zip::from(&mut mb.a[layer])
            .and(&mb.z[layer])
            .for_each(|a, &z| *a = sigmoid(z));
    }

    /// Compute `z` and `a` for every layer after the input layer.
    pub fn feedforward(&self, mb: &mut Minibatch) -> Result<()> {
        self.check_minibatch(mb)?;
        for layer in 1..self.nodes.len() {
            self.feedforward_layer(layer, mb);
        }
        Ok(())
    }

    /// Given `delta[L]`, compute `delta[l]` for every hidden layer.
    ///
    /// `delta[l] = (w[l+1]ᵗ · delta[l+1]) ⊙ σ'(z[l])`
    pub fn backpropagate_error(&self, mb: &mut Minibatch) -> Result<()> {
        self.check_minibatch(mb)?;
        for layer in (1..self.output_layer()).rev() {
            let (lower, upper) = mb.delta.split_at_mut(layer + 1);
            general_mat_vec_mul(
                1.0,
                &self.weights[layer].t(),
                &upper[0],
                0.0,
                &mut lower[layer],
            );
            Zip::from(&mut lower[layer])
                .and(&mb.z[layer])
                .for_each(|d, &z| *d *= sigmoid_prime(z));
        }
        Ok(())
    }

    /// Run one sample all the way through: set its input, feed forward,
    /// compute the output error with `cost`, and backpropagate.
    pub fn backpropagate_sample<C: CostFunction + ?Sized>(
        &self,
        sample: &TrainingSample,
        cost: &C,
        mb: &mut Minibatch,
    ) -> Result<()> {
        self.set_input_activations(&sample.input, mb)?;
        self.feedforward(mb)?;
        let target = sample.target(self.num_outputs())?;
        cost.calculate_error_in_output_layer(self, &target, mb)?;
        self.backpropagate_error(mb)
    }

    pub fn output_activations<'m>(&self, mb: &'m Minibatch) -> Result<&'m Vector> {
        self.check_minibatch(mb)?;
        Ok(&mb.a[self.output_layer()])
    }

    /// Average the per-sample derivatives stored in `mbs`:
    ///
    /// - `dw[l] = (1/m) Σ delta[l] ⊗ a[l-1]`
    /// - `db[l] = (1/m) Σ delta[l]`
    ///
    /// Each minibatch must already hold a backpropagated sample.
    pub fn calculate_derivatives(&self, mbs: &[Minibatch]) -> Result<Gradients> {
        if mbs.is_empty() {
            return Err(ConfigurationError::NoSamples);
        }
        let mut grads = Gradients::zeros(&self.nodes);
        for mb in mbs {
            self.check_minibatch(mb)?;
            for layer in 1..self.nodes.len() {
                let delta = &mb.delta[layer];
                let a_prev = &mb.a[layer - 1];
                Zip::from(grads.dw[layer - 1].rows_mut())
                    .and(delta)
                    .for_each(|mut row, &d| row.scaled_add(d, a_prev));
                grads.db[layer - 1] += delta;
            }
        }
        let scale = 1.0 / mbs.len() as f64;
        for dw in &mut grads.dw {
            linalg::scale_in_place(dw, scale);
        }
        for db in &mut grads.db {
            linalg::scale_in_place(db, scale);
        }
        Ok(grads)
    }

    /// One gradient-descent step with L2 weight decay. `n` is the size of
    /// the whole training set, not of the minibatch.
    ///
    /// - `w ← (1 − eta·lambda/n)·w − eta·dw`
    /// - `b ← b − eta·db`
    pub fn update_network(
        &mut self,
        eta: f64,
        lambda: f64,
        grads: &Gradients,
        n: usize,
    ) -> Result<()> {
        if n == 0 {
            return Err(ConfigurationError::NoSamples);
        }
        let layers = self.weights.len();
        if grads.dw.len() != layers || grads.db.len() != layers {
            return Err(ConfigurationError::len_mismatch(layers, grads.dw.len()));
        }
        for (w, dw) in self.weights.iter().zip(&grads.dw) {
            if w.shape() != dw.shape() {
                return Err(ConfigurationError::shape_mismatch(w.shape(), dw.shape()));
            }
        }
        for (b, db) in self.biases.iter().zip(&grads.db) {
            if b.len() != db.len() {
                return Err(ConfigurationError::len_mismatch(b.len(), db.len()));
            }
        }

        let decay = 1.0 - eta * lambda / n as f64;
        for (w, dw) in self.weights.iter_mut().zip(&grads.dw) {
            w.zip_mut_with(dw, |w, &dw| *w = decay * *w - eta * dw);
        }
        for (b, db) in self.biases.iter_mut().zip(&grads.db) {
            b.scaled_add(-eta, db);
        }
        Ok(())
    }

    /// Output activations for a single input.
    pub fn predict(&self, input: &Vector) -> Result<Vector> {
        let mut mb = Minibatch::new(&self.nodes);
        self.set_input_activations(input, &mut mb)?;
        self.feedforward(&mut mb)?;
        Ok(mb.a.swap_remove(self.output_layer()))
    }

    /// Index of the output node with the highest activation.
    pub fn classify(&self, input: &Vector) -> Result<usize> {
        Ok(argmax(self.predict(input)?.view()))
    }

    /// Fraction of `samples` whose predicted class matches the expected one.
    pub fn run_samples(&self, samples: &[TrainingSample]) -> Result<f64> {
        if samples.is_empty() {
            return Err(ConfigurationError::NoSamples);
        }
        let mut mb = Minibatch::new(&self.nodes);
        let mut correct = 0;
        for (index, sample) in samples.iter().enumerate() {
            self.set_input_activations(&sample.input, &mut mb)?;
            self.feedforward(&mut mb)?;
            let predicted = argmax(mb.a[self.output_layer()].view());
            let expected = sample.expected_class();
            if predicted == expected {
                correct += 1;
            } else {
                debug!(index, expected, predicted, "misclassified sample");
            }
        }
        Ok(correct as f64 / samples.len() as f64)
    }
}
