//! Cost functions.

use std::fmt;

use clap::ValueEnum;
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::activation::sigmoid_prime;
use crate::error::{ConfigurationError, Result};
use crate::linalg::Vector;
use crate::minibatch::Minibatch;
use crate::network::Network;
use crate::traits::CostFunction;

/// Activations are kept this far from 0 and 1 before taking logarithms.
const LOG_CLAMP: f64 = 1e-12;

fn check_target(network: &Network, target: &Vector, mb: &Minibatch) -> Result<()> {
    network.check_minibatch(mb)?;
    if target.len() != network.num_outputs() {
        return Err(ConfigurationError::len_mismatch(
            network.num_outputs(),
            target.len(),
        ));
    }
    Ok(())
}

/// Mean squared error, `C = 1/(2n) Σ ‖a − y‖²`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadraticCost;

impl fmt::Display for QuadraticCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Quadratic")
    }
}

impl CostFunction for QuadraticCost {
    fn sample_cost(&self, a: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        let mut sum = 0.0;
        Zip::from(a).and(y).for_each(|&a, &y| sum += (a - y) * (a - y));
        0.5 * sum
    }

    // delta[L] = (a[L] − y) ⊙ σ'(z[L])
    fn calculate_error_in_output_layer(
        &self,
        network: &Network,
        target: &Vector,
        mb: &mut Minibatch,
    ) -> Result<()> {
        check_target(network, target, mb)?;
        let l = network.output_layer();
        Zip::from(&mut mb.delta[l])
            .and(&mb.a[l])
            .and(&mb.z[l])
            .and(target)
            .for_each(|d, &a, &z, &y| *d = (a - y) * sigmoid_prime(z));
        Ok(())
    }
}

/// Cross-entropy cost for sigmoid outputs,
/// `C = −1/n Σ Σⱼ [yⱼ ln aⱼ + (1 − yⱼ) ln(1 − aⱼ)]`.
///
/// Its derivative with respect to `a` has a `1 / σ'(z)` factor that cancels
/// the `σ'(z)` from the output layer, so `delta[L] = a[L] − y`. Learning does
/// not slow down when output neurons saturate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyCost;

impl fmt::Display for CrossEntropyCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cross-Entropy")
    }
}

impl CostFunction for CrossEntropyCost {
    fn sample_cost(&self, a: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        let mut sum = 0.0;
        Zip::from(a).and(y).for_each(|&a, &y| {
            let a = a.clamp(LOG_CLAMP, 1.0 - LOG_CLAMP);
            sum += y * a.ln() + (1.0 - y) * (1.0 - a).ln();
        });
        -sum
    }

    // delta[L] = a[L] − y
    fn calculate_error_in_output_layer(
        &self,
        network: &Network,
        target: &Vector,
        mb: &mut Minibatch,
    ) -> Result<()> {
        check_target(network, target, mb)?;
        let l = network.output_layer();
        Zip::from(&mut mb.delta[l])
            .and(&mb.a[l])
            .and(target)
            .for_each(|d, &a, &y| *d = a - y);
        Ok(())
    }
}

/// Cost function selection, for front ends and configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum CostKind {
    #[default]
    Quadratic,
    CrossEntropy,
}

impl CostKind {
    pub fn cost_function(self) -> &'static dyn CostFunction {
        match self {
            CostKind::Quadratic => &QuadraticCost,
            CostKind::CrossEntropy => &CrossEntropyCost,
        }
    }
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.cost_function(), f)
    }
}
