use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigurationError, Result};
use crate::minibatch::{create_minibatches, Minibatch};
use crate::network::Network;
use crate::sample::TrainingSample;
use crate::traits::CostFunction;

/// Hyperparameters for stochastic gradient descent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// Learning rate.
    pub eta: f64,
    /// L2 regularization parameter.
    pub lambda: f64,
    /// Samples per gradient step. Capped at the training set size.
    pub mini_batch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 30,
            eta: 3.0,
            lambda: 5.0,
            mini_batch_size: 10,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ConfigurationError::InvalidHyperparameter(
                "epochs must be at least 1".into(),
            ));
        }
        if self.mini_batch_size == 0 {
            return Err(ConfigurationError::InvalidHyperparameter(
                "mini_batch_size must be at least 1".into(),
            ));
        }
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(ConfigurationError::InvalidHyperparameter(format!(
                "eta must be positive, got {}",
                self.eta
            )));
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(ConfigurationError::InvalidHyperparameter(format!(
                "lambda must be non-negative, got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

/// What one epoch of training achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based.
    pub epoch: usize,
    pub training_accuracy: f64,
    pub validation_accuracy: Option<f64>,
    /// Regularized cost over the training set after the epoch.
    pub cost: f64,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {} - training accuracy {:.6}",
            self.epoch, self.training_accuracy
        )?;
        if let Some(v) = self.validation_accuracy {
            write!(f, " - validation accuracy {v:.6}")?;
        }
        write!(f, " - cost {:.6}", self.cost)
    }
}

/// Trains a `Network` with minibatch stochastic gradient descent.
///
/// The trainer owns the random generator used to shuffle samples each
/// epoch, so a seeded trainer reproduces the same run exactly. It also owns
/// one `Minibatch` scratch slot per sample in a minibatch; those are
/// allocated on first use and reused for every later minibatch and epoch.
pub struct Trainer<R = StdRng> {
    config: TrainingConfig,
    rng: R,
    slots: Vec<Minibatch>,
    epochs_done: usize,
}

impl Trainer<StdRng> {
    pub fn seeded(config: TrainingConfig, seed: u64) -> Self {
        Trainer::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Trainer<R> {
    pub fn new(config: TrainingConfig, rng: R) -> Self {
        Trainer {
            config,
            rng,
            slots: vec![],
            epochs_done: 0,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// The trainer's generator, e.g. for initializing the network it is
    /// about to train.
    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Run `config.epochs` epochs and report on each, numbered from 1.
    ///
    /// `validation` may be empty, in which case no validation accuracy is
    /// measured. Samples are checked against the topology once, before the
    /// first epoch.
    pub fn train<C: CostFunction + ?Sized>(
        &mut self,
        network: &mut Network,
        cost: &C,
        training: &[TrainingSample],
        validation: &[TrainingSample],
    ) -> Result<Vec<EpochReport>> {
        self.prepare(network, training, validation)?;
        self.epochs_done = 0;
        let size = self.config.mini_batch_size.min(training.len());
        info!(
            training = training.len(),
            validation = validation.len(),
            mini_batch_size = size,
            minibatches = (training.len() + size - 1) / size,
            eta = self.config.eta,
            lambda = self.config.lambda,
            cost = %cost,
            "starting training"
        );

        let mut reports = Vec::with_capacity(self.config.epochs);
        for _ in 0..self.config.epochs {
            reports.push(self.run_epoch(network, cost, training, validation)?);
        }
        Ok(reports)
    }

    /// Check the configuration and every sample against the network, record
    /// the regularization parameter on the network, and make sure there are
    /// scratch slots for a full minibatch.
    fn prepare(
        &mut self,
        network: &mut Network,
        training: &[TrainingSample],
        validation: &[TrainingSample],
    ) -> Result<()> {
        self.config.validate()?;
        if training.is_empty() {
            return Err(ConfigurationError::NoSamples);
        }
        let (inputs, outputs) = (network.num_inputs(), network.num_outputs());
        for sample in training.iter().chain(validation) {
            sample.check(inputs, outputs)?;
        }
        network.set_lambda(self.config.lambda);

        let size = self.config.mini_batch_size.min(training.len());
        let fits = self.slots.len() >= size
            && self
                .slots
                .first()
                .map_or(true, |mb| network.check_minibatch(mb).is_ok());
        if !fits {
            self.slots = create_minibatches(size, network.nodes());
        }
        Ok(())
    }

    /// One pass over a fresh random permutation of `training`, followed by
    /// accuracy and cost measurements.
    ///
    /// Epoch numbers continue from the previous `train` or `train_epoch`
    /// call on this trainer. Every call checks the samples again, since they
    /// may differ from the last call's.
    pub fn train_epoch<C: CostFunction + ?Sized>(
        &mut self,
        network: &mut Network,
        cost: &C,
        training: &[TrainingSample],
        validation: &[TrainingSample],
    ) -> Result<EpochReport> {
        self.prepare(network, training, validation)?;
        self.run_epoch(network, cost, training, validation)
    }

    // Expects `prepare` to have accepted these arguments.
    fn run_epoch<C: CostFunction + ?Sized>(
        &mut self,
        network: &mut Network,
        cost: &C,
        training: &[TrainingSample],
        validation: &[TrainingSample],
    ) -> Result<EpochReport> {
        let size = self.config.mini_batch_size.min(training.len());

        let mut indices: Vec<usize> = (0..training.len()).collect();
        indices.shuffle(&mut self.rng);
        for batch in indices.chunks(size) {
            self.train_minibatch(network, cost, training, batch)?;
        }

        self.epochs_done += 1;
        let report = EpochReport {
            epoch: self.epochs_done,
            training_accuracy: network.run_samples(training)?,
            validation_accuracy: if validation.is_empty() {
                None
            } else {
                Some(network.run_samples(validation)?)
            },
            cost: cost.evaluate(network, self.config.lambda, training)?,
        };
        info!("{report}");
        Ok(report)
    }

    // Every sample in `batch` gets its own slot, so they can run in
    // parallel. The reduction in `calculate_derivatives` walks the slots in
    // order, which keeps results independent of thread scheduling.
    fn train_minibatch<C: CostFunction + ?Sized>(
        &mut self,
        network: &mut Network,
        cost: &C,
        training: &[TrainingSample],
        batch: &[usize],
    ) -> Result<()> {
        let slots = &mut self.slots[..batch.len()];
        let net: &Network = network;
        slots
            .par_iter_mut()
            .zip(batch.par_iter())
            .try_for_each(|(mb, &i)| net.backpropagate_sample(&training[i], cost, mb))?;

        let grads = network.calculate_derivatives(slots)?;
        debug!(samples = batch.len(), gradient_norm = grads.norm(), "minibatch");
        network.update_network(
            self.config.eta,
            self.config.lambda,
            &grads,
            training.len(),
        )
    }
}
