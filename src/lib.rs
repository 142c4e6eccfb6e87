mod activation;
pub use activation::{argmax, sigmoid, sigmoid_prime};

pub mod error;
pub use error::{ConfigurationError, Result};

pub mod linalg;
pub use linalg::{Matrix, Vector};

mod minibatch;
pub use minibatch::{create_minibatches, Minibatch};

mod sample;
pub use sample::{Expected, TrainingSample};

mod traits;
pub use traits::CostFunction;

pub mod cost;
pub use cost::CostKind;

mod network;
pub use network::{Gradients, Network};

mod trainer;
pub use trainer::{EpochReport, Trainer, TrainingConfig};

pub mod idx;

pub mod persist;
