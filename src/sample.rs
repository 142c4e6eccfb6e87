use std::borrow::Cow;

use crate::activation::argmax;
use crate::error::{ConfigurationError, Result};
use crate::linalg::Vector;

/// What the network should produce for a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// Full output-layer activations, one-hot for classification.
    Output(Vector),
    /// Index of the output node that should fire.
    Class(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub input: Vector,
    pub expected: Expected,
}

impl TrainingSample {
    pub fn new(input: Vector, output: Vector) -> Self {
        TrainingSample {
            input,
            expected: Expected::Output(output),
        }
    }

    pub fn with_class(input: Vector, class: usize) -> Self {
        TrainingSample {
            input,
            expected: Expected::Class(class),
        }
    }

    pub fn expected_class(&self) -> usize {
        match &self.expected {
            Expected::Output(y) => argmax(y.view()),
            Expected::Class(c) => *c,
        }
    }

    /// Target output activations for an output layer of `outputs` nodes.
    ///
    /// Borrowed when the sample stores a full vector; a one-hot vector is
    /// built when it stores a class.
    pub fn target(&self, outputs: usize) -> Result<Cow<'_, Vector>> {
        match &self.expected {
            Expected::Output(y) => {
                if y.len() != outputs {
                    return Err(ConfigurationError::len_mismatch(outputs, y.len()));
                }
                Ok(Cow::Borrowed(y))
            }
            &Expected::Class(class) => {
                if class >= outputs {
                    return Err(ConfigurationError::InvalidClass { class, outputs });
                }
                let mut y = Vector::zeros(outputs);
                y[class] = 1.0;
                Ok(Cow::Owned(y))
            }
        }
    }

    /// Check that this sample fits a network with the given input and
    /// output layer sizes.
    pub fn check(&self, inputs: usize, outputs: usize) -> Result<()> {
        if self.input.len() != inputs {
            return Err(ConfigurationError::len_mismatch(inputs, self.input.len()));
        }
        self.target(outputs).map(|_| ())
    }
}
