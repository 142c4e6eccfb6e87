use crate::error::{ConfigurationError, Result};
use crate::linalg::Vector;

/// Scratch space for pushing one sample forward and its error backward.
///
/// Every field holds one vector per layer, sized to that layer's node count.
/// `a[0]` is the input; `z[0]` and `delta[0]` are never read. Nothing needs
/// resetting between samples: feedforward and backpropagation overwrite each
/// entry before anything reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Minibatch {
    /// Weighted inputs, `z[l] = W[l]·a[l-1] + b[l]`.
    pub z: Vec<Vector>,
    /// Activations, `a[l] = σ(z[l])`.
    pub a: Vec<Vector>,
    /// Errors, `delta[l] = ∂C/∂z[l]`.
    pub delta: Vec<Vector>,
}

fn vectors(nodes: &[usize]) -> Vec<Vector> {
    nodes.iter().map(|&n| Vector::zeros(n)).collect()
}

impl Minibatch {
    pub fn new(nodes: &[usize]) -> Self {
        Minibatch {
            z: vectors(nodes),
            a: vectors(nodes),
            delta: vectors(nodes),
        }
    }

    pub fn num_layers(&self) -> usize {
        self.a.len()
    }

    /// Node count of each layer this minibatch was sized for.
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.a.iter().map(|a| a.len())
    }

    fn check(&self, index: usize, layer: usize) -> Result<()> {
        let layers = self.num_layers();
        if layer >= layers {
            return Err(ConfigurationError::InvalidLayer { layer, layers });
        }
        let len = self.a[layer].len();
        if index >= len {
            return Err(ConfigurationError::InvalidIndex { index, len, layer });
        }
        Ok(())
    }

    pub fn activation(&self, index: usize, layer: usize) -> Result<f64> {
        self.check(index, layer)?;
        Ok(self.a[layer][index])
    }

    pub fn set_activation(&mut self, value: f64, index: usize, layer: usize) -> Result<()> {
        self.check(index, layer)?;
        self.a[layer][index] = value;
        Ok(())
    }

    pub fn delta(&self, index: usize, layer: usize) -> Result<f64> {
        self.check(index, layer)?;
        Ok(self.delta[layer][index])
    }
}

/// One scratch slot per sample in a minibatch of `count` samples.
pub fn create_minibatches(count: usize, nodes: &[usize]) -> Vec<Minibatch> {
    (0..count).map(|_| Minibatch::new(nodes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_per_layer() {
        let mb = Minibatch::new(&[4, 3, 2]);
        assert_eq!(mb.num_layers(), 3);
        assert_eq!(mb.nodes().collect::<Vec<_>>(), vec![4, 3, 2]);
        for field in [&mb.z, &mb.a, &mb.delta] {
            assert_eq!(field.iter().map(|v| v.len()).collect::<Vec<_>>(), vec![4, 3, 2]);
        }
    }

    #[test]
    fn checked_access() {
        let mut mb = Minibatch::new(&[2, 1]);
        mb.set_activation(0.25, 1, 0).unwrap();
        assert_eq!(mb.activation(1, 0), Ok(0.25));
        assert_eq!(
            mb.activation(2, 0),
            Err(ConfigurationError::InvalidIndex {
                index: 2,
                len: 2,
                layer: 0
            })
        );
        assert_eq!(
            mb.delta(0, 2),
            Err(ConfigurationError::InvalidLayer {
                layer: 2,
                layers: 2
            })
        );
    }

    #[test]
    fn independent_slots() {
        let mut mbs = create_minibatches(3, &[2, 2]);
        mbs[0].a[0][0] = 1.0;
        assert_eq!(mbs[1].a[0][0], 0.0);
        assert_eq!(mbs.len(), 3);
    }
}
