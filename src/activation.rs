//! The logistic activation used by every layer, and picking a class from
//! an output layer.

use ndarray::prelude::*;

/// The logistic function `1 / (1 + e^(-z))`.
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Derivative of `sigmoid`.
pub fn sigmoid_prime(z: f64) -> f64 {
    let s = sigmoid(z);
    s * (1.0 - s)
}

/// Index of the largest element. Ties go to the lowest index; an empty
/// slice gives 0.
pub fn argmax(a: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &x) in a.iter().enumerate() {
        if x > a[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sigmoid_at_zero() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_eq!(sigmoid_prime(0.0), 0.25);
    }

    #[test]
    fn sigmoid_is_increasing() {
        let mut prev = sigmoid(-10.0);
        for i in -99..=100 {
            let s = sigmoid(i as f64 / 10.0);
            assert!(s > prev, "sigmoid not increasing at {}", i as f64 / 10.0);
            prev = s;
        }
    }

    #[test]
    fn derivative_peaks_at_zero() {
        for i in -50..=50 {
            let z = i as f64 / 5.0;
            let s = sigmoid(z);
            assert_eq!(sigmoid_prime(z), s * (1.0 - s));
            if i != 0 {
                assert!(sigmoid_prime(z) < 0.25);
            }
        }
    }

    #[test]
    fn picks_largest() {
        assert_eq!(argmax(array![0.1, 0.9, 0.05].view()), 1);
        assert_eq!(argmax(array![0.7, 0.2, 0.7].view()), 0);
        assert_eq!(argmax(array![-3.0, -1.0].view()), 1);
    }
}
